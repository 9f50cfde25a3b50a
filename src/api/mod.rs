pub mod error;
pub mod health;
pub mod vehicles;
pub mod ws;

pub use error::ErrorResponse;

use axum::{routing::get, Router};

use crate::sync::{SharedSnapshotStore, SnapshotUpdateSender, StatusStore};

pub fn router(
    store: SharedSnapshotStore,
    status: StatusStore,
    updates_tx: SnapshotUpdateSender,
) -> Router {
    let ws_state = ws::WsState {
        store: store.clone(),
        updates_tx,
    };

    Router::new()
        .nest("/vehicles", vehicles::router(store.clone()))
        .nest("/health", health::router(store, status))
        .route("/ws/updates", get(ws::ws_updates).with_state(ws_state))
}
