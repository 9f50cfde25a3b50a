mod list;

pub use list::*;

use axum::{
    routing::{get, post},
    Router,
};

use crate::sync::SharedSnapshotStore;

#[derive(Clone)]
pub struct VehiclesState {
    pub store: SharedSnapshotStore,
}

pub fn router(store: SharedSnapshotStore) -> Router {
    let state = VehiclesState { store };
    Router::new()
        .route("/", get(get_current_snapshot))
        .route("/by-route", post(get_vehicles_by_route))
        .route("/by-id", post(get_vehicle_by_id))
        .route("/history", get(get_snapshot_history))
        .with_state(state)
}
