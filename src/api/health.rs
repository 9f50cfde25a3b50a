use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::sync::{FeedStatus, SharedSnapshotStore, StatusStore};

#[derive(Clone)]
pub struct HealthState {
    pub store: SharedSnapshotStore,
    pub status: StatusStore,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Whether a snapshot has ever been published
    pub snapshot_published: bool,
    /// Sequence of the currently served snapshot
    pub current_sequence: Option<u64>,
    /// Number of vehicles in the currently served snapshot
    pub vehicle_count: usize,
    /// When the currently served snapshot was collected
    pub collected_at: Option<DateTime<Utc>>,
    /// Age of the served snapshot in seconds. Staleness is an observable
    /// metric, not an error: consumers compare this to their own threshold.
    pub snapshot_age_seconds: Option<i64>,
    /// Collection-side feed state
    pub feed: FeedStatus,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health and feed staleness", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let current = state.store.current().await;
    let feed = state.status.read().await.clone();

    let (published, sequence, vehicle_count, collected_at, age) =
        if let Some(snapshot) = current.as_ref() {
            (
                true,
                Some(snapshot.sequence),
                snapshot.records.len(),
                Some(snapshot.collected_at),
                Some(snapshot.age_seconds(now)),
            )
        } else {
            (false, None, 0, None, None)
        };

    Json(HealthResponse {
        healthy: true,
        snapshot_published: published,
        current_sequence: sequence,
        vehicle_count,
        collected_at,
        snapshot_age_seconds: age,
        feed,
    })
}

pub fn router(store: SharedSnapshotStore, status: StatusStore) -> Router {
    let state = HealthState { store, status };
    Router::new()
        .route("/", get(health_check))
        .with_state(state)
}
