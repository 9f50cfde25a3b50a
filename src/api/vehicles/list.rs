use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::VehiclesState;
use crate::api::ErrorResponse;
use crate::sync::{Snapshot, VehicleRecord};

/// View of one published snapshot, with its age precomputed so consumers
/// can apply their own freshness threshold.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotView {
    pub sequence: u64,
    pub collected_at: DateTime<Utc>,
    pub age_seconds: i64,
    pub vehicles: Vec<VehicleRecord>,
}

impl SnapshotView {
    fn from_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        Self {
            sequence: snapshot.sequence,
            collected_at: snapshot.collected_at,
            age_seconds: snapshot.age_seconds(now),
            vehicles: snapshot.records.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentSnapshotResponse {
    /// Absent until the first successful collection cycle
    pub snapshot: Option<SnapshotView>,
}

/// Current snapshot of all tracked vehicles
#[utoipa::path(
    get,
    path = "/api/vehicles",
    responses(
        (status = 200, description = "Latest published snapshot, or null before the first publish", body = CurrentSnapshotResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_current_snapshot(
    State(state): State<VehiclesState>,
) -> Json<CurrentSnapshotResponse> {
    let snapshot = state.store.current().await;
    Json(CurrentSnapshotResponse {
        snapshot: snapshot
            .as_deref()
            .map(|s| SnapshotView::from_snapshot(s, Utc::now())),
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VehiclesByRouteRequest {
    /// The route to get vehicles for (e.g. "71")
    pub route_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehiclesByRouteResponse {
    pub route_id: String,
    /// Sequence of the snapshot the subset was taken from
    pub sequence: Option<u64>,
    pub vehicles: Vec<VehicleRecord>,
}

/// Get all vehicles currently observed on a route
#[utoipa::path(
    post,
    path = "/api/vehicles/by-route",
    request_body = VehiclesByRouteRequest,
    responses(
        (status = 200, description = "Vehicles on the route in the current snapshot", body = VehiclesByRouteResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicles_by_route(
    State(state): State<VehiclesState>,
    Json(request): Json<VehiclesByRouteRequest>,
) -> Json<VehiclesByRouteResponse> {
    let snapshot = state.store.current().await;

    let (sequence, vehicles) = match snapshot.as_deref() {
        Some(s) => (
            Some(s.sequence),
            s.records_for_route(&request.route_id)
                .into_iter()
                .cloned()
                .collect(),
        ),
        None => (None, Vec::new()),
    };

    Json(VehiclesByRouteResponse {
        route_id: request.route_id,
        sequence,
        vehicles,
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VehicleByIdRequest {
    /// Vehicle identifier (e.g. plate number)
    pub vehicle_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleByIdResponse {
    /// Sequence of the snapshot the record was taken from
    pub sequence: u64,
    pub vehicle: VehicleRecord,
}

/// Look up a single vehicle in the current snapshot
#[utoipa::path(
    post,
    path = "/api/vehicles/by-id",
    request_body = VehicleByIdRequest,
    responses(
        (status = 200, description = "The vehicle's current record", body = VehicleByIdResponse),
        (status = 404, description = "Vehicle not present in the current snapshot", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicle_by_id(
    State(state): State<VehiclesState>,
    Json(request): Json<VehicleByIdRequest>,
) -> Result<Json<VehicleByIdResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state.store.current().await;

    let found = snapshot
        .as_deref()
        .and_then(|s| s.record_for_vehicle(&request.vehicle_id).cloned().map(|v| (s.sequence, v)));

    match found {
        Some((sequence, vehicle)) => Ok(Json(VehicleByIdResponse { sequence, vehicle })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Vehicle not present in the current snapshot")),
        )),
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryParams {
    /// Maximum number of entries to return (default: 10)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotSummary {
    pub sequence: u64,
    pub collected_at: DateTime<Utc>,
    pub vehicle_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Superseded snapshots, most-recent first
    pub snapshots: Vec<SnapshotSummary>,
}

/// Trailing window of superseded snapshots
#[utoipa::path(
    get,
    path = "/api/vehicles/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Bounded trailing snapshot history", body = HistoryResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_snapshot_history(
    State(state): State<VehiclesState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let limit = params.limit.unwrap_or(10);
    let snapshots = state
        .store
        .history(limit)
        .await
        .iter()
        .map(|s| SnapshotSummary {
            sequence: s.sequence,
            collected_at: s.collected_at,
            vehicle_count: s.records.len(),
        })
        .collect();

    Json(HistoryResponse { snapshots })
}
