//! Type definitions for the collection pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use utoipa::ToSchema;

/// One validated vehicle position inside a snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VehicleRecord {
    /// Vehicle identifier (e.g. plate number), unique within a snapshot
    pub vehicle_id: String,
    /// Route the vehicle was observed serving
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Heading in degrees, when the feed reports one
    pub heading: Option<f64>,
    /// Speed as reported by the feed (unit is feed-specific)
    pub speed: Option<f64>,
    /// Source-reported timestamp, absent when the feed carries none
    pub timestamp: Option<DateTime<Utc>>,
    /// Collection time, always set
    pub observed_at: DateTime<Utc>,
}

/// One immutable, fully-valid capture of all vehicle records from a single
/// poll cycle. Never mutated after publish; shared by reference.
#[derive(Debug, Serialize, ToSchema)]
pub struct Snapshot {
    /// Monotonically increasing publish sequence, starting at 1
    pub sequence: u64,
    /// When the poll cycle that produced this snapshot ran
    pub collected_at: DateTime<Utc>,
    pub records: Vec<VehicleRecord>,
}

impl Snapshot {
    /// Records belonging to the given route, in snapshot order.
    pub fn records_for_route<'a>(&'a self, route_id: &str) -> Vec<&'a VehicleRecord> {
        self.records
            .iter()
            .filter(|r| r.route_id == route_id)
            .collect()
    }

    /// The record for a vehicle id. Absence is a normal outcome.
    pub fn record_for_vehicle(&self, vehicle_id: &str) -> Option<&VehicleRecord> {
        self.records.iter().find(|r| r.vehicle_id == vehicle_id)
    }

    /// Age of this snapshot relative to `now`, saturating at zero.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.collected_at).num_seconds().max(0)
    }
}

/// Read-only projection of the collector's feed state, for the health
/// endpoint. Written only by the collector.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FeedStatus {
    /// Consecutive failed poll cycles
    pub consecutive_failures: u32,
    /// Last time a snapshot was published
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent cycle failure, cleared on success
    pub last_error: Option<String>,
    /// Wait before the next poll cycle, in seconds
    pub current_backoff_secs: u64,
    /// Set once consecutive failures reach the configured alarm threshold
    pub stale_alarm: bool,
}

/// Shared handle to the collector's feed status
pub type StatusStore = Arc<RwLock<FeedStatus>>;

/// Notification broadcast after every successful publish
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SnapshotUpdate {
    pub sequence: u64,
    pub collected_at: DateTime<Utc>,
    pub vehicle_count: usize,
}

/// Sender for publish notifications
pub type SnapshotUpdateSender = broadcast::Sender<SnapshotUpdate>;
