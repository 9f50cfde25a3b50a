//! Background collection of live bus positions.
//!
//! This module handles:
//! - The poll loop driving one fetch-and-publish cycle per interval
//! - Exponential backoff with ceiling across consecutive failures
//! - Publishing immutable snapshots and fanning out update notifications

pub mod normalize;
pub mod store;
pub mod types;

pub use normalize::ValidationError;
pub use store::{SharedSnapshotStore, SnapshotStore};
pub use types::{
    FeedStatus, Snapshot, SnapshotUpdate, SnapshotUpdateSender, StatusStore, VehicleRecord,
};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::config::PollConfig;
use crate::providers::feed::error::FeedError;
use crate::providers::feed::wire::RawVehicle;
use crate::providers::feed::VehicleSource;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Backoff doublings stop here; 2^16 * base already exceeds any sane ceiling
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Wait before the next cycle after `consecutive_failures` failed cycles:
/// base, 2*base, 4*base, ... capped at `max`.
fn backoff_for_failures(base: Duration, max: Duration, consecutive_failures: u32) -> Duration {
    let shift = consecutive_failures.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    base.saturating_mul(1u32 << shift).min(max)
}

/// Collector-private feed state. Mutated only by the poll loop; the health
/// endpoint sees the [`FeedStatus`] projection.
#[derive(Debug)]
struct FeedState {
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    backoff: Duration,
}

impl FeedState {
    fn new(base: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
            backoff: base,
        }
    }

    fn record_success(&mut self, now: DateTime<Utc>, base: Duration) {
        self.consecutive_failures = 0;
        self.last_success = Some(now);
        self.last_error = None;
        self.backoff = base;
    }

    fn record_failure(&mut self, error: &SyncError, base: Duration, max: Duration) -> Duration {
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
        self.backoff = backoff_for_failures(base, max, self.consecutive_failures);
        self.backoff
    }
}

/// Drives periodic collection from a [`VehicleSource`] into a
/// [`SnapshotStore`].
pub struct Collector<S> {
    source: S,
    routes: Vec<String>,
    config: PollConfig,
    store: SharedSnapshotStore,
    status: StatusStore,
    updates_tx: SnapshotUpdateSender,
    state: FeedState,
}

impl<S: VehicleSource> Collector<S> {
    pub fn new(source: S, routes: Vec<String>, config: PollConfig) -> Self {
        let store = Arc::new(SnapshotStore::new(config.history_capacity));

        // Capacity 16 - lagging subscribers re-read the current snapshot anyway
        let (updates_tx, _) = broadcast::channel(16);

        let base = config.base_interval();
        Self {
            source,
            routes,
            config,
            store,
            status: Arc::new(RwLock::new(FeedStatus::default())),
            updates_tx,
            state: FeedState::new(base),
        }
    }

    /// Get a reference to the snapshot store for API access
    pub fn snapshot_store(&self) -> SharedSnapshotStore {
        self.store.clone()
    }

    /// Get a reference to the feed status for the health endpoint
    pub fn status_store(&self) -> StatusStore {
        self.status.clone()
    }

    /// Get the update sender for passing to API handlers
    pub fn updates_sender(&self) -> SnapshotUpdateSender {
        self.updates_tx.clone()
    }

    /// Run the poll loop until `shutdown` fires.
    ///
    /// The signal is observed at the wait boundary: an in-flight fetch is
    /// allowed to finish (it is bounded by the per-fetch timeout), so the
    /// store is never left torn.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval_secs,
            routes = self.routes.len(),
            "Starting collector loop"
        );

        loop {
            let wait = self.cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    info!("Collector shutting down");
                    break;
                }
            }
        }
    }

    /// One full cycle: fetch, normalize, publish. Returns the wait before
    /// the next cycle. Failures are recovered here; nothing propagates.
    async fn cycle(&mut self) -> Duration {
        let base = self.config.base_interval();

        let wait = match self.poll_once().await {
            Ok(snapshot) => {
                self.state.record_success(Utc::now(), base);
                info!(
                    sequence = snapshot.sequence,
                    vehicles = snapshot.records.len(),
                    "Published snapshot"
                );
                base
            }
            Err(e) => {
                let wait =
                    self.state
                        .record_failure(&e, base, self.config.max_backoff());
                warn!(
                    error = %e,
                    consecutive_failures = self.state.consecutive_failures,
                    next_wait_secs = wait.as_secs(),
                    "Collection cycle failed, keeping last-good snapshot"
                );
                if self.state.consecutive_failures == self.config.failure_alarm_threshold {
                    warn!(
                        threshold = self.config.failure_alarm_threshold,
                        "Feed staleness alarm: served snapshot will keep aging until the upstream recovers"
                    );
                }
                wait
            }
        };

        self.publish_status().await;
        wait
    }

    async fn poll_once(&self) -> Result<Arc<Snapshot>, SyncError> {
        let collected_at = Utc::now();
        let mut raw: Vec<RawVehicle> = Vec::new();
        let mut last_error: Option<FeedError> = None;
        let mut failed_routes = 0usize;

        for route in &self.routes {
            match self.source.fetch_route(route).await {
                Ok(mut batch) => raw.append(&mut batch),
                Err(e) => {
                    warn!(route = %route, error = %e, "Route fetch failed");
                    failed_routes += 1;
                    last_error = Some(e);
                }
            }
        }

        // Partial coverage still forms a consistent snapshot; only a cycle
        // where every route failed is a collection failure.
        if failed_routes == self.routes.len() {
            if let Some(error) = last_error {
                return Err(error.into());
            }
        }

        let normalized = normalize::normalize(raw, collected_at)?;
        if normalized.dropped > 0 {
            warn!(dropped = normalized.dropped, "Dropped invalid records from batch");
        }

        let snapshot = self.store.publish(collected_at, normalized.records).await;

        // Nobody listening is fine
        let _ = self.updates_tx.send(SnapshotUpdate {
            sequence: snapshot.sequence,
            collected_at: snapshot.collected_at,
            vehicle_count: snapshot.records.len(),
        });

        Ok(snapshot)
    }

    async fn publish_status(&self) {
        let mut status = self.status.write().await;
        *status = FeedStatus {
            consecutive_failures: self.state.consecutive_failures,
            last_success: self.state.last_success,
            last_error: self.state.last_error.clone(),
            current_backoff_secs: self.state.backoff.as_secs(),
            stale_alarm: self.state.consecutive_failures >= self.config.failure_alarm_threshold,
        };
    }
}
