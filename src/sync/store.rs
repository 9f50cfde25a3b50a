//! In-memory snapshot store: latest published snapshot plus a bounded
//! trailing window of superseded ones.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Snapshot, VehicleRecord};

/// Single shared mutable resource of the pipeline. The collector is the
/// only writer; any number of query handlers read concurrently. Guards are
/// held just long enough to swap or clone `Arc`s, so a slow reader never
/// stalls collection and a reader never observes a half-built snapshot.
pub struct SnapshotStore {
    inner: RwLock<StoreInner>,
    history_capacity: usize,
}

struct StoreInner {
    current: Option<Arc<Snapshot>>,
    /// Superseded snapshots, oldest first
    history: VecDeque<Arc<Snapshot>>,
    next_sequence: u64,
}

/// Shared handle to the snapshot store
pub type SharedSnapshotStore = Arc<SnapshotStore>;

impl SnapshotStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                current: None,
                history: VecDeque::with_capacity(history_capacity),
                next_sequence: 1,
            }),
            history_capacity,
        }
    }

    /// Atomically publish a new snapshot built from one poll cycle.
    ///
    /// Assigns the next sequence, swaps the current reference, and moves
    /// the superseded snapshot into the ring history (oldest evicted on
    /// overflow). Readers holding the previous `Arc` keep a consistent,
    /// merely stale, view.
    pub async fn publish(
        &self,
        collected_at: DateTime<Utc>,
        records: Vec<VehicleRecord>,
    ) -> Arc<Snapshot> {
        let mut inner = self.inner.write().await;

        let snapshot = Arc::new(Snapshot {
            sequence: inner.next_sequence,
            collected_at,
            records,
        });
        inner.next_sequence += 1;

        if let Some(previous) = inner.current.replace(snapshot.clone()) {
            if inner.history.len() == self.history_capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(previous);
        }

        snapshot
    }

    /// Latest published snapshot, or `None` before the first publish. O(1).
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().await.current.clone()
    }

    /// Superseded snapshots, most-recent first, at most `limit` entries.
    pub async fn history(&self, limit: usize) -> Vec<Arc<Snapshot>> {
        let inner = self.inner.read().await;
        inner.history.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_records(count: usize) -> Vec<VehicleRecord> {
        (0..count)
            .map(|i| VehicleRecord {
                vehicle_id: format!("MX-{i:02}"),
                route_id: "71".to_string(),
                latitude: 22.19,
                longitude: 113.54,
                heading: None,
                speed: None,
                timestamp: None,
                observed_at: collected(0),
            })
            .collect()
    }

    fn collected(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap()
    }

    // --- publish / current ---

    #[tokio::test]
    async fn current_is_none_before_first_publish() {
        let store = SnapshotStore::new(4);
        assert!(store.current().await.is_none());
        assert!(store.history(10).await.is_empty());
    }

    #[tokio::test]
    async fn sequences_strictly_increase() {
        let store = SnapshotStore::new(4);
        let mut last = 0;
        for minute in 0..5 {
            let snapshot = store.publish(collected(minute), make_records(2)).await;
            assert!(snapshot.sequence > last);
            last = snapshot.sequence;
        }
        assert_eq!(store.current().await.unwrap().sequence, 5);
    }

    #[tokio::test]
    async fn publish_moves_previous_snapshot_into_history() {
        let store = SnapshotStore::new(4);
        store.publish(collected(0), make_records(1)).await;
        store.publish(collected(1), make_records(2)).await;

        let history = store.history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sequence, 1);
        assert_eq!(store.current().await.unwrap().sequence, 2);
    }

    // --- history ring ---

    #[tokio::test]
    async fn history_evicts_oldest_at_capacity() {
        let store = SnapshotStore::new(3);
        for minute in 0..6 {
            store.publish(collected(minute), make_records(1)).await;
        }

        // 5 superseded snapshots, capacity 3: sequences 3, 4, 5 remain
        let history = store.history(10).await;
        assert_eq!(history.len(), 3);
        let sequences: Vec<u64> = history.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn history_respects_limit_most_recent_first() {
        let store = SnapshotStore::new(8);
        for minute in 0..5 {
            store.publish(collected(minute), make_records(1)).await;
        }

        let history = store.history(2).await;
        let sequences: Vec<u64> = history.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![4, 3]);
    }

    // --- concurrent readers ---

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_never_observe_torn_snapshots() {
        // Every published snapshot carries exactly `sequence` records, so a
        // reader can check internal consistency of whatever it sees.
        let store = Arc::new(SnapshotStore::new(4));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 1..=50usize {
                    store.publish(collected(0), make_records(i)).await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut last_seen = 0u64;
                    for _ in 0..200 {
                        if let Some(snapshot) = store.current().await {
                            // full batch or nothing
                            assert_eq!(snapshot.records.len() as u64, snapshot.sequence);
                            // monotonic visibility per reader
                            assert!(snapshot.sequence >= last_seen);
                            last_seen = snapshot.sequence;
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
