//! Background tasks that write gateway state to PostgreSQL.
//!
//! [`EventRecorder`] appends every bus event to the event log and writes
//! a tombstone when an arisan is deleted. [`SnapshotTask`] periodically
//! stores the state of every arisan that changed since the last pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::postgres::PostgresPersistence;
use crate::domain::{ArisanEvent, ArisanId, ArisanRegistry, ArisanSnapshot};
use crate::error::GatewayError;

/// Drains the event bus into the event log.
#[derive(Debug)]
pub struct EventRecorder {
    persistence: PostgresPersistence,
    events: broadcast::Receiver<ArisanEvent>,
    log_events: bool,
}

impl EventRecorder {
    /// Creates a recorder. With `log_events` off only tombstones are
    /// written.
    #[must_use]
    pub fn new(
        persistence: PostgresPersistence,
        events: broadcast::Receiver<ArisanEvent>,
        log_events: bool,
    ) -> Self {
        Self {
            persistence,
            events,
            log_events,
        }
    }

    /// Runs until the event bus closes.
    pub async fn run(mut self) {
        tracing::info!(log_events = self.log_events, "event recorder started");
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Err(err) = self.record(&event).await {
                        tracing::error!(
                            arisan_id = %event.arisan_id(),
                            event_type = event.event_type_str(),
                            error = %err,
                            "failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event recorder lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!("event recorder stopped");
    }

    async fn record(&self, event: &ArisanEvent) -> Result<(), GatewayError> {
        if self.log_events {
            let _ = self.persistence.save_event(event).await?;
        }
        if let ArisanEvent::ArisanDeleted { arisan_id, .. } = event {
            let _ = self.persistence.save_tombstone(*arisan_id).await?;
        }
        Ok(())
    }

    /// Spawns [`EventRecorder::run`] onto the Tokio runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Decides which arisans a snapshot pass must write.
///
/// Remembers the `last_modified_at` stored for every arisan so unchanged
/// arisans are skipped, and reports arisans that disappeared since the
/// previous pass so they can be tombstoned.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    stored: HashMap<ArisanId, DateTime<Utc>>,
}

/// Work produced by [`SnapshotTracker::plan`].
#[derive(Debug, Default)]
pub struct SnapshotPlan {
    /// Arisans whose state changed or was never stored.
    pub changed: Vec<ArisanSnapshot>,
    /// Arisans stored before that are no longer live.
    pub removed: Vec<ArisanId>,
}

impl SnapshotTracker {
    /// Creates a tracker that treats `known` as already stored.
    #[must_use]
    pub fn new(known: &[ArisanSnapshot]) -> Self {
        Self {
            stored: known
                .iter()
                .map(|s| (s.arisan.id(), s.last_modified_at))
                .collect(),
        }
    }

    /// Compares the live registry against what was stored.
    #[must_use]
    pub fn plan(&self, live: Vec<ArisanSnapshot>) -> SnapshotPlan {
        let mut removed: Vec<ArisanId> = self
            .stored
            .keys()
            .filter(|id| !live.iter().any(|s| s.arisan.id() == **id))
            .copied()
            .collect();
        removed.sort_unstable();
        let changed = live
            .into_iter()
            .filter(|s| self.stored.get(&s.arisan.id()) != Some(&s.last_modified_at))
            .collect();
        SnapshotPlan { changed, removed }
    }

    /// Records a written snapshot.
    pub fn stored(&mut self, snapshot: &ArisanSnapshot) {
        let _ = self
            .stored
            .insert(snapshot.arisan.id(), snapshot.last_modified_at);
    }

    /// Records a written tombstone.
    pub fn removed(&mut self, arisan_id: ArisanId) {
        let _ = self.stored.remove(&arisan_id);
    }
}

/// Periodic snapshot writer.
#[derive(Debug)]
pub struct SnapshotTask {
    persistence: PostgresPersistence,
    registry: Arc<ArisanRegistry>,
    interval: Duration,
    cleanup_after_days: u64,
    tracker: SnapshotTracker,
}

impl SnapshotTask {
    /// Creates a snapshot task. Arisans in `restored` count as already
    /// stored.
    #[must_use]
    pub fn new(
        persistence: PostgresPersistence,
        registry: Arc<ArisanRegistry>,
        interval: Duration,
        cleanup_after_days: u64,
        restored: &[ArisanSnapshot],
    ) -> Self {
        Self {
            persistence,
            registry,
            interval,
            cleanup_after_days,
            tracker: SnapshotTracker::new(restored),
        }
    }

    /// Writes one snapshot pass and returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on the first database
    /// failure; rows written before it stay written.
    pub async fn flush(&mut self) -> Result<usize, GatewayError> {
        let plan = self.tracker.plan(self.registry.snapshot_all().await);
        let mut written = 0;
        for snapshot in &plan.changed {
            let _ = self.persistence.save_snapshot(snapshot).await?;
            self.tracker.stored(snapshot);
            written += 1;
        }
        for arisan_id in plan.removed {
            let _ = self.persistence.save_tombstone(arisan_id).await?;
            self.tracker.removed(arisan_id);
            written += 1;
        }
        Ok(written)
    }

    /// Runs forever, flushing on every tick.
    pub async fn run(mut self) {
        let period = self.interval.max(Duration::from_secs(1));
        tracing::info!(interval_secs = period.as_secs(), "snapshot task started");
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match self.flush().await {
                Ok(0) => {}
                Ok(written) => tracing::debug!(written, "snapshots written"),
                Err(err) => tracing::error!(error = %err, "snapshot pass failed"),
            }
            if self.cleanup_after_days > 0 {
                match self
                    .persistence
                    .delete_old_snapshots(self.cleanup_after_days)
                    .await
                {
                    Ok(0) => {}
                    Ok(deleted) => tracing::debug!(deleted, "old snapshots removed"),
                    Err(err) => tracing::warn!(error = %err, "snapshot cleanup failed"),
                }
            }
        }
    }

    /// Spawns [`SnapshotTask::run`] onto the Tokio runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Arisan, ArisanEntry, Identity};
    use crate::randomness::{RandomnessConfig, SubscriptionId};

    fn snapshot(id: u64) -> ArisanSnapshot {
        let Ok(organizer) = Identity::parse("org") else {
            panic!("valid identity");
        };
        let randomness = RandomnessConfig {
            coordinator: "local".to_string(),
            key_hash: format!("0x{}", "47".repeat(32)),
            subscription_id: SubscriptionId::new(1),
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            num_words: 1,
        };
        let Ok(arisan) = Arisan::new(
            ArisanId::new(id),
            organizer,
            randomness,
            Amount::from_wei(5),
            3,
        ) else {
            panic!("valid arisan");
        };
        ArisanEntry::new(arisan).snapshot()
    }

    #[test]
    fn unseen_arisans_are_written() {
        let tracker = SnapshotTracker::default();
        let plan = tracker.plan(vec![snapshot(0), snapshot(1)]);
        assert_eq!(plan.changed.len(), 2);
        assert!(plan.removed.is_empty());
    }

    #[test]
    fn unchanged_arisans_are_skipped() {
        let first = snapshot(0);
        let tracker = SnapshotTracker::new(std::slice::from_ref(&first));
        let plan = tracker.plan(vec![first]);
        assert!(plan.changed.is_empty());
    }

    #[test]
    fn modified_arisans_are_rewritten() {
        let first = snapshot(0);
        let tracker = SnapshotTracker::new(std::slice::from_ref(&first));
        let mut modified = first;
        modified.last_modified_at += chrono::Duration::seconds(1);
        let plan = tracker.plan(vec![modified]);
        assert_eq!(plan.changed.len(), 1);
    }

    #[test]
    fn vanished_arisans_are_tombstoned_once() {
        let mut tracker = SnapshotTracker::new(&[snapshot(0), snapshot(2)]);
        let plan = tracker.plan(vec![snapshot(2)]);
        assert_eq!(plan.removed, vec![ArisanId::new(0)]);

        tracker.removed(ArisanId::new(0));
        let plan = tracker.plan(vec![]);
        assert_eq!(plan.removed, vec![ArisanId::new(2)]);
    }
}
