//! Arena of arisans with per-arisan fine-grained locking.
//!
//! [`ArisanRegistry`] stores arisans in a `Vec` of slots indexed by
//! [`ArisanId`]. Each live slot holds its entry behind its own
//! [`tokio::sync::RwLock`], so operations on different arisans run
//! concurrently while operations on the same arisan are serialized.
//! Deleting an arisan tombstones its slot; identifiers are never reused.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::arisan::Arisan;
use super::arisan_entry::{ArisanEntry, ArisanSnapshot, ArisanSummary};
use super::{Amount, ArisanId, Identity};
use crate::error::GatewayError;
use crate::randomness::{RandomnessConfig, RandomnessGateway};

type Slot = Option<Arc<RwLock<ArisanEntry>>>;

/// Central store for all arisans.
///
/// # Concurrency
///
/// - The outer lock is held for writing only while a slot is appended
///   or tombstoned.
/// - Multiple tasks may read the same arisan concurrently.
/// - Writes to the same arisan are serialized by its entry lock.
#[derive(Debug)]
pub struct ArisanRegistry {
    slots: RwLock<Vec<Slot>>,
}

impl ArisanRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Creates an arisan organized by `organizer` and registers it as a
    /// randomness consumer under its subscription.
    ///
    /// The new arisan gets the next sequential id. If validation or the
    /// consumer registration fails, no slot is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfiguration`] for a zero payment
    /// amount, zero capacity or unusable randomness coordinates, and any
    /// error from [`RandomnessGateway::add_consumer`].
    pub async fn create(
        &self,
        organizer: Identity,
        randomness: RandomnessConfig,
        payment_amount: Amount,
        max_participants: u32,
        gateway: &dyn RandomnessGateway,
    ) -> Result<ArisanId, GatewayError> {
        let mut slots = self.slots.write().await;
        let id = ArisanId::new(slots.len() as u64);
        let subscription_id = randomness.subscription_id;

        let arisan = Arisan::new(id, organizer, randomness, payment_amount, max_participants)?;
        gateway.add_consumer(subscription_id, arisan.organizer(), id)?;

        slots.push(Some(Arc::new(RwLock::new(ArisanEntry::new(arisan)))));
        Ok(id)
    }

    /// Returns the entry lock of a live arisan.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if the id is out of range
    /// or the arisan was deleted.
    pub async fn get(&self, id: ArisanId) -> Result<Arc<RwLock<ArisanEntry>>, GatewayError> {
        let slots = self.slots.read().await;
        usize::try_from(id.get())
            .ok()
            .and_then(|idx| slots.get(idx))
            .and_then(Option::as_ref)
            .map(Arc::clone)
            .ok_or(GatewayError::ArisanNotFound(id))
    }

    /// Deletes an arisan on behalf of `caller`, returning its final state.
    ///
    /// The slot is tombstoned and the arisan is removed as a consumer of
    /// its randomness subscription.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if no live arisan has this
    /// id, or [`GatewayError::UnauthorizedToDelete`] if `caller` is not
    /// its organizer.
    pub async fn delete(
        &self,
        caller: &Identity,
        id: ArisanId,
        gateway: &dyn RandomnessGateway,
    ) -> Result<Arisan, GatewayError> {
        let mut slots = self.slots.write().await;
        let slot = usize::try_from(id.get())
            .ok()
            .and_then(|idx| slots.get_mut(idx))
            .ok_or(GatewayError::ArisanNotFound(id))?;
        let entry_lock = slot.as_ref().ok_or(GatewayError::ArisanNotFound(id))?;

        let arisan = {
            let entry = entry_lock.read().await;
            if !entry.arisan.is_organizer(caller) {
                return Err(GatewayError::UnauthorizedToDelete(id));
            }
            entry.arisan.clone()
        };
        *slot = None;
        drop(slots);

        let subscription_id = arisan.randomness().subscription_id;
        if let Err(err) = gateway.remove_consumer(subscription_id, id) {
            tracing::warn!(arisan_id = %id, %subscription_id, error = %err, "failed to revoke vrf consumer");
        }
        Ok(arisan)
    }

    /// Returns summaries of all live arisans in id order.
    pub async fn list(&self) -> Vec<ArisanSummary> {
        let live: Vec<Arc<RwLock<ArisanEntry>>> = {
            let slots = self.slots.read().await;
            slots.iter().flatten().map(Arc::clone).collect()
        };
        let mut summaries = Vec::with_capacity(live.len());
        for entry_lock in live {
            let entry = entry_lock.read().await;
            summaries.push(ArisanSummary::from(&*entry));
        }
        summaries
    }

    /// Returns snapshots of all live arisans in id order.
    pub async fn snapshot_all(&self) -> Vec<ArisanSnapshot> {
        let live: Vec<Arc<RwLock<ArisanEntry>>> = {
            let slots = self.slots.read().await;
            slots.iter().flatten().map(Arc::clone).collect()
        };
        let mut snapshots = Vec::with_capacity(live.len());
        for entry_lock in live {
            snapshots.push(entry_lock.read().await.snapshot());
        }
        snapshots
    }

    /// Returns the number of live arisans.
    pub async fn count(&self) -> usize {
        self.slots.read().await.iter().flatten().count()
    }

    /// Returns `true` if no arisan is live.
    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }

    /// Returns the id the next created arisan will receive.
    pub async fn next_id(&self) -> ArisanId {
        ArisanId::new(self.slots.read().await.len() as u64)
    }

    /// Rebuilds an empty registry from persisted snapshots.
    ///
    /// Slots below `next_id` without a live arisan become tombstones, so
    /// ids of deleted arisans stay retired. Returns the number of
    /// restored arisans.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the registry is not empty,
    /// an id repeats, or an id is not below `next_id`.
    pub async fn restore(
        &self,
        snapshots: Vec<ArisanSnapshot>,
        next_id: ArisanId,
    ) -> Result<usize, GatewayError> {
        let mut slots = self.slots.write().await;
        if !slots.is_empty() {
            return Err(GatewayError::Internal(
                "cannot restore into a non-empty registry".to_string(),
            ));
        }
        let len = usize::try_from(next_id.get())
            .map_err(|_| GatewayError::Internal(format!("next id {next_id} out of range")))?;
        let mut rebuilt: Vec<Slot> = vec![None; len];

        let restored = snapshots.len();
        for snapshot in snapshots {
            let id = snapshot.arisan.id();
            let slot = usize::try_from(id.get())
                .ok()
                .and_then(|idx| rebuilt.get_mut(idx))
                .ok_or_else(|| {
                    GatewayError::Internal(format!("restored arisan {id} is not below {next_id}"))
                })?;
            if slot.is_some() {
                return Err(GatewayError::Internal(format!(
                    "arisan {id} restored twice"
                )));
            }
            *slot = Some(Arc::new(RwLock::new(ArisanEntry::from_snapshot(snapshot))));
        }

        *slots = rebuilt;
        Ok(restored)
    }
}

impl Default for ArisanRegistry {
    fn default() -> Self {
        Self::new()
    }
}
