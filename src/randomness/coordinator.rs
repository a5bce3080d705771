//! In-process VRF coordinator.
//!
//! [`LocalVrfCoordinator`] models a subscription-based VRF coordinator:
//! subscriptions hold a balance and a set of authorized consumers,
//! requests get sequential handles, and each fulfillment charges a flat
//! base fee. A subscription created on behalf of a caller is owned by
//! that caller, and only the owner may attach consumers to it;
//! subscriptions registered by the operator are shared. Random words are derived as
//! `SHA-256(seed || request_id || word_index)`, so a coordinator built
//! from a known seed replays the same words.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use super::{
    Fulfillment, PendingRequest, RandomWord, RandomnessGateway, RandomnessRequest, RequestId,
    SubscriptionId,
};
use crate::domain::{Amount, ArisanId, Identity};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct Subscription {
    owner: Option<Identity>,
    balance: Amount,
    consumers: BTreeSet<ArisanId>,
}

#[derive(Debug)]
struct CoordinatorState {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    pending: BTreeMap<RequestId, PendingRequest>,
    last_request_id: u64,
    last_subscription_id: u64,
}

/// Read-only view of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    /// Subscription identifier.
    pub subscription_id: SubscriptionId,
    /// Identity allowed to add consumers; `None` for shared subscriptions.
    pub owner: Option<Identity>,
    /// Remaining balance.
    pub balance: Amount,
    /// Authorized consumers, ascending.
    pub consumers: Vec<ArisanId>,
}

/// Subscription-based VRF coordinator running inside the gateway.
///
/// Every accepted request id is announced on the channel returned by
/// [`LocalVrfCoordinator::new`]; the fulfillment task listens on it.
#[derive(Debug)]
pub struct LocalVrfCoordinator {
    state: Mutex<CoordinatorState>,
    base_fee: Amount,
    seed: [u8; 32],
    announcer: mpsc::UnboundedSender<RequestId>,
}

impl LocalVrfCoordinator {
    /// Creates a coordinator with the given per-fulfillment fee and seed.
    ///
    /// Returns the coordinator and the receiver on which new request ids
    /// are announced.
    #[must_use]
    pub fn new(base_fee: Amount, seed: [u8; 32]) -> (Self, mpsc::UnboundedReceiver<RequestId>) {
        let (announcer, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            state: Mutex::new(CoordinatorState {
                subscriptions: BTreeMap::new(),
                pending: BTreeMap::new(),
                last_request_id: 0,
                last_subscription_id: 0,
            }),
            base_fee,
            seed,
            announcer,
        };
        (coordinator, rx)
    }

    /// Creates a coordinator seeded from the operating system RNG.
    #[must_use]
    pub fn with_random_seed(base_fee: Amount) -> (Self, mpsc::UnboundedReceiver<RequestId>) {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::new(base_fee, seed)
    }

    /// Returns the flat fee charged per fulfillment.
    #[must_use]
    pub const fn base_fee(&self) -> Amount {
        self.base_fee
    }

    fn lock(&self) -> Result<MutexGuard<'_, CoordinatorState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Internal("coordinator state poisoned".to_string()))
    }

    /// Creates an empty subscription with the next free identifier.
    ///
    /// With an `owner`, only that identity may add consumers; without
    /// one the subscription is shared.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the coordinator lock is
    /// poisoned.
    pub fn create_subscription(
        &self,
        owner: Option<Identity>,
    ) -> Result<SubscriptionId, GatewayError> {
        let mut state = self.lock()?;
        let mut next = state.last_subscription_id.saturating_add(1);
        while state.subscriptions.contains_key(&SubscriptionId::new(next)) {
            next = next.saturating_add(1);
        }
        state.last_subscription_id = next;
        let id = SubscriptionId::new(next);
        let shared = owner.is_none();
        state.subscriptions.insert(
            id,
            Subscription {
                owner,
                ..Subscription::default()
            },
        );
        tracing::info!(subscription_id = %id, shared, "vrf subscription created");
        Ok(id)
    }

    /// Creates the shared subscription `id` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the coordinator lock is
    /// poisoned.
    pub fn ensure_subscription(&self, id: SubscriptionId) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        if !state.subscriptions.contains_key(&id) {
            state.subscriptions.insert(id, Subscription::default());
            state.last_subscription_id = state.last_subscription_id.max(id.get());
            tracing::info!(subscription_id = %id, "vrf subscription registered");
        }
        Ok(())
    }

    /// Adds `amount` to a subscription balance, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionNotFound`] for unknown
    /// subscriptions and [`GatewayError::InvalidRequest`] on overflow.
    pub fn fund_subscription(
        &self,
        id: SubscriptionId,
        amount: Amount,
    ) -> Result<Amount, GatewayError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get_mut(&id)
            .ok_or(GatewayError::SubscriptionNotFound(id))?;
        sub.balance = sub
            .balance
            .checked_add(amount)
            .ok_or_else(|| GatewayError::InvalidRequest("subscription balance overflow".to_string()))?;
        tracing::debug!(subscription_id = %id, balance = %sub.balance, "vrf subscription funded");
        Ok(sub.balance)
    }

    /// Returns a snapshot of a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionNotFound`] for unknown
    /// subscriptions.
    pub fn subscription(&self, id: SubscriptionId) -> Result<SubscriptionView, GatewayError> {
        let state = self.lock()?;
        let sub = state
            .subscriptions
            .get(&id)
            .ok_or(GatewayError::SubscriptionNotFound(id))?;
        Ok(SubscriptionView {
            subscription_id: id,
            owner: sub.owner.clone(),
            balance: sub.balance,
            consumers: sub.consumers.iter().copied().collect(),
        })
    }

    /// Lists requests that have been accepted but not fulfilled, oldest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the coordinator lock is
    /// poisoned.
    pub fn pending_requests(&self) -> Result<Vec<PendingRequest>, GatewayError> {
        Ok(self.lock()?.pending.values().cloned().collect())
    }

    /// Makes sure future request ids are strictly greater than `floor`.
    ///
    /// Used after restoring arisans whose in-flight request ids were
    /// issued by a previous process.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the coordinator lock is
    /// poisoned.
    pub fn reserve_request_ids_through(&self, floor: RequestId) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        state.last_request_id = state.last_request_id.max(floor.get());
        Ok(())
    }

    /// Re-registers a request issued by a previous process.
    ///
    /// The request keeps its original id and timestamp and is announced
    /// again so the fulfillment task picks it up.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionNotFound`] if the request's
    /// subscription does not exist, or [`GatewayError::Internal`] if the
    /// id is already pending.
    pub fn resume_request(&self, pending: PendingRequest) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let request_id = pending.request_id;
        let subscription_id = pending.request.subscription_id;
        if !state.subscriptions.contains_key(&subscription_id) {
            return Err(GatewayError::SubscriptionNotFound(subscription_id));
        }
        if state.pending.contains_key(&request_id) {
            return Err(GatewayError::Internal(format!(
                "request {request_id} is already pending"
            )));
        }
        state.last_request_id = state.last_request_id.max(request_id.get());
        state.pending.insert(request_id, pending);
        drop(state);

        if self.announcer.send(request_id).is_err() {
            tracing::debug!(%request_id, "no fulfillment task listening; resumed request awaits manual fulfillment");
        }
        tracing::info!(%request_id, "vrf request resumed");
        Ok(())
    }

    /// Answers a pending request.
    ///
    /// Removes the request, charges the base fee to its subscription and
    /// derives the requested number of words. If the subscription cannot
    /// pay, the request stays pending.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RandomnessRequestNotFound`] if the id is not
    /// pending, or [`GatewayError::InsufficientSubscriptionBalance`] if the
    /// subscription cannot pay the fee.
    pub fn fulfill(&self, request_id: RequestId) -> Result<Fulfillment, GatewayError> {
        let mut state = self.lock()?;
        let pending = state
            .pending
            .get(&request_id)
            .cloned()
            .ok_or(GatewayError::RandomnessRequestNotFound(request_id))?;
        let subscription_id = pending.request.subscription_id;

        let sub = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(GatewayError::SubscriptionNotFound(subscription_id))?;
        sub.balance = sub.balance.checked_sub(self.base_fee).ok_or(
            GatewayError::InsufficientSubscriptionBalance(subscription_id),
        )?;
        state.pending.remove(&request_id);
        drop(state);

        let random_words = (0..pending.request.num_words)
            .map(|index| self.derive_word(request_id, index))
            .collect();

        tracing::info!(%request_id, consumer = %pending.request.consumer, "vrf request fulfilled");
        Ok(Fulfillment {
            request_id,
            consumer: pending.request.consumer,
            random_words,
        })
    }

    fn derive_word(&self, request_id: RequestId, index: u32) -> RandomWord {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(request_id.get().to_be_bytes());
        hasher.update(index.to_be_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        RandomWord::from_bytes(bytes)
    }
}

impl RandomnessGateway for LocalVrfCoordinator {
    fn add_consumer(
        &self,
        subscription_id: SubscriptionId,
        requester: &Identity,
        consumer: ArisanId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(GatewayError::SubscriptionNotFound(subscription_id))?;
        if sub.owner.as_ref().is_some_and(|owner| owner != requester) {
            return Err(GatewayError::SubscriptionNotOwned(subscription_id));
        }
        sub.consumers.insert(consumer);
        tracing::debug!(%subscription_id, %consumer, "vrf consumer added");
        Ok(())
    }

    fn remove_consumer(
        &self,
        subscription_id: SubscriptionId,
        consumer: ArisanId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(GatewayError::SubscriptionNotFound(subscription_id))?;
        sub.consumers.remove(&consumer);
        tracing::debug!(%subscription_id, %consumer, "vrf consumer removed");
        Ok(())
    }

    fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId, GatewayError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get(&request.subscription_id)
            .ok_or(GatewayError::SubscriptionNotFound(request.subscription_id))?;
        if !sub.consumers.contains(&request.consumer) {
            return Err(GatewayError::InvalidConsumer {
                consumer: request.consumer,
                subscription_id: request.subscription_id,
            });
        }
        if sub.balance < self.base_fee {
            return Err(GatewayError::InsufficientSubscriptionBalance(
                request.subscription_id,
            ));
        }

        state.last_request_id = state.last_request_id.saturating_add(1);
        let request_id = RequestId::new(state.last_request_id);
        let consumer = request.consumer;
        state.pending.insert(
            request_id,
            PendingRequest {
                request_id,
                request,
                requested_at: Utc::now(),
            },
        );
        drop(state);

        if self.announcer.send(request_id).is_err() {
            tracing::debug!(%request_id, "no fulfillment task listening; request awaits manual fulfillment");
        }
        tracing::info!(%request_id, %consumer, "vrf request accepted");
        Ok(request_id)
    }
}
