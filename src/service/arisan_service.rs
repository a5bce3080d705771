//! Arisan service: orchestrates arisan operations and emits events.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    Amount, Arisan, ArisanEvent, ArisanId, ArisanRegistry, ArisanSnapshot, ArisanSummary,
    EventBus, Identity, Payout, PayoutLedger,
};
use crate::error::GatewayError;
use crate::randomness::{Fulfillment, RandomnessConfig, RandomnessGateway, RequestId};

/// Orchestration layer for all arisan operations.
///
/// Owns references to [`ArisanRegistry`] for state, the
/// [`RandomnessGateway`] that issues draws, the [`PayoutLedger`] that
/// receives disbursed pots, and [`EventBus`] for event emission. Every
/// mutation method follows the pattern: acquire lock → call the state
/// machine → update metadata → emit event → return result.
#[derive(Debug, Clone)]
pub struct ArisanService {
    registry: Arc<ArisanRegistry>,
    event_bus: EventBus,
    gateway: Arc<dyn RandomnessGateway>,
    payouts: Arc<PayoutLedger>,
    default_randomness: RandomnessConfig,
}

impl ArisanService {
    /// Creates a new `ArisanService`.
    ///
    /// `default_randomness` is used for arisans created without explicit
    /// randomness coordinates.
    #[must_use]
    pub fn new(
        registry: Arc<ArisanRegistry>,
        event_bus: EventBus,
        gateway: Arc<dyn RandomnessGateway>,
        payouts: Arc<PayoutLedger>,
        default_randomness: RandomnessConfig,
    ) -> Self {
        Self {
            registry,
            event_bus,
            gateway,
            payouts,
            default_randomness,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`ArisanRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ArisanRegistry> {
        &self.registry
    }

    /// Returns the randomness coordinates applied when none are given.
    #[must_use]
    pub fn default_randomness(&self) -> &RandomnessConfig {
        &self.default_randomness
    }

    /// Creates a new arisan organized by `organizer`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfiguration`] for a zero payment
    /// amount or capacity, or any error from registering the arisan as a
    /// randomness consumer.
    pub async fn create_arisan(
        &self,
        organizer: Identity,
        payment_amount: Amount,
        max_participants: u32,
        randomness: Option<RandomnessConfig>,
    ) -> Result<ArisanId, GatewayError> {
        let randomness = randomness.unwrap_or_else(|| self.default_randomness.clone());
        let subscription_id = randomness.subscription_id;

        let arisan_id = self
            .registry
            .create(
                organizer.clone(),
                randomness,
                payment_amount,
                max_participants,
                self.gateway.as_ref(),
            )
            .await?;

        let _ = self.event_bus.publish(ArisanEvent::ArisanCreated {
            arisan_id,
            organizer: organizer.clone(),
            payment_amount,
            max_participants,
            subscription_id,
            timestamp: Utc::now(),
        });

        tracing::info!(%arisan_id, %organizer, %payment_amount, max_participants, "arisan created");
        Ok(arisan_id)
    }

    /// Deletes an arisan on behalf of its organizer.
    ///
    /// Returns the final state of the deleted arisan.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] or
    /// [`GatewayError::UnauthorizedToDelete`].
    pub async fn delete_arisan(
        &self,
        caller: &Identity,
        arisan_id: ArisanId,
    ) -> Result<Arisan, GatewayError> {
        let arisan = self
            .registry
            .delete(caller, arisan_id, self.gateway.as_ref())
            .await?;

        let _ = self.event_bus.publish(ArisanEvent::ArisanDeleted {
            arisan_id,
            deleted_by: caller.clone(),
            stranded_pot: arisan.pot(),
            timestamp: Utc::now(),
        });

        if !arisan.pot().is_zero() {
            tracing::warn!(%arisan_id, pot = %arisan.pot(), "arisan deleted with undisbursed pot");
        }
        tracing::info!(%arisan_id, %caller, "arisan deleted");
        Ok(arisan)
    }

    /// Adds `caller` to the arisan. Returns the new participant count.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`], [`GatewayError::Closed`],
    /// [`GatewayError::Full`] or [`GatewayError::AlreadyJoined`].
    pub async fn join(&self, caller: &Identity, arisan_id: ArisanId) -> Result<usize, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let mut entry = entry_lock.write().await;

        let participant_count = entry.arisan.join(caller)?;
        entry.touch();
        drop(entry);

        let _ = self.event_bus.publish(ArisanEvent::ParticipantJoined {
            arisan_id,
            participant: caller.clone(),
            participant_count,
            timestamp: Utc::now(),
        });

        tracing::info!(%arisan_id, %caller, participant_count, "participant joined");
        Ok(participant_count)
    }

    /// Records `caller`'s contribution for the current round. Returns the
    /// pot after the contribution.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`],
    /// [`GatewayError::NotAParticipant`],
    /// [`GatewayError::InvalidPaymentAmount`] or
    /// [`GatewayError::AlreadyPaid`].
    pub async fn pay(
        &self,
        caller: &Identity,
        arisan_id: ArisanId,
        amount: Amount,
    ) -> Result<Amount, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let mut entry = entry_lock.write().await;

        let pot = entry.arisan.pay(caller, amount)?;
        entry.contribution_count = entry.contribution_count.saturating_add(1);
        entry.touch();
        drop(entry);

        let _ = self.event_bus.publish(ArisanEvent::PaymentReceived {
            arisan_id,
            participant: caller.clone(),
            amount,
            pot,
            timestamp: Utc::now(),
        });

        tracing::info!(%arisan_id, %caller, %amount, %pot, "payment received");
        Ok(pot)
    }

    /// Closes the arisan to new participants. Returns `true` if the status
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] or
    /// [`GatewayError::Unauthorized`].
    pub async fn close(&self, caller: &Identity, arisan_id: ArisanId) -> Result<bool, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let mut entry = entry_lock.write().await;

        let changed = entry.arisan.close(caller)?;
        if changed {
            entry.touch();
        }
        drop(entry);

        if changed {
            let _ = self.event_bus.publish(ArisanEvent::ArisanClosed {
                arisan_id,
                timestamp: Utc::now(),
            });
            tracing::info!(%arisan_id, "arisan closed");
        }
        Ok(changed)
    }

    /// Requests randomness for the next draw. Returns the request handle
    /// without waiting for fulfillment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`],
    /// [`GatewayError::Unauthorized`],
    /// [`GatewayError::RequestAlreadyInFlight`],
    /// [`GatewayError::NoParticipants`] or any gateway error.
    pub async fn request_winner(
        &self,
        caller: &Identity,
        arisan_id: ArisanId,
    ) -> Result<RequestId, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let mut entry = entry_lock.write().await;

        let request_id = entry.arisan.request_winner(caller, self.gateway.as_ref())?;
        let roster_size = entry.arisan.participant_count();
        entry.touch();
        drop(entry);

        let _ = self.event_bus.publish(ArisanEvent::RandomWordsRequested {
            arisan_id,
            request_id,
            roster_size,
            timestamp: Utc::now(),
        });

        tracing::info!(%arisan_id, %request_id, roster_size, "random words requested");
        Ok(request_id)
    }

    /// Delivers a gateway fulfillment to its consumer arisan.
    ///
    /// On success the winner is drawn, the pot is credited to the winner
    /// in the payout ledger, and the payout is returned. A rejected
    /// fulfillment leaves the arisan untouched and emits a
    /// `fulfillment_rejected` event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if the consumer no longer
    /// exists, [`GatewayError::UnknownRandomnessRequest`] or
    /// [`GatewayError::EmptyRandomWords`] if the arisan rejects it, or
    /// [`GatewayError::Internal`] if the payout cannot be credited. On
    /// any error the arisan keeps its pot and outstanding request.
    pub async fn fulfill_randomness(&self, fulfillment: Fulfillment) -> Result<Payout, GatewayError> {
        let Fulfillment {
            request_id,
            consumer: arisan_id,
            random_words,
        } = fulfillment;

        let entry_lock = self.registry.get(arisan_id).await?;
        let mut entry = entry_lock.write().await;

        // The draw runs on a copy; the entry changes only once the winner
        // has been credited.
        let mut next = entry.arisan.clone();
        let payout = match next.fulfill_random_words(request_id, &random_words) {
            Ok(payout) => payout,
            Err(err) => {
                drop(entry);
                let _ = self.event_bus.publish(ArisanEvent::FulfillmentRejected {
                    arisan_id,
                    request_id,
                    reason: err.to_string(),
                    timestamp: Utc::now(),
                });
                tracing::warn!(%arisan_id, %request_id, error = %err, "fulfillment rejected");
                return Err(err);
            }
        };
        let credited = match entry.total_disbursed.checked_add(payout.amount) {
            Some(total) => self.payouts.credit(&payout).await.map(|balance| (total, balance)),
            None => Err(GatewayError::Internal(format!(
                "total disbursed overflow in arisan {arisan_id}"
            ))),
        };
        let (total_disbursed, balance) = match credited {
            Ok(credited) => credited,
            Err(err) => {
                tracing::error!(%arisan_id, %request_id, error = %err, "payout not credited; draw left pending");
                return Err(err);
            }
        };
        entry.arisan = next;
        entry.total_disbursed = total_disbursed;
        entry.touch();
        drop(entry);

        let _ = self.event_bus.publish(ArisanEvent::WinnerSelected {
            arisan_id,
            request_id,
            round: payout.round,
            winner: payout.winner.clone(),
            winner_index: payout.winner_index,
            participant_count: payout.participant_count,
            amount: payout.amount,
            timestamp: Utc::now(),
        });

        tracing::info!(
            %arisan_id,
            %request_id,
            round = payout.round,
            winner = %payout.winner,
            amount = %payout.amount,
            %balance,
            "winner selected"
        );
        Ok(payout)
    }

    /// Returns a snapshot of one arisan with its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if no live arisan has
    /// this id.
    pub async fn get_arisan(&self, arisan_id: ArisanId) -> Result<ArisanSnapshot, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let entry = entry_lock.read().await;
        Ok(entry.snapshot())
    }

    /// Returns the participants of an arisan in join order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if no live arisan has
    /// this id.
    pub async fn participants(&self, arisan_id: ArisanId) -> Result<Vec<Identity>, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let entry = entry_lock.read().await;
        Ok(entry.arisan.participants().to_vec())
    }

    /// Returns whether `identity` has paid in the current round.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if no live arisan has
    /// this id.
    pub async fn has_paid(
        &self,
        arisan_id: ArisanId,
        identity: &Identity,
    ) -> Result<bool, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let entry = entry_lock.read().await;
        Ok(entry.arisan.has_paid(identity))
    }

    /// Returns the winners of all completed rounds, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ArisanNotFound`] if no live arisan has
    /// this id.
    pub async fn winner_history(&self, arisan_id: ArisanId) -> Result<Vec<Identity>, GatewayError> {
        let entry_lock = self.registry.get(arisan_id).await?;
        let entry = entry_lock.read().await;
        Ok(entry.arisan.winner_history().to_vec())
    }

    /// Returns summaries of all live arisans, optionally only those
    /// organized by `organizer`.
    pub async fn list_arisans(&self, organizer: Option<&Identity>) -> Vec<ArisanSummary> {
        let mut summaries = self.registry.list().await;
        if let Some(organizer) = organizer {
            summaries.retain(|s| &s.organizer == organizer);
        }
        summaries
    }

    /// Returns the number of live arisans.
    pub async fn count(&self) -> usize {
        self.registry.count().await
    }

    /// Returns the total credited to `identity` and its payouts.
    pub async fn payouts_of(&self, identity: &Identity) -> (Amount, Vec<Payout>) {
        let balance = self.payouts.balance_of(identity).await;
        let payouts = self.payouts.payouts_of(identity).await;
        (balance, payouts)
    }

    /// Returns the payout ledger.
    #[must_use]
    pub fn payout_ledger(&self) -> &Arc<PayoutLedger> {
        &self.payouts
    }
}
