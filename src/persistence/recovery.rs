//! Startup recovery from the snapshot table and the event log.
//!
//! Rebuilds the registry from the latest snapshot of every arisan,
//! re-registers restored arisans as consumers of their subscriptions,
//! resumes draws that were waiting for randomness and replays
//! `winner_selected` events into the payout ledger.

use std::sync::Arc;

use chrono::Utc;

use super::models::RestoredRegistry;
use super::postgres::PostgresPersistence;
use crate::domain::{ArisanEvent, ArisanId, ArisanRegistry, Payout, PayoutLedger};
use crate::error::GatewayError;
use crate::randomness::{
    LocalVrfCoordinator, PendingRequest, RandomnessGateway, RandomnessRequest, RequestId,
};

/// Counts reported after a successful recovery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    /// Live arisans put back into the registry.
    pub arisans: usize,
    /// Draws handed back to the coordinator.
    pub resumed_requests: usize,
    /// Payouts replayed into the ledger.
    pub payouts: usize,
    /// Arisans whose snapshot still awaited a draw the event log shows
    /// as completed. Their stored snapshot is stale and must be
    /// rewritten.
    pub settled_draws: Vec<ArisanId>,
}

/// Loads persisted state and applies it to empty in-memory components.
///
/// # Errors
///
/// Returns a [`GatewayError::PersistenceError`] on database failure, or
/// any error [`apply_recovery`] returns.
pub async fn recover(
    persistence: &PostgresPersistence,
    registry: &ArisanRegistry,
    payouts: &PayoutLedger,
    coordinator: &Arc<LocalVrfCoordinator>,
) -> Result<RecoveryReport, GatewayError> {
    let rows = persistence.load_latest_snapshots().await?;
    let restored = RestoredRegistry::from_rows(&rows)?;
    let winner_events = persistence.load_winner_events().await?;
    apply_recovery(restored, &winner_events, registry, payouts, coordinator).await
}

/// Applies already-loaded state.
///
/// A snapshot may be older than the event log: it can still hold the
/// outstanding request of a draw whose `winner_selected` event was
/// recorded. Such a draw is settled from the recorded payout instead of
/// being resumed, so its pot is credited exactly once.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the registry is not empty or the
/// snapshots disagree with the event log, or a coordinator error if a
/// subscription cannot be prepared.
pub async fn apply_recovery(
    mut restored: RestoredRegistry,
    winner_events: &[ArisanEvent],
    registry: &ArisanRegistry,
    payouts: &PayoutLedger,
    coordinator: &Arc<LocalVrfCoordinator>,
) -> Result<RecoveryReport, GatewayError> {
    let recorded: Vec<Payout> = winner_events.iter().filter_map(ArisanEvent::payout).collect();
    let mut resumed = Vec::new();
    let mut settled_draws = Vec::new();
    let mut highest_request = RequestId::new(0);

    for snapshot in &mut restored.snapshots {
        let arisan_id = snapshot.arisan.id();
        let subscription_id = snapshot.arisan.randomness().subscription_id;
        coordinator.ensure_subscription(subscription_id)?;
        coordinator.add_consumer(subscription_id, snapshot.arisan.organizer(), arisan_id)?;

        let Some(draw) = snapshot.arisan.active_request() else {
            continue;
        };
        let request_id = draw.request_id;
        let requested_at = draw.requested_at;
        highest_request = highest_request.max(request_id);

        match recorded
            .iter()
            .find(|p| p.arisan_id == arisan_id && p.request_id == request_id)
        {
            Some(payout) => {
                snapshot.arisan.apply_recorded_payout(payout)?;
                snapshot.total_disbursed = snapshot
                    .total_disbursed
                    .checked_add(payout.amount)
                    .ok_or_else(|| {
                        GatewayError::Internal(format!(
                            "total disbursed overflow in arisan {arisan_id}"
                        ))
                    })?;
                snapshot.last_modified_at = Utc::now();
                tracing::warn!(
                    %arisan_id,
                    %request_id,
                    "snapshot predates its recorded winner; draw settled from the event log"
                );
                settled_draws.push(arisan_id);
            }
            None => resumed.push(PendingRequest {
                request_id,
                request: RandomnessRequest::for_consumer(arisan_id, snapshot.arisan.randomness()),
                requested_at,
            }),
        }
    }

    let arisans = registry
        .restore(restored.snapshots, restored.next_id)
        .await?;

    for payout in &recorded {
        highest_request = highest_request.max(payout.request_id);
        payouts.credit(payout).await?;
    }

    coordinator.reserve_request_ids_through(highest_request)?;
    let resumed_requests = resumed.len();
    for pending in resumed {
        coordinator.resume_request(pending)?;
    }

    let report = RecoveryReport {
        arisans,
        resumed_requests,
        payouts: recorded.len(),
        settled_draws,
    };
    tracing::info!(
        arisans = report.arisans,
        resumed_requests = report.resumed_requests,
        payouts = report.payouts,
        settled_draws = report.settled_draws.len(),
        next_id = %restored.next_id,
        "state recovered"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Amount, ArisanSnapshot, EventBus, Identity};
    use crate::randomness::{RandomnessConfig, SubscriptionId};
    use crate::service::ArisanService;

    fn ident(name: &str) -> Identity {
        let Ok(id) = Identity::parse(name) else {
            panic!("valid identity");
        };
        id
    }

    fn randomness() -> RandomnessConfig {
        RandomnessConfig {
            coordinator: "local".to_string(),
            key_hash: format!("0x{}", "47".repeat(32)),
            subscription_id: SubscriptionId::new(5),
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            num_words: 1,
        }
    }

    fn coordinator() -> Arc<LocalVrfCoordinator> {
        let (coordinator, _rx) = LocalVrfCoordinator::new(Amount::from_wei(1), [9u8; 32]);
        let coordinator = Arc::new(coordinator);
        let sub = SubscriptionId::new(5);
        if coordinator.ensure_subscription(sub).is_err()
            || coordinator.fund_subscription(sub, Amount::from_wei(100)).is_err()
        {
            panic!("subscription setup failed");
        }
        coordinator
    }

    fn service(coordinator: &Arc<LocalVrfCoordinator>) -> ArisanService {
        ArisanService::new(
            Arc::new(ArisanRegistry::new()),
            EventBus::new(100),
            Arc::clone(coordinator) as Arc<dyn RandomnessGateway>,
            Arc::new(PayoutLedger::new()),
            randomness(),
        )
    }

    /// Builds a live service with one drawing arisan (id 1) after a
    /// deleted one (id 0), and returns what a previous process would
    /// have persisted.
    async fn persisted_state() -> (Vec<ArisanSnapshot>, ArisanId, Vec<ArisanEvent>) {
        let coordinator = coordinator();
        let service = service(&coordinator);
        let mut events = service.event_bus().subscribe();

        let Ok(first) = service
            .create_arisan(ident("org"), Amount::from_wei(5), 2, None)
            .await
        else {
            panic!("creation failed");
        };
        let Ok(second) = service
            .create_arisan(ident("org"), Amount::from_wei(5), 2, None)
            .await
        else {
            panic!("creation failed");
        };
        assert!(service.delete_arisan(&ident("org"), first).await.is_ok());
        for who in ["a", "b"] {
            assert!(service.join(&ident(who), second).await.is_ok());
            assert!(service.pay(&ident(who), second, Amount::from_wei(5)).await.is_ok());
        }
        let Ok(request_id) = service.request_winner(&ident("org"), second).await else {
            panic!("request failed");
        };
        let Ok(fulfillment) = coordinator.fulfill(request_id) else {
            panic!("fulfill failed");
        };
        assert!(service.fulfill_randomness(fulfillment).await.is_ok());
        for who in ["a", "b"] {
            assert!(service.pay(&ident(who), second, Amount::from_wei(5)).await.is_ok());
        }
        assert!(service.request_winner(&ident("org"), second).await.is_ok());

        let mut winners = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.payout().is_some() {
                winners.push(event);
            }
        }
        let snapshots = service.registry().snapshot_all().await;
        let next_id = service.registry().next_id().await;
        (snapshots, next_id, winners)
    }

    #[tokio::test]
    async fn recovery_restores_registry_ledger_and_pending_draws() {
        let (snapshots, next_id, winners) = persisted_state().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(winners.len(), 1);

        let coordinator = coordinator();
        let fresh = service(&coordinator);
        let restored = RestoredRegistry { snapshots, next_id };
        let Ok(report) = apply_recovery(
            restored,
            &winners,
            fresh.registry(),
            fresh.payout_ledger(),
            &coordinator,
        )
        .await
        else {
            panic!("recovery failed");
        };
        assert_eq!(
            report,
            RecoveryReport {
                arisans: 1,
                resumed_requests: 1,
                payouts: 1,
                settled_draws: Vec::new(),
            }
        );

        // Deleted id 0 stays retired.
        assert!(fresh.get_arisan(ArisanId::new(0)).await.is_err());
        assert_eq!(fresh.registry().next_id().await, ArisanId::new(2));
        assert_eq!(fresh.payout_ledger().len().await, 1);

        // The resumed draw can be answered by the new coordinator.
        let Ok(pending) = coordinator.pending_requests() else {
            panic!("pending lookup failed");
        };
        let Some(request) = pending.first() else {
            panic!("no resumed request");
        };
        let Ok(fulfillment) = coordinator.fulfill(request.request_id) else {
            panic!("fulfill failed");
        };
        let Ok(payout) = fresh.fulfill_randomness(fulfillment).await else {
            panic!("restored arisan rejected the words");
        };
        assert_eq!(payout.round, 2);
        assert_eq!(fresh.payout_ledger().len().await, 2);
    }

    #[tokio::test]
    async fn stale_snapshot_of_a_completed_draw_pays_out_once() {
        let live_coordinator = coordinator();
        let live = service(&live_coordinator);
        let mut events = live.event_bus().subscribe();
        let Ok(id) = live
            .create_arisan(ident("org"), Amount::from_wei(5), 2, None)
            .await
        else {
            panic!("creation failed");
        };
        for who in ["a", "b"] {
            assert!(live.join(&ident(who), id).await.is_ok());
            assert!(live.pay(&ident(who), id, Amount::from_wei(5)).await.is_ok());
        }
        let Ok(request_id) = live.request_winner(&ident("org"), id).await else {
            panic!("request failed");
        };
        // Last snapshot pass ran before the winner was drawn.
        let stale = live.registry().snapshot_all().await;
        let next_id = live.registry().next_id().await;
        let Ok(fulfillment) = live_coordinator.fulfill(request_id) else {
            panic!("fulfill failed");
        };
        let Ok(payout) = live.fulfill_randomness(fulfillment).await else {
            panic!("draw rejected");
        };
        let mut winners = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.payout().is_some() {
                winners.push(event);
            }
        }

        let coordinator = coordinator();
        let fresh = service(&coordinator);
        let restored = RestoredRegistry {
            snapshots: stale,
            next_id,
        };
        let Ok(report) = apply_recovery(
            restored,
            &winners,
            fresh.registry(),
            fresh.payout_ledger(),
            &coordinator,
        )
        .await
        else {
            panic!("recovery failed");
        };
        assert_eq!(report.resumed_requests, 0);
        assert_eq!(report.settled_draws, vec![id]);

        let Ok(pending) = coordinator.pending_requests() else {
            panic!("pending lookup failed");
        };
        assert!(pending.is_empty());

        let credited = fresh
            .payout_ledger()
            .entries()
            .await
            .iter()
            .fold(0u128, |sum, p| sum + p.amount.wei());
        assert_eq!(credited, payout.amount.wei());
        assert_eq!(payout.amount, Amount::from_wei(10));

        let Ok(state) = fresh.get_arisan(id).await else {
            panic!("arisan not restored");
        };
        assert_eq!(state.arisan.pot(), Amount::ZERO);
        assert_eq!(state.arisan.rounds_completed(), 1);
        assert!(state.arisan.active_request().is_none());
        assert_eq!(state.arisan.winner_history(), &[payout.winner.clone()]);
        assert_eq!(state.total_disbursed, payout.amount);
    }

    #[tokio::test]
    async fn recovery_refuses_a_populated_registry() {
        let coordinator = coordinator();
        let fresh = service(&coordinator);
        assert!(
            fresh
                .create_arisan(ident("org"), Amount::from_wei(5), 2, None)
                .await
                .is_ok()
        );
        let result = apply_recovery(
            RestoredRegistry::default(),
            &[],
            fresh.registry(),
            fresh.payout_ledger(),
            &coordinator,
        )
        .await;
        assert!(matches!(result, Err(GatewayError::Internal(_))));
    }
}
