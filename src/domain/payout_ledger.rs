//! Credits disbursed to draw winners.
//!
//! When a draw completes, the pot leaves the arisan and is credited here
//! to the winner's identity. The ledger keeps the running balance per
//! identity plus the full list of payouts in the order they happened.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::arisan::Payout;
use super::{Amount, Identity};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Identity, Amount>,
    history: Vec<Payout>,
}

/// Running credit balances of draw winners.
#[derive(Debug, Default)]
pub struct PayoutLedger {
    state: RwLock<LedgerState>,
}

impl PayoutLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits a completed draw to its winner and returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the balance would overflow.
    pub async fn credit(&self, payout: &Payout) -> Result<Amount, GatewayError> {
        let mut state = self.state.write().await;
        let current = state
            .balances
            .get(&payout.winner)
            .copied()
            .unwrap_or(Amount::ZERO);
        let updated = current.checked_add(payout.amount).ok_or_else(|| {
            GatewayError::Internal(format!("payout balance overflow for {}", payout.winner))
        })?;
        state.balances.insert(payout.winner.clone(), updated);
        state.history.push(payout.clone());
        Ok(updated)
    }

    /// Returns the total credited to `identity`.
    pub async fn balance_of(&self, identity: &Identity) -> Amount {
        self.state
            .read()
            .await
            .balances
            .get(identity)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Returns every payout credited to `identity`, oldest first.
    pub async fn payouts_of(&self, identity: &Identity) -> Vec<Payout> {
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|p| &p.winner == identity)
            .cloned()
            .collect()
    }

    /// Returns every payout recorded, oldest first.
    pub async fn entries(&self) -> Vec<Payout> {
        self.state.read().await.history.clone()
    }

    /// Returns the number of payouts recorded.
    pub async fn len(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// Returns `true` if no payout was ever credited.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ArisanId;
    use crate::randomness::RequestId;

    fn ident(name: &str) -> Identity {
        let Ok(id) = Identity::parse(name) else {
            panic!("valid identity");
        };
        id
    }

    fn payout(winner: &str, wei: u128, round: u64) -> Payout {
        Payout {
            arisan_id: ArisanId::new(0),
            round,
            request_id: RequestId::new(round),
            winner_index: 0,
            participant_count: 2,
            winner: ident(winner),
            amount: Amount::from_wei(wei),
        }
    }

    #[tokio::test]
    async fn credits_accumulate_per_winner() {
        let ledger = PayoutLedger::new();
        assert!(ledger.is_empty().await);

        assert_eq!(ledger.credit(&payout("alice", 40, 1)).await.ok(), Some(Amount::from_wei(40)));
        assert_eq!(ledger.credit(&payout("bob", 10, 2)).await.ok(), Some(Amount::from_wei(10)));
        assert_eq!(ledger.credit(&payout("alice", 5, 3)).await.ok(), Some(Amount::from_wei(45)));

        assert_eq!(ledger.balance_of(&ident("alice")).await, Amount::from_wei(45));
        assert_eq!(ledger.balance_of(&ident("carol")).await, Amount::ZERO);
        assert_eq!(ledger.len().await, 3);
        assert_eq!(ledger.entries().await.len(), 3);

        let rounds: Vec<u64> = ledger
            .payouts_of(&ident("alice"))
            .await
            .iter()
            .map(|p| p.round)
            .collect();
        assert_eq!(rounds, vec![1, 3]);
    }

    #[tokio::test]
    async fn overflow_is_rejected_without_recording() {
        let ledger = PayoutLedger::new();
        assert!(ledger.credit(&payout("alice", u128::MAX, 1)).await.is_ok());
        let overflow = ledger.credit(&payout("alice", 1, 2)).await;
        assert!(matches!(overflow, Err(GatewayError::Internal(_))));
        assert_eq!(ledger.len().await, 1);
    }
}
