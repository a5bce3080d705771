//! Randomness coordinator and payout DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::{AmountDto, AmountInput};
use crate::domain::{Amount, Identity, Payout};
use crate::randomness::{PendingRequest, SubscriptionView};

/// One outstanding request held by the coordinator.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingRequestDto {
    /// Request handle.
    pub request_id: u64,
    /// Arisan that issued the request.
    pub consumer: u64,
    /// Subscription charged on fulfillment.
    pub subscription_id: u64,
    /// Gas lane key hash.
    pub key_hash: String,
    /// Confirmations to wait before fulfilling.
    pub request_confirmations: u16,
    /// Gas limit of the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Words to deliver.
    pub num_words: u32,
    /// When the request was accepted.
    pub requested_at: DateTime<Utc>,
}

impl From<PendingRequest> for PendingRequestDto {
    fn from(p: PendingRequest) -> Self {
        Self {
            request_id: p.request_id.get(),
            consumer: p.request.consumer.get(),
            subscription_id: p.request.subscription_id.get(),
            key_hash: p.request.key_hash,
            request_confirmations: p.request.request_confirmations,
            callback_gas_limit: p.request.callback_gas_limit,
            num_words: p.request.num_words,
            requested_at: p.requested_at,
        }
    }
}

/// Response body for `GET /randomness/requests`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingRequestsResponse {
    /// Outstanding requests in id order.
    pub data: Vec<PendingRequestDto>,
}

/// Completed draw as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutDto {
    /// Arisan the pot came from.
    pub arisan_id: u64,
    /// Completed round (1-based).
    pub round: u64,
    /// Request whose randomness decided the draw.
    pub request_id: u64,
    /// Winning participant.
    pub winner: String,
    /// Position of the winner in the draw roster.
    pub winner_index: usize,
    /// Size of the draw roster.
    pub participant_count: usize,
    /// Disbursed pot.
    pub amount: AmountDto,
}

impl From<Payout> for PayoutDto {
    fn from(p: Payout) -> Self {
        Self {
            arisan_id: p.arisan_id.get(),
            round: p.round,
            request_id: p.request_id.get(),
            winner: p.winner.to_string(),
            winner_index: p.winner_index,
            participant_count: p.participant_count,
            amount: p.amount.into(),
        }
    }
}

/// Request body for `POST /randomness/subscriptions/{id}/fund`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FundSubscriptionRequest {
    /// Amount added to the balance.
    pub amount: AmountInput,
}

/// Subscription as returned by the randomness routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    /// Subscription identifier.
    pub subscription_id: u64,
    /// Identity allowed to add consumers; absent for shared subscriptions.
    pub owner: Option<String>,
    /// Remaining balance.
    pub balance: AmountDto,
    /// Authorized consumer arisans, ascending.
    pub consumers: Vec<u64>,
}

impl From<SubscriptionView> for SubscriptionResponse {
    fn from(view: SubscriptionView) -> Self {
        Self {
            subscription_id: view.subscription_id.get(),
            owner: view.owner.as_ref().map(ToString::to_string),
            balance: view.balance.into(),
            consumers: view.consumers.iter().map(|c| c.get()).collect(),
        }
    }
}

/// Response body for `GET /payouts/{identity}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutBalanceResponse {
    /// Identity queried.
    pub identity: String,
    /// Total credited.
    pub balance: AmountDto,
    /// Credited payouts, oldest first.
    pub payouts: Vec<PayoutDto>,
}

impl PayoutBalanceResponse {
    /// Builds the response from a ledger read.
    #[must_use]
    pub fn new(identity: &Identity, balance: Amount, payouts: Vec<Payout>) -> Self {
        Self {
            identity: identity.to_string(),
            balance: balance.into(),
            payouts: payouts.into_iter().map(PayoutDto::from).collect(),
        }
    }
}
