//! Domain events reflecting arisan state mutations.
//!
//! Every state change emits an [`ArisanEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers and
//! optionally persisted to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, ArisanId, Identity, Payout};
use crate::randomness::{RequestId, SubscriptionId};

/// Domain event emitted after every state mutation.
///
/// Amounts serialize as decimal wei strings to preserve u128 precision
/// in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ArisanEvent {
    /// Emitted when a new arisan is created.
    ArisanCreated {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Organizer identity.
        organizer: Identity,
        /// Contribution per participant per round.
        payment_amount: Amount,
        /// Participant cap.
        max_participants: u32,
        /// Subscription funding the arisan's draws.
        subscription_id: SubscriptionId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an arisan is deleted from the registry.
    ArisanDeleted {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Identity that deleted it.
        deleted_by: Identity,
        /// Pot left in the arisan at deletion.
        stranded_pot: Amount,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after a participant joins.
    ParticipantJoined {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// New participant.
        participant: Identity,
        /// Participant count after the join.
        participant_count: usize,
        /// Join timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after a contribution is accepted.
    PaymentReceived {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Paying participant.
        participant: Identity,
        /// Contribution amount.
        amount: Amount,
        /// Pot after the contribution.
        pot: Amount,
        /// Payment timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the organizer closes the arisan.
    ArisanClosed {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Close timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after the gateway accepts a randomness request.
    RandomWordsRequested {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Handle of the outstanding request.
        request_id: RequestId,
        /// Size of the frozen draw roster.
        roster_size: usize,
        /// Request timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after a fulfillment completes a draw.
    WinnerSelected {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Request whose randomness decided the draw.
        request_id: RequestId,
        /// Completed round number (1-based).
        round: u64,
        /// Winning participant.
        winner: Identity,
        /// Position of the winner in the roster.
        winner_index: usize,
        /// Size of the roster the winner was drawn from.
        participant_count: usize,
        /// Disbursed pot.
        amount: Amount,
        /// Selection timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an arisan rejects a fulfillment.
    FulfillmentRejected {
        /// Arisan identifier.
        arisan_id: ArisanId,
        /// Request id carried by the fulfillment.
        request_id: RequestId,
        /// Rejection reason.
        reason: String,
        /// Rejection timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ArisanEvent {
    /// Returns the arisan ID associated with this event.
    #[must_use]
    pub fn arisan_id(&self) -> ArisanId {
        match self {
            Self::ArisanCreated { arisan_id, .. }
            | Self::ArisanDeleted { arisan_id, .. }
            | Self::ParticipantJoined { arisan_id, .. }
            | Self::PaymentReceived { arisan_id, .. }
            | Self::ArisanClosed { arisan_id, .. }
            | Self::RandomWordsRequested { arisan_id, .. }
            | Self::WinnerSelected { arisan_id, .. }
            | Self::FulfillmentRejected { arisan_id, .. } => *arisan_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ArisanCreated { .. } => "arisan_created",
            Self::ArisanDeleted { .. } => "arisan_deleted",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::PaymentReceived { .. } => "payment_received",
            Self::ArisanClosed { .. } => "arisan_closed",
            Self::RandomWordsRequested { .. } => "random_words_requested",
            Self::WinnerSelected { .. } => "winner_selected",
            Self::FulfillmentRejected { .. } => "fulfillment_rejected",
        }
    }

    /// Returns `true` for events that change the stored arisan state.
    #[must_use]
    pub const fn mutates_state(&self) -> bool {
        !matches!(self, Self::FulfillmentRejected { .. })
    }

    /// Rebuilds the payout recorded by a `WinnerSelected` event.
    #[must_use]
    pub fn payout(&self) -> Option<Payout> {
        match self {
            Self::WinnerSelected {
                arisan_id,
                request_id,
                round,
                winner,
                winner_index,
                participant_count,
                amount,
                ..
            } => Some(Payout {
                arisan_id: *arisan_id,
                round: *round,
                request_id: *request_id,
                winner_index: *winner_index,
                participant_count: *participant_count,
                winner: winner.clone(),
                amount: *amount,
            }),
            _ => None,
        }
    }
}
