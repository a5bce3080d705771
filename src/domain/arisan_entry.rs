//! Arisan entry combining the state machine with server-side metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::arisan::{Arisan, ArisanStatus};
use super::{Amount, ArisanId, Identity};

/// Aggregate wrapping an [`Arisan`] with gateway metadata.
///
/// Each live arisan in the registry is stored as an `ArisanEntry`. The
/// `arisan` field holds the state machine; the remaining fields are
/// operational counters that never influence a draw.
#[derive(Debug)]
pub struct ArisanEntry {
    /// The arisan state machine.
    pub arisan: Arisan,

    /// Creation timestamp (immutable after creation).
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last state mutation.
    pub last_modified_at: DateTime<Utc>,

    /// Number of accepted contributions across all rounds.
    pub contribution_count: u64,

    /// Sum of all pots disbursed to winners.
    pub total_disbursed: Amount,
}

impl ArisanEntry {
    /// Wraps a freshly created arisan.
    #[must_use]
    pub fn new(arisan: Arisan) -> Self {
        let now = Utc::now();
        Self {
            arisan,
            created_at: now,
            last_modified_at: now,
            contribution_count: 0,
            total_disbursed: Amount::ZERO,
        }
    }

    /// Rebuilds an entry from a persisted snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: ArisanSnapshot) -> Self {
        Self {
            arisan: snapshot.arisan,
            created_at: snapshot.created_at,
            last_modified_at: snapshot.last_modified_at,
            contribution_count: snapshot.contribution_count,
            total_disbursed: snapshot.total_disbursed,
        }
    }

    /// Captures the full entry state.
    #[must_use]
    pub fn snapshot(&self) -> ArisanSnapshot {
        ArisanSnapshot {
            arisan: self.arisan.clone(),
            created_at: self.created_at,
            last_modified_at: self.last_modified_at,
            contribution_count: self.contribution_count,
            total_disbursed: self.total_disbursed,
        }
    }

    /// Marks the entry as modified now.
    pub fn touch(&mut self) {
        self.last_modified_at = Utc::now();
    }
}

/// Point-in-time copy of an [`ArisanEntry`], used for detail reads and
/// persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArisanSnapshot {
    /// Arisan state.
    pub arisan: Arisan,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last state mutation.
    pub last_modified_at: DateTime<Utc>,
    /// Accepted contributions across all rounds.
    pub contribution_count: u64,
    /// Sum of all pots disbursed to winners.
    pub total_disbursed: Amount,
}

/// Lightweight summary of an arisan for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ArisanSummary {
    /// Arisan identifier.
    pub arisan_id: ArisanId,
    /// Organizer identity.
    pub organizer: Identity,
    /// Current status.
    pub status: ArisanStatus,
    /// Contribution per participant per round.
    pub payment_amount: Amount,
    /// Current participant count.
    pub participant_count: usize,
    /// Participant cap.
    pub max_participants: u32,
    /// Current pot.
    pub pot: Amount,
    /// Whether a randomness request is outstanding.
    pub awaiting_randomness: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&ArisanEntry> for ArisanSummary {
    fn from(entry: &ArisanEntry) -> Self {
        let a = &entry.arisan;
        Self {
            arisan_id: a.id(),
            organizer: a.organizer().clone(),
            status: a.status(),
            payment_amount: a.payment_amount(),
            participant_count: a.participant_count(),
            max_participants: a.max_participants(),
            pot: a.pot(),
            awaiting_randomness: a.active_request().is_some(),
            created_at: entry.created_at,
        }
    }
}
