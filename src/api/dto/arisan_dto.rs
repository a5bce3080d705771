//! Arisan DTOs for create, read, list and lifecycle operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{AmountDto, AmountInput, PaginationMeta};
use crate::domain::{Amount, ArisanSnapshot, ArisanStatus, ArisanSummary};
use crate::error::GatewayError;
use crate::randomness::{RandomnessConfig, SubscriptionId};

/// Optional overrides of the default randomness coordinates.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RandomnessOverrides {
    /// Coordinator name.
    #[serde(default)]
    pub coordinator: Option<String>,
    /// Gas lane key hash (32 bytes, hex).
    #[serde(default)]
    pub key_hash: Option<String>,
    /// Subscription charged for draws.
    #[serde(default)]
    pub subscription_id: Option<u64>,
    /// Gas limit of the fulfillment callback.
    #[serde(default)]
    pub callback_gas_limit: Option<u32>,
    /// Confirmations to wait before fulfilling.
    #[serde(default)]
    pub request_confirmations: Option<u16>,
    /// Words per request.
    #[serde(default)]
    pub num_words: Option<u32>,
}

impl RandomnessOverrides {
    /// Applies the overrides on top of `defaults`.
    #[must_use]
    pub fn apply(&self, defaults: &RandomnessConfig) -> RandomnessConfig {
        RandomnessConfig {
            coordinator: self
                .coordinator
                .clone()
                .unwrap_or_else(|| defaults.coordinator.clone()),
            key_hash: self
                .key_hash
                .clone()
                .unwrap_or_else(|| defaults.key_hash.clone()),
            subscription_id: self
                .subscription_id
                .map_or(defaults.subscription_id, SubscriptionId::new),
            callback_gas_limit: self
                .callback_gas_limit
                .unwrap_or(defaults.callback_gas_limit),
            request_confirmations: self
                .request_confirmations
                .unwrap_or(defaults.request_confirmations),
            num_words: self.num_words.unwrap_or(defaults.num_words),
        }
    }
}

/// Randomness coordinates as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RandomnessDto {
    /// Coordinator name.
    pub coordinator: String,
    /// Gas lane key hash.
    pub key_hash: String,
    /// Subscription charged for draws.
    pub subscription_id: u64,
    /// Gas limit of the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Confirmations to wait before fulfilling.
    pub request_confirmations: u16,
    /// Words per request.
    pub num_words: u32,
}

impl From<&RandomnessConfig> for RandomnessDto {
    fn from(config: &RandomnessConfig) -> Self {
        Self {
            coordinator: config.coordinator.clone(),
            key_hash: config.key_hash.clone(),
            subscription_id: config.subscription_id.get(),
            callback_gas_limit: config.callback_gas_limit,
            request_confirmations: config.request_confirmations,
            num_words: config.num_words,
        }
    }
}

/// Request body for `POST /arisans`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateArisanRequest {
    /// Contribution per participant per round.
    pub payment_amount: AmountInput,
    /// Participant cap.
    pub max_participants: u32,
    /// Randomness coordinates; omitted fields use the gateway defaults.
    #[serde(default)]
    pub randomness: Option<RandomnessOverrides>,
}

/// Response body for `POST /arisans` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateArisanResponse {
    /// New arisan identifier.
    pub arisan_id: u64,
    /// Organizer identity (the caller).
    pub organizer: String,
    /// Always `OPEN` for a new arisan.
    pub status: ArisanStatusDto,
    /// Contribution per participant per round.
    pub payment_amount: AmountDto,
    /// Participant cap.
    pub max_participants: u32,
    /// Randomness coordinates in effect.
    pub randomness: RandomnessDto,
    /// Server creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Arisan status as exposed by the API.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArisanStatusDto {
    /// Accepting new participants.
    Open,
    /// No longer accepting participants.
    Closed,
}

impl From<ArisanStatus> for ArisanStatusDto {
    fn from(status: ArisanStatus) -> Self {
        match status {
            ArisanStatus::Open => Self::Open,
            ArisanStatus::Closed => Self::Closed,
        }
    }
}

/// Participant with the current-round payment flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantDto {
    /// Participant identity.
    pub identity: String,
    /// Whether the participant paid in the current round.
    pub has_paid: bool,
}

/// Outstanding randomness request of an arisan.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveRequestDto {
    /// Request handle.
    pub request_id: u64,
    /// Participants eligible for the draw.
    pub roster: Vec<String>,
    /// When the request was issued.
    pub requested_at: DateTime<Utc>,
}

/// Full arisan detail for `GET /arisans/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ArisanDetailResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Organizer identity.
    pub organizer: String,
    /// Current status.
    pub status: ArisanStatusDto,
    /// Numeric status (`0` open, `1` closed).
    pub status_code: u8,
    /// Contribution per participant per round.
    pub payment_amount: AmountDto,
    /// Participant cap.
    pub max_participants: u32,
    /// Participant count.
    pub participant_count: usize,
    /// Participants in join order.
    pub participants: Vec<ParticipantDto>,
    /// Undisbursed contributions.
    pub pot: AmountDto,
    /// Outstanding randomness request, if any.
    pub active_request: Option<ActiveRequestDto>,
    /// Completed rounds.
    pub rounds_completed: u64,
    /// Winners of completed rounds, oldest first.
    pub winner_history: Vec<String>,
    /// Randomness coordinates.
    pub randomness: RandomnessDto,
    /// Accepted contributions across all rounds.
    pub contribution_count: u64,
    /// Sum of all pots disbursed to winners.
    pub total_disbursed: AmountDto,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&ArisanSnapshot> for ArisanDetailResponse {
    fn from(snapshot: &ArisanSnapshot) -> Self {
        let a = &snapshot.arisan;
        Self {
            arisan_id: a.id().get(),
            organizer: a.organizer().to_string(),
            status: a.status().into(),
            status_code: a.status().as_index(),
            payment_amount: a.payment_amount().into(),
            max_participants: a.max_participants(),
            participant_count: a.participant_count(),
            participants: a
                .participants()
                .iter()
                .map(|p| ParticipantDto {
                    identity: p.to_string(),
                    has_paid: a.has_paid(p),
                })
                .collect(),
            pot: a.pot().into(),
            active_request: a.active_request().map(|draw| ActiveRequestDto {
                request_id: draw.request_id.get(),
                roster: draw.roster.iter().map(ToString::to_string).collect(),
                requested_at: draw.requested_at,
            }),
            rounds_completed: a.rounds_completed(),
            winner_history: a.winner_history().iter().map(ToString::to_string).collect(),
            randomness: a.randomness().into(),
            contribution_count: snapshot.contribution_count,
            total_disbursed: snapshot.total_disbursed.into(),
            created_at: snapshot.created_at,
            updated_at: snapshot.last_modified_at,
        }
    }
}

/// Arisan summary for list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ArisanSummaryDto {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Organizer identity.
    pub organizer: String,
    /// Current status.
    pub status: ArisanStatusDto,
    /// Contribution per participant per round.
    pub payment_amount: AmountDto,
    /// Participant count.
    pub participant_count: usize,
    /// Participant cap.
    pub max_participants: u32,
    /// Undisbursed contributions.
    pub pot: AmountDto,
    /// Whether a draw is awaiting randomness.
    pub awaiting_randomness: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<ArisanSummary> for ArisanSummaryDto {
    fn from(s: ArisanSummary) -> Self {
        Self {
            arisan_id: s.arisan_id.get(),
            organizer: s.organizer.to_string(),
            status: s.status.into(),
            payment_amount: s.payment_amount.into(),
            participant_count: s.participant_count,
            max_participants: s.max_participants,
            pot: s.pot.into(),
            awaiting_randomness: s.awaiting_randomness,
            created_at: s.created_at,
        }
    }
}

/// Query filter for `GET /arisans`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArisanFilterParams {
    /// Only list arisans organized by this identity.
    #[serde(default)]
    pub organizer: Option<String>,
}

/// Paginated list response for `GET /arisans`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ArisanListResponse {
    /// Arisan summaries.
    pub data: Vec<ArisanSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `POST /arisans/{id}/join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Identity that joined.
    pub participant: String,
    /// Participant count after the join.
    pub participant_count: usize,
}

/// Request body for `POST /arisans/{id}/pay`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PayRequest {
    /// Contribution; must equal the arisan payment amount.
    pub amount: AmountInput,
}

/// Response body for `POST /arisans/{id}/pay`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Identity that paid.
    pub participant: String,
    /// Contribution accepted.
    pub amount: AmountDto,
    /// Pot after the contribution.
    pub pot: AmountDto,
}

/// Response body for `POST /arisans/{id}/close`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CloseResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Status after the call (always `CLOSED`).
    pub status: ArisanStatusDto,
    /// Whether this call changed the status.
    pub changed: bool,
}

/// Response body for `POST /arisans/{id}/pick-winner` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PickWinnerResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Handle of the randomness request.
    pub request_id: u64,
    /// Always `awaiting_randomness`.
    pub state: String,
}

/// Response body for `GET /arisans/{id}/participants`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantsResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Participants in join order.
    pub participants: Vec<ParticipantDto>,
}

/// Response body for `GET /arisans/{id}/participants/{identity}/paid`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HasPaidResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Identity queried.
    pub identity: String,
    /// Whether the identity paid in the current round.
    pub has_paid: bool,
}

/// Response body for `GET /arisans/{id}/winners`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WinnersResponse {
    /// Arisan identifier.
    pub arisan_id: u64,
    /// Winners of completed rounds, oldest first.
    pub winners: Vec<String>,
}

/// Validates a create request before it reaches the service.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the payment amount cannot
/// be parsed.
pub fn parse_create_request(
    req: &CreateArisanRequest,
    defaults: &RandomnessConfig,
) -> Result<(Amount, RandomnessConfig), GatewayError> {
    let payment_amount = req.payment_amount.resolve("payment_amount")?;
    let randomness = req
        .randomness
        .as_ref()
        .map_or_else(|| defaults.clone(), |o| o.apply(defaults));
    Ok((payment_amount, randomness))
}
