//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Domain
//! failures of the arisan state machine, the registry and the randomness
//! coordinator are all variants of it, and each variant maps to its own
//! numeric code and HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Amount, ArisanId};
use crate::randomness::{RequestId, SubscriptionId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4002,
///     "message": "arisan 3 is full (2 participants)",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                      |
/// |-----------|-----------------------|----------------------------------|
/// | 1000–1099 | Validation            | 400 Bad Request                  |
/// | 1100–1199 | Authentication        | 401 Unauthorized                 |
/// | 1200–1299 | Authorization         | 403 Forbidden                    |
/// | 2000–2999 | Not Found             | 404 Not Found                    |
/// | 3000–3999 | Server                | 500 Internal Server Error        |
/// | 4000–4999 | Arisan lifecycle      | 409 Conflict / 422 Unprocessable |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Payment amount or participant cap is not positive, or the
    /// randomness coordinates are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Contribution does not equal the arisan payment amount.
    #[error("invalid payment amount: expected {expected} wei, got {actual} wei")]
    InvalidPaymentAmount {
        /// Required contribution.
        expected: Amount,
        /// Amount the caller tried to pay.
        actual: Amount,
    },

    /// Identity string failed validation.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// State-changing request without a caller identity.
    #[error("missing caller identity header")]
    MissingCallerIdentity,

    /// Caller is not the organizer of the arisan.
    #[error("only the organizer of arisan {0} may perform this action")]
    Unauthorized(ArisanId),

    /// Caller tried to delete an arisan it did not create.
    #[error("only the organizer may delete arisan {0}")]
    UnauthorizedToDelete(ArisanId),

    /// No live arisan with the given id.
    #[error("arisan not found: {0}")]
    ArisanNotFound(ArisanId),

    /// No pending randomness request with the given id.
    #[error("randomness request not found: {0}")]
    RandomnessRequestNotFound(RequestId),

    /// No randomness subscription with the given id.
    #[error("randomness subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    /// Caller tried to attach a consumer to a subscription owned by
    /// someone else.
    #[error("randomness subscription {0} belongs to another identity")]
    SubscriptionNotOwned(SubscriptionId),

    /// Arisan no longer accepts participants.
    #[error("arisan {0} is closed")]
    Closed(ArisanId),

    /// Arisan reached its participant cap.
    #[error("arisan {arisan_id} is full ({max_participants} participants)")]
    Full {
        /// Arisan that rejected the join.
        arisan_id: ArisanId,
        /// Configured cap.
        max_participants: u32,
    },

    /// Caller already joined the arisan.
    #[error("already joined arisan {0}")]
    AlreadyJoined(ArisanId),

    /// Caller already paid for the current round.
    #[error("already paid for the current round of arisan {0}")]
    AlreadyPaid(ArisanId),

    /// Caller is not a participant of the arisan.
    #[error("not a participant of arisan {0}")]
    NotAParticipant(ArisanId),

    /// A winner was requested for an arisan without participants.
    #[error("arisan {0} has no participants")]
    NoParticipants(ArisanId),

    /// A randomness request is already outstanding.
    #[error("arisan {arisan_id} is already awaiting randomness for request {request_id}")]
    RequestAlreadyInFlight {
        /// Arisan awaiting randomness.
        arisan_id: ArisanId,
        /// Outstanding request.
        request_id: RequestId,
    },

    /// Fulfillment does not match the arisan's outstanding request.
    #[error("arisan {arisan_id} did not request randomness {request_id}")]
    UnknownRandomnessRequest {
        /// Arisan that rejected the fulfillment.
        arisan_id: ArisanId,
        /// Request id carried by the fulfillment.
        request_id: RequestId,
    },

    /// Fulfillment delivered no random words.
    #[error("fulfillment for request {0} carried no random words")]
    EmptyRandomWords(RequestId),

    /// Arisan is not an authorized consumer of the subscription.
    #[error("arisan {consumer} is not a consumer of subscription {subscription_id}")]
    InvalidConsumer {
        /// Arisan that issued the request.
        consumer: ArisanId,
        /// Subscription the request was charged to.
        subscription_id: SubscriptionId,
    },

    /// Subscription balance does not cover the request fee.
    #[error("subscription {0} has insufficient balance")]
    InsufficientSubscriptionBalance(SubscriptionId),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidConfiguration(_) => 1002,
            Self::InvalidPaymentAmount { .. } => 1003,
            Self::InvalidIdentity(_) => 1004,
            Self::MissingCallerIdentity => 1101,
            Self::Unauthorized(_) => 1201,
            Self::UnauthorizedToDelete(_) => 1202,
            Self::SubscriptionNotOwned(_) => 1203,
            Self::ArisanNotFound(_) => 2001,
            Self::RandomnessRequestNotFound(_) => 2002,
            Self::SubscriptionNotFound(_) => 2003,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Closed(_) => 4001,
            Self::Full { .. } => 4002,
            Self::AlreadyJoined(_) => 4003,
            Self::AlreadyPaid(_) => 4004,
            Self::NotAParticipant(_) => 4005,
            Self::NoParticipants(_) => 4006,
            Self::RequestAlreadyInFlight { .. } => 4007,
            Self::UnknownRandomnessRequest { .. } => 4008,
            Self::EmptyRandomWords(_) => 4009,
            Self::InvalidConsumer { .. } => 4010,
            Self::InsufficientSubscriptionBalance(_) => 4011,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidConfiguration(_)
            | Self::InvalidPaymentAmount { .. }
            | Self::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
            Self::MissingCallerIdentity => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_)
            | Self::UnauthorizedToDelete(_)
            | Self::SubscriptionNotOwned(_) => StatusCode::FORBIDDEN,
            Self::ArisanNotFound(_)
            | Self::RandomnessRequestNotFound(_)
            | Self::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Closed(_)
            | Self::Full { .. }
            | Self::AlreadyJoined(_)
            | Self::AlreadyPaid(_)
            | Self::RequestAlreadyInFlight { .. } => StatusCode::CONFLICT,
            Self::NotAParticipant(_)
            | Self::NoParticipants(_)
            | Self::UnknownRandomnessRequest { .. }
            | Self::EmptyRandomWords(_)
            | Self::InvalidConsumer { .. }
            | Self::InsufficientSubscriptionBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn every_variant() -> Vec<GatewayError> {
        let id = ArisanId::new(1);
        let req = RequestId::new(1);
        let sub = SubscriptionId::new(1);
        vec![
            GatewayError::InvalidRequest(String::new()),
            GatewayError::InvalidConfiguration(String::new()),
            GatewayError::InvalidPaymentAmount {
                expected: Amount::from_wei(2),
                actual: Amount::from_wei(1),
            },
            GatewayError::InvalidIdentity(String::new()),
            GatewayError::MissingCallerIdentity,
            GatewayError::Unauthorized(id),
            GatewayError::UnauthorizedToDelete(id),
            GatewayError::ArisanNotFound(id),
            GatewayError::RandomnessRequestNotFound(req),
            GatewayError::SubscriptionNotFound(sub),
            GatewayError::SubscriptionNotOwned(sub),
            GatewayError::Closed(id),
            GatewayError::Full {
                arisan_id: id,
                max_participants: 2,
            },
            GatewayError::AlreadyJoined(id),
            GatewayError::AlreadyPaid(id),
            GatewayError::NotAParticipant(id),
            GatewayError::NoParticipants(id),
            GatewayError::RequestAlreadyInFlight {
                arisan_id: id,
                request_id: req,
            },
            GatewayError::UnknownRandomnessRequest {
                arisan_id: id,
                request_id: req,
            },
            GatewayError::EmptyRandomWords(req),
            GatewayError::InvalidConsumer {
                consumer: id,
                subscription_id: sub,
            },
            GatewayError::InsufficientSubscriptionBalance(sub),
            GatewayError::PersistenceError(String::new()),
            GatewayError::Internal(String::new()),
        ]
    }

    #[test]
    fn every_kind_has_a_distinct_code() {
        let variants = every_variant();
        let codes: HashSet<u32> = variants.iter().map(GatewayError::error_code).collect();
        assert_eq!(codes.len(), variants.len());
    }

    #[test]
    fn authorization_failures_are_forbidden() {
        assert_eq!(
            GatewayError::Unauthorized(ArisanId::new(0)).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::UnauthorizedToDelete(ArisanId::new(0)).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::SubscriptionNotOwned(SubscriptionId::new(0)).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn lifecycle_conflicts_map_to_409() {
        assert_eq!(
            GatewayError::Closed(ArisanId::new(0)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::AlreadyJoined(ArisanId::new(0)).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn into_response_carries_status() {
        let response = GatewayError::ArisanNotFound(ArisanId::new(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
