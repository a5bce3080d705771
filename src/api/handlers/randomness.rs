//! Randomness coordinator handlers: pending requests, manual
//! fulfillment and subscriptions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::caller::Caller;
use crate::api::dto::{
    FundSubscriptionRequest, PayoutDto, PendingRequestDto, PendingRequestsResponse,
    SubscriptionResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::randomness::{RequestId, SubscriptionId};
use crate::service::deliver_fulfillment;

/// `GET /randomness/requests` — Requests awaiting fulfillment.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the coordinator is unavailable.
#[utoipa::path(
    get,
    path = "/api/v1/randomness/requests",
    tag = "Randomness",
    summary = "List pending randomness requests",
    description = "Returns every request the local coordinator accepted and has not fulfilled yet.",
    responses(
        (status = 200, description = "Pending requests", body = PendingRequestsResponse),
    )
)]
pub async fn list_pending(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let data = state
        .coordinator
        .pending_requests()?
        .into_iter()
        .map(PendingRequestDto::from)
        .collect();
    Ok(Json(PendingRequestsResponse { data }))
}

/// `POST /randomness/requests/{request_id}/fulfill` — Fulfill now.
///
/// # Errors
///
/// Returns [`GatewayError::RandomnessRequestNotFound`] if the request is
/// not pending, or the error the consumer arisan rejected it with.
#[utoipa::path(
    post,
    path = "/api/v1/randomness/requests/{request_id}/fulfill",
    tag = "Randomness",
    summary = "Fulfill a pending request",
    description = "Makes the local coordinator answer a pending request immediately and delivers the words to the arisan that issued it.",
    params(("request_id" = u64, Path, description = "Request handle")),
    responses(
        (status = 200, description = "Winner drawn", body = PayoutDto),
        (status = 404, description = "Request not pending or arisan gone", body = ErrorResponse),
        (status = 422, description = "Fulfillment rejected", body = ErrorResponse),
    )
)]
pub async fn fulfill_request(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let payout = deliver_fulfillment(
        &state.coordinator,
        &state.arisan_service,
        RequestId::new(request_id),
    )
    .await?;
    Ok(Json(PayoutDto::from(payout)))
}

/// `GET /randomness/subscriptions/{id}` — Subscription balance and
/// consumers.
///
/// # Errors
///
/// Returns [`GatewayError::SubscriptionNotFound`] if the subscription does
/// not exist.
#[utoipa::path(
    get,
    path = "/api/v1/randomness/subscriptions/{id}",
    tag = "Randomness",
    summary = "Get a subscription",
    params(("id" = u64, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription", body = SubscriptionResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.coordinator.subscription(SubscriptionId::new(id))?;
    Ok(Json(SubscriptionResponse::from(view)))
}

/// `POST /randomness/subscriptions` — Create a subscription owned by the
/// caller.
///
/// # Errors
///
/// Returns [`GatewayError::MissingCallerIdentity`] without a caller
/// header.
#[utoipa::path(
    post,
    path = "/api/v1/randomness/subscriptions",
    tag = "Randomness",
    summary = "Create a subscription",
    description = "Creates an empty subscription owned by the caller. Only the owner may create arisans that draw from it; anyone may fund it.",
    params(("x-caller-identity" = String, Header, description = "Caller identity")),
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<impl IntoResponse, GatewayError> {
    let id = state.coordinator.create_subscription(Some(caller))?;
    let view = state.coordinator.subscription(id)?;
    Ok((StatusCode::CREATED, Json(SubscriptionResponse::from(view))))
}

/// `POST /randomness/subscriptions/{id}/fund` — Top up a subscription.
///
/// # Errors
///
/// Returns [`GatewayError::SubscriptionNotFound`] if the subscription does
/// not exist, or [`GatewayError::InvalidRequest`] for a malformed amount
/// or a balance overflow.
#[utoipa::path(
    post,
    path = "/api/v1/randomness/subscriptions/{id}/fund",
    tag = "Randomness",
    summary = "Fund a subscription",
    request_body = FundSubscriptionRequest,
    params(
        ("id" = u64, Path, description = "Subscription id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 200, description = "Updated subscription", body = SubscriptionResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn fund_subscription(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(req): Json<FundSubscriptionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let amount = req.amount.resolve("amount")?;
    let subscription_id = SubscriptionId::new(id);
    let balance = state.coordinator.fund_subscription(subscription_id, amount)?;
    tracing::info!(
        %subscription_id,
        funded_by = %caller,
        %amount,
        %balance,
        "vrf subscription topped up"
    );
    let view = state.coordinator.subscription(subscription_id)?;
    Ok(Json(SubscriptionResponse::from(view)))
}

/// Randomness routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/randomness/requests", get(list_pending))
        .route(
            "/randomness/requests/{request_id}/fulfill",
            post(fulfill_request),
        )
        .route("/randomness/subscriptions", post(create_subscription))
        .route("/randomness/subscriptions/{id}", get(get_subscription))
        .route("/randomness/subscriptions/{id}/fund", post(fund_subscription))
}
