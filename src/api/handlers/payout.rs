//! Payout ledger handler.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::PayoutBalanceResponse;
use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /payouts/{identity}` — Winnings credited to an identity.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentity`] if the identity is malformed.
#[utoipa::path(
    get,
    path = "/api/v1/payouts/{identity}",
    tag = "Payouts",
    summary = "Get credited winnings",
    description = "Returns the total credited to the identity and every draw it won.",
    params(("identity" = String, Path, description = "Winner identity")),
    responses(
        (status = 200, description = "Credited winnings", body = PayoutBalanceResponse),
        (status = 400, description = "Invalid identity", body = ErrorResponse),
    )
)]
pub async fn get_payouts(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = Identity::parse(&identity)?;
    let (balance, payouts) = state.arisan_service.payouts_of(&identity).await;
    Ok(Json(PayoutBalanceResponse::new(&identity, balance, payouts)))
}

/// Payout routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/payouts/{identity}", get(get_payouts))
}
