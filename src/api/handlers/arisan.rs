//! Arisan handlers: create, list, read, delete and the lifecycle
//! operations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::caller::Caller;
use crate::api::dto::{
    ArisanDetailResponse, ArisanFilterParams, ArisanListResponse, ArisanStatusDto,
    ArisanSummaryDto, CloseResponse, CountResponse, CreateArisanRequest, CreateArisanResponse,
    HasPaidResponse, JoinResponse, PaginationParams, ParticipantDto, ParticipantsResponse,
    PayRequest, PayResponse, PickWinnerResponse, RandomnessDto, WinnersResponse,
    parse_create_request,
};
use crate::app_state::AppState;
use crate::domain::{ArisanId, Identity};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /arisans` — Create a new arisan organized by the caller.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid body, a zero payment amount or
/// capacity, or an unusable randomness subscription.
#[utoipa::path(
    post,
    path = "/api/v1/arisans",
    tag = "Arisans",
    summary = "Create an arisan",
    description = "Creates an open arisan with the caller as organizer and registers it as a consumer of its randomness subscription.",
    request_body = CreateArisanRequest,
    params(("x-caller-identity" = String, Header, description = "Caller identity")),
    responses(
        (status = 201, description = "Arisan created", body = CreateArisanResponse),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn create_arisan(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateArisanRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (payment_amount, randomness) =
        parse_create_request(&req, state.arisan_service.default_randomness())?;
    let randomness_dto = RandomnessDto::from(&randomness);

    let arisan_id = state
        .arisan_service
        .create_arisan(caller.clone(), payment_amount, req.max_participants, Some(randomness))
        .await?;
    let snapshot = state.arisan_service.get_arisan(arisan_id).await?;

    let response = CreateArisanResponse {
        arisan_id: arisan_id.get(),
        organizer: caller.to_string(),
        status: ArisanStatusDto::Open,
        payment_amount: payment_amount.into(),
        max_participants: req.max_participants,
        randomness: randomness_dto,
        created_at: snapshot.created_at,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /arisans` — List live arisans with pagination.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentity`] if the organizer filter is
/// malformed.
#[utoipa::path(
    get,
    path = "/api/v1/arisans",
    tag = "Arisans",
    summary = "List arisans",
    description = "Returns a paginated list of live arisans in creation order, optionally filtered by organizer.",
    params(PaginationParams, ArisanFilterParams),
    responses(
        (status = 200, description = "Paginated arisan list", body = ArisanListResponse),
        (status = 400, description = "Invalid organizer filter", body = ErrorResponse),
    )
)]
pub async fn list_arisans(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<ArisanFilterParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let organizer = filter.organizer.as_deref().map(Identity::parse).transpose()?;
    let summaries = state.arisan_service.list_arisans(organizer.as_ref()).await;

    let (page, pagination) = params.paginate(summaries);
    let data = page.into_iter().map(ArisanSummaryDto::from).collect();

    Ok(Json(ArisanListResponse { data, pagination }))
}

/// `GET /arisans/count` — Number of live arisans.
#[utoipa::path(
    get,
    path = "/api/v1/arisans/count",
    tag = "Arisans",
    summary = "Count arisans",
    description = "Returns how many arisans are live. Deleted arisans are not counted.",
    responses(
        (status = 200, description = "Live arisan count", body = CountResponse),
    )
)]
pub async fn count_arisans(State(state): State<AppState>) -> impl IntoResponse {
    Json(CountResponse {
        count: state.arisan_service.count().await,
    })
}

/// `GET /arisans/{id}` — Arisan detail.
///
/// # Errors
///
/// Returns [`GatewayError::ArisanNotFound`] if the arisan does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/arisans/{id}",
    tag = "Arisans",
    summary = "Get arisan details",
    description = "Returns the full state of one arisan: configuration, participants with payment flags, pot, outstanding draw and winner history.",
    params(("id" = u64, Path, description = "Arisan id")),
    responses(
        (status = 200, description = "Arisan details", body = ArisanDetailResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn get_arisan(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.arisan_service.get_arisan(ArisanId::new(id)).await?;
    Ok(Json(ArisanDetailResponse::from(&snapshot)))
}

/// `DELETE /arisans/{id}` — Delete an arisan.
///
/// # Errors
///
/// Returns [`GatewayError::ArisanNotFound`] or
/// [`GatewayError::UnauthorizedToDelete`].
#[utoipa::path(
    delete,
    path = "/api/v1/arisans/{id}",
    tag = "Arisans",
    summary = "Delete an arisan",
    description = "Removes an arisan from the registry. Only its organizer may delete it; its id is never reused.",
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 204, description = "Arisan deleted"),
        (status = 403, description = "Caller is not the organizer", body = ErrorResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn delete_arisan(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .arisan_service
        .delete_arisan(&caller, ArisanId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /arisans/{id}/join` — Join as a participant.
///
/// # Errors
///
/// Returns [`GatewayError::Closed`], [`GatewayError::Full`] or
/// [`GatewayError::AlreadyJoined`].
#[utoipa::path(
    post,
    path = "/api/v1/arisans/{id}/join",
    tag = "Arisans",
    summary = "Join an arisan",
    description = "Appends the caller to the participant list while the arisan is open and below capacity.",
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 200, description = "Joined", body = JoinResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
        (status = 409, description = "Closed, full or already joined", body = ErrorResponse),
    )
)]
pub async fn join_arisan(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let arisan_id = ArisanId::new(id);
    let participant_count = state.arisan_service.join(&caller, arisan_id).await?;
    Ok(Json(JoinResponse {
        arisan_id: id,
        participant: caller.to_string(),
        participant_count,
    }))
}

/// `POST /arisans/{id}/pay` — Contribute for the current round.
///
/// # Errors
///
/// Returns [`GatewayError::NotAParticipant`],
/// [`GatewayError::InvalidPaymentAmount`] or [`GatewayError::AlreadyPaid`].
#[utoipa::path(
    post,
    path = "/api/v1/arisans/{id}/pay",
    tag = "Arisans",
    summary = "Pay the round contribution",
    description = "Adds exactly the payment amount to the pot and marks the caller as paid for the current round.",
    request_body = PayRequest,
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 200, description = "Payment accepted", body = PayResponse),
        (status = 400, description = "Amount does not match", body = ErrorResponse),
        (status = 409, description = "Already paid this round", body = ErrorResponse),
        (status = 422, description = "Caller is not a participant", body = ErrorResponse),
    )
)]
pub async fn pay_arisan(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(req): Json<PayRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let amount = req.amount.resolve("amount")?;
    let pot = state
        .arisan_service
        .pay(&caller, ArisanId::new(id), amount)
        .await?;
    Ok(Json(PayResponse {
        arisan_id: id,
        participant: caller.to_string(),
        amount: amount.into(),
        pot: pot.into(),
    }))
}

/// `POST /arisans/{id}/close` — Stop admitting participants.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] unless the caller is the
/// organizer.
#[utoipa::path(
    post,
    path = "/api/v1/arisans/{id}/close",
    tag = "Arisans",
    summary = "Close an arisan",
    description = "Moves the arisan to CLOSED. Closing an already closed arisan succeeds with `changed = false`.",
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 200, description = "Arisan closed", body = CloseResponse),
        (status = 403, description = "Caller is not the organizer", body = ErrorResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn close_arisan(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let changed = state
        .arisan_service
        .close(&caller, ArisanId::new(id))
        .await?;
    Ok(Json(CloseResponse {
        arisan_id: id,
        status: ArisanStatusDto::Closed,
        changed,
    }))
}

/// `POST /arisans/{id}/pick-winner` — Request randomness for a draw.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`],
/// [`GatewayError::RequestAlreadyInFlight`],
/// [`GatewayError::NoParticipants`] or a randomness gateway error.
#[utoipa::path(
    post,
    path = "/api/v1/arisans/{id}/pick-winner",
    tag = "Arisans",
    summary = "Request a winner",
    description = "Issues a randomness request and returns its handle immediately. The winner is drawn when the coordinator fulfills the request.",
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("x-caller-identity" = String, Header, description = "Caller identity"),
    ),
    responses(
        (status = 202, description = "Randomness requested", body = PickWinnerResponse),
        (status = 403, description = "Caller is not the organizer", body = ErrorResponse),
        (status = 409, description = "A request is already outstanding", body = ErrorResponse),
        (status = 422, description = "No participants or subscription problem", body = ErrorResponse),
    )
)]
pub async fn pick_winner(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let request_id = state
        .arisan_service
        .request_winner(&caller, ArisanId::new(id))
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PickWinnerResponse {
            arisan_id: id,
            request_id: request_id.get(),
            state: "awaiting_randomness".to_string(),
        }),
    ))
}

/// `GET /arisans/{id}/participants` — Participants in join order.
///
/// # Errors
///
/// Returns [`GatewayError::ArisanNotFound`] if the arisan does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/arisans/{id}/participants",
    tag = "Arisans",
    summary = "List participants",
    params(("id" = u64, Path, description = "Arisan id")),
    responses(
        (status = 200, description = "Participants", body = ParticipantsResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.arisan_service.get_arisan(ArisanId::new(id)).await?;
    let arisan = &snapshot.arisan;
    let participants = arisan
        .participants()
        .iter()
        .map(|p| ParticipantDto {
            identity: p.to_string(),
            has_paid: arisan.has_paid(p),
        })
        .collect();
    Ok(Json(ParticipantsResponse {
        arisan_id: id,
        participants,
    }))
}

/// `GET /arisans/{id}/participants/{identity}/paid` — Has-paid flag.
///
/// # Errors
///
/// Returns [`GatewayError::ArisanNotFound`] or
/// [`GatewayError::InvalidIdentity`].
#[utoipa::path(
    get,
    path = "/api/v1/arisans/{id}/participants/{identity}/paid",
    tag = "Arisans",
    summary = "Check a payment flag",
    description = "Returns whether the identity paid in the current round. Non-participants report `false`.",
    params(
        ("id" = u64, Path, description = "Arisan id"),
        ("identity" = String, Path, description = "Participant identity"),
    ),
    responses(
        (status = 200, description = "Payment flag", body = HasPaidResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn has_paid(
    State(state): State<AppState>,
    Path((id, identity)): Path<(u64, String)>,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = Identity::parse(&identity)?;
    let has_paid = state
        .arisan_service
        .has_paid(ArisanId::new(id), &identity)
        .await?;
    Ok(Json(HasPaidResponse {
        arisan_id: id,
        identity: identity.to_string(),
        has_paid,
    }))
}

/// `GET /arisans/{id}/winners` — Winner history.
///
/// # Errors
///
/// Returns [`GatewayError::ArisanNotFound`] if the arisan does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/arisans/{id}/winners",
    tag = "Arisans",
    summary = "List past winners",
    params(("id" = u64, Path, description = "Arisan id")),
    responses(
        (status = 200, description = "Winners, oldest first", body = WinnersResponse),
        (status = 404, description = "Arisan not found", body = ErrorResponse),
    )
)]
pub async fn list_winners(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, GatewayError> {
    let winners = state
        .arisan_service
        .winner_history(ArisanId::new(id))
        .await?;
    Ok(Json(WinnersResponse {
        arisan_id: id,
        winners: winners.iter().map(ToString::to_string).collect(),
    }))
}

/// Arisan routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/arisans", post(create_arisan).get(list_arisans))
        .route("/arisans/count", get(count_arisans))
        .route("/arisans/{id}", get(get_arisan).delete(delete_arisan))
        .route("/arisans/{id}/join", post(join_arisan))
        .route("/arisans/{id}/pay", post(pay_arisan))
        .route("/arisans/{id}/close", post(close_arisan))
        .route("/arisans/{id}/pick-winner", post(pick_winner))
        .route("/arisans/{id}/participants", get(list_participants))
        .route("/arisans/{id}/participants/{identity}/paid", get(has_paid))
        .route("/arisans/{id}/winners", get(list_winners))
}
