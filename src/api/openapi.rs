//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::api::dto::{
    ActiveRequestDto, AmountDto, AmountInput, ArisanDetailResponse, ArisanListResponse,
    ArisanStatusDto, ArisanSummaryDto, CloseResponse, CountResponse, CreateArisanRequest,
    CreateArisanResponse, FundSubscriptionRequest, HasPaidResponse, JoinResponse, PaginationMeta, ParticipantDto,
    ParticipantsResponse, PayRequest, PayResponse, PayoutBalanceResponse, PayoutDto,
    PendingRequestDto, PendingRequestsResponse, PickWinnerResponse, RandomnessDto,
    RandomnessOverrides, SubscriptionResponse, WinnersResponse,
};
use crate::api::handlers::{arisan, payout, randomness, system};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI description of the gateway.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "arisan-gateway",
        description = "Rotating-contribution pools with VRF-based winner selection."
    ),
    paths(
        arisan::create_arisan,
        arisan::list_arisans,
        arisan::count_arisans,
        arisan::get_arisan,
        arisan::delete_arisan,
        arisan::join_arisan,
        arisan::pay_arisan,
        arisan::close_arisan,
        arisan::pick_winner,
        arisan::list_participants,
        arisan::has_paid,
        arisan::list_winners,
        randomness::list_pending,
        randomness::fulfill_request,
        randomness::create_subscription,
        randomness::get_subscription,
        randomness::fund_subscription,
        payout::get_payouts,
        system::health_handler,
        system::randomness_defaults_handler,
    ),
    components(schemas(
        ActiveRequestDto,
        AmountDto,
        AmountInput,
        ArisanDetailResponse,
        ArisanListResponse,
        ArisanStatusDto,
        ArisanSummaryDto,
        CloseResponse,
        CountResponse,
        CreateArisanRequest,
        CreateArisanResponse,
        ErrorBody,
        ErrorResponse,
        FundSubscriptionRequest,
        HasPaidResponse,
        JoinResponse,
        PaginationMeta,
        ParticipantDto,
        ParticipantsResponse,
        PayRequest,
        PayResponse,
        PayoutBalanceResponse,
        PayoutDto,
        PendingRequestDto,
        PendingRequestsResponse,
        PickWinnerResponse,
        RandomnessDto,
        RandomnessOverrides,
        SubscriptionResponse,
        WinnersResponse,
    )),
    tags(
        (name = "Arisans", description = "Arisan lifecycle"),
        (name = "Randomness", description = "Local VRF coordinator"),
        (name = "Payouts", description = "Credited winnings"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/arisans",
            "/api/v1/arisans/{id}/pick-winner",
            "/api/v1/randomness/requests/{request_id}/fulfill",
            "/api/v1/randomness/subscriptions",
            "/api/v1/randomness/subscriptions/{id}/fund",
            "/api/v1/payouts/{identity}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
