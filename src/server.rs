//! Assembly of the application state and the HTTP router.
//!
//! Shared by the binary and the integration tests so both run the same
//! wiring.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::domain::{ArisanRegistry, EventBus, PayoutLedger};
use crate::error::GatewayError;
use crate::randomness::{LocalVrfCoordinator, RandomnessGateway, RequestId};
use crate::service::ArisanService;
use crate::ws::handler::ws_handler;

/// Builds the in-memory components described by `config`.
///
/// Creates the local VRF coordinator (seeded from `VRF_SEED` when set),
/// registers and funds the default subscription, and wires the arisan
/// service to it. Returns the state together with the channel on which
/// the coordinator announces new requests.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidConfiguration`] if the default
/// randomness coordinates are invalid, or a coordinator error if the
/// default subscription cannot be prepared.
pub fn build_state(
    config: &GatewayConfig,
) -> Result<(AppState, mpsc::UnboundedReceiver<RequestId>), GatewayError> {
    config.randomness.validate()?;

    let (coordinator, announcements) = match config.vrf_seed {
        Some(seed) => LocalVrfCoordinator::new(config.vrf_base_fee, seed),
        None => LocalVrfCoordinator::with_random_seed(config.vrf_base_fee),
    };
    let coordinator = Arc::new(coordinator);

    let subscription_id = config.randomness.subscription_id;
    coordinator.ensure_subscription(subscription_id)?;
    let balance = coordinator.fund_subscription(subscription_id, config.vrf_subscription_funding)?;
    tracing::info!(
        %subscription_id,
        balance = %balance,
        base_fee = %config.vrf_base_fee,
        "default vrf subscription ready"
    );

    let event_bus = EventBus::new(config.event_bus_capacity);
    let arisan_service = Arc::new(ArisanService::new(
        Arc::new(ArisanRegistry::new()),
        event_bus.clone(),
        Arc::clone(&coordinator) as Arc<dyn RandomnessGateway>,
        Arc::new(PayoutLedger::new()),
        config.randomness.clone(),
    ));

    let state = AppState {
        arisan_service,
        event_bus,
        coordinator,
    };
    Ok((state, announcements))
}

/// Builds the full router: REST API, WebSocket endpoint and HTTP layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
