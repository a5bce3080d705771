//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::randomness::LocalVrfCoordinator;
use crate::service::ArisanService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Arisan service for all business logic.
    pub arisan_service: Arc<ArisanService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Local VRF coordinator backing the randomness routes.
    pub coordinator: Arc<LocalVrfCoordinator>,
}
