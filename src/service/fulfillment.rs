//! Background delivery of randomness to waiting arisans.
//!
//! The local coordinator announces every accepted request id on an
//! unbounded channel. [`FulfillmentWorker`] consumes that channel, waits
//! the configured delay, asks the coordinator to answer the request and
//! hands the words to [`ArisanService::fulfill_randomness`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::ArisanService;
use crate::domain::Payout;
use crate::error::GatewayError;
use crate::randomness::{LocalVrfCoordinator, RequestId};

/// Answers one pending request and delivers it to its consumer.
///
/// # Errors
///
/// Returns [`GatewayError::RandomnessRequestNotFound`] if the request is
/// not pending, [`GatewayError::InsufficientSubscriptionBalance`] if the
/// subscription cannot pay the fee, or any error the consumer arisan
/// returns when it rejects the words.
pub async fn deliver_fulfillment(
    coordinator: &LocalVrfCoordinator,
    service: &ArisanService,
    request_id: RequestId,
) -> Result<Payout, GatewayError> {
    let fulfillment = coordinator.fulfill(request_id)?;
    service.fulfill_randomness(fulfillment).await
}

/// Task that fulfills announced requests until the coordinator goes away.
#[derive(Debug)]
pub struct FulfillmentWorker {
    coordinator: Arc<LocalVrfCoordinator>,
    service: ArisanService,
    announcements: mpsc::UnboundedReceiver<RequestId>,
    delay: Duration,
}

impl FulfillmentWorker {
    /// Creates a worker reading from the coordinator's announcement channel.
    #[must_use]
    pub fn new(
        coordinator: Arc<LocalVrfCoordinator>,
        service: ArisanService,
        announcements: mpsc::UnboundedReceiver<RequestId>,
        delay: Duration,
    ) -> Self {
        Self {
            coordinator,
            service,
            announcements,
            delay,
        }
    }

    /// Runs until every sender of the announcement channel is dropped.
    ///
    /// Requests are answered one at a time in announcement order. A
    /// failed delivery is logged and the worker moves on; the arisan keeps
    /// waiting until its request is answered some other way.
    pub async fn run(mut self) {
        tracing::info!(delay_ms = self.delay.as_millis(), "fulfillment worker started");
        while let Some(request_id) = self.announcements.recv().await {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match deliver_fulfillment(&self.coordinator, &self.service, request_id).await {
                Ok(payout) => {
                    tracing::debug!(%request_id, arisan_id = %payout.arisan_id, "fulfillment delivered");
                }
                // Already answered through the REST route.
                Err(GatewayError::RandomnessRequestNotFound(_)) => {
                    tracing::debug!(%request_id, "request no longer pending");
                }
                Err(err) => {
                    tracing::warn!(%request_id, error = %err, "fulfillment failed");
                }
            }
        }
        tracing::info!("fulfillment worker stopped");
    }

    /// Spawns [`FulfillmentWorker::run`] onto the Tokio runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
