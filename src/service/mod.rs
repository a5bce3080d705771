//! Service layer: business logic orchestration.
//!
//! [`ArisanService`] coordinates arisan operations, drives the state
//! machine and the randomness gateway, and emits events through the
//! [`super::domain::EventBus`]. [`fulfillment`] runs the task that
//! answers randomness requests from the local coordinator.

pub mod arisan_service;
pub mod fulfillment;

pub use arisan_service::ArisanService;
pub use fulfillment::{FulfillmentWorker, deliver_fulfillment};
