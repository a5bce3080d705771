//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams arisan events to clients that
//! subscribed to them and answers `get_state` queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
