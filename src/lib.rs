//! # arisan-gateway
//!
//! REST API and WebSocket gateway for arisan pools: rotating-contribution
//! groups where members pay a fixed amount each round and one member,
//! drawn with verifiable randomness, takes the whole pot.
//!
//! Winner selection is asynchronous. An organizer asks for a draw, the
//! arisan files a request with a [`randomness::RandomnessGateway`] and
//! the winner is chosen only when that exact request is fulfilled.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ArisanService (service/) ◄── FulfillmentWorker
//!     ├── EventBus (domain/)                 │
//!     │                                      │
//!     ├── ArisanRegistry, PayoutLedger       │
//!     ├── LocalVrfCoordinator (randomness/) ─┘
//!     │
//!     └── PostgreSQL Persistence (optional)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod randomness;
pub mod server;
pub mod service;
pub mod ws;
