//! Domain layer: core types, the arisan state machine, the registry and
//! the event system.
//!
//! This module contains the server-side domain model including arisan
//! identity, caller identities and wei amounts, the arisan state machine
//! with its metadata entry, the event bus for broadcasting state changes,
//! the registry for concurrent arisan storage and the payout ledger.

pub mod amount;
pub mod arisan;
pub mod arisan_entry;
pub mod arisan_event;
pub mod arisan_id;
pub mod arisan_registry;
pub mod event_bus;
pub mod identity;
pub mod payout_ledger;

pub use amount::Amount;
pub use arisan::{Arisan, ArisanStatus, DrawRequest, Payout};
pub use arisan_entry::{ArisanEntry, ArisanSnapshot, ArisanSummary};
pub use arisan_event::ArisanEvent;
pub use arisan_id::ArisanId;
pub use arisan_registry::ArisanRegistry;
pub use event_bus::{ArisanEventStream, EventBus};
pub use identity::Identity;
pub use payout_ledger::PayoutLedger;
