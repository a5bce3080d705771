//! Persistence layer: PostgreSQL event log and arisan snapshots.
//!
//! Disabled by default. When `PERSISTENCE_ENABLED` is set the gateway
//! recovers its registry from the latest snapshots at startup, appends
//! every event to the log and writes periodic snapshots. The concrete
//! implementation uses `sqlx::PgPool` for async PostgreSQL access.

pub mod models;
pub mod postgres;
pub mod recorder;
pub mod recovery;

pub use postgres::PostgresPersistence;
pub use recorder::{EventRecorder, SnapshotTask};
pub use recovery::{RecoveryReport, recover};
