//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::SnapshotRow;
use crate::config::GatewayConfig;
use crate::domain::{ArisanEvent, ArisanId, ArisanSnapshot};
use crate::error::GatewayError;

/// Upper bound for retention windows; `chrono::Duration` overflows past it.
const MAX_RETENTION_DAYS: i64 = 1_000_000;

type SnapshotTuple = (i64, i64, bool, serde_json::Value, DateTime<Utc>);

fn to_db_id(id: ArisanId) -> Result<i64, GatewayError> {
    i64::try_from(id.get())
        .map_err(|_| GatewayError::PersistenceError(format!("arisan id {id} exceeds BIGINT")))
}

fn from_db_id(raw: i64) -> Result<ArisanId, GatewayError> {
    u64::try_from(raw)
        .map(ArisanId::new)
        .map_err(|_| GatewayError::PersistenceError(format!("negative arisan id {raw}")))
}

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized by the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_event(&self, event: &ArisanEvent) -> Result<i64, GatewayError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (arisan_id, event_type, payload) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(to_db_id(event.arisan_id())?)
        .bind(event.event_type_str())
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Saves an arisan state snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_snapshot(&self, snapshot: &ArisanSnapshot) -> Result<i64, GatewayError> {
        let state_json = serde_json::to_value(snapshot)
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO arisan_snapshots (arisan_id, deleted, state_json) \
             VALUES ($1, FALSE, $2) RETURNING id",
        )
        .bind(to_db_id(snapshot.arisan.id())?)
        .bind(state_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Records that an arisan was deleted, so it is not restored and its
    /// id stays retired.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_tombstone(&self, arisan_id: ArisanId) -> Result<i64, GatewayError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO arisan_snapshots (arisan_id, deleted, state_json) \
             VALUES ($1, TRUE, 'null'::jsonb) RETURNING id",
        )
        .bind(to_db_id(arisan_id)?)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Loads the latest snapshot row for each arisan using `DISTINCT ON`.
    ///
    /// Tombstones are included; callers decide what to do with them.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn load_latest_snapshots(&self) -> Result<Vec<SnapshotRow>, GatewayError> {
        let rows = sqlx::query_as::<_, SnapshotTuple>(
            "SELECT DISTINCT ON (arisan_id) id, arisan_id, deleted, state_json, snapshot_at \
             FROM arisan_snapshots ORDER BY arisan_id, snapshot_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, arisan_id, deleted, state_json, snapshot_at)| {
                Ok(SnapshotRow {
                    id,
                    arisan_id: from_db_id(arisan_id)?,
                    deleted,
                    state_json,
                    snapshot_at,
                })
            })
            .collect()
    }

    /// Loads every `winner_selected` event, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// if a stored payload does not decode.
    pub async fn load_winner_events(&self) -> Result<Vec<ArisanEvent>, GatewayError> {
        let payloads = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT payload FROM events WHERE event_type = 'winner_selected' ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        payloads
            .into_iter()
            .map(|payload| {
                serde_json::from_value(payload)
                    .map_err(|e| GatewayError::PersistenceError(format!("winner event: {e}")))
            })
            .collect()
    }

    /// Deletes superseded snapshots older than the given number of days.
    ///
    /// The latest row of every arisan is always kept.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_old_snapshots(&self, before_days: u64) -> Result<u64, GatewayError> {
        let days = i64::try_from(before_days).unwrap_or(i64::MAX).min(MAX_RETENTION_DAYS);
        let cutoff = Utc::now() - chrono::Duration::days(days);

        let result = sqlx::query(
            "DELETE FROM arisan_snapshots s WHERE s.snapshot_at < $1 AND s.id <> \
             (SELECT l.id FROM arisan_snapshots l WHERE l.arisan_id = s.arisan_id \
              ORDER BY l.snapshot_at DESC, l.id DESC LIMIT 1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
