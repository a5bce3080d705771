//! Database models for snapshot rows and the registry rebuilt from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ArisanId, ArisanSnapshot};
use crate::error::GatewayError;

/// An arisan snapshot row from the `arisan_snapshots` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Arisan that was snapshotted.
    pub arisan_id: ArisanId,
    /// Tombstone marker written when the arisan is deleted.
    pub deleted: bool,
    /// Full [`ArisanSnapshot`] as JSONB; `null` for tombstones.
    pub state_json: serde_json::Value,
    /// Snapshot timestamp.
    pub snapshot_at: DateTime<Utc>,
}

impl SnapshotRow {
    /// Decodes the stored arisan state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the row is a
    /// tombstone or its JSON does not decode.
    pub fn decode(&self) -> Result<ArisanSnapshot, GatewayError> {
        if self.deleted {
            return Err(GatewayError::PersistenceError(format!(
                "arisan {} is a tombstone",
                self.arisan_id
            )));
        }
        serde_json::from_value(self.state_json.clone()).map_err(|e| {
            GatewayError::PersistenceError(format!("snapshot of arisan {}: {e}", self.arisan_id))
        })
    }
}

/// Registry contents recovered from the latest snapshots.
#[derive(Debug, Clone, Default)]
pub struct RestoredRegistry {
    /// Live arisans, ascending by id.
    pub snapshots: Vec<ArisanSnapshot>,
    /// One past the highest id ever persisted, live or deleted.
    pub next_id: ArisanId,
}

impl RestoredRegistry {
    /// Builds the restore set from the latest row of each arisan.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if a live row does not
    /// decode.
    pub fn from_rows(rows: &[SnapshotRow]) -> Result<Self, GatewayError> {
        let mut restored = Self::default();
        for row in rows {
            if row.arisan_id >= restored.next_id {
                restored.next_id = row.arisan_id.next();
            }
            if !row.deleted {
                restored.snapshots.push(row.decode()?);
            }
        }
        restored.snapshots.sort_by_key(|s| s.arisan.id());
        Ok(restored)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn tombstone(id: u64) -> SnapshotRow {
        SnapshotRow {
            id: 1,
            arisan_id: ArisanId::new(id),
            deleted: true,
            state_json: serde_json::Value::Null,
            snapshot_at: Utc::now(),
        }
    }

    #[test]
    fn tombstones_advance_next_id() {
        let rows = vec![tombstone(0), tombstone(4)];
        let Ok(restored) = RestoredRegistry::from_rows(&rows) else {
            panic!("restore set failed");
        };
        assert!(restored.snapshots.is_empty());
        assert_eq!(restored.next_id, ArisanId::new(5));
    }

    #[test]
    fn empty_rows_start_at_zero() {
        let Ok(restored) = RestoredRegistry::from_rows(&[]) else {
            panic!("restore set failed");
        };
        assert_eq!(restored.next_id, ArisanId::new(0));
    }

    #[test]
    fn undecodable_live_row_is_an_error() {
        let mut row = tombstone(2);
        row.deleted = false;
        row.state_json = serde_json::json!({ "garbage": true });
        assert!(matches!(
            RestoredRegistry::from_rows(&[row]),
            Err(GatewayError::PersistenceError(_))
        ));
    }
}
