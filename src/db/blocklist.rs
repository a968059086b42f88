//! Blocklist storage.
//!
//! Keyed by infohash when known, otherwise by the (event, indexer, title)
//! triple — enforced by partial unique indexes, which is what makes repeated
//! blocklisting idempotent.

use crate::error::DatabaseError;
use crate::types::{BlocklistReason, EventId};
use crate::{Error, Result};

use super::{BlocklistItem, Database};

/// New blocklist row
#[derive(Debug, Clone)]
pub struct NewBlocklistItem {
    /// Event the release is blocked for
    pub event_id: EventId,
    /// Indexer the release came from
    pub indexer: String,
    /// Release title
    pub title: String,
    /// Torrent infohash, when known
    pub infohash: Option<String>,
    /// Why it was blocked
    pub reason: BlocklistReason,
}

impl Database {
    /// Add a blocklist row; inserting an already-blocked release is a no-op
    pub async fn add_blocklist_item(&self, item: &NewBlocklistItem) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO blocklist (event_id, indexer, title, infohash, reason, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.event_id)
        .bind(&item.indexer)
        .bind(&item.title)
        .bind(&item.infohash)
        .bind(item.reason.to_i32())
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to add blocklist item: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Whether a release is blocked for an event (by infohash or by triple)
    pub async fn is_blocklisted(
        &self,
        event_id: EventId,
        indexer: &str,
        title: &str,
        infohash: Option<&str>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM blocklist
            WHERE (infohash IS NOT NULL AND infohash = ?)
               OR (event_id = ? AND indexer = ? AND title = ?)
            "#,
        )
        .bind(infohash)
        .bind(event_id)
        .bind(indexer)
        .bind(title)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check blocklist: {}",
                e
            )))
        })?;

        Ok(count > 0)
    }

    /// Blocklist rows for an event
    pub async fn list_blocklist_for_event(&self, event_id: EventId) -> Result<Vec<BlocklistItem>> {
        let rows = sqlx::query_as::<_, BlocklistItem>(
            "SELECT id, event_id, indexer, title, infohash, reason, added_at \
             FROM blocklist WHERE event_id = ? ORDER BY added_at DESC",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list blocklist: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Prune rows older than the horizon; returns how many were deleted
    pub async fn prune_blocklist(&self, older_than: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM blocklist WHERE added_at < ?")
            .bind(older_than)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to prune blocklist: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
