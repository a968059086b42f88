//! Immutable history ledger.

use crate::error::DatabaseError;
use crate::types::EventId;
use crate::{Error, Result};

use super::{Database, HistoryEntry};

impl Database {
    /// Append a history entry; rows are never updated or deleted
    pub async fn record_history(
        &self,
        event_id: Option<EventId>,
        kind: &str,
        title: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO history (event_id, kind, title, detail, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(kind)
        .bind(title)
        .bind(detail)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record history: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Most recent history entries, newest first
    pub async fn list_history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            "SELECT id, event_id, kind, title, detail, created_at FROM history \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list history: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// History entries for one event, newest first
    pub async fn list_event_history(&self, event_id: EventId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            "SELECT id, event_id, kind, title, detail, created_at FROM history \
             WHERE event_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list event history: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
