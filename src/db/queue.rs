//! Download queue CRUD operations.

use crate::error::DatabaseError;
use crate::types::{DownloadStatus, EventId, QueueItemId};
use crate::{Error, Result};

use super::{Database, QueueItem};

/// New queue item to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    /// Event being acquired
    pub event_id: EventId,
    /// Specific part, when the grab was part-scoped
    pub part_id: Option<i64>,
    /// Download client name
    pub client: String,
    /// Opaque client-side download id
    pub download_id: String,
    /// Release title
    pub title: String,
    /// Client category
    pub category: Option<String>,
    /// Indexer the release came from
    pub indexer: String,
    /// Torrent infohash
    pub infohash: Option<String>,
    /// Transfer protocol
    pub protocol: String,
    /// Total size in bytes
    pub size: i64,
}

const QUEUE_COLUMNS: &str = "id, event_id, part_id, client, download_id, title, category, \
     indexer, infohash, protocol, size, downloaded, progress, time_remaining_secs, status, \
     status_message, resume_status, retry_count, missing_count, grabbed_at, completed_at, \
     imported_at";

impl Database {
    /// Insert a new queue item (status starts at Queued)
    pub async fn insert_queue_item(&self, item: &NewQueueItem) -> Result<QueueItemId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO download_queue (
                event_id, part_id, client, download_id, title, category, indexer,
                infohash, protocol, size, downloaded, progress, status, retry_count,
                missing_count, grabbed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0.0, ?, 0, 0, ?)
            "#,
        )
        .bind(item.event_id)
        .bind(item.part_id)
        .bind(&item.client)
        .bind(&item.download_id)
        .bind(&item.title)
        .bind(&item.category)
        .bind(&item.indexer)
        .bind(&item.infohash)
        .bind(&item.protocol)
        .bind(item.size)
        .bind(DownloadStatus::Queued.to_i32())
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert queue item: {}",
                e
            )))
        })?;

        Ok(QueueItemId(result.last_insert_rowid()))
    }

    /// Get a queue item by ID
    pub async fn get_queue_item(&self, id: QueueItemId) -> Result<Option<QueueItem>> {
        let row = sqlx::query_as::<_, QueueItem>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM download_queue WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get queue item: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Non-terminal queue items in deterministic id order (the monitor's work list)
    pub async fn list_active_queue_items(&self) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query_as::<_, QueueItem>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM download_queue WHERE status != ? ORDER BY id ASC"
        ))
        .bind(DownloadStatus::Imported.to_i32())
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list active queue items: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Active (not failed, not terminal) queue items for one event; used by
    /// the planner to decide whether an event is already being acquired
    pub async fn list_event_queue_items(&self, event_id: EventId) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query_as::<_, QueueItem>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM download_queue WHERE event_id = ? ORDER BY id ASC"
        ))
        .bind(event_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list event queue items: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Guarded status transition: only applies when the row still holds
    /// `expected`. Returns whether the transition was applied — this is what
    /// makes terminal transitions observe-at-most-once across workers.
    pub async fn transition_queue_status(
        &self,
        id: QueueItemId,
        expected: DownloadStatus,
        next: DownloadStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE download_queue SET status = ? WHERE id = ? AND status = ?",
        )
        .bind(next.to_i32())
        .bind(id)
        .bind(expected.to_i32())
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to transition queue status: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Unconditional status update, with an optional operator-facing message
    pub async fn set_queue_status(
        &self,
        id: QueueItemId,
        status: DownloadStatus,
        message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE download_queue SET status = ?, status_message = ? WHERE id = ?",
        )
        .bind(status.to_i32())
        .bind(message)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set queue status: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Enter Warning while remembering the status to resume into
    pub async fn set_queue_warning(
        &self,
        id: QueueItemId,
        message: &str,
        resume_status: DownloadStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE download_queue SET status = ?, status_message = ?, resume_status = ? \
             WHERE id = ?",
        )
        .bind(DownloadStatus::Warning.to_i32())
        .bind(message)
        .bind(resume_status.to_i32())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set queue warning: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Clear a Warning back into the remembered (or given) status
    pub async fn clear_queue_warning(&self, id: QueueItemId, status: DownloadStatus) -> Result<()> {
        sqlx::query(
            "UPDATE download_queue SET status = ?, status_message = NULL, resume_status = NULL \
             WHERE id = ?",
        )
        .bind(status.to_i32())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to clear queue warning: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Update transfer progress fields from a client status reading
    pub async fn update_queue_progress(
        &self,
        id: QueueItemId,
        progress: f64,
        downloaded: i64,
        size: i64,
        time_remaining_secs: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE download_queue SET progress = ?, downloaded = ?, size = ?, \
             time_remaining_secs = ? WHERE id = ?",
        )
        .bind(progress.clamp(0.0, 100.0))
        .bind(downloaded)
        .bind(size)
        .bind(time_remaining_secs)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update queue progress: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Bump the consecutive missing-from-client counter; returns the new value
    pub async fn increment_queue_missing(&self, id: QueueItemId) -> Result<i64> {
        sqlx::query("UPDATE download_queue SET missing_count = missing_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to increment missing count: {}",
                    e
                )))
            })?;

        let count: i64 =
            sqlx::query_scalar("SELECT missing_count FROM download_queue WHERE id = ?")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read missing count: {}",
                        e
                    )))
                })?;

        Ok(count)
    }

    /// Re-point a queue item at a new client-side download id (debrid
    /// proxies rename downloads; `find_by_title` recovers the new id)
    pub async fn update_queue_download_id(&self, id: QueueItemId, download_id: &str) -> Result<()> {
        sqlx::query("UPDATE download_queue SET download_id = ?, missing_count = 0 WHERE id = ?")
            .bind(download_id)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update download id: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Any sighting resets the missing counter
    pub async fn reset_queue_missing(&self, id: QueueItemId) -> Result<()> {
        sqlx::query("UPDATE download_queue SET missing_count = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to reset missing count: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Bump the redownload retry counter; returns the new value
    pub async fn increment_queue_retry(&self, id: QueueItemId) -> Result<i64> {
        sqlx::query("UPDATE download_queue SET retry_count = retry_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to increment retry count: {}",
                    e
                )))
            })?;

        let count: i64 = sqlx::query_scalar("SELECT retry_count FROM download_queue WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read retry count: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Stamp the transfer completion time (first completion only)
    pub async fn set_queue_completed_at(&self, id: QueueItemId, at: i64) -> Result<()> {
        sqlx::query(
            "UPDATE download_queue SET completed_at = ? WHERE id = ? AND completed_at IS NULL",
        )
        .bind(at)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set completion time: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Stamp the import time — the import idempotency guard. Returns false if
    /// the item was already imported.
    pub async fn try_mark_imported(&self, id: QueueItemId, at: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE download_queue SET imported_at = ?, status = ? \
             WHERE id = ? AND imported_at IS NULL",
        )
        .bind(at)
        .bind(DownloadStatus::Imported.to_i32())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark imported: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a queue item
    pub async fn delete_queue_item(&self, id: QueueItemId) -> Result<()> {
        sqlx::query("DELETE FROM download_queue WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete queue item: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
