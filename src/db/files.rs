//! Imported event file storage.

use crate::error::DatabaseError;
use crate::types::EventId;
use crate::{Error, Result};

use super::{Database, EventFile};

/// New event file row
#[derive(Debug, Clone)]
pub struct NewEventFile {
    /// Event the file belongs to
    pub event_id: EventId,
    /// Part name, when the file covers a single part
    pub part_name: Option<String>,
    /// Library path
    pub path: String,
    /// Size in bytes
    pub size: i64,
    /// Canonical quality label
    pub quality_label: String,
    /// Quality score at import time
    pub quality_score: i64,
    /// Custom-format score at import time
    pub format_score: i64,
    /// Artifact source ("Indexer"/"IPTV")
    pub source: String,
    /// Codec token, when known
    pub codec: Option<String>,
}

impl Database {
    /// Insert an event file row
    pub async fn insert_event_file(&self, file: &NewEventFile) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO event_files (
                event_id, part_name, path, size, quality_label, quality_score,
                format_score, source, codec, added_at, on_disk
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(file.event_id)
        .bind(&file.part_name)
        .bind(&file.path)
        .bind(file.size)
        .bind(&file.quality_label)
        .bind(file.quality_score)
        .bind(file.format_score)
        .bind(&file.source)
        .bind(&file.codec)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert event file: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Files imported for an event
    pub async fn list_event_files(&self, event_id: EventId) -> Result<Vec<EventFile>> {
        let rows = sqlx::query_as::<_, EventFile>(
            "SELECT id, event_id, part_name, path, size, quality_label, quality_score, \
             format_score, source, codec, added_at, on_disk \
             FROM event_files WHERE event_id = ? ORDER BY added_at ASC, id ASC",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list event files: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// An existing file row for the exact library path, if one exists.
    /// Lets a retried import return the same row instead of inserting twice.
    pub async fn find_event_file_by_path(&self, path: &str) -> Result<Option<EventFile>> {
        let row = sqlx::query_as::<_, EventFile>(
            "SELECT id, event_id, part_name, path, size, quality_label, quality_score, \
             format_score, source, codec, added_at, on_disk \
             FROM event_files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find event file: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Flag whether the file is still present on disk
    pub async fn set_event_file_on_disk(&self, id: i64, on_disk: bool) -> Result<()> {
        sqlx::query("UPDATE event_files SET on_disk = ? WHERE id = ?")
            .bind(on_disk as i32)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update event file: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
