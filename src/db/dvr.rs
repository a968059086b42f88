//! DVR storage: IPTV channels, league mappings, EPG programs, recordings.

use crate::error::DatabaseError;
use crate::types::{EventId, RecordingId, RecordingStatus};
use crate::{Error, Result};

use super::{Channel, Database, EpgProgram, LeagueChannel, Recording};

/// New IPTV channel row
#[derive(Debug, Clone)]
pub struct NewChannel {
    /// Channel display name
    pub name: String,
    /// TVG identifier linking the channel to EPG programs
    pub tvg_id: Option<String>,
    /// Stream URL handed to the recorder
    pub stream_url: String,
    /// Auto-mapper quality assessment
    pub quality_score: i64,
}

/// New EPG program row
#[derive(Debug, Clone)]
pub struct NewEpgProgram {
    /// TVG identifier of the broadcasting channel
    pub channel_tvg_id: String,
    /// Program title
    pub title: String,
    /// Program description
    pub description: Option<String>,
    /// Program category
    pub category: Option<String>,
    /// Whether the EPG source flags this as sports programming
    pub is_sports_program: bool,
    /// Program start (unix timestamp)
    pub start_time: i64,
    /// Program end (unix timestamp)
    pub end_time: i64,
}

/// New DVR recording row
#[derive(Debug, Clone)]
pub struct NewRecording {
    /// Event being recorded (None for one-off captures)
    pub event_id: Option<EventId>,
    /// Specific part, when part-scoped
    pub part_id: Option<i64>,
    /// Channel to record
    pub channel_id: i64,
    /// Scheduled start (padding applied)
    pub scheduled_start: i64,
    /// Scheduled end (padding applied)
    pub scheduled_end: i64,
    /// Recorder output path
    pub output_path: String,
}

const RECORDING_COLUMNS: &str = "id, event_id, part_id, channel_id, scheduled_start, \
     scheduled_end, actual_start, actual_end, output_path, file_size, detected_quality, \
     quality_score, format_score, status, error_message, created_at";

impl Database {
    /// Insert an IPTV channel
    pub async fn insert_channel(&self, channel: &NewChannel) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO iptv_channels (name, tvg_id, stream_url, quality_score) VALUES (?, ?, ?, ?)",
        )
        .bind(&channel.name)
        .bind(&channel.tvg_id)
        .bind(&channel.stream_url)
        .bind(channel.quality_score)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert channel: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get a channel by ID
    pub async fn get_channel(&self, id: i64) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, Channel>(
            "SELECT id, name, tvg_id, stream_url, quality_score FROM iptv_channels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!("Failed to get channel: {}", e)))
        })?;

        Ok(row)
    }

    /// Look up a channel by its TVG identifier
    pub async fn get_channel_by_tvg(&self, tvg_id: &str) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, Channel>(
            "SELECT id, name, tvg_id, stream_url, quality_score FROM iptv_channels \
             WHERE tvg_id = ? ORDER BY quality_score DESC, id ASC LIMIT 1",
        )
        .bind(tvg_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get channel by tvg id: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Map a league onto a channel
    pub async fn map_league_channel(
        &self,
        league: &str,
        channel_id: i64,
        auto_mapped: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO league_channel_map (league, channel_id, auto_mapped) \
             VALUES (?, ?, ?)",
        )
        .bind(league)
        .bind(channel_id)
        .bind(auto_mapped as i32)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to map league channel: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Best channel for a league: the auto-mapper's highest-quality mapping,
    /// falling back to the league's declared preferred channel
    pub async fn best_channel_for_league(&self, league: &str) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, Channel>(
            r#"
            SELECT c.id, c.name, c.tvg_id, c.stream_url, c.quality_score
            FROM league_channel_map m
            JOIN iptv_channels c ON c.id = m.channel_id
            WHERE m.league = ?
            ORDER BY m.auto_mapped DESC, c.quality_score DESC, c.id ASC
            LIMIT 1
            "#,
        )
        .bind(league)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find league channel: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// League mappings (operator surface)
    pub async fn list_league_channels(&self, league: &str) -> Result<Vec<LeagueChannel>> {
        let rows = sqlx::query_as::<_, LeagueChannel>(
            "SELECT id, league, channel_id, auto_mapped FROM league_channel_map \
             WHERE league = ? ORDER BY id ASC",
        )
        .bind(league)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list league channels: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Insert an EPG program
    pub async fn insert_epg_program(&self, program: &NewEpgProgram) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO epg_programs (
                channel_tvg_id, title, description, category, is_sports_program,
                start_time, end_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&program.channel_tvg_id)
        .bind(&program.title)
        .bind(&program.description)
        .bind(&program.category)
        .bind(program.is_sports_program as i32)
        .bind(program.start_time)
        .bind(program.end_time)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert EPG program: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Sports-programming EPG slice inside a window, in start order
    pub async fn list_epg_programs_in_window(&self, from: i64, to: i64) -> Result<Vec<EpgProgram>> {
        let rows = sqlx::query_as::<_, EpgProgram>(
            "SELECT id, channel_tvg_id, title, description, category, is_sports_program, \
             start_time, end_time FROM epg_programs \
             WHERE start_time >= ? AND start_time <= ? ORDER BY start_time ASC, id ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list EPG programs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Prune EPG programs that ended before the horizon
    pub async fn prune_epg_programs(&self, older_than: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM epg_programs WHERE end_time < ?")
            .bind(older_than)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to prune EPG programs: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Insert a DVR recording (status starts at Scheduled)
    pub async fn insert_recording(&self, recording: &NewRecording) -> Result<RecordingId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO dvr_recordings (
                event_id, part_id, channel_id, scheduled_start, scheduled_end,
                output_path, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(recording.event_id)
        .bind(recording.part_id)
        .bind(recording.channel_id)
        .bind(recording.scheduled_start)
        .bind(recording.scheduled_end)
        .bind(&recording.output_path)
        .bind(RecordingStatus::Scheduled.to_i32())
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert recording: {}",
                e
            )))
        })?;

        Ok(RecordingId(result.last_insert_rowid()))
    }

    /// Get a recording by ID
    pub async fn get_recording(&self, id: RecordingId) -> Result<Option<Recording>> {
        let row = sqlx::query_as::<_, Recording>(&format!(
            "SELECT {RECORDING_COLUMNS} FROM dvr_recordings WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get recording: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Whether an event/part already holds an active (Scheduled/Recording) slot
    pub async fn has_active_recording(
        &self,
        event_id: EventId,
        part_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dvr_recordings \
             WHERE event_id = ? AND (part_id IS ? OR part_id = ?) AND status IN (?, ?)",
        )
        .bind(event_id)
        .bind(part_id)
        .bind(part_id)
        .bind(RecordingStatus::Scheduled.to_i32())
        .bind(RecordingStatus::Recording.to_i32())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check active recording: {}",
                e
            )))
        })?;

        Ok(count > 0)
    }

    /// Whether an event already has a recording in flight in the wider sense
    /// used at scheduling time: Scheduled, Recording, or Completed-awaiting-
    /// import. Keeps a pass from double-booking an event whose capture is
    /// done but not yet imported.
    pub async fn has_pending_recording(
        &self,
        event_id: EventId,
        part_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dvr_recordings \
             WHERE event_id = ? AND (part_id IS ? OR part_id = ?) AND status IN (?, ?, ?)",
        )
        .bind(event_id)
        .bind(part_id)
        .bind(part_id)
        .bind(RecordingStatus::Scheduled.to_i32())
        .bind(RecordingStatus::Recording.to_i32())
        .bind(RecordingStatus::Completed.to_i32())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check pending recording: {}",
                e
            )))
        })?;

        Ok(count > 0)
    }

    /// Recordings in a given status, in schedule order
    pub async fn list_recordings_by_status(
        &self,
        status: RecordingStatus,
    ) -> Result<Vec<Recording>> {
        let rows = sqlx::query_as::<_, Recording>(&format!(
            "SELECT {RECORDING_COLUMNS} FROM dvr_recordings WHERE status = ? \
             ORDER BY scheduled_start ASC, id ASC"
        ))
        .bind(status.to_i32())
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list recordings: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Guarded status transition; returns whether it was applied
    pub async fn transition_recording_status(
        &self,
        id: RecordingId,
        expected: RecordingStatus,
        next: RecordingStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE dvr_recordings SET status = ? WHERE id = ? AND status = ?",
        )
        .bind(next.to_i32())
        .bind(id)
        .bind(expected.to_i32())
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to transition recording status: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the actual recorder start
    pub async fn set_recording_started(&self, id: RecordingId, at: i64) -> Result<()> {
        sqlx::query("UPDATE dvr_recordings SET actual_start = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set recording start: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Stamp the recorder end and the produced file size
    pub async fn set_recording_finished(
        &self,
        id: RecordingId,
        at: i64,
        file_size: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE dvr_recordings SET actual_end = ?, file_size = ? WHERE id = ?")
            .bind(at)
            .bind(file_size)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set recording finish: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record the probe outcome and computed scores
    pub async fn set_recording_probe(
        &self,
        id: RecordingId,
        detected_quality: &str,
        quality_score: i64,
        format_score: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE dvr_recordings SET detected_quality = ?, quality_score = ?, format_score = ? \
             WHERE id = ?",
        )
        .bind(detected_quality)
        .bind(quality_score)
        .bind(format_score)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set recording probe: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Set a recording's status with an optional error message
    pub async fn set_recording_status(
        &self,
        id: RecordingId,
        status: RecordingStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE dvr_recordings SET status = ?, error_message = ? WHERE id = ?",
        )
        .bind(status.to_i32())
        .bind(error_message)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set recording status: {}",
                e
            )))
        })?;

        Ok(())
    }
}
