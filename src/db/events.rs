//! Monitored event and part CRUD operations.

use crate::error::DatabaseError;
use crate::types::EventId;
use crate::{Error, Result};

use super::{Database, EventPart, SportEvent};

/// New event to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Event title
    pub title: String,
    /// Sport keyword
    pub sport: String,
    /// League/organization name
    pub league: Option<String>,
    /// Home team
    pub home_team: Option<String>,
    /// Away team
    pub away_team: Option<String>,
    /// Scheduled start (unix timestamp, UTC)
    pub event_date: i64,
    /// TV broadcast start, when known
    pub broadcast_time: Option<i64>,
    /// External catalog id
    pub external_id: Option<String>,
    /// Whether the event is monitored
    pub monitored: bool,
    /// Quality profile governing acquisition
    pub quality_profile_id: Option<i64>,
}

/// New event part to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewEventPart {
    /// Parent event
    pub event_id: EventId,
    /// Part name
    pub name: String,
    /// Ordering within the event
    pub part_number: i32,
    /// Whether the part is monitored
    pub monitored: bool,
}

const EVENT_COLUMNS: &str = "id, title, sport, league, home_team, away_team, event_date, \
     broadcast_time, external_id, monitored, quality_profile_id, has_file, file_path, \
     last_search_at, created_at";

impl Database {
    /// Insert a new event record
    pub async fn insert_event(&self, event: &NewEvent) -> Result<EventId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO events (
                title, sport, league, home_team, away_team, event_date,
                broadcast_time, external_id, monitored, quality_profile_id,
                has_file, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&event.title)
        .bind(&event.sport)
        .bind(&event.league)
        .bind(&event.home_team)
        .bind(&event.away_team)
        .bind(event.event_date)
        .bind(event.broadcast_time)
        .bind(&event.external_id)
        .bind(event.monitored as i32)
        .bind(event.quality_profile_id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert event: {}",
                e
            )))
        })?;

        Ok(EventId(result.last_insert_rowid()))
    }

    /// Get an event by ID
    pub async fn get_event(&self, id: EventId) -> Result<Option<SportEvent>> {
        let row = sqlx::query_as::<_, SportEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!("Failed to get event: {}", e)))
        })?;

        Ok(row)
    }

    /// Monitored events that still need acquisition (no file yet), in
    /// deterministic event-date order
    pub async fn list_events_needing_acquisition(&self) -> Result<Vec<SportEvent>> {
        let rows = sqlx::query_as::<_, SportEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE monitored = 1 AND has_file = 0 \
             ORDER BY event_date ASC, id ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list events needing acquisition: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Monitored future events inside the DVR scheduling window
    pub async fn list_events_in_window(&self, from: i64, to: i64) -> Result<Vec<SportEvent>> {
        let rows = sqlx::query_as::<_, SportEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE monitored = 1 AND event_date >= ? AND event_date <= ? \
             ORDER BY event_date ASC, id ASC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list events in window: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Set the monitored flag
    pub async fn set_event_monitored(&self, id: EventId, monitored: bool) -> Result<()> {
        sqlx::query("UPDATE events SET monitored = ? WHERE id = ?")
            .bind(monitored as i32)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set monitored flag: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record a successful import on the event row
    pub async fn set_event_file(&self, id: EventId, path: &str) -> Result<()> {
        sqlx::query("UPDATE events SET has_file = 1, file_path = ? WHERE id = ?")
            .bind(path)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set event file: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record an external search attempt (planner backoff bookkeeping)
    pub async fn touch_event_search(&self, id: EventId, at: i64) -> Result<()> {
        sqlx::query("UPDATE events SET last_search_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record search attempt: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete an event (cascades to parts, queue items and recordings)
    pub async fn delete_event(&self, id: EventId) -> Result<()> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete event: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Insert a new event part
    pub async fn insert_event_part(&self, part: &NewEventPart) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_parts (event_id, name, part_number, monitored, has_file)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(part.event_id)
        .bind(&part.name)
        .bind(part.part_number)
        .bind(part.monitored as i32)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert event part: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Parts of an event, in part order
    pub async fn list_event_parts(&self, event_id: EventId) -> Result<Vec<EventPart>> {
        let rows = sqlx::query_as::<_, EventPart>(
            "SELECT id, event_id, name, part_number, monitored, has_file \
             FROM event_parts WHERE event_id = ? ORDER BY part_number ASC",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list event parts: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Get a part by ID
    pub async fn get_event_part(&self, part_id: i64) -> Result<Option<EventPart>> {
        let row = sqlx::query_as::<_, EventPart>(
            "SELECT id, event_id, name, part_number, monitored, has_file \
             FROM event_parts WHERE id = ?",
        )
        .bind(part_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get event part: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Record a successful import on a part row
    pub async fn set_part_file(&self, part_id: i64) -> Result<()> {
        sqlx::query("UPDATE event_parts SET has_file = 1 WHERE id = ?")
            .bind(part_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set part file: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
