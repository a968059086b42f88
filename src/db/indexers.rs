//! Indexer status storage (C5 persistence).
//!
//! The hourly counter reset happens inside the same transaction that admits a
//! query or grab, so two workers can never double-reset the window or admit
//! past the quota.

use crate::error::DatabaseError;
use crate::health;
use crate::{Error, Result};
use sqlx::Connection;

use super::{Database, IndexerStatusRow};

const STATUS_COLUMNS: &str = "indexer, consecutive_failures, last_failure_reason, \
     last_failure_at, last_success_at, disabled_until, rate_limited_until, \
     queries_this_hour, grabs_this_hour, hour_reset_at";

impl Database {
    /// Get an indexer's status row, if one exists yet
    pub async fn get_indexer_status(&self, indexer: &str) -> Result<Option<IndexerStatusRow>> {
        let row = sqlx::query_as::<_, IndexerStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM indexer_status WHERE indexer = ?"
        ))
        .bind(indexer)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get indexer status: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Ensure a status row exists for the indexer
    pub async fn ensure_indexer_status(&self, indexer: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO indexer_status (indexer) VALUES (?)")
            .bind(indexer)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to ensure indexer status: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Atomically admit a query against the hourly quota.
    ///
    /// Resets the hourly window when it has lapsed, then admits and increments
    /// only if `queries_this_hour < query_limit` (always admits when no limit
    /// is set). Returns whether the query was admitted. The whole
    /// read-decide-write runs in one transaction.
    pub async fn admit_query(
        &self,
        indexer: &str,
        query_limit: Option<u32>,
        now: i64,
    ) -> Result<bool> {
        self.admit_counted(indexer, query_limit, now, "queries_this_hour").await
    }

    /// Atomically admit a grab against the hourly grab quota.
    ///
    /// Grabs are admitted separately from queries but under the same
    /// hourly-reset discipline.
    pub async fn admit_grab(
        &self,
        indexer: &str,
        grab_limit: Option<u32>,
        now: i64,
    ) -> Result<bool> {
        self.admit_counted(indexer, grab_limit, now, "grabs_this_hour").await
    }

    async fn admit_counted(
        &self,
        indexer: &str,
        limit: Option<u32>,
        now: i64,
        counter_column: &str,
    ) -> Result<bool> {
        let mut conn = self.pool().acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        let mut tx = conn.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin admission transaction: {}",
                e
            )))
        })?;

        sqlx::query("INSERT OR IGNORE INTO indexer_status (indexer) VALUES (?)")
            .bind(indexer)
            .execute(&mut *tx)
            .await
            .map_err(admission_err)?;

        let row = sqlx::query_as::<_, IndexerStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM indexer_status WHERE indexer = ?"
        ))
        .bind(indexer)
        .fetch_one(&mut *tx)
        .await
        .map_err(admission_err)?;

        // Lapsed window: zero both counters and re-arm the reset before judging
        let window_lapsed = row.hour_reset_at.map(|r| now >= r).unwrap_or(true);
        let (mut queries, mut grabs, reset_at) = if window_lapsed {
            (0i64, 0i64, now + 3600)
        } else {
            (
                row.queries_this_hour,
                row.grabs_this_hour,
                row.hour_reset_at.unwrap_or(now + 3600),
            )
        };

        let is_query_counter = counter_column == "queries_this_hour";
        let count = if is_query_counter { queries } else { grabs };

        if let Some(limit) = limit {
            if count >= i64::from(limit) {
                // Persist the reset even when refusing, so the row reflects the window
                if window_lapsed {
                    sqlx::query(
                        "UPDATE indexer_status SET queries_this_hour = 0, grabs_this_hour = 0, \
                         hour_reset_at = ? WHERE indexer = ?",
                    )
                    .bind(reset_at)
                    .bind(indexer)
                    .execute(&mut *tx)
                    .await
                    .map_err(admission_err)?;
                    tx.commit().await.map_err(admission_err)?;
                } else {
                    tx.rollback().await.map_err(admission_err)?;
                }
                return Ok(false);
            }
        }

        if is_query_counter {
            queries += 1;
        } else {
            grabs += 1;
        }

        sqlx::query(
            "UPDATE indexer_status SET queries_this_hour = ?, grabs_this_hour = ?, hour_reset_at = ? \
             WHERE indexer = ?",
        )
        .bind(queries)
        .bind(grabs)
        .bind(reset_at)
        .bind(indexer)
        .execute(&mut *tx)
        .await
        .map_err(admission_err)?;

        tx.commit().await.map_err(admission_err)?;
        Ok(true)
    }

    /// Record a successful request: clear failure state, stamp last success
    pub async fn record_indexer_success(&self, indexer: &str, now: i64) -> Result<()> {
        self.ensure_indexer_status(indexer).await?;
        sqlx::query(
            "UPDATE indexer_status SET consecutive_failures = 0, last_failure_reason = NULL, \
             disabled_until = NULL, last_success_at = ? WHERE indexer = ?",
        )
        .bind(now)
        .bind(indexer)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record indexer success: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record a failure: bump the consecutive counter and apply the backoff
    /// ladder. Returns the new `disabled_until` timestamp.
    ///
    /// Increment and backoff computation run in one transaction so concurrent
    /// failures cannot skip rungs.
    pub async fn record_indexer_failure(
        &self,
        indexer: &str,
        reason: &str,
        now: i64,
    ) -> Result<i64> {
        let mut conn = self.pool().acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        let mut tx = conn.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin failure transaction: {}",
                e
            )))
        })?;

        sqlx::query("INSERT OR IGNORE INTO indexer_status (indexer) VALUES (?)")
            .bind(indexer)
            .execute(&mut *tx)
            .await
            .map_err(admission_err)?;

        let failures: i64 = sqlx::query_scalar(
            "SELECT consecutive_failures FROM indexer_status WHERE indexer = ?",
        )
        .bind(indexer)
        .fetch_one(&mut *tx)
        .await
        .map_err(admission_err)?;

        let failures = failures + 1;
        let disabled_until = now + health::backoff_seconds(failures);

        sqlx::query(
            "UPDATE indexer_status SET consecutive_failures = ?, last_failure_reason = ?, \
             last_failure_at = ?, disabled_until = ? WHERE indexer = ?",
        )
        .bind(failures)
        .bind(reason)
        .bind(now)
        .bind(disabled_until)
        .bind(indexer)
        .execute(&mut *tx)
        .await
        .map_err(admission_err)?;

        tx.commit().await.map_err(admission_err)?;
        Ok(disabled_until)
    }

    /// Record an HTTP 429: set the rate-limit cooldown without touching the
    /// failure counter
    pub async fn record_indexer_rate_limited(
        &self,
        indexer: &str,
        until: i64,
    ) -> Result<()> {
        self.ensure_indexer_status(indexer).await?;
        sqlx::query("UPDATE indexer_status SET rate_limited_until = ? WHERE indexer = ?")
            .bind(until)
            .bind(indexer)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record rate limit: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Manual operator reset: clear failures, cooldowns and counters
    pub async fn reset_indexer_status(&self, indexer: &str) -> Result<()> {
        sqlx::query(
            "UPDATE indexer_status SET consecutive_failures = 0, last_failure_reason = NULL, \
             last_failure_at = NULL, disabled_until = NULL, rate_limited_until = NULL, \
             queries_this_hour = 0, grabs_this_hour = 0, hour_reset_at = NULL WHERE indexer = ?",
        )
        .bind(indexer)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to reset indexer status: {}",
                e
            )))
        })?;

        Ok(())
    }
}

fn admission_err(e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!(
        "Indexer status transaction failed: {}",
        e
    )))
}
