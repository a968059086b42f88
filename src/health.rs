//! Indexer health model and rate limiter (C5)
//!
//! Availability is the conjunction of: enabled, past any failure backoff,
//! past any 429 cooldown, and under the hourly query quota. Failures climb a
//! fixed backoff ladder; rate limits apply a cooldown without consuming a
//! ladder rung. Counter resets happen inside the same transaction that admits
//! a query (see [`crate::db::Database::admit_query`]).

use crate::config::IndexerConfig;
use crate::db::{Database, IndexerStatusRow};
use crate::error::IndexerError;
use crate::types::SystemEvent;
use crate::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Failure backoff ladder, in seconds. After k consecutive failures the
/// indexer is disabled for `BACKOFF_SECONDS[min(k-1, 9)]`.
const BACKOFF_SECONDS: [i64; 10] = [
    5 * 60,
    10 * 60,
    20 * 60,
    40 * 60,
    60 * 60,
    2 * 60 * 60,
    4 * 60 * 60,
    8 * 60 * 60,
    16 * 60 * 60,
    24 * 60 * 60,
];

/// Default 429 cooldown when no Retry-After header was usable
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 5 * 60;

/// Rate-limit cooldowns are capped at one hour regardless of Retry-After
pub const MAX_RATE_LIMIT_SECS: u64 = 60 * 60;

/// Backoff for the k-th consecutive failure (k is 1-based)
pub fn backoff_seconds(consecutive_failures: i64) -> i64 {
    let idx = (consecutive_failures - 1).clamp(0, 9) as usize;
    BACKOFF_SECONDS[idx]
}

/// Why an indexer is currently unavailable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    /// Green: requests may be issued
    Available,
    /// Disabled in configuration
    NotEnabled,
    /// Failure backoff in effect until the given time
    Disabled(DateTime<Utc>),
    /// 429 cooldown in effect until the given time
    RateLimited(DateTime<Utc>),
    /// Hourly query quota exhausted
    QuotaExhausted,
}

impl Availability {
    /// Green check
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Human-readable reason for admission refusal
    pub fn reason(&self) -> String {
        match self {
            Availability::Available => "available".to_string(),
            Availability::NotEnabled => "disabled in configuration".to_string(),
            Availability::Disabled(until) => format!("failure backoff until {until}"),
            Availability::RateLimited(until) => format!("rate limited until {until}"),
            Availability::QuotaExhausted => "hourly query limit reached".to_string(),
        }
    }
}

/// Pure availability check over a status row snapshot.
///
/// The quota axis here is advisory (the admission transaction re-checks it);
/// workers use this to skip indexers without burning an admission attempt.
pub fn availability(
    config: &IndexerConfig,
    row: Option<&IndexerStatusRow>,
    now: DateTime<Utc>,
) -> Availability {
    if !config.enabled {
        return Availability::NotEnabled;
    }
    let Some(row) = row else {
        // No row yet means no recorded history — green
        return Availability::Available;
    };
    let ts = now.timestamp();

    if let Some(disabled_until) = row.disabled_until {
        if disabled_until > ts {
            return Availability::Disabled(to_utc(disabled_until));
        }
    }
    if let Some(rate_limited_until) = row.rate_limited_until {
        if rate_limited_until > ts {
            return Availability::RateLimited(to_utc(rate_limited_until));
        }
    }
    if let Some(limit) = config.query_limit {
        let window_live = row.hour_reset_at.map(|r| ts < r).unwrap_or(false);
        if window_live && row.queries_this_hour >= i64::from(limit) {
            return Availability::QuotaExhausted;
        }
    }
    Availability::Available
}

fn to_utc(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

/// Database-backed health manager shared by the indexer client and workers
#[derive(Clone)]
pub struct HealthManager {
    db: Arc<Database>,
    events_tx: Option<broadcast::Sender<SystemEvent>>,
}

impl HealthManager {
    /// Create a health manager over the shared database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, events_tx: None }
    }

    /// Announce backoff disables on the orchestrator's event channel
    pub fn with_events(mut self, events_tx: broadcast::Sender<SystemEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Availability snapshot for one indexer
    pub async fn availability(&self, config: &IndexerConfig) -> Result<Availability> {
        let row = self.db.get_indexer_status(&config.name).await?;
        Ok(availability(config, row.as_ref(), Utc::now()))
    }

    /// Atomically admit a query against the hourly quota
    pub async fn admit_query(&self, config: &IndexerConfig) -> Result<bool> {
        self.db
            .admit_query(&config.name, config.query_limit, Utc::now().timestamp())
            .await
    }

    /// Atomically admit a grab against the hourly grab quota
    pub async fn admit_grab(&self, config: &IndexerConfig) -> Result<bool> {
        self.db
            .admit_grab(&config.name, config.grab_limit, Utc::now().timestamp())
            .await
    }

    /// Record a successful request
    pub async fn on_success(&self, indexer: &str) -> Result<()> {
        self.db
            .record_indexer_success(indexer, Utc::now().timestamp())
            .await
    }

    /// Record an indexer error, routing it to the right counter.
    ///
    /// Rate limits set the cooldown (capped at one hour) without touching the
    /// failure ladder; failures climb the ladder. Returns the new
    /// `disabled_until` when a failure was recorded.
    pub async fn on_error(&self, error: &IndexerError) -> Result<Option<DateTime<Utc>>> {
        let now = Utc::now().timestamp();
        match error {
            IndexerError::RateLimited { indexer, retry_after_secs } => {
                let cooldown = (*retry_after_secs).min(MAX_RATE_LIMIT_SECS) as i64;
                self.db
                    .record_indexer_rate_limited(indexer, now + cooldown)
                    .await?;
                Ok(None)
            }
            e if e.counts_as_failure() => {
                let disabled_until = self
                    .db
                    .record_indexer_failure(e.indexer(), &e.to_string(), now)
                    .await?;
                let until = to_utc(disabled_until);
                if let Some(tx) = &self.events_tx {
                    tx.send(SystemEvent::IndexerDisabled {
                        indexer: e.indexer().to_string(),
                        until,
                    })
                    .ok();
                }
                Ok(Some(until))
            }
            _ => Ok(None),
        }
    }

    /// Manual operator reset
    pub async fn reset(&self, indexer: &str) -> Result<()> {
        self.db.reset_indexer_status(indexer).await
    }
}
