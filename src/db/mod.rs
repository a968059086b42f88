//! Database layer for arenarr
//!
//! Handles SQLite persistence for events, the release cache, indexer health,
//! the download queue, the blocklist, DVR recordings, event files and history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`events`] — Monitored events and their parts
//! - [`profiles`] — Quality profiles and custom formats (JSON columns)
//! - [`releases`] — Release cache (C4 storage)
//! - [`indexers`] — Indexer status rows (C5 storage)
//! - [`queue`] — Download queue items
//! - [`blocklist`] — Blocklist rows
//! - [`dvr`] — IPTV channels, league mappings, EPG programs, recordings
//! - [`files`] — Imported event files
//! - [`history`] — Immutable history ledger

use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

mod blocklist;
mod dvr;
mod events;
mod files;
mod history;
mod indexers;
mod migrations;
mod profiles;
mod queue;
mod releases;

pub use blocklist::NewBlocklistItem;
pub use dvr::{NewChannel, NewEpgProgram, NewRecording};
pub use events::{NewEvent, NewEventPart};
pub use files::NewEventFile;
pub use queue::NewQueueItem;
pub use releases::NewCacheEntry;

/// Monitored sporting event record from the database
#[derive(Debug, Clone, FromRow)]
pub struct SportEvent {
    /// Unique database ID
    pub id: i64,
    /// Event title (e.g. "UFC 299", "Chiefs vs Raiders")
    pub title: String,
    /// Sport keyword (e.g. "mma", "football", "basketball")
    pub sport: String,
    /// League/organization name
    pub league: Option<String>,
    /// Home team, for team-sport events
    pub home_team: Option<String>,
    /// Away team, for team-sport events
    pub away_team: Option<String>,
    /// Scheduled start as a unix timestamp (UTC)
    pub event_date: i64,
    /// TV broadcast start as a unix timestamp, when known
    pub broadcast_time: Option<i64>,
    /// External catalog id
    pub external_id: Option<String>,
    /// Whether the event is monitored (0/1)
    pub monitored: i32,
    /// Quality profile governing acquisition
    pub quality_profile_id: Option<i64>,
    /// Whether a file has been imported (0/1)
    pub has_file: i32,
    /// Imported file path, when has_file is set
    pub file_path: Option<String>,
    /// Unix timestamp of the last external search attempt
    pub last_search_at: Option<i64>,
    /// Unix timestamp when the event row was created
    pub created_at: i64,
}

/// A named, independently monitored segment of an event
#[derive(Debug, Clone, FromRow)]
pub struct EventPart {
    /// Unique database ID
    pub id: i64,
    /// Parent event
    pub event_id: i64,
    /// Part name ("Early Prelims", "Prelims", "Main Card")
    pub name: String,
    /// Ordering within the event
    pub part_number: i32,
    /// Whether this part is monitored (0/1)
    pub monitored: i32,
    /// Whether a file has been imported for this part (0/1)
    pub has_file: i32,
}

/// Quality profile row; `items` and `format_items` are JSON columns
/// deserialized lazily by the scorer
#[derive(Debug, Clone, FromRow)]
pub struct QualityProfileRow {
    /// Unique database ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// JSON array of quality items
    pub items: String,
    /// Quality name above which upgrades are not sought
    pub cutoff: Option<String>,
    /// JSON array of format items
    pub format_items: String,
    /// Minimum custom-format score gate
    pub min_format_score: i32,
}

/// Custom format row; `specifications` is a JSON column
#[derive(Debug, Clone, FromRow)]
pub struct CustomFormatRow {
    /// Unique database ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// JSON array of specifications
    pub specifications: String,
}

/// Release cache entry record from the database
#[derive(Debug, Clone, FromRow)]
pub struct CacheEntry {
    /// Unique database ID
    pub id: i64,
    /// Release GUID (unique, the upsert key)
    pub guid: String,
    /// Original release title
    pub title: String,
    /// Normalized title (lowercase, diacritics stripped, separators collapsed)
    pub normalized_title: String,
    /// Space-joined expanded search-term bag
    pub search_terms: String,
    /// Download URL (torrent/NZB payload or magnet)
    pub download_url: String,
    /// Info URL, when the indexer provides one
    pub info_url: Option<String>,
    /// Indexer the release came from
    pub indexer: String,
    /// Transfer protocol ("torrent"/"usenet")
    pub protocol: String,
    /// Torrent infohash, when known
    pub infohash: Option<String>,
    /// Size in bytes
    pub size: i64,
    /// Parsed canonical quality label
    pub quality_label: Option<String>,
    /// Parsed codec token
    pub codec: Option<String>,
    /// Parsed language token
    pub language: Option<String>,
    /// Seeders (torrent only)
    pub seeders: Option<i64>,
    /// Leechers (torrent only)
    pub leechers: Option<i64>,
    /// Publish timestamp from the feed
    pub publish_date: Option<i64>,
    /// Unix timestamp when the entry was cached
    pub cached_at: i64,
    /// Unix timestamp when the entry expires
    pub expires_at: i64,
    /// Whether the entry came from an RSS sweep (0/1)
    pub from_rss: i32,
    /// Parsed canonical sport prefix
    pub sport_prefix: Option<String>,
    /// Parsed year
    pub year: Option<i64>,
    /// Parsed round/week number
    pub round: Option<i64>,
    /// Multi-event pack flag (0/1)
    pub is_pack: i32,
}

/// Per-indexer health and quota counters
#[derive(Debug, Clone, FromRow)]
pub struct IndexerStatusRow {
    /// Indexer name (primary key)
    pub indexer: String,
    /// Consecutive failure count
    pub consecutive_failures: i64,
    /// Last failure description
    pub last_failure_reason: Option<String>,
    /// Unix timestamp of the last failure
    pub last_failure_at: Option<i64>,
    /// Unix timestamp of the last success
    pub last_success_at: Option<i64>,
    /// Backoff: unavailable until this unix timestamp
    pub disabled_until: Option<i64>,
    /// 429 cooldown: unavailable until this unix timestamp
    pub rate_limited_until: Option<i64>,
    /// Queries admitted in the current hour window
    pub queries_this_hour: i64,
    /// Grabs admitted in the current hour window
    pub grabs_this_hour: i64,
    /// Unix timestamp when the hourly counters reset
    pub hour_reset_at: Option<i64>,
}

/// Download queue item record from the database
#[derive(Debug, Clone, FromRow)]
pub struct QueueItem {
    /// Unique database ID
    pub id: i64,
    /// Event being acquired
    pub event_id: i64,
    /// Specific part being acquired, when the grab was part-scoped
    pub part_id: Option<i64>,
    /// Download client name the item was handed to
    pub client: String,
    /// Opaque client-side download id
    pub download_id: String,
    /// Release title
    pub title: String,
    /// Client category the download was filed under
    pub category: Option<String>,
    /// Indexer the release came from
    pub indexer: String,
    /// Torrent infohash, when known
    pub infohash: Option<String>,
    /// Transfer protocol ("torrent"/"usenet")
    pub protocol: String,
    /// Total size in bytes
    pub size: i64,
    /// Bytes downloaded so far
    pub downloaded: i64,
    /// Progress percentage [0, 100]
    pub progress: f64,
    /// Estimated seconds remaining, when the client reports one
    pub time_remaining_secs: Option<i64>,
    /// Current status (see [`crate::types::DownloadStatus`])
    pub status: i32,
    /// Operator-facing status message (stall notices etc.)
    pub status_message: Option<String>,
    /// Status to resume into when a Warning clears
    pub resume_status: Option<i32>,
    /// Redownload attempts so far
    pub retry_count: i64,
    /// Consecutive not-found readings from the client
    pub missing_count: i64,
    /// Unix timestamp when the release was grabbed
    pub grabbed_at: i64,
    /// Unix timestamp when the transfer completed
    pub completed_at: Option<i64>,
    /// Unix timestamp when the import finished (import idempotency guard)
    pub imported_at: Option<i64>,
}

/// Blocklist record from the database
#[derive(Debug, Clone, FromRow)]
pub struct BlocklistItem {
    /// Unique database ID
    pub id: i64,
    /// Event the release was blocked for
    pub event_id: i64,
    /// Indexer the release came from
    pub indexer: String,
    /// Release title
    pub title: String,
    /// Torrent infohash, when known (the preferred key)
    pub infohash: Option<String>,
    /// Why the release was blocked (see [`crate::types::BlocklistReason`])
    pub reason: i32,
    /// Unix timestamp when the row was added
    pub added_at: i64,
}

/// IPTV channel record from the database
#[derive(Debug, Clone, FromRow)]
pub struct Channel {
    /// Unique database ID
    pub id: i64,
    /// Channel display name
    pub name: String,
    /// TVG identifier linking the channel to EPG programs
    pub tvg_id: Option<String>,
    /// Stream URL handed to the recorder
    pub stream_url: String,
    /// Auto-mapper quality assessment (higher is better)
    pub quality_score: i64,
}

/// League → channel mapping record
#[derive(Debug, Clone, FromRow)]
pub struct LeagueChannel {
    /// Unique database ID
    pub id: i64,
    /// League name the mapping covers
    pub league: String,
    /// Mapped channel
    pub channel_id: i64,
    /// 1 = produced by the auto-mapper, 0 = declared preferred channel
    pub auto_mapped: i32,
}

/// EPG program record from the database
#[derive(Debug, Clone, FromRow)]
pub struct EpgProgram {
    /// Unique database ID
    pub id: i64,
    /// TVG identifier of the broadcasting channel
    pub channel_tvg_id: String,
    /// Program title
    pub title: String,
    /// Program description
    pub description: Option<String>,
    /// Program category
    pub category: Option<String>,
    /// Whether the EPG source flags this as sports programming (0/1)
    pub is_sports_program: i32,
    /// Program start as a unix timestamp
    pub start_time: i64,
    /// Program end as a unix timestamp
    pub end_time: i64,
}

/// DVR recording record from the database
#[derive(Debug, Clone, FromRow)]
pub struct Recording {
    /// Unique database ID
    pub id: i64,
    /// Event being recorded (None for one-off captures)
    pub event_id: Option<i64>,
    /// Specific part being recorded, when part-scoped
    pub part_id: Option<i64>,
    /// Channel being recorded
    pub channel_id: i64,
    /// Scheduled start (unix timestamp, padding applied)
    pub scheduled_start: i64,
    /// Scheduled end (unix timestamp, padding applied)
    pub scheduled_end: i64,
    /// Actual recorder start, once dispatched
    pub actual_start: Option<i64>,
    /// Actual recorder end, once finished
    pub actual_end: Option<i64>,
    /// Recorder output path
    pub output_path: String,
    /// Output file size in bytes, once known
    pub file_size: Option<i64>,
    /// Probed quality label, once known
    pub detected_quality: Option<String>,
    /// Quality score computed from the synthetic title
    pub quality_score: Option<i64>,
    /// Custom-format score computed from the synthetic title
    pub format_score: Option<i64>,
    /// Current status (see [`crate::types::RecordingStatus`])
    pub status: i32,
    /// Failure description, when failed
    pub error_message: Option<String>,
    /// Unix timestamp when the row was created
    pub created_at: i64,
}

/// Imported event file record from the database
#[derive(Debug, Clone, FromRow)]
pub struct EventFile {
    /// Unique database ID
    pub id: i64,
    /// Event the file belongs to
    pub event_id: i64,
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
    /// Unix timestamp when the file was imported
    pub added_at: i64,
    /// Whether the file is still present on disk (0/1)
    pub on_disk: i32,
}

/// Immutable history record from the database
#[derive(Debug, Clone, FromRow)]
pub struct HistoryEntry {
    /// Unique database ID
    pub id: i64,
    /// Event the entry concerns, when applicable
    pub event_id: Option<i64>,
    /// Entry kind ("grabbed", "imported", "blocklisted", ...)
    pub kind: String,
    /// Release or recording title
    pub title: String,
    /// Free-form detail (score, path, failure reason)
    pub detail: Option<String>,
    /// Unix timestamp when the entry was recorded
    pub created_at: i64,
}

/// Database handle for arenarr
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
