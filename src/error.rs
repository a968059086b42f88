//! Error types for arenarr
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Indexer, Download, Import, Dvr, Database)
//! - Classification of indexer failures into the kinds the health model
//!   reacts to (transient, rate-limited, auth, malformed)
//! - Context information (event id, file path, indexer name, etc.)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for arenarr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for arenarr
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "root_folder")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Indexer query or RSS fetch failed
    #[error("indexer error: {0}")]
    Indexer(#[from] IndexerError),

    /// Download client or queue error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Import pipeline error
    #[error("import error: {0}")]
    Import(#[from] ImportError),

    /// DVR scheduling or recording error
    #[error("DVR error: {0}")]
    Dvr(#[from] DvrError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Indexer-side failures, classified into the kinds the health model (C5)
/// reacts to.
///
/// The distinction matters: `RateLimited` must NOT increment an indexer's
/// failure counter, while `Transient`/`Auth`/`RequestFailed` must. `Malformed`
/// applies to whole responses; individually broken feed items are skipped
/// without surfacing here.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Transport-level failure (connect, timeout, 5xx) — retried at the next
    /// worker cadence and counted as a failure
    #[error("transient failure talking to {indexer}: {reason}")]
    Transient {
        /// Indexer name
        indexer: String,
        /// Underlying failure description
        reason: String,
    },

    /// HTTP 429 from the indexer, carrying the parsed Retry-After delay
    #[error("{indexer} rate limited us for {retry_after_secs}s")]
    RateLimited {
        /// Indexer name
        indexer: String,
        /// Seconds to wait, from the Retry-After header (or the default)
        retry_after_secs: u64,
    },

    /// 401/403 — wrong API key or revoked access
    #[error("{indexer} rejected our credentials (HTTP {status})")]
    Auth {
        /// Indexer name
        indexer: String,
        /// The HTTP status returned
        status: u16,
    },

    /// Non-2xx status outside the auth/rate-limit cases
    #[error("{indexer} request failed with HTTP {status}")]
    RequestFailed {
        /// Indexer name
        indexer: String,
        /// The HTTP status returned
        status: u16,
    },

    /// Response body was not a parseable feed document
    #[error("{indexer} returned a malformed response: {reason}")]
    Malformed {
        /// Indexer name
        indexer: String,
        /// What failed to parse
        reason: String,
    },

    /// Query admission refused by the health model (backoff, disabled, or
    /// hourly quota exhausted)
    #[error("{indexer} is not available: {reason}")]
    NotAvailable {
        /// Indexer name
        indexer: String,
        /// Why admission was refused
        reason: String,
    },
}

impl IndexerError {
    /// The indexer this error concerns
    pub fn indexer(&self) -> &str {
        match self {
            IndexerError::Transient { indexer, .. }
            | IndexerError::RateLimited { indexer, .. }
            | IndexerError::Auth { indexer, .. }
            | IndexerError::RequestFailed { indexer, .. }
            | IndexerError::Malformed { indexer, .. }
            | IndexerError::NotAvailable { indexer, .. } => indexer,
        }
    }

    /// Whether this error should increment the indexer's consecutive-failure
    /// counter. Rate limiting and admission refusal are not failures.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            IndexerError::RateLimited { .. } | IndexerError::NotAvailable { .. }
        )
    }
}

/// Download-queue and download-client errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Queue item not found in database
    #[error("queue item {id} not found")]
    NotFound {
        /// The queue item ID that was not found
        id: i64,
    },

    /// No download client is configured for the release's protocol
    #[error("no enabled download client handles protocol {protocol}")]
    NoClientForProtocol {
        /// The protocol that has no client ("torrent" or "usenet")
        protocol: String,
    },

    /// The download client rejected or failed an RPC
    #[error("client {client} failed to {operation}: {reason}")]
    ClientFailed {
        /// Download client name
        client: String,
        /// Operation that failed (e.g., "add", "remove", "status")
        operation: String,
        /// Underlying failure description
        reason: String,
    },

    /// The client no longer knows the download id
    #[error("download {download_id} missing from client {client}")]
    MissingFromClient {
        /// The client-side download id
        download_id: String,
        /// Download client name
        client: String,
    },

    /// Fetching the release payload (torrent file / NZB) failed
    #[error("failed to fetch release payload from {url}: {reason}")]
    GrabFailed {
        /// Download URL that failed
        url: String,
        /// Underlying failure description
        reason: String,
    },
}

/// Import pipeline errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// No remote path mapping matched the completed download's path
    #[error("no path mapping for host {host} covers {remote_path}")]
    NoMapping {
        /// Download client host the path came from
        host: String,
        /// The unmapped remote path
        remote_path: PathBuf,
    },

    /// The mapped path does not exist on this filesystem
    #[error("mapped path {path} does not exist")]
    PathMissing {
        /// The local path that was expected to exist
        path: PathBuf,
    },

    /// No video file was found under the completed download path
    #[error("no video file found under {path}")]
    NoVideoFile {
        /// The directory that was searched
        path: PathBuf,
    },

    /// Destination already exists — the idempotency guard
    #[error("destination {path} already exists")]
    DestinationExists {
        /// The occupied destination path
        path: PathBuf,
    },

    /// Copy or hardlink into the library failed
    #[error("failed to place {src_path} at {dest}: {reason}")]
    PlacementFailed {
        /// Source media file
        src_path: PathBuf,
        /// Library destination
        dest: PathBuf,
        /// Underlying failure description
        reason: String,
    },
}

/// DVR scheduling and recording errors
#[derive(Debug, Error)]
pub enum DvrError {
    /// Recorder dispatch failed
    #[error("recorder dispatch failed for recording {id}: {reason}")]
    DispatchFailed {
        /// The recording row id
        id: i64,
        /// Underlying failure description
        reason: String,
    },

    /// The recorder produced no file (or an empty one)
    #[error("recording {id} produced no usable output at {path}")]
    NoOutput {
        /// The recording row id
        id: i64,
        /// Expected output path
        path: PathBuf,
    },

    /// Probing the recorded file failed
    #[error("probe failed for {path}: {reason}")]
    ProbeFailed {
        /// The file that could not be probed
        path: PathBuf,
        /// Underlying failure description
        reason: String,
    },
}
