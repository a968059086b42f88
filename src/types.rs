//! Core types for arenarr

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Implements the full id-newtype surface: conversions, Display/FromStr,
/// and the sqlx Type/Encode/Decode plumbing for SQLite INTEGER columns.
macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id from a raw row id
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

id_newtype! {
    /// Unique identifier for a monitored sporting event
    EventId
}

id_newtype! {
    /// Unique identifier for a download queue item
    QueueItemId
}

id_newtype! {
    /// Unique identifier for a DVR recording
    RecordingId
}

/// Transfer protocol of a release / download client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// BitTorrent (seeders/leechers semantics apply)
    Torrent,
    /// Usenet (NZB)
    Usenet,
}

impl Protocol {
    /// Stable string form used in the database and in wire attributes
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Torrent => "torrent",
            Protocol::Usenet => "usenet",
        }
    }

    /// Parse the stable string form; unknown values default to torrent
    /// (torznab feeds without an explicit protocol are torrent trackers)
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "usenet" => Protocol::Usenet,
            _ => Protocol::Torrent,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download queue item status — the state machine the monitor (C10) drives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Handed to the client, not yet transferring
    Queued,
    /// Actively transferring
    Downloading,
    /// Paused (user action or debrid seeding hold)
    Paused,
    /// Transfer finished, import not started
    Completed,
    /// Import in flight
    Importing,
    /// Import succeeded (terminal)
    Imported,
    /// Transfer or import failed
    Failed,
    /// Needs attention (stalled, event unmonitored) but not failed
    Warning,
}

impl DownloadStatus {
    /// Convert integer status code to enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => DownloadStatus::Queued,
            1 => DownloadStatus::Downloading,
            2 => DownloadStatus::Paused,
            3 => DownloadStatus::Completed,
            4 => DownloadStatus::Importing,
            5 => DownloadStatus::Imported,
            6 => DownloadStatus::Failed,
            7 => DownloadStatus::Warning,
            _ => DownloadStatus::Failed, // unknown DB values surface visibly
        }
    }

    /// Convert enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            DownloadStatus::Queued => 0,
            DownloadStatus::Downloading => 1,
            DownloadStatus::Paused => 2,
            DownloadStatus::Completed => 3,
            DownloadStatus::Importing => 4,
            DownloadStatus::Imported => 5,
            DownloadStatus::Failed => 6,
            DownloadStatus::Warning => 7,
        }
    }

    /// Terminal states are never polled again by the monitor
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Imported)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Importing => "importing",
            DownloadStatus::Imported => "imported",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// Status normalized across heterogeneous download-client backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedStatus {
    /// Waiting in the client's queue
    Queued,
    /// Actively transferring
    Downloading,
    /// Paused in the client
    Paused,
    /// Transfer finished
    Completed,
    /// The client reports a failure
    Failed,
    /// The client reports a non-fatal problem
    Warning,
}

/// DVR recording lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Scheduled, waiting for the start time
    Scheduled,
    /// Recorder dispatched and running
    Recording,
    /// Recorder finished, file awaiting probe + import
    Completed,
    /// Probe/import succeeded (terminal)
    Imported,
    /// Recorder or import failed (terminal)
    Failed,
    /// Cancelled before or during recording (terminal)
    Cancelled,
}

impl RecordingStatus {
    /// Convert integer status code to enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => RecordingStatus::Scheduled,
            1 => RecordingStatus::Recording,
            2 => RecordingStatus::Completed,
            3 => RecordingStatus::Imported,
            4 => RecordingStatus::Failed,
            5 => RecordingStatus::Cancelled,
            _ => RecordingStatus::Failed,
        }
    }

    /// Convert enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            RecordingStatus::Scheduled => 0,
            RecordingStatus::Recording => 1,
            RecordingStatus::Completed => 2,
            RecordingStatus::Imported => 3,
            RecordingStatus::Failed => 4,
            RecordingStatus::Cancelled => 5,
        }
    }

    /// Whether this recording still claims its event/part slot.
    /// At most one Scheduled/Recording row may exist per (event, part).
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingStatus::Scheduled | RecordingStatus::Recording)
    }
}

/// Where an imported event file came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSource {
    /// Grabbed from an indexer and fetched by a download client
    Indexer,
    /// Recorded off an IPTV stream by the DVR
    Iptv,
}

impl FileSource {
    /// Stable string form used in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSource::Indexer => "Indexer",
            FileSource::Iptv => "IPTV",
        }
    }

    /// Parse the stable string form; unknown values default to Indexer
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "IPTV" => FileSource::Iptv,
            _ => FileSource::Indexer,
        }
    }
}

/// Why a release landed on the blocklist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlocklistReason {
    /// The download failed in the client
    DownloadFailed,
    /// The completed download refused to import
    ImportFailed,
    /// The download stalled past tolerance and was abandoned
    Stalled,
    /// Manually blocked by the operator
    Manual,
}

impl BlocklistReason {
    /// Convert integer code to enum
    pub fn from_i32(reason: i32) -> Self {
        match reason {
            0 => BlocklistReason::DownloadFailed,
            1 => BlocklistReason::ImportFailed,
            2 => BlocklistReason::Stalled,
            3 => BlocklistReason::Manual,
            _ => BlocklistReason::Manual,
        }
    }

    /// Convert enum to integer code
    pub fn to_i32(&self) -> i32 {
        match self {
            BlocklistReason::DownloadFailed => 0,
            BlocklistReason::ImportFailed => 1,
            BlocklistReason::Stalled => 2,
            BlocklistReason::Manual => 3,
        }
    }
}

/// Derived acquisition phase of a monitored event.
///
/// The stored row only carries `monitored` and `has_file`; whether the event
/// is being searched or downloaded follows from the queue. This keeps a single
/// source of truth instead of a status column that can drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPhase {
    /// Not monitored — nothing will be acquired
    Unmonitored,
    /// Monitored, no file yet, no active download
    Searching,
    /// An active queue item exists for this event
    Downloading,
    /// A file has been imported
    Imported,
}

/// Derive the acquisition phase from the event flags and queue state
pub fn derive_phase(monitored: bool, has_file: bool, has_active_download: bool) -> EventPhase {
    if !monitored {
        EventPhase::Unmonitored
    } else if has_file {
        EventPhase::Imported
    } else if has_active_download {
        EventPhase::Downloading
    } else {
        EventPhase::Searching
    }
}

/// Event emitted on the orchestrator's broadcast channel
///
/// Consumers subscribe via [`crate::Orchestrator::subscribe`]; if no one is
/// listening events are dropped silently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEvent {
    /// A release was handed to a download client
    Grabbed {
        /// Event the release was grabbed for
        event_id: EventId,
        /// Release title
        title: String,
        /// Indexer the release came from
        indexer: String,
    },

    /// A queue item was removed (user action or missing-from-client cleanup)
    QueueItemRemoved {
        /// The removed queue item
        id: QueueItemId,
    },

    /// A download stalled and was flagged
    DownloadStalled {
        /// The stalled queue item
        id: QueueItemId,
        /// Progress percentage at the time of flagging
        progress: f64,
    },

    /// A download failed in the client
    DownloadFailed {
        /// The failed queue item
        id: QueueItemId,
        /// Failure description
        error: String,
    },

    /// A completed artifact was imported into the library
    Imported {
        /// Event the file belongs to
        event_id: EventId,
        /// Final library path
        path: PathBuf,
        /// Source of the artifact
        source: FileSource,
    },

    /// An import attempt failed
    ImportFailed {
        /// Event the artifact belonged to
        event_id: EventId,
        /// Failure description
        error: String,
    },

    /// A release was added to the blocklist
    Blocklisted {
        /// Event the release was blocked for
        event_id: EventId,
        /// Release title
        title: String,
    },

    /// An indexer was disabled by the health model
    IndexerDisabled {
        /// Indexer name
        indexer: String,
        /// When it becomes eligible again
        until: DateTime<Utc>,
    },

    /// A DVR recording was scheduled
    RecordingScheduled {
        /// The new recording
        id: RecordingId,
        /// Event it covers (None for one-off captures)
        event_id: Option<EventId>,
        /// Channel name
        channel: String,
    },

    /// The recorder started writing a recording
    RecordingStarted {
        /// The recording
        id: RecordingId,
    },

    /// A recording finished and was imported
    RecordingImported {
        /// The recording
        id: RecordingId,
        /// Final library path
        path: PathBuf,
    },

    /// A recording failed
    RecordingFailed {
        /// The recording
        id: RecordingId,
        /// Failure description
        error: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn download_status_round_trips_through_i32_for_all_variants() {
        let cases = [
            (DownloadStatus::Queued, 0),
            (DownloadStatus::Downloading, 1),
            (DownloadStatus::Paused, 2),
            (DownloadStatus::Completed, 3),
            (DownloadStatus::Importing, 4),
            (DownloadStatus::Imported, 5),
            (DownloadStatus::Failed, 6),
            (DownloadStatus::Warning, 7),
        ];

        for (variant, expected_int) in cases {
            assert_eq!(
                variant.to_i32(),
                expected_int,
                "{variant:?} should encode to {expected_int}"
            );
            assert_eq!(
                DownloadStatus::from_i32(expected_int),
                variant,
                "{expected_int} should decode to {variant:?}"
            );
        }
    }

    #[test]
    fn download_status_from_unknown_integer_defaults_to_failed() {
        assert_eq!(
            DownloadStatus::from_i32(99),
            DownloadStatus::Failed,
            "unknown status must fall back to Failed so corrupted rows surface visibly"
        );
    }

    #[test]
    fn only_imported_is_terminal() {
        for status in [
            DownloadStatus::Queued,
            DownloadStatus::Downloading,
            DownloadStatus::Paused,
            DownloadStatus::Completed,
            DownloadStatus::Importing,
            DownloadStatus::Failed,
            DownloadStatus::Warning,
        ] {
            assert!(
                !status.is_terminal(),
                "{status:?} must stay visible to the monitor — Failed items await retry"
            );
        }
        assert!(DownloadStatus::Imported.is_terminal());
    }

    #[test]
    fn recording_status_round_trips_through_i32() {
        for variant in [
            RecordingStatus::Scheduled,
            RecordingStatus::Recording,
            RecordingStatus::Completed,
            RecordingStatus::Imported,
            RecordingStatus::Failed,
            RecordingStatus::Cancelled,
        ] {
            assert_eq!(RecordingStatus::from_i32(variant.to_i32()), variant);
        }
    }

    #[test]
    fn only_scheduled_and_recording_hold_the_event_slot() {
        assert!(RecordingStatus::Scheduled.is_active());
        assert!(RecordingStatus::Recording.is_active());
        for status in [
            RecordingStatus::Completed,
            RecordingStatus::Imported,
            RecordingStatus::Failed,
            RecordingStatus::Cancelled,
        ] {
            assert!(
                !status.is_active(),
                "{status:?} must release the per-event recording slot"
            );
        }
    }

    #[test]
    fn protocol_string_round_trip() {
        assert_eq!(Protocol::from_str_lossy("torrent"), Protocol::Torrent);
        assert_eq!(Protocol::from_str_lossy("usenet"), Protocol::Usenet);
        assert_eq!(
            Protocol::from_str_lossy("unknown"),
            Protocol::Torrent,
            "unlabelled feeds are torrent trackers"
        );
    }

    #[test]
    fn file_source_uses_the_library_facing_labels() {
        assert_eq!(FileSource::Iptv.as_str(), "IPTV");
        assert_eq!(FileSource::Indexer.as_str(), "Indexer");
        assert_eq!(FileSource::from_str_lossy("IPTV"), FileSource::Iptv);
    }

    #[test]
    fn event_id_parses_and_displays_like_its_inner_value() {
        let id = EventId::from_str("123").unwrap();
        assert_eq!(id.get(), 123);
        assert_eq!(id.to_string(), "123");
        assert!(EventId::from_str("abc").is_err());
    }

    #[test]
    fn phase_derivation_prefers_file_over_queue_state() {
        assert_eq!(
            derive_phase(true, true, true),
            EventPhase::Imported,
            "an imported file wins even while an upgrade download is running"
        );
        assert_eq!(derive_phase(true, false, true), EventPhase::Downloading);
        assert_eq!(derive_phase(true, false, false), EventPhase::Searching);
        assert_eq!(derive_phase(false, true, false), EventPhase::Unmonitored);
    }
}
