//! Configuration types for arenarr

use crate::types::Protocol;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the orchestrator
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`indexers`](IndexerConfig) — Torznab/Newznab providers
/// - [`discovery`](DiscoveryConfig) — RSS sync worker cadence
/// - [`planner`](PlannerConfig) — event search planning
/// - [`monitor`](MonitorConfig) — download lifecycle polling
/// - [`import`](ImportConfig) — library placement
/// - [`dvr`](DvrConfig) — DVR scheduling and EPG matching
/// - [`cache`](CacheConfig) — release cache TTLs and sweeping
/// - [`persistence`](PersistenceConfig) — database location
/// - [`retry`](RetryConfig) — one-shot HTTP retry policy
///
/// Every worker cadence is configurable; the defaults match the values the
/// workers were tuned against.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Torznab/Newznab indexer definitions
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,

    /// RSS discovery worker settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Event search planner settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Download lifecycle monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Import pipeline settings
    #[serde(default)]
    pub import: ImportConfig,

    /// DVR scheduler settings
    #[serde(default)]
    pub dvr: DvrConfig,

    /// Release cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry policy for one-shot HTTP fetches (release payloads, recorder dispatch)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.import.root_folder.as_os_str().is_empty() {
            return Err(crate::Error::Config {
                message: "import.root_folder must be set".to_string(),
                key: Some("import.root_folder".to_string()),
            });
        }
        for indexer in &self.indexers {
            if indexer.name.trim().is_empty() {
                return Err(crate::Error::Config {
                    message: "indexer name must not be empty".to_string(),
                    key: Some("indexers.name".to_string()),
                });
            }
            if indexer.base_url.trim().is_empty() {
                return Err(crate::Error::Config {
                    message: format!("indexer {} has no base_url", indexer.name),
                    key: Some("indexers.base_url".to_string()),
                });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for indexer in &self.indexers {
            if !seen.insert(indexer.name.to_lowercase()) {
                return Err(crate::Error::Config {
                    message: format!("duplicate indexer name {}", indexer.name),
                    key: Some("indexers.name".to_string()),
                });
            }
        }
        Ok(())
    }
}

/// A single Torznab/Newznab indexer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Display name, unique across the configuration
    pub name: String,

    /// Base URL (e.g. `https://indexer.example.com`)
    pub base_url: String,

    /// API path appended to the base (default: "/api")
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// API key sent as `apikey=`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Category filter sent as `cat=`. Empty means the sport-TV default set
    /// is applied (always applied for RSS regardless of this setting).
    #[serde(default)]
    pub categories: Vec<u32>,

    /// Whether this indexer participates in discovery and search
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Protocol of releases this indexer serves
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,

    /// Maximum search/RSS queries per hour (None = unlimited)
    #[serde(default)]
    pub query_limit: Option<u32>,

    /// Maximum grabs per hour (None = unlimited)
    #[serde(default)]
    pub grab_limit: Option<u32>,

    /// Minimum delay between requests to this indexer, in milliseconds
    #[serde(default)]
    pub request_delay_ms: Option<u64>,

    /// Per-request timeout (default: 100 seconds)
    #[serde(default = "default_indexer_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// RSS discovery worker settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Interval between RSS sync passes (default: 10 minutes)
    #[serde(default = "default_rss_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Maximum items requested per RSS fetch (default: 100)
    #[serde(default = "default_rss_max_results")]
    pub max_results: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval: default_rss_interval(),
            max_results: default_rss_max_results(),
        }
    }
}

/// Event search planner settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Interval between planner passes (default: 5 minutes)
    #[serde(default = "default_planner_interval", with = "duration_serde")]
    pub interval: Duration,

    /// How long before a known TV broadcast the planner may start issuing
    /// external searches (default: 30 minutes). Scene releases appear shortly
    /// after broadcast, so earlier searches waste scarce indexer queries.
    #[serde(default = "default_pre_broadcast_window", with = "duration_serde")]
    pub pre_broadcast_window: Duration,

    /// Maximum results requested per external search (default: 100)
    #[serde(default = "default_search_max_results")]
    pub max_results: u32,

    /// Minimum interval between external search attempts for the same event
    /// (default: 1 hour)
    #[serde(default = "default_search_backoff", with = "duration_serde")]
    pub search_backoff: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            interval: default_planner_interval(),
            pre_broadcast_window: default_pre_broadcast_window(),
            max_results: default_search_max_results(),
            search_backoff: default_search_backoff(),
        }
    }
}

/// Download lifecycle monitor settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Poll cadence against download clients (default: 30 seconds)
    #[serde(default = "default_monitor_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Time in the queue before a non-moving download counts as stalled
    /// (default: 10 minutes)
    #[serde(default = "default_stall_threshold", with = "duration_serde")]
    pub stall_threshold: Duration,

    /// Consecutive not-found readings before a queue item is dropped
    /// (default: 3)
    #[serde(default = "default_missing_threshold")]
    pub missing_removal_threshold: u32,

    /// Remove the item from the client after a successful import
    #[serde(default = "default_true")]
    pub remove_completed: bool,

    /// Delete failed downloads (with files) from the client
    #[serde(default = "default_true")]
    pub remove_failed: bool,

    /// Leave failed items eligible for replacement by the planner
    #[serde(default = "default_true")]
    pub redownload_failed: bool,

    /// Maximum redownload attempts per queue item (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_monitor_interval(),
            stall_threshold: default_stall_threshold(),
            missing_removal_threshold: default_missing_threshold(),
            remove_completed: true,
            remove_failed: true,
            redownload_failed: true,
            max_retries: default_max_retries(),
        }
    }
}

/// One remote→local path translation entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemotePathMapping {
    /// Download client host this mapping applies to (compared case-insensitively)
    pub host: String,

    /// Path prefix as the download client reports it
    pub remote_path: PathBuf,

    /// Local path the prefix translates to
    pub local_path: PathBuf,
}

/// Import pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Library root; event files land under `{root}/{league}/{event}/`
    #[serde(default = "default_root_folder")]
    pub root_folder: PathBuf,

    /// Hardlink instead of copying when source and destination share a volume
    #[serde(default = "default_true")]
    pub use_hardlinks: bool,

    /// Ordered remote path mappings; longest matching remote prefix wins
    #[serde(default)]
    pub remote_mappings: Vec<RemotePathMapping>,

    /// File extensions recognized as video during primary-file selection
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
            use_hardlinks: true,
            remote_mappings: Vec::new(),
            video_extensions: default_video_extensions(),
        }
    }
}

/// DVR scheduler settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DvrConfig {
    /// Whether the DVR scheduler runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between scheduling passes (default: 15 minutes)
    #[serde(default = "default_dvr_interval", with = "duration_serde")]
    pub pass_interval: Duration,

    /// How far into the future events are scheduled (default: 14 days)
    #[serde(default = "default_scheduling_window_days")]
    pub scheduling_window_days: u32,

    /// Recording lead-in before the event start (default: 5 minutes)
    #[serde(default = "default_pre_padding", with = "duration_serde")]
    pub pre_padding: Duration,

    /// Recording tail after the expected end (default: 30 minutes)
    #[serde(default = "default_post_padding", with = "duration_serde")]
    pub post_padding: Duration,

    /// Assumed event duration when no program times are known (default: 3 hours)
    #[serde(default = "default_event_duration", with = "duration_serde")]
    pub default_event_duration: Duration,

    /// EPG program start must fall within this distance of the event start
    /// (default: 1 hour)
    #[serde(default = "default_epg_tolerance", with = "duration_serde")]
    pub epg_time_tolerance: Duration,

    /// Minimum EPG match score before a program drives scheduling (default: 50)
    #[serde(default = "default_min_match_score")]
    pub min_match_score: i32,

    /// Where recorder output files are written
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    /// Encoding profile handed to the recorder (recorder-defined meaning)
    #[serde(default)]
    pub encoding_profile: Option<String>,

    /// Recordings whose event passed this long ago are cancelled
    /// (default: 6 hours)
    #[serde(default = "default_stale_cutoff", with = "duration_serde")]
    pub stale_cutoff: Duration,
}

impl Default for DvrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pass_interval: default_dvr_interval(),
            scheduling_window_days: default_scheduling_window_days(),
            pre_padding: default_pre_padding(),
            post_padding: default_post_padding(),
            default_event_duration: default_event_duration(),
            epg_time_tolerance: default_epg_tolerance(),
            min_match_score: default_min_match_score(),
            recordings_dir: default_recordings_dir(),
            encoding_profile: None,
            stale_cutoff: default_stale_cutoff(),
        }
    }
}

/// Release cache settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long cached releases stay visible (default: 7 days)
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Interval between expiry sweeps (default: 1 hour)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Blocklist rows older than this are pruned (default: 90 days)
    #[serde(default = "default_blocklist_horizon", with = "duration_serde")]
    pub blocklist_horizon: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
            blocklist_horizon: default_blocklist_horizon(),
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./arenarr.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Retry configuration for transient failures on one-shot HTTP fetches.
///
/// Indexer search/RSS calls never retry in-call — their failures feed the
/// health model instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

// ---------------------------------------------------------------------------
// serde defaults

fn default_api_path() -> String {
    "/api".to_string()
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> Protocol {
    Protocol::Torrent
}

fn default_indexer_timeout() -> Duration {
    Duration::from_secs(100)
}

fn default_rss_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_rss_max_results() -> u32 {
    100
}

fn default_planner_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_pre_broadcast_window() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_search_max_results() -> u32 {
    100
}

fn default_search_backoff() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_stall_threshold() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_missing_threshold() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_root_folder() -> PathBuf {
    PathBuf::from("./library")
}

fn default_video_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "ts", "m2ts", "mov", "wmv", "mpg", "mpeg", "m4v", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_dvr_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_scheduling_window_days() -> u32 {
    14
}

fn default_pre_padding() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_post_padding() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_event_duration() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

fn default_epg_tolerance() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_min_match_score() -> i32 {
    50
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("./recordings")
}

fn default_stale_cutoff() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_blocklist_horizon() -> Duration {
    Duration::from_secs(90 * 24 * 60 * 60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./arenarr.db")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (stored as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.monitor.poll_interval, Duration::from_secs(30));
        assert_eq!(back.cache.ttl, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn empty_json_object_yields_full_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.discovery.interval, Duration::from_secs(600));
        assert_eq!(config.dvr.pre_padding, Duration::from_secs(300));
        assert_eq!(config.dvr.post_padding, Duration::from_secs(1800));
        assert_eq!(config.dvr.scheduling_window_days, 14);
        assert!(config.monitor.remove_completed);
    }

    #[test]
    fn indexer_defaults_fill_in_api_path_and_timeout() {
        let json = r#"{"name": "idx1", "base_url": "https://idx1.example.com"}"#;
        let indexer: IndexerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(indexer.api_path, "/api");
        assert_eq!(indexer.timeout, Duration::from_secs(100));
        assert!(indexer.enabled);
        assert_eq!(indexer.protocol, Protocol::Torrent);
        assert!(indexer.query_limit.is_none(), "no quota unless configured");
    }

    #[test]
    fn validate_rejects_duplicate_indexer_names() {
        let mut config = Config::default();
        config.import.root_folder = PathBuf::from("/library");
        for name in ["Idx", "idx"] {
            config.indexers.push(IndexerConfig {
                name: name.to_string(),
                base_url: "https://example.com".to_string(),
                api_path: default_api_path(),
                api_key: None,
                categories: vec![],
                enabled: true,
                protocol: Protocol::Torrent,
                query_limit: None,
                grab_limit: None,
                request_delay_ms: None,
                timeout: default_indexer_timeout(),
            });
        }
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("duplicate indexer name"),
            "names must be unique case-insensitively, got: {err}"
        );
    }

    #[test]
    fn validate_rejects_empty_root_folder() {
        let mut config = Config::default();
        config.import.root_folder = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
