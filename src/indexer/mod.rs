//! Indexer client abstraction (C6)
//!
//! Uniform search and RSS fetch over Torznab/Newznab dialects. Both
//! operations build a query URL from the indexer's base, API path, key and a
//! category filter, parse the RSS-shaped XML response, and translate
//! transport errors into the health model's vocabulary. The client enforces
//! per-indexer request pacing and never retries in-call — failures surface as
//! [`IndexerError`] and feed C5.

pub mod response;

use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::health::{HealthManager, DEFAULT_RATE_LIMIT_SECS};
use crate::types::Protocol;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Torznab category filter applied when an indexer has none configured.
/// 5060 is TV/Sport; RSS fetches always carry a category filter so unrelated
/// releases never enter the cache.
pub const DEFAULT_SPORT_CATEGORIES: &[u32] = &[5060];

/// One release as returned by an indexer
#[derive(Clone, Debug)]
pub struct ReleaseSearchResult {
    /// Release title
    pub title: String,
    /// GUID, unique per indexer
    pub guid: String,
    /// Payload URL (torrent file, NZB, or magnet)
    pub download_url: String,
    /// Human-facing info URL
    pub info_url: Option<String>,
    /// Publish date from the feed
    pub publish_date: Option<DateTime<Utc>>,
    /// Size in bytes (attr first, enclosure length as fallback)
    pub size: i64,
    /// Seeders (torznab only)
    pub seeders: Option<i64>,
    /// Leechers, derived from peers − seeders (torznab only)
    pub leechers: Option<i64>,
    /// Torrent infohash, when the indexer exposes one
    pub infohash: Option<String>,
    /// Indexer the release came from
    pub indexer: String,
    /// Transfer protocol
    pub protocol: Protocol,
    /// Transport-side score: seeders + quality + recency bonuses
    pub transport_score: i32,
}

/// HTTP client over Torznab/Newznab indexers with health integration
#[derive(Clone)]
pub struct IndexerClient {
    http: reqwest::Client,
    health: HealthManager,
    /// Last request instant per indexer, for request pacing
    pacing: Arc<Mutex<HashMap<String, Instant>>>,
}

impl IndexerClient {
    /// Create a client over the shared health manager
    pub fn new(health: HealthManager) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("arenarr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::Error::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, health, pacing: Arc::new(Mutex::new(HashMap::new())) })
    }

    /// Issue a `t=search` query. Admission (availability + hourly quota) is
    /// checked first; refusal surfaces as [`IndexerError::NotAvailable`]
    /// without touching the failure counter.
    pub async fn search(
        &self,
        config: &IndexerConfig,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<ReleaseSearchResult>, IndexerError> {
        self.fetch(config, Some(query), max_results).await
    }

    /// Fetch the indexer's RSS view (a `t=search` without a query). The
    /// category filter is always applied so unrelated categories never enter
    /// the cache.
    pub async fn fetch_rss(
        &self,
        config: &IndexerConfig,
        max_results: u32,
    ) -> Result<Vec<ReleaseSearchResult>, IndexerError> {
        self.fetch(config, None, max_results).await
    }

    async fn fetch(
        &self,
        config: &IndexerConfig,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<ReleaseSearchResult>, IndexerError> {
        let availability = self
            .health
            .availability(config)
            .await
            .map_err(|e| IndexerError::Transient {
                indexer: config.name.clone(),
                reason: format!("health lookup failed: {e}"),
            })?;
        if !availability.is_available() {
            return Err(IndexerError::NotAvailable {
                indexer: config.name.clone(),
                reason: availability.reason(),
            });
        }

        let admitted = self
            .health
            .admit_query(config)
            .await
            .map_err(|e| IndexerError::Transient {
                indexer: config.name.clone(),
                reason: format!("query admission failed: {e}"),
            })?;
        if !admitted {
            return Err(IndexerError::NotAvailable {
                indexer: config.name.clone(),
                reason: "hourly query limit reached".to_string(),
            });
        }

        self.pace(config).await;

        let url = build_query_url(config, query, max_results);
        tracing::debug!(indexer = %config.name, url = %url, "Issuing indexer request");

        let response = self
            .http
            .get(&url)
            .timeout(config.timeout)
            .send()
            .await
            .map_err(|e| IndexerError::Transient {
                indexer: config.name.clone(),
                reason: e.to_string(),
            });

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.record(&e).await;
                return Err(e);
            }
        };

        if let Err(e) = self.check_status(config, &response) {
            self.record(&e).await;
            return Err(e);
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                let err = IndexerError::Transient {
                    indexer: config.name.clone(),
                    reason: format!("failed to read body: {e}"),
                };
                self.record(&err).await;
                return Err(err);
            }
        };

        let results = match response::parse_feed(&config.name, config.protocol, &body) {
            Ok(r) => r,
            Err(e) => {
                self.record(&e).await;
                return Err(e);
            }
        };

        if let Err(e) = self.health.on_success(&config.name).await {
            tracing::warn!(indexer = %config.name, error = %e, "Failed to record indexer success");
        }

        Ok(results)
    }

    /// Map HTTP status to the error vocabulary; Ok for 2xx
    fn check_status(
        &self,
        config: &IndexerConfig,
        response: &reqwest::Response,
    ) -> Result<(), IndexerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RATE_LIMIT_SECS);
            return Err(IndexerError::RateLimited {
                indexer: config.name.clone(),
                retry_after_secs,
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(IndexerError::Auth {
                indexer: config.name.clone(),
                status: status.as_u16(),
            });
        }
        Err(IndexerError::RequestFailed {
            indexer: config.name.clone(),
            status: status.as_u16(),
        })
    }

    /// Route the error into the health model
    async fn record(&self, error: &IndexerError) {
        match self.health.on_error(error).await {
            Ok(Some(until)) => {
                tracing::warn!(indexer = error.indexer(), until = %until, error = %error, "Indexer disabled by backoff");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(indexer = error.indexer(), error = %e, "Failed to record indexer outcome");
            }
        }
    }

    /// Enforce the indexer's minimum request spacing
    async fn pace(&self, config: &IndexerConfig) {
        let Some(delay_ms) = config.request_delay_ms else {
            return;
        };
        let delay = Duration::from_millis(delay_ms);
        let wait = {
            let mut pacing = self.pacing.lock().await;
            let now = Instant::now();
            let wait = pacing
                .get(&config.name)
                .and_then(|last| delay.checked_sub(now.duration_since(*last)))
                .unwrap_or(Duration::ZERO);
            pacing.insert(config.name.clone(), now + wait);
            wait
        };
        if !wait.is_zero() {
            tracing::debug!(indexer = %config.name, wait_ms = wait.as_millis() as u64, "Pacing indexer request");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Build the query URL for a search (`q` present) or RSS fetch (`q` absent)
fn build_query_url(config: &IndexerConfig, query: Option<&str>, max_results: u32) -> String {
    let base = config.base_url.trim_end_matches('/');
    let api_path = if config.api_path.starts_with('/') {
        config.api_path.clone()
    } else {
        format!("/{}", config.api_path)
    };

    let categories: Vec<String> = if config.categories.is_empty() {
        DEFAULT_SPORT_CATEGORIES.iter().map(|c| c.to_string()).collect()
    } else {
        config.categories.iter().map(|c| c.to_string()).collect()
    };

    let mut url = format!(
        "{base}{api_path}?t=search&cat={}&limit={}&extended=1",
        categories.join(","),
        max_results
    );
    if let Some(q) = query {
        url.push_str("&q=");
        url.push_str(&urlencoding::encode(q));
    }
    if let Some(key) = &config.api_key {
        url.push_str("&apikey=");
        url.push_str(&urlencoding::encode(key));
    }
    url
}

/// Parse a Retry-After header value: delta-seconds or an HTTP date
fn parse_retry_after(value: &str) -> Option<u64> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(secs);
    }
    let when = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    let delta = when.with_timezone(&Utc) - Utc::now();
    Some(delta.num_seconds().max(0) as u64)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn indexer_config(name: &str, base_url: &str) -> IndexerConfig {
        IndexerConfig {
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_path: "/api".to_string(),
            api_key: Some("secret".to_string()),
            categories: vec![],
            enabled: true,
            protocol: Protocol::Torrent,
            query_limit: None,
            grab_limit: None,
            request_delay_ms: None,
            timeout: Duration::from_secs(5),
        }
    }

    async fn client() -> (IndexerClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let health = HealthManager::new(Arc::new(db));
        (IndexerClient::new(health).unwrap(), dir)
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <title>idx1</title>
    <item>
      <title>UFC.299.Main.Card.1080p.WEB-DL.H264-GRP</title>
      <guid>g1</guid>
      <link>https://idx1.example.com/details/1</link>
      <pubDate>Sat, 09 Mar 2024 23:11:00 +0000</pubDate>
      <enclosure url="https://idx1.example.com/dl/1.torrent" length="4000000000" type="application/x-bittorrent"/>
      <torznab:attr name="seeders" value="50"/>
      <torznab:attr name="peers" value="55"/>
      <torznab:attr name="infohash" value="aabbccddee"/>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn search_parses_a_torznab_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("t", "search"))
            .and(query_param("q", "UFC 299"))
            .and(query_param("apikey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FEED, "application/rss+xml"))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let results = client.search(&config, "UFC 299", 100).await.unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.guid, "g1");
        assert_eq!(r.download_url, "https://idx1.example.com/dl/1.torrent");
        assert_eq!(r.size, 4_000_000_000);
        assert_eq!(r.seeders, Some(50));
        assert_eq!(r.leechers, Some(5), "leechers derive from peers − seeders");
        assert_eq!(r.infohash.as_deref(), Some("aabbccddee"));
        assert!(r.transport_score > 0);
    }

    #[tokio::test]
    async fn rss_fetch_always_sends_a_category_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("cat", "5060"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FEED, "application/rss+xml"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let results = client.fetch_rss(&config, 100).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn http_429_surfaces_as_rate_limited_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "300"))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let err = client.search(&config, "UFC 299", 100).await.unwrap_err();

        match &err {
            IndexerError::RateLimited { retry_after_secs, .. } => {
                assert_eq!(*retry_after_secs, 300);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(!err.counts_as_failure());

        // the cooldown is now in effect: the next call is refused locally
        let err = client.search(&config, "UFC 299", 100).await.unwrap_err();
        assert!(
            matches!(err, IndexerError::NotAvailable { .. }),
            "the 429 cooldown must gate the next attempt"
        );
    }

    #[tokio::test]
    async fn http_500_counts_as_failure_and_disables_the_indexer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let err = client.search(&config, "UFC 299", 100).await.unwrap_err();
        assert!(matches!(err, IndexerError::RequestFailed { status: 500, .. }));

        // the very next call is refused by the backoff without touching HTTP
        let err = client.search(&config, "UFC 299", 100).await.unwrap_err();
        assert!(matches!(err, IndexerError::NotAvailable { .. }));
    }

    #[tokio::test]
    async fn auth_rejection_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let err = client.search(&config, "x", 10).await.unwrap_err();
        assert!(matches!(err, IndexerError::Auth { status: 401, .. }));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("this is not xml"))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let config = indexer_config("idx1", &server.uri());
        let err = client.search(&config, "x", 10).await.unwrap_err();
        assert!(matches!(err, IndexerError::Malformed { .. }));
    }

    #[tokio::test]
    async fn query_limit_refuses_after_admission_budget_is_spent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FEED, "application/rss+xml"))
            .mount(&server)
            .await;

        let (client, _dir) = client().await;
        let mut config = indexer_config("idx1", &server.uri());
        config.query_limit = Some(2);

        assert!(client.search(&config, "a", 10).await.is_ok());
        assert!(client.search(&config, "b", 10).await.is_ok());
        let err = client.search(&config, "c", 10).await.unwrap_err();
        assert!(
            matches!(err, IndexerError::NotAvailable { .. }),
            "the third query must be refused by the hourly quota"
        );
    }

    #[test]
    fn retry_after_accepts_seconds_and_http_dates() {
        assert_eq!(parse_retry_after("300"), Some(300));
        assert_eq!(parse_retry_after(" 42 "), Some(42));
        let future = (Utc::now() + chrono::Duration::seconds(90)).to_rfc2822();
        let parsed = parse_retry_after(&future).unwrap();
        assert!((80..=95).contains(&parsed), "HTTP-date deltas land near 90s, got {parsed}");
        assert_eq!(parse_retry_after("garbage"), None);
    }

    #[test]
    fn url_builder_applies_defaults_and_encodes() {
        let config = indexer_config("idx1", "https://idx1.example.com/");
        let url = build_query_url(&config, Some("UFC 299"), 50);
        assert!(url.starts_with("https://idx1.example.com/api?t=search"));
        assert!(url.contains("cat=5060"), "empty config categories fall back to sport TV");
        assert!(url.contains("q=UFC%20299"));
        assert!(url.contains("limit=50"));
        assert!(url.contains("apikey=secret"));

        let mut custom = config;
        custom.categories = vec![5060, 5070];
        let url = build_query_url(&custom, None, 10);
        assert!(url.contains("cat=5060%2C5070") || url.contains("cat=5060,5070"));
        assert!(!url.contains("&q="), "RSS fetches carry no q parameter");
    }
}
