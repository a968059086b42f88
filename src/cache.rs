//! Release cache (C4)
//!
//! Content-addressed (by GUID), TTL-bounded store of every release ever seen,
//! with denormalized search tokens for fuzzy in-memory filtering. Indexers
//! impose strict hourly quotas; the cache converts N event-searches into at
//! most one RSS poll per indexer per cycle plus in-memory filtering with no
//! external I/O.

use crate::db::{CacheEntry, Database, NewCacheEntry, SportEvent};
use crate::indexer::ReleaseSearchResult;
use crate::title::{parse_title, sports};
use crate::utils::{normalize_title, significant_words};
use crate::Result;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Fraction of expected search terms that must appear in an entry's term bag
/// for the fuzzy path to accept it
const TERM_MATCH_FRACTION: f64 = 1.0 / 3.0;

/// Upper bound on candidates pulled from the store per event query
const CANDIDATE_LIMIT: u32 = 500;

/// Extra query tokens implied by a league name. Keyed on the normalized
/// league; release titles often use the short forms.
const LEAGUE_ALIASES: &[(&str, &[&str])] = &[
    ("formula 1", &["f1", "formula1", "grand", "prix"]),
    ("formula one", &["f1", "formula1", "grand", "prix"]),
    ("motogp", &["moto", "gp"]),
    ("premier league", &["epl"]),
    ("english premier league", &["epl"]),
    ("champions league", &["ucl", "uefa"]),
    ("major league baseball", &["mlb"]),
    ("national football league", &["nfl"]),
    ("national basketball association", &["nba"]),
    ("national hockey league", &["nhl"]),
    ("ultimate fighting championship", &["ufc"]),
];

/// Expected search terms for an event: title words, league forms (with
/// aliases), team words, and the event year.
pub fn expected_search_terms(event: &SportEvent) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: String| {
        if term.len() > 1 && !terms.contains(&term) {
            terms.push(term);
        }
    };

    for word in significant_words(&event.title) {
        push(word);
    }
    if let Some(league) = &event.league {
        let normalized = normalize_title(league);
        push(normalized.replace(' ', ""));
        for word in significant_words(league) {
            push(word);
        }
        for (alias_key, extras) in LEAGUE_ALIASES {
            if normalized == *alias_key {
                for extra in *extras {
                    push((*extra).to_string());
                }
            }
        }
    }
    for team in [&event.home_team, &event.away_team].into_iter().flatten() {
        for word in significant_words(team) {
            push(word);
        }
    }
    push(event_year(event).to_string());

    terms
}

/// Canonical sport prefix for an event, from its league first, title second
pub fn event_sport_prefix(event: &SportEvent) -> Option<String> {
    event
        .league
        .as_deref()
        .and_then(sports::detect_sport_prefix)
        .or_else(|| sports::detect_sport_prefix(&event.title))
}

/// Calendar year of the event date
pub fn event_year(event: &SportEvent) -> i32 {
    use chrono::Datelike;
    Utc.timestamp_opt(event.event_date, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .year()
}

/// The in-memory filter for the by-event query path.
///
/// An entry matches when its normalized title contains the event's normalized
/// title, OR at least a third of the expected search terms appear in the
/// entry's term bag — in both cases subject to year agreement when the entry
/// carries a parsed year.
pub fn is_release_match(entry: &CacheEntry, event_normalized_title: &str, terms: &[String]) -> bool {
    if let Some(entry_year) = entry.year {
        let wanted_year = terms.iter().any(|t| *t == entry_year.to_string());
        if !wanted_year {
            return false;
        }
    }

    if !event_normalized_title.is_empty()
        && entry.normalized_title.contains(event_normalized_title)
    {
        return true;
    }

    if terms.is_empty() {
        return false;
    }
    let bag = format!(" {} ", entry.search_terms);
    let hits = terms.iter().filter(|t| bag.contains(&format!(" {t} "))).count();
    (hits as f64) >= (terms.len() as f64 * TERM_MATCH_FRACTION)
}

/// Database-backed release cache
#[derive(Clone)]
pub struct ReleaseCache {
    db: Arc<Database>,
    ttl: Duration,
}

impl ReleaseCache {
    /// Create a cache over the shared database with the configured TTL
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Upsert search results into the cache. Repeated caching of the same
    /// results is idempotent in observable state (only TTLs refresh).
    pub async fn cache_releases(
        &self,
        results: &[ReleaseSearchResult],
        from_rss: bool,
    ) -> Result<usize> {
        let now = Utc::now().timestamp();
        let expires_at = now + self.ttl.as_secs() as i64;

        let mut cached = 0;
        for result in results {
            let entry = self.build_entry(result, from_rss, now, expires_at);
            self.db.upsert_cache_entry(&entry).await?;
            cached += 1;
        }

        if cached > 0 {
            tracing::debug!(count = cached, from_rss = from_rss, "Cached releases");
        }
        Ok(cached)
    }

    fn build_entry(
        &self,
        result: &ReleaseSearchResult,
        from_rss: bool,
        now: i64,
        expires_at: i64,
    ) -> NewCacheEntry {
        let parsed = parse_title(&result.title);
        let normalized_title = normalize_title(&result.title);
        let search_terms = significant_words(&result.title).join(" ");

        NewCacheEntry {
            guid: result.guid.clone(),
            title: result.title.clone(),
            normalized_title,
            search_terms,
            download_url: result.download_url.clone(),
            info_url: result.info_url.clone(),
            indexer: result.indexer.clone(),
            protocol: result.protocol.as_str().to_string(),
            infohash: result.infohash.clone(),
            size: result.size,
            quality_label: Some(parsed.quality.label()),
            codec: parsed.quality.codec.map(|c| c.as_str().to_string()),
            language: parsed.language.clone(),
            seeders: result.seeders,
            leechers: result.leechers,
            publish_date: result.publish_date.map(|d| d.timestamp()),
            cached_at: now,
            expires_at,
            from_rss,
            sport_prefix: parsed.sport_prefix.clone(),
            year: parsed.year.map(i64::from),
            round: parsed.round.map(i64::from),
            is_pack: parsed.is_pack,
        }
    }

    /// By-event query: load candidates bounded by the indexed columns, then
    /// filter in memory with [`is_release_match`].
    pub async fn query_for_event(&self, event: &SportEvent) -> Result<Vec<CacheEntry>> {
        let now = Utc::now().timestamp();
        let prefix = event_sport_prefix(event);
        let year = i64::from(event_year(event));
        let terms = expected_search_terms(event);
        let normalized_title = normalize_title(&event.title);

        let candidates = self
            .db
            .load_cache_candidates(prefix.as_deref(), Some(year), now, CANDIDATE_LIMIT)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|entry| is_release_match(entry, &normalized_title, &terms))
            .collect())
    }

    /// Broad-query path: every normalized token must appear in the title
    pub async fn query_by_tokens(&self, query: &str) -> Result<Vec<CacheEntry>> {
        let now = Utc::now().timestamp();
        let tokens = significant_words(query);
        self.db.search_cache_by_tokens(&tokens, now, CANDIDATE_LIMIT).await
    }

    /// Remove expired entries; returns how many were swept
    pub async fn sweep(&self) -> Result<u64> {
        let removed = self.db.sweep_expired_cache(Utc::now().timestamp()).await?;
        if removed > 0 {
            tracing::info!(removed = removed, "Swept expired cache entries");
        }
        Ok(removed)
    }
}
