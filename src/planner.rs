//! Event search planner (C8)
//!
//! For every monitored event that still needs acquisition, the planner
//! decides *when* to search (event date, TV broadcast time, previous
//! attempts), *where* to search (cache first, then green indexers), and
//! *which* candidate to grab (match confidence, then scorer total, then
//! transport score). Winning candidates are handed to a download client and
//! recorded as queue items.

use crate::cache::ReleaseCache;
use crate::clients::ClientSet;
use crate::config::Config;
use crate::db::{CacheEntry, Database, EventPart, NewQueueItem, SportEvent};
use crate::error::IndexerError;
use crate::health::HealthManager;
use crate::indexer::IndexerClient;
use crate::matching::{self, EventDescriptor, MatchResult};
use crate::scoring::{self, CustomFormat, QualityProfile};
use crate::title::parse_title;
use crate::types::{DownloadStatus, EventId, Protocol, SystemEvent};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A cache entry that passed validation, with everything needed to rank it
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    /// The underlying cache entry
    pub entry: CacheEntry,
    /// Match outcome against the event
    pub match_result: MatchResult,
    /// Scorer total (quality + custom formats)
    pub score_total: i32,
    /// Custom-format component, for the min-score gate
    pub format_score: i32,
}

/// Order candidates: confidence first, scorer total second, seeders third,
/// recency last. Deterministic for equal inputs.
pub fn rank_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.match_result
            .confidence
            .cmp(&a.match_result.confidence)
            .then_with(|| b.score_total.cmp(&a.score_total))
            .then_with(|| b.entry.seeders.unwrap_or(0).cmp(&a.entry.seeders.unwrap_or(0)))
            .then_with(|| b.entry.publish_date.unwrap_or(0).cmp(&a.entry.publish_date.unwrap_or(0)))
            .then_with(|| a.entry.guid.cmp(&b.entry.guid))
    });
}

/// When may the planner issue external searches for an event?
///
/// Scene releases appear shortly after broadcast, so with a known future
/// broadcast time the planner defers until the pre-broadcast window opens.
/// Without a broadcast time the event is eligible immediately.
pub fn search_eligible(
    broadcast_time: Option<DateTime<Utc>>,
    pre_broadcast_window: std::time::Duration,
    now: DateTime<Utc>,
) -> bool {
    match broadcast_time {
        Some(broadcast) => {
            let window_opens = broadcast - chrono::Duration::seconds(pre_broadcast_window.as_secs() as i64);
            now >= window_opens
        }
        None => true,
    }
}

/// Candidate queries for an event: the title itself, a league-qualified
/// form, and team/year expansions. Deduplicated, order-preserving.
pub fn compose_queries(event: &SportEvent) -> Vec<String> {
    let year = crate::cache::event_year(event);
    let mut queries: Vec<String> = Vec::new();
    let mut push = |q: String| {
        let q = q.trim().to_string();
        if !q.is_empty() && !queries.iter().any(|existing| existing.eq_ignore_ascii_case(&q)) {
            queries.push(q);
        }
    };

    push(event.title.clone());
    if let Some(league) = &event.league {
        if !event.title.to_lowercase().contains(&league.to_lowercase()) {
            push(format!("{league} {}", event.title));
        }
    }
    if let (Some(home), Some(away)) = (&event.home_team, &event.away_team) {
        push(format!("{home} vs {away}"));
        push(format!("{home} {away} {year}"));
    }
    push(format!("{} {year}", event.title));

    queries
}

/// The planner worker
pub struct SearchPlanner {
    config: Arc<Config>,
    db: Arc<Database>,
    cache: ReleaseCache,
    client: IndexerClient,
    health: HealthManager,
    clients: ClientSet,
    events_tx: broadcast::Sender<SystemEvent>,
    cancel: CancellationToken,
}

impl SearchPlanner {
    /// Create the worker over shared components
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        db: Arc<Database>,
        cache: ReleaseCache,
        client: IndexerClient,
        health: HealthManager,
        clients: ClientSet,
        events_tx: broadcast::Sender<SystemEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, db, cache, client, health, clients, events_tx, cancel }
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(
            interval_secs = self.config.planner.interval.as_secs(),
            "Search planner started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.plan_once().await {
                warn!(error = %e, "Planner iteration failed");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.planner.interval) => {}
            }
        }

        info!("Search planner stopped");
    }

    /// One full planning pass. Per-event errors are recovered locally so one
    /// poison event cannot starve its siblings.
    pub async fn plan_once(&self) -> crate::Result<()> {
        let events = self.db.list_events_needing_acquisition().await?;
        debug!(events = events.len(), "Planning acquisition pass");

        for event in events {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.plan_event(&event).await {
                warn!(event_id = event.id, title = %event.title, error = %e, "Event planning failed");
            }
        }

        Ok(())
    }

    /// Plan one event (or its individually monitored parts)
    pub async fn plan_event(&self, event: &SportEvent) -> crate::Result<()> {
        let event_id = EventId(event.id);

        // an in-flight download means nothing to do this cycle
        let queue = self.db.list_event_queue_items(event_id).await?;
        let mut failed_retry_budget_left = true;
        for item in &queue {
            let status = DownloadStatus::from_i32(item.status);
            match status {
                DownloadStatus::Failed => {
                    if !self.config.monitor.redownload_failed
                        || item.retry_count >= i64::from(self.config.monitor.max_retries)
                    {
                        failed_retry_budget_left = false;
                    }
                }
                DownloadStatus::Imported => {}
                _ => return Ok(()),
            }
        }
        if !failed_retry_budget_left {
            debug!(event_id = event.id, "Retry budget exhausted, not replacing failed download");
            return Ok(());
        }

        let now = Utc::now();
        let broadcast_time = event.broadcast_time.and_then(|t| Utc.timestamp_opt(t, 0).single());

        let parts = self.db.list_event_parts(event_id).await?;
        let wanted_parts: Vec<Option<&EventPart>> = if parts.is_empty() {
            vec![None]
        } else {
            parts
                .iter()
                .filter(|p| p.monitored == 1 && p.has_file == 0)
                .map(Some)
                .collect()
        };
        if wanted_parts.is_empty() {
            return Ok(());
        }

        let profile = match event.quality_profile_id {
            Some(id) => self.db.load_profile(id).await?,
            None => None,
        };
        let custom_formats = self.db.load_custom_formats().await?;

        for part in wanted_parts {
            let part_name = part.map(|p| p.name.as_str());

            let mut candidates = self
                .validated_candidates(event, part_name, profile.as_ref(), &custom_formats)
                .await?;

            // cache miss: spend search quota only inside the broadcast window
            if candidates.is_empty() {
                if !search_eligible(broadcast_time, self.config.planner.pre_broadcast_window, now) {
                    debug!(
                        event_id = event.id,
                        broadcast = ?broadcast_time,
                        "Deferring external search until the broadcast window"
                    );
                    continue;
                }
                if !self.search_backoff_elapsed(event, now) {
                    continue;
                }

                self.external_search(event).await?;
                candidates = self
                    .validated_candidates(event, part_name, profile.as_ref(), &custom_formats)
                    .await?;
            }

            if candidates.is_empty() {
                continue;
            }

            rank_candidates(&mut candidates);
            self.grab_first_allowed(event, part, candidates).await?;
        }

        Ok(())
    }

    /// Validate and score live cache entries for an event/part
    async fn validated_candidates(
        &self,
        event: &SportEvent,
        part_name: Option<&str>,
        profile: Option<&QualityProfile>,
        custom_formats: &[CustomFormat],
    ) -> crate::Result<Vec<ScoredCandidate>> {
        let entries = self.cache.query_for_event(event).await?;
        let descriptor = EventDescriptor {
            title: &event.title,
            league: event.league.as_deref(),
            home_team: event.home_team.as_deref(),
            away_team: event.away_team.as_deref(),
            event_date: Utc
                .timestamp_opt(event.event_date, 0)
                .single()
                .unwrap_or_else(Utc::now),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            // packs bundle many events; individual acquisition never wants them
            if entry.is_pack == 1 {
                continue;
            }

            let parsed = parse_title(&entry.title);
            let match_result = matching::validate(&entry.title, &parsed, &descriptor, part_name);
            if !match_result.is_match {
                continue;
            }

            if let Some(p) = profile {
                if !p.is_allowed(&parsed.quality.label()) {
                    debug!(title = %entry.title, "Rejected: quality not allowed by profile");
                    continue;
                }
            }

            let size = if entry.size > 0 { Some(entry.size as u64) } else { None };
            let breakdown = scoring::score_release(&entry.title, &parsed, size, profile, custom_formats);

            if let Some(p) = profile {
                if breakdown.format_score < p.min_format_score {
                    debug!(
                        title = %entry.title,
                        format_score = breakdown.format_score,
                        "Rejected: below minimum format score"
                    );
                    continue;
                }
            }

            candidates.push(ScoredCandidate {
                format_score: breakdown.format_score,
                score_total: breakdown.total(),
                match_result,
                entry,
            });
        }

        Ok(candidates)
    }

    /// Has the per-event search backoff elapsed?
    fn search_backoff_elapsed(&self, event: &SportEvent, now: DateTime<Utc>) -> bool {
        match event.last_search_at {
            Some(last) => {
                now.timestamp() - last >= self.config.planner.search_backoff.as_secs() as i64
            }
            None => true,
        }
    }

    /// One budgeted external search per green indexer, results into the cache
    async fn external_search(&self, event: &SportEvent) -> crate::Result<()> {
        let queries = compose_queries(event);
        let Some(primary_query) = queries.first() else {
            return Ok(());
        };

        self.db
            .touch_event_search(EventId(event.id), Utc::now().timestamp())
            .await?;

        for indexer in &self.config.indexers {
            if self.cancel.is_cancelled() {
                break;
            }
            if !indexer.enabled {
                continue;
            }

            match self
                .client
                .search(indexer, primary_query, self.config.planner.max_results)
                .await
            {
                Ok(results) => {
                    debug!(
                        indexer = %indexer.name,
                        query = %primary_query,
                        results = results.len(),
                        "External search complete"
                    );
                    if let Err(e) = self.cache.cache_releases(&results, false).await {
                        warn!(indexer = %indexer.name, error = %e, "Failed to cache search results");
                    }
                }
                Err(IndexerError::NotAvailable { indexer: name, reason }) => {
                    debug!(indexer = %name, reason = %reason, "Search skipped: indexer unavailable");
                }
                Err(e) => {
                    warn!(indexer = %indexer.name, error = %e, "External search failed");
                }
            }
        }

        Ok(())
    }

    /// Walk ranked candidates, skip blocklisted ones, grab the first allowed
    async fn grab_first_allowed(
        &self,
        event: &SportEvent,
        part: Option<&EventPart>,
        candidates: Vec<ScoredCandidate>,
    ) -> crate::Result<()> {
        let event_id = EventId(event.id);

        for candidate in candidates {
            let entry = &candidate.entry;

            if self
                .db
                .is_blocklisted(event_id, &entry.indexer, &entry.title, entry.infohash.as_deref())
                .await?
            {
                debug!(title = %entry.title, "Skipping blocklisted release");
                continue;
            }

            let protocol = Protocol::from_str_lossy(&entry.protocol);
            let client = match self.clients.for_protocol(protocol) {
                Ok(c) => c,
                Err(e) => {
                    warn!(protocol = %protocol, error = %e, "No download client for candidate");
                    continue;
                }
            };

            // the grab quota is separate from the query quota
            if let Some(indexer_config) =
                self.config.indexers.iter().find(|i| i.name == entry.indexer)
            {
                if !self.health.admit_grab(indexer_config).await? {
                    debug!(indexer = %entry.indexer, "Grab refused by hourly grab quota");
                    continue;
                }
            }

            let download_id = match client.add_by_url(&entry.download_url, Some("arenarr")).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(title = %entry.title, client = client.name(), error = %e, "Grab failed");
                    continue;
                }
            };

            let queue_id = self
                .db
                .insert_queue_item(&NewQueueItem {
                    event_id,
                    part_id: part.map(|p| p.id),
                    client: client.name().to_string(),
                    download_id,
                    title: entry.title.clone(),
                    category: Some("arenarr".to_string()),
                    indexer: entry.indexer.clone(),
                    infohash: entry.infohash.clone(),
                    protocol: entry.protocol.clone(),
                    size: entry.size,
                })
                .await?;

            self.db
                .record_history(
                    Some(event_id),
                    "grabbed",
                    &entry.title,
                    Some(&format!(
                        "indexer={} confidence={} score={}",
                        entry.indexer, candidate.match_result.confidence, candidate.score_total
                    )),
                )
                .await?;

            info!(
                event_id = event.id,
                queue_id = %queue_id,
                title = %entry.title,
                indexer = %entry.indexer,
                confidence = candidate.match_result.confidence,
                "Grabbed release"
            );
            let _ = self.events_tx.send(SystemEvent::Grabbed {
                event_id,
                title: entry.title.clone(),
                indexer: entry.indexer.clone(),
            });

            return Ok(());
        }

        debug!(event_id = event.id, "No grabbable candidate this cycle");
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::ScriptedClient;
    use crate::db::NewEvent;
    use crate::indexer::ReleaseSearchResult;
    use std::time::Duration;

    fn event_row(title: &str, league: Option<&str>, date: DateTime<Utc>) -> SportEvent {
        SportEvent {
            id: 1,
            title: title.to_string(),
            sport: "mma".to_string(),
            league: league.map(|l| l.to_string()),
            home_team: None,
            away_team: None,
            event_date: date.timestamp(),
            broadcast_time: None,
            external_id: None,
            monitored: 1,
            quality_profile_id: None,
            has_file: 0,
            file_path: None,
            last_search_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn search_defers_until_the_broadcast_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap();
        let broadcast = Some(Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap());
        let window = Duration::from_secs(30 * 60);

        assert!(
            !search_eligible(broadcast, window, now),
            "two hours early with a 30 minute window: defer"
        );
        let close = Utc.with_ymd_and_hms(2024, 3, 9, 21, 40, 0).unwrap();
        assert!(search_eligible(broadcast, window, close), "inside the window");
        let after = Utc.with_ymd_and_hms(2024, 3, 9, 23, 0, 0).unwrap();
        assert!(search_eligible(broadcast, window, after), "past broadcast: eligible");
    }

    #[test]
    fn same_second_broadcast_start_is_eligible() {
        // spec boundary: a release landing exactly at broadcast start searches
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap();
        assert!(search_eligible(Some(at), Duration::from_secs(0), at));
    }

    #[test]
    fn no_broadcast_time_is_immediately_eligible() {
        let now = Utc::now();
        assert!(search_eligible(None, Duration::from_secs(1800), now));
    }

    #[test]
    fn queries_include_title_league_and_team_forms() {
        let mut event = event_row("Chiefs vs Raiders", Some("NFL"), Utc::now());
        event.home_team = Some("Kansas City Chiefs".to_string());
        event.away_team = Some("Las Vegas Raiders".to_string());

        let queries = compose_queries(&event);
        assert_eq!(queries[0], "Chiefs vs Raiders", "the raw title is the primary query");
        assert!(queries.iter().any(|q| q.starts_with("NFL ")));
        assert!(queries.iter().any(|q| q.contains("Kansas City Chiefs vs Las Vegas Raiders")));
        // no duplicates
        let mut dedup = queries.clone();
        dedup.dedup();
        assert_eq!(queries.len(), dedup.len());
    }

    #[test]
    fn league_already_in_title_is_not_doubled() {
        let event = event_row("UFC 299", Some("UFC"), Utc::now());
        let queries = compose_queries(&event);
        assert!(
            !queries.iter().any(|q| q.starts_with("UFC UFC")),
            "league prefix must not duplicate: {queries:?}"
        );
    }

    fn scored(guid: &str, confidence: i32, total: i32, seeders: i64) -> ScoredCandidate {
        ScoredCandidate {
            entry: CacheEntry {
                id: 0,
                guid: guid.to_string(),
                title: guid.to_string(),
                normalized_title: guid.to_string(),
                search_terms: String::new(),
                download_url: "http://x".to_string(),
                info_url: None,
                indexer: "idx1".to_string(),
                protocol: "torrent".to_string(),
                infohash: None,
                size: 0,
                quality_label: None,
                codec: None,
                language: None,
                seeders: Some(seeders),
                leechers: None,
                publish_date: None,
                cached_at: 0,
                expires_at: 1,
                from_rss: 1,
                sport_prefix: None,
                year: None,
                round: None,
                is_pack: 0,
            },
            match_result: MatchResult {
                confidence,
                is_match: true,
                hard_reject: false,
                reasons: vec![],
                rejections: vec![],
            },
            score_total: total,
            format_score: 0,
        }
    }

    #[test]
    fn ranking_orders_confidence_then_score_then_seeders() {
        let mut candidates = vec![
            scored("low-confidence", 60, 999, 500),
            scored("high-confidence", 95, 100, 1),
            scored("mid-better-score", 80, 400, 10),
            scored("mid-worse-score", 80, 300, 999),
        ];
        rank_candidates(&mut candidates);
        let order: Vec<&str> = candidates.iter().map(|c| c.entry.guid.as_str()).collect();
        assert_eq!(
            order,
            vec!["high-confidence", "mid-better-score", "mid-worse-score", "low-confidence"],
            "confidence dominates score, score dominates seeders"
        );
    }

    #[test]
    fn ranking_is_deterministic_on_full_ties() {
        let mut a = vec![scored("b", 80, 100, 10), scored("a", 80, 100, 10)];
        let mut b = vec![scored("a", 80, 100, 10), scored("b", 80, 100, 10)];
        rank_candidates(&mut a);
        rank_candidates(&mut b);
        let order_a: Vec<&str> = a.iter().map(|c| c.entry.guid.as_str()).collect();
        let order_b: Vec<&str> = b.iter().map(|c| c.entry.guid.as_str()).collect();
        assert_eq!(order_a, order_b, "guid breaks full ties deterministically");
    }

    /// End-to-end planner pass against a seeded cache and a scripted client:
    /// the UFC 299 release is selected from the cache, handed to the client,
    /// and recorded as a queue item (no external search needed).
    #[tokio::test]
    async fn cached_release_is_grabbed_without_external_search() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("t.db")).await.unwrap());
        let config = Arc::new(Config::default());
        let cache = ReleaseCache::new(db.clone(), Duration::from_secs(7 * 86_400));
        let health = HealthManager::new(db.clone());
        let client = IndexerClient::new(health.clone()).unwrap();
        let scripted = Arc::new(ScriptedClient::new("qbit", Protocol::Torrent));
        let mut clients = ClientSet::new();
        clients.register(scripted.clone());
        let (events_tx, mut events_rx) = broadcast::channel(16);

        let event_id = db
            .insert_event(&NewEvent {
                title: "UFC 299".to_string(),
                sport: "mma".to_string(),
                league: Some("UFC".to_string()),
                home_team: None,
                away_team: None,
                event_date: Utc::now().timestamp() + 3600,
                broadcast_time: None,
                external_id: None,
                monitored: true,
                quality_profile_id: None,
            })
            .await
            .unwrap();

        cache
            .cache_releases(
                &[ReleaseSearchResult {
                    title: "UFC.299.Main.Card.1080p.WEB-DL.H264-GRP".to_string(),
                    guid: "g1".to_string(),
                    download_url: "http://idx1/dl/1".to_string(),
                    info_url: None,
                    publish_date: Some(Utc::now()),
                    size: 4_000_000_000,
                    seeders: Some(50),
                    leechers: Some(5),
                    infohash: Some("aabbcc".to_string()),
                    indexer: "idx1".to_string(),
                    protocol: Protocol::Torrent,
                    transport_score: 100,
                }],
                true,
            )
            .await
            .unwrap();

        let planner = SearchPlanner::new(
            config,
            db.clone(),
            cache,
            client,
            health,
            clients,
            events_tx,
            CancellationToken::new(),
        );
        planner.plan_once().await.unwrap();

        let queue = db.list_event_queue_items(event_id).await.unwrap();
        assert_eq!(queue.len(), 1, "exactly one grab for the event");
        assert_eq!(queue[0].title, "UFC.299.Main.Card.1080p.WEB-DL.H264-GRP");
        assert_eq!(queue[0].client, "qbit");
        assert_eq!(scripted.added.lock().unwrap().len(), 1);

        match events_rx.try_recv().unwrap() {
            SystemEvent::Grabbed { title, indexer, .. } => {
                assert_eq!(indexer, "idx1");
                assert!(title.starts_with("UFC.299"));
            }
            other => panic!("expected Grabbed, got {other:?}"),
        }

        // a second pass sees the in-flight download and does nothing
        planner.plan_once().await.unwrap();
        assert_eq!(db.list_event_queue_items(event_id).await.unwrap().len(), 1);
    }

    /// Scenario: the wrong event number never outranks the right one, even
    /// with more seeders.
    #[tokio::test]
    async fn wrong_event_number_is_never_grabbed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("t.db")).await.unwrap());
        let config = Arc::new(Config::default());
        let cache = ReleaseCache::new(db.clone(), Duration::from_secs(7 * 86_400));
        let health = HealthManager::new(db.clone());
        let client = IndexerClient::new(health.clone()).unwrap();
        let scripted = Arc::new(ScriptedClient::new("qbit", Protocol::Torrent));
        let mut clients = ClientSet::new();
        clients.register(scripted.clone());
        let (events_tx, _events_rx) = broadcast::channel(16);

        let event_id = db
            .insert_event(&NewEvent {
                title: "UFC 299".to_string(),
                sport: "mma".to_string(),
                league: Some("UFC".to_string()),
                home_team: None,
                away_team: None,
                event_date: Utc::now().timestamp() + 3600,
                broadcast_time: None,
                external_id: None,
                monitored: true,
                quality_profile_id: None,
            })
            .await
            .unwrap();

        let mk = |title: &str, guid: &str, seeders: i64| ReleaseSearchResult {
            title: title.to_string(),
            guid: guid.to_string(),
            download_url: format!("http://idx1/dl/{guid}"),
            info_url: None,
            publish_date: Some(Utc::now()),
            size: 4_000_000_000,
            seeders: Some(seeders),
            leechers: Some(0),
            infohash: None,
            indexer: "idx1".to_string(),
            protocol: Protocol::Torrent,
            transport_score: 0,
        };
        cache
            .cache_releases(
                &[
                    mk("UFC.298.Main.Card.1080p.WEB-DL", "g2", 5000),
                    mk("UFC.299.Main.Card.1080p.WEB-DL", "g1", 50),
                ],
                true,
            )
            .await
            .unwrap();

        let planner = SearchPlanner::new(
            config,
            db.clone(),
            cache,
            client,
            health,
            clients,
            events_tx,
            CancellationToken::new(),
        );
        planner.plan_once().await.unwrap();

        let queue = db.list_event_queue_items(event_id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(
            queue[0].title.starts_with("UFC.299"),
            "g1 must win deterministically over the wrong-number g2"
        );
    }

    /// Scenario: a part was requested but no candidate carries a part token —
    /// hard reject, no grab.
    #[tokio::test]
    async fn part_required_but_missing_grabs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("t.db")).await.unwrap());
        let config = Arc::new(Config::default());
        let cache = ReleaseCache::new(db.clone(), Duration::from_secs(7 * 86_400));
        let health = HealthManager::new(db.clone());
        let client = IndexerClient::new(health.clone()).unwrap();
        let scripted = Arc::new(ScriptedClient::new("qbit", Protocol::Torrent));
        let mut clients = ClientSet::new();
        clients.register(scripted.clone());
        let (events_tx, _events_rx) = broadcast::channel(16);

        let event_id = db
            .insert_event(&NewEvent {
                title: "UFC 299".to_string(),
                sport: "mma".to_string(),
                league: Some("UFC".to_string()),
                home_team: None,
                away_team: None,
                event_date: Utc::now().timestamp() + 3600,
                broadcast_time: None,
                external_id: None,
                monitored: true,
                quality_profile_id: None,
            })
            .await
            .unwrap();
        db.insert_event_part(&crate::db::NewEventPart {
            event_id,
            name: "Prelims".to_string(),
            part_number: 1,
            monitored: true,
        })
        .await
        .unwrap();

        cache
            .cache_releases(
                &[ReleaseSearchResult {
                    title: "UFC.299.1080p.WEB-DL".to_string(),
                    guid: "g1".to_string(),
                    download_url: "http://idx1/dl/1".to_string(),
                    info_url: None,
                    publish_date: Some(Utc::now()),
                    size: 4_000_000_000,
                    seeders: Some(50),
                    leechers: Some(0),
                    infohash: None,
                    indexer: "idx1".to_string(),
                    protocol: Protocol::Torrent,
                    transport_score: 0,
                }],
                true,
            )
            .await
            .unwrap();

        let planner = SearchPlanner::new(
            config,
            db.clone(),
            cache,
            client,
            health,
            clients,
            events_tx,
            CancellationToken::new(),
        );
        planner.plan_once().await.unwrap();

        assert!(
            db.list_event_queue_items(event_id).await.unwrap().is_empty(),
            "a part-scoped acquisition must not grab a partless release"
        );
        assert!(scripted.added.lock().unwrap().is_empty());
    }

    /// Blocklisted releases are skipped in favor of the next candidate.
    #[tokio::test]
    async fn blocklisted_release_falls_through_to_next_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("t.db")).await.unwrap());
        let config = Arc::new(Config::default());
        let cache = ReleaseCache::new(db.clone(), Duration::from_secs(7 * 86_400));
        let health = HealthManager::new(db.clone());
        let client = IndexerClient::new(health.clone()).unwrap();
        let scripted = Arc::new(ScriptedClient::new("qbit", Protocol::Torrent));
        let mut clients = ClientSet::new();
        clients.register(scripted.clone());
        let (events_tx, _events_rx) = broadcast::channel(16);

        let event_id = db
            .insert_event(&NewEvent {
                title: "UFC 299".to_string(),
                sport: "mma".to_string(),
                league: Some("UFC".to_string()),
                home_team: None,
                away_team: None,
                event_date: Utc::now().timestamp() + 3600,
                broadcast_time: None,
                external_id: None,
                monitored: true,
                quality_profile_id: None,
            })
            .await
            .unwrap();

        let mk = |title: &str, guid: &str, hash: &str, seeders: i64| ReleaseSearchResult {
            title: title.to_string(),
            guid: guid.to_string(),
            download_url: format!("http://idx1/dl/{guid}"),
            info_url: None,
            publish_date: Some(Utc::now()),
            size: 4_000_000_000,
            seeders: Some(seeders),
            leechers: Some(0),
            infohash: Some(hash.to_string()),
            indexer: "idx1".to_string(),
            protocol: Protocol::Torrent,
            transport_score: 0,
        };
        cache
            .cache_releases(
                &[
                    mk("UFC.299.Main.Card.2160p.WEB-DL", "g1", "hash-blocked", 500),
                    mk("UFC.299.Main.Card.1080p.WEB-DL", "g2", "hash-ok", 50),
                ],
                true,
            )
            .await
            .unwrap();

        db.add_blocklist_item(&crate::db::NewBlocklistItem {
            event_id,
            indexer: "idx1".to_string(),
            title: "UFC.299.Main.Card.2160p.WEB-DL".to_string(),
            infohash: Some("hash-blocked".to_string()),
            reason: crate::types::BlocklistReason::DownloadFailed,
        })
        .await
        .unwrap();

        let planner = SearchPlanner::new(
            config,
            db.clone(),
            cache,
            client,
            health,
            clients,
            events_tx,
            CancellationToken::new(),
        );
        planner.plan_once().await.unwrap();

        let queue = db.list_event_queue_items(event_id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue[0].infohash.as_deref(),
            Some("hash-ok"),
            "the blocklisted 2160p release must be skipped"
        );
    }
}
