//! Release cache storage (C4 persistence).
//!
//! Append-mostly: entries are upserted by GUID, refreshed on re-sight, and
//! swept once expired. Expired entries are invisible to every query path.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{CacheEntry, Database};

/// New cache entry to be upserted into the database
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    /// Release GUID (upsert key)
    pub guid: String,
    /// Original release title
    pub title: String,
    /// Normalized title
    pub normalized_title: String,
    /// Space-joined search-term bag
    pub search_terms: String,
    /// Download URL
    pub download_url: String,
    /// Info URL
    pub info_url: Option<String>,
    /// Indexer name
    pub indexer: String,
    /// Transfer protocol ("torrent"/"usenet")
    pub protocol: String,
    /// Torrent infohash
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
    /// Unix timestamp when cached
    pub cached_at: i64,
    /// Unix timestamp when the entry expires; must exceed `cached_at`
    pub expires_at: i64,
    /// Whether the entry came from an RSS sweep
    pub from_rss: bool,
    /// Parsed canonical sport prefix
    pub sport_prefix: Option<String>,
    /// Parsed year
    pub year: Option<i64>,
    /// Parsed round/week number
    pub round: Option<i64>,
    /// Multi-event pack flag
    pub is_pack: bool,
}

const CACHE_COLUMNS: &str = "id, guid, title, normalized_title, search_terms, download_url, \
     info_url, indexer, protocol, infohash, size, quality_label, codec, language, seeders, \
     leechers, publish_date, cached_at, expires_at, from_rss, sport_prefix, year, round, is_pack";

impl Database {
    /// Upsert one cache entry by GUID.
    ///
    /// On conflict the mutable columns (seeders, leechers, expiry, from_rss)
    /// are refreshed; identity columns keep their original values, which is
    /// what makes repeated caching idempotent in observable state.
    pub async fn upsert_cache_entry(&self, entry: &NewCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO release_cache (
                guid, title, normalized_title, search_terms, download_url, info_url,
                indexer, protocol, infohash, size, quality_label, codec, language,
                seeders, leechers, publish_date, cached_at, expires_at, from_rss,
                sport_prefix, year, round, is_pack
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                seeders = excluded.seeders,
                leechers = excluded.leechers,
                expires_at = excluded.expires_at,
                from_rss = excluded.from_rss
            "#,
        )
        .bind(&entry.guid)
        .bind(&entry.title)
        .bind(&entry.normalized_title)
        .bind(&entry.search_terms)
        .bind(&entry.download_url)
        .bind(&entry.info_url)
        .bind(&entry.indexer)
        .bind(&entry.protocol)
        .bind(&entry.infohash)
        .bind(entry.size)
        .bind(&entry.quality_label)
        .bind(&entry.codec)
        .bind(&entry.language)
        .bind(entry.seeders)
        .bind(entry.leechers)
        .bind(entry.publish_date)
        .bind(entry.cached_at)
        .bind(entry.expires_at)
        .bind(entry.from_rss as i32)
        .bind(&entry.sport_prefix)
        .bind(entry.year)
        .bind(entry.round)
        .bind(entry.is_pack as i32)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert cache entry: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a live (unexpired) entry by GUID
    pub async fn get_cache_entry(&self, guid: &str, now: i64) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheEntry>(&format!(
            "SELECT {CACHE_COLUMNS} FROM release_cache WHERE guid = ? AND expires_at >= ?"
        ))
        .bind(guid)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get cache entry: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Candidate load for the by-event query path, bounded by the indexed
    /// `sport_prefix`/`year` columns. Entries without a parsed prefix/year are
    /// included so fuzzier titles still reach the in-memory filter.
    pub async fn load_cache_candidates(
        &self,
        sport_prefix: Option<&str>,
        year: Option<i64>,
        now: i64,
        limit: u32,
    ) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query_as::<_, CacheEntry>(&format!(
            "SELECT {CACHE_COLUMNS} FROM release_cache \
             WHERE expires_at >= ? \
               AND (sport_prefix IS NULL OR ? IS NULL OR sport_prefix = ?) \
               AND (year IS NULL OR ? IS NULL OR year = ?) \
             ORDER BY cached_at DESC, id DESC \
             LIMIT ?"
        ))
        .bind(now)
        .bind(sport_prefix)
        .bind(sport_prefix)
        .bind(year)
        .bind(year)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load cache candidates: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Broad-query path: every token must appear in the normalized title
    pub async fn search_cache_by_tokens(
        &self,
        tokens: &[String],
        now: i64,
        limit: u32,
    ) -> Result<Vec<CacheEntry>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {CACHE_COLUMNS} FROM release_cache WHERE expires_at >= ?"
        );
        for _ in tokens {
            sql.push_str(" AND normalized_title LIKE ?");
        }
        sql.push_str(" ORDER BY cached_at DESC, id DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, CacheEntry>(&sql).bind(now);
        for token in tokens {
            query = query.bind(format!("%{}%", token.to_lowercase()));
        }
        let rows = query.bind(limit).fetch_all(self.pool()).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to search cache: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Remove expired cache entries; returns how many were deleted
    pub async fn sweep_expired_cache(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM release_cache WHERE expires_at < ?")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to sweep cache: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Count live entries (health/metrics surface)
    pub async fn count_cache_entries(&self, now: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM release_cache WHERE expires_at >= ?")
                .bind(now)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count cache entries: {}",
                        e
                    )))
                })?;

        Ok(count)
    }
}
