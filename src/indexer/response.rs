//! Torznab/Newznab response parsing
//!
//! Responses are RSS 2.0 documents whose `<item>` elements carry namespaced
//! `<attr name="..." value="..."/>` extensions for size, seeders, peers and
//! infohash. Individually broken items are skipped with a log line; only a
//! document that fails to parse at all is an error.

use super::ReleaseSearchResult;
use crate::error::IndexerError;
use crate::title::{parse_title, Resolution};
use crate::types::Protocol;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Parse a feed document into search results
pub fn parse_feed(
    indexer: &str,
    protocol: Protocol,
    body: &[u8],
) -> Result<Vec<ReleaseSearchResult>, IndexerError> {
    let channel = rss::Channel::read_from(body).map_err(|e| IndexerError::Malformed {
        indexer: indexer.to_string(),
        reason: e.to_string(),
    })?;

    let now = Utc::now();
    let mut results = Vec::with_capacity(channel.items().len());
    for item in channel.items() {
        match parse_item(indexer, protocol, item, now) {
            Some(result) => results.push(result),
            None => {
                tracing::debug!(
                    indexer = indexer,
                    title = item.title().unwrap_or("<untitled>"),
                    "Skipping feed item with missing required fields"
                );
            }
        }
    }

    Ok(results)
}

fn parse_item(
    indexer: &str,
    protocol: Protocol,
    item: &rss::Item,
    now: DateTime<Utc>,
) -> Option<ReleaseSearchResult> {
    let title = item.title()?.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let attrs = collect_attrs(item);

    let download_url = item
        .enclosure()
        .map(|e| e.url().to_string())
        .or_else(|| item.link().map(|l| l.to_string()))?;

    let guid = item
        .guid()
        .map(|g| g.value().to_string())
        .or_else(|| item.link().map(|l| l.to_string()))?;

    let info_url = item
        .comments()
        .map(|c| c.to_string())
        .or_else(|| item.link().map(|l| l.to_string()));

    let publish_date = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc));

    let size = attrs
        .get("size")
        .and_then(|v| v.parse::<i64>().ok())
        .or_else(|| item.enclosure().and_then(|e| e.length().parse::<i64>().ok()))
        .unwrap_or(0);

    let seeders = attrs.get("seeders").and_then(|v| v.parse::<i64>().ok());
    let peers = attrs.get("peers").and_then(|v| v.parse::<i64>().ok());
    let leechers = match (seeders, peers) {
        (Some(s), Some(p)) => Some((p - s).max(0)),
        _ => attrs.get("leechers").and_then(|v| v.parse::<i64>().ok()),
    };

    let infohash = attrs.get("infohash").map(|v| v.to_lowercase());

    let mut result = ReleaseSearchResult {
        title,
        guid,
        download_url,
        info_url,
        publish_date,
        size,
        seeders,
        leechers,
        infohash,
        indexer: indexer.to_string(),
        protocol,
        transport_score: 0,
    };
    result.transport_score = transport_score(&result, now);
    Some(result)
}

/// Collect `<attr>` extensions from the torznab and newznab namespaces
fn collect_attrs(item: &rss::Item) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for namespace in ["torznab", "newznab"] {
        if let Some(elements) = item.extensions().get(namespace).and_then(|m| m.get("attr")) {
            for extension in elements {
                if let (Some(name), Some(value)) =
                    (extension.attrs().get("name"), extension.attrs().get("value"))
                {
                    attrs.insert(name.clone(), value.clone());
                }
            }
        }
    }
    attrs
}

/// Transport-side score used to break confidence ties between candidates:
/// a seeders bonus (capped), a resolution bonus, and a recency bonus.
pub fn transport_score(result: &ReleaseSearchResult, now: DateTime<Utc>) -> i32 {
    let seeders_bonus = result.seeders.map(|s| (s.clamp(0, 50) * 2) as i32).unwrap_or(0);

    let resolution = parse_title(&result.title).quality.resolution;
    let quality_bonus = Resolution::fallback_score(resolution) / 10;

    let recency_bonus = match result.publish_date {
        Some(published) => {
            let age = now - published;
            if age.num_hours() <= 24 {
                20
            } else if age.num_days() <= 7 {
                10
            } else {
                0
            }
        }
        None => 0,
    };

    seeders_bonus + quality_bonus + recency_bonus
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const FEED_WITH_BROKEN_ITEM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:newznab="http://www.newznab.com/DTD/2010/feeds/attributes/">
  <channel>
    <title>idx1</title>
    <item>
      <title>NFL.2024.Week.15.Chiefs.vs.Raiders.720p.HDTV.x264-GRP</title>
      <guid>g-nfl</guid>
      <link>https://idx1.example.com/details/2</link>
      <enclosure url="https://idx1.example.com/dl/2.nzb" length="2000000000" type="application/x-nzb"/>
      <newznab:attr name="size" value="2147483648"/>
    </item>
    <item>
      <!-- no title: must be skipped, not fail the document -->
      <guid>g-broken</guid>
      <link>https://idx1.example.com/details/3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn broken_items_are_skipped_and_good_items_survive() {
        let results = parse_feed("idx1", Protocol::Usenet, FEED_WITH_BROKEN_ITEM.as_bytes()).unwrap();
        assert_eq!(results.len(), 1, "one good item, one skipped");
        assert_eq!(results[0].guid, "g-nfl");
    }

    #[test]
    fn attr_size_takes_precedence_over_enclosure_length() {
        let results = parse_feed("idx1", Protocol::Usenet, FEED_WITH_BROKEN_ITEM.as_bytes()).unwrap();
        assert_eq!(
            results[0].size, 2_147_483_648,
            "the newznab size attr wins over the enclosure length"
        );
    }

    #[test]
    fn unparseable_document_is_malformed() {
        let err = parse_feed("idx1", Protocol::Torrent, b"not xml at all").unwrap_err();
        assert!(matches!(err, IndexerError::Malformed { .. }));
    }

    fn result_with(seeders: Option<i64>, title: &str, age_hours: i64) -> ReleaseSearchResult {
        ReleaseSearchResult {
            title: title.to_string(),
            guid: "g".to_string(),
            download_url: "http://x/dl".to_string(),
            info_url: None,
            publish_date: Some(Utc::now() - chrono::Duration::hours(age_hours)),
            size: 0,
            seeders,
            leechers: None,
            infohash: None,
            indexer: "idx1".to_string(),
            protocol: Protocol::Torrent,
            transport_score: 0,
        }
    }

    #[test]
    fn more_seeders_score_higher_but_cap_at_fifty() {
        let now = Utc::now();
        let low = transport_score(&result_with(Some(5), "x.1080p", 1), now);
        let high = transport_score(&result_with(Some(50), "x.1080p", 1), now);
        let over = transport_score(&result_with(Some(5000), "x.1080p", 1), now);
        assert!(high > low);
        assert_eq!(high, over, "the seeders bonus caps at 50");
    }

    #[test]
    fn zero_seeders_score_lower_but_are_not_rejected() {
        let now = Utc::now();
        let zero = result_with(Some(0), "x.1080p", 1);
        let score = transport_score(&zero, now);
        let some = transport_score(&result_with(Some(10), "x.1080p", 1), now);
        assert!(score < some);
        assert!(score > 0, "quality and recency still contribute");
    }

    #[test]
    fn fresher_releases_outscore_stale_ones() {
        let now = Utc::now();
        let fresh = transport_score(&result_with(Some(10), "x.1080p", 2), now);
        let week = transport_score(&result_with(Some(10), "x.1080p", 100), now);
        let stale = transport_score(&result_with(Some(10), "x.1080p", 24 * 30), now);
        assert!(fresh > week);
        assert!(week > stale);
    }

    #[test]
    fn higher_resolution_titles_outscore_lower() {
        let now = Utc::now();
        let uhd = transport_score(&result_with(Some(10), "x.2160p", 1), now);
        let hd = transport_score(&result_with(Some(10), "x.720p", 1), now);
        assert!(uhd > hd);
    }
}
