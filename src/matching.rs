//! Release ↔ event validation
//!
//! Decides whether a release belongs to a given event. Starts from a neutral
//! confidence of 50 and applies a fixed schedule of additive adjustments;
//! certain signals (wrong event number, wrong part) are hard rejections that
//! no amount of positive signal can recover from.

use crate::title::ParsedTitle;
use crate::utils::{normalize_title, significant_words, word_overlap};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// The neutral starting confidence
const BASE_CONFIDENCE: i32 = 50;

/// Matches considered positive at or above this confidence
const MATCH_THRESHOLD: i32 = 50;

#[allow(clippy::expect_used)]
static EVENT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,4})\b").expect("valid event number regex"));

/// The slice of an event the matcher needs.
///
/// Borrowed views onto the stored event row; the matcher itself never touches
/// the database, which keeps validation deterministic and order-independent.
#[derive(Clone, Copy, Debug)]
pub struct EventDescriptor<'a> {
    /// Event title (e.g. "UFC 299", "Chiefs vs Raiders")
    pub title: &'a str,
    /// League/organization name, when known
    pub league: Option<&'a str>,
    /// Home team, for team-sport events
    pub home_team: Option<&'a str>,
    /// Away team, for team-sport events
    pub away_team: Option<&'a str>,
    /// Scheduled start (UTC)
    pub event_date: DateTime<Utc>,
}

/// Outcome of validating one release against one event
#[derive(Clone, Debug)]
pub struct MatchResult {
    /// Final confidence, clamped to [0, 100]
    pub confidence: i32,
    /// `confidence ≥ 50` and not hard-rejected
    pub is_match: bool,
    /// A hard-rejection signal fired
    pub hard_reject: bool,
    /// Positive signals, for logging and history
    pub reasons: Vec<String>,
    /// Negative signals and rejection causes
    pub rejections: Vec<String>,
}

/// Extract the event number from a title ("UFC 299" → 299).
///
/// Takes the first standalone 1–4 digit token that is not a year; resolution
/// and date tokens never match because their digits sit against letters or
/// inside full dates.
pub fn extract_event_number(title: &str) -> Option<u32> {
    let normalized = normalize_title(title);
    for caps in EVENT_NUMBER.captures_iter(&normalized) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if !(1900..=2100).contains(&n) && !matches!(n, 360 | 480 | 540 | 576 | 720 | 1080 | 2160)
            {
                return Some(n);
            }
        }
    }
    None
}

/// Validate a release against an event.
///
/// `requested_part` is the specific part being acquired (e.g. "Prelims"); when
/// set, a release with the wrong part — or with no detectable part at all — is
/// hard-rejected.
///
/// Deterministic and order-independent: the result depends only on the inputs.
pub fn validate(
    title: &str,
    parsed: &ParsedTitle,
    event: &EventDescriptor<'_>,
    requested_part: Option<&str>,
) -> MatchResult {
    let mut confidence = BASE_CONFIDENCE;
    let mut hard_reject = false;
    let mut reasons = Vec::new();
    let mut rejections = Vec::new();

    let normalized_release = normalize_title(title);

    // Event number (e.g. UFC 299)
    if let Some(event_number) = extract_event_number(event.title) {
        match extract_event_number(title) {
            Some(n) if n == event_number => {
                confidence += 40;
                reasons.push(format!("event number {event_number} matches"));
            }
            Some(n) => {
                confidence -= 50;
                confidence -= 80;
                hard_reject = true;
                rejections.push(format!(
                    "conflicting event number: expected {event_number}, title has {n}"
                ));
            }
            None => {}
        }
    }

    // Team names (only meaningful for team-sport events)
    if let (Some(home), Some(away)) = (event.home_team, event.away_team) {
        let home_hit = team_in_title(home, &normalized_release);
        let away_hit = team_in_title(away, &normalized_release);
        match (home_hit, away_hit) {
            (true, true) => {
                confidence += 35;
                reasons.push("both team names present".to_string());
            }
            (true, false) | (false, true) => {
                confidence += 15;
                reasons.push("one team name present".to_string());
            }
            (false, false) => {
                confidence -= 20;
                rejections.push("neither team name present".to_string());
            }
        }
    }

    // Date proximity
    if let Some(release_date) = parsed_date(parsed) {
        let distance = (release_date - event.event_date).num_days().abs();
        if distance <= 1 {
            confidence += 25;
            reasons.push("release dated within 1 day of the event".to_string());
        } else if distance <= 3 {
            confidence += 15;
            reasons.push("release dated within 3 days of the event".to_string());
        } else if distance <= 7 {
            confidence += 5;
            reasons.push("release dated within 7 days of the event".to_string());
        } else if distance > 30 {
            confidence -= 30;
            rejections.push(format!("release dated {distance} days from the event"));
        }
    }

    // League/organization token
    if let Some(league) = event.league {
        let league_normalized = normalize_title(league);
        let padded = format!(" {normalized_release} ");
        let by_token = !league_normalized.is_empty()
            && padded.contains(&format!(" {league_normalized} "));
        let by_prefix = parsed
            .sport_prefix
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case(&league_normalized.replace(' ', "")))
            .unwrap_or(false);
        if by_token || by_prefix {
            confidence += 15;
            reasons.push(format!("league token {league} present"));
        }
    }

    // Part, when a specific part was requested
    if let Some(wanted) = requested_part {
        match parsed.part.as_deref() {
            Some(part) if part.eq_ignore_ascii_case(wanted) => {
                confidence += 20;
                reasons.push(format!("part {wanted} matches"));
            }
            Some(part) => {
                hard_reject = true;
                rejections.push(format!("wrong part: wanted {wanted}, title has {part}"));
            }
            None => {
                hard_reject = true;
                rejections.push(format!("part {wanted} requested but none detectable in title"));
            }
        }
    }

    // Word overlap on significant words
    let overlap = word_overlap(event.title, title);
    let overlap_points = (overlap * 20.0).round() as i32;
    if overlap_points > 0 {
        confidence += overlap_points;
        reasons.push(format!("word overlap {overlap:.2}"));
    }

    let confidence = confidence.clamp(0, 100);
    MatchResult {
        confidence,
        is_match: confidence >= MATCH_THRESHOLD && !hard_reject,
        hard_reject,
        reasons,
        rejections,
    }
}

/// Whether any significant word of a team name appears in the normalized title
fn team_in_title(team: &str, normalized_title: &str) -> bool {
    let padded = format!(" {normalized_title} ");
    let full = normalize_title(team);
    if !full.is_empty() && padded.contains(&format!(" {full} ")) {
        return true;
    }
    significant_words(team)
        .iter()
        .any(|word| padded.contains(&format!(" {word} ")))
}

/// Release date from the parsed title, when a full date was present
fn parsed_date(parsed: &ParsedTitle) -> Option<DateTime<Utc>> {
    let (year, month, day) = (parsed.year?, parsed.month?, parsed.day?);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
