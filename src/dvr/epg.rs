//! EPG program ↔ event matching
//!
//! Scores monitored events against guide programs. Time proximity is a
//! precondition, a symmetric cross-sport conflict table eliminates programs
//! from the wrong sport outright, and each program may drive at most one
//! event's recording (matched programs leave the candidate pool).

use crate::db::{EpgProgram, SportEvent};
use crate::utils::significant_words;
use chrono::{TimeZone, Utc};
use std::time::Duration;

/// Keyword sets per sport key, as they appear in guide text
const SPORT_KEYWORDS: &[(&str, &[&str])] = &[
    ("hockey", &["nhl", "hockey", "ice hockey"]),
    ("basketball", &["nba", "basketball", "wnba"]),
    ("football", &["nfl", "football", "gridiron"]),
    ("soccer", &["soccer", "premier league", "la liga", "uefa", "mls", "futbol"]),
    ("baseball", &["mlb", "baseball"]),
    ("mma", &["ufc", "mma", "fight night", "bellator"]),
    ("boxing", &["boxing", "heavyweight", "title fight"]),
    ("motorsport", &["formula 1", "formula one", "f1", "motogp", "nascar", "grand prix", "indycar"]),
    ("tennis", &["tennis", "atp", "wta", "open"]),
];

/// Symmetric cross-sport conflicts. A program whose text carries keywords of
/// a sport conflicting with the event's sport is discarded regardless of any
/// other signal. Baseball conflicts with every other listed sport.
const CONFLICTS: &[(&str, &str)] = &[
    ("hockey", "basketball"),
    ("football", "soccer"),
    ("hockey", "soccer"),
    ("basketball", "soccer"),
    ("mma", "boxing"),
    ("baseball", "hockey"),
    ("baseball", "basketball"),
    ("baseball", "football"),
    ("baseball", "soccer"),
    ("baseball", "mma"),
    ("baseball", "motorsport"),
    ("baseball", "tennis"),
];

/// Whether two sport keys conflict (symmetric)
pub fn sports_conflict(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    CONFLICTS
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// Keywords for a sport key; unknown sports have none
fn keywords_for(sport: &str) -> &'static [&'static str] {
    SPORT_KEYWORDS
        .iter()
        .find(|(key, _)| *key == sport)
        .map(|(_, words)| *words)
        .unwrap_or(&[])
}

/// Sports whose keywords appear in the given program text
fn sports_in_text(text: &str) -> Vec<&'static str> {
    SPORT_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(key, _)| *key)
        .collect()
}

/// Score one event against one program. `None` means eliminated (time window,
/// cross-sport conflict, or zero team-term match).
pub fn score_program(
    event: &SportEvent,
    program: &EpgProgram,
    time_tolerance: Duration,
) -> Option<i32> {
    let event_start = event.event_date;
    let distance_secs = (program.start_time - event_start).abs();
    if distance_secs > time_tolerance.as_secs() as i64 {
        return None;
    }

    let text = format!(
        "{} {} {}",
        program.title,
        program.description.as_deref().unwrap_or(""),
        program.category.as_deref().unwrap_or("")
    )
    .to_lowercase();

    // cross-sport guard: keywords of a conflicting sport kill the program
    let event_sport = event.sport.to_lowercase();
    for candidate_sport in sports_in_text(&text) {
        if sports_conflict(&event_sport, candidate_sport) {
            return None;
        }
    }

    let mut score = 0;

    // team terms: the event's team names, or its title words for solo sports
    let terms: Vec<String> = match (&event.home_team, &event.away_team) {
        (Some(home), Some(away)) => {
            let mut words = significant_words(home);
            words.extend(significant_words(away));
            words
        }
        _ => significant_words(&event.title),
    };
    let matched_terms = terms.iter().filter(|t| text.contains(t.as_str())).count();
    if matched_terms == 0 {
        return None;
    }
    score += (matched_terms as i32) * 30;

    if let (Some(home), Some(away)) = (&event.home_team, &event.away_team) {
        let home_hit = significant_words(home).iter().any(|w| text.contains(w.as_str()));
        let away_hit = significant_words(away).iter().any(|w| text.contains(w.as_str()));
        if home_hit && away_hit {
            score += 40;
        }
    }

    if keywords_for(&event_sport).iter().any(|w| text.contains(w)) {
        score += 20;
    }

    let distance_mins = distance_secs / 60;
    score += match distance_mins {
        0..=5 => 30,
        6..=15 => 20,
        16..=30 => 10,
        _ => 0,
    };

    if program.is_sports_program == 1 {
        score += 10;
    }

    Some(score)
}

/// Greedily match events to programs. Events are scored in the given order;
/// each matched program is removed from the pool before the next event, so
/// one program drives at most one recording.
pub fn match_events_to_programs<'a>(
    events: &'a [SportEvent],
    programs: &'a [EpgProgram],
    time_tolerance: Duration,
    min_score: i32,
) -> Vec<(&'a SportEvent, &'a EpgProgram, i32)> {
    let mut available: Vec<&EpgProgram> = programs.iter().collect();
    let mut matches = Vec::new();

    for event in events {
        let mut best: Option<(usize, i32)> = None;
        for (idx, program) in available.iter().enumerate() {
            if let Some(score) = score_program(event, program, time_tolerance) {
                if score >= min_score && best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((idx, score));
                }
            }
        }
        if let Some((idx, score)) = best {
            let program = available.remove(idx);
            tracing::debug!(
                event = %event.title,
                program = %program.title,
                score = score,
                "EPG program matched"
            );
            matches.push((event, program, score));
        }
    }

    matches
}

/// Helper for logging/padding math: the program window as UTC datetimes
pub fn program_window(program: &EpgProgram) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let start = Utc.timestamp_opt(program.start_time, 0).single().unwrap_or_else(Utc::now);
    let end = Utc.timestamp_opt(program.end_time, 0).single().unwrap_or(start);
    (start, end)
}
