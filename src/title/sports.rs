//! Sport-specific title semantics: league prefixes, parts, rounds, packs

use regex::Regex;
use std::sync::LazyLock;

/// Token → canonical sport prefix table.
///
/// Matching is case-insensitive on whole tokens; the canonical form is what
/// gets stored on cache entries and compared during event matching.
const SPORT_PREFIXES: &[(&str, &str)] = &[
    ("ufc", "UFC"),
    ("bellator", "BELLATOR"),
    ("pfl", "PFL"),
    ("boxing", "BOXING"),
    ("wwe", "WWE"),
    ("aew", "AEW"),
    ("nfl", "NFL"),
    ("nba", "NBA"),
    ("nhl", "NHL"),
    ("mlb", "MLB"),
    ("mls", "MLS"),
    ("epl", "EPL"),
    ("uefa", "UEFA"),
    ("fifa", "FIFA"),
    ("formula1", "FORMULA1"),
    ("formula 1", "FORMULA1"),
    ("f1", "FORMULA1"),
    ("formula2", "FORMULA2"),
    ("f2", "FORMULA2"),
    ("formulae", "FORMULAE"),
    ("motogp", "MOTOGP"),
    ("moto2", "MOTO2"),
    ("moto3", "MOTO3"),
    ("nascar", "NASCAR"),
    ("indycar", "INDYCAR"),
    ("wrc", "WRC"),
    ("wsbk", "WSBK"),
    ("nrl", "NRL"),
    ("afl", "AFL"),
    ("rugby", "RUGBY"),
    ("cricket", "CRICKET"),
    ("atp", "ATP"),
    ("wta", "WTA"),
    ("tennis", "TENNIS"),
    ("pga", "PGA"),
    ("golf", "GOLF"),
    ("darts", "DARTS"),
    ("snooker", "SNOOKER"),
];

/// Named event segments in canonical order (fight cards)
const PARTS: &[(&str, &str)] = &[
    // longer patterns first so "early prelims" is not eaten by "prelims"
    ("early prelims", "Early Prelims"),
    ("early prelim", "Early Prelims"),
    ("prelims", "Prelims"),
    ("prelim", "Prelims"),
    ("main card", "Main Card"),
    ("maincard", "Main Card"),
    ("weigh in", "Weigh In"),
    ("weigh ins", "Weigh In"),
];

#[allow(clippy::expect_used)]
mod patterns {
    use super::*;

    pub static ROUND: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(?:round|week|rd|wk)[ ._]?(\d{1,2})\b").expect("valid round regex")
    });

    pub static VERSUS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(?:\b(?:vs?|versus)\b|@|[ ._]v[ ._])").expect("valid versus regex")
    });
}

/// Normalize a title fragment for token lookups (separators to spaces, lowercase)
fn tokenized(title: &str) -> String {
    crate::utils::normalize_title(title)
}

/// Detect the canonical sport prefix, if any token in the title maps to one
pub fn detect_sport_prefix(title: &str) -> Option<String> {
    let normalized = tokenized(title);
    let padded = format!(" {normalized} ");
    // multi-word entries first so "formula 1" wins over a stray "f1" elsewhere
    for (token, canonical) in SPORT_PREFIXES {
        if token.contains(' ') && padded.contains(&format!(" {token} ")) {
            return Some((*canonical).to_string());
        }
    }
    for word in normalized.split(' ') {
        for (token, canonical) in SPORT_PREFIXES {
            if !token.contains(' ') && word == *token {
                return Some((*canonical).to_string());
            }
        }
    }
    None
}

/// Detect a named event part (Early Prelims / Prelims / Main Card / Weigh In)
pub fn detect_part(title: &str) -> Option<String> {
    let normalized = tokenized(title);
    let padded = format!(" {normalized} ");
    for (token, canonical) in PARTS {
        if padded.contains(&format!(" {token} ")) {
            return Some((*canonical).to_string());
        }
    }
    None
}

/// Detect a round/week number (`Round 3`, `Week.15`, `Rd 2`)
pub fn detect_round(title: &str) -> Option<u32> {
    patterns::ROUND
        .captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether the title contains a head-to-head marker (`vs`, `@`, `.v.`)
pub fn has_versus_token(title: &str) -> bool {
    patterns::VERSUS.is_match(title)
}

/// A title is a pack iff it carries a round/week marker but no head-to-head
/// marker — `NFL.2024.Week.15` is every game of the week, while
/// `NFL.2024.Week.15.Chiefs.vs.Raiders` is a single one.
pub fn is_pack(title: &str) -> bool {
    detect_round(title).is_some() && !has_versus_token(title)
}
