//! Quality profiles: ordered quality items, cutoff, and format score wiring
//!
//! Profiles are stored as JSON columns and deserialized lazily by the scorer,
//! so these types double as the persisted schema.

use crate::title::Resolution;
use serde::{Deserialize, Serialize};

/// Score contribution of a quality item's position in the profile
const QUALITY_POSITION_WEIGHT: i32 = 100;

/// One entry in a profile's ordered quality list.
///
/// Either a single quality (empty `qualities`, `name` is the label) or a named
/// group collapsing several labels that rank equally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityItem {
    /// Quality label or group name (e.g. "HDTV-1080p", "WEB 1080p")
    pub name: String,

    /// Group members; empty means `name` itself is the quality
    #[serde(default)]
    pub qualities: Vec<String>,

    /// Whether releases of this quality may be grabbed
    #[serde(default = "default_true")]
    pub allowed: bool,
}

impl QualityItem {
    /// Whether this item covers the given quality label
    pub fn covers(&self, label: &str) -> bool {
        if quality_name_matches(&self.name, label) {
            return true;
        }
        self.qualities.iter().any(|q| quality_name_matches(q, label))
    }
}

/// Custom-format score assignment within a profile
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatItem {
    /// Id of the custom format this entry scores
    pub format_id: i64,

    /// Format name (denormalized for readability of stored profiles)
    pub name: String,

    /// Score added to releases matching the format (may be negative)
    pub score: i32,

    /// Whether the format participates at all
    #[serde(default = "default_true")]
    pub allowed: bool,
}

/// A quality profile: ordered allowed qualities, an upgrade cutoff, and
/// custom-format score assignments with a minimum-score gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Row id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Ordered quality items; later positions score higher
    pub items: Vec<QualityItem>,

    /// Quality (or group) name above which upgrades are not sought
    #[serde(default)]
    pub cutoff: Option<String>,

    /// Custom-format score assignments
    #[serde(default)]
    pub format_items: Vec<FormatItem>,

    /// Releases scoring below this custom-format total are rejected
    #[serde(default)]
    pub min_format_score: i32,
}

impl QualityProfile {
    /// Position (0-based) of the first item covering the label, if any
    fn position_of(&self, label: &str) -> Option<usize> {
        self.items.iter().position(|item| item.covers(label))
    }

    /// Whether releases with this quality label may be grabbed at all
    pub fn is_allowed(&self, label: &str) -> bool {
        self.items
            .iter()
            .find(|item| item.covers(label))
            .map(|item| item.allowed)
            .unwrap_or(false)
    }

    /// Quality score for a label under this profile.
    ///
    /// Position in the ordered list times a fixed weight, plus a resolution
    /// bonus so equal-position labels still order by resolution. Labels the
    /// profile does not know (or has disallowed) score zero.
    pub fn quality_score(&self, label: &str, resolution: Option<Resolution>) -> i32 {
        match self.items.iter().enumerate().find(|(_, item)| item.covers(label)) {
            Some((position, item)) if item.allowed => {
                (position as i32 + 1) * QUALITY_POSITION_WEIGHT + resolution_bonus(resolution)
            }
            _ => 0,
        }
    }

    /// Whether the current quality already meets or exceeds the cutoff.
    ///
    /// With no cutoff configured every imported file is final. An unknown
    /// current label never satisfies the cutoff.
    pub fn cutoff_reached(&self, current_label: &str) -> bool {
        let Some(cutoff_name) = &self.cutoff else {
            return true;
        };
        let Some(current_pos) = self.position_of(current_label) else {
            return false;
        };
        match self.items.iter().position(|item| {
            quality_name_matches(&item.name, cutoff_name)
                || item.qualities.iter().any(|q| quality_name_matches(q, cutoff_name))
        }) {
            Some(cutoff_pos) => current_pos >= cutoff_pos,
            // A cutoff naming an unknown quality can never be reached
            None => false,
        }
    }

    /// Score assigned to a custom format id (zero when absent or disallowed)
    pub fn format_score(&self, format_id: i64) -> i32 {
        self.format_items
            .iter()
            .find(|item| item.format_id == format_id)
            .filter(|item| item.allowed)
            .map(|item| item.score)
            .unwrap_or(0)
    }
}

/// Resolution bonus layered on top of position scoring
fn resolution_bonus(resolution: Option<Resolution>) -> i32 {
    Resolution::fallback_score(resolution) / 10
}

/// Case-insensitive quality-name comparison after collapsing `-` and spaces.
///
/// A generic WEB name ("WEB 1080p") matches both WEB-DL and WEBRip at the
/// same resolution.
pub fn quality_name_matches(profile_name: &str, label: &str) -> bool {
    let a = collapse(profile_name);
    let b = collapse(label);
    if a == b {
        return true;
    }
    // "web1080p" covers "webdl1080p" and "webrip1080p"
    if let Some(rest) = a.strip_prefix("web") {
        if !rest.starts_with("dl") && !rest.starts_with("rip") {
            if let Some(b_rest) = b.strip_prefix("web") {
                let b_rest = b_rest.strip_prefix("dl").or_else(|| b_rest.strip_prefix("rip"));
                if b_rest == Some(rest) {
                    return true;
                }
            }
        }
    }
    false
}

fn collapse(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> QualityProfile {
        QualityProfile {
            id: 1,
            name: "HD".to_string(),
            items: vec![
                QualityItem {
                    name: "HDTV-720p".to_string(),
                    qualities: vec![],
                    allowed: true,
                },
                QualityItem {
                    name: "WEB 720p".to_string(),
                    qualities: vec![],
                    allowed: true,
                },
                QualityItem {
                    name: "HDTV-1080p".to_string(),
                    qualities: vec![],
                    allowed: true,
                },
                QualityItem {
                    name: "WEB 1080p".to_string(),
                    qualities: vec!["WEB-DL-1080p".to_string(), "WEBRip-1080p".to_string()],
                    allowed: true,
                },
                QualityItem {
                    name: "Bluray-1080p".to_string(),
                    qualities: vec![],
                    allowed: false,
                },
            ],
            cutoff: Some("WEB 1080p".to_string()),
            format_items: vec![FormatItem {
                format_id: 7,
                name: "x265".to_string(),
                score: 120,
                allowed: true,
            }],
            min_format_score: 0,
        }
    }

    #[test]
    fn name_matching_collapses_dashes_spaces_and_case() {
        assert!(quality_name_matches("hdtv 1080p", "HDTV-1080p"));
        assert!(quality_name_matches("HDTV-1080P", "hdtv1080p"));
        assert!(!quality_name_matches("HDTV-1080p", "HDTV-720p"));
    }

    #[test]
    fn generic_web_matches_both_webdl_and_webrip_at_same_resolution() {
        assert!(quality_name_matches("WEB 1080p", "WEB-DL-1080p"));
        assert!(quality_name_matches("WEB 1080p", "WEBRip-1080p"));
        assert!(
            !quality_name_matches("WEB 1080p", "WEB-DL-720p"),
            "the resolution must agree"
        );
        assert!(
            !quality_name_matches("WEB-DL-1080p", "WEBRip-1080p"),
            "a specific WEB-DL item does not cover WEBRip"
        );
    }

    #[test]
    fn position_scoring_ranks_later_items_higher() {
        let p = profile();
        let hdtv720 = p.quality_score("HDTV-720p", Some(Resolution::R720));
        let hdtv1080 = p.quality_score("HDTV-1080p", Some(Resolution::R1080));
        let web1080 = p.quality_score("WEB-DL-1080p", Some(Resolution::R1080));
        assert!(hdtv720 < hdtv1080, "1080p sits later in the profile");
        assert!(hdtv1080 < web1080, "WEB 1080p outranks HDTV-1080p");
    }

    #[test]
    fn unmatched_and_disallowed_labels_score_zero() {
        let p = profile();
        assert_eq!(p.quality_score("SDTV", Some(Resolution::R480)), 0);
        assert_eq!(
            p.quality_score("Bluray-1080p", Some(Resolution::R1080)),
            0,
            "disallowed items must not contribute score"
        );
    }

    #[test]
    fn allowed_checks_follow_the_item_flag() {
        let p = profile();
        assert!(p.is_allowed("HDTV-1080p"));
        assert!(!p.is_allowed("Bluray-1080p"));
        assert!(!p.is_allowed("SDTV"), "unknown labels are not allowed");
    }

    #[test]
    fn cutoff_blocks_upgrades_at_and_above_it() {
        let p = profile();
        assert!(!p.cutoff_reached("HDTV-1080p"), "below cutoff — upgrades wanted");
        assert!(p.cutoff_reached("WEB-DL-1080p"), "at cutoff via group match");
        assert!(!p.cutoff_reached("NoSuchLabel"), "unknown current quality never satisfies");
    }

    #[test]
    fn missing_cutoff_means_no_upgrades_sought() {
        let mut p = profile();
        p.cutoff = None;
        assert!(p.cutoff_reached("HDTV-720p"));
    }

    #[test]
    fn format_score_lookup_honors_allowed_and_absence() {
        let mut p = profile();
        assert_eq!(p.format_score(7), 120);
        assert_eq!(p.format_score(99), 0, "formats absent from the profile score zero");
        p.format_items[0].allowed = false;
        assert_eq!(p.format_score(7), 0);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let p = profile();
        let json = serde_json::to_string(&p).unwrap();
        let back: QualityProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.items.len(), 5);
        assert_eq!(back.cutoff.as_deref(), Some("WEB 1080p"));
        assert_eq!(back.format_items[0].score, 120);
    }
}
