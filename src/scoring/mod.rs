//! Release scoring: quality-profile score plus custom-format score
//!
//! Two independent scores summed into a total. The same entry point scores
//! indexer releases and the synthetic titles the DVR builds for recordings,
//! which is what makes the two acquisition paths directly comparable.

pub mod formats;
pub mod profile;

pub use formats::{CustomFormat, ReleaseContext, Specification, SpecificationKind};
pub use profile::{FormatItem, QualityItem, QualityProfile};

use crate::title::{ParsedTitle, Resolution};

/// The two component scores and their sum for one release
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    /// Position-weighted quality score (or the resolution fallback)
    pub quality_score: i32,
    /// Sum of matching custom-format scores under the profile
    pub format_score: i32,
    /// Names of the custom formats that matched (for history/debugging)
    pub matched_formats: Vec<String>,
}

impl ScoreBreakdown {
    /// Total used for candidate ordering
    pub fn total(&self) -> i32 {
        self.quality_score + self.format_score
    }
}

/// Score a release title against a profile and a set of custom formats.
///
/// With no profile, the quality score falls back to the fixed resolution
/// ladder (2160p=400, 1080p=300, 720p=200, ≤576p=100, unknown=50) and the
/// format score is zero — format scores only exist inside a profile.
pub fn score_release(
    title: &str,
    parsed: &ParsedTitle,
    size: Option<u64>,
    profile: Option<&QualityProfile>,
    custom_formats: &[CustomFormat],
) -> ScoreBreakdown {
    let label = parsed.quality.label();

    let quality_score = match profile {
        Some(p) => p.quality_score(&label, parsed.quality.resolution),
        None => Resolution::fallback_score(parsed.quality.resolution),
    };

    let mut format_score = 0;
    let mut matched_formats = Vec::new();
    if let Some(p) = profile {
        let ctx = ReleaseContext { title, parsed, size };
        for format in custom_formats {
            if format.matches(&ctx) {
                let score = p.format_score(format.id);
                if score != 0 {
                    matched_formats.push(format.name.clone());
                }
                format_score += score;
            }
        }
    }

    ScoreBreakdown { quality_score, format_score, matched_formats }
}
