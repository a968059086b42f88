//! Custom formats: named bundles of release specifications
//!
//! A specification is a closed variant (release-title regex, source,
//! resolution, language, size) with `negate` and `required` flags. Formats and
//! their specifications are stored as JSON columns and parsed explicitly here.

use crate::title::ParsedTitle;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a single specification tests, with its parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecificationKind {
    /// Case-insensitive regex over the raw release title
    ReleaseTitle {
        /// The pattern (compiled case-insensitively)
        pattern: String,
    },
    /// Parsed source equals the given label (e.g. "WEB-DL")
    Source {
        /// Source label to compare against
        value: String,
    },
    /// Parsed resolution equals the given vertical pixel count
    Resolution {
        /// Height in pixels (e.g. 1080)
        value: u32,
    },
    /// Parsed language token equals the given value (None parses as English)
    Language {
        /// Language name to compare against
        value: String,
    },
    /// Release size falls inside the given bounds
    Size {
        /// Inclusive lower bound in bytes
        #[serde(default)]
        min_bytes: Option<u64>,
        /// Inclusive upper bound in bytes
        #[serde(default)]
        max_bytes: Option<u64>,
    },
}

/// One specification inside a custom format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Specification {
    /// Display name
    pub name: String,

    /// Invert the raw match result
    #[serde(default)]
    pub negate: bool,

    /// All required specifications must match for the format to match
    #[serde(default)]
    pub required: bool,

    /// The test itself
    #[serde(flatten)]
    pub kind: SpecificationKind,
}

/// Everything a specification may inspect about one release
#[derive(Clone, Copy, Debug)]
pub struct ReleaseContext<'a> {
    /// Raw release title
    pub title: &'a str,
    /// Parsed form of the title
    pub parsed: &'a ParsedTitle,
    /// Release size in bytes, when known
    pub size: Option<u64>,
}

impl Specification {
    /// Evaluate against a release, honoring the negate flag
    pub fn matches(&self, ctx: &ReleaseContext<'_>) -> bool {
        self.raw_matches(ctx) != self.negate
    }

    fn raw_matches(&self, ctx: &ReleaseContext<'_>) -> bool {
        match &self.kind {
            SpecificationKind::ReleaseTitle { pattern } => {
                match Regex::new(&format!("(?i){pattern}")) {
                    Ok(re) => re.is_match(ctx.title),
                    Err(e) => {
                        tracing::warn!(spec = %self.name, error = %e, "Invalid release-title pattern");
                        false
                    }
                }
            }
            SpecificationKind::Source { value } => ctx
                .parsed
                .quality
                .source
                .map(|s| s.as_str().eq_ignore_ascii_case(value))
                .unwrap_or(false),
            SpecificationKind::Resolution { value } => ctx
                .parsed
                .quality
                .resolution
                .map(|r| r.as_u32() == *value)
                .unwrap_or(false),
            SpecificationKind::Language { value } => match &ctx.parsed.language {
                Some(language) => language.eq_ignore_ascii_case(value),
                // No language token implies English
                None => value.eq_ignore_ascii_case("english"),
            },
            SpecificationKind::Size { min_bytes, max_bytes } => match ctx.size {
                Some(size) => {
                    min_bytes.map(|min| size >= min).unwrap_or(true)
                        && max_bytes.map(|max| size <= max).unwrap_or(true)
                }
                None => false,
            },
        }
    }
}

/// A named bundle of specifications
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomFormat {
    /// Row id (referenced by profile format items)
    pub id: i64,

    /// Display name
    pub name: String,

    /// The specification bundle
    pub specifications: Vec<Specification>,
}

impl CustomFormat {
    /// Whether this format matches a release.
    ///
    /// Every required specification must match (negation honored), and at
    /// least one non-required specification must also match — unless there
    /// are no non-required specifications at all.
    pub fn matches(&self, ctx: &ReleaseContext<'_>) -> bool {
        if self.specifications.is_empty() {
            return false;
        }

        let (required, optional): (Vec<_>, Vec<_>) =
            self.specifications.iter().partition(|s| s.required);

        if !required.iter().all(|s| s.matches(ctx)) {
            return false;
        }
        if optional.is_empty() {
            return true;
        }
        optional.iter().any(|s| s.matches(ctx))
    }
}
