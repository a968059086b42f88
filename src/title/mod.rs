//! Release title parsing
//!
//! Scene-style sports release titles are heterogeneous
//! (`UFC.299.Main.Card.1080p.WEB-DL.H264-GRP`, `NFL.2024.Week.15.720p`,
//! `F1.2024.Monaco.Grand.Prix.Race.2160p.HDTV`). The parser extracts a
//! structured record from whatever is present and leaves the rest unset —
//! it is a pure function and never fails.

pub mod parser;
pub mod quality;
pub mod sports;

pub use parser::parse_title;
pub use quality::{Codec, Quality, Resolution, Source};

use serde::{Deserialize, Serialize};

/// Revision markers on a release (PROPER/REPACK/vN/REAL)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Release version; PROPER/REPACK imply at least 2
    pub version: u32,
    /// A REPACK token was present
    pub is_repack: bool,
    /// A case-sensitive REAL token was present
    pub is_real: bool,
}

impl Default for Revision {
    fn default() -> Self {
        Self { version: 1, is_repack: false, is_real: false }
    }
}

impl Revision {
    /// Proper is exactly "version above 1"
    pub fn is_proper(&self) -> bool {
        self.version > 1
    }
}

/// Structured record extracted from a release title.
///
/// Unparseable fields are left at their unset defaults; parsing never fails.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTitle {
    /// Detected quality triple + remux flag
    pub quality: Quality,
    /// Revision markers
    pub revision: Revision,
    /// Trailing release group, if present
    pub release_group: Option<String>,
    /// Detected language token (None implies English)
    pub language: Option<String>,
    /// Edition token (Extended/Uncut/International)
    pub edition: Option<String>,
    /// Four-digit year
    pub year: Option<i32>,
    /// Month, when a full date was present
    pub month: Option<u32>,
    /// Day of month, when a full date was present
    pub day: Option<u32>,
    /// Round/week number
    pub round: Option<u32>,
    /// Canonical sport prefix (UFC, NFL, FORMULA1, ...)
    pub sport_prefix: Option<String>,
    /// Named event part (Early Prelims / Prelims / Main Card / Weigh In)
    pub part: Option<String>,
    /// Multi-event pack (round/week marker without a head-to-head marker)
    pub is_pack: bool,
}
