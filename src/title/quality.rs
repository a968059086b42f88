//! Quality model: resolution, source, codec and their canonical labels

use serde::{Deserialize, Serialize};

/// Video resolution, canonicalized to the vertical pixel count
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 360p
    R360,
    /// 480p
    R480,
    /// 540p
    R540,
    /// 576p
    R576,
    /// 720p
    R720,
    /// 1080p
    R1080,
    /// 2160p (4K/UHD)
    R2160,
}

impl Resolution {
    /// The vertical pixel count
    pub fn as_u32(&self) -> u32 {
        match self {
            Resolution::R360 => 360,
            Resolution::R480 => 480,
            Resolution::R540 => 540,
            Resolution::R576 => 576,
            Resolution::R720 => 720,
            Resolution::R1080 => 1080,
            Resolution::R2160 => 2160,
        }
    }

    /// Canonicalize an explicit `NNNNp` token value
    pub fn from_p_value(p: u32) -> Option<Self> {
        match p {
            360 => Some(Resolution::R360),
            480 => Some(Resolution::R480),
            540 => Some(Resolution::R540),
            576 => Some(Resolution::R576),
            720 => Some(Resolution::R720),
            1080 => Some(Resolution::R1080),
            2160 => Some(Resolution::R2160),
            _ => None,
        }
    }

    /// Map raw pixel dimensions (e.g. `1920x1080`) to the canonical resolution.
    ///
    /// Heights are bucketed downward so crop-cut encodes (1920x800) still land
    /// on the broadcast resolution they came from.
    pub fn from_dimensions(width: u32, height: u32) -> Option<Self> {
        let effective = height.max(width * 9 / 16);
        Some(match effective {
            h if h >= 2000 => Resolution::R2160,
            h if h >= 1000 => Resolution::R1080,
            h if h >= 700 => Resolution::R720,
            h if h >= 570 => Resolution::R576,
            h if h >= 530 => Resolution::R540,
            h if h >= 460 => Resolution::R480,
            h if h >= 340 => Resolution::R360,
            _ => return None,
        })
    }

    /// The resolution-only fallback score used when no profile is supplied
    pub fn fallback_score(resolution: Option<Resolution>) -> i32 {
        match resolution {
            Some(Resolution::R2160) => 400,
            Some(Resolution::R1080) => 300,
            Some(Resolution::R720) => 200,
            Some(_) => 100,
            None => 50,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}p", self.as_u32())
    }
}

/// Release source/transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Analog/SD television capture
    Sdtv,
    /// DVD rip
    Dvd,
    /// Digital television capture
    Hdtv,
    /// Raw transport-stream capture
    RawHd,
    /// Untouched web download
    WebDl,
    /// Re-encoded web capture
    WebRip,
    /// BluRay encode
    Bluray,
    /// Untouched BluRay (remux)
    BlurayRaw,
}

impl Source {
    /// Canonical label component for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Sdtv => "SDTV",
            Source::Dvd => "DVD",
            Source::Hdtv => "HDTV",
            Source::RawHd => "RawHD",
            Source::WebDl => "WEB-DL",
            Source::WebRip => "WEBRip",
            Source::Bluray => "Bluray",
            Source::BlurayRaw => "BlurayRaw",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video codec detected in a release title
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    /// H.264 / AVC / x264
    H264,
    /// H.265 / HEVC / x265
    H265,
    /// XviD (legacy SD encodes)
    Xvid,
    /// MPEG-2 (raw broadcast streams)
    Mpeg2,
    /// AV1
    Av1,
    /// VP9
    Vp9,
}

impl Codec {
    /// Canonical token for this codec (as it appears in synthetic titles)
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::H264 => "H264",
            Codec::H265 => "H265",
            Codec::Xvid => "XviD",
            Codec::Mpeg2 => "MPEG2",
            Codec::Av1 => "AV1",
            Codec::Vp9 => "VP9",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed quality: the (source, resolution, codec) triple plus the remux flag
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    /// Detected source, if any
    pub source: Option<Source>,
    /// Detected resolution, if any
    pub resolution: Option<Resolution>,
    /// Detected video codec, if any
    pub codec: Option<Codec>,
    /// A `Remux` token was present
    pub is_remux: bool,
}

impl Quality {
    /// Canonical quality label, e.g. `HDTV-1080p`, `WEB-DL-720p`, `Bluray-2160p`.
    ///
    /// This is the string quality profiles match against and the value stored
    /// on event files. Unknown axes are omitted (`HDTV`, `1080p`, `Unknown`).
    pub fn label(&self) -> String {
        match (self.source, self.resolution) {
            (Some(source), Some(resolution)) => format!("{source}-{resolution}"),
            (Some(source), None) => source.to_string(),
            (None, Some(resolution)) => resolution.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_p_values_map_and_others_do_not() {
        assert_eq!(Resolution::from_p_value(1080), Some(Resolution::R1080));
        assert_eq!(Resolution::from_p_value(2160), Some(Resolution::R2160));
        assert_eq!(
            Resolution::from_p_value(1088),
            None,
            "non-canonical heights only map through from_dimensions"
        );
    }

    #[test]
    fn dimensions_bucket_to_broadcast_resolutions() {
        assert_eq!(Resolution::from_dimensions(1920, 1080), Some(Resolution::R1080));
        assert_eq!(Resolution::from_dimensions(3840, 2160), Some(Resolution::R2160));
        assert_eq!(Resolution::from_dimensions(1280, 720), Some(Resolution::R720));
        assert_eq!(
            Resolution::from_dimensions(1920, 800),
            Some(Resolution::R1080),
            "cropped 1920-wide encodes are still 1080p sources"
        );
        assert_eq!(Resolution::from_dimensions(640, 360), Some(Resolution::R360));
    }

    #[test]
    fn fallback_scores_follow_the_fixed_ladder() {
        assert_eq!(Resolution::fallback_score(Some(Resolution::R2160)), 400);
        assert_eq!(Resolution::fallback_score(Some(Resolution::R1080)), 300);
        assert_eq!(Resolution::fallback_score(Some(Resolution::R720)), 200);
        assert_eq!(Resolution::fallback_score(Some(Resolution::R576)), 100);
        assert_eq!(Resolution::fallback_score(Some(Resolution::R480)), 100);
        assert_eq!(Resolution::fallback_score(None), 50);
    }

    #[test]
    fn labels_compose_source_and_resolution() {
        let q = Quality {
            source: Some(Source::Hdtv),
            resolution: Some(Resolution::R1080),
            codec: None,
            is_remux: false,
        };
        assert_eq!(q.label(), "HDTV-1080p");

        let q = Quality {
            source: Some(Source::WebDl),
            resolution: Some(Resolution::R720),
            codec: None,
            is_remux: false,
        };
        assert_eq!(q.label(), "WEB-DL-720p");

        let q = Quality { source: None, resolution: None, codec: None, is_remux: false };
        assert_eq!(q.label(), "Unknown");
    }
}
