//! The release-title parser

use super::quality::{Codec, Quality, Resolution, Source};
use super::sports;
use super::{ParsedTitle, Revision};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
mod patterns {
    use super::*;

    pub static RESOLUTION_P: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\b(\d{3,4})[pi]\b").expect("valid resolution regex"));

    pub static DIMENSIONS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(\d{3,4})\s?[xX]\s?(\d{3,4})\b").expect("valid dims regex"));

    pub static RES_ALIAS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\b(4k|uhd|fullhd|fhd)\b").expect("valid alias regex"));

    // Order matters: the regex crate prefers earlier alternatives, so the
    // compound web tokens must precede the bare `web`.
    pub static SOURCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(blu[-_. ]?ray|bdrip|brrip|web[-_. ]?dl|web[-_. ]?rip|web|a?hdtv|pdtv|sdtv|dsr|tvrip|dvdrip|dvd|raw[-_. ]?hd)\b",
        )
        .expect("valid source regex")
    });

    pub static REMUX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\bremux\b").expect("valid remux regex"));

    pub static CODEC: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(x[. ]?264|h[. ]?264|avc|x[. ]?265|h[. ]?265|hevc|xvid|divx|mpeg[-. ]?2|av1|vp9)\b")
            .expect("valid codec regex")
    });

    pub static PROPER_REPACK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\b(proper|repack)\b").expect("valid proper regex"));

    pub static VERSION: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\bv(\d)\b").expect("valid version regex"));

    // REAL is meaningful only in uppercase; lowercase "real" is a word
    pub static REAL: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\bREAL\b").expect("valid REAL regex"));

    pub static RELEASE_GROUP: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"-([A-Za-z0-9]+)(?:\.[A-Za-z0-9]{2,4})?$").expect("valid group regex")
    });

    pub static LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(french|german|spanish|italian|multi|vostfr|dutch|swedish|norwegian|danish|russian|japanese|korean|portuguese)\b",
        )
        .expect("valid language regex")
    });

    pub static EDITION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(extended|uncut|international)\b").expect("valid edition regex")
    });

    pub static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b((?:19|20)\d{2})[. _-](\d{1,2})[. _-](\d{1,2})\b").expect("valid date regex")
    });

    pub static YEAR: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"));
}

/// Parse a release title into its structured record.
///
/// Pure and infallible: fields that cannot be extracted are left unset.
///
/// # Examples
///
/// ```
/// use arenarr::title::{parse_title, Resolution, Source};
///
/// let parsed = parse_title("UFC.299.Main.Card.1080p.WEB-DL.H264-GRP");
/// assert_eq!(parsed.quality.resolution, Some(Resolution::R1080));
/// assert_eq!(parsed.quality.source, Some(Source::WebDl));
/// assert_eq!(parsed.sport_prefix.as_deref(), Some("UFC"));
/// assert_eq!(parsed.part.as_deref(), Some("Main Card"));
/// ```
pub fn parse_title(title: &str) -> ParsedTitle {
    let resolution = parse_resolution(title);
    let (source, is_remux) = parse_source(title, resolution);
    let codec = parse_codec(title);
    let revision = parse_revision(title);
    let release_group = parse_release_group(title);
    let language = parse_language(title);
    let edition = parse_edition(title);
    let (year, month, day) = parse_date(title);

    ParsedTitle {
        quality: Quality { source, resolution, codec, is_remux },
        revision,
        release_group,
        language,
        edition,
        year,
        month,
        day,
        round: sports::detect_round(title),
        sport_prefix: sports::detect_sport_prefix(title),
        part: sports::detect_part(title),
        is_pack: sports::is_pack(title),
    }
}

fn parse_resolution(title: &str) -> Option<Resolution> {
    // Explicit NNNNp tokens win
    for caps in patterns::RESOLUTION_P.captures_iter(title) {
        if let Some(resolution) = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .and_then(Resolution::from_p_value)
        {
            return Some(resolution);
        }
    }
    // Raw pixel dimensions
    if let Some(caps) = patterns::DIMENSIONS.captures(title) {
        let width: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok())?;
        let height: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok())?;
        if let Some(resolution) = Resolution::from_dimensions(width, height) {
            return Some(resolution);
        }
    }
    // Marketing aliases
    if let Some(caps) = patterns::RES_ALIAS.captures(title) {
        let alias = caps.get(1)?.as_str().to_ascii_lowercase();
        return match alias.as_str() {
            "4k" | "uhd" => Some(Resolution::R2160),
            "fullhd" | "fhd" => Some(Resolution::R1080),
            _ => None,
        };
    }
    None
}

fn parse_source(title: &str, resolution: Option<Resolution>) -> (Option<Source>, bool) {
    let is_remux = patterns::REMUX.is_match(title);

    // Scene titles often prepend the originating platform and end with the
    // actual format, so the last source token wins.
    let matched = patterns::SOURCE
        .find_iter(title)
        .last()
        .map(|m| m.as_str().to_ascii_lowercase().replace(['-', '_', '.', ' '], ""));

    let source = match matched.as_deref() {
        Some(s) if s.starts_with("blu") || s == "bdrip" || s == "brrip" => {
            if is_remux {
                Some(Source::BlurayRaw)
            } else {
                Some(Source::Bluray)
            }
        }
        Some("webdl") | Some("web") => Some(Source::WebDl),
        Some("webrip") => Some(Source::WebRip),
        Some("hdtv") | Some("ahdtv") => Some(Source::Hdtv),
        Some("pdtv") | Some("sdtv") | Some("dsr") | Some("tvrip") => Some(Source::Sdtv),
        Some("dvd") | Some("dvdrip") => Some(Source::Dvd),
        Some("rawhd") => Some(Source::RawHd),
        _ => None,
    };

    if source.is_some() {
        return (source, is_remux);
    }

    // A resolution alone implies a TV capture (sports default)
    if resolution.is_some() {
        return (Some(Source::Hdtv), is_remux);
    }

    // Nothing matched: the file extension seeds the source
    let lower = title.to_ascii_lowercase();
    if lower.ends_with(".ts") || lower.ends_with(".m2ts") {
        (Some(Source::RawHd), is_remux)
    } else if lower.ends_with(".avi") || lower.ends_with(".wmv") {
        (Some(Source::Sdtv), is_remux)
    } else {
        (None, is_remux)
    }
}

fn parse_codec(title: &str) -> Option<Codec> {
    let matched = patterns::CODEC
        .find(title)
        .map(|m| m.as_str().to_ascii_lowercase().replace(['-', '.', ' '], ""));
    match matched.as_deref() {
        Some("x264") | Some("h264") | Some("avc") => Some(Codec::H264),
        Some("x265") | Some("h265") | Some("hevc") => Some(Codec::H265),
        Some("xvid") | Some("divx") => Some(Codec::Xvid),
        Some("mpeg2") => Some(Codec::Mpeg2),
        Some("av1") => Some(Codec::Av1),
        Some("vp9") => Some(Codec::Vp9),
        _ => None,
    }
}

fn parse_revision(title: &str) -> Revision {
    let mut revision = Revision::default();

    if let Some(m) = patterns::PROPER_REPACK.find(title) {
        revision.version = revision.version.max(2);
        if m.as_str().eq_ignore_ascii_case("repack") {
            revision.is_repack = true;
        }
    }
    if let Some(caps) = patterns::VERSION.captures(title) {
        if let Some(v) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if v > 1 {
                revision.version = v;
            }
        }
    }
    if patterns::REAL.is_match(title) {
        revision.is_real = true;
    }

    revision
}

fn parse_release_group(title: &str) -> Option<String> {
    let caps = patterns::RELEASE_GROUP.captures(title)?;
    let group = caps.get(1)?.as_str();
    // A trailing -2160p or -H264 is a quality token, not a group
    if patterns::RESOLUTION_P.is_match(group)
        || patterns::CODEC.is_match(group)
        || patterns::SOURCE.is_match(group)
        || group.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some(group.to_string())
}

fn parse_language(title: &str) -> Option<String> {
    patterns::LANGUAGE.find(title).map(|m| {
        let lower = m.as_str().to_ascii_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => lower,
        }
    })
}

fn parse_edition(title: &str) -> Option<String> {
    patterns::EDITION.find(title).map(|m| {
        let lower = m.as_str().to_ascii_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => lower,
        }
    })
}

fn parse_date(title: &str) -> (Option<i32>, Option<u32>, Option<u32>) {
    if let Some(caps) = patterns::FULL_DATE.captures(title) {
        let year: Option<i32> = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let month: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let day: Option<u32> = caps.get(3).and_then(|m| m.as_str().parse().ok());
        if let (Some(y), Some(m), Some(d)) = (year, month, day) {
            if (1..=12).contains(&m) && (1..=31).contains(&d) {
                return (Some(y), Some(m), Some(d));
            }
        }
    }
    let year = patterns::YEAR
        .captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    (year, None, None)
}
