//! Synthetic scene titles for DVR captures
//!
//! `{EventTitle}.{Year}.{Resolution}.HDTV.{VideoCodec}.{AudioCodec}.{Channels}-DVR`
//!
//! The title parser round-trips these, so a recording's quality label and
//! scores come out of exactly the same pipeline as an indexer release's.

use super::probe::ProbeResult;
use crate::title::Resolution;

/// Build the canonical synthetic title for a recorded event
pub fn synthetic_title(event_title: &str, year: i32, probe: &ProbeResult) -> String {
    let title = dotted(event_title);
    let resolution = Resolution::from_dimensions(probe.width, probe.height)
        .map(|r| r.to_string())
        .unwrap_or_else(|| "480p".to_string());
    let video = canonical_video_codec(&probe.video_codec);
    let audio = canonical_audio_codec(&probe.audio_codec);
    let channels = channel_layout(probe.audio_channels);

    format!("{title}.{year}.{resolution}.HDTV.{video}.{audio}.{channels}-DVR")
}

/// Scene titles use dots for spaces and drop characters that would not
/// survive a filename
fn dotted(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_dot = true;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_dot = false;
        } else if !last_was_dot {
            out.push('.');
            last_was_dot = true;
        }
    }
    while out.ends_with('.') {
        out.pop();
    }
    out
}

/// Map ffprobe codec names onto scene tokens
fn canonical_video_codec(codec: &str) -> &'static str {
    match codec.to_ascii_lowercase().as_str() {
        "h264" | "avc" => "H264",
        "hevc" | "h265" => "H265",
        "mpeg2video" | "mpeg2" => "MPEG2",
        "av1" => "AV1",
        "vp9" => "VP9",
        _ => "H264",
    }
}

fn canonical_audio_codec(codec: &str) -> &'static str {
    match codec.to_ascii_lowercase().as_str() {
        "aac" => "AAC",
        "ac3" | "ac-3" => "AC3",
        "eac3" | "e-ac-3" => "EAC3",
        "mp2" => "MP2",
        "mp3" => "MP3",
        "dts" => "DTS",
        "opus" => "OPUS",
        _ => "AAC",
    }
}

/// Channel-count to layout token (2 → "2.0", 6 → "5.1", 8 → "7.1")
fn channel_layout(channels: u32) -> &'static str {
    match channels {
        0 | 1 => "1.0",
        2 => "2.0",
        3 => "2.1",
        6 => "5.1",
        8 => "7.1",
        _ => "2.0",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::{parse_title, Codec, Source};

    fn probe(width: u32, height: u32, video: &str, audio: &str, channels: u32) -> ProbeResult {
        ProbeResult {
            width,
            height,
            video_codec: video.to_string(),
            audio_codec: audio.to_string(),
            audio_channels: channels,
            duration_seconds: 7200.0,
        }
    }

    #[test]
    fn builds_the_canonical_form() {
        let title = synthetic_title("UFC 299", 2024, &probe(1920, 1080, "h264", "aac", 2));
        assert_eq!(title, "UFC.299.2024.1080p.HDTV.H264.AAC.2.0-DVR");
    }

    #[test]
    fn parser_round_trips_the_observable_fields() {
        let p = probe(1920, 1080, "h264", "aac", 2);
        let title = synthetic_title("UFC 299", 2024, &p);
        let parsed = parse_title(&title);

        assert_eq!(parsed.quality.resolution.map(|r| r.as_u32()), Some(1080));
        assert_eq!(parsed.quality.source, Some(Source::Hdtv));
        assert_eq!(parsed.quality.codec, Some(Codec::H264));
        assert_eq!(parsed.year, Some(2024));
        assert_eq!(parsed.release_group.as_deref(), Some("DVR"));
        assert_eq!(parsed.sport_prefix.as_deref(), Some("UFC"));
    }

    #[test]
    fn round_trip_holds_across_resolutions_and_codecs() {
        let cases = [
            (1280u32, 720u32, "mpeg2video", 720u32, Codec::Mpeg2),
            (3840, 2160, "hevc", 2160, Codec::H265),
            (720, 576, "h264", 576, Codec::H264),
        ];
        for (w, h, codec, expected_res, expected_codec) in cases {
            let title = synthetic_title("NHL Bruins vs Rangers", 2025, &probe(w, h, codec, "ac3", 6));
            let parsed = parse_title(&title);
            assert_eq!(
                parsed.quality.resolution.map(|r| r.as_u32()),
                Some(expected_res),
                "{title}"
            );
            assert_eq!(parsed.quality.codec, Some(expected_codec), "{title}");
            assert_eq!(parsed.quality.source, Some(Source::Hdtv), "{title}");
        }
    }

    #[test]
    fn event_titles_with_punctuation_become_clean_dotted_forms() {
        let title = synthetic_title(
            "Chiefs @ Raiders: Week 15",
            2024,
            &probe(1920, 1080, "h264", "aac", 2),
        );
        assert!(title.starts_with("Chiefs.Raiders.Week.15.2024."), "got {title}");
        assert!(!title.contains("..") && !title.contains('@') && !title.contains(':'));
    }

    #[test]
    fn unknown_codecs_fall_back_rather_than_break_the_grammar() {
        let title = synthetic_title("UFC 299", 2024, &probe(1920, 1080, "weirdcodec", "weird", 11));
        assert_eq!(title, "UFC.299.2024.1080p.HDTV.H264.AAC.2.0-DVR");
    }
}
