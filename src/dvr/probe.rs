//! Media file probing
//!
//! The recorded file's technical parameters feed the synthetic title and
//! therefore the scorer. Probing is pluggable behind [`MediaProbe`]; the
//! default implementation shells out to `ffprobe`, discovered on PATH.

use crate::error::{DvrError, Error};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Technical parameters of a media file
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeResult {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Video codec name as reported (e.g. "h264", "hevc", "mpeg2video")
    pub video_codec: String,
    /// Audio codec name as reported (e.g. "aac", "ac3")
    pub audio_codec: String,
    /// Audio channel count
    pub audio_channels: u32,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Pluggable media prober
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Implementation name, for logs
    fn name(&self) -> &str;

    /// Probe a file's technical parameters
    async fn probe(&self, path: &Path) -> Result<ProbeResult>;
}

/// `ffprobe`-backed prober
pub struct CliMediaProbe {
    binary: PathBuf,
}

impl CliMediaProbe {
    /// Use an explicitly configured ffprobe binary
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Discover ffprobe on PATH; None when it is not installed
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(|binary| {
            tracing::info!(binary = %binary.display(), "Found ffprobe on PATH");
            Self { binary }
        })
    }
}

#[async_trait]
impl MediaProbe for CliMediaProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg("-show_format")
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                Error::Dvr(DvrError::ProbeFailed {
                    path: path.to_path_buf(),
                    reason: format!("failed to run ffprobe: {e}"),
                })
            })?;

        if !output.status.success() {
            return Err(Error::Dvr(DvrError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {}", output.status),
            }));
        }

        parse_ffprobe_output(path, &output.stdout)
    }
}

/// Parse ffprobe's JSON document into a [`ProbeResult`]
fn parse_ffprobe_output(path: &Path, stdout: &[u8]) -> Result<ProbeResult> {
    let doc: serde_json::Value = serde_json::from_slice(stdout).map_err(|e| {
        Error::Dvr(DvrError::ProbeFailed {
            path: path.to_path_buf(),
            reason: format!("unparseable ffprobe output: {e}"),
        })
    })?;

    let streams = doc
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| {
            Error::Dvr(DvrError::ProbeFailed {
                path: path.to_path_buf(),
                reason: "no streams in ffprobe output".to_string(),
            })
        })?;

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"));
    let audio = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("audio"));

    let Some(video) = video else {
        return Err(Error::Dvr(DvrError::ProbeFailed {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        }));
    };

    let duration_seconds = doc
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(ProbeResult {
        width: video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        height: video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        video_codec: video
            .get("codec_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        audio_codec: audio
            .and_then(|a| a.get("codec_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        audio_channels: audio
            .and_then(|a| a.get("channels"))
            .and_then(|v| v.as_u64())
            .unwrap_or(2) as u32,
        duration_seconds,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fixed-answer probe for scheduler tests
    pub struct StaticProbe(pub ProbeResult);

    #[async_trait]
    impl MediaProbe for StaticProbe {
        fn name(&self) -> &str {
            "static"
        }

        async fn probe(&self, _path: &Path) -> Result<ProbeResult> {
            Ok(self.0.clone())
        }
    }

    pub fn hd_broadcast() -> ProbeResult {
        ProbeResult {
            width: 1920,
            height: 1080,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            audio_channels: 2,
            duration_seconds: 7_200.0,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const FFPROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"codec_type": "audio", "codec_name": "aac", "channels": 6}
        ],
        "format": {"duration": "7245.38"}
    }"#;

    #[test]
    fn parses_a_typical_ffprobe_document() {
        let result = parse_ffprobe_output(Path::new("/r/rec.ts"), FFPROBE_JSON.as_bytes()).unwrap();
        assert_eq!(result.width, 1920);
        assert_eq!(result.height, 1080);
        assert_eq!(result.video_codec, "h264");
        assert_eq!(result.audio_codec, "aac");
        assert_eq!(result.audio_channels, 6);
        assert!((result.duration_seconds - 7245.38).abs() < 0.01);
    }

    #[test]
    fn missing_video_stream_is_a_probe_failure() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "aac"}], "format": {}}"#;
        let err = parse_ffprobe_output(Path::new("/r/rec.ts"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dvr(DvrError::ProbeFailed { .. })));
    }

    #[test]
    fn garbage_output_is_a_probe_failure() {
        let err = parse_ffprobe_output(Path::new("/r/rec.ts"), b"junk").unwrap_err();
        assert!(matches!(err, Error::Dvr(DvrError::ProbeFailed { .. })));
    }

    #[test]
    fn video_only_files_default_the_audio_fields() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "mpeg2video", "width": 1280, "height": 720}],
            "format": {"duration": "10.0"}
        }"#;
        let result = parse_ffprobe_output(Path::new("/r/rec.ts"), json.as_bytes()).unwrap();
        assert_eq!(result.audio_codec, "unknown");
        assert_eq!(result.audio_channels, 2);
    }
}
