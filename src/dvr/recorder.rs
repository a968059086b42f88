//! Recorder dispatch boundary
//!
//! The recorder process itself is an external collaborator. The scheduler
//! hands it a request and awaits completion; the returned artifact (or the
//! scheduler's own end-of-window probe of the output path) is the completion
//! signal.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Everything the recorder needs for one capture
#[derive(Clone, Debug)]
pub struct RecordingRequest {
    /// IPTV stream URL to capture
    pub channel_stream_url: String,
    /// When to start capturing
    pub start_at: DateTime<Utc>,
    /// When to stop capturing
    pub end_at: DateTime<Utc>,
    /// Where the output file must land
    pub output_path: PathBuf,
    /// Recorder-defined encoding profile
    pub encoding_profile: Option<String>,
}

/// What a finished capture produced
#[derive(Clone, Debug)]
pub struct RecordingArtifact {
    /// The output file on disk
    pub path: PathBuf,
    /// Output size in bytes
    pub size: i64,
    /// When capture actually started
    pub started_at: DateTime<Utc>,
    /// When capture actually ended
    pub ended_at: DateTime<Utc>,
}

/// Pluggable recorder backend.
///
/// `record` resolves when the capture ends (normally hours after dispatch) or
/// fails. Implementations must stop capturing and clean up when the future is
/// dropped — the scheduler drops it on shutdown.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Implementation name, for logs
    fn name(&self) -> &str;

    /// Run one capture to completion
    async fn record(&self, request: RecordingRequest) -> Result<RecordingArtifact>;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Scripted recorder: writes a small file at the output path and returns
    /// immediately, recording the requests it saw.
    pub struct InstantRecorder {
        pub requests: Mutex<Vec<RecordingRequest>>,
        pub file_size: i64,
    }

    impl InstantRecorder {
        pub fn new(file_size: i64) -> Self {
            Self { requests: Mutex::new(Vec::new()), file_size }
        }
    }

    #[async_trait]
    impl Recorder for InstantRecorder {
        fn name(&self) -> &str {
            "instant"
        }

        async fn record(&self, request: RecordingRequest) -> Result<RecordingArtifact> {
            if let Some(parent) = request.output_path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&request.output_path, vec![0u8; self.file_size as usize]).unwrap();
            let artifact = RecordingArtifact {
                path: request.output_path.clone(),
                size: self.file_size,
                started_at: request.start_at,
                ended_at: request.end_at,
            };
            self.requests.lock().unwrap().push(request);
            Ok(artifact)
        }
    }

    /// Recorder that always fails
    pub struct FailingRecorder;

    #[async_trait]
    impl Recorder for FailingRecorder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn record(&self, request: RecordingRequest) -> Result<RecordingArtifact> {
            Err(crate::Error::Dvr(crate::error::DvrError::DispatchFailed {
                id: 0,
                reason: format!("no signal on {}", request.channel_stream_url),
            }))
        }
    }
}
