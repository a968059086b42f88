//! Startup recovery and graceful shutdown.

use super::Orchestrator;
use crate::types::{DownloadStatus, RecordingStatus, SystemEvent};
use tracing::info;

impl Orchestrator {
    /// Re-arm state left behind by a previous process.
    ///
    /// Nothing is held in memory between runs: queue items and recordings
    /// live in the store, so recovery is observational — the monitor resumes
    /// polling non-terminal queue items and the DVR pass converges recordings
    /// whose window ended while we were down. This just surfaces the counts.
    pub(crate) async fn recover_startup_state(&self) -> crate::Result<()> {
        let queue = self.db.list_active_queue_items().await?;
        let in_flight = queue
            .iter()
            .filter(|i| DownloadStatus::from_i32(i.status) != DownloadStatus::Failed)
            .count();
        if in_flight > 0 {
            info!(items = in_flight, "Resuming monitoring of in-flight downloads");
        }

        let scheduled = self
            .db
            .list_recordings_by_status(RecordingStatus::Scheduled)
            .await?
            .len();
        let recording = self
            .db
            .list_recordings_by_status(RecordingStatus::Recording)
            .await?
            .len();
        if scheduled + recording > 0 {
            info!(
                scheduled = scheduled,
                recording = recording,
                "Resuming DVR recordings from a previous run"
            );
        }

        Ok(())
    }

    /// Graceful shutdown: cancel every worker, wait for in-flight iterations
    /// to finish, emit the shutdown event and close the database.
    pub async fn shutdown(&self) -> crate::Result<()> {
        info!("Shutting down");
        self.cancel.cancel();

        let handles: Vec<_> = {
            let mut workers = self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Worker ended abnormally during shutdown");
                }
            }
        }

        self.emit_event(SystemEvent::Shutdown);
        self.db.close().await;
        info!("Shutdown complete");
        Ok(())
    }
}
