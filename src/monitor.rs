//! Download lifecycle monitor (C10)
//!
//! Fixed-cadence poll against the download clients. Each active queue item is
//! advanced through the state machine:
//!
//! ```text
//! Queued ─▶ Downloading ─▶ Completed ─▶ Importing ─▶ Imported   (terminal)
//!                 │            │
//!                 ├─▶ Paused ◀─┘
//!                 ├─▶ Warning
//!                 └─▶ Failed ─▶ (replacement via the planner)
//! ```
//!
//! Every per-item decision commits on its own, so a poison item cannot roll
//! back progress on its siblings. Terminal transitions are guarded by the
//! previous status in the store, so each is observed at most once.

use crate::clients::{ClientSet, ClientStatus};
use crate::config::Config;
use crate::db::{Database, NewBlocklistItem, QueueItem};
use crate::importer::Importer;
use crate::types::{
    BlocklistReason, DownloadStatus, EventId, NormalizedStatus, QueueItemId, SystemEvent,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress below this delta between polls counts as "not moving"
const STALL_PROGRESS_EPSILON: f64 = 0.1;

/// A paused torrent at or above this progress is a debrid completion
const DEBRID_COMPLETE_THRESHOLD: f64 = 99.9;

/// Status message applied when the owning event loses its monitored flag
const UNMONITORED_MESSAGE: &str = "event is no longer monitored";

/// The queue monitor worker
pub struct QueueMonitor {
    config: Arc<Config>,
    db: Arc<Database>,
    clients: ClientSet,
    importer: Importer,
    events_tx: broadcast::Sender<SystemEvent>,
    cancel: CancellationToken,
}

impl QueueMonitor {
    /// Create the worker over shared components
    pub fn new(
        config: Arc<Config>,
        db: Arc<Database>,
        clients: ClientSet,
        importer: Importer,
        events_tx: broadcast::Sender<SystemEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, db, clients, importer, events_tx, cancel }
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(
            interval_secs = self.config.monitor.poll_interval.as_secs(),
            "Queue monitor started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "Monitor iteration failed");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.monitor.poll_interval) => {}
            }
        }

        info!("Queue monitor stopped");
    }

    /// One poll pass over all active queue items
    pub async fn poll_once(&self) -> crate::Result<()> {
        let items = self.db.list_active_queue_items().await?;
        for item in items {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.poll_item(&item).await {
                warn!(queue_id = item.id, title = %item.title, error = %e, "Queue item poll failed");
            }
        }
        Ok(())
    }

    /// Advance one queue item through the state machine
    pub async fn poll_item(&self, item: &QueueItem) -> crate::Result<()> {
        let id = QueueItemId(item.id);
        let status = DownloadStatus::from_i32(item.status);

        // Failed items are records awaiting the planner's replacement; the
        // client has usually forgotten them already.
        if status == DownloadStatus::Failed {
            return Ok(());
        }

        let event = self.db.get_event(EventId(item.event_id)).await?;

        // event unmonitored mid-download: flag it; on re-monitoring, resume
        if let Some(event) = &event {
            if event.monitored == 0 {
                if status != DownloadStatus::Warning {
                    self.db.set_queue_warning(id, UNMONITORED_MESSAGE, status).await?;
                    debug!(queue_id = item.id, "Flagged download for unmonitored event");
                }
                return Ok(());
            }
            if status == DownloadStatus::Warning
                && item.status_message.as_deref() == Some(UNMONITORED_MESSAGE)
            {
                let resume = item
                    .resume_status
                    .map(DownloadStatus::from_i32)
                    .unwrap_or(DownloadStatus::Downloading);
                self.db.clear_queue_warning(id, resume).await?;
                debug!(queue_id = item.id, "Event re-monitored, download resumed");
                return Ok(());
            }
        }

        let Some(client) = self.clients.get(&item.client) else {
            warn!(queue_id = item.id, client = %item.client, "Queue item references an unknown client");
            return Ok(());
        };

        let reading = match client.status(&item.download_id).await {
            Ok(r) => r,
            Err(e) => {
                debug!(queue_id = item.id, error = %e, "Client status failed, retrying next poll");
                return Ok(());
            }
        };

        let Some(mut reading) = reading else {
            return self.handle_missing(item, id).await;
        };

        if item.missing_count > 0 {
            self.db.reset_queue_missing(id).await?;
        }

        // debrid services pause seeding at completion
        if reading.status == NormalizedStatus::Paused
            && reading.progress >= DEBRID_COMPLETE_THRESHOLD
        {
            reading.status = NormalizedStatus::Completed;
        }

        let previous_progress = item.progress;
        let downloaded = if reading.size > 0 {
            reading.downloaded.clamp(0, reading.size)
        } else {
            reading.downloaded.max(0)
        };
        self.db
            .update_queue_progress(
                id,
                reading.progress,
                downloaded,
                reading.size,
                reading.time_remaining.map(|d| d.as_secs() as i64),
            )
            .await?;

        match reading.status {
            NormalizedStatus::Completed => self.handle_completed(item, id, &reading).await,
            NormalizedStatus::Failed => {
                let message = reading
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "download client reported failure".to_string());
                self.handle_failed(item, id, status, &message).await
            }
            NormalizedStatus::Downloading => {
                self.handle_downloading(item, id, status, previous_progress, reading.progress)
                    .await
            }
            NormalizedStatus::Queued => {
                if status != DownloadStatus::Queued && status != DownloadStatus::Warning {
                    self.db.set_queue_status(id, DownloadStatus::Queued, None).await?;
                }
                Ok(())
            }
            NormalizedStatus::Paused => {
                if status != DownloadStatus::Paused && status != DownloadStatus::Warning {
                    self.db.set_queue_status(id, DownloadStatus::Paused, None).await?;
                }
                Ok(())
            }
            NormalizedStatus::Warning => {
                let message = reading
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "download client reported a warning".to_string());
                if status != DownloadStatus::Warning {
                    self.db.set_queue_warning(id, &message, status).await?;
                }
                Ok(())
            }
        }
    }

    /// Not-found reading: first try to follow an identifier change (debrid
    /// proxies rename downloads), then count it, and on the configured
    /// threshold drop the item (the user deleted it client-side)
    async fn handle_missing(&self, item: &QueueItem, id: QueueItemId) -> crate::Result<()> {
        if let Some(client) = self.clients.get(&item.client) {
            if let Ok(Some((new_id, _))) =
                client.find_by_title(&item.title, item.category.as_deref()).await
            {
                info!(
                    queue_id = item.id,
                    old_id = %item.download_id,
                    new_id = %new_id,
                    "Download id changed in client, following"
                );
                self.db.update_queue_download_id(id, &new_id).await?;
                return Ok(());
            }
        }

        let count = self.db.increment_queue_missing(id).await?;
        debug!(queue_id = item.id, missing_count = count, "Download missing from client");

        if count >= i64::from(self.config.monitor.missing_removal_threshold) {
            info!(queue_id = item.id, title = %item.title, "Removing queue item missing from client");
            self.db.delete_queue_item(id).await?;
            self.db
                .record_history(
                    Some(EventId(item.event_id)),
                    "removed",
                    &item.title,
                    Some("missing from download client"),
                )
                .await?;
            let _ = self.events_tx.send(SystemEvent::QueueItemRemoved { id });
        }
        Ok(())
    }

    /// Downloading reading: stall detection and Warning recovery
    async fn handle_downloading(
        &self,
        item: &QueueItem,
        id: QueueItemId,
        status: DownloadStatus,
        previous_progress: f64,
        progress: f64,
    ) -> crate::Result<()> {
        let moved = progress - previous_progress >= STALL_PROGRESS_EPSILON;
        let age_secs = Utc::now().timestamp() - item.grabbed_at;
        let past_threshold = age_secs >= self.config.monitor.stall_threshold.as_secs() as i64;

        if status == DownloadStatus::Warning {
            // only the stall warning clears on movement; the unmonitored
            // warning is handled before the client poll
            if moved {
                self.db.clear_queue_warning(id, DownloadStatus::Downloading).await?;
                info!(queue_id = item.id, progress = progress, "Stalled download resumed");
            }
            return Ok(());
        }

        if !moved && past_threshold {
            let message = format!("download stalled at {progress:.1}%");
            self.db.set_queue_warning(id, &message, DownloadStatus::Downloading).await?;
            info!(queue_id = item.id, progress = progress, "Download stalled");
            let _ = self.events_tx.send(SystemEvent::DownloadStalled { id, progress });
            return Ok(());
        }

        if status != DownloadStatus::Downloading {
            self.db.set_queue_status(id, DownloadStatus::Downloading, None).await?;
        }
        Ok(())
    }

    /// Completed reading: trigger the import exactly once
    async fn handle_completed(
        &self,
        item: &QueueItem,
        id: QueueItemId,
        reading: &ClientStatus,
    ) -> crate::Result<()> {
        if item.imported_at.is_some() {
            return Ok(());
        }

        let now = Utc::now().timestamp();
        self.db.set_queue_completed_at(id, now).await?;
        self.db.set_queue_status(id, DownloadStatus::Importing, None).await?;

        let event = self
            .db
            .get_event(EventId(item.event_id))
            .await?
            .ok_or_else(|| crate::Error::NotFound(format!("event {}", item.event_id)))?;

        let client = self.clients.get(&item.client);
        let host = client.as_ref().map(|c| c.host().to_string()).unwrap_or_default();

        match self
            .importer
            .import_completed_download(item, &event, &host, reading.save_path.as_deref())
            .await
        {
            Ok(outcome) => {
                if !self.db.try_mark_imported(id, Utc::now().timestamp()).await? {
                    // another worker observed completion first; nothing to undo
                    return Ok(());
                }
                if let Some(part_id) = item.part_id {
                    self.db.set_part_file(part_id).await?;
                    // once every monitored part has a file the event is whole
                    let parts = self.db.list_event_parts(EventId(item.event_id)).await?;
                    if parts.iter().filter(|p| p.monitored == 1).all(|p| p.has_file == 1) {
                        let folder = outcome
                            .library_path
                            .parent()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| outcome.library_path.display().to_string());
                        self.db.set_event_file(EventId(item.event_id), &folder).await?;
                    }
                }
                info!(
                    queue_id = item.id,
                    event_id = item.event_id,
                    path = %outcome.library_path.display(),
                    "Import complete"
                );
                self.db
                    .record_history(
                        Some(EventId(item.event_id)),
                        "imported",
                        &item.title,
                        Some(&outcome.library_path.display().to_string()),
                    )
                    .await?;
                let _ = self.events_tx.send(SystemEvent::Imported {
                    event_id: EventId(item.event_id),
                    path: outcome.library_path,
                    source: crate::types::FileSource::Indexer,
                });

                // files were copied/hardlinked; the client's copy can go
                if self.config.monitor.remove_completed {
                    if let Some(client) = client {
                        if let Err(e) = client.remove(&item.download_id, false).await {
                            warn!(queue_id = item.id, error = %e, "Failed to remove completed download from client");
                        }
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(queue_id = item.id, error = %e, "Import failed");
                let _ = self.events_tx.send(SystemEvent::ImportFailed {
                    event_id: EventId(item.event_id),
                    error: e.to_string(),
                });
                self.handle_failed(item, id, DownloadStatus::Importing, &e.to_string()).await
            }
        }
    }

    /// Failure handling: retry counter, blocklist, client cleanup, and either
    /// leaving the item for the planner's replacement or capping out
    async fn handle_failed(
        &self,
        item: &QueueItem,
        id: QueueItemId,
        expected: DownloadStatus,
        message: &str,
    ) -> crate::Result<()> {
        // guarded transition: the side effects below run at most once
        if !self.db.transition_queue_status(id, expected, DownloadStatus::Failed).await? {
            return Ok(());
        }
        self.db.set_queue_status(id, DownloadStatus::Failed, Some(message)).await?;

        let retries = self.db.increment_queue_retry(id).await?;

        self.db
            .add_blocklist_item(&NewBlocklistItem {
                event_id: EventId(item.event_id),
                indexer: item.indexer.clone(),
                title: item.title.clone(),
                infohash: item.infohash.clone(),
                reason: BlocklistReason::DownloadFailed,
            })
            .await?;
        self.db
            .record_history(
                Some(EventId(item.event_id)),
                "download_failed",
                &item.title,
                Some(message),
            )
            .await?;
        let _ = self.events_tx.send(SystemEvent::DownloadFailed {
            id,
            error: message.to_string(),
        });
        let _ = self.events_tx.send(SystemEvent::Blocklisted {
            event_id: EventId(item.event_id),
            title: item.title.clone(),
        });

        if self.config.monitor.remove_failed {
            if let Some(client) = self.clients.get(&item.client) {
                if let Err(e) = client.remove(&item.download_id, true).await {
                    warn!(queue_id = item.id, error = %e, "Failed to delete failed download from client");
                }
            }
        }

        if self.config.monitor.redownload_failed
            && retries < i64::from(self.config.monitor.max_retries)
        {
            info!(
                queue_id = item.id,
                retries = retries,
                "Download failed; planner will pick a replacement"
            );
        } else {
            self.db
                .set_queue_status(
                    id,
                    DownloadStatus::Failed,
                    Some(&format!("{message} (max retries reached)")),
                )
                .await?;
        }

        Ok(())
    }

}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::{downloading, with_status, ScriptedClient};
    use crate::config::ImportConfig;
    use crate::db::{NewEvent, NewQueueItem};
    use crate::types::Protocol;
    use std::time::Duration;

    struct Harness {
        monitor: QueueMonitor,
        db: Arc<Database>,
        client: Arc<ScriptedClient>,
        events_rx: broadcast::Receiver<SystemEvent>,
        _dir: tempfile::TempDir,
    }

    async fn harness(configure: impl FnOnce(&mut Config)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("t.db")).await.unwrap());
        let mut config = Config::default();
        config.import = ImportConfig {
            root_folder: dir.path().join("library"),
            use_hardlinks: false,
            remote_mappings: vec![],
            video_extensions: vec!["mkv".to_string(), "ts".to_string()],
        };
        configure(&mut config);
        let config = Arc::new(config);

        let client = Arc::new(ScriptedClient::new("qbit", Protocol::Torrent));
        let mut clients = ClientSet::new();
        clients.register(client.clone());

        let importer = Importer::new(db.clone(), config.clone());
        let (events_tx, events_rx) = broadcast::channel(64);
        let monitor = QueueMonitor::new(
            config,
            db.clone(),
            clients,
            importer,
            events_tx,
            CancellationToken::new(),
        );

        Harness { monitor, db, client, events_rx, _dir: dir }
    }

    async fn seed(db: &Database, download_id: &str) -> (EventId, QueueItemId) {
        let event_id = db
            .insert_event(&NewEvent {
                title: "UFC 299".to_string(),
                sport: "mma".to_string(),
                league: Some("UFC".to_string()),
                home_team: None,
                away_team: None,
                event_date: Utc::now().timestamp() + 3600,
                broadcast_time: None,
                external_id: None,
                monitored: true,
                quality_profile_id: None,
            })
            .await
            .unwrap();
        let queue_id = db
            .insert_queue_item(&NewQueueItem {
                event_id,
                part_id: None,
                client: "qbit".to_string(),
                download_id: download_id.to_string(),
                title: "UFC.299.Main.Card.1080p.WEB-DL.H264-GRP".to_string(),
                category: Some("arenarr".to_string()),
                indexer: "idx1".to_string(),
                infohash: Some("aabbcc".to_string()),
                protocol: "torrent".to_string(),
                size: 4_000_000_000,
            })
            .await
            .unwrap();
        (event_id, queue_id)
    }

    #[tokio::test]
    async fn downloading_reading_advances_queued_item() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-1").await;
        h.client.set_status("dl-1", Some(downloading(42.0, 4_000_000_000)));

        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Downloading);
        assert_eq!(item.progress, 42.0);
        assert!(item.downloaded > 0);
    }

    #[tokio::test]
    async fn third_consecutive_missing_reading_removes_the_item() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-gone").await;
        // no status scripted: the client does not know the id

        h.monitor.poll_once().await.unwrap();
        h.monitor.poll_once().await.unwrap();
        assert!(h.db.get_queue_item(queue_id).await.unwrap().is_some());

        h.monitor.poll_once().await.unwrap();
        assert!(
            h.db.get_queue_item(queue_id).await.unwrap().is_none(),
            "the third not-found reading removes the queue item"
        );
    }

    #[tokio::test]
    async fn sighting_resets_the_missing_counter() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-flap").await;

        h.monitor.poll_once().await.unwrap();
        h.monitor.poll_once().await.unwrap();

        h.client.set_status("dl-flap", Some(downloading(10.0, 100)));
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(item.missing_count, 0, "a sighting must reset the counter");

        h.client.set_status("dl-flap", None);
        h.monitor.poll_once().await.unwrap();
        assert!(
            h.db.get_queue_item(queue_id).await.unwrap().is_some(),
            "the count starts over after a reset"
        );
    }

    #[tokio::test]
    async fn stall_flags_warning_and_resumes_on_movement() {
        let h = harness(|c| {
            c.monitor.stall_threshold = Duration::from_secs(0);
        })
        .await;
        let (_, queue_id) = seed(&h.db, "dl-stall").await;

        // first poll records 42.0
        h.client.set_status("dl-stall", Some(downloading(42.0, 1_000)));
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Downloading);

        // second poll: progress moved by less than the epsilon
        h.client.set_status("dl-stall", Some(downloading(42.05, 1_000)));
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Warning);
        assert!(item.status_message.unwrap().contains("stalled"));

        // progress moves: warning clears back to downloading
        h.client.set_status("dl-stall", Some(downloading(43.0, 1_000)));
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(
            DownloadStatus::from_i32(item.status),
            DownloadStatus::Downloading,
            "movement clears the stall warning"
        );
        assert!(item.status_message.is_none());
    }

    #[tokio::test]
    async fn debrid_pause_at_full_progress_counts_as_completed() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-debrid").await;

        let paused_full = with_status(downloading(99.95, 1_000), NormalizedStatus::Paused);
        h.client.set_status("dl-debrid", Some(paused_full));
        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        // import will fail (no files on disk) so the item lands in Failed —
        // what matters is that completion handling ran, not Paused
        let status = DownloadStatus::from_i32(item.status);
        assert_ne!(status, DownloadStatus::Paused, "debrid pause must be treated as completion");
    }

    #[tokio::test]
    async fn plain_pause_below_threshold_stays_paused() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-paused").await;

        let paused = with_status(downloading(50.0, 1_000), NormalizedStatus::Paused);
        h.client.set_status("dl-paused", Some(paused));
        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Paused);
    }

    #[tokio::test]
    async fn unmonitored_event_flags_warning_and_resumes_on_remonitor() {
        let h = harness(|_| {}).await;
        let (event_id, queue_id) = seed(&h.db, "dl-unmon").await;
        h.client.set_status("dl-unmon", Some(downloading(10.0, 1_000)));

        h.monitor.poll_once().await.unwrap();

        h.db.set_event_monitored(event_id, false).await.unwrap();
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Warning);
        assert_eq!(item.status_message.as_deref(), Some(UNMONITORED_MESSAGE));

        h.db.set_event_monitored(event_id, true).await.unwrap();
        h.monitor.poll_once().await.unwrap();
        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(
            DownloadStatus::from_i32(item.status),
            DownloadStatus::Downloading,
            "re-monitoring clears the warning into the prior status"
        );
    }

    #[tokio::test]
    async fn client_failure_blocklists_and_removes_with_files() {
        let h = harness(|_| {}).await;
        let (event_id, queue_id) = seed(&h.db, "dl-fail").await;

        let mut failed = downloading(30.0, 1_000);
        failed.status = NormalizedStatus::Failed;
        failed.error_message = Some("tracker rejected".to_string());
        h.client.set_status("dl-fail", Some(failed));

        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Failed);
        assert_eq!(item.retry_count, 1);

        assert!(
            h.db.is_blocklisted(event_id, "idx1", &item.title, Some("aabbcc"))
                .await
                .unwrap(),
            "the failed release must be blocklisted by infohash"
        );

        let removed = h.client.removed.lock().unwrap().clone();
        assert_eq!(removed, vec![("dl-fail".to_string(), true)], "failed downloads delete files");
    }

    #[tokio::test]
    async fn failure_side_effects_run_once() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-fail2").await;

        let mut failed = downloading(30.0, 1_000);
        failed.status = NormalizedStatus::Failed;
        h.client.set_status("dl-fail2", Some(failed));

        h.monitor.poll_once().await.unwrap();
        let retries_after_first = h.db.get_queue_item(queue_id).await.unwrap().unwrap().retry_count;
        h.monitor.poll_once().await.unwrap();
        let retries_after_second = h.db.get_queue_item(queue_id).await.unwrap().unwrap().retry_count;

        assert_eq!(retries_after_first, 1);
        assert_eq!(
            retries_after_second, 1,
            "Failed items are skipped on later polls; the retry counter must not climb"
        );
    }

    #[tokio::test]
    async fn completed_download_imports_into_the_library() {
        let h = harness(|_| {}).await;
        let (event_id, queue_id) = seed(&h.db, "dl-done").await;

        // lay the completed files on disk where the client says they are
        let save_path = h._dir.path().join("downloads");
        let content_dir = save_path.join("UFC.299.Main.Card.1080p.WEB-DL.H264-GRP");
        std::fs::create_dir_all(&content_dir).unwrap();
        std::fs::write(content_dir.join("ufc-299-main-card.mkv"), vec![0u8; 2048]).unwrap();
        std::fs::write(content_dir.join("sample.txt"), b"not a video").unwrap();

        let mut done = downloading(100.0, 2_048);
        done.status = NormalizedStatus::Completed;
        done.save_path = Some(save_path);
        h.client.set_status("dl-done", Some(done));

        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Imported);
        assert!(item.imported_at.is_some());

        let event = h.db.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.has_file, 1);
        let path = event.file_path.unwrap();
        assert!(path.contains("UFC 299"), "library path is event-structured: {path}");
        assert!(std::path::Path::new(&path).exists());

        let files = h.db.list_event_files(event_id).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source, "Indexer");

        // completed item was removed from the client without deleting files
        let removed = h.client.removed.lock().unwrap().clone();
        assert_eq!(removed, vec![("dl-done".to_string(), false)]);
    }

    #[tokio::test]
    async fn import_runs_once_even_if_completion_is_observed_again() {
        let h = harness(|c| c.monitor.remove_completed = false).await;
        let (event_id, _queue_id) = seed(&h.db, "dl-twice").await;

        let save_path = h._dir.path().join("downloads");
        let content_dir = save_path.join("UFC.299.Main.Card.1080p.WEB-DL.H264-GRP");
        std::fs::create_dir_all(&content_dir).unwrap();
        std::fs::write(content_dir.join("main.mkv"), vec![0u8; 2048]).unwrap();

        let mut done = downloading(100.0, 2_048);
        done.status = NormalizedStatus::Completed;
        done.save_path = Some(save_path);
        h.client.set_status("dl-twice", Some(done));

        h.monitor.poll_once().await.unwrap();
        h.monitor.poll_once().await.unwrap();

        let files = h.db.list_event_files(event_id).await.unwrap();
        assert_eq!(files.len(), 1, "a second completion observation must not duplicate the import");
    }

    #[tokio::test]
    async fn import_failure_marks_failed_with_message() {
        let h = harness(|_| {}).await;
        let (_, queue_id) = seed(&h.db, "dl-noimport").await;

        // completed, but the save path holds no video file
        let save_path = h._dir.path().join("empty");
        std::fs::create_dir_all(&save_path).unwrap();
        let mut done = downloading(100.0, 1_000);
        done.status = NormalizedStatus::Completed;
        done.save_path = Some(save_path);
        h.client.set_status("dl-noimport", Some(done));

        h.monitor.poll_once().await.unwrap();

        let item = h.db.get_queue_item(queue_id).await.unwrap().unwrap();
        assert_eq!(DownloadStatus::from_i32(item.status), DownloadStatus::Failed);
        assert!(item.status_message.is_some());
        assert!(item.imported_at.is_none(), "a failed import must not be marked imported");
    }
}
