//! Background service spawning.
//!
//! Each worker owns a wall-clock cadence and runs its iterations sequentially
//! on itself; workers communicate exclusively through the store. All take the
//! shared cancellation token and return promptly when it fires.

use super::Orchestrator;
use crate::discovery::RssSyncWorker;
use crate::dvr::DvrScheduler;
use crate::monitor::QueueMonitor;
use crate::planner::SearchPlanner;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

impl Orchestrator {
    /// Start the background workers: RSS discovery, the search planner, the
    /// queue monitor, the DVR scheduler (when enabled and a recorder is
    /// registered), and the cache sweeper.
    ///
    /// Call after registering download clients and the recorder; workers
    /// snapshot the registrations at start.
    pub async fn start_background_services(&self) -> crate::Result<()> {
        self.recover_startup_state().await?;

        let clients = self.client_set();
        if clients.is_empty() {
            warn!("No download clients registered; grabs will fail until one is added");
        }

        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let rss = RssSyncWorker::new(
            self.config.clone(),
            self.indexer_client.clone(),
            self.cache.clone(),
            self.health.clone(),
            self.cancel.child_token(),
        );
        workers.push(tokio::spawn(rss.run()));

        let planner = SearchPlanner::new(
            self.config.clone(),
            self.db.clone(),
            self.cache.clone(),
            self.indexer_client.clone(),
            self.health.clone(),
            clients.clone(),
            self.event_tx.clone(),
            self.cancel.child_token(),
        );
        workers.push(tokio::spawn(planner.run()));

        let monitor = QueueMonitor::new(
            self.config.clone(),
            self.db.clone(),
            clients,
            self.importer.clone(),
            self.event_tx.clone(),
            self.cancel.child_token(),
        );
        workers.push(tokio::spawn(monitor.run()));

        if self.config.dvr.enabled {
            match (self.recorder(), self.media_probe()) {
                (Some(recorder), Some(probe)) => {
                    let scheduler = Arc::new(DvrScheduler::new(
                        self.config.clone(),
                        self.db.clone(),
                        self.importer.clone(),
                        probe,
                        recorder,
                        self.event_tx.clone(),
                        self.cancel.child_token(),
                    ));
                    workers.push(tokio::spawn(scheduler.run()));
                }
                (None, _) => {
                    warn!("DVR enabled but no recorder registered; DVR scheduler not started");
                }
                (_, None) => {
                    warn!("DVR enabled but no media probe available (ffprobe not found); DVR scheduler not started");
                }
            }
        }

        workers.push(tokio::spawn(self.clone().run_sweeper()));

        info!(workers = workers.len(), "Background services started");
        Ok(())
    }

    /// Periodic housekeeping: expired cache entries, old blocklist rows and
    /// stale EPG programs.
    async fn run_sweeper(self) {
        let interval = self.config.cache.sweep_interval;
        info!(interval_secs = interval.as_secs(), "Cache sweeper started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.cache.sweep().await {
                warn!(error = %e, "Cache sweep failed");
            }

            let now = Utc::now().timestamp();
            let blocklist_horizon = now - self.config.cache.blocklist_horizon.as_secs() as i64;
            match self.db.prune_blocklist(blocklist_horizon).await {
                Ok(removed) if removed > 0 => {
                    info!(removed = removed, "Pruned old blocklist rows");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Blocklist prune failed"),
            }

            if let Err(e) = self.db.prune_epg_programs(now - 86_400).await {
                warn!(error = %e, "EPG prune failed");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }

        info!("Cache sweeper stopped");
    }
}
