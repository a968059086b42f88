//! RSS discovery worker (C7)
//!
//! A single periodic loop. Per iteration: for each enabled indexer whose
//! availability is green, fetch the RSS view and push the results into the
//! release cache with `from_rss = true`. No search queries are ever issued
//! here — discovery is the cheap path that keeps the cache warm so the
//! planner rarely needs to spend search quota.

use crate::cache::ReleaseCache;
use crate::config::Config;
use crate::error::IndexerError;
use crate::health::HealthManager;
use crate::indexer::IndexerClient;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic RSS sync across enabled indexers
pub struct RssSyncWorker {
    config: Arc<Config>,
    client: IndexerClient,
    cache: ReleaseCache,
    health: HealthManager,
    cancel: CancellationToken,
}

impl RssSyncWorker {
    /// Create the worker over shared components
    pub fn new(
        config: Arc<Config>,
        client: IndexerClient,
        cache: ReleaseCache,
        health: HealthManager,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, client, cache, health, cancel }
    }

    /// Run until cancelled. The cancellation handle is checked between
    /// iterations and between per-indexer steps.
    pub async fn run(self) {
        info!(
            interval_secs = self.config.discovery.interval.as_secs(),
            "RSS sync worker started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.sync_once().await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.discovery.interval) => {}
            }
        }

        info!("RSS sync worker stopped");
    }

    /// One full pass over the enabled indexers
    pub async fn sync_once(&self) {
        for indexer in &self.config.indexers {
            if self.cancel.is_cancelled() {
                return;
            }
            if !indexer.enabled {
                continue;
            }

            match self.health.availability(indexer).await {
                Ok(availability) if availability.is_available() => {}
                Ok(availability) => {
                    debug!(indexer = %indexer.name, reason = %availability.reason(), "Skipping RSS fetch");
                    continue;
                }
                Err(e) => {
                    warn!(indexer = %indexer.name, error = %e, "Availability lookup failed");
                    continue;
                }
            }

            match self
                .client
                .fetch_rss(indexer, self.config.discovery.max_results)
                .await
            {
                Ok(results) => {
                    debug!(
                        indexer = %indexer.name,
                        items = results.len(),
                        "RSS fetch complete"
                    );
                    if let Err(e) = self.cache.cache_releases(&results, true).await {
                        warn!(indexer = %indexer.name, error = %e, "Failed to cache RSS results");
                    }
                }
                Err(IndexerError::NotAvailable { indexer: name, reason }) => {
                    debug!(indexer = %name, reason = %reason, "RSS fetch refused by admission");
                }
                Err(e) => {
                    // the client already routed the error into the health model
                    warn!(indexer = %indexer.name, error = %e, "RSS fetch failed");
                }
            }
        }
    }
}
