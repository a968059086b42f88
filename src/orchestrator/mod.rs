//! The orchestrator: construction, registration and the event channel.
//!
//! The `Orchestrator` is the embedding application's handle on the control
//! plane. It owns the database, the release cache, the health model and the
//! indexer client; download clients, the recorder and the media probe are
//! registered by the consumer before the background services start. All
//! fields are Arc-wrapped, so the handle is cheap to clone.
//!
//! Submodules:
//! - [`services`] — background worker spawning and the sweeper
//! - [`control`] — manual queue controls (pause/resume/remove)
//! - [`lifecycle`] — startup recovery and graceful shutdown

mod control;
mod lifecycle;
mod services;

use crate::cache::ReleaseCache;
use crate::clients::{ClientSet, DownloadClient};
use crate::config::Config;
use crate::db::Database;
use crate::dvr::{CliMediaProbe, MediaProbe, Recorder};
use crate::health::HealthManager;
use crate::importer::Importer;
use crate::indexer::IndexerClient;
use crate::types::SystemEvent;
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Pluggable collaborators registered before the services start
#[derive(Default)]
pub(crate) struct Collaborators {
    pub(crate) clients: ClientSet,
    pub(crate) recorder: Option<Arc<dyn Recorder>>,
    pub(crate) probe: Option<Arc<dyn MediaProbe>>,
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// Database instance for persistence (public for embedding applications
    /// that surface queue/history state)
    pub db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<SystemEvent>,
    pub(crate) cache: ReleaseCache,
    pub(crate) health: HealthManager,
    pub(crate) indexer_client: IndexerClient,
    pub(crate) importer: Importer,
    pub(crate) collaborators: Arc<std::sync::Mutex<Collaborators>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) workers: Arc<std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Validates the configuration, opens the database (running migrations),
    /// and wires the core components. No background work starts until
    /// [`start_background_services`](Self::start_background_services).
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let config = Arc::new(config);

        // buffered channel: slow subscribers lag rather than block workers
        let (event_tx, _rx) = broadcast::channel(1000);

        let cache = ReleaseCache::new(db.clone(), config.cache.ttl);
        let health = HealthManager::new(db.clone()).with_events(event_tx.clone());
        let indexer_client = IndexerClient::new(health.clone())?;
        let importer = Importer::new(db.clone(), config.clone());

        for indexer in &config.indexers {
            db.ensure_indexer_status(&indexer.name).await?;
        }

        Ok(Self {
            db,
            config,
            event_tx,
            cache,
            health,
            indexer_client,
            importer,
            collaborators: Arc::new(std::sync::Mutex::new(Collaborators::default())),
            cancel: CancellationToken::new(),
            workers: Arc::new(std::sync::Mutex::new(Vec::new())),
        })
    }

    /// Subscribe to control-plane events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind by more than the channel
    /// buffer receives a `Lagged` error and continues from the present.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.event_tx.subscribe()
    }

    /// Register a download client backend
    pub fn register_download_client(&self, client: Arc<dyn DownloadClient>) {
        self.collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clients
            .register(client);
    }

    /// Register the recorder backend (required for the DVR scheduler)
    pub fn register_recorder(&self, recorder: Arc<dyn Recorder>) {
        self.collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recorder = Some(recorder);
    }

    /// Register a media probe; without one, ffprobe is discovered on PATH
    pub fn register_media_probe(&self, probe: Arc<dyn MediaProbe>) {
        self.collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .probe = Some(probe);
    }

    /// The current configuration (cheap Arc clone)
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Manually reset an indexer's health state (operator surface)
    pub async fn reset_indexer(&self, indexer: &str) -> Result<()> {
        self.health.reset(indexer).await
    }

    /// Snapshot the registered client set
    pub(crate) fn client_set(&self) -> ClientSet {
        self.collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clients
            .clone()
    }

    /// The probe to use: registered, or ffprobe from PATH
    pub(crate) fn media_probe(&self) -> Option<Arc<dyn MediaProbe>> {
        let registered = self
            .collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .probe
            .clone();
        registered.or_else(|| {
            CliMediaProbe::from_path().map(|p| Arc::new(p) as Arc<dyn MediaProbe>)
        })
    }

    /// The registered recorder, if any
    pub(crate) fn recorder(&self) -> Option<Arc<dyn Recorder>> {
        self.collaborators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recorder
            .clone()
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: SystemEvent) {
        self.event_tx.send(event).ok();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::ScriptedClient;
    use crate::types::Protocol;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.persistence.database_path = dir.path().join("arenarr.db");
        config.import.root_folder = dir.path().join("library");
        config
    }

    #[tokio::test]
    async fn construction_opens_the_database_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_config(&dir)).await.unwrap();
        assert!(orchestrator.client_set().is_empty());

        // invalid config is refused before anything is opened
        let mut bad = test_config(&dir);
        bad.import.root_folder = std::path::PathBuf::new();
        assert!(Orchestrator::new(bad).await.is_err());
    }

    #[tokio::test]
    async fn client_registration_is_visible_to_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_config(&dir)).await.unwrap();
        orchestrator.register_download_client(Arc::new(ScriptedClient::new("qbit", Protocol::Torrent)));
        assert!(orchestrator.client_set().get("qbit").is_some());
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_config(&dir)).await.unwrap();
        let mut rx = orchestrator.subscribe();
        orchestrator.emit_event(SystemEvent::Shutdown);
        assert!(matches!(rx.try_recv().unwrap(), SystemEvent::Shutdown));
    }
}
