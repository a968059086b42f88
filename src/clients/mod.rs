//! Download client abstraction (C9)
//!
//! A uniform capability set over heterogeneous backends (torrent daemons, NZB
//! daemons). Each backend implements [`DownloadClient`]; the orchestrator
//! holds them in a [`ClientSet`] keyed by name and routed by protocol. There
//! is no base class with protected state — backends are plain adapter objects
//! behind the trait, the same shape the parity handlers use for external
//! tools.

use crate::error::{DownloadError, Error};
use crate::types::{NormalizedStatus, Protocol};
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Normalized status record returned by every backend
#[derive(Clone, Debug)]
pub struct ClientStatus {
    /// Backend status mapped onto the normalized vocabulary
    pub status: NormalizedStatus,
    /// Progress percentage [0, 100]
    pub progress: f64,
    /// Bytes downloaded so far
    pub downloaded: i64,
    /// Total size in bytes
    pub size: i64,
    /// Estimated time remaining, when the backend reports one
    pub time_remaining: Option<Duration>,
    /// Directory the backend saves into, when known
    pub save_path: Option<PathBuf>,
    /// Backend-reported error message, when failed/warning
    pub error_message: Option<String>,
}

/// The capability set every download-client backend must provide.
///
/// `status` returns `Ok(None)` when the backend no longer knows the download
/// id — the monitor counts consecutive not-found readings before dropping the
/// queue item. `find_by_title` lets the monitor follow identifier changes
/// under debrid proxies.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Unique client name (configuration key and queue-item link)
    fn name(&self) -> &str;

    /// Host identity used for remote path mapping (compared case-insensitively)
    fn host(&self) -> &str;

    /// Protocol this backend transfers
    fn protocol(&self) -> Protocol;

    /// Verify connectivity and credentials
    async fn test(&self) -> Result<()>;

    /// Hand a payload URL (or magnet) to the backend; returns the backend's
    /// download id
    async fn add_by_url(&self, url: &str, category: Option<&str>) -> Result<String>;

    /// Normalized status for a download id; `Ok(None)` when unknown to the backend
    async fn status(&self, id: &str) -> Result<Option<ClientStatus>>;

    /// Remove a download, optionally deleting its files
    async fn remove(&self, id: &str, delete_files: bool) -> Result<()>;

    /// Pause a download
    async fn pause(&self, id: &str) -> Result<()>;

    /// Resume a paused download
    async fn resume(&self, id: &str) -> Result<()>;

    /// Locate a download by title within a category; used to follow id
    /// changes under debrid proxies
    async fn find_by_title(
        &self,
        title: &str,
        category: Option<&str>,
    ) -> Result<Option<(String, ClientStatus)>>;
}

/// The set of registered download clients
#[derive(Clone, Default)]
pub struct ClientSet {
    clients: Vec<Arc<dyn DownloadClient>>,
}

impl ClientSet {
    /// Empty set
    pub fn new() -> Self {
        Self { clients: Vec::new() }
    }

    /// Register a backend. Later registrations with the same protocol act as
    /// fallbacks; the first registered client for a protocol is preferred.
    pub fn register(&mut self, client: Arc<dyn DownloadClient>) {
        tracing::info!(client = client.name(), protocol = %client.protocol(), "Registered download client");
        self.clients.push(client);
    }

    /// Look up a client by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DownloadClient>> {
        self.clients.iter().find(|c| c.name() == name).cloned()
    }

    /// First registered client handling the given protocol
    pub fn for_protocol(&self, protocol: Protocol) -> Result<Arc<dyn DownloadClient>> {
        self.clients
            .iter()
            .find(|c| c.protocol() == protocol)
            .cloned()
            .ok_or_else(|| {
                Error::Download(DownloadError::NoClientForProtocol {
                    protocol: protocol.as_str().to_string(),
                })
            })
    }

    /// Whether any client is registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::test_support::ScriptedClient;
    use super::*;

    #[tokio::test]
    async fn client_set_routes_by_protocol() {
        let mut set = ClientSet::new();
        set.register(Arc::new(ScriptedClient::new("qbit", Protocol::Torrent)));
        set.register(Arc::new(ScriptedClient::new("sab", Protocol::Usenet)));

        assert_eq!(set.for_protocol(Protocol::Torrent).unwrap().name(), "qbit");
        assert_eq!(set.for_protocol(Protocol::Usenet).unwrap().name(), "sab");
    }

    #[tokio::test]
    async fn missing_protocol_is_a_typed_error() {
        let set = ClientSet::new();
        let result = set.for_protocol(Protocol::Torrent);
        assert!(matches!(
            result,
            Err(Error::Download(DownloadError::NoClientForProtocol { .. }))
        ));
    }

    #[tokio::test]
    async fn first_registered_client_wins_for_a_protocol() {
        let mut set = ClientSet::new();
        set.register(Arc::new(ScriptedClient::new("primary", Protocol::Torrent)));
        set.register(Arc::new(ScriptedClient::new("fallback", Protocol::Torrent)));
        assert_eq!(set.for_protocol(Protocol::Torrent).unwrap().name(), "primary");
    }

    #[tokio::test]
    async fn lookup_by_name() {
        let mut set = ClientSet::new();
        set.register(Arc::new(ScriptedClient::new("qbit", Protocol::Torrent)));
        assert!(set.get("qbit").is_some());
        assert!(set.get("nope").is_none());
    }
}
