//! Manual queue controls.
//!
//! Operator-initiated pause/resume/remove on queue items, kept in sync
//! between the download client and the store. The monitor's next poll
//! reconciles anything the client reports differently.

use super::Orchestrator;
use crate::error::DownloadError;
use crate::types::{DownloadStatus, QueueItemId, SystemEvent};
use crate::{Error, Result};

impl Orchestrator {
    /// Pause a download in its client
    pub async fn pause_download(&self, id: QueueItemId) -> Result<()> {
        let item = self.queue_item(id).await?;
        let client = self.client_for(&item.client)?;
        client.pause(&item.download_id).await?;
        self.db.set_queue_status(id, DownloadStatus::Paused, None).await?;
        Ok(())
    }

    /// Resume a paused download in its client
    pub async fn resume_download(&self, id: QueueItemId) -> Result<()> {
        let item = self.queue_item(id).await?;
        let client = self.client_for(&item.client)?;
        client.resume(&item.download_id).await?;
        self.db.set_queue_status(id, DownloadStatus::Downloading, None).await?;
        Ok(())
    }

    /// Remove a download from its client and drop the queue item
    pub async fn remove_download(&self, id: QueueItemId, delete_files: bool) -> Result<()> {
        let item = self.queue_item(id).await?;
        if let Some(client) = self.client_set().get(&item.client) {
            if let Err(e) = client.remove(&item.download_id, delete_files).await {
                tracing::warn!(queue_id = %id, error = %e, "Client removal failed, dropping queue item anyway");
            }
        }
        self.db.delete_queue_item(id).await?;
        self.emit_event(SystemEvent::QueueItemRemoved { id });
        Ok(())
    }

    async fn queue_item(&self, id: QueueItemId) -> Result<crate::db::QueueItem> {
        self.db
            .get_queue_item(id)
            .await?
            .ok_or(Error::Download(DownloadError::NotFound { id: id.get() }))
    }

    fn client_for(&self, name: &str) -> Result<std::sync::Arc<dyn crate::clients::DownloadClient>> {
        self.client_set().get(name).ok_or_else(|| {
            Error::Download(DownloadError::ClientFailed {
                client: name.to_string(),
                operation: "lookup".to_string(),
                reason: "client not registered".to_string(),
            })
        })
    }
}
