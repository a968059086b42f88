//! Importer (C11)
//!
//! Translates a completed download's remote path into a local one, picks the
//! primary media file, places it into the library (hardlink when possible,
//! copy otherwise), and records the event file. The whole sequence is safe to
//! retry after a crash: the destination-exists check is the idempotency
//! guard, and a retry that finds the destination occupied returns the
//! already-recorded file row instead of copying again.

use crate::config::{Config, RemotePathMapping};
use crate::db::{Database, EventPart, NewEventFile, QueueItem, SportEvent};
use crate::error::{Error, ImportError};
use crate::scoring;
use crate::title::parse_title;
use crate::types::{EventId, FileSource};
use crate::utils::{has_video_extension, sanitize_filename};
use crate::Result;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// What an import produced
#[derive(Clone, Debug)]
pub struct ImportOutcome {
    /// Final library path
    pub library_path: PathBuf,
    /// Canonical quality label recorded on the file
    pub quality_label: String,
    /// Event file row id
    pub file_id: i64,
}

/// Translate a remote path through the user's mapping table.
///
/// The longest matching `remote_path` prefix wins, compared component-wise;
/// a mapping whose host does not match (case-insensitively) is skipped
/// entirely. With no matching mapping the path passes through unchanged
/// (a local download client).
pub fn map_remote_path(host: &str, remote: &Path, mappings: &[RemotePathMapping]) -> PathBuf {
    let mut best: Option<(&RemotePathMapping, usize)> = None;
    for mapping in mappings {
        if !mapping.host.eq_ignore_ascii_case(host) {
            continue;
        }
        let prefix_len = mapping.remote_path.components().count();
        if remote.starts_with(&mapping.remote_path) {
            if best.map(|(_, len)| prefix_len > len).unwrap_or(true) {
                best = Some((mapping, prefix_len));
            }
        }
    }

    match best {
        Some((mapping, _)) => {
            let suffix = remote.strip_prefix(&mapping.remote_path).unwrap_or(remote);
            mapping.local_path.join(suffix)
        }
        None => remote.to_path_buf(),
    }
}

/// Find the primary media file under a path: the path itself when it is a
/// video file, otherwise the largest video file below it.
pub fn pick_primary_video(path: &Path, extensions: &[String]) -> Result<PathBuf> {
    if path.is_file() {
        if has_video_extension(path, extensions) {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Import(ImportError::NoVideoFile { path: path.to_path_buf() }));
    }
    if !path.is_dir() {
        return Err(Error::Import(ImportError::PathMissing { path: path.to_path_buf() }));
    }

    let mut best: Option<(PathBuf, u64)> = None;
    for entry in WalkDir::new(path).follow_links(false).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_video_extension(entry.path(), extensions) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if best.as_ref().map(|(_, s)| size > *s).unwrap_or(true) {
            best = Some((entry.path().to_path_buf(), size));
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| Error::Import(ImportError::NoVideoFile { path: path.to_path_buf() }))
}

/// Compose the library destination:
/// `{root}/{league}/{event}/{league} - {title} ({yyyy-MM-dd})[ - {part}].{ext}`
fn compose_destination(
    root: &Path,
    event: &SportEvent,
    part_name: Option<&str>,
    extension: &str,
) -> PathBuf {
    let league = sanitize_filename(event.league.as_deref().unwrap_or("Events"));
    let title = sanitize_filename(&event.title);
    let date = Utc
        .timestamp_opt(event.event_date, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d");

    let filename = match part_name {
        Some(part) => format!("{league} - {title} ({date}) - {}.{extension}", sanitize_filename(part)),
        None => format!("{league} - {title} ({date}).{extension}"),
    };

    root.join(league).join(title).join(filename)
}

/// Whether two paths live on the same filesystem (hardlink capability)
#[cfg(unix)]
fn same_volume(source: &Path, dest_dir: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(source), std::fs::metadata(dest_dir)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_volume(_source: &Path, _dest_dir: &Path) -> bool {
    // without a reliable check, copying is always correct
    false
}

/// The import pipeline
#[derive(Clone)]
pub struct Importer {
    db: Arc<Database>,
    config: Arc<Config>,
}

impl Importer {
    /// Create an importer over the shared database and configuration
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Import a completed download for an event.
    ///
    /// `host` is the originating client's host identity (for path mapping);
    /// `save_path` is the directory the client reports having saved into.
    pub async fn import_completed_download(
        &self,
        item: &QueueItem,
        event: &SportEvent,
        host: &str,
        save_path: Option<&Path>,
    ) -> Result<ImportOutcome> {
        let remote = save_path.ok_or_else(|| {
            Error::Import(ImportError::PathMissing { path: PathBuf::from("<no save path>") })
        })?;

        let local = map_remote_path(host, remote, &self.config.import.remote_mappings);
        debug!(remote = %remote.display(), local = %local.display(), "Mapped completed download path");

        // clients usually save into a per-release folder under the save path
        let content = {
            let candidate = local.join(&item.title);
            if candidate.exists() { candidate } else { local }
        };

        let source = pick_primary_video(&content, &self.config.import.video_extensions)?;

        let part = match item.part_id {
            Some(part_id) => self.db.get_event_part(part_id).await?,
            None => None,
        };

        self.import_artifact(
            event,
            part.as_ref(),
            &source,
            &item.title,
            FileSource::Indexer,
        )
        .await
    }

    /// Place a media file into the library and record it for the event.
    ///
    /// Shared by the download path and the DVR path: `title_for_scoring` is
    /// the release title (or the DVR's synthetic title) the scorer runs on.
    pub async fn import_artifact(
        &self,
        event: &SportEvent,
        part: Option<&EventPart>,
        source: &Path,
        title_for_scoring: &str,
        file_source: FileSource,
    ) -> Result<ImportOutcome> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mkv")
            .to_ascii_lowercase();
        let destination = compose_destination(
            &self.config.import.root_folder,
            event,
            part.map(|p| p.name.as_str()),
            &extension,
        );

        let parsed = parse_title(title_for_scoring);
        let quality_label = parsed.quality.label();

        if destination.exists() {
            // a retried import finds its own previous work: same row, no copy
            if let Some(existing) = self
                .db
                .find_event_file_by_path(&destination.display().to_string())
                .await?
            {
                debug!(path = %destination.display(), "Destination already imported, returning existing row");
                return Ok(ImportOutcome {
                    library_path: destination,
                    quality_label: existing.quality_label,
                    file_id: existing.id,
                });
            }
            return Err(Error::Import(ImportError::DestinationExists { path: destination }));
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Import(ImportError::PlacementFailed {
                    src_path: source.to_path_buf(),
                    dest: destination.clone(),
                    reason: format!("failed to create library folder: {e}"),
                })
            })?;
        }

        self.place(source, &destination)?;

        let size = std::fs::metadata(&destination).map(|m| m.len() as i64).unwrap_or(0);

        let profile = match event.quality_profile_id {
            Some(id) => self.db.load_profile(id).await?,
            None => None,
        };
        let custom_formats = self.db.load_custom_formats().await?;
        let breakdown = scoring::score_release(
            title_for_scoring,
            &parsed,
            (size > 0).then_some(size as u64),
            profile.as_ref(),
            &custom_formats,
        );

        let file_id = self
            .db
            .insert_event_file(&NewEventFile {
                event_id: EventId(event.id),
                part_name: part.map(|p| p.name.clone()),
                path: destination.display().to_string(),
                size,
                quality_label: quality_label.clone(),
                quality_score: i64::from(breakdown.quality_score),
                format_score: i64::from(breakdown.format_score),
                source: file_source.as_str().to_string(),
                codec: parsed.quality.codec.map(|c| c.as_str().to_string()),
            })
            .await?;

        if part.is_none() {
            self.db
                .set_event_file(EventId(event.id), &destination.display().to_string())
                .await?;
        }

        info!(
            event_id = event.id,
            path = %destination.display(),
            quality = %quality_label,
            source = file_source.as_str(),
            "Imported event file"
        );

        Ok(ImportOutcome { library_path: destination, quality_label, file_id })
    }

    /// Hardlink when configured and possible, copy otherwise
    fn place(&self, source: &Path, destination: &Path) -> Result<()> {
        let dest_dir = destination.parent().unwrap_or(destination);
        if self.config.import.use_hardlinks && same_volume(source, dest_dir) {
            match std::fs::hard_link(source, destination) {
                Ok(()) => {
                    debug!(source = %source.display(), dest = %destination.display(), "Hardlinked into library");
                    return Ok(());
                }
                Err(e) => {
                    debug!(error = %e, "Hardlink failed, falling back to copy");
                }
            }
        }

        std::fs::copy(source, destination).map_err(|e| {
            Error::Import(ImportError::PlacementFailed {
                src_path: source.to_path_buf(),
                dest: destination.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        Ok(())
    }
}
