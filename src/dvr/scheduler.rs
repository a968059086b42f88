//! DVR scheduler (C12)
//!
//! Periodic two-phase pass:
//!
//! 1. **league→channel** — events inside the scheduling window whose league
//!    maps to an IPTV channel get a recording slot (event time ± padding).
//!    Recordings whose event has passed, lost its monitored flag, or been
//!    deleted are cancelled.
//! 2. **EPG matching** — events still lacking a recording are scored against
//!    the guide slice; matching programs drive recordings with program times,
//!    padded.
//!
//! Due recordings are dispatched to the recorder; finished ones are probed,
//! given a synthetic scene title, scored, and imported like any release.

use super::epg;
use super::probe::MediaProbe;
use super::recorder::{Recorder, RecordingRequest};
use super::synth::synthetic_title;
use crate::config::Config;
use crate::db::{Channel, Database, NewRecording, Recording, SportEvent};
use crate::importer::Importer;
use crate::types::{EventId, FileSource, RecordingId, RecordingStatus, SystemEvent};
use crate::utils::sanitize_filename;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The DVR scheduler worker
pub struct DvrScheduler {
    config: Arc<Config>,
    db: Arc<Database>,
    importer: Importer,
    probe: Arc<dyn MediaProbe>,
    recorder: Arc<dyn Recorder>,
    events_tx: broadcast::Sender<SystemEvent>,
    cancel: CancellationToken,
}

impl DvrScheduler {
    /// Create the worker over shared components
    pub fn new(
        config: Arc<Config>,
        db: Arc<Database>,
        importer: Importer,
        probe: Arc<dyn MediaProbe>,
        recorder: Arc<dyn Recorder>,
        events_tx: broadcast::Sender<SystemEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, db, importer, probe, recorder, events_tx, cancel }
    }

    /// Run until cancelled
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.config.dvr.pass_interval.as_secs(),
            "DVR scheduler started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.pass_once().await {
                warn!(error = %e, "DVR pass failed");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.dvr.pass_interval) => {}
            }
        }

        info!("DVR scheduler stopped");
    }

    /// One full scheduling pass
    pub async fn pass_once(self: &Arc<Self>) -> crate::Result<()> {
        self.cancel_stale_recordings().await?;
        self.schedule_by_league().await?;
        self.schedule_by_epg().await?;
        self.dispatch_due_recordings().await?;
        self.finish_overdue_recordings().await?;
        self.import_completed_recordings().await?;
        Ok(())
    }

    /// Cancel recordings whose event passed long ago, lost its monitored
    /// flag, or was deleted. One-off captures (no event link) are never
    /// auto-cancelled.
    async fn cancel_stale_recordings(&self) -> crate::Result<()> {
        let now = Utc::now().timestamp();
        let cutoff = self.config.dvr.stale_cutoff.as_secs() as i64;

        for status in [RecordingStatus::Scheduled, RecordingStatus::Recording] {
            for recording in self.db.list_recordings_by_status(status).await? {
                let Some(event_id) = recording.event_id else {
                    continue;
                };
                let reason = match self.db.get_event(EventId(event_id)).await? {
                    None => Some("event deleted"),
                    Some(event) if event.monitored == 0 => Some("event no longer monitored"),
                    Some(event) if event.event_date + cutoff < now => Some("event has passed"),
                    Some(_) => None,
                };
                if let Some(reason) = reason {
                    info!(recording_id = recording.id, reason = reason, "Cancelling recording");
                    self.db
                        .set_recording_status(
                            RecordingId(recording.id),
                            RecordingStatus::Cancelled,
                            Some(reason),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// The scheduling window as unix timestamps
    fn window(&self) -> (i64, i64) {
        let now = Utc::now().timestamp();
        let days = i64::from(self.config.dvr.scheduling_window_days);
        (now, now + days * 86_400)
    }

    /// Phase 1: league → channel
    async fn schedule_by_league(&self) -> crate::Result<()> {
        let (from, to) = self.window();
        let events = self.db.list_events_in_window(from, to).await?;

        for event in events {
            if self.cancel.is_cancelled() {
                break;
            }
            if event.has_file == 1 {
                continue;
            }
            if self.db.has_pending_recording(EventId(event.id), None).await? {
                continue;
            }
            let Some(league) = event.league.as_deref() else {
                continue;
            };
            let Some(channel) = self.db.best_channel_for_league(league).await? else {
                continue;
            };

            let start = event.event_date - self.config.dvr.pre_padding.as_secs() as i64;
            let end = event.event_date
                + self.config.dvr.default_event_duration.as_secs() as i64
                + self.config.dvr.post_padding.as_secs() as i64;

            self.create_recording(&event, &channel, start, end).await?;
        }
        Ok(())
    }

    /// Phase 2: EPG program matching for events still lacking a recording
    async fn schedule_by_epg(&self) -> crate::Result<()> {
        let (from, to) = self.window();
        let events = self.db.list_events_in_window(from, to).await?;

        let mut unscheduled = Vec::new();
        for event in events {
            if event.has_file == 1 {
                continue;
            }
            if !self.db.has_pending_recording(EventId(event.id), None).await? {
                unscheduled.push(event);
            }
        }
        if unscheduled.is_empty() {
            return Ok(());
        }

        // the slice is start-bounded by the window; tolerance covers the edges
        let tolerance = self.config.dvr.epg_time_tolerance.as_secs() as i64;
        let programs = self.db.list_epg_programs_in_window(from - tolerance, to).await?;
        if programs.is_empty() {
            return Ok(());
        }

        let matches = epg::match_events_to_programs(
            &unscheduled,
            &programs,
            self.config.dvr.epg_time_tolerance,
            self.config.dvr.min_match_score,
        );

        for (event, program, score) in matches {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(channel) = self.db.get_channel_by_tvg(&program.channel_tvg_id).await? else {
                debug!(tvg_id = %program.channel_tvg_id, "EPG match has no known channel");
                continue;
            };

            let (program_start, program_end) = epg::program_window(program);
            let start = program_start.timestamp() - self.config.dvr.pre_padding.as_secs() as i64;
            let end = program_end.timestamp() + self.config.dvr.post_padding.as_secs() as i64;

            info!(
                event = %event.title,
                program = %program.title,
                score = score,
                channel = %channel.name,
                "Scheduling recording from EPG match"
            );
            self.create_recording(event, &channel, start, end).await?;
        }
        Ok(())
    }

    async fn create_recording(
        &self,
        event: &SportEvent,
        channel: &Channel,
        start: i64,
        end: i64,
    ) -> crate::Result<()> {
        let date = Utc
            .timestamp_opt(event.event_date, 0)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d");
        let output_path = self
            .config
            .dvr
            .recordings_dir
            .join(format!("{} ({date}).ts", sanitize_filename(&event.title)));

        let recording_id = self
            .db
            .insert_recording(&NewRecording {
                event_id: Some(EventId(event.id)),
                part_id: None,
                channel_id: channel.id,
                scheduled_start: start,
                scheduled_end: end,
                output_path: output_path.display().to_string(),
            })
            .await?;

        self.db
            .record_history(
                Some(EventId(event.id)),
                "recording_scheduled",
                &event.title,
                Some(&channel.name),
            )
            .await?;
        let _ = self.events_tx.send(SystemEvent::RecordingScheduled {
            id: recording_id,
            event_id: Some(EventId(event.id)),
            channel: channel.name.clone(),
        });

        info!(
            recording_id = %recording_id,
            event = %event.title,
            channel = %channel.name,
            "Recording scheduled"
        );
        Ok(())
    }

    /// Dispatch recordings whose start time has arrived
    async fn dispatch_due_recordings(self: &Arc<Self>) -> crate::Result<()> {
        let now = Utc::now().timestamp();
        for recording in self.db.list_recordings_by_status(RecordingStatus::Scheduled).await? {
            if recording.scheduled_start > now {
                continue;
            }
            if recording.scheduled_end <= now {
                // the whole window passed while we were not running
                self.db
                    .set_recording_status(
                        RecordingId(recording.id),
                        RecordingStatus::Failed,
                        Some("recording window passed before dispatch"),
                    )
                    .await?;
                continue;
            }

            // guarded: only one worker dispatches this recording
            if !self
                .db
                .transition_recording_status(
                    RecordingId(recording.id),
                    RecordingStatus::Scheduled,
                    RecordingStatus::Recording,
                )
                .await?
            {
                continue;
            }

            let Some(channel) = self.db.get_channel(recording.channel_id).await? else {
                self.db
                    .set_recording_status(
                        RecordingId(recording.id),
                        RecordingStatus::Failed,
                        Some("channel deleted"),
                    )
                    .await?;
                continue;
            };

            self.db
                .set_recording_started(RecordingId(recording.id), now)
                .await?;
            let _ = self
                .events_tx
                .send(SystemEvent::RecordingStarted { id: RecordingId(recording.id) });

            let request = RecordingRequest {
                channel_stream_url: channel.stream_url.clone(),
                start_at: Utc.timestamp_opt(recording.scheduled_start, 0).single().unwrap_or_else(Utc::now),
                end_at: Utc.timestamp_opt(recording.scheduled_end, 0).single().unwrap_or_else(Utc::now),
                output_path: recording.output_path.clone().into(),
                encoding_profile: self.config.dvr.encoding_profile.clone(),
            };

            let this = self.clone();
            let recording_id = RecordingId(recording.id);
            tokio::spawn(async move {
                // transient dispatch hiccups retry; a real recorder failure
                // surfaces on the recording row
                let capture = crate::retry::with_retry(&this.config.retry, || {
                    this.recorder.record(request.clone())
                });
                tokio::select! {
                    _ = this.cancel.cancelled() => {
                        debug!(recording_id = %recording_id, "Recorder task cancelled by shutdown");
                    }
                    result = capture => {
                        if let Err(e) = this.finish_dispatch(recording_id, result).await {
                            warn!(recording_id = %recording_id, error = %e, "Failed to record capture outcome");
                        }
                    }
                }
            });
        }
        Ok(())
    }

    /// Record the recorder's outcome for a dispatched capture
    async fn finish_dispatch(
        &self,
        recording_id: RecordingId,
        result: crate::Result<super::recorder::RecordingArtifact>,
    ) -> crate::Result<()> {
        match result {
            Ok(artifact) => {
                self.db
                    .set_recording_finished(recording_id, artifact.ended_at.timestamp(), artifact.size)
                    .await?;
                let moved = self
                    .db
                    .transition_recording_status(
                        recording_id,
                        RecordingStatus::Recording,
                        RecordingStatus::Completed,
                    )
                    .await?;
                if moved {
                    info!(recording_id = %recording_id, size = artifact.size, "Recording finished");
                }
            }
            Err(e) => {
                warn!(recording_id = %recording_id, error = %e, "Recorder failed");
                self.db
                    .set_recording_status(recording_id, RecordingStatus::Failed, Some(&e.to_string()))
                    .await?;
                let _ = self.events_tx.send(SystemEvent::RecordingFailed {
                    id: recording_id,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Convergence for recorder restarts: a Recording row past its window
    /// either has an output file (→ Completed) or has failed.
    async fn finish_overdue_recordings(&self) -> crate::Result<()> {
        let now = Utc::now().timestamp();
        for recording in self.db.list_recordings_by_status(RecordingStatus::Recording).await? {
            if recording.scheduled_end > now {
                continue;
            }
            let path = std::path::Path::new(&recording.output_path);
            let size = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);
            if size > 0 {
                self.db
                    .set_recording_finished(RecordingId(recording.id), now, size)
                    .await?;
                self.db
                    .transition_recording_status(
                        RecordingId(recording.id),
                        RecordingStatus::Recording,
                        RecordingStatus::Completed,
                    )
                    .await?;
                debug!(recording_id = recording.id, "Overdue recording converged to completed");
            } else {
                self.db
                    .set_recording_status(
                        RecordingId(recording.id),
                        RecordingStatus::Failed,
                        Some("recorder produced no output"),
                    )
                    .await?;
                let _ = self.events_tx.send(SystemEvent::RecordingFailed {
                    id: RecordingId(recording.id),
                    error: "recorder produced no output".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Probe, score and import finished recordings
    async fn import_completed_recordings(&self) -> crate::Result<()> {
        for recording in self.db.list_recordings_by_status(RecordingStatus::Completed).await? {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.import_recording(&recording).await {
                warn!(recording_id = recording.id, error = %e, "Recording import failed");
                self.db
                    .set_recording_status(
                        RecordingId(recording.id),
                        RecordingStatus::Failed,
                        Some(&e.to_string()),
                    )
                    .await?;
                let _ = self.events_tx.send(SystemEvent::RecordingFailed {
                    id: RecordingId(recording.id),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn import_recording(&self, recording: &Recording) -> crate::Result<()> {
        let recording_id = RecordingId(recording.id);
        let path = std::path::PathBuf::from(&recording.output_path);

        let Some(event_id) = recording.event_id else {
            // one-off capture: probe for the record, no library import
            let probe = self.probe.probe(&path).await?;
            let label = format!("{}x{}", probe.width, probe.height);
            self.db.set_recording_probe(recording_id, &label, 0, 0).await?;
            self.db
                .set_recording_status(recording_id, RecordingStatus::Imported, None)
                .await?;
            return Ok(());
        };

        let event = self
            .db
            .get_event(EventId(event_id))
            .await?
            .ok_or_else(|| crate::Error::NotFound(format!("event {event_id}")))?;

        let probe = self.probe.probe(&path).await?;
        let year = crate::cache::event_year(&event);
        let title = synthetic_title(&event.title, year, &probe);
        debug!(recording_id = recording.id, synthetic = %title, "Scoring recording");

        let part = match recording.part_id {
            Some(part_id) => self.db.get_event_part(part_id).await?,
            None => None,
        };

        let outcome = self
            .importer
            .import_artifact(&event, part.as_ref(), &path, &title, FileSource::Iptv)
            .await?;

        // recompute through the recording row so operators see the scores
        let profile = match event.quality_profile_id {
            Some(id) => self.db.load_profile(id).await?,
            None => None,
        };
        let custom_formats = self.db.load_custom_formats().await?;
        let parsed = crate::title::parse_title(&title);
        let breakdown = crate::scoring::score_release(
            &title,
            &parsed,
            recording.file_size.map(|s| s as u64),
            profile.as_ref(),
            &custom_formats,
        );
        self.db
            .set_recording_probe(
                recording_id,
                &outcome.quality_label,
                i64::from(breakdown.quality_score),
                i64::from(breakdown.format_score),
            )
            .await?;

        self.db
            .set_recording_status(recording_id, RecordingStatus::Imported, None)
            .await?;
        self.db
            .record_history(
                Some(EventId(event.id)),
                "recording_imported",
                &title,
                Some(&outcome.library_path.display().to_string()),
            )
            .await?;
        let _ = self.events_tx.send(SystemEvent::RecordingImported {
            id: recording_id,
            path: outcome.library_path.clone(),
        });
        let _ = self.events_tx.send(SystemEvent::Imported {
            event_id: EventId(event.id),
            path: outcome.library_path,
            source: FileSource::Iptv,
        });

        info!(recording_id = recording.id, event = %event.title, "Recording imported");
        Ok(())
    }
}
