//! # arenarr
//!
//! Backend library for automated sports-media acquisition.
//!
//! Users declare interest in sporting events (fights, races, matches); the
//! orchestrator continuously discovers releases over Torznab/Newznab
//! indexers, selects the best candidate by quality profile and custom-format
//! scores, hands it to a download client, tracks the download to completion,
//! imports the finished file into the library — and, as a fallback or
//! complement, records live broadcasts off IPTV channels and imports those
//! through the same scoring pipeline.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Store-coordinated** - Workers share state only through SQLite; a
//!   restart resumes exactly where the store says things stand
//! - **Quota-aware** - Indexers are scarce: RSS-first discovery, a release
//!   cache, hourly query/grab budgets and a failure backoff ladder
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use arenarr::{Config, Orchestrator, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let orchestrator = Orchestrator::new(config).await?;
//!
//!     // register download clients / recorder here, then:
//!     orchestrator.start_background_services().await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     run_with_shutdown(orchestrator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Release cache (RSS-first discovery store)
pub mod cache;
/// Download client abstraction
pub mod clients;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// RSS discovery worker
pub mod discovery;
/// DVR scheduling, EPG matching, probing and synthetic titles
pub mod dvr;
/// Error types
pub mod error;
/// Indexer health model and rate limiter
pub mod health;
/// Import pipeline (path mapping, hardlink/copy, library placement)
pub mod importer;
/// Indexer client abstraction (Torznab/Newznab)
pub mod indexer;
/// Release ↔ event validation
pub mod matching;
/// Download lifecycle monitor
pub mod monitor;
/// The orchestrator: construction, services, lifecycle
pub mod orchestrator;
/// Event search planner
pub mod planner;
/// Retry logic with exponential backoff
pub mod retry;
/// Quality and custom-format scoring
pub mod scoring;
/// Release title parsing
pub mod title;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use clients::{ClientSet, ClientStatus, DownloadClient};
pub use config::{Config, IndexerConfig, RemotePathMapping};
pub use db::Database;
pub use dvr::{CliMediaProbe, MediaProbe, ProbeResult, Recorder, RecordingArtifact, RecordingRequest};
pub use error::{
    DatabaseError, DownloadError, DvrError, Error, ImportError, IndexerError, Result,
};
pub use orchestrator::Orchestrator;
pub use scoring::{CustomFormat, QualityProfile};
pub use title::{parse_title, ParsedTitle};
pub use types::{
    DownloadStatus, EventId, NormalizedStatus, Protocol, QueueItemId, RecordingId,
    RecordingStatus, SystemEvent,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(orchestrator: Orchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
