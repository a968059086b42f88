//! DVR auto-scheduling and import (C12)
//!
//! A periodic two-phase pass: league→channel scheduling first, then EPG
//! program matching for events still lacking a recording. Finished
//! recordings are probed, given a synthetic scene title, scored by the same
//! scorer as indexer releases, and imported into the same library — which is
//! what lets DVR captures and indexer grabs compete on equal terms.

pub mod epg;
pub mod probe;
pub mod recorder;
pub mod scheduler;
pub mod synth;

pub use probe::{CliMediaProbe, MediaProbe, ProbeResult};
pub use recorder::{Recorder, RecordingArtifact, RecordingRequest};
pub use scheduler::DvrScheduler;
pub use synth::synthetic_title;
