//! rustevent-core: Core types for event-mode neutron data reduction.
//!
//! This crate provides the shared vocabulary of the workspace: timestamps,
//! events, event workspaces, detector geometry, progress reporting and the
//! error taxonomy used by unit conversion and event filtering.
//!

pub mod constants;
pub mod error;
pub mod event;
pub mod geometry;
pub mod progress;
pub mod workspace;

pub use error::{Error, Result, SpectrumError};
pub use event::{DateAndTime, Event};
pub use geometry::{DetectorGeometry, DetectorId, DetectorParams, DetectorTable, EMode};
pub use progress::{CancellationToken, NoProgress, ProgressReporter, SpectrumProgress};
pub use workspace::{EventList, EventWorkspace, Histogram, TOF_UNIT};
