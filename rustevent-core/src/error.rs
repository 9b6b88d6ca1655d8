//! Error types for rustevent-core.

use crate::geometry::{DetectorId, EMode};
use thiserror::Error;

/// Result type alias for rustevent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by unit conversion and event filtering.
#[derive(Error, Debug)]
pub enum Error {
    /// A unit needs a fixed energy the detector parameters do not provide.
    #[error("unit {unit} requires efixed but none is set")]
    MissingEfixed { unit: &'static str },

    /// Geometry lookup failed for a detector.
    #[error("detector {0} not found")]
    DetectorNotFound(DetectorId),

    /// Unit name does not resolve to a registered unit.
    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    /// Splitter intervals are unsorted, overlapping or degenerate.
    #[error("malformed splitters: {0}")]
    MalformedSplitters(String),

    /// The unit cannot be used with the given energy mode.
    #[error("unit {unit} cannot be used in {emode} mode")]
    InvalidEMode { unit: &'static str, emode: EMode },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Input data failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for failures confined to a single spectrum.
    ///
    /// Drivers mask the affected spectrum and continue; every other error
    /// aborts the whole operation.
    #[must_use]
    pub fn is_spectrum_local(&self) -> bool {
        matches!(
            self,
            Error::MissingEfixed { .. } | Error::DetectorNotFound(_) | Error::InvalidEMode { .. }
        )
    }
}

/// A per-spectrum failure recorded by a driver instead of aborting.
#[derive(Debug)]
pub struct SpectrumError {
    /// Workspace index of the spectrum.
    pub index: usize,
    /// Detector the spectrum is attached to.
    pub detector_id: DetectorId,
    /// What went wrong.
    pub error: Error,
}

impl std::fmt::Display for SpectrumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "spectrum {} (detector {}): {}",
            self.index, self.detector_id, self.error
        )
    }
}
