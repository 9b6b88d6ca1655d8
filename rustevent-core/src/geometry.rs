//! Per-detector geometry parameters and the detector table.
//!
//! The table mirrors the columns of a detector table workspace: one row per
//! detector with its flight paths, scattering angle and energy settings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Detector identifier.
pub type DetectorId = i32;

/// Energy-transfer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EMode {
    /// No energy transfer.
    #[default]
    Elastic,
    /// Fixed incident energy.
    Direct,
    /// Fixed final energy.
    Indirect,
}

impl fmt::Display for EMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EMode::Elastic => "Elastic",
            EMode::Direct => "Direct",
            EMode::Indirect => "Indirect",
        };
        f.write_str(name)
    }
}

/// Geometric parameters of one detector pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Source-sample distance (m).
    pub l1: f64,
    /// Sample-detector distance (m).
    pub l2: f64,
    /// Scattering angle (radians).
    pub two_theta: f64,
    /// Fixed energy (meV), if known.
    #[serde(default)]
    pub efixed: Option<f64>,
    /// Energy-transfer mode.
    #[serde(default)]
    pub emode: EMode,
}

impl DetectorParams {
    /// Creates elastic parameters without a fixed energy.
    #[must_use]
    pub fn elastic(l1: f64, l2: f64, two_theta: f64) -> Self {
        Self {
            l1,
            l2,
            two_theta,
            efixed: None,
            emode: EMode::Elastic,
        }
    }

    /// Sets the energy mode and fixed energy.
    #[must_use]
    pub fn with_emode(mut self, emode: EMode, efixed: Option<f64>) -> Self {
        self.emode = emode;
        self.efixed = efixed;
        self
    }

    /// Total flight path `l1 + l2`.
    #[inline]
    #[must_use]
    pub fn total_flight_path(&self) -> f64 {
        self.l1 + self.l2
    }

    /// Returns efixed if it is set to a finite, positive energy.
    ///
    /// # Errors
    /// Returns [`Error::MissingEfixed`] naming `unit` otherwise.
    pub fn require_efixed(&self, unit: &'static str) -> Result<f64> {
        match self.efixed {
            Some(e) if e.is_finite() && e > 0.0 => Ok(e),
            _ => Err(Error::MissingEfixed { unit }),
        }
    }

    /// Checks the parameters describe a physical geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for non-finite values or negative distances.
    pub fn validate(&self) -> Result<()> {
        if !(self.l1.is_finite() && self.l2.is_finite() && self.two_theta.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite geometry: l1={}, l2={}, two_theta={}",
                self.l1, self.l2, self.two_theta
            )));
        }
        if self.l1 < 0.0 || self.l2 < 0.0 {
            return Err(Error::InvalidInput(format!(
                "negative flight path: l1={}, l2={}",
                self.l1, self.l2
            )));
        }
        Ok(())
    }
}

/// Source of per-detector parameters.
pub trait DetectorGeometry: Send + Sync {
    /// Looks up the parameters of one detector.
    ///
    /// # Errors
    /// Returns [`Error::DetectorNotFound`] if the detector is unknown.
    fn detector_params(&self, detector_id: DetectorId) -> Result<DetectorParams>;
}

/// In-memory detector table.
#[derive(Debug, Clone, Default)]
pub struct DetectorTable {
    rows: HashMap<DetectorId, DetectorParams>,
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
struct JsonTable {
    #[serde(default)]
    emode: Option<EMode>,
    #[serde(default)]
    efixed: Option<f64>,
    detectors: Vec<JsonRow>,
}

#[derive(Deserialize)]
struct JsonRow {
    detector_id: DetectorId,
    l1: f64,
    l2: f64,
    two_theta: f64,
    #[serde(default)]
    efixed: Option<f64>,
    #[serde(default)]
    emode: Option<EMode>,
}

impl DetectorTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row.
    ///
    /// # Errors
    /// Returns an error if the parameters fail validation.
    pub fn insert(&mut self, detector_id: DetectorId, params: DetectorParams) -> Result<()> {
        params.validate()?;
        self.rows.insert(detector_id, params);
        Ok(())
    }

    /// Builds a table from rows, validating each one. A later row replaces
    /// an earlier one with the same id.
    ///
    /// # Errors
    /// Returns an error if any row fails validation.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (DetectorId, DetectorParams)>,
    {
        let mut table = Self::new();
        for (detector_id, params) in rows {
            table.insert(detector_id, params)?;
        }
        Ok(table)
    }

    /// Number of detectors in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load a table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a row is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let json: JsonTable = serde_json::from_reader(BufReader::new(file))?;
        Self::from_json_table(json)
    }

    /// Load a table from a JSON string.
    ///
    /// Top-level `emode`/`efixed` apply to rows that do not set their own.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a row is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonTable = serde_json::from_str(json)?;
        Self::from_json_table(json)
    }

    fn from_json_table(json: JsonTable) -> Result<Self> {
        let mut table = Self::new();
        for row in json.detectors {
            if table.rows.contains_key(&row.detector_id) {
                return Err(Error::InvalidInput(format!(
                    "duplicate detector id {}",
                    row.detector_id
                )));
            }
            let params = DetectorParams {
                l1: row.l1,
                l2: row.l2,
                two_theta: row.two_theta,
                efixed: row.efixed.or(json.efixed),
                emode: row.emode.or(json.emode).unwrap_or_default(),
            };
            table.insert(row.detector_id, params)?;
        }
        Ok(table)
    }
}

impl DetectorGeometry for DetectorTable {
    fn detector_params(&self, detector_id: DetectorId) -> Result<DetectorParams> {
        self.rows
            .get(&detector_id)
            .copied()
            .ok_or(Error::DetectorNotFound(detector_id))
    }
}
