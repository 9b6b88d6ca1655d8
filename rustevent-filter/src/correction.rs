//! Per-detector TOF corrections applied before comparing full event times.
//!
//! A correction maps an event to `pulse + (tof * factor + shift)` µs, the
//! instant the neutron passed the point of interest (usually the sample).

use rustevent_core::constants::energy_flight_time;
use rustevent_core::{DateAndTime, DetectorGeometry, DetectorId, Error, Event, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Affine TOF correction for one detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TofCorrection {
    /// Multiplies the event TOF.
    pub factor: f64,
    /// Added after scaling, in µs.
    #[serde(default)]
    pub shift: f64,
}

impl TofCorrection {
    /// Uses the raw TOF.
    pub const IDENTITY: Self = Self {
        factor: 1.0,
        shift: 0.0,
    };

    /// Creates a correction.
    #[must_use]
    pub const fn new(factor: f64, shift: f64) -> Self {
        Self { factor, shift }
    }

    /// Corrected absolute time of `event`, or `None` if it cannot be
    /// represented (non-finite or out-of-range TOF).
    #[inline]
    #[must_use]
    pub fn apply(&self, event: &Event) -> Option<DateAndTime> {
        event.full_time(self.factor, self.shift)
    }

    fn validate(&self, detector_id: DetectorId) -> Result<()> {
        if self.factor.is_finite() && self.shift.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "non-finite TOF correction for detector {detector_id}"
            )))
        }
    }
}

impl Default for TofCorrection {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// User supplied corrections keyed by detector id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionTable {
    rows: HashMap<DetectorId, TofCorrection>,
}

#[derive(Deserialize)]
struct JsonCorrections {
    corrections: Vec<JsonCorrectionRow>,
}

#[derive(Deserialize)]
struct JsonCorrectionRow {
    detector_id: DetectorId,
    factor: f64,
    #[serde(default)]
    shift: f64,
}

impl CorrectionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the correction for a detector.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if factor or shift is not finite.
    pub fn insert(&mut self, detector_id: DetectorId, correction: TofCorrection) -> Result<()> {
        correction.validate(detector_id)?;
        self.rows.insert(detector_id, correction);
        Ok(())
    }

    /// Correction for a detector.
    ///
    /// # Errors
    /// Returns [`Error::DetectorNotFound`] if the table has no row for it.
    pub fn get(&self, detector_id: DetectorId) -> Result<TofCorrection> {
        self.rows
            .get(&detector_id)
            .copied()
            .ok_or(Error::DetectorNotFound(detector_id))
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a row is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let json: JsonCorrections = serde_json::from_reader(BufReader::new(file))?;
        Self::from_json_rows(json)
    }

    /// Load from `{"corrections": [{"detector_id", "factor", "shift"?}]}`.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed, an id repeats or a value is not finite.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonCorrections = serde_json::from_str(json)?;
        Self::from_json_rows(json)
    }

    fn from_json_rows(json: JsonCorrections) -> Result<Self> {
        let mut table = Self::new();
        for row in json.corrections {
            if table.rows.contains_key(&row.detector_id) {
                return Err(Error::InvalidInput(format!(
                    "duplicate correction for detector {}",
                    row.detector_id
                )));
            }
            table.insert(row.detector_id, TofCorrection::new(row.factor, row.shift))?;
        }
        Ok(table)
    }
}

/// How the TOF correction for each detector is obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CorrectionMode {
    /// Raw TOF, factor 1.
    #[default]
    None,
    /// Time at the sample for elastic scattering, factor `l1 / (l1 + l2)`.
    Elastic,
    /// Time at the sample for a direct geometry instrument.
    ///
    /// Every neutron reaches the sample `l1 / v_i` after the pulse, so the
    /// event TOF is ignored.
    Direct {
        /// Incident energy in meV.
        incident_energy: f64,
    },
    /// Time at the sample for an indirect geometry instrument: the TOF less
    /// the secondary flight time `l2 / v_f` at the detector's efixed.
    Indirect,
    /// Explicit per-detector corrections.
    Customized(CorrectionTable),
}

impl CorrectionMode {
    /// Returns true if corrections are computed from detector geometry.
    #[must_use]
    pub fn needs_geometry(&self) -> bool {
        matches!(self, Self::Elastic | Self::Direct { .. } | Self::Indirect)
    }

    /// Checks settings that apply to every detector.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for a non-positive incident energy.
    pub fn validate(&self) -> Result<()> {
        if let Self::Direct { incident_energy } = self {
            if !(incident_energy.is_finite() && *incident_energy > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "incident energy must be positive, got {incident_energy}"
                )));
            }
        }
        Ok(())
    }

    /// Correction for one detector.
    ///
    /// # Errors
    /// Returns a spectrum-local error when the detector is unknown or lacks
    /// efixed, and [`Error::InvalidInput`] when geometry is needed but absent
    /// or the flight path is zero.
    pub fn correction_for(
        &self,
        detector_id: DetectorId,
        geometry: Option<&dyn DetectorGeometry>,
    ) -> Result<TofCorrection> {
        let params = match (self, geometry) {
            (Self::None, _) => return Ok(TofCorrection::IDENTITY),
            (Self::Customized(table), _) => return table.get(detector_id),
            (_, Some(geometry)) => geometry.detector_params(detector_id)?,
            (_, None) => {
                return Err(Error::InvalidInput(
                    "TOF correction requires detector geometry".into(),
                ))
            }
        };

        let correction = match self {
            Self::Elastic => {
                let path = params.total_flight_path();
                if path <= 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "detector {detector_id} has zero flight path"
                    )));
                }
                TofCorrection::new(params.l1 / path, 0.0)
            }
            Self::Direct { incident_energy } => {
                TofCorrection::new(0.0, energy_flight_time() * params.l1 / incident_energy.sqrt())
            }
            Self::Indirect => {
                let efixed = params.require_efixed("Indirect correction")?;
                TofCorrection::new(1.0, -energy_flight_time() * params.l2 / efixed.sqrt())
            }
            Self::None | Self::Customized(_) => TofCorrection::IDENTITY,
        };
        Ok(correction)
    }
}
