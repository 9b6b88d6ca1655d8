//! Time-of-flight, the pivot unit.

use crate::unit::{TofFactors, Unit};
use rustevent_core::{DetectorParams, Result, TOF_UNIT};

/// Time-of-flight in microseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tof;

impl Unit for Tof {
    fn id(&self) -> &'static str {
        TOF_UNIT
    }

    fn caption(&self) -> &'static str {
        "Time-of-flight"
    }

    fn label(&self) -> &'static str {
        "microsecond"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(TofFactors {
            emode: params.emode,
            ..TofFactors::default()
        })
    }

    #[inline]
    fn to_tof(&self, x: f64, _factors: &TofFactors) -> f64 {
        x
    }

    #[inline]
    fn from_tof(&self, tof: f64, _factors: &TofFactors) -> f64 {
        tof
    }
}
