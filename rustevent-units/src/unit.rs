//! The unit capability trait.

use rustevent_core::{DetectorParams, EMode, Result};
use std::fmt;

/// Per-detector constants a unit precomputes before converting values.
///
/// Each unit decides what `factor` and `offset` mean for it; callers only
/// pass the value returned by [`Unit::bind`] back to the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TofFactors {
    /// Primary scale factor.
    pub factor: f64,
    /// Additive TOF offset (µs).
    pub offset: f64,
    /// Fixed energy (meV), if the unit uses one.
    pub efixed: f64,
    /// Energy mode the factors were computed for.
    pub emode: EMode,
}

/// Direct conversion `dest = factor * source^power`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuickConversion {
    /// Multiplicative constant.
    pub factor: f64,
    /// Exponent applied to the source value.
    pub power: f64,
}

impl QuickConversion {
    /// Creates a quick conversion.
    #[must_use]
    pub const fn new(factor: f64, power: f64) -> Self {
        Self { factor, power }
    }

    /// Applies the conversion to one value.
    #[inline]
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        self.factor * x.powf(self.power)
    }
}

/// A physical X-axis unit that converts to and from time-of-flight.
///
/// Units are stateless: everything that depends on the detector lives in
/// the [`TofFactors`] returned by [`Unit::bind`], so one instance can be
/// shared by every worker thread.
pub trait Unit: Send + Sync + fmt::Debug {
    /// Identifier the unit is registered under.
    fn id(&self) -> &'static str;

    /// Human-readable quantity name.
    fn caption(&self) -> &'static str;

    /// Axis label (physical unit).
    fn label(&self) -> &'static str;

    /// Precomputes the conversion constants for one detector.
    ///
    /// # Errors
    /// Returns [`rustevent_core::Error::MissingEfixed`] or
    /// [`rustevent_core::Error::InvalidEMode`] when the geometry cannot
    /// support this unit.
    fn bind(&self, params: &DetectorParams) -> Result<TofFactors>;

    /// Converts a value in this unit to TOF (µs).
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64;

    /// Converts a TOF (µs) to this unit.
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64;

    /// Returns a geometry-independent conversion to `dest`, if one exists
    /// for the given energy mode.
    fn quick_conversion(&self, _dest: &str, _emode: EMode) -> Option<QuickConversion> {
        None
    }

    /// Converts one value to TOF, binding the detector parameters first.
    ///
    /// # Errors
    /// Propagates errors from [`Unit::bind`].
    fn to_tof_with(&self, x: f64, params: &DetectorParams) -> Result<f64> {
        Ok(self.to_tof(x, &self.bind(params)?))
    }

    /// Converts one TOF to this unit, binding the detector parameters first.
    ///
    /// # Errors
    /// Propagates errors from [`Unit::bind`].
    fn from_tof_with(&self, tof: f64, params: &DetectorParams) -> Result<f64> {
        Ok(self.from_tof(tof, &self.bind(params)?))
    }
}
