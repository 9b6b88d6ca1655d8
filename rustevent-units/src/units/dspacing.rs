//! Elastic scattering units: d-spacing, momentum transfer and Q².
//!
//! All three share the diffractometer constant
//! `DIFC = 2 m L sin(θ) / h` (µs per Å), so they convert between
//! themselves without geometry.

use crate::constants::TOF_PER_WAVELENGTH;
use crate::unit::{QuickConversion, TofFactors, Unit};
use rustevent_core::{DetectorParams, EMode, Result};
use std::f64::consts::PI;

fn difc(params: &DetectorParams) -> f64 {
    2.0 * TOF_PER_WAVELENGTH * params.total_flight_path() * (params.two_theta / 2.0).sin()
}

fn bind_scaled(params: &DetectorParams, scale: f64) -> TofFactors {
    TofFactors {
        factor: difc(params) * scale,
        offset: 0.0,
        efixed: params.efixed.unwrap_or(0.0),
        emode: params.emode,
    }
}

/// Lattice d-spacing in Ångströms.
#[derive(Debug, Clone, Copy, Default)]
pub struct DSpacing;

impl Unit for DSpacing {
    fn id(&self) -> &'static str {
        "dSpacing"
    }

    fn caption(&self) -> &'static str {
        "d-Spacing"
    }

    fn label(&self) -> &'static str {
        "Angstrom"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(bind_scaled(params, 1.0))
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        x * factors.factor
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        tof / factors.factor
    }

    fn quick_conversion(&self, dest: &str, _emode: EMode) -> Option<QuickConversion> {
        match dest {
            "MomentumTransfer" => Some(QuickConversion::new(2.0 * PI, -1.0)),
            "QSquared" => Some(QuickConversion::new(4.0 * PI * PI, -2.0)),
            _ => None,
        }
    }
}

/// Elastic momentum transfer `Q = 4π sin(θ)/λ` in inverse Ångströms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumTransfer;

impl Unit for MomentumTransfer {
    fn id(&self) -> &'static str {
        "MomentumTransfer"
    }

    fn caption(&self) -> &'static str {
        "q"
    }

    fn label(&self) -> &'static str {
        "Angstrom^-1"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(bind_scaled(params, 2.0 * PI))
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        factors.factor / x
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        factors.factor / tof
    }

    fn quick_conversion(&self, dest: &str, _emode: EMode) -> Option<QuickConversion> {
        match dest {
            "dSpacing" => Some(QuickConversion::new(2.0 * PI, -1.0)),
            "QSquared" => Some(QuickConversion::new(1.0, 2.0)),
            _ => None,
        }
    }
}

/// Squared momentum transfer in inverse square Ångströms.
#[derive(Debug, Clone, Copy, Default)]
pub struct QSquared;

impl Unit for QSquared {
    fn id(&self) -> &'static str {
        "QSquared"
    }

    fn caption(&self) -> &'static str {
        "Q2"
    }

    fn label(&self) -> &'static str {
        "Angstrom^-2"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(bind_scaled(params, 2.0 * PI))
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        factors.factor / x.sqrt()
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        let q = factors.factor / tof;
        q * q
    }

    fn quick_conversion(&self, dest: &str, _emode: EMode) -> Option<QuickConversion> {
        match dest {
            "dSpacing" => Some(QuickConversion::new(2.0 * PI, -0.5)),
            "MomentumTransfer" => Some(QuickConversion::new(1.0, 0.5)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bragg_law() {
        // d = λ / (2 sin θ)
        let params = DetectorParams::elastic(10.0, 2.0, PI / 2.0);
        let tof = 5000.0;
        let lambda = tof / (TOF_PER_WAVELENGTH * 12.0);
        let d = DSpacing.from_tof_with(tof, &params).unwrap();
        assert_relative_eq!(d, lambda / (2.0 * (PI / 4.0).sin()), max_relative = 1e-12);
    }

    #[test]
    fn test_q_is_two_pi_over_d() {
        let params = DetectorParams::elastic(10.0, 2.0, 1.2);
        let d = DSpacing.from_tof_with(4000.0, &params).unwrap();
        let q = MomentumTransfer.from_tof_with(4000.0, &params).unwrap();
        let q2 = QSquared.from_tof_with(4000.0, &params).unwrap();
        assert_relative_eq!(q, 2.0 * PI / d, max_relative = 1e-12);
        assert_relative_eq!(q2, q * q, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_angle_is_not_finite() {
        let params = DetectorParams::elastic(10.0, 2.0, 0.0);
        let d = DSpacing.from_tof_with(1000.0, &params).unwrap();
        assert!(!d.is_finite());
    }
}
