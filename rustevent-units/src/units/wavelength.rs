//! Wavelength and neutron momentum.
//!
//! In inelastic modes only one leg of the flight path carries the
//! wavelength being measured; the other leg is flown at the fixed energy
//! and contributes a constant TOF offset.

use crate::constants::{energy_flight_time, ENERGY_WAVELENGTH, MEV_TO_WAVENUMBER, TOF_PER_WAVELENGTH};
use crate::unit::{QuickConversion, TofFactors, Unit};
use rustevent_core::{DetectorParams, EMode, Result};
use std::f64::consts::PI;

/// Returns the flight path that scales with wavelength and the fixed-leg TOF.
fn flight_path_and_offset(params: &DetectorParams, unit: &'static str) -> Result<(f64, f64)> {
    match params.emode {
        EMode::Elastic => Ok((params.total_flight_path(), 0.0)),
        EMode::Direct => {
            let ei = params.require_efixed(unit)?;
            Ok((params.l2, energy_flight_time() * params.l1 / ei.sqrt()))
        }
        EMode::Indirect => {
            let ef = params.require_efixed(unit)?;
            Ok((params.l1, energy_flight_time() * params.l2 / ef.sqrt()))
        }
    }
}

/// Neutron wavelength in Ångströms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wavelength;

impl Unit for Wavelength {
    fn id(&self) -> &'static str {
        "Wavelength"
    }

    fn caption(&self) -> &'static str {
        "Wavelength"
    }

    fn label(&self) -> &'static str {
        "Angstrom"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        let (path, offset) = flight_path_and_offset(params, self.id())?;
        Ok(TofFactors {
            factor: TOF_PER_WAVELENGTH * path,
            offset,
            efixed: params.efixed.unwrap_or(0.0),
            emode: params.emode,
        })
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        x * factors.factor + factors.offset
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        (tof - factors.offset) / factors.factor
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        if emode != EMode::Elastic {
            return None;
        }
        match dest {
            "Energy" => Some(QuickConversion::new(ENERGY_WAVELENGTH, -2.0)),
            "Energy_inWavenumber" => Some(QuickConversion::new(
                ENERGY_WAVELENGTH * MEV_TO_WAVENUMBER,
                -2.0,
            )),
            "Momentum" => Some(QuickConversion::new(2.0 * PI, -1.0)),
            _ => None,
        }
    }
}

/// Neutron wavevector `k = 2π/λ` in inverse Ångströms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Momentum;

impl Unit for Momentum {
    fn id(&self) -> &'static str {
        "Momentum"
    }

    fn caption(&self) -> &'static str {
        "Momentum"
    }

    fn label(&self) -> &'static str {
        "Angstrom^-1"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        let (path, offset) = flight_path_and_offset(params, self.id())?;
        Ok(TofFactors {
            factor: 2.0 * PI * TOF_PER_WAVELENGTH * path,
            offset,
            efixed: params.efixed.unwrap_or(0.0),
            emode: params.emode,
        })
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        factors.factor / x + factors.offset
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        factors.factor / (tof - factors.offset)
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        if emode != EMode::Elastic {
            return None;
        }
        let k_squared = ENERGY_WAVELENGTH / (4.0 * PI * PI);
        match dest {
            "Wavelength" => Some(QuickConversion::new(2.0 * PI, -1.0)),
            "Energy" => Some(QuickConversion::new(k_squared, 2.0)),
            "Energy_inWavenumber" => {
                Some(QuickConversion::new(k_squared * MEV_TO_WAVENUMBER, 2.0))
            }
            _ => None,
        }
    }
}
