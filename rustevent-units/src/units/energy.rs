//! Neutron kinetic energy.
//!
//! Energy is computed from the total flight path regardless of emode.

use crate::constants::{energy_flight_time, ENERGY_WAVELENGTH, MEV_TO_WAVENUMBER};
use crate::unit::{QuickConversion, TofFactors, Unit};
use rustevent_core::{DetectorParams, EMode, Result};
use std::f64::consts::PI;

fn bind_energy(params: &DetectorParams, scale: f64) -> TofFactors {
    TofFactors {
        factor: energy_flight_time() * params.total_flight_path() * scale.sqrt(),
        offset: 0.0,
        efixed: params.efixed.unwrap_or(0.0),
        emode: params.emode,
    }
}

/// Neutron energy in meV.
#[derive(Debug, Clone, Copy, Default)]
pub struct Energy;

impl Unit for Energy {
    fn id(&self) -> &'static str {
        "Energy"
    }

    fn caption(&self) -> &'static str {
        "Energy"
    }

    fn label(&self) -> &'static str {
        "meV"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(bind_energy(params, 1.0))
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        factors.factor / x.sqrt()
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        let ratio = factors.factor / tof;
        ratio * ratio
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        match (dest, emode) {
            ("Energy_inWavenumber", _) => Some(QuickConversion::new(MEV_TO_WAVENUMBER, 1.0)),
            ("Wavelength", EMode::Elastic) => {
                Some(QuickConversion::new(ENERGY_WAVELENGTH.sqrt(), -0.5))
            }
            ("Momentum", EMode::Elastic) => Some(QuickConversion::new(
                2.0 * PI / ENERGY_WAVELENGTH.sqrt(),
                0.5,
            )),
            _ => None,
        }
    }
}

/// Neutron energy in wavenumbers (cm^-1).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyInWavenumber;

impl Unit for EnergyInWavenumber {
    fn id(&self) -> &'static str {
        "Energy_inWavenumber"
    }

    fn caption(&self) -> &'static str {
        "Energy"
    }

    fn label(&self) -> &'static str {
        "cm^-1"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        Ok(bind_energy(params, MEV_TO_WAVENUMBER))
    }

    #[inline]
    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        factors.factor / x.sqrt()
    }

    #[inline]
    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        let ratio = factors.factor / tof;
        ratio * ratio
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        let k = ENERGY_WAVELENGTH * MEV_TO_WAVENUMBER;
        match (dest, emode) {
            ("Energy", _) => Some(QuickConversion::new(1.0 / MEV_TO_WAVENUMBER, 1.0)),
            ("Wavelength", EMode::Elastic) => Some(QuickConversion::new(k.sqrt(), -0.5)),
            ("Momentum", EMode::Elastic) => {
                Some(QuickConversion::new(2.0 * PI / k.sqrt(), 0.5))
            }
            _ => None,
        }
    }
}
