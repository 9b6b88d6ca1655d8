//! Energy transfer `ΔE = Ei - Ef`.
//!
//! Only defined for inelastic geometries. Conversions that would need a
//! non-positive neutron energy, or a TOF no later than the fixed-leg
//! flight time, return an infinite sentinel instead of NaN.

use crate::constants::{energy_flight_time, MEV_TO_WAVENUMBER};
use crate::unit::{QuickConversion, TofFactors, Unit};
use rustevent_core::{DetectorParams, EMode, Error, Result};

/// Factors shared by both energy-transfer units. `factor` is the flight
/// time coefficient of the variable-energy leg, `offset` the fixed-leg TOF.
fn bind_delta_e(params: &DetectorParams, unit: &'static str) -> Result<TofFactors> {
    let c = energy_flight_time();
    let (fixed_leg, variable_leg) = match params.emode {
        EMode::Direct => (params.l1, params.l2),
        EMode::Indirect => (params.l2, params.l1),
        EMode::Elastic => {
            return Err(Error::InvalidEMode {
                unit,
                emode: params.emode,
            })
        }
    };
    let efixed = params.require_efixed(unit)?;
    Ok(TofFactors {
        factor: c * variable_leg,
        offset: c * fixed_leg / efixed.sqrt(),
        efixed,
        emode: params.emode,
    })
}

fn delta_e_to_tof(delta_e: f64, factors: &TofFactors) -> f64 {
    let energy = match factors.emode {
        EMode::Indirect => factors.efixed + delta_e,
        _ => factors.efixed - delta_e,
    };
    if energy > 0.0 {
        factors.factor / energy.sqrt() + factors.offset
    } else {
        f64::INFINITY
    }
}

fn delta_e_from_tof(tof: f64, factors: &TofFactors) -> f64 {
    let t = tof - factors.offset;
    if t > 0.0 {
        let ratio = factors.factor / t;
        let energy = ratio * ratio;
        match factors.emode {
            EMode::Indirect => energy - factors.efixed,
            _ => factors.efixed - energy,
        }
    } else {
        match factors.emode {
            EMode::Indirect => f64::INFINITY,
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Energy transfer in meV.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaE;

impl Unit for DeltaE {
    fn id(&self) -> &'static str {
        "DeltaE"
    }

    fn caption(&self) -> &'static str {
        "Energy transfer"
    }

    fn label(&self) -> &'static str {
        "meV"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        bind_delta_e(params, self.id())
    }

    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        delta_e_to_tof(x, factors)
    }

    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        delta_e_from_tof(tof, factors)
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        match (dest, emode) {
            ("DeltaE_inWavenumber", EMode::Direct | EMode::Indirect) => {
                Some(QuickConversion::new(MEV_TO_WAVENUMBER, 1.0))
            }
            _ => None,
        }
    }
}

/// Energy transfer in wavenumbers (cm^-1).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaEInWavenumber;

impl Unit for DeltaEInWavenumber {
    fn id(&self) -> &'static str {
        "DeltaE_inWavenumber"
    }

    fn caption(&self) -> &'static str {
        "Energy transfer"
    }

    fn label(&self) -> &'static str {
        "cm^-1"
    }

    fn bind(&self, params: &DetectorParams) -> Result<TofFactors> {
        bind_delta_e(params, self.id())
    }

    fn to_tof(&self, x: f64, factors: &TofFactors) -> f64 {
        delta_e_to_tof(x / MEV_TO_WAVENUMBER, factors)
    }

    fn from_tof(&self, tof: f64, factors: &TofFactors) -> f64 {
        delta_e_from_tof(tof, factors) * MEV_TO_WAVENUMBER
    }

    fn quick_conversion(&self, dest: &str, emode: EMode) -> Option<QuickConversion> {
        match (dest, emode) {
            ("DeltaE", EMode::Direct | EMode::Indirect) => {
                Some(QuickConversion::new(1.0 / MEV_TO_WAVENUMBER, 1.0))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn direct() -> DetectorParams {
        DetectorParams::elastic(10.0, 4.0, 0.5).with_emode(EMode::Direct, Some(25.0))
    }

    fn indirect() -> DetectorParams {
        DetectorParams::elastic(36.4, 0.85, 0.7).with_emode(EMode::Indirect, Some(1.845))
    }

    #[test]
    fn test_elastic_line_at_zero_transfer() {
        // With ΔE = 0 the neutron flies the whole path at efixed
        for params in [direct(), indirect()] {
            let efixed = params.efixed.unwrap();
            let t = DeltaE.to_tof_with(0.0, &params).unwrap();
            let expected = energy_flight_time() * params.total_flight_path() / efixed.sqrt();
            assert_relative_eq!(t, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_round_trip() {
        for (params, delta_e) in [(direct(), 12.5), (direct(), -40.0), (indirect(), 3.0)] {
            let factors = DeltaE.bind(&params).unwrap();
            let t = DeltaE.to_tof(delta_e, &factors);
            assert_relative_eq!(DeltaE.from_tof(t, &factors), delta_e, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_unphysical_sentinels() {
        let factors = DeltaE.bind(&direct()).unwrap();
        // Cannot transfer more than the incident energy
        assert_eq!(DeltaE.to_tof(30.0, &factors), f64::INFINITY);
        // Arriving before the incident flight time
        assert_eq!(DeltaE.from_tof(factors.offset, &factors), f64::NEG_INFINITY);

        let factors = DeltaE.bind(&indirect()).unwrap();
        assert_eq!(DeltaE.to_tof(-5.0, &factors), f64::INFINITY);
        assert_eq!(DeltaE.from_tof(0.0, &factors), f64::INFINITY);
    }

    #[test]
    fn test_requires_inelastic_mode_and_efixed() {
        let elastic = DetectorParams::elastic(10.0, 4.0, 0.5);
        assert!(matches!(
            DeltaE.bind(&elastic),
            Err(Error::InvalidEMode {
                unit: "DeltaE",
                emode: EMode::Elastic
            })
        ));

        let no_efixed = elastic.with_emode(EMode::Indirect, None);
        assert!(matches!(
            DeltaEInWavenumber.bind(&no_efixed),
            Err(Error::MissingEfixed {
                unit: "DeltaE_inWavenumber"
            })
        ));
    }

    #[test]
    fn test_wavenumber_scale() {
        let params = indirect();
        let t = 60_000.0;
        let mev = DeltaE.from_tof_with(t, &params).unwrap();
        let wavenumber = DeltaEInWavenumber.from_tof_with(t, &params).unwrap();
        assert_relative_eq!(wavenumber, mev * MEV_TO_WAVENUMBER, max_relative = 1e-12);
    }
}
