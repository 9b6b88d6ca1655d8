//! Physical constants shared by unit conversion and TOF correction.
//!
//! Values match the CODATA 2006 set used across the reduction framework, so
//! converted data agrees with files produced elsewhere.

/// Planck constant (J s).
pub const H: f64 = 6.626_068_96e-34;

/// Neutron mass (kg).
pub const NEUTRON_MASS: f64 = 1.674_927_211e-27;

/// One milli-electron-volt in joules.
pub const MEV: f64 = 1.602_176_487e-22;

/// Conversion from meV to cm^-1.
pub const MEV_TO_WAVENUMBER: f64 = 8.065_544_65;

/// Microseconds per second.
pub const MICROSECONDS: f64 = 1e6;

/// Ångströms per metre.
pub const ANGSTROMS: f64 = 1e10;

/// `E * λ²` for a neutron, in meV Å².
pub const ENERGY_WAVELENGTH: f64 = H * H * ANGSTROMS * ANGSTROMS / (2.0 * NEUTRON_MASS * MEV);

/// Flight time coefficient in µs sqrt(meV) / m: `t = C * L / sqrt(E)`.
#[must_use]
pub fn energy_flight_time() -> f64 {
    (NEUTRON_MASS / (2.0 * MEV)).sqrt() * MICROSECONDS
}

/// Flight time per metre per Ångström of wavelength, in µs / (m Å).
pub const TOF_PER_WAVELENGTH: f64 = NEUTRON_MASS / H * MICROSECONDS / ANGSTROMS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_wavelength_constant() {
        // 81.8042 meV Å² is the textbook value
        assert!((ENERGY_WAVELENGTH - 81.804_2).abs() < 1e-3);
    }

    #[test]
    fn test_flight_time_constants_agree() {
        // Both describe the same 1 Å neutron: t = L * TOF_PER_WAVELENGTH * λ
        let wavelength = 1.0;
        let energy = ENERGY_WAVELENGTH / (wavelength * wavelength);
        let from_energy = energy_flight_time() / energy.sqrt();
        let from_wavelength = TOF_PER_WAVELENGTH * wavelength;
        assert!((from_energy - from_wavelength).abs() / from_wavelength < 1e-12);
    }
}
