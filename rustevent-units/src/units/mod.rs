//! Built-in units.

mod delta_e;
mod dspacing;
mod energy;
mod tof;
mod wavelength;

pub use delta_e::{DeltaE, DeltaEInWavenumber};
pub use dspacing::{DSpacing, MomentumTransfer, QSquared};
pub use energy::{Energy, EnergyInWavenumber};
pub use tof::Tof;
pub use wavelength::{Momentum, Wavelength};
