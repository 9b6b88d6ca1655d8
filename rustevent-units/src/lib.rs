//! rustevent-units: Unit conversion for event-mode neutron data.
//!
//! Values convert between physical units through time-of-flight:
//! - [`Unit`] - stateless capability trait (`to_tof` / `from_tof` / quick conversion)
//! - [`UnitRegistry`] - resolves unit ids to shared instances
//! - [`UnitConverter`] - converts bin edges, events and histograms for one detector
//! - [`ConvertUnits`] - converts a whole workspace in parallel, masking bad detectors
//!
#![warn(missing_docs)]

mod convert_units;
mod converter;
mod registry;
mod unit;
pub mod units;

pub use rustevent_core::constants;

pub use convert_units::{ConversionReport, ConvertConfig, ConvertUnits};
pub use converter::{reverse, trim_non_finite_bins, Conversion, UnitConverter};
pub use registry::UnitRegistry;
pub use unit::{QuickConversion, TofFactors, Unit};
