//! Conversion of X values and event coordinates between two units.
//!
//! Values move either through a geometry-independent quick conversion or
//! through TOF as the pivot. Both paths go through one [`Mapping`], so
//! bin edges and events converted with the same parameters agree exactly.

use crate::registry::UnitRegistry;
use crate::unit::{QuickConversion, TofFactors, Unit};
use rustevent_core::{DetectorParams, EMode, Event, Histogram, Result};
use std::sync::Arc;

/// Outcome of converting an X array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Source and destination are the same unit; nothing was touched.
    Unchanged,
    /// Values were converted.
    Converted {
        /// The first value now exceeds the last, so the caller must reverse
        /// the array and anything indexed alongside it.
        reversed: bool,
    },
}

impl Conversion {
    /// Returns true if the converted array runs in descending order.
    #[must_use]
    pub fn order_reversed(&self) -> bool {
        matches!(self, Conversion::Converted { reversed: true })
    }

    fn after(values: &[f64]) -> Self {
        let reversed = match (values.first(), values.last()) {
            (Some(first), Some(last)) if values.len() >= 2 => first > last,
            _ => false,
        };
        Conversion::Converted { reversed }
    }
}

/// A per-detector conversion, ready to map values.
#[derive(Debug, Clone, Copy)]
enum Mapping<'a> {
    Quick(QuickConversion),
    ViaTof {
        source: &'a dyn Unit,
        source_factors: TofFactors,
        dest: &'a dyn Unit,
        dest_factors: TofFactors,
    },
}

impl Mapping<'_> {
    #[inline]
    fn map(&self, x: f64) -> f64 {
        match self {
            Mapping::Quick(quick) => quick.apply(x),
            Mapping::ViaTof {
                source,
                source_factors,
                dest,
                dest_factors,
            } => dest.from_tof(source.to_tof(x, source_factors), dest_factors),
        }
    }

    fn map_slice(&self, values: &mut [f64]) {
        for x in values.iter_mut() {
            *x = self.map(*x);
        }
    }
}

/// Converts values from a source unit to a destination unit.
#[derive(Debug, Clone)]
pub struct UnitConverter {
    source: Arc<dyn Unit>,
    dest: Arc<dyn Unit>,
}

impl UnitConverter {
    /// Creates a converter for a unit pair.
    #[must_use]
    pub fn new(source: Arc<dyn Unit>, dest: Arc<dyn Unit>) -> Self {
        Self { source, dest }
    }

    /// Creates a converter by resolving both unit names.
    ///
    /// # Errors
    /// Returns [`rustevent_core::Error::UnknownUnit`] if either name is unknown.
    pub fn from_ids(registry: &UnitRegistry, source: &str, dest: &str) -> Result<Self> {
        Ok(Self::new(registry.resolve(source)?, registry.resolve(dest)?))
    }

    /// Source unit.
    #[must_use]
    pub fn source(&self) -> &dyn Unit {
        self.source.as_ref()
    }

    /// Destination unit.
    #[must_use]
    pub fn dest(&self) -> &dyn Unit {
        self.dest.as_ref()
    }

    /// Returns true if source and destination are the same unit.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.source.id() == self.dest.id()
    }

    /// Geometry-independent conversion for this pair, if one exists in `emode`.
    #[must_use]
    pub fn quick_conversion(&self, emode: EMode) -> Option<QuickConversion> {
        self.source.quick_conversion(self.dest.id(), emode)
    }

    /// Returns true if converted values do not depend on detector geometry
    /// in `emode`, so one converted array can serve every spectrum.
    #[must_use]
    pub fn is_geometry_independent(&self, emode: EMode) -> bool {
        self.is_trivial() || self.quick_conversion(emode).is_some()
    }

    /// Binds both units to the detector and picks the path.
    ///
    /// Both units are bound even when a quick conversion exists so that a
    /// missing efixed or unsupported emode is reported on either path.
    fn mapping(&self, params: &DetectorParams, use_quick: bool) -> Result<Mapping<'_>> {
        let source_factors = self.source.bind(params)?;
        let dest_factors = self.dest.bind(params)?;
        if use_quick {
            if let Some(quick) = self.quick_conversion(params.emode) {
                return Ok(Mapping::Quick(quick));
            }
        }
        Ok(Mapping::ViaTof {
            source: self.source.as_ref(),
            source_factors,
            dest: self.dest.as_ref(),
            dest_factors,
        })
    }

    /// Checks both units accept the detector parameters.
    ///
    /// # Errors
    /// Returns the unit's binding error (missing efixed, unsupported emode).
    pub fn validate(&self, params: &DetectorParams) -> Result<()> {
        if self.is_trivial() {
            return Ok(());
        }
        self.mapping(params, false).map(|_| ())
    }

    /// Converts X values in place for one detector.
    ///
    /// Uses the quick conversion when the pair has one in `params.emode`,
    /// otherwise pivots through TOF. NaN and infinities propagate.
    ///
    /// # Errors
    /// Returns the unit's binding error (missing efixed, unsupported emode).
    pub fn convert(&self, x: &mut [f64], params: &DetectorParams) -> Result<Conversion> {
        if self.is_trivial() {
            return Ok(Conversion::Unchanged);
        }
        self.mapping(params, true)?.map_slice(x);
        Ok(Conversion::after(x))
    }

    /// Converts X values in place, always pivoting through TOF.
    ///
    /// # Errors
    /// Returns the unit's binding error (missing efixed, unsupported emode).
    pub fn convert_via_tof(&self, x: &mut [f64], params: &DetectorParams) -> Result<Conversion> {
        if self.is_trivial() {
            return Ok(Conversion::Unchanged);
        }
        self.mapping(params, false)?.map_slice(x);
        Ok(Conversion::after(x))
    }

    /// Applies a quick conversion to an array without detector parameters.
    ///
    /// Intended for a bin-edge array shared by many spectra; the caller must
    /// have checked [`Self::is_geometry_independent`] for every spectrum.
    #[must_use]
    pub fn convert_shared(&self, x: &mut [f64], quick: QuickConversion) -> Conversion {
        if self.is_trivial() {
            return Conversion::Unchanged;
        }
        Mapping::Quick(quick).map_slice(x);
        Conversion::after(x)
    }

    /// Converts each event's `tof` coordinate in place.
    ///
    /// Pulse times and weights are untouched. Results match [`Self::convert`]
    /// bit for bit for the same values and parameters.
    ///
    /// # Errors
    /// Returns the unit's binding error (missing efixed, unsupported emode).
    pub fn convert_events(&self, events: &mut [Event], params: &DetectorParams) -> Result<()> {
        if self.is_trivial() {
            return Ok(());
        }
        let mapping = self.mapping(params, true)?;
        for event in events.iter_mut() {
            event.tof = mapping.map(event.tof);
        }
        Ok(())
    }

    /// Converts a histogram's bin edges, keeping it ascending.
    ///
    /// Distribution data is converted to counts with the old bin widths and
    /// back with the new ones. If the conversion inverts the order, edges,
    /// counts and errors are reversed together.
    ///
    /// # Errors
    /// Returns the unit's binding error (missing efixed, unsupported emode).
    pub fn convert_histogram(
        &self,
        histogram: &mut Histogram,
        params: &DetectorParams,
    ) -> Result<Conversion> {
        if self.is_trivial() {
            return Ok(Conversion::Unchanged);
        }
        let mapping = self.mapping(params, true)?;

        if histogram.distribution {
            scale_by_widths(histogram, |y, w| y * w);
        }
        mapping.map_slice(&mut histogram.x);
        if histogram.distribution {
            scale_by_widths(histogram, |y, w| y / w);
        }

        let conversion = Conversion::after(&histogram.x);
        if conversion.order_reversed() {
            reverse(&mut histogram.x, &mut histogram.y, &mut histogram.e);
        }
        Ok(conversion)
    }
}

fn scale_by_widths(histogram: &mut Histogram, op: impl Fn(f64, f64) -> f64) {
    let widths = histogram.bin_widths();
    for ((y, e), w) in histogram
        .y
        .iter_mut()
        .zip(histogram.e.iter_mut())
        .zip(widths)
    {
        *y = op(*y, w);
        *e = op(*e, w);
    }
}

/// Reverses bin edges and the counts and errors indexed alongside them.
pub fn reverse(x: &mut [f64], y: &mut [f64], e: &mut [f64]) {
    x.reverse();
    y.reverse();
    e.reverse();
}

/// Drops leading and trailing bins whose edges are not finite.
///
/// Conversions into energy transfer mark unphysical edges with infinite
/// sentinels; this removes them. Returns the number of bins dropped. A
/// histogram with fewer than two finite edges left is emptied.
pub fn trim_non_finite_bins(histogram: &mut Histogram) -> usize {
    let bins = histogram.num_bins();
    let edges = histogram.x.len();
    let leading = histogram.x.iter().take_while(|x| !x.is_finite()).count();
    let trailing = if leading == edges {
        0
    } else {
        histogram.x.iter().rev().take_while(|x| !x.is_finite()).count()
    };

    if edges - leading - trailing < 2 {
        histogram.x.clear();
        histogram.y.clear();
        histogram.e.clear();
        return bins;
    }

    histogram.x.truncate(edges - trailing);
    histogram.x.drain(..leading);
    histogram.y.truncate(bins - trailing);
    histogram.e.truncate(bins - trailing);
    histogram.y.drain(..leading);
    histogram.e.drain(..leading);

    leading + trailing
}
