//! Parallel conversion of a whole event workspace.
//!
//! Runs in two passes over the spectra. The first looks up each detector
//! and checks both units accept it; spectra that fail are masked. The
//! second converts bin edges and events. When every spectrum aliases one
//! bin-edge array and every usable detector qualifies for the same quick
//! conversion, that array is converted once and stays shared.

use crate::converter::UnitConverter;
use crate::registry::UnitRegistry;
use crate::unit::QuickConversion;
use log::{debug, warn};
use rayon::prelude::*;
use rustevent_core::{
    CancellationToken, DetectorGeometry, DetectorParams, EventList, EventWorkspace,
    ProgressReporter, Result, SpectrumError, SpectrumProgress, TOF_UNIT,
};
use std::sync::Arc;

/// Configuration for workspace conversion.
#[derive(Clone, Debug)]
pub struct ConvertConfig {
    /// Id of the unit to convert to.
    pub target: String,
    /// Alias identical bin-edge arrays before converting.
    pub share_bins: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            target: TOF_UNIT.to_string(),
            share_bins: true,
        }
    }
}

impl ConvertConfig {
    /// Creates a configuration converting to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Sets whether identical bin-edge arrays are aliased first.
    #[must_use]
    pub fn with_share_bins(mut self, share: bool) -> Self {
        self.share_bins = share;
        self
    }
}

/// Summary of a workspace conversion.
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Spectra converted successfully.
    pub converted: usize,
    /// Spectra masked because their detector could not be converted.
    pub masked: Vec<SpectrumError>,
    /// Whether one converted bin-edge array is shared by all spectra.
    pub shared_bins: bool,
    /// Whether bin edges had to be reversed to stay ascending.
    pub reversed: bool,
}

/// Converts event workspaces to a target unit.
#[derive(Clone, Debug)]
pub struct ConvertUnits {
    registry: UnitRegistry,
    config: ConvertConfig,
}

impl ConvertUnits {
    /// Creates a converter using the built-in units.
    #[must_use]
    pub fn new(config: ConvertConfig) -> Self {
        Self {
            registry: UnitRegistry::default(),
            config,
        }
    }

    /// Uses a custom unit registry.
    #[must_use]
    pub fn with_registry(mut self, registry: UnitRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Converts every spectrum of `workspace` in place.
    ///
    /// Spectra whose detector is missing, lacks efixed or has an emode the
    /// units cannot handle are masked (events dropped, bin edges zeroed) and
    /// listed in the report. Cancellation leaves the workspace partially
    /// converted.
    ///
    /// # Errors
    /// Returns [`rustevent_core::Error::UnknownUnit`] for unresolvable units
    /// and [`rustevent_core::Error::Cancelled`] if `cancel` fires.
    pub fn run(
        &self,
        workspace: &mut EventWorkspace,
        geometry: &dyn DetectorGeometry,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport> {
        let converter =
            UnitConverter::from_ids(&self.registry, &workspace.unit, &self.config.target)?;
        if converter.is_trivial() {
            debug!("workspace already in {}", workspace.unit);
            return Ok(ConversionReport {
                converted: workspace.num_spectra(),
                shared_bins: workspace.has_shared_bins(),
                ..ConversionReport::default()
            });
        }
        if self.config.share_bins {
            workspace.share_common_bins();
        }

        let lookup = SpectrumProgress::new(progress, cancel, workspace.num_spectra());
        let lookups = workspace
            .spectra
            .par_iter()
            .enumerate()
            .map(|(index, spectrum)| {
                lookup.checkpoint(index)?;
                lookup_params(&converter, geometry, index, spectrum)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut params = Vec::with_capacity(lookups.len());
        let mut masked = Vec::new();
        for outcome in lookups {
            match outcome {
                Ok(p) => params.push(Some(p)),
                Err(error) => {
                    params.push(None);
                    masked.push(error);
                }
            }
        }

        let shared_quick = if workspace.has_shared_bins() {
            common_quick_conversion(&converter, &params)
        } else {
            None
        };

        let tracker = SpectrumProgress::new(progress, cancel, workspace.num_spectra());
        let shared_x = shared_quick
            .and_then(|quick| Some((quick, workspace.spectra.first()?.x.as_ref().clone())));
        let reversed = match shared_x {
            Some((quick, mut x)) => {
                debug!(
                    "converting shared bins {} -> {} with factor {} power {}",
                    converter.source().id(),
                    converter.dest().id(),
                    quick.factor,
                    quick.power
                );
                let reversed = converter.convert_shared(&mut x, quick).order_reversed();
                if reversed {
                    x.reverse();
                }
                let shared = Arc::new(x);
                workspace
                    .spectra
                    .par_iter_mut()
                    .zip(params.par_iter())
                    .enumerate()
                    .try_for_each(|(index, (spectrum, params))| -> Result<()> {
                        tracker.checkpoint(index)?;
                        match params {
                            Some(params) => {
                                converter.convert_events(&mut spectrum.events, params)?;
                                spectrum.x = Arc::clone(&shared);
                            }
                            None => mask(spectrum),
                        }
                        tracker.tick();
                        Ok(())
                    })?;
                reversed
            }
            None => {
                debug!(
                    "converting {} -> {} per spectrum",
                    converter.source().id(),
                    converter.dest().id()
                );
                let flags = workspace
                    .spectra
                    .par_iter_mut()
                    .zip(params.par_iter())
                    .enumerate()
                    .map(|(index, (spectrum, params))| -> Result<bool> {
                        tracker.checkpoint(index)?;
                        let reversed = match params {
                            Some(params) => convert_spectrum(&converter, spectrum, params)?,
                            None => {
                                mask(spectrum);
                                false
                            }
                        };
                        tracker.tick();
                        Ok(reversed)
                    })
                    .collect::<Result<Vec<bool>>>()?;
                flags.into_iter().any(|r| r)
            }
        };

        if !masked.is_empty() {
            warn!(
                "{} of {} spectra masked during conversion to {}",
                masked.len(),
                workspace.num_spectra(),
                converter.dest().id()
            );
        }
        workspace.unit = converter.dest().id().to_string();

        Ok(ConversionReport {
            converted: workspace.num_spectra() - masked.len(),
            masked,
            // Masked spectra get their own zeroed edges and break the aliasing
            shared_bins: workspace.has_shared_bins(),
            reversed,
        })
    }
}

/// Looks up one spectrum's detector and checks both units accept it.
///
/// Spectrum-local failures come back as the inner error so the caller can
/// mask the spectrum; anything else aborts.
fn lookup_params(
    converter: &UnitConverter,
    geometry: &dyn DetectorGeometry,
    index: usize,
    spectrum: &EventList,
) -> Result<std::result::Result<DetectorParams, SpectrumError>> {
    let outcome = geometry
        .detector_params(spectrum.detector_id)
        .and_then(|params| converter.validate(&params).map(|()| params));
    match outcome {
        Ok(params) => Ok(Ok(params)),
        Err(error) if error.is_spectrum_local() => Ok(Err(SpectrumError {
            index,
            detector_id: spectrum.detector_id,
            error,
        })),
        Err(error) => Err(error),
    }
}

/// Returns the quick conversion every usable spectrum agrees on, if any.
fn common_quick_conversion(
    converter: &UnitConverter,
    params: &[Option<DetectorParams>],
) -> Option<QuickConversion> {
    let mut usable = params.iter().flatten();
    let first = converter.quick_conversion(usable.next()?.emode)?;
    usable
        .all(|p| converter.quick_conversion(p.emode) == Some(first))
        .then_some(first)
}

fn convert_spectrum(
    converter: &UnitConverter,
    spectrum: &mut EventList,
    params: &DetectorParams,
) -> Result<bool> {
    let x = Arc::make_mut(&mut spectrum.x);
    let reversed = converter.convert(x, params)?.order_reversed();
    if reversed {
        x.reverse();
    }
    converter.convert_events(&mut spectrum.events, params)?;
    Ok(reversed)
}

fn mask(spectrum: &mut EventList) {
    spectrum.mask();
    spectrum.x = Arc::new(vec![0.0; spectrum.x.len()]);
}
