//! Parallel splitting of a whole event workspace.
//!
//! Every spectrum is split independently into per-spectrum sinks, then the
//! sinks are gathered into one output workspace per target. Output spectra
//! keep the input's workspace indices, detector ids and bin edges.

use crate::correction::{CorrectionMode, TofCorrection};
use crate::event_splitter::{EventSplitter, SplitDestinations, SplitMode};
use crate::splitter::SplitterTable;
use log::{debug, warn};
use rayon::prelude::*;
use rustevent_core::{
    CancellationToken, DetectorGeometry, Error, EventList, EventWorkspace, ProgressReporter,
    Result, SpectrumError, SpectrumProgress, TOF_UNIT,
};
use std::collections::BTreeMap;

/// Configuration for workspace splitting.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// Timestamp compared against the splitters.
    pub mode: SplitMode,
    /// Per-detector TOF correction in [`SplitMode::FullTime`].
    pub correction: CorrectionMode,
    /// Build a workspace for events no target claimed.
    pub keep_unfiltered: bool,
    /// Number output names from 1 instead of 0.
    pub index_from_one: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: SplitMode::FullTime,
            correction: CorrectionMode::None,
            keep_unfiltered: true,
            index_from_one: false,
        }
    }
}

impl FilterConfig {
    /// Sets the comparison mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SplitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the TOF correction.
    #[must_use]
    pub fn with_correction(mut self, correction: CorrectionMode) -> Self {
        self.correction = correction;
        self
    }

    /// Sets whether the unfiltered workspace is built.
    #[must_use]
    pub fn with_unfiltered(mut self, keep: bool) -> Self {
        self.keep_unfiltered = keep;
        self
    }

    /// Sets whether output names count from 1.
    #[must_use]
    pub fn with_index_from_one(mut self, from_one: bool) -> Self {
        self.index_from_one = from_one;
        self
    }

    /// Name of the output for `target`, e.g. `run_0`.
    #[must_use]
    pub fn output_name(&self, base: &str, target: i32) -> String {
        let index = if self.index_from_one {
            target + 1
        } else {
            target
        };
        format!("{base}_{index}")
    }

    /// Name of the unfiltered output.
    #[must_use]
    pub fn unfiltered_name(base: &str) -> String {
        format!("{base}_unfiltered")
    }
}

/// Workspaces produced by [`FilterEvents::run`].
#[derive(Debug, Default)]
pub struct FilterResult {
    /// One workspace per target.
    pub outputs: BTreeMap<i32, EventWorkspace>,
    /// Events no target claimed, if requested.
    pub unfiltered: Option<EventWorkspace>,
    /// Spectra whose correction could not be determined. Their events are
    /// dropped from every output.
    pub skipped: Vec<SpectrumError>,
}

impl FilterResult {
    /// Event count per target.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<i32, usize> {
        self.outputs
            .iter()
            .map(|(&t, ws)| (t, ws.num_events()))
            .collect()
    }

    /// Events across all outputs, unfiltered included.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.outputs
            .values()
            .chain(self.unfiltered.as_ref())
            .map(EventWorkspace::num_events)
            .sum()
    }
}

/// Splits event workspaces by time interval.
#[derive(Clone, Debug)]
pub struct FilterEvents {
    splitter: EventSplitter,
    config: FilterConfig,
}

impl FilterEvents {
    /// Creates a driver for a validated splitter table.
    #[must_use]
    pub fn new(table: SplitterTable, config: FilterConfig) -> Self {
        Self {
            splitter: EventSplitter::new(table, config.mode),
            config,
        }
    }

    /// The per-spectrum splitter.
    #[must_use]
    pub fn splitter(&self) -> &EventSplitter {
        &self.splitter
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Splits every spectrum of `workspace` across the splitter targets.
    ///
    /// Spectra whose detector is unknown or lacks efixed for the correction
    /// are skipped and listed in the result. The input is left untouched.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if full-time splitting is asked of a
    /// workspace whose unit is not TOF, or if the correction needs geometry
    /// that was not given or is misconfigured. Returns [`Error::Cancelled`]
    /// if `cancel` fires.
    pub fn run(
        &self,
        workspace: &EventWorkspace,
        geometry: Option<&dyn DetectorGeometry>,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<FilterResult> {
        let correction = match self.splitter.mode() {
            SplitMode::PulseTime => None,
            SplitMode::FullTime => Some(&self.config.correction),
        };
        if let Some(mode) = correction {
            if workspace.unit != TOF_UNIT {
                return Err(Error::InvalidInput(format!(
                    "full-time splitting needs a {TOF_UNIT} workspace, got '{}'",
                    workspace.unit
                )));
            }
            mode.validate()?;
            if mode.needs_geometry() && geometry.is_none() {
                return Err(Error::InvalidInput(
                    "TOF correction requires detector geometry".into(),
                ));
            }
        }

        let tracker = SpectrumProgress::new(progress, cancel, workspace.num_spectra());
        let split = workspace
            .spectra
            .par_iter()
            .enumerate()
            .map(|(index, spectrum)| -> Result<_> {
                tracker.checkpoint(index)?;
                let outcome = match correction {
                    None => self.split_spectrum(spectrum, TofCorrection::IDENTITY),
                    Some(mode) => match mode.correction_for(spectrum.detector_id, geometry) {
                        Ok(c) => self.split_spectrum(spectrum, c),
                        Err(error) if error.is_spectrum_local() => Ok(Err(SpectrumError {
                            index,
                            detector_id: spectrum.detector_id,
                            error,
                        })),
                        Err(error) => Err(error),
                    },
                };
                tracker.tick();
                outcome
            })
            .collect::<Result<Vec<_>>>()?;

        let result = self.assemble(workspace, split);
        debug!(
            "split {} events from {} spectra into {} targets",
            result.total_events(),
            workspace.num_spectra(),
            result.outputs.len()
        );
        if !result.skipped.is_empty() {
            warn!(
                "{} of {} spectra skipped while filtering events",
                result.skipped.len(),
                workspace.num_spectra()
            );
        }
        Ok(result)
    }

    fn split_spectrum(
        &self,
        spectrum: &EventList,
        correction: TofCorrection,
    ) -> Result<std::result::Result<SplitDestinations, SpectrumError>> {
        let mut destinations = self.splitter.destinations();
        self.splitter
            .split_into(&spectrum.events, correction, &mut destinations)?;
        Ok(Ok(destinations))
    }

    /// Moves per-spectrum sinks into output workspaces at the same index.
    fn assemble(
        &self,
        workspace: &EventWorkspace,
        split: Vec<std::result::Result<SplitDestinations, SpectrumError>>,
    ) -> FilterResult {
        let mut outputs: BTreeMap<i32, EventWorkspace> = self
            .splitter
            .table()
            .targets()
            .into_iter()
            .map(|t| (t, empty_output(workspace)))
            .collect();
        let mut unfiltered = self
            .config
            .keep_unfiltered
            .then(|| empty_output(workspace));
        let mut skipped = Vec::new();

        for (index, outcome) in split.into_iter().enumerate() {
            match outcome {
                Ok(destinations) => {
                    let (sinks, rest) = destinations.into_parts();
                    for (target, events) in sinks {
                        if let Some(output) = outputs.get_mut(&target) {
                            output.spectra[index].events = events;
                        }
                    }
                    if let Some(output) = unfiltered.as_mut() {
                        output.spectra[index].events = rest;
                    }
                }
                Err(err) => {
                    for output in outputs.values_mut().chain(unfiltered.as_mut()) {
                        output.spectra[index].mask();
                    }
                    skipped.push(err);
                }
            }
        }

        FilterResult {
            outputs,
            unfiltered,
            skipped,
        }
    }
}

fn empty_output(workspace: &EventWorkspace) -> EventWorkspace {
    EventWorkspace {
        unit: workspace.unit.clone(),
        spectra: workspace
            .spectra
            .iter()
            .map(|s| EventList {
                masked: s.masked,
                ..s.empty_like()
            })
            .collect(),
    }
}
