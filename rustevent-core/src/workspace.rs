//! Event lists, event workspaces and histograms.
//!
//! Bin edges are held behind an `Arc` so spectra with common binning can
//! alias one X array instead of carrying a copy each.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::geometry::DetectorId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events recorded by one detector pixel, with the spectrum's bin edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    /// Detector the events came from.
    pub detector_id: DetectorId,
    /// Bin edges, possibly shared with other spectra.
    pub x: Arc<Vec<f64>>,
    /// Events in acquisition order.
    pub events: Vec<Event>,
    /// Whether the spectrum has been masked.
    #[serde(default)]
    pub masked: bool,
}

impl EventList {
    /// Creates an empty list for a detector.
    #[must_use]
    pub fn new(detector_id: DetectorId, x: Arc<Vec<f64>>) -> Self {
        Self {
            detector_id,
            x,
            events: Vec::new(),
            masked: false,
        }
    }

    /// Creates an empty list with the same detector and bin edges as `self`.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self::new(self.detector_id, Arc::clone(&self.x))
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if there are no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pushes a single event.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Appends all events from another list.
    pub fn append(&mut self, other: &EventList) {
        self.events.extend_from_slice(&other.events);
    }

    /// Sum of event weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.events.iter().map(|e| e.weight).sum()
    }

    /// Drops all events and flags the spectrum as masked.
    pub fn mask(&mut self) {
        self.events.clear();
        self.masked = true;
    }
}

/// Unit id of time-of-flight in microseconds.
pub const TOF_UNIT: &str = "TOF";

/// A collection of event lists sharing one X unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventWorkspace {
    /// Unit id of the X axis and event coordinates.
    pub unit: String,
    /// One event list per spectrum, indexed by workspace index.
    pub spectra: Vec<EventList>,
}

impl EventWorkspace {
    /// Creates an empty workspace in the given unit.
    #[must_use]
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            spectra: Vec::new(),
        }
    }

    /// Number of spectra.
    #[must_use]
    pub fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Total number of events across all spectra.
    #[must_use]
    pub fn num_events(&self) -> usize {
        self.spectra.iter().map(EventList::len).sum()
    }

    /// Returns true if every spectrum aliases the same bin-edge array.
    #[must_use]
    pub fn has_shared_bins(&self) -> bool {
        match self.spectra.split_first() {
            Some((first, rest)) => rest.iter().all(|s| Arc::ptr_eq(&first.x, &s.x)),
            None => false,
        }
    }

    /// Makes spectra with identical bin edges alias a single array.
    ///
    /// Returns true if all spectra now share one array.
    pub fn share_common_bins(&mut self) -> bool {
        let Some(first) = self.spectra.first().map(|s| Arc::clone(&s.x)) else {
            return false;
        };
        if self.spectra.iter().any(|s| s.x != first) {
            return false;
        }
        for spectrum in &mut self.spectra {
            spectrum.x = Arc::clone(&first);
        }
        true
    }
}

/// Binned data: `n + 1` edges with `n` counts and errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges.
    pub x: Vec<f64>,
    /// Counts (or count rates when `distribution` is set).
    pub y: Vec<f64>,
    /// Errors on `y`.
    pub e: Vec<f64>,
    /// Whether `y`/`e` are divided by bin width.
    #[serde(default)]
    pub distribution: bool,
}

impl Histogram {
    /// Creates a histogram after checking the array lengths agree.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if `y`/`e` are not one shorter than `x`.
    pub fn new(x: Vec<f64>, y: Vec<f64>, e: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() + 1 || y.len() != e.len() {
            return Err(Error::InvalidInput(format!(
                "histogram needs len(x) == len(y) + 1 == len(e) + 1, got {}, {}, {}",
                x.len(),
                y.len(),
                e.len()
            )));
        }
        Ok(Self {
            x,
            y,
            e,
            distribution: false,
        })
    }

    /// Marks the data as a distribution.
    #[must_use]
    pub fn as_distribution(mut self) -> Self {
        self.distribution = true;
        self
    }

    /// Number of bins.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.y.len()
    }

    /// Absolute width of each bin.
    #[must_use]
    pub fn bin_widths(&self) -> Vec<f64> {
        self.x.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
    }
}
