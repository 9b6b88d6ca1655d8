//! rustevent-filter: Splitting event data by time interval.
//!
//! - [`SplitterTable`] - validated, sorted, disjoint `[start, stop)` intervals
//! - [`EventSplitter`] - routes one spectrum's events to per-target sinks
//! - [`CorrectionMode`] - per-detector TOF correction for full-time splitting
//! - [`FilterEvents`] - splits a whole workspace in parallel
//!
#![warn(missing_docs)]

mod correction;
mod event_splitter;
mod filter_events;
mod splitter;

pub use correction::{CorrectionMode, CorrectionTable, TofCorrection};
pub use event_splitter::{EventSplitter, SplitDestinations, SplitMode};
pub use filter_events::{FilterConfig, FilterEvents, FilterResult};
pub use splitter::{Splitter, SplitterTable, EXCLUDED_TARGET};
