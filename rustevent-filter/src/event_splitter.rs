//! Partitioning one spectrum's events across splitter targets.

use crate::correction::TofCorrection;
use crate::splitter::{Splitter, SplitterTable};
use rustevent_core::{DateAndTime, Error, Event, Result};
use std::collections::BTreeMap;

/// Which timestamp of an event is compared against the splitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Pulse time only. Faster, but blind to where in the pulse the event arrived.
    PulseTime,
    /// Pulse time plus the corrected TOF.
    #[default]
    FullTime,
}

/// Output sinks for one spectrum: one per target plus the unfiltered sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitDestinations {
    sinks: BTreeMap<i32, Vec<Event>>,
    unfiltered: Vec<Event>,
}

impl SplitDestinations {
    /// Empty sinks for the given targets.
    #[must_use]
    pub fn new(targets: impl IntoIterator<Item = i32>) -> Self {
        Self {
            sinks: targets.into_iter().map(|t| (t, Vec::new())).collect(),
            unfiltered: Vec::new(),
        }
    }

    /// Events routed to `target`, if the target has a sink.
    #[must_use]
    pub fn sink(&self, target: i32) -> Option<&[Event]> {
        self.sinks.get(&target).map(Vec::as_slice)
    }

    /// Events that matched no interval or an excluded one.
    #[must_use]
    pub fn unfiltered(&self) -> &[Event] {
        &self.unfiltered
    }

    /// Returns true if a sink exists for `target`.
    #[must_use]
    pub fn has_target(&self, target: i32) -> bool {
        self.sinks.contains_key(&target)
    }

    /// Events across every sink, unfiltered included.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.sinks.values().map(Vec::len).sum::<usize>() + self.unfiltered.len()
    }

    /// Event count per target.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<i32, usize> {
        self.sinks.iter().map(|(&t, v)| (t, v.len())).collect()
    }

    /// Consumes the destinations into the per-target sinks and the unfiltered sink.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<i32, Vec<Event>>, Vec<Event>) {
        (self.sinks, self.unfiltered)
    }

    fn route(&mut self, target: Option<i32>, event: Event) {
        match target.and_then(|t| self.sinks.get_mut(&t)) {
            Some(sink) => sink.push(event),
            None => self.unfiltered.push(event),
        }
    }
}

/// Routes events to targets by the splitter interval their time falls in.
#[derive(Debug, Clone)]
pub struct EventSplitter {
    table: SplitterTable,
    mode: SplitMode,
}

impl EventSplitter {
    /// Creates a splitter over a validated table.
    #[must_use]
    pub fn new(table: SplitterTable, mode: SplitMode) -> Self {
        Self { table, mode }
    }

    /// The splitter table.
    #[must_use]
    pub fn table(&self) -> &SplitterTable {
        &self.table
    }

    /// The comparison mode.
    #[must_use]
    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Empty destinations with one sink per target in the table.
    #[must_use]
    pub fn destinations(&self) -> SplitDestinations {
        SplitDestinations::new(self.table.targets())
    }

    /// Time compared against the splitters for `event`.
    ///
    /// `None` when the corrected full time is not representable; such
    /// events are routed to the unfiltered sink.
    #[inline]
    #[must_use]
    pub fn comparison_time(
        &self,
        event: &Event,
        correction: TofCorrection,
    ) -> Option<DateAndTime> {
        match self.mode {
            SplitMode::PulseTime => Some(event.pulse_time),
            SplitMode::FullTime => correction.apply(event),
        }
    }

    /// Appends each event to the sink of the interval containing its time.
    ///
    /// Events keep their relative order within every sink. Events outside
    /// all intervals, or inside an excluded one, go to the unfiltered sink.
    /// `correction` is ignored in [`SplitMode::PulseTime`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] before touching any sink if
    /// `destinations` lacks a sink for one of the table's targets.
    pub fn split_into(
        &self,
        events: &[Event],
        correction: TofCorrection,
        destinations: &mut SplitDestinations,
    ) -> Result<()> {
        if let Some(missing) = self
            .table
            .targets()
            .into_iter()
            .find(|&t| !destinations.has_target(t))
        {
            return Err(Error::InvalidInput(format!(
                "no destination for splitter target {missing}"
            )));
        }

        self.route_all(events, correction, destinations);
        Ok(())
    }

    /// Splits `events` into fresh destinations.
    #[must_use]
    pub fn split(&self, events: &[Event], correction: TofCorrection) -> SplitDestinations {
        let mut destinations = self.destinations();
        self.route_all(events, correction, &mut destinations);
        destinations
    }

    /// Routing loop shared by [`split`](Self::split) and
    /// [`split_into`](Self::split_into). `destinations` must cover every target.
    fn route_all(
        &self,
        events: &[Event],
        correction: TofCorrection,
        destinations: &mut SplitDestinations,
    ) {
        let splitters = self.table.as_slice();
        // Events are usually time ordered, so the previous hit is checked first
        let mut last: Option<usize> = None;
        for event in events {
            let hit = self.comparison_time(event, correction).and_then(|t| match last {
                Some(i) if splitters[i].contains(t) => Some(i),
                _ => self.table.position(t),
            });
            if hit.is_some() {
                last = hit;
            }
            let target = hit
                .map(|i| &splitters[i])
                .filter(|s| !s.is_excluded())
                .map(|s| s.target);
            destinations.route(target, *event);
        }
    }

    /// Splitters feeding `target`, for splitting per-output time series.
    #[must_use]
    pub fn generate_subset_for(&self, target: i32) -> Vec<Splitter> {
        self.table.subset_for(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(i64, i64, i32)]) -> SplitterTable {
        SplitterTable::new(
            rows.iter()
                .map(|&(a, b, t)| Splitter::new(DateAndTime(a), DateAndTime(b), t))
                .collect(),
        )
        .unwrap()
    }

    fn at(ns: i64) -> Event {
        Event::new(DateAndTime(ns), 0.0)
    }

    #[test]
    fn test_boundary_tie_break() {
        let splitter = EventSplitter::new(table(&[(0, 10, 0), (20, 30, 1)]), SplitMode::PulseTime);
        let events = [at(0), at(10), at(20), at(30)];
        let out = splitter.split(&events, TofCorrection::IDENTITY);

        assert_eq!(out.sink(0).unwrap(), &[at(0)]);
        assert_eq!(out.sink(1).unwrap(), &[at(20)]);
        assert_eq!(out.unfiltered(), &[at(10), at(30)]);
    }

    #[test]
    fn test_excluded_interval_goes_unfiltered() {
        let splitter = EventSplitter::new(table(&[(0, 10, -1), (10, 20, 0)]), SplitMode::PulseTime);
        let out = splitter.split(&[at(5), at(15)], TofCorrection::IDENTITY);

        assert_eq!(out.counts(), BTreeMap::from([(0, 1)]));
        assert_eq!(out.unfiltered(), &[at(5)]);
        assert!(out.sink(-1).is_none());
    }

    #[test]
    fn test_full_time_uses_correction() {
        // Pulse at 0, TOF 8 µs: full time 8000 ns, or 4000 ns with factor 0.5
        let splitter =
            EventSplitter::new(table(&[(0, 5_000, 0), (5_000, 10_000, 1)]), SplitMode::FullTime);
        let event = Event::new(DateAndTime(0), 8.0);

        let raw = splitter.split(&[event], TofCorrection::IDENTITY);
        assert_eq!(raw.sink(1).unwrap().len(), 1);

        let corrected = splitter.split(&[event], TofCorrection::new(0.5, 0.0));
        assert_eq!(corrected.sink(0).unwrap().len(), 1);

        let shifted = splitter.split(&[event], TofCorrection::new(1.0, 3.0));
        assert_eq!(shifted.unfiltered().len(), 1);

        // Pulse time mode ignores the TOF entirely
        let by_pulse = EventSplitter::new(splitter.table().clone(), SplitMode::PulseTime)
            .split(&[event], TofCorrection::new(1.0, 3.0));
        assert_eq!(by_pulse.sink(0).unwrap().len(), 1);
    }

    #[test]
    fn test_unrepresentable_full_time_goes_unfiltered() {
        let splitter = EventSplitter::new(table(&[(0, i64::MAX, 0)]), SplitMode::FullTime);
        let events = [
            Event::new(DateAndTime(0), f64::INFINITY),
            Event::new(DateAndTime(0), f64::NAN),
            Event::new(DateAndTime(0), 1.0),
        ];
        let out = splitter.split(&events, TofCorrection::IDENTITY);
        assert_eq!(out.sink(0).unwrap().len(), 1);
        assert_eq!(out.unfiltered().len(), 2);
        assert_eq!(splitter.comparison_time(&events[0], TofCorrection::IDENTITY), None);

        // Pulse time mode never looks at the TOF
        let by_pulse = EventSplitter::new(splitter.table().clone(), SplitMode::PulseTime)
            .split(&events, TofCorrection::IDENTITY);
        assert_eq!(by_pulse.sink(0).unwrap().len(), 3);
    }

    #[test]
    fn test_split_into_matches_split() {
        let splitter = EventSplitter::new(
            table(&[(0, 10, 0), (10, 20, 1), (25, 40, 0), (40, 41, -1)]),
            SplitMode::PulseTime,
        );
        let events: Vec<_> = [39, 3, 40, 12, 0, 27, 19, 45, 10, 24, 30]
            .into_iter()
            .map(at)
            .collect();

        let mut into = splitter.destinations();
        splitter
            .split_into(&events, TofCorrection::IDENTITY, &mut into)
            .unwrap();
        assert_eq!(into, splitter.split(&events, TofCorrection::IDENTITY));
        assert_eq!(into.total_len(), events.len());
    }

    #[test]
    fn test_split_into_appends() {
        let splitter = EventSplitter::new(table(&[(0, 10, 0)]), SplitMode::PulseTime);
        let mut out = splitter.destinations();
        splitter
            .split_into(&[at(1)], TofCorrection::IDENTITY, &mut out)
            .unwrap();
        splitter
            .split_into(&[at(2), at(11)], TofCorrection::IDENTITY, &mut out)
            .unwrap();
        assert_eq!(out.sink(0).unwrap(), &[at(1), at(2)]);
        assert_eq!(out.unfiltered(), &[at(11)]);
    }

    #[test]
    fn test_missing_destination_leaves_sinks_untouched() {
        let splitter = EventSplitter::new(table(&[(0, 10, 0), (10, 20, 1)]), SplitMode::PulseTime);
        let mut out = SplitDestinations::new([0]);
        let err = splitter
            .split_into(&[at(1), at(12)], TofCorrection::IDENTITY, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(out.total_len(), 0);
    }

    #[test]
    fn test_generate_subset_for() {
        let splitter =
            EventSplitter::new(table(&[(0, 10, 0), (10, 20, 1), (20, 30, 0)]), SplitMode::FullTime);
        let subset = splitter.generate_subset_for(0);
        assert_eq!(subset.len(), 2);
        assert!(subset.iter().all(|s| s.target == 0));
    }
}
