//! Splitting intervals and the validated table that holds them.

use rustevent_core::{DateAndTime, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Target index marking an interval whose events are explicitly excluded.
pub const EXCLUDED_TARGET: i32 = -1;

/// A labeled closed-open time interval `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splitter {
    /// First instant inside the interval.
    pub start: DateAndTime,
    /// First instant after the interval.
    pub stop: DateAndTime,
    /// Output the interval feeds, or [`EXCLUDED_TARGET`].
    pub target: i32,
}

impl Splitter {
    /// Creates a splitter. Validation happens when it joins a [`SplitterTable`].
    #[inline]
    #[must_use]
    pub fn new(start: DateAndTime, stop: DateAndTime, target: i32) -> Self {
        Self {
            start,
            stop,
            target,
        }
    }

    /// Returns true if `t` lies in `[start, stop)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, t: DateAndTime) -> bool {
        self.start <= t && t < self.stop
    }

    /// Interval length in nanoseconds.
    #[inline]
    #[must_use]
    pub fn duration_ns(&self) -> i64 {
        self.stop - self.start
    }

    /// Returns true if events in this interval go to no output.
    #[inline]
    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.target == EXCLUDED_TARGET
    }
}

/// Splitters sorted by start time and pairwise disjoint.
///
/// The only way to obtain a table is through a validating constructor, so
/// every table handed to an [`EventSplitter`](crate::EventSplitter) already
/// satisfies the ordering the lookup relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitterTable {
    splitters: Vec<Splitter>,
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonSplitters {
    Absolute {
        splitters: Vec<JsonAbsoluteRow>,
    },
    Relative {
        run_start_ns: i64,
        relative: Vec<JsonRelativeRow>,
    },
    Boundaries {
        boundaries_ns: Vec<i64>,
        targets: Vec<i32>,
    },
}

#[derive(Deserialize)]
struct JsonAbsoluteRow {
    start_ns: i64,
    stop_ns: i64,
    target: i32,
}

#[derive(Deserialize)]
struct JsonRelativeRow {
    start: f64,
    stop: f64,
    target: i32,
}

impl SplitterTable {
    /// Builds a table from splitters that must already be sorted.
    ///
    /// # Errors
    /// Returns [`Error::MalformedSplitters`] if any interval is empty or
    /// inverted, has a target below [`EXCLUDED_TARGET`], starts before its
    /// predecessor or overlaps it.
    pub fn new(splitters: Vec<Splitter>) -> Result<Self> {
        for (i, s) in splitters.iter().enumerate() {
            if s.start >= s.stop {
                return Err(Error::MalformedSplitters(format!(
                    "splitter {i} has start {} >= stop {}",
                    s.start.nanoseconds(),
                    s.stop.nanoseconds()
                )));
            }
            if s.target < EXCLUDED_TARGET {
                return Err(Error::MalformedSplitters(format!(
                    "splitter {i} has invalid target {}",
                    s.target
                )));
            }
        }
        for (i, pair) in splitters.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start < prev.start {
                return Err(Error::MalformedSplitters(format!(
                    "splitter {} starts before splitter {i}",
                    i + 1
                )));
            }
            if next.start < prev.stop {
                return Err(Error::MalformedSplitters(format!(
                    "splitter {} overlaps splitter {i}",
                    i + 1
                )));
            }
        }
        Ok(Self { splitters })
    }

    /// Sorts by start time, then validates.
    ///
    /// # Errors
    /// Same as [`SplitterTable::new`]; overlaps are not merged.
    pub fn from_unsorted(mut splitters: Vec<Splitter>) -> Result<Self> {
        splitters.sort_by_key(|s| (s.start, s.stop));
        Self::new(splitters)
    }

    /// Builds a table from `N + 1` ascending boundaries and `N` targets.
    ///
    /// Interval `i` is `[boundaries[i], boundaries[i + 1])` feeding `targets[i]`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedSplitters`] if the lengths disagree or the
    /// boundaries are not strictly increasing.
    pub fn from_boundaries(boundaries: &[DateAndTime], targets: &[i32]) -> Result<Self> {
        if boundaries.len() != targets.len() + 1 {
            return Err(Error::MalformedSplitters(format!(
                "{} boundaries cannot delimit {} intervals",
                boundaries.len(),
                targets.len()
            )));
        }
        let splitters = boundaries
            .windows(2)
            .zip(targets)
            .map(|(edge, &target)| Splitter::new(edge[0], edge[1], target))
            .collect();
        Self::new(splitters)
    }

    /// Builds a table from `(start, stop, target)` rows in seconds relative
    /// to `run_start`. Rows may be in any order.
    ///
    /// # Errors
    /// Returns [`Error::MalformedSplitters`] if a boundary is not finite or
    /// does not fit the timestamp range once added to `run_start`, and
    /// otherwise the same as [`SplitterTable::from_unsorted`].
    pub fn from_relative_seconds(
        run_start: DateAndTime,
        rows: &[(f64, f64, i32)],
    ) -> Result<Self> {
        let absolute = |seconds: f64| {
            DateAndTime::checked_from_seconds(seconds)
                .and_then(|offset| run_start.checked_add(offset.nanoseconds()))
        };
        let splitters = rows
            .iter()
            .enumerate()
            .map(|(i, &(start, stop, target))| match (absolute(start), absolute(stop)) {
                (Some(start), Some(stop)) => Ok(Splitter::new(start, stop, target)),
                _ => Err(Error::MalformedSplitters(format!(
                    "splitter row {i} is out of range: [{start}, {stop}) s"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_unsorted(splitters)
    }

    /// Load a table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the splitters are malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let json: JsonSplitters = serde_json::from_reader(BufReader::new(file))?;
        Self::from_json_splitters(json)
    }

    /// Load a table from a JSON string.
    ///
    /// Accepts absolute rows (`{"splitters": [{"start_ns", "stop_ns", "target"}]}`),
    /// rows relative to a run start (`{"run_start_ns", "relative": [{"start", "stop", "target"}]}`
    /// in seconds) or boundary form (`{"boundaries_ns": [...], "targets": [...]}`).
    ///
    /// # Errors
    /// Returns an error if the JSON matches none of the forms or the splitters are malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonSplitters = serde_json::from_str(json)?;
        Self::from_json_splitters(json)
    }

    fn from_json_splitters(json: JsonSplitters) -> Result<Self> {
        match json {
            JsonSplitters::Absolute { splitters } => Self::from_unsorted(
                splitters
                    .into_iter()
                    .map(|row| {
                        Splitter::new(
                            DateAndTime(row.start_ns),
                            DateAndTime(row.stop_ns),
                            row.target,
                        )
                    })
                    .collect(),
            ),
            JsonSplitters::Relative {
                run_start_ns,
                relative,
            } => {
                let rows: Vec<_> = relative
                    .into_iter()
                    .map(|row| (row.start, row.stop, row.target))
                    .collect();
                Self::from_relative_seconds(DateAndTime(run_start_ns), &rows)
            }
            JsonSplitters::Boundaries {
                boundaries_ns,
                targets,
            } => {
                let boundaries: Vec<_> = boundaries_ns.into_iter().map(DateAndTime).collect();
                Self::from_boundaries(&boundaries, &targets)
            }
        }
    }

    /// Number of splitters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.splitters.len()
    }

    /// Returns true if the table has no splitters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.splitters.is_empty()
    }

    /// The sorted splitters.
    #[must_use]
    pub fn as_slice(&self) -> &[Splitter] {
        &self.splitters
    }

    /// Iterates the splitters in start order.
    pub fn iter(&self) -> impl Iterator<Item = &Splitter> {
        self.splitters.iter()
    }

    /// Output targets named by the table, excluding [`EXCLUDED_TARGET`].
    #[must_use]
    pub fn targets(&self) -> BTreeSet<i32> {
        self.splitters
            .iter()
            .filter(|s| !s.is_excluded())
            .map(|s| s.target)
            .collect()
    }

    /// Index of the splitter containing `t`, by binary search.
    #[must_use]
    pub fn position(&self, t: DateAndTime) -> Option<usize> {
        let after = self.splitters.partition_point(|s| s.start <= t);
        let candidate = after.checked_sub(1)?;
        self.splitters[candidate].contains(t).then_some(candidate)
    }

    /// Splitter containing `t`, by binary search.
    #[must_use]
    pub fn find(&self, t: DateAndTime) -> Option<&Splitter> {
        self.position(t).map(|i| &self.splitters[i])
    }

    /// Splitter containing `t`, by scanning every interval.
    #[must_use]
    pub fn find_linear(&self, t: DateAndTime) -> Option<&Splitter> {
        self.splitters.iter().find(|s| s.contains(t))
    }

    /// Splitters feeding `target`, in start order.
    #[must_use]
    pub fn subset_for(&self, target: i32) -> Vec<Splitter> {
        self.splitters
            .iter()
            .filter(|s| s.target == target)
            .copied()
            .collect()
    }
}

impl<'a> IntoIterator for &'a SplitterTable {
    type Item = &'a Splitter;
    type IntoIter = std::slice::Iter<'a, Splitter>;

    fn into_iter(self) -> Self::IntoIter {
        self.splitters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(start: i64, stop: i64, target: i32) -> Splitter {
        Splitter::new(DateAndTime(start), DateAndTime(stop), target)
    }

    #[test]
    fn test_rejects_degenerate_intervals() {
        assert!(matches!(
            SplitterTable::new(vec![s(10, 10, 0)]),
            Err(Error::MalformedSplitters(_))
        ));
        assert!(matches!(
            SplitterTable::new(vec![s(20, 10, 0)]),
            Err(Error::MalformedSplitters(_))
        ));
        assert!(matches!(
            SplitterTable::new(vec![s(0, 10, -2)]),
            Err(Error::MalformedSplitters(_))
        ));
    }

    #[test]
    fn test_rejects_unsorted_and_overlapping() {
        let err = SplitterTable::new(vec![s(10, 20, 0), s(0, 5, 1)]).unwrap_err();
        assert!(err.to_string().contains("starts before"), "{err}");

        let err = SplitterTable::new(vec![s(0, 10, 0), s(5, 20, 1)]).unwrap_err();
        assert!(err.to_string().contains("overlaps"), "{err}");

        // Sorting does not hide an overlap
        assert!(SplitterTable::from_unsorted(vec![s(5, 20, 1), s(0, 10, 0)]).is_err());
    }

    #[test]
    fn test_adjacent_intervals_are_valid() {
        let table = SplitterTable::from_unsorted(vec![s(10, 20, 1), s(0, 10, 0)]).unwrap();
        assert_eq!(table.as_slice(), &[s(0, 10, 0), s(10, 20, 1)]);
    }

    #[test]
    fn test_find_closed_open() {
        let table = SplitterTable::new(vec![s(0, 10, 0), s(10, 20, 1), s(30, 40, -1)]).unwrap();

        assert_eq!(table.find(DateAndTime(0)).map(|s| s.target), Some(0));
        assert_eq!(table.find(DateAndTime(9)).map(|s| s.target), Some(0));
        assert_eq!(table.find(DateAndTime(10)).map(|s| s.target), Some(1));
        assert_eq!(table.find(DateAndTime(20)), None);
        assert_eq!(table.find(DateAndTime(25)), None);
        assert_eq!(table.find(DateAndTime(30)).map(|s| s.target), Some(-1));
        assert_eq!(table.find(DateAndTime(-1)), None);
        assert_eq!(table.find(DateAndTime(40)), None);
    }

    #[test]
    fn test_find_matches_linear_scan() {
        let table =
            SplitterTable::new(vec![s(-50, -20, 2), s(0, 10, 0), s(15, 16, 1), s(16, 90, 0)])
                .unwrap();
        for t in -60..100 {
            assert_eq!(
                table.find(DateAndTime(t)),
                table.find_linear(DateAndTime(t)),
                "t = {t}"
            );
        }
    }

    #[test]
    fn test_empty_table_finds_nothing() {
        let table = SplitterTable::default();
        assert!(table.is_empty());
        assert_eq!(table.find(DateAndTime(0)), None);
        assert!(table.targets().is_empty());
    }

    #[test]
    fn test_from_boundaries() {
        let edges: Vec<_> = [0, 10, 20, 35].into_iter().map(DateAndTime).collect();
        let table = SplitterTable::from_boundaries(&edges, &[0, -1, 1]).unwrap();
        assert_eq!(table.as_slice(), &[s(0, 10, 0), s(10, 20, -1), s(20, 35, 1)]);

        assert!(SplitterTable::from_boundaries(&edges, &[0, 1]).is_err());

        let repeated: Vec<_> = [0, 10, 10].into_iter().map(DateAndTime).collect();
        assert!(SplitterTable::from_boundaries(&repeated, &[0, 1]).is_err());
    }

    #[test]
    fn test_from_relative_seconds() {
        let run_start = DateAndTime::from_seconds(100.0);
        let table =
            SplitterTable::from_relative_seconds(run_start, &[(10.0, 20.0, 1), (0.0, 10.0, 0)])
                .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.as_slice()[0].start, DateAndTime::from_seconds(100.0));
        assert_eq!(table.as_slice()[1].stop, DateAndTime::from_seconds(120.0));
    }

    #[test]
    fn test_from_relative_seconds_out_of_range() {
        let run_start = DateAndTime::from_seconds(100.0);
        for row in [
            (0.0, 1e11, 0),
            (-1e11, 0.0, 0),
            (0.0, f64::INFINITY, 0),
            (f64::NAN, 1.0, 0),
        ] {
            assert!(matches!(
                SplitterTable::from_relative_seconds(run_start, &[row]),
                Err(Error::MalformedSplitters(_))
            ));
        }
        // In range on its own but overflows once offset by the run start
        assert!(matches!(
            SplitterTable::from_relative_seconds(DateAndTime(i64::MAX - 10), &[(0.0, 1.0, 0)]),
            Err(Error::MalformedSplitters(_))
        ));

        let json = r#"{"run_start_ns": 0, "relative": [{"start": 0.0, "stop": 1e11, "target": 0}]}"#;
        assert!(matches!(
            SplitterTable::from_json(json),
            Err(Error::MalformedSplitters(_))
        ));
    }

    #[test]
    fn test_targets_and_subset() {
        let table =
            SplitterTable::new(vec![s(0, 10, 1), s(10, 20, -1), s(20, 30, 0), s(30, 40, 1)])
                .unwrap();
        assert_eq!(table.targets().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(table.subset_for(1), vec![s(0, 10, 1), s(30, 40, 1)]);
        assert_eq!(table.subset_for(-1), vec![s(10, 20, -1)]);
        assert!(table.subset_for(5).is_empty());
    }

    #[test]
    fn test_json_forms() {
        let absolute = r#"{"splitters": [
            {"start_ns": 10, "stop_ns": 20, "target": 1},
            {"start_ns": 0, "stop_ns": 10, "target": 0}
        ]}"#;
        let table = SplitterTable::from_json(absolute).unwrap();
        assert_eq!(table.as_slice(), &[s(0, 10, 0), s(10, 20, 1)]);

        let relative = r#"{"run_start_ns": 1000, "relative": [
            {"start": 0.0, "stop": 1e-6, "target": 3}
        ]}"#;
        let table = SplitterTable::from_json(relative).unwrap();
        assert_eq!(table.as_slice(), &[s(1000, 2000, 3)]);

        let boundaries = r#"{"boundaries_ns": [0, 5, 9], "targets": [0, 1]}"#;
        let table = SplitterTable::from_json(boundaries).unwrap();
        assert_eq!(table.as_slice(), &[s(0, 5, 0), s(5, 9, 1)]);

        assert!(matches!(
            SplitterTable::from_json(r#"{"intervals": []}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            SplitterTable::from_json(r#"{"boundaries_ns": [5, 0], "targets": [0]}"#),
            Err(Error::MalformedSplitters(_))
        ));
    }
}
