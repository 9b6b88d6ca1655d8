//! Event and timestamp types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Nanoseconds per second.
pub const NANOSECONDS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds per microsecond, as used for TOF offsets.
pub const NANOSECONDS_PER_MICROSECOND: f64 = 1_000.0;

/// Absolute time in nanoseconds since the framework epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateAndTime(pub i64);

impl DateAndTime {
    /// Creates a timestamp from raw nanoseconds.
    #[inline]
    #[must_use]
    pub fn from_nanoseconds(ns: i64) -> Self {
        Self(ns)
    }

    /// Creates a timestamp from seconds, rounded to the nearest nanosecond.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * NANOSECONDS_PER_SECOND as f64).round() as i64)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub fn nanoseconds(&self) -> i64 {
        self.0
    }

    /// Returns the value in seconds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seconds(&self) -> f64 {
        self.0 as f64 / NANOSECONDS_PER_SECOND as f64
    }

    /// Creates a timestamp from seconds, or `None` if the value is not
    /// finite or falls outside the representable range.
    #[inline]
    #[must_use]
    pub fn checked_from_seconds(seconds: f64) -> Option<Self> {
        #[allow(clippy::cast_precision_loss)]
        let ns = (seconds * NANOSECONDS_PER_SECOND as f64).round();
        nanoseconds_in_range(ns).map(Self)
    }

    /// Adds nanoseconds, or `None` on overflow.
    #[inline]
    #[must_use]
    pub fn checked_add(&self, ns: i64) -> Option<Self> {
        self.0.checked_add(ns).map(Self)
    }

    /// Shifts the timestamp by a microsecond offset, rounded to the nearest
    /// nanosecond. Saturates at the representable range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn offset_micros(&self, micros: f64) -> Self {
        Self(
            self.0
                .saturating_add((micros * NANOSECONDS_PER_MICROSECOND).round() as i64),
        )
    }

    /// Shifts the timestamp by a microsecond offset, or `None` if the offset
    /// is not finite or the result is out of range.
    #[inline]
    #[must_use]
    pub fn checked_offset_micros(&self, micros: f64) -> Option<Self> {
        nanoseconds_in_range((micros * NANOSECONDS_PER_MICROSECOND).round())
            .and_then(|ns| self.checked_add(ns))
    }
}

/// Converts an already rounded nanosecond count to `i64` if it fits.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn nanoseconds_in_range(ns: f64) -> Option<i64> {
    // i64::MAX rounds up to 2^63 as f64, which is itself out of range
    (ns.is_finite() && ns >= i64::MIN as f64 && ns < i64::MAX as f64).then(|| ns as i64)
}

impl Add<i64> for DateAndTime {
    type Output = DateAndTime;

    /// Saturating addition of nanoseconds.
    fn add(self, ns: i64) -> Self::Output {
        DateAndTime(self.0.saturating_add(ns))
    }
}

impl Sub for DateAndTime {
    type Output = i64;

    /// Saturating difference in nanoseconds.
    fn sub(self, other: Self) -> Self::Output {
        self.0.saturating_sub(other.0)
    }
}

fn unit_weight() -> f64 {
    1.0
}

/// A single detected neutron.
///
/// `tof` holds the event's X coordinate; it is time-of-flight in
/// microseconds until a unit conversion rewrites it in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Pulse the event is associated with.
    pub pulse_time: DateAndTime,
    /// Time-of-flight (µs) or the converted coordinate.
    pub tof: f64,
    /// Statistical weight.
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl Event {
    /// Creates an unweighted event.
    #[inline]
    #[must_use]
    pub fn new(pulse_time: DateAndTime, tof: f64) -> Self {
        Self {
            pulse_time,
            tof,
            weight: 1.0,
        }
    }

    /// Creates a weighted event.
    #[inline]
    #[must_use]
    pub fn weighted(pulse_time: DateAndTime, tof: f64, weight: f64) -> Self {
        Self {
            pulse_time,
            tof,
            weight,
        }
    }

    /// Time the neutron reached the point described by `factor` and `shift`.
    ///
    /// Computes `pulse + (tof * factor + shift)` with the offset in µs.
    /// Returns `None` when the offset is not finite (for example an
    /// unphysical `±inf` TOF) or the sum leaves the timestamp range.
    #[inline]
    #[must_use]
    pub fn full_time(&self, factor: f64, shift: f64) -> Option<DateAndTime> {
        self.pulse_time.checked_offset_micros(self.tof * factor + shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_and_time_seconds() {
        let t = DateAndTime::from_seconds(1.5);
        assert_eq!(t.nanoseconds(), 1_500_000_000);
        assert!((t.seconds() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_date_and_time_arithmetic() {
        let t = DateAndTime::from_nanoseconds(1000);
        assert_eq!((t + 500).nanoseconds(), 1500);
        assert_eq!(DateAndTime(2000) - t, 1000);
        assert_eq!(t.offset_micros(2.5).nanoseconds(), 3500);
    }

    #[test]
    fn test_event_full_time() {
        let event = Event::new(DateAndTime::from_seconds(10.0), 1000.0);
        // 1000 µs * 0.5 + 20 µs = 520 µs
        let t = event.full_time(0.5, 20.0).unwrap();
        assert_eq!(t.nanoseconds(), 10_000_520_000);
        assert_eq!(
            event.full_time(1.0, 0.0).map(|t| t.nanoseconds()),
            Some(10_001_000_000)
        );
    }

    #[test]
    fn test_event_full_time_out_of_range() {
        let pulse = DateAndTime::from_seconds(10.0);
        for tof in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 1e30] {
            assert_eq!(Event::new(pulse, tof).full_time(1.0, 0.0), None, "tof {tof}");
        }
        assert_eq!(Event::new(pulse, 1.0).full_time(1.0, f64::INFINITY), None);
        // Finite offset whose sum overflows the pulse time
        let late = Event::new(DateAndTime(i64::MAX - 10), 1.0);
        assert_eq!(late.full_time(1.0, 0.0), None);
    }

    #[test]
    fn test_date_and_time_saturates() {
        let t = DateAndTime(i64::MAX - 1);
        assert_eq!(t + 100, DateAndTime(i64::MAX));
        assert_eq!(DateAndTime(i64::MIN) + -1, DateAndTime(i64::MIN));
        assert_eq!(t.offset_micros(f64::INFINITY), DateAndTime(i64::MAX));
        assert_eq!(DateAndTime(i64::MIN) - DateAndTime(1), i64::MIN);
        assert_eq!(t.checked_add(100), None);
        assert_eq!(t.checked_offset_micros(f64::NAN), None);
    }

    #[test]
    fn test_checked_from_seconds() {
        assert_eq!(
            DateAndTime::checked_from_seconds(1.5),
            Some(DateAndTime(1_500_000_000))
        );
        // 1e11 s is 1e20 ns, beyond i64
        assert_eq!(DateAndTime::checked_from_seconds(1e11), None);
        assert_eq!(DateAndTime::checked_from_seconds(-1e11), None);
        assert_eq!(DateAndTime::checked_from_seconds(f64::INFINITY), None);
        assert_eq!(DateAndTime::checked_from_seconds(f64::NAN), None);
    }

    #[test]
    fn test_event_weight_defaults_on_deserialize() {
        let event: Event = serde_json::from_str(r#"{"pulse_time": 5, "tof": 12.5}"#).unwrap();
        assert_eq!(event.pulse_time, DateAndTime(5));
        assert!((event.weight - 1.0).abs() < f64::EPSILON);
    }
}
