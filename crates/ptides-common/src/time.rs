//! Simulated time and superdense tags.
//!
//! All clocks in the simulator (oracle, platform, execution) measure time as
//! [`SimTime`]: signed 64-bit nanoseconds. Nanosecond resolution keeps
//! drift-scaled clock conversions exact enough that round trips through a
//! clock model reproduce the original instant.
//!
//! [`SimTime::MAX`] and [`SimTime::MIN`] double as +/- infinity sentinels:
//! an absent relative deadline is `MAX` ("never misses"), and network-input
//! timestamps use `MIN` as an always-safe floor. Arithmetic saturates at the
//! sentinels so infinity is absorbing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A point in (or duration of) simulated time, in nanoseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(i64);

impl SimTime {
    /// Zero time; the origin of every clock and the oplus-identity of durations.
    pub const ZERO: SimTime = SimTime(0);

    /// Positive infinity sentinel (absent deadline, unreachable port).
    pub const MAX: SimTime = SimTime(i64::MAX);

    /// Negative infinity sentinel (always-in-the-past floor).
    pub const MIN: SimTime = SimTime(i64::MIN);

    /// Create a time from nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        SimTime(nanos)
    }

    /// Create a time from microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        SimTime(micros * 1_000)
    }

    /// Create a time from milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Create a time from fractional seconds, rounding to the nearest nanosecond.
    pub fn from_secs(secs: f64) -> Self {
        SimTime((secs * 1e9).round() as i64)
    }

    /// Time as raw nanoseconds.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Time as fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Whether this value is one of the infinity sentinels.
    pub const fn is_infinite(self) -> bool {
        self.0 == i64::MAX || self.0 == i64::MIN
    }

    /// Saturating addition; the infinity sentinels are absorbing.
    pub fn saturating_add(self, other: SimTime) -> SimTime {
        if self.is_infinite() {
            return self;
        }
        if other.is_infinite() {
            return other;
        }
        SimTime(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction; the infinity sentinels are absorbing.
    pub fn saturating_sub(self, other: SimTime) -> SimTime {
        if self.is_infinite() {
            return self;
        }
        if other.0 == i64::MAX {
            return SimTime::MIN;
        }
        if other.0 == i64::MIN {
            return SimTime::MAX;
        }
        SimTime(self.0.saturating_sub(other.0))
    }

    /// Scale a duration by a clock-drift factor, rounding to the nearest
    /// nanosecond. Infinite durations stay infinite.
    pub fn scale(self, factor: f64) -> SimTime {
        if self.is_infinite() {
            return self;
        }
        SimTime((self.0 as f64 * factor).round() as i64)
    }

    /// Divide a duration by a clock-drift factor, rounding to the nearest
    /// nanosecond. The caller must ensure `factor` is non-zero.
    pub fn scale_inv(self, factor: f64) -> SimTime {
        if self.is_infinite() {
            return self;
        }
        SimTime((self.0 as f64 / factor).round() as i64)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, other: SimTime) -> SimTime {
        self.saturating_add(other)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, other: SimTime) -> SimTime {
        self.saturating_sub(other)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == i64::MAX {
            write!(f, "+inf")
        } else if self.0 == i64::MIN {
            write!(f, "-inf")
        } else {
            write!(f, "{}s", self.as_secs_f64())
        }
    }
}

/// A superdense logical instant: a timestamp plus an integer microstep that
/// orders logically simultaneous events by causal sequence.
///
/// Tags are totally ordered lexicographically by `(time, microstep)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tag {
    /// The model timestamp.
    pub time: SimTime,
    /// Tiebreaker among events with equal timestamps.
    pub microstep: u32,
}

impl Tag {
    /// Sentinel preceding every real tag ("nothing consumed yet").
    pub const MIN: Tag = Tag {
        time: SimTime::MIN,
        microstep: 0,
    };

    /// Create a tag.
    pub const fn new(time: SimTime, microstep: u32) -> Self {
        Tag { time, microstep }
    }

    /// Tag at the given time with microstep zero.
    pub const fn at(time: SimTime) -> Self {
        Tag { time, microstep: 0 }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.microstep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_round_trip() {
        assert_eq!(SimTime::from_micros(5).as_nanos(), 5_000);
        assert_eq!(SimTime::from_millis(2).as_nanos(), 2_000_000);
        assert_eq!(SimTime::from_secs(1.5).as_nanos(), 1_500_000_000);
        assert_eq!(SimTime::from_secs(-0.25).as_secs_f64(), -0.25);
    }

    #[test]
    fn infinity_is_absorbing() {
        let t = SimTime::from_secs(3.0);
        assert_eq!(SimTime::MAX + t, SimTime::MAX);
        assert_eq!(SimTime::MAX - t, SimTime::MAX);
        assert_eq!(t - SimTime::MAX, SimTime::MIN);
        assert_eq!(SimTime::MIN + t, SimTime::MIN);
        assert_eq!(t - SimTime::MIN, SimTime::MAX);
        assert_eq!(SimTime::MAX.scale(0.5), SimTime::MAX);
    }

    #[test]
    fn scaling_rounds_to_nanos() {
        let t = SimTime::from_nanos(10);
        assert_eq!(t.scale(1.5), SimTime::from_nanos(15));
        assert_eq!(t.scale_inv(4.0), SimTime::from_nanos(3)); // 2.5 rounds up
    }

    #[test]
    fn tag_order_is_lexicographic() {
        let early = Tag::new(SimTime::from_secs(1.0), 5);
        let later_time = Tag::new(SimTime::from_secs(2.0), 0);
        let later_step = Tag::new(SimTime::from_secs(1.0), 6);
        assert!(early < later_time);
        assert!(early < later_step);
        assert!(later_step < later_time);
        assert!(Tag::MIN < early);
    }
}
