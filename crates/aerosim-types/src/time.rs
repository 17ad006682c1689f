//! Simulation clock value.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

const NSEC_PER_SEC: i64 = 1_000_000_000;

/// A point on the simulation clock, split into whole seconds and
/// nanoseconds.  Always normalised so that `0 <= nsec < 1_000_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime {
    pub sec: i32,
    pub nsec: i32,
}

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime { sec: 0, nsec: 0 };

    /// Build a time value, carrying any nanosecond overflow (or negative
    /// nanoseconds) into the seconds field.
    pub fn new(sec: i32, nsec: i64) -> Self {
        Self::from_nanos(i64::from(sec) * NSEC_PER_SEC + nsec)
    }

    /// Build a time value from fractional seconds, rounded to the nearest
    /// nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_nanos((secs * NSEC_PER_SEC as f64).round() as i64)
    }

    /// Build a time value from a total nanosecond count.
    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            sec: nanos.div_euclid(NSEC_PER_SEC) as i32,
            nsec: nanos.rem_euclid(NSEC_PER_SEC) as i32,
        }
    }

    /// Total nanoseconds since the start of the simulation.
    pub fn as_nanos(&self) -> i64 {
        i64::from(self.sec) * NSEC_PER_SEC + i64::from(self.nsec)
    }

    /// Fractional seconds since the start of the simulation.
    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.sec) + f64::from(self.nsec) / NSEC_PER_SEC as f64
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime::from_nanos(self.as_nanos() + rhs.as_nanos())
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime::from_nanos(self.as_nanos() - rhs.as_nanos())
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
