//! The superdense dependency semiring.
//!
//! Causal delay between two ports is a pair `(delay, index)`: a model-time
//! delay plus a microstep delay. Pairs form a semiring:
//!
//! - `oplus` (path choice) takes the lexicographic minimum; its identity is
//!   [`SuperdenseDependency::NO_PATH`], which represents "no dependency".
//!   No dependency is an expected, frequent outcome, so it is a value here,
//!   never an error.
//! - `otimes` (path concatenation) sums componentwise; its identity is
//!   [`SuperdenseDependency::ZERO_DELAY`].
//!
//! The semiring laws (idempotent, commutative, associative `oplus`;
//! associative `otimes`; `NO_PATH` absorbing under `otimes`) are what make
//! the all-pairs shortest-dependency closure well defined.

use ptides_common::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An element of the superdense dependency semiring.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SuperdenseDependency {
    /// The model-time component of the minimal causal delay.
    pub delay: SimTime,
    /// The microstep component of the minimal causal delay.
    pub index: u32,
}

impl SuperdenseDependency {
    /// The oplus identity: no causal path exists.
    pub const NO_PATH: SuperdenseDependency = SuperdenseDependency {
        delay: SimTime::MAX,
        index: u32::MAX,
    };

    /// The otimes identity: a direct dependency with zero delay.
    pub const ZERO_DELAY: SuperdenseDependency = SuperdenseDependency {
        delay: SimTime::ZERO,
        index: 0,
    };

    /// A dependency with the given model-time and microstep delay.
    pub const fn new(delay: SimTime, index: u32) -> Self {
        SuperdenseDependency { delay, index }
    }

    /// Whether any causal path exists.
    pub fn is_finite(self) -> bool {
        self != Self::NO_PATH
    }

    /// Path choice: the lexicographically smaller of the two dependencies.
    pub fn oplus(self, other: Self) -> Self {
        self.min(other)
    }

    /// Path concatenation: componentwise saturating sum. `NO_PATH` is
    /// absorbing: concatenating through a missing path yields no path.
    pub fn otimes(self, other: Self) -> Self {
        if self == Self::NO_PATH || other == Self::NO_PATH {
            return Self::NO_PATH;
        }
        SuperdenseDependency {
            delay: self.delay.saturating_add(other.delay),
            index: self.index.saturating_add(other.index),
        }
    }
}

impl fmt::Display for SuperdenseDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_finite() {
            write!(f, "({}, {})", self.delay, self.index)
        } else {
            write!(f, "(no path)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(secs: f64, index: u32) -> SuperdenseDependency {
        SuperdenseDependency::new(SimTime::from_secs(secs), index)
    }

    #[test]
    fn oplus_is_lexicographic_min() {
        assert_eq!(dep(1.0, 5).oplus(dep(2.0, 0)), dep(1.0, 5));
        assert_eq!(dep(1.0, 5).oplus(dep(1.0, 2)), dep(1.0, 2));
        assert_eq!(dep(1.0, 0).oplus(SuperdenseDependency::NO_PATH), dep(1.0, 0));
    }

    #[test]
    fn otimes_sums_componentwise() {
        assert_eq!(dep(1.0, 1).otimes(dep(2.5, 3)), dep(3.5, 4));
        assert_eq!(
            dep(1.0, 1).otimes(SuperdenseDependency::ZERO_DELAY),
            dep(1.0, 1)
        );
    }

    #[test]
    fn no_path_is_absorbing() {
        assert_eq!(
            dep(1.0, 1).otimes(SuperdenseDependency::NO_PATH),
            SuperdenseDependency::NO_PATH
        );
        assert_eq!(
            SuperdenseDependency::NO_PATH.otimes(dep(1.0, 1)),
            SuperdenseDependency::NO_PATH
        );
    }

    #[test]
    fn semiring_laws_hold_on_samples() {
        let samples = [
            SuperdenseDependency::ZERO_DELAY,
            SuperdenseDependency::NO_PATH,
            dep(1.0, 0),
            dep(1.0, 3),
            dep(0.5, 7),
        ];
        for a in samples {
            // oplus is idempotent.
            assert_eq!(a.oplus(a), a);
            for b in samples {
                // oplus is commutative.
                assert_eq!(a.oplus(b), b.oplus(a));
                for c in samples {
                    // oplus and otimes are associative.
                    assert_eq!(a.oplus(b).oplus(c), a.oplus(b.oplus(c)));
                    assert_eq!(a.otimes(b).otimes(c), a.otimes(b.otimes(c)));
                    // otimes distributes over oplus.
                    assert_eq!(
                        a.otimes(b.oplus(c)),
                        a.otimes(b).oplus(a.otimes(c))
                    );
                }
            }
        }
    }
}
