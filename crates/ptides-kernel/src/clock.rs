//! Drifting clock models.
//!
//! Every platform clock is described by a correspondence point (one oracle
//! instant paired with one local instant) and a drift rate: the local clock
//! advances `drift` local seconds per oracle second. Conversions are cached
//! in both directions so a local instant computed from an oracle instant
//! converts back to exactly that oracle instant, despite rounding.
//!
//! A drift change moves the correspondence point to the change instant and
//! invalidates the caches; wake-ups scheduled under the old drift must be
//! re-expressed by the scheduler (see the wake-up plan handling there).

use ptides_common::{ConfigError, SchedulerError, SimTime};
use std::collections::HashMap;

/// A local clock driven by the shared oracle clock.
#[derive(Debug, Clone)]
pub struct RealTimeClock {
    last_oracle: SimTime,
    last_local: SimTime,
    drift: f64,
    to_local: HashMap<SimTime, SimTime>,
    to_oracle: HashMap<SimTime, SimTime>,
}

impl RealTimeClock {
    /// A clock reading local zero at oracle zero, advancing at `drift`.
    /// Negative drift would make local time run backwards and is rejected.
    pub fn new(drift: f64) -> Result<Self, ConfigError> {
        if drift < 0.0 {
            return Err(ConfigError::NegativeDrift { drift });
        }
        Ok(RealTimeClock {
            last_oracle: SimTime::ZERO,
            last_local: SimTime::ZERO,
            drift,
            to_local: HashMap::new(),
            to_oracle: HashMap::new(),
        })
    }

    /// The current drift rate.
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// The local reading at `oracle`. Queries before the correspondence
    /// point are rejected: the clock's history under earlier drifts is gone.
    pub fn local_time(&mut self, oracle: SimTime) -> Result<SimTime, SchedulerError> {
        if let Some(&local) = self.to_local.get(&oracle) {
            return Ok(local);
        }
        if oracle < self.last_oracle {
            return Err(SchedulerError::clock(format!(
                "oracle time {oracle} precedes the clock's correspondence point {}",
                self.last_oracle
            )));
        }
        let local = self.last_local + (oracle - self.last_oracle).scale(self.drift);
        self.to_local.insert(oracle, local);
        self.to_oracle.entry(local).or_insert(oracle);
        Ok(local)
    }

    /// The oracle instant at which the clock reads `local`. Undefined for a
    /// stopped clock (zero drift) unless the reading was cached.
    pub fn oracle_time(&mut self, local: SimTime) -> Result<SimTime, SchedulerError> {
        if let Some(&oracle) = self.to_oracle.get(&local) {
            return Ok(oracle);
        }
        if self.drift == 0.0 {
            return Err(SchedulerError::clock(format!(
                "stopped clock never reaches local time {local}"
            )));
        }
        if local < self.last_local {
            return Err(SchedulerError::clock(format!(
                "local time {local} precedes the clock's correspondence point {}",
                self.last_local
            )));
        }
        let oracle = self.last_oracle + (local - self.last_local).scale_inv(self.drift);
        self.to_oracle.insert(local, oracle);
        self.to_local.entry(oracle).or_insert(local);
        Ok(oracle)
    }

    /// Forget cached conversions for instants before `oracle`. Once the run
    /// has moved past an instant nothing converts it again, so holding its
    /// correspondence would only grow the caches without bound.
    pub fn discard_before(&mut self, oracle: SimTime) {
        self.to_local.retain(|&o, _| o >= oracle);
        self.to_oracle.retain(|_, &mut o| o >= oracle);
    }

    /// Change the drift rate, effective at `at_oracle`. The correspondence
    /// point moves to the change instant and all cached conversions made
    /// under the old drift are discarded.
    pub fn set_drift(&mut self, drift: f64, at_oracle: SimTime) -> Result<(), SchedulerError> {
        if drift < 0.0 {
            return Err(SchedulerError::clock(format!(
                "negative drift {drift}: local time would run backwards"
            )));
        }
        if at_oracle < self.last_oracle {
            return Err(SchedulerError::clock(format!(
                "drift change at {at_oracle} precedes the clock's correspondence point {}",
                self.last_oracle
            )));
        }
        let local = self.last_local + (at_oracle - self.last_oracle).scale(self.drift);
        self.last_oracle = at_oracle;
        self.last_local = local;
        self.drift = drift;
        self.to_local.clear();
        self.to_oracle.clear();
        Ok(())
    }
}
