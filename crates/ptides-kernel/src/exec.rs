//! The execution-time simulator.
//!
//! Actor firings take simulated execution time, measured on the execution
//! clock's local timeline. A firing that has started but not finished lives
//! on a LIFO stack: the top record is the one conceptually running, records
//! below it are preempted and resume when everything above them pops.

use crate::Event;
use ptides_common::{ActorId, SchedulerError, SimTime, Tag};

/// One in-progress firing.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    /// The logical tag of the firing.
    pub tag: Tag,
    /// The actor being fired.
    pub actor: ActorId,
    /// The events consumed by the firing, handed over when it completes.
    pub events: Vec<Event>,
    /// Execution-clock time still needed, excluding time already spent
    /// before any preemption.
    pub remaining: SimTime,
}

/// LIFO stack of in-progress firings.
#[derive(Debug, Default)]
pub struct ExecutionStack {
    records: Vec<ExecutionRecord>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin simulated execution of a firing.
    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    /// The firing conceptually running right now.
    pub fn peek(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }

    /// Complete the running firing.
    pub fn pop(&mut self) -> Option<ExecutionRecord> {
        self.records.pop()
    }

    /// Charge the running firing for time it has been executing since it
    /// last resumed. Driving the remaining time negative means the scheduler
    /// let it run past completion, which is a core defect.
    pub fn preempt_top(&mut self, elapsed: SimTime) -> Result<(), SchedulerError> {
        if let Some(top) = self.records.last_mut() {
            let remaining = top.remaining - elapsed;
            if remaining < SimTime::ZERO {
                return Err(SchedulerError::internal(format!(
                    "{} preempted {} past its completion: {} remaining",
                    top.actor, elapsed, remaining
                )));
            }
            top.remaining = remaining;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
