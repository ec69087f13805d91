//! The safe-to-process scheduler.
//!
//! One scheduler instance owns a platform's event queue, execution stack,
//! and clocks. It never blocks: [`Scheduler::advance`] is called once per
//! external activation with the current oracle time and either hands back a
//! [`Firing`] to dispatch or reports that nothing is ready, leaving any
//! future work expressed as pending wake-ups ([`Scheduler::next_wakeup`]).
//!
//! ## Safe to process
//!
//! An event is safe once `platform_time >= tag.time - delay_offset`, where
//! the offset comes from the causality analysis. At that point no event
//! with a smaller tag can still arrive for the same equivalence class, so
//! dispatching preserves timestamp order. Network-fed channels and pure
//! events without causal history are safe unconditionally.
//!
//! ## Wake-up plan
//!
//! Every wake-up is remembered in the clock's own local timeline alongside
//! its oracle-time equivalent. When a clock's drift changes, the local
//! instants still mean what they meant; their oracle equivalents are
//! re-derived under the new drift and the stale oracle times go on an
//! ignore list so a doubly granted activation cannot fire twice.

use crate::clock::RealTimeClock;
use crate::event::Event;
use crate::exec::{ExecutionRecord, ExecutionStack};
use crate::queue::EventQueue;
use ptides_causality::{CausalityAnalysis, Platform};
use ptides_common::{ActorId, ConfigError, PortId, SchedulerError, SimTime, Tag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Timing parameters of one scheduler instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Simulated overhead of one scheduling decision, on the execution
    /// clock. While overhead runs, nothing executes and nothing preempts it.
    pub scheduler_execution_time: SimTime,
    /// Drift rate of the platform clock that timestamps sensor events and
    /// gates actuation.
    pub platform_clock_drift: f64,
    /// Drift rate of the clock that measures actor execution time.
    pub execution_clock_drift: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            scheduler_execution_time: SimTime::ZERO,
            platform_clock_drift: 1.0,
            execution_clock_drift: 1.0,
        }
    }
}

/// Which of the scheduler's clocks an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerClock {
    Platform,
    Execution,
}

/// Observable scheduler state, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing executing and nothing ready.
    Idle,
    /// Simulating scheduling/interrupt overhead.
    RunningScheduler,
    /// An actor firing is consuming simulated execution time.
    Executing,
}

/// The outcome of one activation.
#[derive(Debug)]
pub enum Decision {
    /// Nothing to dispatch; pending work is expressed as wake-ups.
    Wait,
    /// Hand this firing to the destination actor now.
    Fire(Firing),
}

/// A batch of same-tag events ready to be dispatched to one actor.
#[derive(Debug)]
pub struct Firing {
    pub actor: ActorId,
    pub tag: Tag,
    /// The input port that triggered the firing, when one exists. Pure
    /// events created during the firing inherit causal history from it.
    pub trigger: Option<PortId>,
    /// The tightest absolute deadline among the consumed events.
    pub deadline: SimTime,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Copy)]
struct Wakeup {
    oracle: SimTime,
    local: SimTime,
    clock: SchedulerClock,
}

/// The per-platform scheduler state machine.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    queue: EventQueue,
    exec: ExecutionStack,
    platform_clock: RealTimeClock,
    execution_clock: RealTimeClock,
    wakeups: Vec<Wakeup>,
    ignored_wakeups: Vec<SimTime>,
    /// Platform-local instants at which the scheduler must run, sorted.
    timed_interrupts: Vec<SimTime>,
    /// Execution-local instant at which overhead simulation completes.
    scheduler_finish: Option<SimTime>,
    /// Execution-local instant at which the top record last resumed.
    execution_started: Option<SimTime>,
    input_interrupt_pending: bool,
    /// Highest tag dispatched, per equivalence-class anchor.
    last_consumed: HashMap<PortId, Tag>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        let platform_clock = RealTimeClock::new(config.platform_clock_drift)?;
        let execution_clock = RealTimeClock::new(config.execution_clock_drift)?;
        Ok(Scheduler {
            config,
            queue: EventQueue::new(),
            exec: ExecutionStack::new(),
            platform_clock,
            execution_clock,
            wakeups: Vec::new(),
            ignored_wakeups: Vec::new(),
            timed_interrupts: Vec::new(),
            scheduler_finish: None,
            execution_started: None,
            input_interrupt_pending: false,
            last_consumed: HashMap::new(),
        })
    }

    /// Queue an event for future dispatch.
    pub fn enqueue(&mut self, event: Event) {
        trace!(tag = %event.tag, actor = %event.actor, pure = event.is_pure, "enqueue");
        self.queue.insert(event);
    }

    /// Platform-local time at `oracle`.
    pub fn platform_time(&mut self, oracle: SimTime) -> Result<SimTime, SchedulerError> {
        self.platform_clock.local_time(oracle)
    }

    /// Oracle instant at which the platform clock reads `local`.
    pub fn oracle_of_platform_time(&mut self, local: SimTime) -> Result<SimTime, SchedulerError> {
        self.platform_clock.oracle_time(local)
    }

    /// Note that a sensor or network token just arrived, so the next
    /// activation must charge scheduling overhead before anything resumes.
    pub fn notify_input_interrupt(&mut self) {
        self.input_interrupt_pending = true;
    }

    /// Arrange for the scheduler to run at a platform-local instant even if
    /// something is executing then. Used by preemptive dispatch policies.
    pub fn schedule_timed_interrupt(&mut self, at_platform: SimTime) -> Result<(), SchedulerError> {
        if !self.timed_interrupts.contains(&at_platform) {
            let idx = self.timed_interrupts.partition_point(|&t| t < at_platform);
            self.timed_interrupts.insert(idx, at_platform);
        }
        self.register_wakeup(SchedulerClock::Platform, at_platform)
    }

    /// Earliest pending wake-up, in oracle time.
    pub fn next_wakeup(&self) -> Option<SimTime> {
        self.wakeups.iter().map(|w| w.oracle).min()
    }

    /// Number of queued events.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Observable state.
    pub fn state(&self) -> SchedulerState {
        if self.scheduler_finish.is_some() {
            SchedulerState::RunningScheduler
        } else if !self.exec.is_empty() {
            SchedulerState::Executing
        } else {
            SchedulerState::Idle
        }
    }

    /// Change a clock's drift at `at_oracle` and re-express every pending
    /// wake-up on that clock under the new rate. Each stale oracle instant
    /// is added to the ignore list so the activation already requested for
    /// it does nothing.
    pub fn set_clock_drift(
        &mut self,
        which: SchedulerClock,
        drift: f64,
        at_oracle: SimTime,
    ) -> Result<(), SchedulerError> {
        match which {
            SchedulerClock::Platform => self.platform_clock.set_drift(drift, at_oracle)?,
            SchedulerClock::Execution => self.execution_clock.set_drift(drift, at_oracle)?,
        }
        for i in 0..self.wakeups.len() {
            if self.wakeups[i].clock != which {
                continue;
            }
            let local = self.wakeups[i].local;
            let rederived = match which {
                SchedulerClock::Platform => self.platform_clock.oracle_time(local)?,
                SchedulerClock::Execution => self.execution_clock.oracle_time(local)?,
            };
            let old = self.wakeups[i].oracle;
            if rederived != old {
                debug!(%old, new = %rederived, %local, "re-deriving wake-up after drift change");
                // A wake-up that another pending entry still needs must not
                // be suppressed.
                let shared = self
                    .wakeups
                    .iter()
                    .enumerate()
                    .any(|(j, w)| j != i && w.oracle == old);
                if !shared {
                    self.ignored_wakeups.push(old);
                }
                self.wakeups[i].oracle = rederived;
            }
        }
        Ok(())
    }

    fn register_wakeup(
        &mut self,
        clock: SchedulerClock,
        local: SimTime,
    ) -> Result<(), SchedulerError> {
        let oracle = match clock {
            SchedulerClock::Platform => self.platform_clock.oracle_time(local)?,
            SchedulerClock::Execution => self.execution_clock.oracle_time(local)?,
        };
        if self.wakeups.iter().any(|w| w.oracle == oracle) {
            return Ok(());
        }
        trace!(%oracle, %local, ?clock, "wake-up registered");
        self.wakeups.push(Wakeup {
            oracle,
            local,
            clock,
        });
        Ok(())
    }

    fn firing(&self, actor: ActorId, tag: Tag, events: Vec<Event>) -> Firing {
        let trigger = events
            .iter()
            .find(|e| !e.is_pure)
            .and_then(|e| e.port)
            .or_else(|| events.iter().find_map(|e| e.port));
        let deadline = events
            .iter()
            .map(|e| e.absolute_deadline)
            .min()
            .unwrap_or(SimTime::MAX);
        Firing {
            actor,
            tag,
            trigger,
            deadline,
            events,
        }
    }

    /// Run the state machine once at `oracle_now`.
    pub fn advance(
        &mut self,
        oracle_now: SimTime,
        platform: &Platform,
        analysis: &CausalityAnalysis,
    ) -> Result<Decision, SchedulerError> {
        // A wake-up invalidated by a drift change: consume it and stay put.
        if let Some(pos) = self.ignored_wakeups.iter().position(|&t| t == oracle_now) {
            self.ignored_wakeups.remove(pos);
            trace!(%oracle_now, "stale wake-up ignored");
            return Ok(Decision::Wait);
        }
        self.wakeups.retain(|w| w.oracle > oracle_now);

        // Conversions pinned for instants the run has passed can never be
        // queried again; drop them so the caches track only pending work.
        self.platform_clock.discard_before(oracle_now);
        self.execution_clock.discard_before(oracle_now);

        let platform_now = self.platform_clock.local_time(oracle_now)?;
        let exec_now = self.execution_clock.local_time(oracle_now)?;

        // Scheduling overhead still being simulated; it is not preemptable.
        if let Some(finish) = self.scheduler_finish {
            if exec_now < finish {
                return Ok(Decision::Wait);
            }
            self.scheduler_finish = None;
        }

        // Interrupts force a scheduler pass, charging overhead against
        // whatever was executing.
        let timed_due = self
            .timed_interrupts
            .first()
            .is_some_and(|&t| t <= platform_now);
        if self.input_interrupt_pending || timed_due {
            self.input_interrupt_pending = false;
            self.timed_interrupts.retain(|&t| t > platform_now);
            if self.config.scheduler_execution_time > SimTime::ZERO {
                if let Some(started) = self.execution_started.take() {
                    self.exec.preempt_top(exec_now - started)?;
                }
                let finish = exec_now + self.config.scheduler_execution_time;
                self.scheduler_finish = Some(finish);
                self.register_wakeup(SchedulerClock::Execution, finish)?;
                trace!(%finish, "interrupt: simulating scheduling overhead");
                return Ok(Decision::Wait);
            }
        }

        // A firing is consuming simulated execution time.
        if let Some(remaining) = self.exec.peek().map(|r| r.remaining) {
            let started = match self.execution_started {
                Some(s) => s,
                None => {
                    self.execution_started = Some(exec_now);
                    exec_now
                }
            };
            let finish = started + remaining;
            if exec_now >= finish {
                let record = self
                    .exec
                    .pop()
                    .ok_or_else(|| SchedulerError::internal("execution stack emptied unexpectedly"))?;
                self.execution_started = None;
                if self.config.scheduler_execution_time > SimTime::ZERO {
                    let overhead_finish = exec_now + self.config.scheduler_execution_time;
                    self.scheduler_finish = Some(overhead_finish);
                    self.register_wakeup(SchedulerClock::Execution, overhead_finish)?;
                }
                debug!(actor = %record.actor, tag = %record.tag, "execution complete");
                return Ok(Decision::Fire(self.firing(record.actor, record.tag, record.events)));
            }
            // Base policy: a queued event never preempts the running firing.
            self.register_wakeup(SchedulerClock::Execution, finish)?;
            return Ok(Decision::Wait);
        }

        // Nothing executing: consider the earliest queued event.
        let (tag, actor, is_pure, head_port, channel) = match self.queue.peek_earliest() {
            None => return Ok(Decision::Wait),
            Some(e) => (e.tag, e.actor, e.is_pure, e.port, e.channel),
        };

        let offset = if is_pure {
            match head_port {
                // No causal history: unconditionally safe.
                None => SimTime::MAX,
                Some(port) => analysis.class_min_offset(port),
            }
        } else {
            let port = head_port
                .ok_or_else(|| SchedulerError::internal("trigger event without a destination port"))?;
            if analysis.network_fed(port, channel) {
                // The sender already held this event until it was safe.
                SimTime::MAX
            } else {
                analysis.delay_offset(port, channel)
            }
        };

        let safe_at = tag.time - offset;
        if platform_now < safe_at {
            trace!(%tag, %safe_at, %platform_now, "not yet safe to process");
            self.register_wakeup(SchedulerClock::Platform, safe_at)?;
            return Ok(Decision::Wait);
        }

        let events = self.queue.take_matching(|e| e.tag == tag && e.actor == actor);

        // Safe-to-process authorized the dispatch; a tag at or below an
        // anchor's last consumed tag means the analysis or this machine is
        // broken, and the run must halt. Every event in the batch is
        // checked, not just the head.
        for event in &events {
            if event.is_pure {
                continue;
            }
            if let Some(port) = event.port {
                let anchor = analysis.anchor(port);
                let previous = self.last_consumed.get(&anchor).copied().unwrap_or(Tag::MIN);
                if tag <= previous {
                    return Err(SchedulerError::TagOrderViolation {
                        actor,
                        previous,
                        current: tag,
                    });
                }
            }
        }
        for event in &events {
            if !event.is_pure {
                if let Some(port) = event.port {
                    self.last_consumed.insert(analysis.anchor(port), tag);
                }
            }
        }

        let firing = self.firing(actor, tag, events);
        let execution_time = platform.execution_time(actor, firing.trigger);
        if execution_time == SimTime::ZERO {
            debug!(%actor, %tag, "dispatching zero-execution-time firing");
            return Ok(Decision::Fire(firing));
        }

        debug!(%actor, %tag, %execution_time, "beginning simulated execution");
        self.execution_started = Some(exec_now);
        self.register_wakeup(SchedulerClock::Execution, exec_now + execution_time)?;
        self.exec.push(ExecutionRecord {
            tag: firing.tag,
            actor: firing.actor,
            events: firing.events,
            remaining: execution_time,
        });
        Ok(Decision::Wait)
    }
}
