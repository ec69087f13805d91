//! The director loop.
//!
//! The director is the thin orchestration layer between the environment and
//! one platform's scheduler. The environment posts sensor/network tokens and
//! activates the director at requested oracle instants; each activation:
//!
//! 1. moves buffered input tokens whose device delay has elapsed into the
//!    event queue,
//! 2. runs the scheduler until nothing more is ready, dispatching each
//!    chosen firing to its actor and routing what it produces,
//! 3. delivers buffered output events whose timestamps platform time has
//!    reached, enforcing actuation deadlines,
//! 4. asks the environment for the next activation.
//!
//! The core never blocks and never spawns; determinism comes from the fact
//! that the same arrival sequence and clock parameters replay the same
//! (tag, actor) dispatch sequence.

use crate::event::Event;
use crate::scheduler::{Decision, Firing, Scheduler, SchedulerClock};
use ptides_causality::{CausalityAnalysis, Platform, PortRole};
use ptides_common::{ActorId, PortId, SchedulerError, SimTime, Tag, Token};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The behavior of one actor, invoked when the scheduler dispatches a firing.
pub trait PlatformActor {
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), SchedulerError>;
}

/// The simulation harness driving this platform.
pub trait Environment {
    /// Ask to be activated at `oracle_time`. The environment echoes the
    /// granted instant; granting anything else is an integration defect and
    /// fails the run.
    fn request_reactivation(&mut self, oracle_time: SimTime) -> SimTime;
}

/// What one firing may do: read its inputs, produce outputs, and request
/// future firings of its own actor.
pub struct FiringContext<'a> {
    platform: &'a Platform,
    actor: ActorId,
    tag: Tag,
    events: &'a [Event],
    outputs: Vec<(PortId, Tag, Token)>,
    fire_requests: Vec<SimTime>,
}

impl<'a> FiringContext<'a> {
    /// The logical tag of this firing.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The events consumed by this firing.
    pub fn events(&self) -> &[Event] {
        self.events
    }

    /// Produce `token` on `port` at the firing's tag.
    pub fn send(&mut self, port: PortId, token: Token) -> Result<(), SchedulerError> {
        self.send_delayed(port, token, SimTime::ZERO)
    }

    /// Produce `token` on `port`, `delay` model time after the firing's tag.
    /// A zero delay keeps the current microstep; a positive delay resets it.
    pub fn send_delayed(
        &mut self,
        port: PortId,
        token: Token,
        delay: SimTime,
    ) -> Result<(), SchedulerError> {
        if port.index() >= self.platform.port_count() {
            return Err(SchedulerError::internal(format!("send to unknown {port}")));
        }
        let spec = self.platform.port(port);
        if spec.role != PortRole::Output || spec.owner != Some(self.actor) {
            return Err(SchedulerError::internal(format!(
                "{} sent to {port}, which is not one of its output ports",
                self.actor
            )));
        }
        if delay < SimTime::ZERO {
            return Err(SchedulerError::internal(format!(
                "{} sent with negative delay {delay}",
                self.actor
            )));
        }
        let microstep = if delay == SimTime::ZERO {
            self.tag.microstep
        } else {
            0
        };
        self.outputs
            .push((port, Tag::new(self.tag.time + delay, microstep), token));
        Ok(())
    }

    /// Ask to be fired again at model time `time` (a pure event). Requests
    /// in the logical past are rejected.
    pub fn request_firing(&mut self, time: SimTime) -> Result<(), SchedulerError> {
        if time < self.tag.time {
            return Err(SchedulerError::internal(format!(
                "{} requested a firing at {time}, before its current tag {}",
                self.actor, self.tag
            )));
        }
        self.fire_requests.push(time);
        Ok(())
    }
}

/// A token delivered to an actuator or network output.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuation {
    pub port: PortId,
    pub tag: Tag,
    pub token: Token,
    /// Platform time of the delivery.
    pub delivered_at: SimTime,
}

#[derive(Debug)]
struct PendingInput {
    port: PortId,
    tag: Tag,
    token: Token,
    /// Platform time at which the device delay elapses.
    due: SimTime,
}

#[derive(Debug)]
struct PendingOutput {
    port: PortId,
    tag: Tag,
    token: Token,
}

/// Orchestrates one platform: scheduler, actors, and the boundary buffers.
pub struct Director {
    platform: Platform,
    analysis: CausalityAnalysis,
    scheduler: Scheduler,
    actors: HashMap<ActorId, Box<dyn PlatformActor>>,
    input_buffer: Vec<PendingInput>,
    output_buffer: Vec<PendingOutput>,
    actuations: Vec<Actuation>,
}

impl Director {
    pub fn new(platform: Platform, analysis: CausalityAnalysis, scheduler: Scheduler) -> Self {
        Director {
            platform,
            analysis,
            scheduler,
            actors: HashMap::new(),
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
            actuations: Vec::new(),
        }
    }

    /// Attach the behavior for `actor`. Firings dispatched to an actor with
    /// no behavior fail the run.
    pub fn register_actor(&mut self, actor: ActorId, behavior: Box<dyn PlatformActor>) {
        self.actors.insert(actor, behavior);
    }

    /// A sensor token arrives at `oracle_now`. Its tag is the platform
    /// clock's current reading; the platform observes it only after the
    /// port's device delay.
    pub fn post_input(
        &mut self,
        port: PortId,
        token: Token,
        oracle_now: SimTime,
    ) -> Result<(), SchedulerError> {
        let platform_now = self.scheduler.platform_time(oracle_now)?;
        let tag = Tag::at(platform_now);
        self.buffer_input(port, tag, token, platform_now)
    }

    /// A network token arrives at `oracle_now` carrying the tag its sender
    /// assigned.
    pub fn post_network_input(
        &mut self,
        port: PortId,
        tag: Tag,
        token: Token,
        oracle_now: SimTime,
    ) -> Result<(), SchedulerError> {
        let platform_now = self.scheduler.platform_time(oracle_now)?;
        self.buffer_input(port, tag, token, platform_now)
    }

    fn buffer_input(
        &mut self,
        port: PortId,
        tag: Tag,
        token: Token,
        platform_now: SimTime,
    ) -> Result<(), SchedulerError> {
        if port.index() >= self.platform.port_count()
            || !self.platform.port(port).role.is_boundary_input()
        {
            return Err(SchedulerError::internal(format!(
                "{port} is not a sensor or network input"
            )));
        }
        let due = platform_now + self.platform.port(port).annotations.device_delay;
        debug!(%port, %tag, %due, "input token buffered");
        self.input_buffer.push(PendingInput {
            port,
            tag,
            token,
            due,
        });
        self.scheduler.notify_input_interrupt();
        Ok(())
    }

    /// Deliveries completed so far, in delivery order. Draining is the
    /// environment's way of consuming actuations.
    pub fn take_actuations(&mut self) -> Vec<Actuation> {
        std::mem::take(&mut self.actuations)
    }

    /// Change the platform clock's drift at `at_oracle`. Pending wake-ups
    /// are re-expressed; the caller activates the director afterwards so the
    /// environment learns the new earliest wake-up.
    pub fn set_platform_clock_drift(
        &mut self,
        drift: f64,
        at_oracle: SimTime,
    ) -> Result<(), SchedulerError> {
        self.scheduler
            .set_clock_drift(SchedulerClock::Platform, drift, at_oracle)
    }

    /// Change the execution clock's drift at `at_oracle`.
    pub fn set_execution_clock_drift(
        &mut self,
        drift: f64,
        at_oracle: SimTime,
    ) -> Result<(), SchedulerError> {
        self.scheduler
            .set_clock_drift(SchedulerClock::Execution, drift, at_oracle)
    }

    /// One activation of the platform at `oracle_now`.
    pub fn handle_reactivation(
        &mut self,
        oracle_now: SimTime,
        env: &mut dyn Environment,
    ) -> Result<(), SchedulerError> {
        let platform_now = self.scheduler.platform_time(oracle_now)?;
        self.flush_inputs(platform_now)?;

        loop {
            match self.scheduler.advance(oracle_now, &self.platform, &self.analysis)? {
                Decision::Wait => break,
                Decision::Fire(firing) => self.dispatch(firing, platform_now)?,
            }
        }

        self.flush_outputs(platform_now)?;
        self.request_next_wakeup(oracle_now, env)
    }

    /// Move ripe input tokens into the event queue. A delivery instant that
    /// was skipped over means the environment failed to activate us when
    /// asked, which breaks the timestamp contract.
    fn flush_inputs(&mut self, platform_now: SimTime) -> Result<(), SchedulerError> {
        let mut idx = 0;
        while idx < self.input_buffer.len() {
            if self.input_buffer[idx].due > platform_now {
                idx += 1;
                continue;
            }
            let pending = self.input_buffer.remove(idx);
            if pending.due < platform_now {
                return Err(SchedulerError::MissedTransfer {
                    port: pending.port,
                    due: pending.due,
                    now: platform_now,
                });
            }
            self.deliver_from_boundary(pending.port, pending.tag, pending.token)?;
        }
        Ok(())
    }

    /// Fan a boundary-input token out along its wires.
    fn deliver_from_boundary(
        &mut self,
        port: PortId,
        tag: Tag,
        token: Token,
    ) -> Result<(), SchedulerError> {
        for &(dest, channel) in &self.platform.port(port).targets {
            let spec = self.platform.port(dest);
            if spec.role.is_boundary_output() {
                // A pass-through wire straight to an output.
                self.output_buffer.push(PendingOutput {
                    port: dest,
                    tag,
                    token,
                });
                continue;
            }
            let actor = spec
                .owner
                .ok_or_else(|| SchedulerError::internal(format!("{dest} has no owning actor")))?;
            let deadline = tag.time + spec.annotations.relative_deadline;
            self.scheduler
                .enqueue(Event::trigger(tag, actor, dest, channel, token, deadline));
        }
        Ok(())
    }

    /// Fire one actor and route everything it produced.
    fn dispatch(&mut self, firing: Firing, platform_now: SimTime) -> Result<(), SchedulerError> {
        debug!(actor = %firing.actor, tag = %firing.tag, "firing");
        let (outputs, fire_requests) = {
            let behavior = self.actors.get_mut(&firing.actor).ok_or_else(|| {
                SchedulerError::internal(format!("no behavior registered for {}", firing.actor))
            })?;
            let mut ctx = FiringContext {
                platform: &self.platform,
                actor: firing.actor,
                tag: firing.tag,
                events: &firing.events,
                outputs: Vec::new(),
                fire_requests: Vec::new(),
            };
            behavior.fire(&mut ctx)?;
            (ctx.outputs, ctx.fire_requests)
        };

        for (port, tag, token) in outputs {
            self.route_output(port, tag, token, platform_now)?;
        }
        for time in fire_requests {
            let event = self.pure_event(&firing, time);
            self.scheduler.enqueue(event);
        }
        Ok(())
    }

    /// A pure event requested during `firing`, at model time `time`.
    ///
    /// A request for the current model time lands one microstep later;
    /// anything else starts at microstep zero. The deadline is inherited
    /// from the firing, advanced by how much closer to the platform outputs
    /// the new event sits, and never precedes the firing's own deadline.
    fn pure_event(&self, firing: &Firing, time: SimTime) -> Event {
        let microstep = if time == firing.tag.time {
            firing.tag.microstep + 1
        } else {
            0
        };
        let min_delay = firing
            .trigger
            .map(|p| self.analysis.min_delay_to_sink(p))
            .unwrap_or(SimTime::ZERO);
        let inherited = firing.deadline + ((time - firing.tag.time) - min_delay);
        let deadline = inherited.max(firing.deadline);
        Event::pure(Tag::new(time, microstep), firing.actor, firing.trigger, deadline)
    }

    /// Route one produced token: actor inputs get trigger events, boundary
    /// outputs are delivered (immediately, or gated on their timestamp).
    fn route_output(
        &mut self,
        port: PortId,
        tag: Tag,
        token: Token,
        platform_now: SimTime,
    ) -> Result<(), SchedulerError> {
        for &(dest, channel) in &self.platform.port(port).targets {
            let spec = self.platform.port(dest);
            if spec.role.is_boundary_output() {
                if spec.annotations.transfer_immediately {
                    self.actuations.push(Actuation {
                        port: dest,
                        tag,
                        token,
                        delivered_at: platform_now,
                    });
                } else {
                    self.output_buffer.push(PendingOutput {
                        port: dest,
                        tag,
                        token,
                    });
                }
                continue;
            }
            let actor = spec
                .owner
                .ok_or_else(|| SchedulerError::internal(format!("{dest} has no owning actor")))?;
            let deadline = tag.time + spec.annotations.relative_deadline;
            self.scheduler
                .enqueue(Event::trigger(tag, actor, dest, channel, token, deadline));
        }
        Ok(())
    }

    /// Deliver buffered outputs whose timestamps have arrived. Platform time
    /// passing a timestamp is a deadline miss: fatal unless the port is
    /// annotated to tolerate lateness, in which case the event goes out late
    /// with a warning.
    fn flush_outputs(&mut self, platform_now: SimTime) -> Result<(), SchedulerError> {
        let mut idx = 0;
        while idx < self.output_buffer.len() {
            if self.output_buffer[idx].tag.time > platform_now {
                idx += 1;
                continue;
            }
            let out = self.output_buffer.remove(idx);
            if platform_now > out.tag.time {
                if !self.platform.port(out.port).annotations.ignore_deadline {
                    return Err(SchedulerError::DeadlineMiss {
                        port: out.port,
                        deadline: out.tag.time,
                        platform_time: platform_now,
                    });
                }
                warn!(
                    port = %out.port,
                    deadline = %out.tag.time,
                    %platform_now,
                    "delivering past its deadline"
                );
            }
            self.actuations.push(Actuation {
                port: out.port,
                tag: out.tag,
                token: out.token,
                delivered_at: platform_now,
            });
        }
        Ok(())
    }

    /// Ask the environment for the earliest instant anything needs us:
    /// scheduler wake-ups, input deliveries, or gated output deliveries.
    fn request_next_wakeup(
        &mut self,
        oracle_now: SimTime,
        env: &mut dyn Environment,
    ) -> Result<(), SchedulerError> {
        let mut next = self.scheduler.next_wakeup();
        let mut dues: Vec<SimTime> = self.input_buffer.iter().map(|p| p.due).collect();
        dues.extend(self.output_buffer.iter().map(|p| p.tag.time));
        for due in dues {
            let oracle = self.scheduler.oracle_of_platform_time(due)?;
            next = Some(next.map_or(oracle, |n| n.min(oracle)));
        }
        if let Some(at) = next {
            if at > oracle_now {
                let granted = env.request_reactivation(at);
                if granted != at {
                    return Err(SchedulerError::internal(format!(
                        "environment granted reactivation at {granted} instead of {at}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptides_causality::{PlatformBuilder, SuperdenseDependency};

    struct NullEnv;
    impl Environment for NullEnv {
        fn request_reactivation(&mut self, oracle_time: SimTime) -> SimTime {
            oracle_time
        }
    }

    /// Copies every input token to the single output port.
    struct Relay {
        out: PortId,
    }
    impl PlatformActor for Relay {
        fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), SchedulerError> {
            for event in ctx.events().to_vec() {
                ctx.send(self.out, event.token)?;
            }
            Ok(())
        }
    }

    fn relay_setup() -> (Director, PortId, PortId) {
        let mut b = PlatformBuilder::new();
        let sensor = b.sensor_input("sensor");
        let relay = b.actor("relay", SimTime::ZERO);
        let r_in = b.input_port(relay, "in").unwrap();
        let r_out = b.output_port(relay, "out").unwrap();
        b.set_dependency(r_in, r_out, SuperdenseDependency::ZERO_DELAY)
            .unwrap();
        let act = b.actuator_output("act");
        b.connect(sensor, r_in).unwrap();
        b.connect(r_out, act).unwrap();
        let platform = b.build().unwrap();
        let analysis = CausalityAnalysis::analyze(&platform, SimTime::ZERO, true).unwrap();
        let scheduler = Scheduler::new(Default::default()).unwrap();
        let mut director = Director::new(platform, analysis, scheduler);
        director.register_actor(relay, Box::new(Relay { out: r_out }));
        (director, sensor, act)
    }

    #[test]
    fn sensor_token_flows_to_the_actuator() {
        let (mut director, sensor, act) = relay_setup();
        let mut env = NullEnv;
        let now = SimTime::from_secs(1.0);
        director.post_input(sensor, Token::Int(7), now).unwrap();
        director.handle_reactivation(now, &mut env).unwrap();

        let delivered = director.take_actuations();
        assert_eq!(
            delivered,
            vec![Actuation {
                port: act,
                tag: Tag::at(now),
                token: Token::Int(7),
                delivered_at: now,
            }]
        );
    }

    #[test]
    fn posting_to_a_non_boundary_port_fails() {
        let (mut director, _sensor, act) = relay_setup();
        let err = director
            .post_input(act, Token::Empty, SimTime::ZERO)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Internal { .. }));
    }

    #[test]
    fn pure_event_deadline_never_precedes_the_triggers() {
        let mut b = PlatformBuilder::new();
        let sensor = b.sensor_input("sensor");
        let a = b.actor("a", SimTime::ZERO);
        let a_in = b.input_port(a, "in").unwrap();
        let a_out = b.output_port(a, "out").unwrap();
        b.set_dependency(
            a_in,
            a_out,
            SuperdenseDependency::new(SimTime::from_secs(4.0), 0),
        )
        .unwrap();
        let act = b.actuator_output("act");
        b.connect(sensor, a_in).unwrap();
        b.connect(a_out, act).unwrap();
        let platform = b.build().unwrap();
        let analysis = CausalityAnalysis::analyze(&platform, SimTime::ZERO, true).unwrap();
        let scheduler = Scheduler::new(Default::default()).unwrap();
        let director = Director::new(platform, analysis, scheduler);

        let tag = Tag::at(SimTime::from_secs(1.0));
        let firing = Firing {
            actor: a,
            tag,
            trigger: Some(a_in),
            deadline: SimTime::from_secs(3.0),
            events: Vec::new(),
        };

        // 1s later but 4s closer to the sink: the raw inherited deadline
        // would regress, so it clamps to the trigger's.
        let soon = director.pure_event(&firing, SimTime::from_secs(2.0));
        assert_eq!(soon.absolute_deadline, SimTime::from_secs(3.0));

        // Far enough out that the inherited deadline moves later.
        let late = director.pure_event(&firing, SimTime::from_secs(10.0));
        assert_eq!(late.absolute_deadline, SimTime::from_secs(8.0));

        // Same model time: next microstep.
        let same = director.pure_event(&firing, tag.time);
        assert_eq!(same.tag, Tag::new(tag.time, 1));
    }
}
