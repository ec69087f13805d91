//! Static platform model.
//!
//! A platform is a fixed arena of actors and ports plus the wiring between
//! them. [`PlatformBuilder`] validates everything at construction time and
//! produces an immutable [`Platform`]; nothing about the topology can change
//! afterwards. The scheduler and the causality analysis only ever hold
//! `ActorId`/`PortId` indices into this arena.
//!
//! ## Port roles
//!
//! Boundary ports belong to the platform itself: sensor and network inputs
//! feed events in, actuator and network outputs deliver them out. Actor ports
//! belong to an actor and carry its declared causality interface (the
//! per-(input, output) [`SuperdenseDependency`] map).
//!
//! ## Channels
//!
//! A consuming port may be fed by several producers. Each incoming wire gets
//! the next channel number at [`PlatformBuilder::connect`] time, so a
//! (port, channel) pair names exactly one wire.

use crate::SuperdenseDependency;
use ptides_common::{ActorId, ConfigError, PortId, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Port roles and annotations
// ============================================================================

/// What a port is for. The role decides which annotations are meaningful and
/// which ends of a wire the port may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    /// Platform boundary: a sensor delivering events stamped with local
    /// platform time.
    SensorInput,
    /// Platform boundary: a network interface delivering events that carry
    /// their own tags.
    NetworkInput,
    /// An actor's input port.
    Input,
    /// An actor's output port.
    Output,
    /// Platform boundary: an actuator that must receive each event no later
    /// than its timestamp.
    ActuatorOutput,
    /// Platform boundary: a network interface sending events to another
    /// platform.
    NetworkOutput,
}

impl PortRole {
    /// Boundary ports where events enter the platform.
    pub fn is_boundary_input(self) -> bool {
        matches!(self, PortRole::SensorInput | PortRole::NetworkInput)
    }

    /// Boundary ports where events leave the platform.
    pub fn is_boundary_output(self) -> bool {
        matches!(self, PortRole::ActuatorOutput | PortRole::NetworkOutput)
    }

    /// Ports that may sit on the producing end of a wire.
    fn produces(self) -> bool {
        self.is_boundary_input() || self == PortRole::Output
    }

    /// Ports that may sit on the consuming end of a wire.
    fn consumes(self) -> bool {
        self.is_boundary_output() || self == PortRole::Input
    }
}

/// Timing annotations attached to a port.
///
/// Only some fields are meaningful for a given [`PortRole`]; the builder
/// rejects annotations on ports whose role cannot honor them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortAnnotations {
    /// Physical latency a boundary input imposes between an event occurring
    /// and the platform observing it.
    pub device_delay: SimTime,
    /// Worst-case bound on `device_delay`, used by the causality analysis.
    /// Never smaller than `device_delay`.
    pub device_delay_bound: SimTime,
    /// How long after its timestamp an event arriving at this port must be
    /// processed. `SimTime::MAX` means no deadline.
    pub relative_deadline: SimTime,
    /// On a boundary output: deliver late events with a warning instead of
    /// failing the run.
    pub ignore_deadline: bool,
    /// On a boundary output: deliver events as soon as they are produced
    /// rather than waiting for platform time to reach their timestamp.
    pub transfer_immediately: bool,
}

impl Default for PortAnnotations {
    fn default() -> Self {
        PortAnnotations {
            device_delay: SimTime::ZERO,
            device_delay_bound: SimTime::ZERO,
            relative_deadline: SimTime::MAX,
            ignore_deadline: false,
            transfer_immediately: false,
        }
    }
}

// ============================================================================
// Arena entries
// ============================================================================

/// One port in the platform arena.
#[derive(Debug, Clone)]
pub struct PortSpec {
    /// Human-readable name, used only in logs and errors.
    pub name: String,
    /// The port's role.
    pub role: PortRole,
    /// The owning actor; `None` for platform boundary ports.
    pub owner: Option<ActorId>,
    /// Timing annotations.
    pub annotations: PortAnnotations,
    /// Outgoing wires: destination port and the channel this wire occupies
    /// at the destination.
    pub targets: Vec<(PortId, usize)>,
    /// Incoming wires, indexed by channel: the producing port of each.
    pub sources: Vec<PortId>,
}

/// One actor in the platform arena.
#[derive(Debug, Clone)]
pub struct ActorSpec {
    /// Human-readable name, used only in logs and errors.
    pub name: String,
    /// Simulated execution time of one firing.
    pub execution_time: SimTime,
    /// Per-trigger-port overrides of `execution_time`.
    pub execution_time_overrides: HashMap<PortId, SimTime>,
    /// The actor's input ports.
    pub inputs: Vec<PortId>,
    /// The actor's output ports.
    pub outputs: Vec<PortId>,
    /// Declared causality interface: minimal superdense delay from each
    /// input to each output. Absent pairs mean no dependency.
    pub dependencies: HashMap<(PortId, PortId), SuperdenseDependency>,
}

// ============================================================================
// Platform
// ============================================================================

/// An immutable platform topology. Built once via [`PlatformBuilder`];
/// a topology change means building a new platform and re-running the
/// causality analysis on it.
#[derive(Debug, Clone)]
pub struct Platform {
    actors: Vec<ActorSpec>,
    ports: Vec<PortSpec>,
    boundary_inputs: Vec<PortId>,
    boundary_outputs: Vec<PortId>,
}

impl Platform {
    /// Look up a port.
    pub fn port(&self, id: PortId) -> &PortSpec {
        &self.ports[id.index()]
    }

    /// Look up an actor.
    pub fn actor(&self, id: ActorId) -> &ActorSpec {
        &self.actors[id.index()]
    }

    /// Number of ports in the arena.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Number of actors in the arena.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// All port IDs, in arena order.
    pub fn port_ids(&self) -> impl Iterator<Item = PortId> + '_ {
        (0..self.ports.len() as u32).map(PortId)
    }

    /// All actor IDs, in arena order.
    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        (0..self.actors.len() as u32).map(ActorId)
    }

    /// Sensor and network input ports.
    pub fn boundary_inputs(&self) -> &[PortId] {
        &self.boundary_inputs
    }

    /// Actuator and network output ports.
    pub fn boundary_outputs(&self) -> &[PortId] {
        &self.boundary_outputs
    }

    /// Declared dependency from an actor input to an actor output, or
    /// [`SuperdenseDependency::NO_PATH`] if none was declared.
    pub fn dependency(&self, input: PortId, output: PortId) -> SuperdenseDependency {
        match self.port(input).owner {
            Some(actor) => self
                .actor(actor)
                .dependencies
                .get(&(input, output))
                .copied()
                .unwrap_or(SuperdenseDependency::NO_PATH),
            None => SuperdenseDependency::NO_PATH,
        }
    }

    /// Simulated execution time of one firing of `actor`, honoring any
    /// per-trigger-port override.
    pub fn execution_time(&self, actor: ActorId, trigger: Option<PortId>) -> SimTime {
        let spec = self.actor(actor);
        trigger
            .and_then(|p| spec.execution_time_overrides.get(&p).copied())
            .unwrap_or(spec.execution_time)
    }

    /// The producer feeding `(port, channel)`, if that channel exists.
    pub fn feeder(&self, port: PortId, channel: usize) -> Option<PortId> {
        self.port(port).sources.get(channel).copied()
    }

    /// Number of incoming channels at `port`.
    pub fn width(&self, port: PortId) -> usize {
        self.port(port).sources.len()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Incrementally assembles a [`Platform`], validating every declaration as it
/// is made so errors point at the offending call.
#[derive(Debug, Default)]
pub struct PlatformBuilder {
    actors: Vec<ActorSpec>,
    ports: Vec<PortSpec>,
}

impl PlatformBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_port(&mut self, name: &str, role: PortRole, owner: Option<ActorId>) -> PortId {
        let id = PortId(self.ports.len() as u32);
        self.ports.push(PortSpec {
            name: name.to_string(),
            role,
            owner,
            annotations: PortAnnotations::default(),
            targets: Vec::new(),
            sources: Vec::new(),
        });
        id
    }

    fn check_port(&self, id: PortId) -> Result<&PortSpec, ConfigError> {
        self.ports
            .get(id.index())
            .ok_or(ConfigError::UnknownPort { port: id })
    }

    fn check_actor(&self, id: ActorId) -> Result<&ActorSpec, ConfigError> {
        self.actors
            .get(id.index())
            .ok_or(ConfigError::UnknownActor { actor: id })
    }

    fn check_nonnegative(
        port: PortId,
        parameter: &'static str,
        value: SimTime,
    ) -> Result<(), ConfigError> {
        if value < SimTime::ZERO {
            return Err(ConfigError::NegativeParameter {
                port,
                parameter,
                value,
            });
        }
        Ok(())
    }

    /// Declare a sensor input on the platform boundary.
    pub fn sensor_input(&mut self, name: &str) -> PortId {
        self.add_port(name, PortRole::SensorInput, None)
    }

    /// Declare a network input on the platform boundary.
    pub fn network_input(&mut self, name: &str) -> PortId {
        self.add_port(name, PortRole::NetworkInput, None)
    }

    /// Declare an actuator output on the platform boundary.
    pub fn actuator_output(&mut self, name: &str) -> PortId {
        self.add_port(name, PortRole::ActuatorOutput, None)
    }

    /// Declare a network output on the platform boundary.
    pub fn network_output(&mut self, name: &str) -> PortId {
        self.add_port(name, PortRole::NetworkOutput, None)
    }

    /// Declare an actor with the given simulated execution time per firing.
    pub fn actor(&mut self, name: &str, execution_time: SimTime) -> ActorId {
        let id = ActorId(self.actors.len() as u32);
        self.actors.push(ActorSpec {
            name: name.to_string(),
            execution_time,
            execution_time_overrides: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            dependencies: HashMap::new(),
        });
        id
    }

    /// Declare an input port on `actor`.
    pub fn input_port(&mut self, actor: ActorId, name: &str) -> Result<PortId, ConfigError> {
        self.check_actor(actor)?;
        let id = self.add_port(name, PortRole::Input, Some(actor));
        self.actors[actor.index()].inputs.push(id);
        Ok(id)
    }

    /// Declare an output port on `actor`.
    pub fn output_port(&mut self, actor: ActorId, name: &str) -> Result<PortId, ConfigError> {
        self.check_actor(actor)?;
        let id = self.add_port(name, PortRole::Output, Some(actor));
        self.actors[actor.index()].outputs.push(id);
        Ok(id)
    }

    /// Set the physical latency of a boundary input, and the worst-case bound
    /// the causality analysis should assume for it.
    pub fn set_device_delay(
        &mut self,
        port: PortId,
        delay: SimTime,
        bound: SimTime,
    ) -> Result<(), ConfigError> {
        let spec = self.check_port(port)?;
        if !spec.role.is_boundary_input() {
            return Err(ConfigError::InvalidAnnotation {
                port,
                annotation: "device_delay",
                reason: "only sensor and network inputs have a device delay".to_string(),
            });
        }
        Self::check_nonnegative(port, "device delay", delay)?;
        Self::check_nonnegative(port, "device delay bound", bound)?;
        if bound < delay {
            return Err(ConfigError::InvalidAnnotation {
                port,
                annotation: "device_delay_bound",
                reason: format!("bound {bound} is smaller than the delay {delay}"),
            });
        }
        let ann = &mut self.ports[port.index()].annotations;
        ann.device_delay = delay;
        ann.device_delay_bound = bound;
        Ok(())
    }

    /// Set how long after its timestamp an event arriving at an actor input
    /// must be processed.
    pub fn set_relative_deadline(
        &mut self,
        port: PortId,
        deadline: SimTime,
    ) -> Result<(), ConfigError> {
        let spec = self.check_port(port)?;
        if spec.role != PortRole::Input {
            return Err(ConfigError::InvalidAnnotation {
                port,
                annotation: "relative_deadline",
                reason: "deadlines apply to actor input ports".to_string(),
            });
        }
        Self::check_nonnegative(port, "relative deadline", deadline)?;
        self.ports[port.index()].annotations.relative_deadline = deadline;
        Ok(())
    }

    /// Mark a boundary output as tolerating late events: they are delivered
    /// with a warning instead of failing the run.
    pub fn set_ignore_deadline(&mut self, port: PortId) -> Result<(), ConfigError> {
        let spec = self.check_port(port)?;
        if !spec.role.is_boundary_output() {
            return Err(ConfigError::InvalidAnnotation {
                port,
                annotation: "ignore_deadline",
                reason: "only actuator and network outputs deliver against deadlines".to_string(),
            });
        }
        self.ports[port.index()].annotations.ignore_deadline = true;
        Ok(())
    }

    /// Mark a boundary output as delivering events as soon as they are
    /// produced, without waiting for platform time to reach their timestamp.
    pub fn set_transfer_immediately(&mut self, port: PortId) -> Result<(), ConfigError> {
        let spec = self.check_port(port)?;
        if !spec.role.is_boundary_output() {
            return Err(ConfigError::InvalidAnnotation {
                port,
                annotation: "transfer_immediately",
                reason: "only actuator and network outputs buffer deliveries".to_string(),
            });
        }
        self.ports[port.index()].annotations.transfer_immediately = true;
        Ok(())
    }

    /// Override an actor's execution time for firings triggered through one
    /// of its input ports.
    pub fn set_execution_time_override(
        &mut self,
        actor: ActorId,
        trigger: PortId,
        time: SimTime,
    ) -> Result<(), ConfigError> {
        self.check_actor(actor)?;
        let spec = self.check_port(trigger)?;
        if spec.owner != Some(actor) || spec.role != PortRole::Input {
            return Err(ConfigError::DirectionMismatch {
                port: trigger,
                expected: "input",
            });
        }
        Self::check_nonnegative(trigger, "execution time", time)?;
        self.actors[actor.index()]
            .execution_time_overrides
            .insert(trigger, time);
        Ok(())
    }

    /// Declare the minimal superdense delay an actor imposes between one of
    /// its inputs and one of its outputs. Undeclared pairs mean no
    /// dependency.
    pub fn set_dependency(
        &mut self,
        input: PortId,
        output: PortId,
        dependency: SuperdenseDependency,
    ) -> Result<(), ConfigError> {
        let in_spec = self.check_port(input)?;
        let out_spec = self.check_port(output)?;
        if in_spec.role != PortRole::Input {
            return Err(ConfigError::DirectionMismatch {
                port: input,
                expected: "input",
            });
        }
        if out_spec.role != PortRole::Output {
            return Err(ConfigError::DirectionMismatch {
                port: output,
                expected: "output",
            });
        }
        let owner = match (in_spec.owner, out_spec.owner) {
            (Some(a), Some(b)) if a == b => a,
            _ => return Err(ConfigError::CrossActorDependency { input, output }),
        };
        self.actors[owner.index()]
            .dependencies
            .insert((input, output), dependency);
        Ok(())
    }

    /// Wire a producer to a consumer. The wire occupies the consumer's next
    /// free channel, which is returned.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<usize, ConfigError> {
        let from_spec = self.check_port(from)?;
        if !from_spec.role.produces() {
            return Err(ConfigError::DirectionMismatch {
                port: from,
                expected: "producing",
            });
        }
        let to_spec = self.check_port(to)?;
        if !to_spec.role.consumes() {
            return Err(ConfigError::DirectionMismatch {
                port: to,
                expected: "consuming",
            });
        }
        let channel = to_spec.sources.len();
        self.ports[to.index()].sources.push(from);
        self.ports[from.index()].targets.push((to, channel));
        Ok(channel)
    }

    /// Finalize the topology.
    pub fn build(self) -> Result<Platform, ConfigError> {
        let mut boundary_inputs = Vec::new();
        let mut boundary_outputs = Vec::new();
        for (idx, spec) in self.ports.iter().enumerate() {
            let id = PortId(idx as u32);
            if spec.role.is_boundary_input() {
                boundary_inputs.push(id);
            } else if spec.role.is_boundary_output() {
                boundary_outputs.push(id);
            }
        }
        Ok(Platform {
            actors: self.actors,
            ports: self.ports,
            boundary_inputs,
            boundary_outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_assigns_channels_in_order() {
        let mut b = PlatformBuilder::new();
        let s1 = b.sensor_input("s1");
        let s2 = b.sensor_input("s2");
        let a = b.actor("merge", SimTime::ZERO);
        let inp = b.input_port(a, "in").unwrap();
        assert_eq!(b.connect(s1, inp).unwrap(), 0);
        assert_eq!(b.connect(s2, inp).unwrap(), 1);
        let platform = b.build().unwrap();
        assert_eq!(platform.width(inp), 2);
        assert_eq!(platform.feeder(inp, 0), Some(s1));
        assert_eq!(platform.feeder(inp, 1), Some(s2));
        assert_eq!(platform.port(s1).targets, vec![(inp, 0)]);
    }

    #[test]
    fn connect_rejects_direction_mixups() {
        let mut b = PlatformBuilder::new();
        let s = b.sensor_input("s");
        let act = b.actuator_output("act");
        let a = b.actor("a", SimTime::ZERO);
        let inp = b.input_port(a, "in").unwrap();
        let out = b.output_port(a, "out").unwrap();
        assert!(matches!(
            b.connect(inp, out),
            Err(ConfigError::DirectionMismatch { .. })
        ));
        assert!(matches!(
            b.connect(act, inp),
            Err(ConfigError::DirectionMismatch { .. })
        ));
        assert!(b.connect(s, inp).is_ok());
        assert!(b.connect(out, act).is_ok());
    }

    #[test]
    fn dependency_requires_same_actor() {
        let mut b = PlatformBuilder::new();
        let a1 = b.actor("a1", SimTime::ZERO);
        let a2 = b.actor("a2", SimTime::ZERO);
        let in1 = b.input_port(a1, "in").unwrap();
        let out2 = b.output_port(a2, "out").unwrap();
        assert_eq!(
            b.set_dependency(in1, out2, SuperdenseDependency::ZERO_DELAY),
            Err(ConfigError::CrossActorDependency {
                input: in1,
                output: out2,
            })
        );
    }

    #[test]
    fn undeclared_dependency_is_no_path() {
        let mut b = PlatformBuilder::new();
        let a = b.actor("a", SimTime::ZERO);
        let inp = b.input_port(a, "in").unwrap();
        let out = b.output_port(a, "out").unwrap();
        let other = b.output_port(a, "other").unwrap();
        b.set_dependency(inp, out, SuperdenseDependency::new(SimTime::from_secs(1.0), 0))
            .unwrap();
        let platform = b.build().unwrap();
        assert!(platform.dependency(inp, out).is_finite());
        assert_eq!(
            platform.dependency(inp, other),
            SuperdenseDependency::NO_PATH
        );
    }

    #[test]
    fn annotations_are_role_checked() {
        let mut b = PlatformBuilder::new();
        let s = b.sensor_input("s");
        let act = b.actuator_output("act");
        let a = b.actor("a", SimTime::ZERO);
        let inp = b.input_port(a, "in").unwrap();

        b.set_device_delay(s, SimTime::from_millis(1), SimTime::from_millis(2))
            .unwrap();
        assert!(matches!(
            b.set_device_delay(inp, SimTime::ZERO, SimTime::ZERO),
            Err(ConfigError::InvalidAnnotation { .. })
        ));
        assert!(matches!(
            b.set_device_delay(s, SimTime::from_millis(2), SimTime::from_millis(1)),
            Err(ConfigError::InvalidAnnotation { .. })
        ));

        b.set_relative_deadline(inp, SimTime::from_millis(5)).unwrap();
        assert!(matches!(
            b.set_relative_deadline(act, SimTime::ZERO),
            Err(ConfigError::InvalidAnnotation { .. })
        ));
        assert!(matches!(
            b.set_relative_deadline(inp, SimTime::from_millis(-5)),
            Err(ConfigError::NegativeParameter { .. })
        ));

        b.set_ignore_deadline(act).unwrap();
        assert!(matches!(
            b.set_ignore_deadline(s),
            Err(ConfigError::InvalidAnnotation { .. })
        ));
    }

    #[test]
    fn execution_time_override_applies_per_trigger() {
        let mut b = PlatformBuilder::new();
        let a = b.actor("a", SimTime::from_millis(10));
        let fast = b.input_port(a, "fast").unwrap();
        let slow = b.input_port(a, "slow").unwrap();
        b.set_execution_time_override(a, fast, SimTime::from_millis(1))
            .unwrap();
        let platform = b.build().unwrap();
        assert_eq!(platform.execution_time(a, Some(fast)), SimTime::from_millis(1));
        assert_eq!(platform.execution_time(a, Some(slow)), SimTime::from_millis(10));
        assert_eq!(platform.execution_time(a, None), SimTime::from_millis(10));
    }
}
