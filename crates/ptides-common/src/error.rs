//! Error taxonomy for model construction and scheduling.
//!
//! Construction problems are [`ConfigError`]s: they abort model building and
//! are never silently defaulted. Runtime problems are [`SchedulerError`]s:
//! ordering violations, deadline misses, clock inconsistencies, and internal
//! defects. The scheduler never swallows one of these to keep going, because
//! doing so would invalidate the ordering guarantees of the simulation.

use crate::{ActorId, PortId, SimTime, Tag};
use thiserror::Error;

/// Errors detected while building or analyzing a static platform model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A port ID does not exist in the model.
    #[error("unknown port {port}")]
    UnknownPort {
        /// The dangling reference.
        port: PortId,
    },

    /// An actor ID does not exist in the model.
    #[error("unknown actor {actor}")]
    UnknownActor {
        /// The dangling reference.
        actor: ActorId,
    },

    /// A port was used against its declared direction.
    #[error("port {port} is not an {expected} port")]
    DirectionMismatch {
        /// The offending port.
        port: PortId,
        /// "input" or "output".
        expected: &'static str,
    },

    /// A dependency was declared between ports of different actors.
    #[error("ports {input} and {output} do not belong to the same actor")]
    CrossActorDependency {
        /// The input side of the declared dependency.
        input: PortId,
        /// The output side of the declared dependency.
        output: PortId,
    },

    /// An annotation is not meaningful for the port's role.
    #[error("annotation `{annotation}` is not valid on {port}: {reason}")]
    InvalidAnnotation {
        /// The annotated port.
        port: PortId,
        /// The annotation name.
        annotation: &'static str,
        /// Why it is rejected.
        reason: String,
    },

    /// A delay or deadline parameter is negative.
    #[error("negative {parameter} of {value} on {port}")]
    NegativeParameter {
        /// The annotated port.
        port: PortId,
        /// The parameter name.
        parameter: &'static str,
        /// The rejected value.
        value: SimTime,
    },

    /// An actor is unreachable from every sensor/network input. Source
    /// actors are not supported: every event chain must originate outside
    /// the platform.
    #[error("{actor} is not reachable from any sensor or network input")]
    UnreachableActor {
        /// The unreachable actor.
        actor: ActorId,
    },

    /// A clock was configured with a negative drift.
    #[error("negative clock drift {drift}: local time would run backwards")]
    NegativeDrift {
        /// The rejected drift rate.
        drift: f64,
    },
}

/// Errors raised while the scheduler is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// An event was dispatched with a tag not strictly greater than the last
    /// tag consumed by its equivalence-class anchor. This indicates a
    /// safe-to-process or causality-analysis bug; the simulation halts
    /// rather than continuing with unsound results.
    #[error(
        "event for {actor} processed out of timestamp order: \
         previous tag {previous}, current tag {current}"
    )]
    TagOrderViolation {
        /// The destination actor.
        actor: ActorId,
        /// The last tag consumed by the actor's equivalence anchor.
        previous: Tag,
        /// The offending tag.
        current: Tag,
    },

    /// Simulated physical time passed an actuation event's timestamp and the
    /// destination port is not annotated to ignore deadlines.
    #[error(
        "missed deadline at {port}: event timestamp {deadline}, \
         platform time {platform_time}"
    )]
    DeadlineMiss {
        /// The actuator/network output port.
        port: PortId,
        /// The actuation instant that was missed.
        deadline: SimTime,
        /// The platform time when the miss was detected.
        platform_time: SimTime,
    },

    /// A clock operation was rejected: negative drift, an inversion through
    /// a stopped clock, or a query before the clock's last correspondence
    /// point. Rejected at the call site, never coerced or clamped.
    #[error("clock error: {reason}")]
    ClockError {
        /// Why the clock rejected the operation.
        reason: String,
    },

    /// A device-delayed input token's delivery instant was skipped over.
    #[error(
        "missed input transfer at {port}: delivery was due at {due}, \
         current time is {now}"
    )]
    MissedTransfer {
        /// The sensor/network input port.
        port: PortId,
        /// The scheduled delivery instant.
        due: SimTime,
        /// The time at which the miss was observed.
        now: SimTime,
    },

    /// An internal-consistency failure: negative remaining execution time,
    /// the environment granting a reactivation time other than the one
    /// requested, or a wake-up observed in the past. These indicate a core
    /// defect and abort the run rather than attempting repair.
    #[error("internal consistency failure: {reason}")]
    Internal {
        /// Description of the defect.
        reason: String,
    },
}

impl SchedulerError {
    /// Shorthand for an [`SchedulerError::Internal`] with a formatted reason.
    pub fn internal(reason: impl Into<String>) -> Self {
        SchedulerError::Internal {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`SchedulerError::ClockError`] with a formatted reason.
    pub fn clock(reason: impl Into<String>) -> Self {
        SchedulerError::ClockError {
            reason: reason.into(),
        }
    }
}
