//! Runtime kernel of the PTIDES platform simulator.
//!
//! A platform is driven entirely by callbacks: the environment posts
//! timestamped tokens and activates the [`Director`] at oracle instants the
//! director itself requested. Internally the director runs the
//! safe-to-process [`Scheduler`], which owns:
//!
//! - the [`EventQueue`] of pending firings,
//! - the [`ExecutionStack`] simulating actor execution time and preemption,
//! - two drifting [`RealTimeClock`]s (platform and execution),
//! - the wake-up plan that survives clock drift changes.
//!
//! Nothing here blocks or spawns. Given the same arrival sequence and clock
//! parameters, a run replays the same dispatch sequence exactly.

mod clock;
mod director;
mod event;
mod exec;
mod queue;
mod scheduler;

pub use clock::RealTimeClock;
pub use director::{Actuation, Director, Environment, FiringContext, PlatformActor};
pub use event::Event;
pub use exec::{ExecutionRecord, ExecutionStack};
pub use queue::EventQueue;
pub use scheduler::{
    Decision, Firing, Scheduler, SchedulerClock, SchedulerConfig, SchedulerState,
};
