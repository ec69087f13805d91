//! Shared foundation types for the PTIDES platform simulator.
//!
//! This crate has no dependencies on the other workspace members and provides:
//! - [`SimTime`] and [`Tag`] - simulated time and superdense logical instants
//! - [`ActorId`] / [`PortId`] - arena indices into the static platform model
//! - [`Token`] - opaque event payloads
//! - [`ConfigError`] / [`SchedulerError`] - the error taxonomy shared by the
//!   causality analysis and the runtime kernel

mod error;
mod ids;
mod time;
mod token;

pub use error::{ConfigError, SchedulerError};
pub use ids::{ActorId, PortId};
pub use time::{SimTime, Tag};
pub use token::Token;
