//! Arena indices for the static platform model.
//!
//! Actors and ports are referenced by opaque integer IDs into arrays owned
//! by the platform model. The causality analysis and the scheduler operate
//! purely over these indices; no reference-counted object graphs exist
//! anywhere in the simulator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an actor within a platform model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ActorId(pub u32);

impl ActorId {
    /// The arena index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl From<u32> for ActorId {
    fn from(v: u32) -> Self {
        ActorId(v)
    }
}

/// Identifies a port within a platform model.
///
/// Platform-level sensor/network inputs and actuator/network outputs share
/// the same arena as actor ports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PortId(pub u32);

impl PortId {
    /// The arena index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

impl From<u32> for PortId {
    fn from(v: u32) -> Self {
        PortId(v)
    }
}
