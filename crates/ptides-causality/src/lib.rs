//! Static platform model and causality analysis.
//!
//! A PTIDES platform is described once, before a run, as an arena of actors
//! and ports with per-actor causality interfaces ([`Platform`], built through
//! [`PlatformBuilder`]). From that description, [`CausalityAnalysis`] derives
//! everything the scheduler needs to prove events safe to process:
//!
//! - the all-pairs minimum [`SuperdenseDependency`] between ports,
//! - the finite equivalence classes of input ports,
//! - the per port/channel delay offsets.
//!
//! All of this is computed exactly once per static topology. If the topology
//! changes, the caller rebuilds the platform and re-runs the analysis; there
//! is no implicit version counter or cache invalidation.

mod analysis;
mod dependency;
mod model;

pub use analysis::CausalityAnalysis;
pub use dependency::SuperdenseDependency;
pub use model::{ActorSpec, Platform, PlatformBuilder, PortAnnotations, PortRole, PortSpec};
