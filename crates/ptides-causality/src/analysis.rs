//! Causality analysis over a static platform.
//!
//! Runs once per topology. Every port in the arena becomes a graph node;
//! wires contribute zero-delay edges and actors contribute the edges of
//! their declared causality interfaces. The all-pairs minimum
//! [`SuperdenseDependency`] is the Floyd-Warshall closure of that graph over
//! the dependency semiring.
//!
//! From the closure the analysis derives:
//!
//! - **finite equivalence classes**: consuming ports (actor inputs plus the
//!   platform's output sinks) that can causally affect a common downstream
//!   port must be treated as jointly timestamp-ordered, so they share a
//!   class. Each class is named by its smallest member, the *anchor*.
//! - **delay offsets**: per (port, channel), the physical-time slack an
//!   event needs before it is provably safe to process. Paths are seeded at
//!   each sensor/network input with the negated device-delay bound, and the
//!   resulting minimum is reduced by the platform's clock-synchronization
//!   error bound. An offset of `SimTime::MAX` means no boundary input can
//!   reach the port, so events there are always safe.

use crate::{Platform, PortRole, SuperdenseDependency};
use ptides_common::{ConfigError, PortId, SimTime};
use std::collections::HashMap;
use tracing::debug;

/// Immutable results of analyzing one platform topology.
#[derive(Debug, Clone)]
pub struct CausalityAnalysis {
    /// All-pairs minimum dependency, indexed by port arena indices.
    dep: Vec<Vec<SuperdenseDependency>>,
    /// Equivalence-class anchor for each consuming port.
    anchors: HashMap<PortId, PortId>,
    /// Class members keyed by anchor.
    members: HashMap<PortId, Vec<PortId>>,
    /// Per (port, channel) delay offset.
    offsets: HashMap<PortId, Vec<SimTime>>,
    /// Per anchor, the minimum offset over the whole class.
    class_offsets: HashMap<PortId, SimTime>,
    /// Per (port, channel), whether a network input feeds the channel.
    network_fed: HashMap<PortId, Vec<bool>>,
    /// Per actor input, the minimum delay to any platform output sink.
    min_to_sink: HashMap<PortId, SimTime>,
    force_timestamp_order: bool,
}

impl CausalityAnalysis {
    /// Analyze `platform`.
    ///
    /// `sync_error_bound` is the worst-case disagreement between this
    /// platform's clock and any clock that timestamps its network inputs.
    /// `force_timestamp_order` widens each port's delay offset to the
    /// minimum over its whole equivalence class, so every actor observes its
    /// inputs in timestamp order even across ports.
    pub fn analyze(
        platform: &Platform,
        sync_error_bound: SimTime,
        force_timestamp_order: bool,
    ) -> Result<Self, ConfigError> {
        let dep = Self::closure(platform);

        // Ports whose events must obey joint timestamp order: actor inputs
        // and the platform's actuator/network sinks.
        let consuming: Vec<PortId> = platform
            .port_ids()
            .filter(|&p| {
                let role = platform.port(p).role;
                role == PortRole::Input || role.is_boundary_output()
            })
            .collect();

        let (anchors, members) = Self::partition_classes(&dep, &consuming);

        // Minimum boundary-seeded delay into each channel. Seeds are the
        // negated device-delay bounds, so a slow sensor lowers the offset of
        // everything downstream of it.
        let mut raw: HashMap<PortId, Vec<SimTime>> = HashMap::new();
        let mut network_fed: HashMap<PortId, Vec<bool>> = HashMap::new();
        for &port in &consuming {
            let width = platform.width(port);
            let mut delays = Vec::with_capacity(width);
            let mut fed = Vec::with_capacity(width);
            for channel in 0..width {
                let feeder = match platform.feeder(port, channel) {
                    Some(f) => f,
                    None => continue,
                };
                let mut best = SimTime::MAX;
                let mut from_network = false;
                for &b in platform.boundary_inputs() {
                    let path = dep[b.index()][feeder.index()];
                    if !path.is_finite() {
                        continue;
                    }
                    let bound = platform.port(b).annotations.device_delay_bound;
                    let seed = SimTime::ZERO - bound;
                    best = best.min(seed + path.delay);
                    if platform.port(b).role == PortRole::NetworkInput {
                        from_network = true;
                    }
                }
                delays.push(best);
                fed.push(from_network);
            }
            raw.insert(port, delays);
            network_fed.insert(port, fed);
        }

        // Class-wide minima, then per-channel offsets.
        let mut class_offsets = HashMap::new();
        for (&anchor, ports) in &members {
            let mut min = SimTime::MAX;
            for p in ports {
                for &d in &raw[p] {
                    min = min.min(d);
                }
            }
            class_offsets.insert(anchor, min - sync_error_bound);
        }

        let mut offsets = HashMap::new();
        for &port in &consuming {
            let class_offset = class_offsets[&anchors[&port]];
            let channel_offsets = raw[&port]
                .iter()
                .map(|&d| {
                    if force_timestamp_order {
                        class_offset
                    } else {
                        d - sync_error_bound
                    }
                })
                .collect();
            offsets.insert(port, channel_offsets);
        }

        // Minimum delay from each actor input to any platform sink; pure
        // events derive their deadlines from this.
        let mut min_to_sink = HashMap::new();
        for p in platform.port_ids() {
            if platform.port(p).role != PortRole::Input {
                continue;
            }
            let mut min = SimTime::MAX;
            for &sink in platform.boundary_outputs() {
                let path = dep[p.index()][sink.index()];
                if path.is_finite() {
                    min = min.min(path.delay);
                }
            }
            min_to_sink.insert(p, min);
        }

        // Every actor must be reachable from a boundary input: a platform
        // has no event sources of its own.
        for actor in platform.actor_ids() {
            let reachable = platform.actor(actor).inputs.iter().any(|p| {
                raw.get(p)
                    .map(|delays| delays.iter().any(|d| !d.is_infinite()))
                    .unwrap_or(false)
            });
            if !reachable {
                return Err(ConfigError::UnreachableActor { actor });
            }
        }

        debug!(
            ports = platform.port_count(),
            classes = members.len(),
            force_timestamp_order,
            "causality analysis complete"
        );

        Ok(CausalityAnalysis {
            dep,
            anchors,
            members,
            offsets,
            class_offsets,
            network_fed,
            min_to_sink,
            force_timestamp_order,
        })
    }

    /// Floyd-Warshall closure of the port graph over the dependency semiring.
    fn closure(platform: &Platform) -> Vec<Vec<SuperdenseDependency>> {
        let n = platform.port_count();
        let mut dep = vec![vec![SuperdenseDependency::NO_PATH; n]; n];
        for i in 0..n {
            dep[i][i] = SuperdenseDependency::ZERO_DELAY;
        }
        for p in platform.port_ids() {
            let spec = platform.port(p);
            // Wires are instantaneous.
            for &(to, _channel) in &spec.targets {
                dep[p.index()][to.index()] =
                    dep[p.index()][to.index()].oplus(SuperdenseDependency::ZERO_DELAY);
            }
            // Actor-internal edges come from the declared interface.
            if spec.role == PortRole::Input {
                if let Some(actor) = spec.owner {
                    for &out in &platform.actor(actor).outputs {
                        let d = platform.dependency(p, out);
                        dep[p.index()][out.index()] = dep[p.index()][out.index()].oplus(d);
                    }
                }
            }
        }
        for k in 0..n {
            for i in 0..n {
                if !dep[i][k].is_finite() {
                    continue;
                }
                for j in 0..n {
                    let through = dep[i][k].otimes(dep[k][j]);
                    dep[i][j] = dep[i][j].oplus(through);
                }
            }
        }
        dep
    }

    /// Union-find partition: two consuming ports share a class when both
    /// have a finite dependency on some common port.
    fn partition_classes(
        dep: &[Vec<SuperdenseDependency>],
        consuming: &[PortId],
    ) -> (HashMap<PortId, PortId>, HashMap<PortId, Vec<PortId>>) {
        let n = consuming.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        let total_ports = dep.len();
        for a in 0..n {
            for b in (a + 1)..n {
                let (pa, pb) = (consuming[a], consuming[b]);
                let joined = (0..total_ports).any(|k| {
                    dep[pa.index()][k].is_finite() && dep[pb.index()][k].is_finite()
                });
                if joined {
                    let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                    parent[ra] = rb;
                }
            }
        }

        let mut members: HashMap<PortId, Vec<PortId>> = HashMap::new();
        let mut root_anchor: HashMap<usize, PortId> = HashMap::new();
        // First pass picks each class's smallest member as its anchor;
        // consuming IDs ascend, so the first member seen is the anchor.
        for idx in 0..n {
            let root = find(&mut parent, idx);
            root_anchor.entry(root).or_insert(consuming[idx]);
        }
        let mut anchors = HashMap::new();
        for idx in 0..n {
            let root = find(&mut parent, idx);
            let anchor = root_anchor[&root];
            anchors.insert(consuming[idx], anchor);
            members.entry(anchor).or_default().push(consuming[idx]);
        }
        (anchors, members)
    }

    /// Minimum superdense dependency from one port to another, or
    /// [`SuperdenseDependency::NO_PATH`].
    pub fn dependency(&self, from: PortId, to: PortId) -> SuperdenseDependency {
        self.dep[from.index()][to.index()]
    }

    /// The delay offset of a port channel: an event there is safe to process
    /// once platform time reaches its timestamp minus this offset.
    /// `SimTime::MAX` (always safe) for unreachable or unknown channels.
    pub fn delay_offset(&self, port: PortId, channel: usize) -> SimTime {
        self.offsets
            .get(&port)
            .and_then(|chans| chans.get(channel).copied())
            .unwrap_or(SimTime::MAX)
    }

    /// The offset a pure event inherits from its causally related port: the
    /// minimum over that port's whole equivalence class. When actors are not
    /// forced to see inputs in timestamp order, pure events are always safe
    /// and the offset is `SimTime::MAX`.
    pub fn class_min_offset(&self, port: PortId) -> SimTime {
        if !self.force_timestamp_order {
            return SimTime::MAX;
        }
        self.anchors
            .get(&port)
            .and_then(|anchor| self.class_offsets.get(anchor).copied())
            .unwrap_or(SimTime::MAX)
    }

    /// The equivalence-class anchor of a consuming port. Ports without a
    /// class (producers) anchor to themselves.
    pub fn anchor(&self, port: PortId) -> PortId {
        self.anchors.get(&port).copied().unwrap_or(port)
    }

    /// Members of the equivalence class containing `port`.
    pub fn equivalence_class(&self, port: PortId) -> &[PortId] {
        self.anchors
            .get(&port)
            .and_then(|anchor| self.members.get(anchor))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a network input feeds this channel. Events arriving over such
    /// channels already waited out the sender's safe-to-process check, so
    /// they are processed without further delay.
    pub fn network_fed(&self, port: PortId, channel: usize) -> bool {
        self.network_fed
            .get(&port)
            .and_then(|chans| chans.get(channel).copied())
            .unwrap_or(false)
    }

    /// Minimum model-time delay from an actor input to any actuator or
    /// network output, for deadline inheritance. `SimTime::MAX` when the
    /// input affects no platform output.
    pub fn min_delay_to_sink(&self, input: PortId) -> SimTime {
        self.min_to_sink.get(&input).copied().unwrap_or(SimTime::MAX)
    }
}
