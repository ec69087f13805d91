//! Queued events.

use ptides_common::{ActorId, PortId, SimTime, Tag, Token};

/// A pending firing of an actor at a logical tag.
///
/// Trigger events carry a token to a specific input channel. Pure events are
/// created by an actor's own firing request: they carry no token, but they
/// remember the input port that caused them so the safe-to-process test can
/// reason about their causal history.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The logical instant of the firing.
    pub tag: Tag,
    /// The destination actor.
    pub actor: ActorId,
    /// Destination input port (trigger events) or causally related port
    /// (pure events; `None` when the firing has no causal history).
    pub port: Option<PortId>,
    /// Destination channel. Meaningless for pure events.
    pub channel: usize,
    /// The payload.
    pub token: Token,
    /// Latest platform time at which processing this event still meets
    /// every downstream deadline.
    pub absolute_deadline: SimTime,
    /// Whether this is a pure event.
    pub is_pure: bool,
}

impl Event {
    /// A trigger event delivering `token` to `(port, channel)` of `actor`.
    pub fn trigger(
        tag: Tag,
        actor: ActorId,
        port: PortId,
        channel: usize,
        token: Token,
        absolute_deadline: SimTime,
    ) -> Self {
        Event {
            tag,
            actor,
            port: Some(port),
            channel,
            token,
            absolute_deadline,
            is_pure: false,
        }
    }

    /// A pure event for `actor`, causally related to `port`.
    pub fn pure(tag: Tag, actor: ActorId, port: Option<PortId>, absolute_deadline: SimTime) -> Self {
        Event {
            tag,
            actor,
            port,
            channel: 0,
            token: Token::Empty,
            absolute_deadline,
            is_pure: true,
        }
    }
}
