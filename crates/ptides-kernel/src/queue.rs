//! The pending-event queue.

use crate::Event;
use ptides_common::Tag;

/// Events ordered by tag, with insertion order preserved among equal tags.
///
/// The queue never reorders same-tag entries: callers that need all events
/// sharing a tag and a destination pull them out together with
/// [`EventQueue::take_matching`]. Tag-order enforcement against already
/// consumed events is the scheduler's job, not the queue's.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, keeping tag order. An event ties with existing equal-tag
    /// entries by going after them.
    pub fn insert(&mut self, event: Event) {
        let idx = self.events.partition_point(|e| e.tag <= event.tag);
        self.events.insert(idx, event);
    }

    /// The event with the smallest tag, oldest first among ties.
    pub fn peek_earliest(&self) -> Option<&Event> {
        self.events.first()
    }

    /// The event at `index` in queue order.
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Remove and return the event at `index`.
    pub fn take(&mut self, index: usize) -> Event {
        self.events.remove(index)
    }

    /// Remove and return every event matching `pred`, preserving their
    /// relative queue order.
    pub fn take_matching(&mut self, mut pred: impl FnMut(&Event) -> bool) -> Vec<Event> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.events.len());
        for e in self.events.drain(..) {
            if pred(&e) {
                taken.push(e);
            } else {
                kept.push(e);
            }
        }
        self.events = kept;
        taken
    }

    /// Smallest tag currently queued.
    pub fn earliest_tag(&self) -> Option<Tag> {
        self.events.first().map(|e| e.tag)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptides_common::{ActorId, PortId, SimTime, Token};

    fn ev(secs: f64, microstep: u32, actor: u32) -> Event {
        Event::trigger(
            Tag::new(SimTime::from_secs(secs), microstep),
            ActorId(actor),
            PortId(0),
            0,
            Token::Empty,
            SimTime::MAX,
        )
    }

    #[test]
    fn orders_by_tag_then_insertion() {
        let mut q = EventQueue::new();
        q.insert(ev(2.0, 0, 1));
        q.insert(ev(1.0, 1, 2));
        q.insert(ev(1.0, 0, 3));
        q.insert(ev(1.0, 1, 4)); // ties with actor 2, must stay behind it

        let order: Vec<u32> = std::iter::from_fn(|| {
            if q.is_empty() {
                None
            } else {
                Some(q.take(0).actor.0)
            }
        })
        .collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn take_matching_preserves_relative_order() {
        let mut q = EventQueue::new();
        q.insert(ev(1.0, 0, 1));
        q.insert(ev(1.0, 0, 2));
        q.insert(ev(1.0, 0, 1));
        q.insert(ev(2.0, 0, 1));

        let tag = Tag::at(SimTime::from_secs(1.0));
        let batch = q.take_matching(|e| e.tag == tag && e.actor == ActorId(1));
        assert_eq!(batch.len(), 2);
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek_earliest().map(|e| e.actor), Some(ActorId(2)));
    }
}
