//! Event scheduler with a fully deterministic total order.
//!
//! Events are ordered by:
//! 1. Time (earlier first)
//! 2. Kind priority (service completions before external arrivals)
//! 3. Sequence number (insertion order)
//!
//! Sequence numbers come from a counter owned by the scheduler, so every
//! replication that builds its own scheduler starts again from zero.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::qn_interface::{Event, EventKind, QueueId, SimTime};

/// Total order over events.
///
/// Kept as a free function so the tie-break contract can be checked on its
/// own, independently of the container that uses it.
pub fn event_order(a: &Event, b: &Event) -> Ordering {
    EventKey::of(a).cmp(&EventKey::of(b))
}

/// Ordering key of a scheduled event
#[derive(Debug, Clone, Copy)]
struct EventKey {
    time: SimTime,
    priority: u8,
    sequence: u64,
}

impl EventKey {
    fn of(event: &Event) -> Self {
        Self {
            time: event.time,
            priority: event.kind.priority(),
            sequence: event.sequence,
        }
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by kind (ServiceCompletion < ArrivalExternal)
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Finally by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

/// Pending events of one replication
#[derive(Debug, Default)]
pub struct EventScheduler {
    queue: BTreeMap<EventKey, Event>,
    next_sequence: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event and return the sequence number it was given
    pub fn schedule(&mut self, time: SimTime, kind: EventKind, queue: impl Into<QueueId>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let event = Event {
            time,
            kind,
            queue: queue.into(),
            sequence,
        };
        self.queue.insert(EventKey::of(&event), event);
        sequence
    }

    /// Remove and return the earliest event.
    ///
    /// `None` means the network has drained, which is a normal way for a
    /// replication to end.
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop_first().map(|(_, event)| event)
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.first_key_value().map(|(key, _)| key.time)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of events scheduled so far, popped or not
    pub fn scheduled(&self) -> u64 {
        self.next_sequence
    }
}
