// Shared vocabulary of the queue network simulator

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// queues are named in the topology file and referred to by name everywhere
pub type QueueId = String;

// simulated clock, unit-free
pub type SimTime = f64;

// number of entities present in a queue (waiting + in service)
pub type Occupancy = u32;

/// Occupancy level -> cumulative simulated time spent at that level.
///
/// Keyed by level rather than indexed by a fixed-size array: replications
/// may reach different maximum occupancies and still need to be summed.
pub type Histogram = BTreeMap<Occupancy, SimTime>;

// ============================================================================
// Events
// ============================================================================

/// What happens when an event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An entity enters the network from outside at a queue
    ArrivalExternal,
    /// A server at a queue finishes serving one entity
    ServiceCompletion,
}

impl EventKind {
    /// Rank used when two events fire at exactly the same instant.
    ///
    /// Lower ranks are processed first: a queue must free a server before a
    /// simultaneous arrival is evaluated for service-start eligibility.
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::ServiceCompletion => 0,
            EventKind::ArrivalExternal => 1,
        }
    }
}

/// A scheduled event. Immutable once handed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: SimTime,
    pub kind: EventKind,
    pub queue: QueueId,
    /// Insertion counter of the owning scheduler, only used as the last tie-break
    pub sequence: u64,
}

// ============================================================================
// Topology building blocks
// ============================================================================

/// Closed interval `[min, max]` of durations sampled uniformly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub min: SimTime,
    pub max: SimTime,
}

impl TimeRange {
    pub fn new(min: SimTime, max: SimTime) -> Self {
        Self { min, max }
    }

    /// A range that always yields `value`
    pub fn fixed(value: SimTime) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Map a uniform draw `u` in `[0, 1)` onto the range.
    ///
    /// A degenerate range (`min == max`) returns `min` for every `u`.
    pub fn scale(&self, u: f64) -> SimTime {
        self.min + u * (self.max - self.min)
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Static description of one queue (a G/G/c/K station)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSpec {
    /// Parallel servers (c), at least one
    pub servers: u32,
    /// System capacity (K), waiting + in service; `None` is unbounded
    pub capacity: Option<u32>,
    /// Service duration range
    pub service: TimeRange,
    /// Inter-arrival range for external arrivals, if the queue is fed from outside
    pub arrival: Option<TimeRange>,
}

impl QueueSpec {
    pub fn new(servers: u32, capacity: Option<u32>, service: TimeRange) -> Self {
        Self {
            servers,
            capacity,
            service,
            arrival: None,
        }
    }

    pub fn with_arrival(mut self, arrival: TimeRange) -> Self {
        self.arrival = Some(arrival);
        self
    }

    /// Kendall notation, e.g. `G/G/2` or `G/G/1/5`
    pub fn kendall(&self) -> String {
        match self.capacity {
            Some(k) => format!("G/G/{}/{}", self.servers, k),
            None => format!("G/G/{}", self.servers),
        }
    }
}

/// Directed, weighted connection between two queues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEdge {
    pub source: QueueId,
    pub target: QueueId,
    pub probability: f64,
}

impl RoutingEdge {
    pub fn new(source: impl Into<QueueId>, target: impl Into<QueueId>, probability: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            probability,
        }
    }
}
