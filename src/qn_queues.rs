//! Per-replication queue state.
//!
//! [`QueueNetworkState`] holds one [`QueueState`] per configured queue and
//! the replication clock. It is created fresh for every replication and
//! dropped once the result has been taken out of it.
//!
//! The time-weighted histogram is maintained by [`QueueNetworkState::advance_time`],
//! which must run for *all* queues before each event is processed: idle
//! queues accrue time at their current occupancy level just like busy ones.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::qn_error::SimError;
use crate::qn_interface::{EventKind, Histogram, Occupancy, QueueId, QueueSpec, SimTime, TimeRange};
use crate::qn_random::DrawBudget;
use crate::qn_routing::RoutingTable;
use crate::qn_scheduler::EventScheduler;

/// Outcome of presenting an entity to a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The queue was at capacity; the entity is counted as a loss and discarded
    Lost,
}

/// Entity counters of one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    /// Entities presented to the queue (external and routed)
    pub offered: u64,
    /// Entities that found room
    pub admitted: u64,
    /// Services completed
    pub completed: u64,
}

impl Throughput {
    pub fn add(&mut self, other: &Throughput) {
        self.offered += other.offered;
        self.admitted += other.admitted;
        self.completed += other.completed;
    }
}

/// Mutable state of a single queue
#[derive(Debug, Clone)]
pub struct QueueState {
    servers: u32,
    capacity: Option<u32>,
    service: TimeRange,

    occupancy: Occupancy,
    busy: u32,
    last_observed: SimTime,

    histogram: Histogram,
    losses: u64,
    throughput: Throughput,
}

impl QueueState {
    pub fn new(spec: &QueueSpec) -> Self {
        Self {
            servers: spec.servers,
            capacity: spec.capacity,
            service: spec.service,
            occupancy: 0,
            busy: 0,
            last_observed: 0.0,
            histogram: Histogram::new(),
            losses: 0,
            throughput: Throughput::default(),
        }
    }

    pub fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    pub fn busy(&self) -> u32 {
        self.busy
    }

    pub fn servers(&self) -> u32 {
        self.servers
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn losses(&self) -> u64 {
        self.losses
    }

    pub fn throughput(&self) -> Throughput {
        self.throughput
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|k| self.occupancy >= k)
    }

    /// A waiting entity and an idle server are both available
    pub fn can_start_service(&self) -> bool {
        self.occupancy > self.busy && self.busy < self.servers
    }

    /// `busy <= min(servers, occupancy)` and `occupancy <= capacity`
    pub fn within_bounds(&self) -> bool {
        self.busy <= self.servers.min(self.occupancy)
            && self.capacity.map_or(true, |k| self.occupancy <= k)
    }

    /// Total time recorded in the histogram
    pub fn observed_time(&self) -> SimTime {
        self.histogram.values().sum()
    }

    fn accrue(&mut self, to: SimTime) {
        // negative deltas can only come from floating-point jitter
        let dt = (to - self.last_observed).max(0.0);
        *self.histogram.entry(self.occupancy).or_insert(0.0) += dt;
        self.last_observed = self.last_observed.max(to);
    }
}

/// All queues of one replication plus its clock
#[derive(Debug, Clone)]
pub struct QueueNetworkState {
    queues: HashMap<QueueId, QueueState>,
    now: SimTime,
}

impl QueueNetworkState {
    pub fn new<'a>(specs: impl IntoIterator<Item = (&'a QueueId, &'a QueueSpec)>) -> Self {
        let queues = specs
            .into_iter()
            .map(|(id, spec)| (id.clone(), QueueState::new(spec)))
            .collect();
        Self { queues, now: 0.0 }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn get(&self, queue: &str) -> Option<&QueueState> {
        self.queues.get(queue)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueueId, &QueueState)> {
        self.queues.iter()
    }

    fn queue_mut(&mut self, queue: &str) -> Result<&mut QueueState, SimError> {
        self.queues
            .get_mut(queue)
            .ok_or_else(|| SimError::UnknownQueue(queue.to_string()))
    }

    /// Move the clock to `to`, crediting the elapsed time to the current
    /// occupancy level of every queue.
    pub fn advance_time(&mut self, to: SimTime) {
        for state in self.queues.values_mut() {
            state.accrue(to);
        }
        self.now = self.now.max(to);
    }

    /// Present one entity to `queue`.
    ///
    /// A full queue records a loss. Otherwise the entity joins and, if a
    /// server is idle and the budget allows, starts service right away.
    pub fn admit(
        &mut self,
        queue: &str,
        scheduler: &mut EventScheduler,
        draws: &mut DrawBudget,
    ) -> Result<Admission, SimError> {
        let now = self.now;
        let state = self.queue_mut(queue)?;
        state.throughput.offered += 1;

        if state.is_full() {
            state.losses += 1;
            trace!("{:.4}: loss at {} (occupancy {})", now, queue, state.occupancy);
            return Ok(Admission::Lost);
        }

        state.occupancy += 1;
        state.throughput.admitted += 1;
        self.start_service_if_possible(queue, scheduler, draws)?;
        Ok(Admission::Admitted)
    }

    /// Start one service at `queue` if an entity is waiting, a server is
    /// idle and the budget allows the service-time draw. Returns whether a
    /// service started.
    pub fn start_service_if_possible(
        &mut self,
        queue: &str,
        scheduler: &mut EventScheduler,
        draws: &mut DrawBudget,
    ) -> Result<bool, SimError> {
        let now = self.now;
        let state = self.queue_mut(queue)?;
        if !state.can_start_service() {
            return Ok(false);
        }
        let Some(duration) = draws.sample_within_budget(&state.service)? else {
            return Ok(false);
        };

        state.busy += 1;
        scheduler.schedule(now + duration, EventKind::ServiceCompletion, queue);
        Ok(true)
    }

    /// Finish one service at `queue`, pull in a waiting entity and pick the
    /// departing entity's next hop (`None` = it leaves the network).
    pub fn complete_service(
        &mut self,
        queue: &str,
        routing: &RoutingTable,
        scheduler: &mut EventScheduler,
        draws: &mut DrawBudget,
    ) -> Result<Option<QueueId>, SimError> {
        let state = self.queue_mut(queue)?;
        state.busy = state.busy.saturating_sub(1);
        state.occupancy = state.occupancy.saturating_sub(1);
        state.throughput.completed += 1;

        self.start_service_if_possible(queue, scheduler, draws)?;
        routing.route(queue, draws)
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    pub fn histograms(&self) -> BTreeMap<QueueId, Histogram> {
        self.queues
            .iter()
            .map(|(id, state)| (id.clone(), state.histogram.clone()))
            .collect()
    }

    pub fn losses(&self) -> BTreeMap<QueueId, u64> {
        self.queues
            .iter()
            .map(|(id, state)| (id.clone(), state.losses))
            .collect()
    }

    pub fn throughput(&self) -> BTreeMap<QueueId, Throughput> {
        self.queues
            .iter()
            .map(|(id, state)| (id.clone(), state.throughput))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qn_interface::RoutingEdge;
    use crate::qn_random::RandomStream;

    fn network(specs: &[(&str, QueueSpec)]) -> QueueNetworkState {
        let owned: Vec<(QueueId, QueueSpec)> = specs
            .iter()
            .map(|(id, spec)| (id.to_string(), spec.clone()))
            .collect();
        QueueNetworkState::new(owned.iter().map(|(id, spec)| (id, spec)))
    }

    fn draws(numbers: Vec<f64>) -> DrawBudget {
        let limit = numbers.len() as u64;
        DrawBudget::new(RandomStream::replay(numbers), limit)
    }

    #[test]
    fn test_advance_time_accrues_for_every_queue() {
        let mut state = network(&[
            ("A", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
            ("B", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
        ]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.5]);

        state.advance_time(2.0);
        state.admit("A", &mut scheduler, &mut budget).unwrap();
        state.advance_time(5.0);

        let a = state.get("A").unwrap();
        assert_eq!(a.histogram().get(&0), Some(&2.0));
        assert_eq!(a.histogram().get(&1), Some(&3.0));

        // B never saw an entity but still accrued the full 5.0 at level 0
        let b = state.get("B").unwrap();
        assert_eq!(b.histogram().get(&0), Some(&5.0));
        assert_eq!(b.observed_time(), 5.0);
        assert_eq!(state.now(), 5.0);
    }

    #[test]
    fn test_negative_delta_clamped() {
        let mut state = network(&[("A", QueueSpec::new(1, None, TimeRange::fixed(1.0)))]);
        state.advance_time(3.0);
        state.advance_time(2.999999);
        assert_eq!(state.now(), 3.0);
        assert_eq!(state.get("A").unwrap().observed_time(), 3.0);
    }

    #[test]
    fn test_admit_starts_service_and_schedules_completion() {
        let mut state = network(&[("A", QueueSpec::new(1, None, TimeRange::new(2.0, 4.0)))]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.5, 0.5]);

        state.advance_time(1.0);
        assert_eq!(
            state.admit("A", &mut scheduler, &mut budget),
            Ok(Admission::Admitted)
        );
        let a = state.get("A").unwrap();
        assert_eq!((a.occupancy(), a.busy()), (1, 1));
        assert_eq!(budget.used(), 1);

        let completion = scheduler.pop_next().unwrap();
        assert_eq!(completion.kind, EventKind::ServiceCompletion);
        assert_eq!(completion.time, 4.0);

        // second entity waits: the only server is busy, no draw taken
        state.admit("A", &mut scheduler, &mut budget).unwrap();
        let a = state.get("A").unwrap();
        assert_eq!((a.occupancy(), a.busy()), (2, 1));
        assert_eq!(budget.used(), 1);
        assert!(a.within_bounds());
    }

    #[test]
    fn test_full_queue_records_loss() {
        let mut state = network(&[("A", QueueSpec::new(1, Some(1), TimeRange::fixed(1.0)))]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.1, 0.2]);

        assert_eq!(state.admit("A", &mut scheduler, &mut budget), Ok(Admission::Admitted));
        assert_eq!(state.admit("A", &mut scheduler, &mut budget), Ok(Admission::Lost));

        let a = state.get("A").unwrap();
        assert_eq!(a.losses(), 1);
        assert_eq!(a.occupancy(), 1);
        assert_eq!(
            a.throughput(),
            Throughput {
                offered: 2,
                admitted: 1,
                completed: 0
            }
        );
    }

    #[test]
    fn test_zero_capacity_loses_everything() {
        let mut state = network(&[("A", QueueSpec::new(1, Some(0), TimeRange::fixed(1.0)))]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.1]);

        for _ in 0..3 {
            assert_eq!(state.admit("A", &mut scheduler, &mut budget), Ok(Admission::Lost));
        }
        assert_eq!(state.get("A").unwrap().losses(), 3);
        assert!(scheduler.is_empty());
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_no_service_start_without_budget() {
        let mut state = network(&[("A", QueueSpec::new(1, None, TimeRange::fixed(1.0)))]);
        let mut scheduler = EventScheduler::new();
        let mut budget = DrawBudget::new(RandomStream::seeded(1), 0);

        assert_eq!(state.admit("A", &mut scheduler, &mut budget), Ok(Admission::Admitted));
        let a = state.get("A").unwrap();
        assert_eq!((a.occupancy(), a.busy()), (1, 0));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_complete_service_pulls_waiting_and_routes() {
        let mut state = network(&[
            ("A", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
            ("B", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
        ]);
        let routing = RoutingTable::new(&[RoutingEdge::new("A", "B", 1.0)]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.1, 0.2, 0.3]);

        state.admit("A", &mut scheduler, &mut budget).unwrap();
        state.admit("A", &mut scheduler, &mut budget).unwrap();
        let first = scheduler.pop_next().unwrap();
        state.advance_time(first.time);

        let next = state
            .complete_service("A", &routing, &mut scheduler, &mut budget)
            .unwrap();
        assert_eq!(next, Some("B".to_string()));

        let a = state.get("A").unwrap();
        assert_eq!((a.occupancy(), a.busy()), (1, 1));
        assert_eq!(a.throughput().completed, 1);
        // one draw for each service start, one for routing
        assert_eq!(budget.used(), 3);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_unknown_queue_is_an_error() {
        let mut state = network(&[("A", QueueSpec::new(1, None, TimeRange::fixed(1.0)))]);
        let mut scheduler = EventScheduler::new();
        let mut budget = draws(vec![0.1]);
        assert_eq!(
            state.admit("Z", &mut scheduler, &mut budget),
            Err(SimError::UnknownQueue("Z".to_string()))
        );
    }

    #[test]
    fn test_snapshots_sorted_by_queue() {
        let state = network(&[
            ("B", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
            ("A", QueueSpec::new(1, None, TimeRange::fixed(1.0))),
        ]);
        let names: Vec<QueueId> = state.losses().into_keys().collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
