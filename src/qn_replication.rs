//! Replication execution.
//!
//! A [`ReplicationRunner`] drives one complete simulation run: it owns a
//! fresh [`QueueNetworkState`], a fresh [`EventScheduler`] and one random
//! stream, and borrows the topology and routing table read-only. Nothing is
//! shared between replications, so [`Simulator::run_parallel`] can hand them
//! to independent workers.
//!
//! A replication ends normally when the scheduler drains or when the draw
//! budget is spent (a hard stop, even with deterministic events still
//! queued). The only fatal condition is a replay stream running dry.

use std::collections::BTreeMap;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::qn_aggregate::Aggregate;
use crate::qn_error::SimError;
use crate::qn_interface::{EventKind, Histogram, QueueId, SimTime};
use crate::qn_queues::{QueueNetworkState, Throughput};
use crate::qn_random::{DrawBudget, RandomStream, RandomStreamFactory};
use crate::qn_routing::RoutingTable;
use crate::qn_scheduler::EventScheduler;
use crate::qn_topology::Topology;

/// Run options supplied by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOptions {
    /// Ceiling on random draws per replication
    pub max_random_draws: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            max_random_draws: 100_000,
        }
    }
}

/// Why a replication stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// No events left
    Drained,
    /// Draw budget reached with events still pending
    BudgetExhausted,
}

/// Outcome of one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationResult {
    pub histogram_by_queue: BTreeMap<QueueId, Histogram>,
    pub losses_by_queue: BTreeMap<QueueId, u64>,
    pub throughput_by_queue: BTreeMap<QueueId, Throughput>,
    pub total_elapsed_time: SimTime,
    pub draws_used: u64,
    pub termination: Termination,
}

// ============================================================================
// Single replication
// ============================================================================

pub struct ReplicationRunner<'a> {
    topology: &'a Topology,
    routing: &'a RoutingTable,
    state: QueueNetworkState,
    scheduler: EventScheduler,
    draws: DrawBudget,
    events_processed: u64,
    external_arrivals: u64,
    routed_arrivals: u64,
}

impl<'a> ReplicationRunner<'a> {
    /// Set up a replication: fresh queue state, and one external arrival
    /// scheduled per externally fed queue at its first arrival time (no
    /// draw consumed).
    pub fn new(
        topology: &'a Topology,
        routing: &'a RoutingTable,
        stream: RandomStream,
        max_random_draws: u64,
    ) -> Result<Self, SimError> {
        if max_random_draws == 0 {
            return Err(SimError::ZeroDrawBudget);
        }
        if topology.queues.is_empty() {
            return Err(SimError::NoQueues);
        }

        let state = QueueNetworkState::new(&topology.queues);
        let mut scheduler = EventScheduler::new();
        for (queue, first) in &topology.arrivals {
            scheduler.schedule(*first, EventKind::ArrivalExternal, queue.as_str());
        }

        Ok(Self {
            topology,
            routing,
            state,
            scheduler,
            draws: DrawBudget::new(stream, max_random_draws),
            events_processed: 0,
            external_arrivals: 0,
            routed_arrivals: 0,
        })
    }

    pub fn state(&self) -> &QueueNetworkState {
        &self.state
    }

    pub fn now(&self) -> SimTime {
        self.state.now()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn draws_used(&self) -> u64 {
        self.draws.used()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Entities that entered the network from outside so far
    pub fn external_arrivals(&self) -> u64 {
        self.external_arrivals
    }

    /// Departures that were routed on to another queue so far
    pub fn routed_arrivals(&self) -> u64 {
        self.routed_arrivals
    }

    /// Process the next event. Returns `false` once the replication has
    /// reached a terminal condition.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if !self.draws.has_remaining() {
            return Ok(false);
        }
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(false);
        };

        self.state.advance_time(event.time);
        trace!(
            "{:.4}: {:?} at {} (seq {})",
            event.time,
            event.kind,
            event.queue,
            event.sequence
        );

        match event.kind {
            EventKind::ArrivalExternal => {
                // the next arrival is drawn before the current entity is admitted
                self.schedule_next_arrival(&event.queue)?;
                self.external_arrivals += 1;
                self.state
                    .admit(&event.queue, &mut self.scheduler, &mut self.draws)?;
            }
            EventKind::ServiceCompletion => {
                let next_hop = self.state.complete_service(
                    &event.queue,
                    self.routing,
                    &mut self.scheduler,
                    &mut self.draws,
                )?;
                if let Some(target) = next_hop {
                    self.routed_arrivals += 1;
                    self.state
                        .admit(&target, &mut self.scheduler, &mut self.draws)?;
                }
            }
        }

        self.events_processed += 1;
        Ok(true)
    }

    fn schedule_next_arrival(&mut self, queue: &str) -> Result<(), SimError> {
        let spec = self
            .topology
            .queues
            .get(queue)
            .ok_or_else(|| SimError::UnknownQueue(queue.to_string()))?;
        let Some(range) = spec.arrival else {
            return Ok(());
        };
        if let Some(interval) = self.draws.sample_within_budget(&range)? {
            let at = self.state.now() + interval;
            self.scheduler.schedule(at, EventKind::ArrivalExternal, queue);
        }
        Ok(())
    }

    /// Run to a terminal condition and build the result
    pub fn run(mut self) -> Result<ReplicationResult, SimError> {
        while self.step()? {}
        Ok(self.finish())
    }

    /// Snapshot the final state into a result
    pub fn finish(self) -> ReplicationResult {
        let termination = if self.scheduler.is_empty() {
            Termination::Drained
        } else {
            Termination::BudgetExhausted
        };

        ReplicationResult {
            histogram_by_queue: self.state.histograms(),
            losses_by_queue: self.state.losses(),
            throughput_by_queue: self.state.throughput(),
            total_elapsed_time: self.state.now(),
            draws_used: self.draws.used(),
            termination,
        }
    }
}

// ============================================================================
// All replications
// ============================================================================

/// Runs every replication the topology's randomness source asks for
#[derive(Debug, Clone)]
pub struct Simulator {
    topology: Topology,
    options: SimOptions,
    routing: RoutingTable,
    factory: RandomStreamFactory,
}

impl Simulator {
    /// Misconfiguration (zero budget, no queues, no replications) is
    /// rejected here, before anything runs.
    pub fn new(topology: Topology, options: SimOptions) -> Result<Self, SimError> {
        if options.max_random_draws == 0 {
            return Err(SimError::ZeroDrawBudget);
        }
        if topology.queues.is_empty() {
            return Err(SimError::NoQueues);
        }
        let factory = RandomStreamFactory::new(&topology.randomness);
        if factory.replications() == 0 {
            return Err(SimError::NoReplications);
        }
        let routing = RoutingTable::new(&topology.edges);

        debug!(
            "simulator ready: {} queues, {} replications, budget {} draws",
            topology.queues.len(),
            factory.replications(),
            options.max_random_draws
        );

        Ok(Self {
            topology,
            options,
            routing,
            factory,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn options(&self) -> SimOptions {
        self.options
    }

    pub fn replications(&self) -> usize {
        self.factory.replications()
    }

    /// Seed of replication `index`, when seeded
    pub fn seed(&self, index: usize) -> Option<i64> {
        self.factory.seed(index)
    }

    pub fn run_replication(&self, index: usize) -> Result<ReplicationResult, SimError> {
        let stream = self.factory.stream(index).ok_or(SimError::NoReplications)?;
        match self.factory.seed(index) {
            Some(seed) => info!("replication #{} (seed {})", index + 1, seed),
            None => info!("replication #{} (replayed numbers)", index + 1),
        }

        let runner = ReplicationRunner::new(
            &self.topology,
            &self.routing,
            stream,
            self.options.max_random_draws,
        )?;
        let result = runner.run()?;

        info!(
            "replication #{} finished: {:?} at t={:.4} after {} draws",
            index + 1,
            result.termination,
            result.total_elapsed_time,
            result.draws_used
        );
        Ok(result)
    }

    /// Run all replications in order. The first fatal error aborts the run.
    pub fn run(&self) -> Result<Vec<ReplicationResult>, SimError> {
        (0..self.replications())
            .map(|index| self.run_replication(index))
            .collect()
    }

    /// Same results as [`Simulator::run`], computed on the rayon pool
    pub fn run_parallel(&self) -> Result<Vec<ReplicationResult>, SimError> {
        (0..self.replications())
            .into_par_iter()
            .map(|index| self.run_replication(index))
            .collect()
    }

    pub fn run_aggregate(&self) -> Result<Aggregate, SimError> {
        Ok(Aggregate::combine(&self.run()?))
    }
}
