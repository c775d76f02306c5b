//! # qnet - Queueing Network Simulator
//!
//! A discrete-event simulator for open networks of multi-server queues
//! (G/G/c/K) connected by probabilistic routing. It estimates steady-state
//! occupancy distributions, loss counts and throughput, either from a
//! replayed list of random numbers or from seeded pseudo-random streams.
//!
//! ## Core Components
//!
//! - **EventScheduler**: pending events in strict (time, kind, sequence) order
//! - **QueueNetworkState**: per-queue occupancy, busy servers, time-weighted histogram, losses
//! - **RandomStream**: replay or seeded uniform draws, plus the per-replication draw budget
//! - **RoutingTable**: next-hop selection for departing entities
//! - **ReplicationRunner / Simulator**: one run / all runs of a topology
//! - **Aggregate**: element-wise sum of replication results
//!
//! ## Usage
//!
//! ```no_run
//! use qnet::{SimOptions, Simulator, Topology};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = Topology::load("scenarios/tandem.yaml")?;
//! let simulator = Simulator::new(topology, SimOptions { max_random_draws: 100_000 })?;
//! let aggregate = simulator.run_aggregate()?;
//!
//! for (queue, losses) in &aggregate.losses_by_queue {
//!     println!("{}: {} losses", queue, losses);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The library only emits `log` records; installing a logger is left to the
//! binary (`simulator/network_sim.rs`).

// Simulation core
pub mod qn_interface;
pub mod qn_queues;
pub mod qn_random;
pub mod qn_replication;
pub mod qn_routing;
pub mod qn_scheduler;

// Results
pub mod qn_aggregate;

// Configuration and errors
pub mod qn_error;
pub mod qn_topology;

// Re-export commonly used types
pub use qn_aggregate::Aggregate;
pub use qn_error::{SimError, TopologyError};
pub use qn_interface::{
    Event, EventKind, Histogram, Occupancy, QueueId, QueueSpec, RoutingEdge, SimTime, TimeRange,
};
pub use qn_queues::{Admission, QueueNetworkState, QueueState, Throughput};
pub use qn_random::{DrawBudget, RandomSource, RandomStream, RandomStreamFactory};
pub use qn_replication::{ReplicationResult, ReplicationRunner, SimOptions, Simulator, Termination};
pub use qn_routing::RoutingTable;
pub use qn_scheduler::{event_order, EventScheduler};
pub use qn_topology::Topology;
