//! Network topology: YAML file model, validation and the validated [`Topology`].
//!
//! ```yaml
//! arrivals:
//!   Q1: 2.0
//! queues:
//!   Q1:
//!     servers: 1
//!     capacity: 3
//!     minArrival: 1.0
//!     maxArrival: 4.0
//!     minService: 3.0
//!     maxService: 4.0
//! network:
//!   - { source: Q1, target: Q2, probability: 0.8 }
//! rndnumbers: [0.2176, 0.0103, 0.1109]
//! seeds: [1, 2, 3]
//! rndnumbersPerSeed: 100000
//! ```
//!
//! Keys are accepted in camelCase or all lowercase.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::qn_error::TopologyError;
use crate::qn_interface::{QueueId, QueueSpec, RoutingEdge, SimTime, TimeRange};
use crate::qn_random::RandomSource;

/// Allowed deviation of a source's outgoing probabilities from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

// ============================================================================
// File model
// ============================================================================

/// Topology file exactly as written, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyFile {
    #[serde(default)]
    pub arrivals: IndexMap<QueueId, SimTime>,

    #[serde(default)]
    pub queues: IndexMap<QueueId, QueueFile>,

    #[serde(default)]
    pub network: Vec<RoutingEdge>,

    #[serde(default, alias = "rndnumbers")]
    pub rnd_numbers: Vec<f64>,

    #[serde(default, alias = "rndnumbersperseed", alias = "rndnumbersPerSeed")]
    pub rnd_numbers_per_seed: i64,

    #[serde(default)]
    pub seeds: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueFile {
    pub servers: i64,

    #[serde(default)]
    pub capacity: Option<i64>,

    #[serde(default, alias = "minarrival")]
    pub min_arrival: Option<f64>,

    #[serde(default, alias = "maxarrival")]
    pub max_arrival: Option<f64>,

    #[serde(alias = "minservice")]
    pub min_service: f64,

    #[serde(alias = "maxservice")]
    pub max_service: f64,
}

// ============================================================================
// Validated topology
// ============================================================================

/// A well-formed network, ready to simulate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Queues in declaration order
    pub queues: IndexMap<QueueId, QueueSpec>,
    /// First external arrival time per externally fed queue
    pub arrivals: IndexMap<QueueId, SimTime>,
    pub edges: Vec<RoutingEdge>,
    pub randomness: RandomSource,
}

impl Topology {
    /// Empty topology; populate with the `with_*` builders
    pub fn new(randomness: RandomSource) -> Self {
        Self {
            queues: IndexMap::new(),
            arrivals: IndexMap::new(),
            edges: Vec::new(),
            randomness,
        }
    }

    pub fn with_queue(mut self, id: impl Into<QueueId>, spec: QueueSpec) -> Self {
        self.queues.insert(id.into(), spec);
        self
    }

    pub fn with_arrival(mut self, id: impl Into<QueueId>, first: SimTime) -> Self {
        self.arrivals.insert(id.into(), first);
        self
    }

    pub fn with_edge(mut self, edge: RoutingEdge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        debug!("loading topology from {}", path.display());
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, TopologyError> {
        let file: TopologyFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    /// Validate a parsed file
    pub fn from_file(file: TopologyFile) -> Result<Self, TopologyError> {
        if file.queues.is_empty() {
            return Err(TopologyError::NoQueues);
        }

        for (queue, first) in &file.arrivals {
            if *first < 0.0 {
                return Err(TopologyError::NegativeArrivalTime(queue.clone()));
            }
            let spec = file
                .queues
                .get(queue)
                .ok_or_else(|| TopologyError::UnknownArrivalQueue(queue.clone()))?;
            let (Some(min), Some(max)) = (spec.min_arrival, spec.max_arrival) else {
                return Err(TopologyError::MissingArrivalRange(queue.clone()));
            };
            if min < 0.0 || min > max {
                return Err(TopologyError::InvalidArrivalRange(queue.clone()));
            }
        }

        let mut queues = IndexMap::with_capacity(file.queues.len());
        for (name, q) in &file.queues {
            queues.insert(name.clone(), queue_spec(name, q)?);
        }

        let mut outgoing_sum: IndexMap<&str, f64> = IndexMap::new();
        for edge in &file.network {
            if !queues.contains_key(&edge.source) {
                return Err(TopologyError::UnknownEdgeSource(edge.source.clone()));
            }
            if !queues.contains_key(&edge.target) {
                return Err(TopologyError::UnknownEdgeTarget(edge.target.clone()));
            }
            if !(0.0..=1.0).contains(&edge.probability) {
                return Err(TopologyError::ProbabilityOutOfRange {
                    origin: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            *outgoing_sum.entry(edge.source.as_str()).or_insert(0.0) += edge.probability;
        }
        for (source, sum) in outgoing_sum {
            if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(TopologyError::ProbabilitySum {
                    origin: source.to_string(),
                    sum,
                });
            }
        }

        if !file.seeds.is_empty() && file.rnd_numbers_per_seed <= 0 {
            return Err(TopologyError::MissingDrawsPerSeed);
        }

        let randomness = RandomSource::select(
            file.rnd_numbers,
            file.seeds,
            file.rnd_numbers_per_seed.max(0) as u64,
        );

        Ok(Self {
            queues,
            arrivals: file.arrivals,
            edges: file.network,
            randomness,
        })
    }

    /// Whether `queue` receives arrivals from outside the network
    pub fn is_external(&self, queue: &str) -> bool {
        self.arrivals.contains_key(queue)
    }
}

fn queue_spec(name: &str, q: &QueueFile) -> Result<QueueSpec, TopologyError> {
    let servers = u32::try_from(q.servers)
        .ok()
        .filter(|s| *s >= 1)
        .ok_or_else(|| TopologyError::NoServers(name.to_string()))?;

    if q.min_service <= 0.0 || q.min_service > q.max_service {
        return Err(TopologyError::InvalidServiceRange(name.to_string()));
    }

    let capacity = match q.capacity {
        Some(k) => Some(
            u32::try_from(k).map_err(|_| TopologyError::InvalidCapacity(name.to_string()))?,
        ),
        None => None,
    };

    let mut spec = QueueSpec::new(
        servers,
        capacity,
        TimeRange::new(q.min_service, q.max_service),
    );
    if let (Some(min), Some(max)) = (q.min_arrival, q.max_arrival) {
        spec = spec.with_arrival(TimeRange::new(min, max));
    }
    Ok(spec)
}
