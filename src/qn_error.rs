// Error types

use thiserror::Error;

use crate::qn_interface::QueueId;

/// Failures of the simulation core.
///
/// Budget exhaustion and scheduler drainage are normal terminations and
/// never show up here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A replay stream was asked for more numbers than it was given.
    /// Fatal for the whole run.
    #[error("replay stream exhausted after {supplied} numbers")]
    ExhaustedStream { supplied: usize },

    #[error("draw budget must be greater than zero")]
    ZeroDrawBudget,

    #[error("no queues configured")]
    NoQueues,

    #[error("randomness source yields no replications")]
    NoReplications,

    #[error("unknown queue {0:?}")]
    UnknownQueue(QueueId),
}

/// Failures while loading or validating a topology file
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to read topology: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse topology: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no queues defined")]
    NoQueues,

    #[error("arrivals[{0}] must be >= 0")]
    NegativeArrivalTime(QueueId),

    #[error("arrivals refers to unknown queue {0:?}")]
    UnknownArrivalQueue(QueueId),

    #[error("queue {0:?} is an external source but missing minArrival/maxArrival")]
    MissingArrivalRange(QueueId),

    #[error("queue {0:?}: invalid arrival range")]
    InvalidArrivalRange(QueueId),

    #[error("queue {0:?}: servers must be >= 1")]
    NoServers(QueueId),

    #[error("queue {0:?}: invalid service range")]
    InvalidServiceRange(QueueId),

    #[error("queue {0:?}: capacity must be >= 0")]
    InvalidCapacity(QueueId),

    #[error("edge: unknown source queue {0:?}")]
    UnknownEdgeSource(QueueId),

    #[error("edge: unknown target queue {0:?}")]
    UnknownEdgeTarget(QueueId),

    #[error("edge {origin}->{target}: probability out of [0,1]")]
    ProbabilityOutOfRange { origin: QueueId, target: QueueId },

    #[error("outgoing probabilities from {origin:?} must sum to 1.0 (got {sum:.12})")]
    ProbabilitySum { origin: QueueId, sum: f64 },

    #[error("seeds provided but rndnumbersPerSeed <= 0")]
    MissingDrawsPerSeed,
}
