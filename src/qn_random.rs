//! Random number streams.
//!
//! Every random decision of a replication (inter-arrival times, service
//! times, routing) consumes exactly one uniform draw from a [`RandomStream`].
//! Two variants exist:
//!
//! - **Replay**: a fixed, pre-supplied list of numbers, used to reproduce a
//!   known reference trace. Running past the end of the list is fatal.
//! - **Seeded**: a seeded `StdRng`, conceptually unbounded and reproducible
//!   for a given seed.
//!
//! The per-replication ceiling on draws is not a property of the stream; it
//! is applied by [`DrawBudget`], which the replication runner owns.

use std::sync::Arc;

use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::qn_error::SimError;
use crate::qn_interface::{SimTime, TimeRange};

// ============================================================================
// Streams
// ============================================================================

/// Stream backed by a fixed list of numbers
#[derive(Debug, Clone)]
pub struct ReplayStream {
    numbers: Arc<[f64]>,
    position: usize,
}

impl ReplayStream {
    pub fn new(numbers: impl Into<Arc<[f64]>>) -> Self {
        Self {
            numbers: numbers.into(),
            position: 0,
        }
    }

    pub fn next(&mut self) -> Result<f64, SimError> {
        let value = *self
            .numbers
            .get(self.position)
            .ok_or(SimError::ExhaustedStream {
                supplied: self.numbers.len(),
            })?;
        self.position += 1;
        Ok(value)
    }

    pub fn used(&self) -> u64 {
        self.position as u64
    }

    pub fn remaining(&self) -> usize {
        self.numbers.len() - self.position
    }
}

/// Stream backed by a seeded pseudo-random generator
#[derive(Debug, Clone)]
pub struct SeededStream {
    rng: StdRng,
    seed: i64,
    used: u64,
}

impl SeededStream {
    /// Negative seeds are accepted; their bit pattern seeds the generator.
    pub fn new(seed: i64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed as u64),
            seed,
            used: 0,
        }
    }

    pub fn next(&mut self) -> f64 {
        self.used += 1;
        // gen::<f64>() samples the half-open interval [0, 1)
        self.rng.gen::<f64>()
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }
}

/// The two stream variants. Callers only rely on `next()` and `used()`.
#[derive(Debug, Clone)]
pub enum RandomStream {
    Replay(ReplayStream),
    Seeded(SeededStream),
}

impl RandomStream {
    pub fn replay(numbers: impl Into<Arc<[f64]>>) -> Self {
        RandomStream::Replay(ReplayStream::new(numbers))
    }

    pub fn seeded(seed: i64) -> Self {
        RandomStream::Seeded(SeededStream::new(seed))
    }

    /// Next uniform draw in `[0, 1)`
    pub fn next(&mut self) -> Result<f64, SimError> {
        match self {
            RandomStream::Replay(stream) => stream.next(),
            RandomStream::Seeded(stream) => Ok(stream.next()),
        }
    }

    /// Number of draws consumed so far
    pub fn used(&self) -> u64 {
        match self {
            RandomStream::Replay(stream) => stream.used(),
            RandomStream::Seeded(stream) => stream.used(),
        }
    }
}

// ============================================================================
// Draw budget
// ============================================================================

/// A stream together with the maximum number of draws a replication may take.
///
/// Reaching the limit is not an error: every `*_within_budget` call simply
/// answers `None` from then on, and the replication winds down.
#[derive(Debug)]
pub struct DrawBudget {
    stream: RandomStream,
    limit: u64,
}

impl DrawBudget {
    pub fn new(stream: RandomStream, limit: u64) -> Self {
        Self { stream, limit }
    }

    pub fn has_remaining(&self) -> bool {
        self.stream.used() < self.limit
    }

    pub fn used(&self) -> u64 {
        self.stream.used()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// One uniform draw, or `None` once the limit is reached
    pub fn next_within_budget(&mut self) -> Result<Option<f64>, SimError> {
        if !self.has_remaining() {
            return Ok(None);
        }
        match self.stream.next() {
            Ok(u) => Ok(Some(u)),
            Err(e) => {
                warn!("{} (budget {}, used {})", e, self.limit, self.stream.used());
                Err(e)
            }
        }
    }

    /// A duration sampled uniformly from `range`, or `None` once the limit is reached.
    ///
    /// Degenerate ranges still consume their draw.
    pub fn sample_within_budget(&mut self, range: &TimeRange) -> Result<Option<SimTime>, SimError> {
        Ok(self.next_within_budget()?.map(|u| range.scale(u)))
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Where the randomness of a run comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RandomSource {
    /// One replication replaying the given numbers in order
    Replay(Vec<f64>),
    /// One replication per seed
    Seeded { seeds: Vec<i64>, draws_per_seed: u64 },
}

impl RandomSource {
    /// Seeds win when any are given; otherwise the number list is replayed once.
    pub fn select(numbers: Vec<f64>, seeds: Vec<i64>, draws_per_seed: u64) -> Self {
        if seeds.is_empty() {
            RandomSource::Replay(numbers)
        } else {
            RandomSource::Seeded {
                seeds,
                draws_per_seed,
            }
        }
    }
}

/// Builds one fresh stream per replication
#[derive(Debug, Clone)]
pub enum RandomStreamFactory {
    Replay { numbers: Arc<[f64]> },
    Seeded { seeds: Vec<i64> },
}

impl RandomStreamFactory {
    pub fn new(source: &RandomSource) -> Self {
        match source {
            RandomSource::Replay(numbers) => RandomStreamFactory::Replay {
                numbers: numbers.as_slice().into(),
            },
            RandomSource::Seeded { seeds, .. } => RandomStreamFactory::Seeded {
                seeds: seeds.clone(),
            },
        }
    }

    pub fn replications(&self) -> usize {
        match self {
            RandomStreamFactory::Replay { .. } => 1,
            RandomStreamFactory::Seeded { seeds } => seeds.len(),
        }
    }

    /// Seed of replication `index`, when running seeded
    pub fn seed(&self, index: usize) -> Option<i64> {
        match self {
            RandomStreamFactory::Replay { .. } => None,
            RandomStreamFactory::Seeded { seeds } => seeds.get(index).copied(),
        }
    }

    /// Fresh stream for replication `index`; `None` past the last replication
    pub fn stream(&self, index: usize) -> Option<RandomStream> {
        match self {
            RandomStreamFactory::Replay { numbers } => {
                (index == 0).then(|| RandomStream::Replay(ReplayStream::new(numbers.clone())))
            }
            RandomStreamFactory::Seeded { seeds } => {
                seeds.get(index).map(|seed| RandomStream::seeded(*seed))
            }
        }
    }
}
