// Cross-replication aggregation

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::qn_interface::{Histogram, Occupancy, QueueId, SimTime};
use crate::qn_queues::Throughput;
use crate::qn_replication::ReplicationResult;

/// Sum of any number of replication results.
///
/// Histograms are summed per queue and per occupancy level, so replications
/// that reached different maximum occupancies combine without padding.
/// [`Aggregate::merge`] is commutative and associative (up to floating-point
/// rounding), which lets partial aggregates be built independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub histogram_by_queue: BTreeMap<QueueId, Histogram>,
    pub losses_by_queue: BTreeMap<QueueId, u64>,
    pub throughput_by_queue: BTreeMap<QueueId, Throughput>,
    pub total_elapsed_time_sum: SimTime,
    pub mean_total_elapsed_time: SimTime,
    pub replication_count: u32,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combine<'a>(results: impl IntoIterator<Item = &'a ReplicationResult>) -> Self {
        let mut aggregate = Self::new();
        for result in results {
            aggregate.absorb(result);
        }
        debug!(
            "aggregated {} replications over {} queues",
            aggregate.replication_count,
            aggregate.histogram_by_queue.len()
        );
        aggregate
    }

    /// Add one replication
    pub fn absorb(&mut self, result: &ReplicationResult) {
        for (queue, histogram) in &result.histogram_by_queue {
            add_histogram(self.histogram_by_queue.entry(queue.clone()).or_default(), histogram);
        }
        for (queue, losses) in &result.losses_by_queue {
            *self.losses_by_queue.entry(queue.clone()).or_default() += losses;
        }
        for (queue, throughput) in &result.throughput_by_queue {
            self.throughput_by_queue
                .entry(queue.clone())
                .or_default()
                .add(throughput);
        }
        self.total_elapsed_time_sum += result.total_elapsed_time;
        self.replication_count += 1;
        self.refresh_mean();
    }

    /// Combine two partial aggregates
    pub fn merge(mut self, other: Aggregate) -> Aggregate {
        for (queue, histogram) in &other.histogram_by_queue {
            add_histogram(self.histogram_by_queue.entry(queue.clone()).or_default(), histogram);
        }
        for (queue, losses) in other.losses_by_queue {
            *self.losses_by_queue.entry(queue).or_default() += losses;
        }
        for (queue, throughput) in other.throughput_by_queue {
            self.throughput_by_queue.entry(queue).or_default().add(&throughput);
        }
        self.total_elapsed_time_sum += other.total_elapsed_time_sum;
        self.replication_count += other.replication_count;
        self.refresh_mean();
        self
    }

    fn refresh_mean(&mut self) {
        self.mean_total_elapsed_time = if self.replication_count > 0 {
            self.total_elapsed_time_sum / self.replication_count as f64
        } else {
            0.0
        };
    }

    /// Total time recorded for `queue` across replications
    pub fn queue_time(&self, queue: &str) -> SimTime {
        self.histogram_by_queue
            .get(queue)
            .map(|h| h.values().sum())
            .unwrap_or(0.0)
    }

    /// Highest occupancy level `queue` reached in any replication
    pub fn max_occupancy(&self, queue: &str) -> Option<Occupancy> {
        self.histogram_by_queue
            .get(queue)
            .and_then(|h| h.keys().next_back().copied())
    }

    /// Fraction of time `queue` spent at `level`, in `[0, 1]`
    pub fn probability(&self, queue: &str, level: Occupancy) -> f64 {
        let total = self.queue_time(queue);
        if total <= 0.0 {
            return 0.0;
        }
        let at_level = self
            .histogram_by_queue
            .get(queue)
            .and_then(|h| h.get(&level))
            .copied()
            .unwrap_or(0.0);
        at_level / total
    }

    /// Time-average number of entities in `queue`
    pub fn mean_occupancy(&self, queue: &str) -> f64 {
        let total = self.queue_time(queue);
        if total <= 0.0 {
            return 0.0;
        }
        self.histogram_by_queue
            .get(queue)
            .map(|h| h.iter().map(|(n, t)| *n as f64 * t).sum::<f64>() / total)
            .unwrap_or(0.0)
    }

    /// Completed services per unit of simulated time
    pub fn throughput_rate(&self, queue: &str) -> f64 {
        if self.total_elapsed_time_sum <= 0.0 {
            return 0.0;
        }
        self.throughput_by_queue
            .get(queue)
            .map(|t| t.completed as f64 / self.total_elapsed_time_sum)
            .unwrap_or(0.0)
    }
}

fn add_histogram(into: &mut Histogram, from: &Histogram) {
    for (level, time) in from {
        *into.entry(*level).or_insert(0.0) += time;
    }
}
