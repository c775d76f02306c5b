// Human-readable simulation report

use std::fmt;

use qnet::{Aggregate, Topology};

const RULE: &str = "═════════════════════════════════════════════════════════";
const QUEUE_RULE: &str = "*********************************************************";

/// Per-queue report for an aggregate.
///
/// Queues are listed by name. Every occupancy level from 0 up to the highest
/// one observed gets a row, including levels with zero time.
pub struct Report<'a> {
    topology: &'a Topology,
    aggregate: &'a Aggregate,
}

impl<'a> Report<'a> {
    pub fn new(topology: &'a Topology, aggregate: &'a Aggregate) -> Self {
        Self {
            topology,
            aggregate,
        }
    }

    fn write_queue(&self, f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
        let spec = &self.topology.queues[name];
        let aggregate = self.aggregate;

        writeln!(f, "{}", QUEUE_RULE)?;
        writeln!(f, "Queue:   {} ({})", name, spec.kendall())?;
        if let Some(arrival) = spec.arrival.filter(|_| self.topology.is_external(name)) {
            writeln!(f, "Arrival: {:.1} ... {:.1}", arrival.min, arrival.max)?;
        }
        writeln!(f, "Service: {:.1} ... {:.1}", spec.service.min, spec.service.max)?;
        writeln!(f, "{}", QUEUE_RULE)?;
        writeln!(f, "   State               Time               Probability")?;

        let histogram = aggregate.histogram_by_queue.get(name);
        let max_level = aggregate.max_occupancy(name).unwrap_or(0);
        for level in 0..=max_level {
            let time = histogram
                .and_then(|h| h.get(&level))
                .copied()
                .unwrap_or(0.0);
            writeln!(
                f,
                "{:>6} {:>18.4} {:>21.2}%",
                level,
                time,
                100.0 * aggregate.probability(name, level)
            )?;
        }

        let losses = aggregate.losses_by_queue.get(name).copied().unwrap_or(0);
        writeln!(f, "\nNumber of losses: {}", losses)?;
        writeln!(f, "Mean occupancy:   {:.4}", aggregate.mean_occupancy(name))?;
        writeln!(
            f,
            "Throughput:       {:.4} per time unit\n",
            aggregate.throughput_rate(name)
        )
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n╔{}╗", RULE)?;
        writeln!(f, "║  Queue Network Simulation Report                        ║")?;
        writeln!(f, "╚{}╝\n", RULE)?;

        let mut names: Vec<&String> = self.topology.queues.keys().collect();
        names.sort();
        for name in names {
            self.write_queue(f, name)?;
        }

        writeln!(f, "{}", RULE)?;
        writeln!(f, "Replications: {}", self.aggregate.replication_count)?;
        writeln!(
            f,
            "Simulation average time: {:.4}",
            self.aggregate.mean_total_elapsed_time
        )?;
        writeln!(f, "{}", RULE)
    }
}

pub fn print_report(topology: &Topology, aggregate: &Aggregate) {
    print!("{}", Report::new(topology, aggregate));
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet::{QueueSpec, RandomSource, SimOptions, Simulator, TimeRange};

    #[test]
    fn test_report_lists_every_level_and_queue() {
        let topology = Topology::new(RandomSource::Seeded {
            seeds: vec![3],
            draws_per_seed: 300,
        })
        .with_queue(
            "B",
            QueueSpec::new(1, Some(2), TimeRange::new(1.0, 3.0))
                .with_arrival(TimeRange::new(0.5, 1.0)),
        )
        .with_queue("A", QueueSpec::new(2, None, TimeRange::new(1.0, 2.0)))
        .with_arrival("B", 0.0);

        let simulator = Simulator::new(topology, SimOptions { max_random_draws: 300 }).unwrap();
        let aggregate = simulator.run_aggregate().unwrap();
        let report = Report::new(simulator.topology(), &aggregate).to_string();

        assert!(report.contains("Queue:   A (G/G/2)"));
        assert!(report.contains("Queue:   B (G/G/1/2)"));
        assert!(report.contains("Arrival: 0.5 ... 1.0"));
        assert!(report.find("Queue:   A").unwrap() < report.find("Queue:   B").unwrap());
        assert!(report.contains("Replications: 1"));

        // B is overloaded with capacity 2, so levels 0..=2 all appear
        let b_section = &report[report.find("Queue:   B").unwrap()..];
        for level in 0..=2 {
            assert!(b_section.contains(&format!("\n{:>6} ", level)));
        }
    }
}
