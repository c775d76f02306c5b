// Command-line arguments

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;
use qnet::SimOptions;

#[derive(Parser, Debug)]
#[command(name = "network_sim")]
#[command(about = "Simulate an open network of G/G/c/K queues")]
pub struct Args {
    /// Topology file, or a directory of .yaml/.yml topology files
    pub path: PathBuf,

    /// Stop a replication once this many random draws are consumed
    #[arg(long = "max-rands", default_value_t = SimOptions::default().max_random_draws)]
    pub max_rands: u64,

    /// Run replications in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Print the aggregate as YAML instead of the report table
    #[arg(long)]
    pub yaml: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["network_sim", "topology.yaml"]).unwrap();
        assert_eq!(args.path, PathBuf::from("topology.yaml"));
        assert_eq!(args.max_rands, 100_000);
        assert!(!args.parallel);
        assert!(!args.yaml);
        assert_eq!(args.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "network_sim",
            "scenarios/",
            "--max-rands",
            "5000",
            "--parallel",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.max_rands, 5000);
        assert!(args.parallel);
        assert_eq!(args.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_path_required() {
        assert!(Args::try_parse_from(["network_sim"]).is_err());
    }
}
