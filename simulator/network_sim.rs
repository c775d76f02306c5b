// Queue Network Simulator - load topology YAML files and run them
//
// Usage:
//   cargo run --bin network_sim scenarios/tandem.yaml
//   cargo run --bin network_sim scenarios/  (runs all .yaml files in directory)
//   cargo run --bin network_sim scenarios/tandem.yaml --max-rands 100000 --parallel

mod network;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use simple_logger::SimpleLogger;

use network::{print_report, Args};
use qnet::{Aggregate, SimOptions, Simulator, Topology};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = SimpleLogger::new().with_level(args.log_level()).env().init() {
        eprintln!("Failed to install logger: {}", e);
    }

    let outcome = if args.path.is_file() {
        run_topology_file(&args.path, &args)
    } else if args.path.is_dir() {
        run_topology_directory(&args.path, &args)
    } else {
        Err(format!("Path does not exist: {}", args.path.display()).into())
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn topology_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if ext == Some("yaml") || ext == Some("yml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn run_topology_directory(dir: &Path, args: &Args) -> Result<(), Box<dyn Error>> {
    let files = topology_files(dir)?;
    if files.is_empty() {
        return Err(format!("No .yaml files found in {}", dir.display()).into());
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  QUEUE NETWORK SIMULATOR - Multiple Topologies         ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} topology file(s) to run\n", files.len());

    for (i, path) in files.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, files.len(), path.display());
        run_topology_file(path, args)?;
    }
    Ok(())
}

fn run_topology_file(path: &Path, args: &Args) -> Result<(), Box<dyn Error>> {
    let topology = Topology::load(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;

    let max_random_draws = args.max_rands;

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║  QUEUE NETWORK SIMULATOR                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    info!(
        "{}: {} queues, {} draws per replication",
        path.display(),
        topology.queues.len(),
        max_random_draws
    );

    let simulator = Simulator::new(topology, SimOptions { max_random_draws })?;
    let results = if args.parallel {
        simulator.run_parallel()?
    } else {
        simulator.run()?
    };

    for (i, result) in results.iter().enumerate() {
        match simulator.seed(i) {
            Some(seed) => println!(
                "Simulation #{} (seed {}): t={:.4}, {} draws, {:?}",
                i + 1,
                seed,
                result.total_elapsed_time,
                result.draws_used,
                result.termination
            ),
            None => println!(
                "Simulation #{}: t={:.4}, {} draws, {:?}",
                i + 1,
                result.total_elapsed_time,
                result.draws_used,
                result.termination
            ),
        }
    }

    let aggregate = Aggregate::combine(&results);
    if args.yaml {
        print!("{}", serde_yaml::to_string(&aggregate)?);
    } else {
        print_report(simulator.topology(), &aggregate);
    }
    Ok(())
}
