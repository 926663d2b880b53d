use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Builder;

use dslab_balancer::core::config::{Algorithm, SimulationConfig};
use dslab_balancer::simulation::BalancerSimulation;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs load balancing simulation with metaheuristic rebalancing
struct Args {
    /// Path to YAML (or JSON) file with simulation configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Rebalancing algorithm (PCO, PSO or GWO), overrides the one from config
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// Random seed, overrides the one from config
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();

    let mut config = SimulationConfig::from_file(&args.config)?;
    if let Some(algorithm) = args.algorithm {
        config.load_balancer.algorithm = algorithm;
    }
    if let Some(seed) = args.seed {
        config.load_balancer.seed = seed;
    }

    let mut sim = BalancerSimulation::from_config(&config)?;
    let report = sim.run();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
