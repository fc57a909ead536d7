use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mps_simulator_core::lp::MicroLpModel;
use mps_simulator_core::{
    PlanningInstance, PlanningMode, RollingHorizonSimulator, RunReport, SimulationConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEMO_INSTANCE: &str = include_str!("../instances/demo.json");

#[derive(Debug, Parser)]
#[command(
    name = "mps-sim",
    about = "Rolling-horizon simulation of circular master production schedules",
    after_help = "Examples:\n  mps-sim demo\n  mps-sim run --instance plan.json --num-sim 500 --epsilon 0.05 --output results"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Solve an instance, simulate both variants, and report")]
    Run {
        #[arg(long, help = "Planning instance (JSON)")]
        instance: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    #[command(about = "Run the bundled single-product instance")]
    Demo {
        #[command(flatten)]
        options: RunOptions,
    },
}

#[derive(Debug, Args)]
struct RunOptions {
    #[arg(long, help = "Simulation config (JSON); flags below override it")]
    config: Option<PathBuf>,
    #[arg(long, help = "Number of simulation replicates")]
    num_sim: Option<usize>,
    #[arg(long, help = "Non-anticipativity weight growth; 0 disables the re-solve")]
    epsilon: Option<f64>,
    #[arg(long, help = "Plan against this many sampled availability scenarios")]
    scenarios: Option<usize>,
    #[arg(long, requires = "scenarios", help = "Seed for the scenario table")]
    seed: Option<u64>,
    #[arg(long, help = "Write report.txt and report.json into this directory")]
    output: Option<PathBuf>,
    #[arg(long, help = "Print the report as JSON instead of text")]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { instance, options } => {
            load_instance(&instance).and_then(|inst| execute(inst, &options))
        }
        Command::Demo { options } => serde_json::from_str(DEMO_INSTANCE)
            .context("bundled demo instance is malformed")
            .and_then(|inst| execute(inst, &options)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_instance(path: &Path) -> Result<PlanningInstance> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read instance {}", path.display()))?;
    let instance: PlanningInstance = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse instance {}", path.display()))?;
    instance
        .validate()
        .with_context(|| format!("invalid instance {}", path.display()))?;
    Ok(instance)
}

fn load_config(options: &RunOptions) -> Result<SimulationConfig> {
    let mut config = match &options.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(num_sim) = options.num_sim {
        config.num_simulations = num_sim;
    }
    if let Some(epsilon) = options.epsilon {
        config.epsilon = epsilon;
    }
    if let Some(scenarios) = options.scenarios {
        let seed = match (options.seed, &config.planning) {
            (Some(seed), _) => seed,
            (None, PlanningMode::ScenarioSampled { seed, .. }) => *seed,
            (None, PlanningMode::ExpectedValue) => 101,
        };
        config.planning = PlanningMode::ScenarioSampled { scenarios, seed };
    }
    config.validate().context("invalid simulation config")?;
    Ok(config)
}

fn execute(instance: PlanningInstance, options: &RunOptions) -> Result<()> {
    let config = load_config(options)?;
    info!(
        fingerprint = %instance.fingerprint(),
        num_simulations = config.num_simulations,
        epsilon = config.epsilon,
        "starting run"
    );

    let mut simulator = RollingHorizonSimulator::from_instance(instance, config, MicroLpModel::new())
        .context("failed to build planning model")?;
    let report = simulator.run().context("simulation failed")?;

    match &options.output {
        Some(dir) => write_report(dir, &report)?,
        None if options.json => println!("{}", serde_json::to_string_pretty(&report)?),
        None => print!("{}", report.render_text()),
    }
    Ok(())
}

fn write_report(dir: &Path, report: &RunReport) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let text_path = dir.join("report.txt");
    std::fs::write(&text_path, report.render_text())
        .with_context(|| format!("failed to write {}", text_path.display()))?;

    let json_path = dir.join("report.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    info!(dir = %dir.display(), run_id = %report.run_id, "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RunOptions {
        RunOptions {
            config: None,
            num_sim: None,
            epsilon: None,
            scenarios: None,
            seed: None,
            output: None,
            json: false,
        }
    }

    #[test]
    fn test_demo_instance_is_valid() {
        let instance: PlanningInstance = serde_json::from_str(DEMO_INSTANCE).unwrap();
        assert!(instance.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let opts = RunOptions {
            num_sim: Some(12),
            epsilon: Some(0.05),
            scenarios: Some(4),
            ..options()
        };
        let config = load_config(&opts).unwrap();
        assert_eq!(config.num_simulations, 12);
        assert_eq!(config.epsilon, 0.05);
        assert_eq!(
            config.planning,
            PlanningMode::ScenarioSampled {
                scenarios: 4,
                seed: 101
            }
        );
    }

    #[test]
    fn test_invalid_override_rejected() {
        let opts = RunOptions {
            num_sim: Some(0),
            ..options()
        };
        assert!(load_config(&opts).is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "mps-sim", "run", "--instance", "a.json", "--num-sim", "5", "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Run { instance, options } => {
                assert_eq!(instance, PathBuf::from("a.json"));
                assert_eq!(options.num_sim, Some(5));
                assert!(options.json);
            }
            Command::Demo { .. } => panic!("expected run"),
        }
    }
}
