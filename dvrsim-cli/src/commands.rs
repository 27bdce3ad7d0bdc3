use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::error;

use dvrsim_config::{SchedulingPolicy, SimulationConfig};
use dvrsim_engine::{run_simulation_task, sweep, SweepPlan};

#[derive(Parser, Debug)]
#[command(name = "dvrsim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one deterministic simulation and print its report
    Run(RunArgs),
    /// Compare both scheduling policies over a range of seeds
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// YAML configuration file; defaults to config/dvrsim.yaml when present
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub policy: Option<SchedulingPolicy>,
    /// Stop at this virtual time (ms) instead of run.max_sim_time_ms
    #[arg(long)]
    pub until: Option<f64>,
    /// Fail unless the report digest equals this hex string
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Print the full YAML report instead of the summary
    #[arg(long)]
    pub yaml: bool,
    /// Also print the Prometheus metrics of the run
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Number of seeds to run
    #[arg(long, default_value_t = 4)]
    pub seeds: u64,
    #[arg(long, default_value_t = 1)]
    pub start_seed: u64,
    /// Parallel runs (0 = one per CPU)
    #[arg(long, default_value_t = 0)]
    pub jobs: usize,
}

pub async fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Sweep(args) => run_sweep(args).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    SimulationConfig::load_optional(path).with_context(|| match path {
        Some(path) => format!("loading {}", path.display()),
        None => "loading default configuration".to_string(),
    })
}

/// Command-line flags win over every configuration layer.
fn apply_overrides(config: &mut SimulationConfig, args: &RunArgs) {
    if let Some(seed) = args.seed {
        config.run.seed = seed;
    }
    if let Some(policy) = args.policy {
        config.run.policy = policy;
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let outcome = run_simulation_task(config, args.until).await?;
    let report = &outcome.report;
    if args.yaml {
        print!("{}", report.to_yaml()?);
    } else {
        println!("{report}");
    }
    if args.metrics {
        print!("{}", outcome.metrics.gather_metrics()?);
    }

    if let Some(expected) = args.validate_hash.as_deref() {
        if let Err(err) = report.validate_hash(expected) {
            match report.write_bug_report(Path::new(".")) {
                Ok(path) => error!(path = %path.display(), "report written for the mismatching run"),
                Err(write_err) => error!(%write_err, "could not write bug report"),
            }
            return Err(err.into());
        }
    }
    Ok(())
}

async fn run_sweep(args: SweepArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let plan = SweepPlan {
        seeds: args.seeds,
        start_seed: args.start_seed,
        jobs: args.jobs,
    };
    let report = sweep(config, plan).await.context("sweep failed")?;
    print!("{}", report.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "dvrsim",
            "run",
            "--seed",
            "7",
            "--policy",
            "deadline",
            "--until",
            "2500",
            "--validate-hash",
            "abc",
            "--yaml",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.policy, Some(SchedulingPolicy::Deadline));
        assert_eq!(args.until, Some(2_500.0));
        assert_eq!(args.validate_hash.as_deref(), Some("abc"));
        assert!(args.yaml && !args.metrics);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = Cli::try_parse_from(["dvrsim", "run", "--policy", "elevator"]).unwrap_err();
        assert!(err.to_string().contains("elevator"));
    }

    #[test]
    fn sweep_defaults() {
        let cli = Cli::try_parse_from(["dvrsim", "sweep"]).unwrap();
        let Commands::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!((args.seeds, args.start_seed, args.jobs), (4, 1, 0));
        assert!(args.config.is_none());
    }

    #[test]
    fn flags_override_loaded_config() {
        let cli = Cli::try_parse_from(["dvrsim", "run", "--seed", "99"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = SimulationConfig::default();
        config.run.policy = SchedulingPolicy::Deadline;
        apply_overrides(&mut config, &args);
        assert_eq!(config.run.seed, 99);
        assert_eq!(config.run.policy, SchedulingPolicy::Deadline);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("does/not/exist.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.yaml"));
    }
}
