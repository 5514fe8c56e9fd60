//! paratune — entry point.
//!
//! Tracing logs go to stderr; the authoritative output is the result-ledger
//! CSV file, not stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use paratune::config::{registry, TuningConfig};
use paratune::manager::ExecutionManager;

#[derive(Debug, Parser)]
#[command(name = "paratune")]
#[command(about = "Distributed hyperparameter tuning orchestrator", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a tuning job from a JSON configuration file.
    Tune {
        /// Path to the tuning configuration.
        #[arg(long)]
        config: PathBuf,

        /// Override the config's `output_file`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Tune { config, output } => tune(&config, output),
    }
}

fn tune(config_path: &std::path::Path, output_override: Option<PathBuf>) -> Result<()> {
    let config = TuningConfig::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let backend = registry::build_backend(&config.backend).context("resolving backend plug-in")?;
    let search_algorithm = registry::build_search_algorithm(
        &config.search_algorithm,
        config.params_to_tune_vec(),
        config.params_to_try_first_sets(),
        config.num_evals as usize,
    )
    .context("resolving search-algorithm plug-in")?;

    let output_file = output_override.or_else(|| config.output_file.clone());
    let manager = ExecutionManager::new(
        backend,
        search_algorithm,
        config.result_pattern.clone(),
        config.objective,
        config.constraints.clone(),
        output_file,
        config.actor_config(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let ledger = runtime.block_on(manager.run());

    info!(completed_jobs = ledger.len(), "tuning run complete");
    if let Some(best) = ledger.rows().first() {
        info!(
            result = best.result,
            params = %best.params_string,
            status = %best.status,
            "best result"
        );
    }
    Ok(())
}
