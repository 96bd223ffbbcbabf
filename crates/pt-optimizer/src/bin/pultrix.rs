//! Command-line front end for pultrusion predictions and process optimization.
//!
//! Usage:
//!   pultrix predict --models models/ --rate 0.15 --die-temperature 120
//!   pultrix optimize --models models/ --scenario scenario.toml --output result.json
//!   pultrix export-reference --out models/

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use pt_optimizer::{load_scenario, HybridOptimizer, OptimizerConfig};
use pt_surrogate::ModelBundle;

/// Exit status when the optimizer finds no feasible setting.
const EXIT_INFEASIBLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "pultrix")]
#[command(about = "Pultrusion surrogate predictions and process-parameter optimization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict cure and temperature profiles for one process setting
    Predict {
        /// Directory holding cure_model.json and temperature_model.json.
        /// Falls back to the built-in reference model when omitted.
        #[arg(long, env = "PULTRIX_MODELS")]
        models: Option<PathBuf>,
        /// Pulling rate in m/min
        #[arg(long)]
        rate: f64,
        /// Die temperature in °C
        #[arg(long)]
        die_temperature: f64,
        /// Config TOML whose [thresholds] section sets the cure thresholds
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the full prediction (profiles included) as JSON
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Find the best rate and die temperature for a scenario
    Optimize {
        #[arg(long, env = "PULTRIX_MODELS")]
        models: Option<PathBuf>,
        /// Scenario TOML (objective, target cure, constraints, bounds)
        #[arg(long)]
        scenario: PathBuf,
        /// Optimizer config TOML; otherwise PULTRIX_CONFIG, ./pultrix.toml, defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Evaluate each global generation in parallel
        #[arg(long)]
        parallel: bool,
        /// Write the optimization result as JSON
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Write the reference model bundle to a directory
    ExportReference {
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Predict {
            models,
            rate,
            die_temperature,
            config,
            output,
        } => {
            let config = OptimizerConfig::load(config.as_deref())?;
            let service = config.prediction_service(load_bundle(models.as_deref())?);
            let prediction = service.predict_values(&[rate, die_temperature])?;
            if prediction.extrapolated {
                warn!(
                    params = %prediction.parameters,
                    "Setting lies outside the trained domain; prediction is an extrapolation"
                );
            }
            println!("{}", serde_json::to_string_pretty(&prediction.metrics.to_map())?);
            if let Some(path) = output {
                write_json(&path, &prediction)?;
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Optimize {
            models,
            scenario,
            config,
            seed,
            parallel,
            output,
        } => {
            let mut config = OptimizerConfig::load(config.as_deref())?;
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if parallel {
                config = config.with_parallel(true);
            }
            let scenario = load_scenario(&scenario)?;
            let service = config.prediction_service(load_bundle(models.as_deref())?);

            let result = HybridOptimizer::new(config)?.run(&service, &scenario)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(path) = output {
                write_json(&path, &result)?;
            }

            if result.feasible {
                Ok(ExitCode::SUCCESS)
            } else {
                warn!(
                    total_violation = result.total_violation(),
                    "Scenario is infeasible within its bounds"
                );
                Ok(ExitCode::from(EXIT_INFEASIBLE))
            }
        }

        Command::ExportReference { out } => {
            ModelBundle::export_reference(&out)
                .with_context(|| format!("exporting reference bundle to {}", out.display()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_bundle(models: Option<&Path>) -> Result<Arc<ModelBundle>> {
    let bundle = match models {
        Some(dir) => ModelBundle::load(dir)
            .with_context(|| format!("loading model bundle from {}", dir.display()))?,
        None => {
            info!("No model directory given; using the reference model");
            ModelBundle::reference()
        }
    };
    Ok(Arc::new(bundle))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "Wrote output");
    Ok(())
}
