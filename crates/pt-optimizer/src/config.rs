//! Optimizer configuration and scenario loading.
//!
//! Every tuned constant (penalty weight, tolerances, population size,
//! iteration caps) lives here rather than in the search code.
//!
//! ## Loading order
//!
//! 1. An explicit path (CLI `--config`); failures are errors
//! 2. `PULTRIX_CONFIG` environment variable (path to TOML file)
//! 3. `pultrix.toml` in the current working directory
//! 4. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use pt_surrogate::{ModelBundle, PredictionService};
use pt_types::{config_error, MetricThresholds, OptimizationScenario, PtError, PtResult};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "PULTRIX_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pultrix.toml";

/// How the differential-evolution trial vector is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationStrategy {
    /// `best + F * (r1 - r2)`, binomial crossover.
    #[serde(rename = "best1bin")]
    Best1Bin,
    /// `r0 + F * (r1 - r2)`, binomial crossover.
    #[serde(rename = "rand1bin")]
    Rand1Bin,
}

/// Initial population sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    LatinHypercube,
    Random,
}

/// Global phase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialEvolutionConfig {
    pub enabled: bool,
    pub population_size: usize,
    pub max_generations: usize,
    /// Lower end of the per-generation dithered mutation factor.
    pub mutation_min: f64,
    /// Upper end of the dithered mutation factor.
    pub mutation_max: f64,
    pub crossover_rate: f64,
    pub strategy: MutationStrategy,
    pub init: InitMethod,
    /// Relative spread tolerance on the penalized objective.
    pub tolerance: f64,
    /// Absolute spread tolerance on the penalized objective.
    pub absolute_tolerance: f64,
    /// Evaluate each generation on the rayon pool.
    pub parallel: bool,
    /// Stop the global phase early after this many seconds.
    pub time_limit_secs: Option<f64>,
}

impl Default for DifferentialEvolutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            population_size: 20,
            max_generations: 120,
            mutation_min: 0.5,
            mutation_max: 1.0,
            crossover_rate: 0.7,
            strategy: MutationStrategy::Best1Bin,
            init: InitMethod::LatinHypercube,
            tolerance: 0.01,
            absolute_tolerance: 0.0,
            parallel: false,
            time_limit_secs: None,
        }
    }
}

impl DifferentialEvolutionConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if self.population_size < 5 {
            errors.push(format!(
                "global.population_size must be >= 5, got {}",
                self.population_size
            ));
        }
        if !(self.mutation_min > 0.0
            && self.mutation_min <= self.mutation_max
            && self.mutation_max <= 2.0)
        {
            errors.push(format!(
                "global mutation range must satisfy 0 < min <= max <= 2, got [{}, {}]",
                self.mutation_min, self.mutation_max
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            errors.push(format!(
                "global.crossover_rate must lie in [0, 1], got {}",
                self.crossover_rate
            ));
        }
        if self.tolerance < 0.0 || self.absolute_tolerance < 0.0 {
            errors.push("global tolerances must be non-negative".to_string());
        }
        if let Some(limit) = self.time_limit_secs {
            if !(limit > 0.0) {
                errors.push(format!(
                    "global.time_limit_secs must be positive, got {limit}"
                ));
            }
        }
    }
}

/// Local phase settings. Distances are in unit-square coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqpConfig {
    pub enabled: bool,
    pub max_iterations: usize,
    /// Stop when the QP step is shorter than this.
    pub step_tolerance: f64,
    /// Stop when the projected Lagrangian gradient is below this (relative).
    pub gradient_tolerance: f64,
    /// Stop when the objective changes by less than this (relative).
    pub function_tolerance: f64,
    pub finite_difference_step: f64,
    /// Step halvings allowed per line search.
    pub max_line_search_steps: usize,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 100,
            step_tolerance: 1e-9,
            gradient_tolerance: 1e-7,
            function_tolerance: 1e-10,
            finite_difference_step: 1e-6,
            max_line_search_steps: 30,
        }
    }
}

impl SqpConfig {
    fn validate(&self, errors: &mut Vec<String>) {
        if self.max_iterations == 0 {
            errors.push("local.max_iterations must be >= 1".to_string());
        }
        if !(self.finite_difference_step > 0.0 && self.finite_difference_step < 0.1) {
            errors.push(format!(
                "local.finite_difference_step must lie in (0, 0.1), got {}",
                self.finite_difference_step
            ));
        }
        if self.step_tolerance < 0.0
            || self.gradient_tolerance < 0.0
            || self.function_tolerance < 0.0
        {
            errors.push("local tolerances must be non-negative".to_string());
        }
    }
}

/// Top-level configuration for an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Seed for the global phase RNG.
    pub seed: u64,
    /// Weight on the summed violations in the penalized objective.
    pub penalty_weight: f64,
    /// Largest violation still counted as feasible.
    pub feasibility_tolerance: f64,
    /// Penalized objectives closer than this are ties.
    pub tie_tolerance: f64,
    pub global: DifferentialEvolutionConfig,
    pub local: SqpConfig,
    /// Cure thresholds for the derived metrics.
    pub thresholds: MetricThresholds,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            penalty_weight: 1.0e5,
            feasibility_tolerance: 1.0e-4,
            tie_tolerance: 1.0e-9,
            global: DifferentialEvolutionConfig::default(),
            local: SqpConfig::default(),
            thresholds: MetricThresholds::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.global.parallel = parallel;
        self
    }

    /// Validate every field, reporting all problems at once.
    pub fn validate(&self) -> PtResult<()> {
        let mut errors = Vec::new();
        if !(self.penalty_weight.is_finite() && self.penalty_weight > 0.0) {
            errors.push(format!(
                "penalty_weight must be finite and positive, got {}",
                self.penalty_weight
            ));
        }
        if !(self.feasibility_tolerance >= 0.0) {
            errors.push("feasibility_tolerance must be non-negative".to_string());
        }
        if !(self.tie_tolerance >= 0.0) {
            errors.push("tie_tolerance must be non-negative".to_string());
        }
        let t = &self.thresholds;
        if !(t.cure_onset > 0.0 && t.cure_onset < t.full_cure && t.full_cure <= 1.0) {
            errors.push(format!(
                "thresholds must satisfy 0 < cure_onset < full_cure <= 1, got {} and {}",
                t.cure_onset, t.full_cure
            ));
        }
        self.global.validate(&mut errors);
        self.local.validate(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PtError::Config(errors.join("; ")))
        }
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> PtResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| config_error!("cannot parse {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration using the standard search order.
    pub fn load(explicit: Option<&Path>) -> PtResult<Self> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded optimizer config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            match Self::load_from_file(&p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded optimizer config from {CONFIG_ENV_VAR}");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                }
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded optimizer config from ./{DEFAULT_CONFIG_FILE}");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{DEFAULT_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No optimizer config found, using built-in defaults");
        Ok(Self::default())
    }

    /// Prediction service over `bundle` using the configured thresholds.
    pub fn prediction_service(&self, bundle: Arc<ModelBundle>) -> PredictionService {
        PredictionService::new(bundle).with_thresholds(self.thresholds)
    }
}

/// Read and validate a scenario TOML file.
///
/// Parse failures (including unknown objective names) are `InvalidScenario`.
pub fn load_scenario(path: &Path) -> PtResult<OptimizationScenario> {
    let contents = std::fs::read_to_string(path)?;
    let scenario: OptimizationScenario = toml::from_str(&contents).map_err(|e| {
        PtError::invalid_scenario(format!("cannot parse {}: {e}", path.display()))
    })?;
    scenario.validate()?;
    Ok(scenario)
}
