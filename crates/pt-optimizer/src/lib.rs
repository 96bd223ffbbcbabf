//! # pt-optimizer
//!
//! Process-parameter optimization over the pultrusion surrogates.
//!
//! Provides the objective/constraint evaluator (penalized and strict
//! modes), a differential-evolution global search, an SLSQP-style local
//! refinement, and the hybrid optimizer that chains them into an
//! [`OptimizationResult`](pt_types::OptimizationResult).

mod config;
mod evaluator;
mod global;
mod hybrid;
mod local;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    load_scenario, DifferentialEvolutionConfig, InitMethod, MutationStrategy, OptimizerConfig,
    SqpConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
};
pub use evaluator::{
    Candidate, CandidateEvaluator, Evaluation, PenalizedEvaluation, ScenarioEvaluator,
    StrictEvaluation,
};
pub use global::{DifferentialEvolution, GlobalOutcome};
pub use hybrid::HybridOptimizer;
pub use local::{LocalOutcome, LocalStep, LocalTermination, SqpRefiner};
