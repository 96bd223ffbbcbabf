//! Two-phase optimizer: differential evolution, then SQP refinement.

use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use pt_surrogate::PredictionService;
use pt_types::{
    GlobalSummary, LocalStatus, LocalSummary, OptimizationResult, OptimizationScenario, Phase,
    ProcessParameters, PtResult, ResultSource, TracePoint,
};

use crate::config::OptimizerConfig;
use crate::evaluator::{Candidate, CandidateEvaluator, ScenarioEvaluator};
use crate::global::DifferentialEvolution;
use crate::local::{LocalOutcome, LocalTermination, SqpRefiner};

/// Chains the global and local phases and picks the reported candidate.
#[derive(Debug, Clone)]
pub struct HybridOptimizer {
    config: OptimizerConfig,
}

/// Phase-independent part of a run, before the final re-evaluation.
#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    pub params: ProcessParameters,
    pub source: ResultSource,
    pub trace: Vec<TracePoint>,
    pub global: GlobalSummary,
    pub local: LocalSummary,
}

impl HybridOptimizer {
    pub fn new(config: OptimizerConfig) -> PtResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Optimize `scenario` against the surrogates behind `service`.
    ///
    /// Infeasibility is reported through `feasible = false`, not as an
    /// error. Local-phase degradation is recovered here and never returned.
    pub fn run(
        &self,
        service: &PredictionService,
        scenario: &OptimizationScenario,
    ) -> PtResult<OptimizationResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        let evaluator = ScenarioEvaluator::new(service, scenario, self.config.penalty_weight)?;
        info!(
            %run_id,
            objective = %scenario.objective,
            constraints = scenario.constraints.len(),
            seed = self.config.seed,
            "Starting optimization run"
        );

        let outcome = self.search(&evaluator)?;
        let evaluation = evaluator.evaluate(&outcome.params)?;
        let feasible = evaluation
            .violations
            .iter()
            .all(|v| *v <= self.config.feasibility_tolerance);

        let finished_at = Utc::now();
        let wall_clock_seconds = clock.elapsed().as_secs_f64();
        if feasible {
            info!(
                %run_id,
                params = %evaluation.parameters,
                objective = evaluation.objective,
                source = ?outcome.source,
                evaluations = evaluator.evaluations(),
                wall_clock_seconds,
                "Optimization finished"
            );
        } else {
            warn!(
                %run_id,
                params = %evaluation.parameters,
                total_violation = evaluation.violations.iter().sum::<f64>(),
                "No feasible setting found; reporting the least violating candidate"
            );
        }

        Ok(OptimizationResult {
            run_id,
            objective: scenario.objective,
            best_parameters: evaluation.parameters,
            best_objective_value: evaluation.objective,
            feasible,
            violations: evaluation.violations,
            margins: evaluation.margins,
            best_metrics: evaluation.metrics,
            source: outcome.source,
            convergence_trace: outcome.trace,
            global: outcome.global,
            local: outcome.local,
            started_at,
            finished_at,
            wall_clock_seconds,
        })
    }

    pub(crate) fn search<E: CandidateEvaluator>(&self, evaluator: &E) -> PtResult<SearchOutcome> {
        let tolerance = self.config.feasibility_tolerance;
        let mut trace = Vec::new();
        let mut global = GlobalSummary::default();

        // Phase 1, or the bounds centre standing in for its result.
        let (start, best_feasible, mut least_violating) = if self.config.global.enabled {
            let de = DifferentialEvolution::new(
                self.config.global.clone(),
                self.config.tie_tolerance,
                tolerance,
            );
            let outcome = de.run(evaluator, self.config.seed)?;
            trace.extend(outcome.trace.iter().enumerate().map(|(i, value)| TracePoint {
                iteration: i,
                phase: Phase::Global,
                best_objective: *value,
            }));
            global = GlobalSummary {
                enabled: true,
                generations: outcome.generations,
                evaluations: outcome.evaluations,
                converged: outcome.converged,
                timed_out: outcome.timed_out,
                best_penalized_objective: Some(outcome.best.penalized),
            };
            (
                outcome.best.params,
                outcome.best_feasible,
                outcome.least_violating,
            )
        } else {
            let center = evaluator.bounds().center();
            let candidate = Candidate::from_penalized(center, &evaluator.penalized(&center)?);
            let feasible = candidate.is_feasible(tolerance).then_some(candidate);
            (center, feasible, candidate)
        };

        let mut local = LocalSummary::default();
        let mut refined: Option<LocalOutcome> = None;
        if self.config.local.enabled {
            let refiner = SqpRefiner::new(self.config.local.clone(), tolerance);
            match refiner.refine(evaluator, &start) {
                Ok(outcome) => {
                    local.status = match outcome.termination {
                        LocalTermination::Converged => LocalStatus::Converged,
                        LocalTermination::MaxIterations => LocalStatus::MaxIterations,
                    };
                    local.iterations = outcome.iterations;
                    local.evaluations = outcome.evaluations;
                    let offset = trace.len();
                    let weight = evaluator.penalty_weight();
                    let mut best = trace
                        .last()
                        .map_or(f64::INFINITY, |p: &TracePoint| p.best_objective);
                    trace.extend(outcome.trace.iter().enumerate().map(|(i, step)| {
                        best = best.min(step.penalized(weight));
                        TracePoint {
                            iteration: offset + i,
                            phase: Phase::Local,
                            best_objective: best,
                        }
                    }));
                    info!(
                        status = ?local.status,
                        iterations = outcome.iterations,
                        objective = outcome.objective,
                        max_violation = outcome.max_violation(),
                        "Local refinement finished"
                    );
                    refined = Some(outcome);
                }
                Err(e) if e.is_degradation() => {
                    warn!(error = %e, "Local refinement degraded; keeping the global candidate");
                    local.status = LocalStatus::Degraded {
                        message: e.to_string(),
                    };
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(outcome) = &refined {
            let feasible = outcome.max_violation() <= tolerance && outcome.objective.is_finite();
            let improves = best_feasible.map_or(true, |b| outcome.objective < b.objective);
            if feasible && improves {
                local.accepted = true;
                return Ok(SearchOutcome {
                    params: outcome.params,
                    source: ResultSource::LocalRefinement,
                    trace,
                    global,
                    local,
                });
            }
            let total: f64 = outcome.margins.iter().map(|m| m.max(0.0)).sum();
            if best_feasible.is_none() && total < least_violating.total_violation {
                least_violating.params = outcome.params;
                least_violating.total_violation = total;
            }
        }

        let (params, source) = match best_feasible {
            Some(candidate) => (candidate.params, ResultSource::GlobalSearch),
            None => (least_violating.params, ResultSource::LeastViolating),
        };
        Ok(SearchOutcome {
            params,
            source,
            trace,
            global,
            local,
        })
    }
}
