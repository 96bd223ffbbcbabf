//! Objective and constraint evaluation for one optimization scenario.
//!
//! [`ScenarioEvaluator`] turns a candidate setting into an objective value
//! and per-constraint margins through one call to the prediction service.
//! Two modes are kept apart on purpose: [`penalized`](CandidateEvaluator::penalized)
//! folds violations into the objective for the global phase, while
//! [`strict`](CandidateEvaluator::strict) hands signed margins to the local
//! phase, which treats them as hard inequalities.

use std::sync::atomic::{AtomicUsize, Ordering};

use pt_surrogate::PredictionService;
use pt_types::{
    config_error, Constraint, DerivedMetrics, ObjectiveKind, OptimizationScenario,
    ParameterBounds, ProcessParameters, PtResult, Range, SpatialProfile,
};

/// Output of the penalized (soft-constraint) mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PenalizedEvaluation {
    pub objective: f64,
    /// Non-negative violation per constraint.
    pub violations: Vec<f64>,
    /// `objective + penalty_weight * sum(violations)`.
    pub penalized: f64,
}

impl PenalizedEvaluation {
    pub fn total_violation(&self) -> f64 {
        self.violations.iter().sum()
    }

    pub fn max_violation(&self) -> f64 {
        self.violations.iter().copied().fold(0.0, f64::max)
    }
}

/// Output of the strict (hard-constraint) mode.
#[derive(Debug, Clone, PartialEq)]
pub struct StrictEvaluation {
    pub objective: f64,
    /// Signed margin per constraint, `<= 0` when satisfied.
    pub margins: Vec<f64>,
}

/// Full evaluation with the metrics behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Parameters after clipping to the scenario bounds.
    pub parameters: ProcessParameters,
    pub objective: f64,
    pub margins: Vec<f64>,
    pub violations: Vec<f64>,
    pub metrics: DerivedMetrics,
}

/// A scored point of the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub params: ProcessParameters,
    pub objective: f64,
    pub penalized: f64,
    pub total_violation: f64,
    pub max_violation: f64,
}

impl Candidate {
    pub fn from_penalized(params: ProcessParameters, eval: &PenalizedEvaluation) -> Self {
        Self {
            params,
            objective: eval.objective,
            penalized: eval.penalized,
            total_violation: eval.total_violation(),
            max_violation: eval.max_violation(),
        }
    }

    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.max_violation <= tolerance
    }
}

/// The seam both search phases are written against.
pub trait CandidateEvaluator: Sync {
    /// Search domain.
    fn bounds(&self) -> &ParameterBounds;

    /// Weight on the summed violations in [`penalized`](Self::penalized).
    fn penalty_weight(&self) -> f64;

    /// Soft-constraint mode for the global phase.
    fn penalized(&self, params: &ProcessParameters) -> PtResult<PenalizedEvaluation>;

    /// Hard-constraint mode for the local phase.
    fn strict(&self, params: &ProcessParameters) -> PtResult<StrictEvaluation>;

    /// Evaluations performed so far.
    fn evaluations(&self) -> usize;
}

/// Evaluates candidates of one scenario against the prediction service.
pub struct ScenarioEvaluator<'a> {
    service: &'a PredictionService,
    scenario: &'a OptimizationScenario,
    penalty_weight: f64,
    evaluations: AtomicUsize,
}

impl<'a> ScenarioEvaluator<'a> {
    /// Validates the scenario up front; an invalid scenario never reaches the search.
    pub fn new(
        service: &'a PredictionService,
        scenario: &'a OptimizationScenario,
        penalty_weight: f64,
    ) -> PtResult<Self> {
        scenario.validate()?;
        if !(penalty_weight.is_finite() && penalty_weight > 0.0) {
            return Err(config_error!(
                "penalty weight must be finite and positive, got {penalty_weight}"
            ));
        }
        Ok(Self {
            service,
            scenario,
            penalty_weight,
            evaluations: AtomicUsize::new(0),
        })
    }

    /// Objective, margins and violations for one candidate.
    pub fn evaluate(&self, params: &ProcessParameters) -> PtResult<Evaluation> {
        params.ensure_finite()?;
        let clipped = self.scenario.bounds.clip(params);
        let prediction = self.service.predict(clipped)?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let metrics = prediction.metrics;
        let objective = match self.scenario.objective {
            ObjectiveKind::MinTemperature => metrics.peak_temperature,
            ObjectiveKind::MaxRate => -clipped.rate,
            ObjectiveKind::MinEnergy => clipped.die_temperature / clipped.rate,
        };

        let margins: Vec<f64> = self
            .scenario
            .constraints
            .iter()
            .map(|c| self.margin(c, &clipped, &metrics, &prediction.cure_profile))
            .collect();
        let violations = margins.iter().map(|m| m.max(0.0)).collect();

        Ok(Evaluation {
            parameters: clipped,
            objective,
            margins,
            violations,
            metrics,
        })
    }

    fn margin(
        &self,
        constraint: &Constraint,
        params: &ProcessParameters,
        metrics: &DerivedMetrics,
        cure: &SpatialProfile,
    ) -> f64 {
        match constraint {
            Constraint::Bound {
                parameter,
                min,
                max,
            } => Range::new(*min, *max).signed_distance(params.get(*parameter)),
            Constraint::CureThreshold => {
                // validate() guarantees a target whenever this constraint exists
                let target = self.scenario.target_cure_degree.unwrap_or(0.0);
                target - metrics.final_cure
            }
            Constraint::TemperatureCeiling { max_temperature } => {
                metrics.peak_temperature - max_temperature
            }
            Constraint::FullCureBefore { position_mm } => {
                full_cure_position(metrics, cure, self.service.thresholds().full_cure)
                    - position_mm
            }
        }
    }
}

/// Full-cure position, extrapolated past the die exit from the remaining
/// cure shortfall when full cure is never reached.
fn full_cure_position(metrics: &DerivedMetrics, cure: &SpatialProfile, threshold: f64) -> f64 {
    if let Some(position) = metrics.full_cure_position_mm {
        return position;
    }
    let start = cure.axial_positions_mm.first().copied().unwrap_or(0.0);
    let end = cure.axial_positions_mm.last().copied().unwrap_or(0.0);
    end + (threshold - metrics.final_cure).max(0.0) * (end - start)
}

impl CandidateEvaluator for ScenarioEvaluator<'_> {
    fn bounds(&self) -> &ParameterBounds {
        &self.scenario.bounds
    }

    fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }

    fn penalized(&self, params: &ProcessParameters) -> PtResult<PenalizedEvaluation> {
        let eval = self.evaluate(params)?;
        let total: f64 = eval.violations.iter().sum();
        Ok(PenalizedEvaluation {
            objective: eval.objective,
            penalized: eval.objective + self.penalty_weight * total,
            violations: eval.violations,
        })
    }

    fn strict(&self, params: &ProcessParameters) -> PtResult<StrictEvaluation> {
        let eval = self.evaluate(params)?;
        Ok(StrictEvaluation {
            objective: eval.objective,
            margins: eval.margins,
        })
    }

    fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pt_surrogate::ModelBundle;
    use pt_types::{Parameter, PredictionError, PtError, ScenarioError};
    use std::sync::Arc;

    fn service() -> PredictionService {
        PredictionService::new(Arc::new(ModelBundle::reference()))
    }

    fn bounds() -> ParameterBounds {
        ParameterBounds::new((0.11, 0.21), (110.0, 140.0))
    }

    #[test]
    fn objectives_follow_kind() {
        let service = service();
        let params = ProcessParameters::new(0.15, 120.0);
        let peak = service.predict(params).unwrap().metrics.peak_temperature;

        for (kind, expected) in [
            (ObjectiveKind::MinTemperature, peak),
            (ObjectiveKind::MaxRate, -0.15),
            (ObjectiveKind::MinEnergy, 120.0 / 0.15),
        ] {
            let scenario = OptimizationScenario::new(kind).with_bounds(bounds());
            let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();
            let eval = evaluator.evaluate(&params).unwrap();
            assert_relative_eq!(eval.objective, expected);
        }
    }

    #[test]
    fn zero_violation_means_inequality_holds() {
        let service = service();
        let scenario = OptimizationScenario::cured(ObjectiveKind::MinTemperature, bounds(), 0.99)
            .with_constraint(Constraint::TemperatureCeiling {
                max_temperature: 135.0,
            })
            .with_constraint(Constraint::Bound {
                parameter: Parameter::DieTemperature,
                min: 115.0,
                max: 130.0,
            });
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();

        for rate in [0.11, 0.13, 0.15, 0.17, 0.19, 0.21] {
            for temp in [110.0, 115.0, 120.0, 125.0, 130.0, 135.0, 140.0] {
                let eval = evaluator
                    .evaluate(&ProcessParameters::new(rate, temp))
                    .unwrap();
                let m = &eval.metrics;
                assert_eq!(eval.violations[0] == 0.0, m.final_cure >= 0.99);
                assert_eq!(eval.violations[1] == 0.0, m.peak_temperature <= 135.0);
                assert_eq!(eval.violations[2] == 0.0, (115.0..=130.0).contains(&temp));
                assert!(eval.violations.iter().all(|v| *v >= 0.0));
            }
        }
    }

    #[test]
    fn bound_margin_is_signed_distance() {
        let service = service();
        let scenario = OptimizationScenario::new(ObjectiveKind::MaxRate)
            .with_bounds(bounds())
            .with_constraint(Constraint::Bound {
                parameter: Parameter::Rate,
                min: 0.12,
                max: 0.18,
            });
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();

        let eval = evaluator
            .evaluate(&ProcessParameters::new(0.20, 120.0))
            .unwrap();
        assert_relative_eq!(eval.violations[0], 0.02, epsilon = 1e-12);
        assert_relative_eq!(eval.margins[0], 0.02, epsilon = 1e-12);

        let eval = evaluator
            .evaluate(&ProcessParameters::new(0.15, 120.0))
            .unwrap();
        assert_eq!(eval.violations[0], 0.0);
        assert_relative_eq!(eval.margins[0], -0.03, epsilon = 1e-12);
    }

    #[test]
    fn penalized_adds_weighted_violations() {
        let service = service();
        let scenario = OptimizationScenario::cured(ObjectiveKind::MinEnergy, bounds(), 0.99);
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e4).unwrap();

        let params = ProcessParameters::new(0.21, 110.0);
        let soft = evaluator.penalized(&params).unwrap();
        let hard = evaluator.strict(&params).unwrap();
        assert!(soft.violations[0] > 0.0);
        assert_relative_eq!(soft.penalized, soft.objective + 1e4 * soft.violations[0]);
        assert_relative_eq!(hard.margins[0], soft.violations[0]);
        assert_eq!(evaluator.evaluations(), 2);
    }

    #[test]
    fn strict_margins_are_signed() {
        let service = service();
        let scenario = OptimizationScenario::cured(ObjectiveKind::MinEnergy, bounds(), 0.99);
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e4).unwrap();

        let hard = evaluator
            .strict(&ProcessParameters::new(0.11, 140.0))
            .unwrap();
        assert!(hard.margins[0] < 0.0);
        assert!(hard.margins.iter().all(|m| *m <= 0.0));
    }

    #[test]
    fn candidates_are_clipped_to_bounds() {
        let service = service();
        let scenario = OptimizationScenario::new(ObjectiveKind::MaxRate).with_bounds(bounds());
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();

        let eval = evaluator
            .evaluate(&ProcessParameters::new(0.5, 100.0))
            .unwrap();
        assert_eq!(eval.parameters, ProcessParameters::new(0.21, 110.0));
        assert_relative_eq!(eval.objective, -0.21);
    }

    #[test]
    fn full_cure_position_extrapolates_when_unreached() {
        let service = service();
        let scenario = OptimizationScenario::new(ObjectiveKind::MaxRate)
            .with_bounds(bounds())
            .with_constraint(Constraint::FullCureBefore { position_mm: 900.0 });
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();

        let reached = evaluator
            .evaluate(&ProcessParameters::new(0.11, 140.0))
            .unwrap();
        let position = reached.metrics.full_cure_position_mm.unwrap();
        assert_relative_eq!(reached.margins[0], position - 900.0);

        let short = evaluator
            .evaluate(&ProcessParameters::new(0.21, 110.0))
            .unwrap();
        assert!(short.metrics.full_cure_position_mm.is_none());
        let shortfall = 0.995 - short.metrics.final_cure;
        assert_relative_eq!(short.margins[0], 100.0 + shortfall * 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_scenario_is_rejected_before_search() {
        let service = service();
        let scenario = OptimizationScenario::new(ObjectiveKind::MaxRate).with_target_cure(0.99);
        let err = ScenarioEvaluator::new(&service, &scenario, 1e5)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PtError::Scenario(ScenarioError::InvalidScenario { .. })
        ));
    }

    #[test]
    fn non_finite_candidate_is_invalid_input() {
        let service = service();
        let scenario = OptimizationScenario::new(ObjectiveKind::MaxRate);
        let evaluator = ScenarioEvaluator::new(&service, &scenario, 1e5).unwrap();
        let err = evaluator
            .penalized(&ProcessParameters::new(0.15, f64::INFINITY))
            .unwrap_err();
        assert!(matches!(
            err,
            PtError::Prediction(PredictionError::InvalidInput { .. })
        ));
        assert_eq!(evaluator.evaluations(), 0);
    }
}
