//! Analytic test problems behind the [`CandidateEvaluator`] seam.

use std::sync::atomic::{AtomicUsize, Ordering};

use pt_types::{ParameterBounds, ProcessParameters, PtResult};

use crate::evaluator::{CandidateEvaluator, PenalizedEvaluation, StrictEvaluation};

pub(crate) type ScalarFn = fn(&ProcessParameters) -> f64;

pub(crate) struct ToyProblem {
    pub bounds: ParameterBounds,
    pub objective: ScalarFn,
    /// Signed margins, `<= 0` when satisfied.
    pub constraints: Vec<ScalarFn>,
    pub penalty_weight: f64,
    /// Strict mode reports a NaN objective, as a broken model would.
    pub strict_nan: bool,
    evaluations: AtomicUsize,
}

impl ToyProblem {
    pub fn new(bounds: ParameterBounds, objective: ScalarFn) -> Self {
        Self {
            bounds,
            objective,
            constraints: Vec::new(),
            penalty_weight: 1e5,
            strict_nan: false,
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn with_constraint(mut self, margin: ScalarFn) -> Self {
        self.constraints.push(margin);
        self
    }

    pub fn with_strict_nan(mut self) -> Self {
        self.strict_nan = true;
        self
    }

    fn margins(&self, params: &ProcessParameters) -> Vec<f64> {
        self.constraints.iter().map(|c| c(params)).collect()
    }
}

/// `((rate - 0.2) / 0.25)^2 + ((T - 130) / 70)^2` over the default bounds.
pub(crate) fn bowl(p: &ProcessParameters) -> f64 {
    ((p.rate - 0.2) / 0.25).powi(2) + ((p.die_temperature - 130.0) / 70.0).powi(2)
}

/// `rate >= 0.25`.
pub(crate) fn fast_enough(p: &ProcessParameters) -> f64 {
    0.25 - p.rate
}

impl CandidateEvaluator for ToyProblem {
    fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }

    fn penalized(&self, params: &ProcessParameters) -> PtResult<PenalizedEvaluation> {
        let params = self.bounds.clip(params);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let objective = (self.objective)(&params);
        let violations: Vec<f64> = self.margins(&params).iter().map(|m| m.max(0.0)).collect();
        let total: f64 = violations.iter().sum();
        Ok(PenalizedEvaluation {
            objective,
            penalized: objective + self.penalty_weight * total,
            violations,
        })
    }

    fn strict(&self, params: &ProcessParameters) -> PtResult<StrictEvaluation> {
        let params = self.bounds.clip(params);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let objective = if self.strict_nan {
            f64::NAN
        } else {
            (self.objective)(&params)
        };
        Ok(StrictEvaluation {
            objective,
            margins: self.margins(&params),
        })
    }

    fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}
