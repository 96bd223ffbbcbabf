//! Optimization run output and diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prediction::DerivedMetrics;
use crate::process::ProcessParameters;
use crate::scenario::ObjectiveKind;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// Search phase that produced a trace point or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Global,
    Local,
}

/// One entry of the convergence trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Iteration number, counted across both phases.
    pub iteration: usize,
    pub phase: Phase,
    /// Best penalized objective (objective plus weighted total violation)
    /// seen so far in the run. Never increases along the trace.
    pub best_objective: f64,
}

/// Where the returned parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Local refinement improved on the global candidate.
    LocalRefinement,
    /// Best feasible global candidate (refinement skipped, failed or did not improve).
    GlobalSearch,
    /// No feasible candidate anywhere; least-violating candidate.
    LeastViolating,
}

/// Summary of the global phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub enabled: bool,
    pub generations: usize,
    pub evaluations: usize,
    /// Population spread fell below tolerance.
    pub converged: bool,
    /// Stopped by the wall-clock limit.
    pub timed_out: bool,
    pub best_penalized_objective: Option<f64>,
}

/// How the local phase ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocalStatus {
    /// Disabled by configuration.
    Skipped,
    /// Step or KKT tolerance reached.
    Converged,
    /// Hit the iteration cap.
    MaxIterations,
    /// Recovered numerical failure.
    Degraded { message: String },
}

/// Summary of the local phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSummary {
    pub status: LocalStatus,
    pub iterations: usize,
    pub evaluations: usize,
    /// Refined candidate replaced the global one.
    pub accepted: bool,
}

impl Default for LocalSummary {
    fn default() -> Self {
        Self {
            status: LocalStatus::Skipped,
            iterations: 0,
            evaluations: 0,
            accepted: false,
        }
    }
}

/// Final output of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: RunId,
    pub objective: ObjectiveKind,
    pub best_parameters: ProcessParameters,
    pub best_objective_value: f64,
    pub feasible: bool,
    /// Non-negative violation per scenario constraint.
    pub violations: Vec<f64>,
    /// Signed margin per scenario constraint (<= 0 satisfied).
    pub margins: Vec<f64>,
    pub best_metrics: DerivedMetrics,
    pub source: ResultSource,
    pub convergence_trace: Vec<TracePoint>,
    pub global: GlobalSummary,
    pub local: LocalSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub wall_clock_seconds: f64,
}

impl OptimizationResult {
    pub fn total_violation(&self) -> f64 {
        self.violations.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_result() -> OptimizationResult {
        let now = Utc::now();
        OptimizationResult {
            run_id: Uuid::new_v4(),
            objective: ObjectiveKind::MinTemperature,
            best_parameters: ProcessParameters::new(0.11, 114.0),
            best_objective_value: 121.5,
            feasible: true,
            violations: vec![0.0, 0.0],
            margins: vec![-1e-6, -40.0],
            best_metrics: DerivedMetrics {
                final_cure: 0.99,
                peak_temperature: 121.5,
                peak_temperature_position_mm: 600.0,
                cure_onset_position_mm: Some(80.0),
                full_cure_position_mm: None,
                throughput_m_per_h: 6.6,
            },
            source: ResultSource::LocalRefinement,
            convergence_trace: vec![
                TracePoint {
                    iteration: 0,
                    phase: Phase::Global,
                    best_objective: 130.0,
                },
                TracePoint {
                    iteration: 1,
                    phase: Phase::Global,
                    best_objective: 123.0,
                },
                TracePoint {
                    iteration: 2,
                    phase: Phase::Local,
                    best_objective: 121.5,
                },
            ],
            global: GlobalSummary::default(),
            local: LocalSummary::default(),
            started_at: now,
            finished_at: now,
            wall_clock_seconds: 0.5,
        }
    }

    #[test]
    fn total_violation_sums_constraints() {
        let mut result = sample_result();
        assert_eq!(result.total_violation(), 0.0);
        result.violations = vec![0.25, 1.5];
        assert_relative_eq!(result.total_violation(), 1.75);
    }

    #[test]
    fn result_serializes_to_json() {
        let result = sample_result();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"source\":\"local_refinement\""));
        assert!(json.contains("\"status\":\"skipped\""));
        let back: OptimizationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
