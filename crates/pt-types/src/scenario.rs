//! Optimization scenario definitions: objective choice and constraint set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{PtError, PtResult, ScenarioError};
use crate::process::{Parameter, ParameterBounds};

/// What the optimizer minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Minimize the peak part temperature.
    MinTemperature,
    /// Maximize the pulling rate (minimizes `-rate`).
    MaxRate,
    /// Minimize the energy proxy `die_temperature / rate`.
    MinEnergy,
}

impl ObjectiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinTemperature => "min_temperature",
            Self::MaxRate => "max_rate",
            Self::MinEnergy => "min_energy",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectiveKind {
    type Err = PtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "min_temperature" | "temperature" => Ok(Self::MinTemperature),
            "max_rate" | "rate" => Ok(Self::MaxRate),
            "min_energy" | "energy" => Ok(Self::MinEnergy),
            _ => Err(ScenarioError::UnknownObjective {
                name: s.to_string(),
            }
            .into()),
        }
    }
}

/// One inequality the optimum has to satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep a parameter inside `[min, max]`.
    Bound {
        parameter: Parameter,
        min: f64,
        max: f64,
    },
    /// Final cure must reach the scenario's target cure degree.
    CureThreshold,
    /// Peak temperature must not exceed `max_temperature` (°C).
    TemperatureCeiling { max_temperature: f64 },
    /// Full cure must be reached at or before `position_mm`.
    FullCureBefore { position_mm: f64 },
}

impl Constraint {
    fn validate(&self) -> PtResult<()> {
        match self {
            Self::Bound {
                parameter,
                min,
                max,
            } => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(PtError::invalid_scenario(format!(
                        "bound on {parameter} must be finite with min <= max, got [{min}, {max}]"
                    )));
                }
            }
            Self::CureThreshold => {}
            Self::TemperatureCeiling { max_temperature } => {
                if !max_temperature.is_finite() {
                    return Err(PtError::invalid_scenario(
                        "temperature ceiling must be finite",
                    ));
                }
            }
            Self::FullCureBefore { position_mm } => {
                if !position_mm.is_finite() || *position_mm < 0.0 {
                    return Err(PtError::invalid_scenario(format!(
                        "full cure position must be finite and non-negative, got {position_mm}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A single optimization request. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationScenario {
    pub objective: ObjectiveKind,
    #[serde(default)]
    pub target_cure_degree: Option<f64>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Search domain.
    #[serde(default)]
    pub bounds: ParameterBounds,
}

impl OptimizationScenario {
    pub fn new(objective: ObjectiveKind) -> Self {
        Self {
            objective,
            target_cure_degree: None,
            constraints: Vec::new(),
            bounds: ParameterBounds::default(),
        }
    }

    pub fn with_bounds(mut self, bounds: ParameterBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_target_cure(mut self, target: f64) -> Self {
        self.target_cure_degree = Some(target);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Objective plus a cure target enforced through `CureThreshold`.
    pub fn cured(objective: ObjectiveKind, bounds: ParameterBounds, target: f64) -> Self {
        Self::new(objective)
            .with_bounds(bounds)
            .with_target_cure(target)
            .with_constraint(Constraint::CureThreshold)
    }

    pub fn has_cure_constraint(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::CureThreshold))
    }

    /// Reject ill-formed or ambiguous requests before any search starts.
    pub fn validate(&self) -> PtResult<()> {
        self.bounds
            .validate()
            .map_err(|e| PtError::invalid_scenario(e.to_string()))?;
        if self.bounds.rate.min <= 0.0 {
            return Err(PtError::invalid_scenario(format!(
                "rate bounds must be positive, got [{}, {}]",
                self.bounds.rate.min, self.bounds.rate.max
            )));
        }

        if let Some(target) = self.target_cure_degree {
            if !target.is_finite() || target <= 0.0 || target > 1.0 {
                return Err(PtError::invalid_scenario(format!(
                    "target cure degree must lie in (0, 1], got {target}"
                )));
            }
            if !self.has_cure_constraint() {
                return Err(PtError::invalid_scenario(
                    "target cure degree given without a cure_threshold constraint",
                ));
            }
        } else if self.has_cure_constraint() {
            return Err(PtError::invalid_scenario(
                "cure_threshold constraint requires a target cure degree",
            ));
        }

        for constraint in &self.constraints {
            constraint.validate()?;
        }
        Ok(())
    }
}
