//! Controllable process inputs and their search bounds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{PtError, PtResult};

/// Number of controllable process inputs.
pub const PARAMETER_COUNT: usize = 2;

/// Names one of the controllable process inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Pulling speed in m/min.
    Rate,
    /// Die wall temperature in °C.
    DieTemperature,
}

impl Parameter {
    pub const ALL: [Parameter; PARAMETER_COUNT] = [Parameter::Rate, Parameter::DieTemperature];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::DieTemperature => "die_temperature",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A candidate process setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessParameters {
    /// Pulling speed in m/min.
    pub rate: f64,
    /// Die temperature in °C.
    pub die_temperature: f64,
}

impl ProcessParameters {
    pub fn new(rate: f64, die_temperature: f64) -> Self {
        Self {
            rate,
            die_temperature,
        }
    }

    /// Build from a raw vector in `[rate, die_temperature]` order.
    pub fn from_slice(values: &[f64]) -> PtResult<Self> {
        if values.len() != PARAMETER_COUNT {
            return Err(PtError::invalid_input(
                "parameters",
                format!(
                    "expected {PARAMETER_COUNT} values (rate, die_temperature), got {}",
                    values.len()
                ),
            ));
        }
        let params = Self::new(values[0], values[1]);
        params.ensure_finite()?;
        Ok(params)
    }

    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Rate => self.rate,
            Parameter::DieTemperature => self.die_temperature,
        }
    }

    /// Reject NaN or infinite values, naming the offending field.
    pub fn ensure_finite(&self) -> PtResult<()> {
        for parameter in Parameter::ALL {
            let value = self.get(parameter);
            if !value.is_finite() {
                return Err(PtError::invalid_input(
                    parameter.name(),
                    format!("value must be finite, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ProcessParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate={:.4} m/min, die_temperature={:.2} °C",
            self.rate, self.die_temperature
        )
    }
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Signed distance to the interval: positive outside, negative inside.
    pub fn signed_distance(&self, value: f64) -> f64 {
        (self.min - value).max(value - self.max)
    }

    fn validate(&self, name: &str) -> PtResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(PtError::Validation(format!(
                "{name} bounds must be finite, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(PtError::Validation(format!(
                "{name} bounds must satisfy min < max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Box bounds on the two-dimensional parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    /// Rate bounds in m/min.
    pub rate: Range,
    /// Die temperature bounds in °C.
    pub die_temperature: Range,
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            rate: Range::new(0.05, 0.30),
            die_temperature: Range::new(90.0, 160.0),
        }
    }
}

impl ParameterBounds {
    pub fn new(rate: (f64, f64), die_temperature: (f64, f64)) -> Self {
        Self {
            rate: Range::new(rate.0, rate.1),
            die_temperature: Range::new(die_temperature.0, die_temperature.1),
        }
    }

    pub fn validate(&self) -> PtResult<()> {
        self.rate.validate("rate")?;
        self.die_temperature.validate("die_temperature")
    }

    pub fn contains(&self, params: &ProcessParameters) -> bool {
        self.rate.contains(params.rate) && self.die_temperature.contains(params.die_temperature)
    }

    pub fn clip(&self, params: &ProcessParameters) -> ProcessParameters {
        ProcessParameters::new(
            self.rate.clip(params.rate),
            self.die_temperature.clip(params.die_temperature),
        )
    }

    pub fn center(&self) -> ProcessParameters {
        ProcessParameters::new(
            0.5 * (self.rate.min + self.rate.max),
            0.5 * (self.die_temperature.min + self.die_temperature.max),
        )
    }

    /// Map into the unit square.
    pub fn normalize(&self, params: &ProcessParameters) -> [f64; PARAMETER_COUNT] {
        [
            (params.rate - self.rate.min) / self.rate.width(),
            (params.die_temperature - self.die_temperature.min) / self.die_temperature.width(),
        ]
    }

    /// Inverse of [`normalize`](Self::normalize).
    pub fn denormalize(&self, unit: &[f64; PARAMETER_COUNT]) -> ProcessParameters {
        ProcessParameters::new(
            self.rate.min + unit[0] * self.rate.width(),
            self.die_temperature.min + unit[1] * self.die_temperature.width(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_slice_checks_arity_and_finiteness() {
        let ok = ProcessParameters::from_slice(&[0.15, 120.0]).unwrap();
        assert_eq!(ok, ProcessParameters::new(0.15, 120.0));

        let err = ProcessParameters::from_slice(&[0.15]).unwrap_err();
        assert!(err.to_string().contains("parameters"));

        let err = ProcessParameters::from_slice(&[0.15, f64::NAN]).unwrap_err();
        assert!(err.to_string().contains("die_temperature"));
    }

    #[test]
    fn clip_and_contains() {
        let bounds = ParameterBounds::new((0.11, 0.21), (110.0, 140.0));
        let outside = ProcessParameters::new(0.5, 100.0);
        assert!(!bounds.contains(&outside));

        let clipped = bounds.clip(&outside);
        assert_eq!(clipped, ProcessParameters::new(0.21, 110.0));
        assert!(bounds.contains(&clipped));
    }

    #[test]
    fn normalize_round_trip_hits_corners() {
        let bounds = ParameterBounds::default();
        let unit = bounds.normalize(&ProcessParameters::new(0.30, 90.0));
        assert_relative_eq!(unit[0], 1.0);
        assert_relative_eq!(unit[1], 0.0);

        let center = bounds.denormalize(&[0.5, 0.5]);
        assert_relative_eq!(center.rate, bounds.center().rate);
        assert_relative_eq!(center.die_temperature, 125.0);
    }

    #[test]
    fn signed_distance_is_negative_inside() {
        let range = Range::new(110.0, 140.0);
        assert_relative_eq!(range.signed_distance(120.0), -10.0);
        assert_eq!(range.signed_distance(140.0), 0.0);
        assert_relative_eq!(range.signed_distance(105.0), 5.0);
        assert_relative_eq!(range.signed_distance(142.5), 2.5);
    }

    #[test]
    fn invalid_bounds_rejected() {
        let bounds = ParameterBounds::new((0.2, 0.1), (110.0, 140.0));
        assert!(bounds.validate().is_err());

        let bounds = ParameterBounds::new((0.1, 0.2), (110.0, f64::INFINITY));
        assert!(bounds.validate().is_err());
    }
}
