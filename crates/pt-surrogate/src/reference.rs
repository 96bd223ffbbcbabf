//! Closed-form reference profiles.
//!
//! The part enters the die at ambient temperature and heats toward the die
//! wall with a first-order lag in residence time. Cure follows first-order
//! Arrhenius kinetics integrated along the residence time, and the reaction
//! heat adds an exotherm bump proportional to the instantaneous cure rate.
//! The result behaves like a trained surrogate (smooth, monotone cure) and
//! is cheap enough for fixtures and smoke runs.

use serde::{Deserialize, Serialize};

use pt_types::{AxialGrid, ProfileKind, PtError, PtResult};

const KELVIN_OFFSET: f64 = 273.15;

/// Kinetic and thermal constants of the reference process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceKinetics {
    /// Resin temperature at the die entrance (°C).
    pub ambient_temperature: f64,
    /// Heat-up time constant (s).
    pub heating_time_constant_s: f64,
    /// Temperature at which `reference_rate_constant` applies (°C).
    pub reference_temperature: f64,
    /// Cure rate constant at the reference temperature (1/s).
    pub reference_rate_constant: f64,
    /// Activation energy over the gas constant (K).
    pub activation_temperature_k: f64,
    /// Exotherm temperature rise per unit cure rate (K·s).
    pub exotherm_gain_k_s: f64,
}

impl Default for ReferenceKinetics {
    fn default() -> Self {
        Self {
            ambient_temperature: 25.0,
            heating_time_constant_s: 40.0,
            reference_temperature: 120.0,
            reference_rate_constant: 0.018,
            activation_temperature_k: 10_700.0,
            exotherm_gain_k_s: 2_500.0,
        }
    }
}

impl ReferenceKinetics {
    fn rate_constant(&self, temperature: f64) -> f64 {
        let inv_t = 1.0 / (temperature + KELVIN_OFFSET);
        let inv_ref = 1.0 / (self.reference_temperature + KELVIN_OFFSET);
        self.reference_rate_constant * (-self.activation_temperature_k * (inv_t - inv_ref)).exp()
    }
}

/// Reference model emitting either the cure or the temperature profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfileModel {
    pub target: ProfileKind,
    pub axial_positions_mm: Vec<f64>,
    #[serde(default)]
    pub kinetics: ReferenceKinetics,
}

impl ReferenceProfileModel {
    pub fn new(target: ProfileKind, axial_positions_mm: Vec<f64>) -> Self {
        Self {
            target,
            axial_positions_mm,
            kinetics: ReferenceKinetics::default(),
        }
    }

    /// Reference model on the default 201-point grid.
    pub fn with_default_grid(target: ProfileKind) -> Self {
        Self::new(target, AxialGrid::default_grid())
    }

    pub fn output_len(&self) -> usize {
        self.axial_positions_mm.len()
    }

    pub(crate) fn validate(&self) -> PtResult<()> {
        AxialGrid::validate(&self.axial_positions_mm)?;
        let k = &self.kinetics;
        if k.heating_time_constant_s <= 0.0 || k.reference_rate_constant <= 0.0 {
            return Err(PtError::Validation(
                "reference kinetics need positive time and rate constants".to_string(),
            ));
        }
        Ok(())
    }

    /// Cure and temperature profiles for one setting.
    pub fn profiles(&self, rate: f64, die_temperature: f64) -> PtResult<(Vec<f64>, Vec<f64>)> {
        if rate <= 0.0 {
            return Err(PtError::invalid_input(
                "rate",
                format!("reference model needs a positive rate, got {rate}"),
            ));
        }
        let k = &self.kinetics;
        let n = self.axial_positions_mm.len();
        let mut cure = Vec::with_capacity(n);
        let mut temperature = Vec::with_capacity(n);

        let mut integral = 0.0;
        let mut previous: Option<(f64, f64)> = None;
        for &x in &self.axial_positions_mm {
            // residence time in s: x [mm] / (rate [m/min] * 1000/60)
            let t = 60.0 * x / (1000.0 * rate);
            let heat = k.ambient_temperature
                + (die_temperature - k.ambient_temperature)
                    * (1.0 - (-t / k.heating_time_constant_s).exp());
            let rate_constant = k.rate_constant(heat);
            if let Some((t_prev, k_prev)) = previous {
                integral += 0.5 * (rate_constant + k_prev) * (t - t_prev);
            }
            previous = Some((t, rate_constant));

            let alpha = 1.0 - (-integral).exp();
            cure.push(alpha);
            temperature.push(heat + k.exotherm_gain_k_s * rate_constant * (1.0 - alpha));
        }
        Ok((cure, temperature))
    }

    pub fn predict(&self, rate: f64, die_temperature: f64) -> PtResult<Vec<f64>> {
        let (cure, temperature) = self.profiles(rate, die_temperature)?;
        Ok(match self.target {
            ProfileKind::Cure => cure,
            ProfileKind::Temperature => temperature,
        })
    }
}
