//! Prediction service: profiles and derived metrics for one process setting.

use std::sync::Arc;
use tracing::debug;

use pt_types::{
    DerivedMetrics, MetricThresholds, PredictionError, PredictionResult, ProcessParameters,
    PtResult, SpatialProfile,
};

use crate::bundle::ModelBundle;
use crate::model::RegressionModel;

/// Stateless front end over a shared [`ModelBundle`].
///
/// Inputs outside the trained domain are evaluated and flagged as
/// extrapolation; clamping inputs is the caller's policy.
#[derive(Debug, Clone)]
pub struct PredictionService {
    bundle: Arc<ModelBundle>,
    thresholds: MetricThresholds,
}

impl PredictionService {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self {
            bundle,
            thresholds: MetricThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MetricThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &MetricThresholds {
        &self.thresholds
    }

    /// Predict from a raw `[rate, die_temperature]` vector.
    pub fn predict_values(&self, values: &[f64]) -> PtResult<PredictionResult> {
        self.predict(ProcessParameters::from_slice(values)?)
    }

    /// Predict cure and temperature profiles plus derived metrics.
    pub fn predict(&self, params: ProcessParameters) -> PtResult<PredictionResult> {
        params.ensure_finite()?;

        let extrapolated = !self.bundle.trained_domain().contains(&params);
        if extrapolated {
            debug!(%params, "Prediction outside the trained domain");
        }

        let grid = self.bundle.axial_positions_mm();
        let mut cure = run_model(self.bundle.cure_model(), &params, grid.len())?;
        for value in &mut cure {
            *value = value.clamp(0.0, 1.0);
        }
        let temperature = run_model(self.bundle.temperature_model(), &params, grid.len())?;

        let cure_profile = SpatialProfile::new(grid.to_vec(), cure)?;
        let temperature_profile = SpatialProfile::new(grid.to_vec(), temperature)?;
        let metrics = derive_metrics(
            &cure_profile,
            &temperature_profile,
            params.rate,
            &self.thresholds,
        );

        Ok(PredictionResult {
            parameters: params,
            cure_profile,
            temperature_profile,
            metrics,
            extrapolated,
        })
    }
}

fn run_model(
    model: &dyn RegressionModel,
    params: &ProcessParameters,
    expected: usize,
) -> PtResult<Vec<f64>> {
    let values = model.predict(params.rate, params.die_temperature)?;
    if values.len() != expected {
        return Err(PredictionError::ShapeMismatch {
            model: model.name().to_string(),
            expected,
            actual: values.len(),
        }
        .into());
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(PredictionError::NonFiniteOutput {
            model: model.name().to_string(),
            index,
        }
        .into());
    }
    Ok(values)
}

/// Scan the profiles for the scalar metrics.
pub fn derive_metrics(
    cure: &SpatialProfile,
    temperature: &SpatialProfile,
    rate: f64,
    thresholds: &MetricThresholds,
) -> DerivedMetrics {
    let (peak_temperature_position_mm, peak_temperature) =
        temperature.max().unwrap_or((0.0, f64::NAN));
    DerivedMetrics {
        final_cure: cure.last().unwrap_or(0.0),
        peak_temperature,
        peak_temperature_position_mm,
        cure_onset_position_mm: cure.first_position_exceeding(thresholds.cure_onset),
        full_cure_position_mm: cure.first_position_exceeding(thresholds.full_cure),
        throughput_m_per_h: rate * 60.0,
    }
}
