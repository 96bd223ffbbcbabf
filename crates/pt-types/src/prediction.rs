//! Prediction results and the scalar metrics derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::process::ProcessParameters;
use crate::profile::SpatialProfile;

/// Cure thresholds used when scanning a cure profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricThresholds {
    /// Cure degree above which curing is considered started.
    pub cure_onset: f64,
    /// Cure degree above which the part is considered fully cured.
    pub full_cure: f64,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            cure_onset: 0.01,
            full_cure: 0.995,
        }
    }
}

/// Scalar metrics computed from the predicted profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Cure degree at the die exit.
    pub final_cure: f64,
    /// Maximum temperature anywhere along the profile (°C).
    pub peak_temperature: f64,
    /// Axial position of the temperature peak (mm).
    pub peak_temperature_position_mm: f64,
    /// First position where curing starts, if it does.
    pub cure_onset_position_mm: Option<f64>,
    /// First position where the part is fully cured, if it is.
    pub full_cure_position_mm: Option<f64>,
    /// Line throughput in m/h.
    pub throughput_m_per_h: f64,
}

impl DerivedMetrics {
    /// Flatten into a name → value map. Positions that were never reached
    /// are left out.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("final_cure".to_string(), self.final_cure);
        map.insert("peak_temperature".to_string(), self.peak_temperature);
        map.insert(
            "peak_temperature_position_mm".to_string(),
            self.peak_temperature_position_mm,
        );
        if let Some(pos) = self.cure_onset_position_mm {
            map.insert("cure_onset_position_mm".to_string(), pos);
        }
        if let Some(pos) = self.full_cure_position_mm {
            map.insert("full_cure_position_mm".to_string(), pos);
        }
        map.insert("throughput_m_per_h".to_string(), self.throughput_m_per_h);
        map
    }
}

/// Full output of one surrogate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub parameters: ProcessParameters,
    pub cure_profile: SpatialProfile,
    pub temperature_profile: SpatialProfile,
    pub metrics: DerivedMetrics,
    /// Parameters fell outside the surrogate's trained domain.
    pub extrapolated: bool,
}
