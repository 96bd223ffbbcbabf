//! Regression model trait and serialized artifact formats.

use serde::{Deserialize, Serialize};

use pt_types::{PtError, PtResult, PARAMETER_COUNT};

use crate::reference::ReferenceProfileModel;

/// A fitted regression mapping `(rate, die_temperature)` to profile values on
/// a fixed axial grid.
pub trait RegressionModel: Send + Sync {
    /// Human-readable model name used in error messages.
    fn name(&self) -> &str;

    /// Number of values returned by [`predict`](Self::predict).
    fn output_len(&self) -> usize;

    /// Evaluate the model. Must be deterministic.
    fn predict(&self, rate: f64, die_temperature: f64) -> PtResult<Vec<f64>>;
}

/// Per-feature standardization `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| v * s + m)
            .collect()
    }

    fn validate(&self, what: &str, expected_len: usize) -> PtResult<()> {
        if self.mean.len() != expected_len || self.scale.len() != expected_len {
            return Err(PtError::Validation(format!(
                "{what} scaler expects {expected_len} entries, has mean {} / scale {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0)
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err(PtError::Validation(format!(
                "{what} scaler has zero or non-finite entries"
            )));
        }
        Ok(())
    }
}

/// Polynomial-feature linear regression with multiple outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialRegressor {
    pub degree: u32,
    pub input_scaler: StandardScaler,
    /// `coefficients[output][feature]`, features ordered by total degree.
    pub coefficients: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl PolynomialRegressor {
    /// Number of monomials of total degree `<= degree` in two variables.
    pub fn feature_count(degree: u32) -> usize {
        let d = degree as usize;
        (d + 1) * (d + 2) / 2
    }

    /// Expand scaled inputs into `1, x0, x1, x0², x0·x1, x1², ...`.
    pub fn features(&self, scaled: &[f64]) -> Vec<f64> {
        let (x0, x1) = (scaled[0], scaled[1]);
        let mut features = Vec::with_capacity(Self::feature_count(self.degree));
        for total in 0..=self.degree as i32 {
            for p0 in (0..=total).rev() {
                features.push(x0.powi(p0) * x1.powi(total - p0));
            }
        }
        features
    }

    fn validate(&self) -> PtResult<()> {
        self.input_scaler.validate("polynomial input", PARAMETER_COUNT)?;
        let n_features = Self::feature_count(self.degree);
        if self.coefficients.len() != self.intercept.len() {
            return Err(PtError::Validation(format!(
                "polynomial model has {} coefficient rows but {} intercepts",
                self.coefficients.len(),
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coefficients.iter().position(|r| r.len() != n_features) {
            return Err(PtError::Validation(format!(
                "polynomial coefficient row {row} should have {n_features} entries for degree {}",
                self.degree
            )));
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64]) -> Vec<f64> {
        let features = self.features(&self.input_scaler.transform(inputs));
        self.coefficients
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| b + row.iter().zip(&features).map(|(c, f)| c * f).sum::<f64>())
            .collect()
    }
}

/// Hidden-layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Logistic,
    Identity,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Tanh => x.tanh(),
            Self::Logistic => 1.0 / (1.0 + (-x).exp()),
            Self::Identity => x,
        }
    }
}

/// Fully connected layer, `weights[out][in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, b)| b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }
}

/// Feed-forward network regressor with identity output layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpRegressor {
    pub activation: Activation,
    pub input_scaler: StandardScaler,
    pub layers: Vec<DenseLayer>,
    /// Undo target standardization applied during training.
    #[serde(default)]
    pub output_scaler: Option<StandardScaler>,
}

impl MlpRegressor {
    fn output_len(&self) -> usize {
        self.layers.last().map(|l| l.biases.len()).unwrap_or(0)
    }

    fn validate(&self) -> PtResult<()> {
        self.input_scaler.validate("mlp input", PARAMETER_COUNT)?;
        if self.layers.is_empty() {
            return Err(PtError::Validation("mlp model has no layers".to_string()));
        }
        let mut width = PARAMETER_COUNT;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() {
                return Err(PtError::Validation(format!(
                    "mlp layer {idx} has {} weight rows but {} biases",
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(PtError::Validation(format!(
                    "mlp layer {idx} expects {width} inputs"
                )));
            }
            width = layer.biases.len();
        }
        if let Some(scaler) = &self.output_scaler {
            scaler.validate("mlp output", width)?;
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64]) -> Vec<f64> {
        let mut activations = self.input_scaler.transform(inputs);
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if idx < last {
                for a in &mut activations {
                    *a = self.activation.apply(*a);
                }
            }
        }
        match &self.output_scaler {
            Some(scaler) => scaler.inverse_transform(&activations),
            None => activations,
        }
    }
}

/// Serialized regression state, tagged by model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelArtifact {
    Polynomial(PolynomialRegressor),
    Mlp(MlpRegressor),
    Reference(ReferenceProfileModel),
}

impl ModelArtifact {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Polynomial(_) => "polynomial",
            Self::Mlp(_) => "mlp",
            Self::Reference(_) => "reference",
        }
    }

    /// Check internal shape consistency.
    pub fn validate(&self) -> PtResult<()> {
        match self {
            Self::Polynomial(m) => m.validate(),
            Self::Mlp(m) => m.validate(),
            Self::Reference(m) => m.validate(),
        }
    }
}

impl RegressionModel for ModelArtifact {
    fn name(&self) -> &str {
        self.family()
    }

    fn output_len(&self) -> usize {
        match self {
            Self::Polynomial(m) => m.intercept.len(),
            Self::Mlp(m) => m.output_len(),
            Self::Reference(m) => m.output_len(),
        }
    }

    fn predict(&self, rate: f64, die_temperature: f64) -> PtResult<Vec<f64>> {
        let inputs = [rate, die_temperature];
        match self {
            Self::Polynomial(m) => Ok(m.evaluate(&inputs)),
            Self::Mlp(m) => Ok(m.evaluate(&inputs)),
            Self::Reference(m) => m.predict(rate, die_temperature),
        }
    }
}
