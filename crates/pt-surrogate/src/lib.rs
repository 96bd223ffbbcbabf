//! # pt-surrogate
//!
//! Surrogate regression models standing in for the finite-element pultrusion
//! simulation, and the prediction service the optimizer calls into.
//!
//! Provides serialized model artifacts (polynomial, MLP and closed-form
//! reference profiles), the model bundle loader, and the [`PredictionService`]
//! that turns a process setting into cure and temperature profiles plus
//! derived metrics.

mod bundle;
mod model;
mod reference;
mod service;

pub use bundle::{ModelBundle, ModelFile, CURE_MODEL_FILE, TEMPERATURE_MODEL_FILE};
pub use model::{
    Activation, DenseLayer, MlpRegressor, ModelArtifact, PolynomialRegressor, RegressionModel,
    StandardScaler,
};
pub use reference::{ReferenceKinetics, ReferenceProfileModel};
pub use service::PredictionService;
