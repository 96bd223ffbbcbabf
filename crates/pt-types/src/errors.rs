use thiserror::Error;

/// Main error type for the pultrix system
#[derive(Error, Debug)]
pub enum PtError {
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Optimization error: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Prediction service and model bundle errors
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Model bundle not loaded: {message}")]
    ModelNotLoaded { message: String },

    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Model {model} returned {actual} values, expected {expected}")]
    ShapeMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Model {model} produced a non-finite value at index {index}")]
    NonFiniteOutput { model: String, index: usize },
}

/// Optimization scenario errors
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Invalid scenario: {message}")]
    InvalidScenario { message: String },

    #[error("Unknown objective kind: {name}")]
    UnknownObjective { name: String },
}

/// Optimizer-internal errors.
///
/// `NumericalDegradation` is recovered by the hybrid optimizer and never
/// escapes a completed run.
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("Numerical degradation in {phase} phase: {message}")]
    NumericalDegradation { phase: String, message: String },
}

/// Result type alias for pultrix operations
pub type PtResult<T> = Result<T, PtError>;

impl PtError {
    /// Shorthand for an `InvalidInput` prediction error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        PtError::Prediction(PredictionError::InvalidInput {
            field: field.into(),
            message: message.into(),
        })
    }

    /// Shorthand for an `InvalidScenario` error.
    pub fn invalid_scenario(message: impl Into<String>) -> Self {
        PtError::Scenario(ScenarioError::InvalidScenario {
            message: message.into(),
        })
    }

    /// Shorthand for a `ModelNotLoaded` error.
    pub fn model_not_loaded(message: impl Into<String>) -> Self {
        PtError::Prediction(PredictionError::ModelNotLoaded {
            message: message.into(),
        })
    }

    /// Shorthand for a `NumericalDegradation` error.
    pub fn degradation(phase: impl Into<String>, message: impl Into<String>) -> Self {
        PtError::Optimization(OptimizationError::NumericalDegradation {
            phase: phase.into(),
            message: message.into(),
        })
    }

    /// True for errors the hybrid optimizer recovers from.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            PtError::Optimization(OptimizationError::NumericalDegradation { .. })
        )
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PtError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PtError::Config(format!($($arg)*))
    };
}
