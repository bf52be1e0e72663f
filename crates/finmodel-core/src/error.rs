use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinModelError {
    /// Malformed or missing required input. Raised before any computation.
    #[error("Invalid input: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Invalid simulation, distribution or discount-rate parameters.
    #[error("Invalid configuration: {parameter}: {reason}")]
    Configuration { parameter: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FinModelError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FinModelError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        FinModelError::Configuration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, FinModelError::Validation { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, FinModelError::Configuration { .. })
    }
}

impl From<serde_json::Error> for FinModelError {
    fn from(e: serde_json::Error) -> Self {
        FinModelError::Serialization(e.to_string())
    }
}
