//! Error taxonomy shared by every engine operation

use thiserror::Error;

/// Errors raised by the forecast, amortization and repayment engines
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required related record is absent (plant, rate table, bill, ...)
    #[error("missing {kind}: {detail}")]
    MissingDependency { kind: &'static str, detail: String },

    /// Malformed or out-of-range numeric input
    #[error("invalid {field}: {reason}")]
    ValidationFailure { field: String, reason: String },

    /// Division by a meter with zero measured consumption
    #[error("meter {meter} has zero consumption but a value of {value:.2}")]
    ArithmeticAmbiguity { meter: u8, value: f64 },

    /// Document rendering or notification failed
    #[error("{stage} failed: {reason}")]
    DownstreamFailure { stage: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn missing(kind: &'static str, detail: impl Into<String>) -> Self {
        EngineError::MissingDependency { kind, detail: detail.into() }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::ValidationFailure { field: field.into(), reason: reason.into() }
    }

    pub fn downstream(stage: &'static str, reason: impl Into<String>) -> Self {
        EngineError::DownstreamFailure { stage, reason: reason.into() }
    }

    /// Whether a batch should keep the record pending for the next run
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::DownstreamFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EngineError::missing("plant", "id 7");
        assert_eq!(err.to_string(), "missing plant: id 7");

        let err = EngineError::ArithmeticAmbiguity { meter: 2, value: 120.0 };
        assert_eq!(err.to_string(), "meter 2 has zero consumption but a value of 120.00");
    }

    #[test]
    fn test_only_downstream_is_retryable() {
        assert!(EngineError::downstream("notification", "smtp down").is_retryable());
        assert!(!EngineError::invalid("amount", "negative").is_retryable());
        assert!(!EngineError::missing("plant", "id 1").is_retryable());
    }
}
