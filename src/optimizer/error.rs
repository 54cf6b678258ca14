use std::time::Duration;
use thiserror::Error;

/// Failures of one optimization run. Nothing is persisted when a run fails.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptimizationError {
    /// Inputs rejected before the model is built.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String, retryable: bool },

    /// The solver reported the model infeasible or unbounded.
    #[error("model is infeasible: {0}")]
    InfeasibleModel(String),

    /// The solve did not finish within the time budget.
    #[error("solver timed out after {0:?}")]
    SolverTimeout(Duration),

    /// Any other solver or runtime failure.
    #[error("solver failed: {0}")]
    Solver(String),
}

impl OptimizationError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Missing load forecast; the next trigger may have it.
    pub fn no_load_data() -> Self {
        Self::InvalidInput {
            reason: "no load data".to_string(),
            retryable: true,
        }
    }

    /// Whether re-triggering the run later can succeed without changing inputs.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidInput { retryable, .. } => *retryable,
            Self::SolverTimeout(_) => true,
            Self::InfeasibleModel(_) | Self::Solver(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OptimizationError::no_load_data().is_retryable());
        assert!(OptimizationError::SolverTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!OptimizationError::invalid("p_max").is_retryable());
        assert!(!OptimizationError::InfeasibleModel("x".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            OptimizationError::no_load_data().to_string(),
            "invalid input: no load data"
        );
    }
}
