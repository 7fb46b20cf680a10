//! Error taxonomy for the evolution engine
//!
//! Errors fall in two groups:
//!
//! - **Construction errors** (`ShapeMismatch`, `DiscretizationError`,
//!   `UnsupportedValueKind`, `MissingField`, `NotLinear`, `InvalidConfiguration`)
//!   are raised eagerly, before any time step is taken.
//! - **Runtime errors** (`ConvergenceFailure`, `StepSizeUnderflow`, `Diverged`)
//!   end a run and are attached to the trajectory as its terminal status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::physics::ValueKind;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EvolutionError>;

/// Every failure the engine can report
///
/// Serializable: a persisted trajectory carries its terminal error.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum EvolutionError {
    /// Operator and state (or two states) live on incompatible domains or layouts
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid backend / boundary combination, or a domain too small for its stencil
    #[error("discretization error: {0}")]
    DiscretizationError(String),

    /// Real/complex mismatch between a state and the scheme or operator consuming it
    #[error("{context} does not support {kind} values")]
    UnsupportedValueKind { kind: ValueKind, context: String },

    /// An implicit solve used up its iteration budget without meeting tolerance
    #[error("implicit solve did not converge after {iterations} iterations (residual {residual:e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Adaptive control asked for a step smaller than the configured floor
    #[error("step size {step:e} fell below the minimum {minimum:e} at t = {time}")]
    StepSizeUnderflow { step: f64, minimum: f64, time: f64 },

    /// Non-finite values appeared in the state
    #[error("non-finite values in field '{field}' at t = {time} (step {step})")]
    Diverged { field: String, time: f64, step: usize },

    /// A matrix was requested from an operator that is not linear
    #[error("operator '{0}' is not linear and has no matrix representation")]
    NotLinear(String),

    /// A scheme or observable needs a field the state does not carry
    #[error("{context} requires field '{field}'")]
    MissingField { field: String, context: String },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Illegal run state machine transition
    #[error("illegal run status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Failure inside an observable evaluation
    #[error("observable '{name}': {reason}")]
    Observable { name: String, reason: String },

    /// Filesystem failure while persisting a trajectory
    #[error("I/O error: {0}")]
    Io(String),

    /// (De)serialization failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EvolutionError {
    /// Errors that can only happen while stepping
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            EvolutionError::ConvergenceFailure { .. }
                | EvolutionError::StepSizeUnderflow { .. }
                | EvolutionError::Diverged { .. }
        )
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        EvolutionError::ShapeMismatch(message.into())
    }

    pub(crate) fn discretization(message: impl Into<String>) -> Self {
        EvolutionError::DiscretizationError(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        EvolutionError::InvalidConfiguration(message.into())
    }

    pub(crate) fn unsupported(kind: ValueKind, context: impl Into<String>) -> Self {
        EvolutionError::UnsupportedValueKind { kind, context: context.into() }
    }
}

impl From<std::io::Error> for EvolutionError {
    fn from(error: std::io::Error) -> Self {
        EvolutionError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for EvolutionError {
    fn from(error: serde_json::Error) -> Self {
        EvolutionError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_classification() {
        assert!(EvolutionError::ConvergenceFailure { iterations: 3, residual: 1.0 }.is_runtime());
        assert!(EvolutionError::StepSizeUnderflow { step: 1e-14, minimum: 1e-12, time: 0.5 }.is_runtime());
        assert!(EvolutionError::Diverged { field: "value".into(), time: 0.1, step: 1 }.is_runtime());

        assert!(!EvolutionError::shape("x").is_runtime());
        assert!(!EvolutionError::discretization("x").is_runtime());
        assert!(!EvolutionError::unsupported(ValueKind::Complex, "leapfrog").is_runtime());
    }

    #[test]
    fn test_messages() {
        let error = EvolutionError::unsupported(ValueKind::Complex, "Leapfrog");
        assert_eq!(error.to_string(), "Leapfrog does not support complex values");

        let error = EvolutionError::NotLinear("burgers".into());
        assert!(error.to_string().contains("burgers"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: EvolutionError = io.into();
        assert!(matches!(error, EvolutionError::Io(_)));
    }
}
