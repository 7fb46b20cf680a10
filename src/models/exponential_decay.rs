//! Exponential decay `dx/dt = -k·x`
//!
//! # Example
//!
//! ```rust
//! use physkit::models::ExponentialDecay;
//! use physkit::solver::{Scheme, StepperConfig, TimeSpan, run};
//! use physkit::diagnostics::ObservableRegistry;
//!
//! let model = ExponentialDecay::new(2.0, 1.5).unwrap();
//! let trajectory = run(
//!     &model.initial_state().unwrap(),
//!     &model.operator().unwrap(),
//!     &StepperConfig::explicit(Scheme::Rk4, 0.01),
//!     TimeSpan::new(0.0, 1.0),
//!     &ObservableRegistry::new(),
//! ).unwrap();
//!
//! let x = trajectory.final_state().unwrap().primary().real_parts()[0];
//! assert!((x - model.exact(1.0)).abs() < 1e-8);
//! ```

use crate::error::{EvolutionError, Result};
use crate::operator::MatrixOperator;
use crate::physics::{DomainDescriptor, State};

/// Single-component linear decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    /// Decay rate k \[1/time\]
    rate: f64,
    /// Initial value x₀
    initial: f64,
}

impl ExponentialDecay {
    pub fn new(rate: f64, initial: f64) -> Result<Self> {
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(EvolutionError::config(format!("decay rate must be finite and non-negative, got {rate}")));
        }
        if !initial.is_finite() {
            return Err(EvolutionError::config(format!("initial value must be finite, got {initial}")));
        }
        Ok(Self { rate, initial })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    /// `-k` as a 1×1 matrix on a lumped domain
    pub fn operator(&self) -> Result<MatrixOperator> {
        MatrixOperator::diagonal("exponential decay", DomainDescriptor::lumped(1), vec![-self.rate])
    }

    pub fn initial_state(&self) -> Result<State> {
        State::lumped(vec![self.initial])
    }

    /// `x₀·e^{-kt}`
    pub fn exact(&self, t: f64) -> f64 {
        self.initial * (-self.rate * t).exp()
    }

    /// Time for the value to halve
    pub fn half_life(&self) -> f64 {
        std::f64::consts::LN_2 / self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use approx::assert_relative_eq;

    #[test]
    fn test_operator_is_the_derivative() {
        let model = ExponentialDecay::new(3.0, 2.0).unwrap();
        let rate = model.operator().unwrap().apply(&model.initial_state().unwrap(), 0.0).unwrap();
        assert_eq!(rate.primary().real_parts(), vec![-6.0]);
    }

    #[test]
    fn test_exact_solution() {
        let model = ExponentialDecay::new(1.0, 4.0).unwrap();
        assert_relative_eq!(model.exact(model.half_life()), 2.0, epsilon = 1e-12);
        assert_eq!(model.exact(0.0), 4.0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ExponentialDecay::new(-1.0, 1.0).is_err());
        assert!(ExponentialDecay::new(f64::NAN, 1.0).is_err());
        assert!(ExponentialDecay::new(1.0, f64::INFINITY).is_err());
    }
}
