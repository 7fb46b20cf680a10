//! Harmonic oscillator in phase space
//!
//! ```text
//! dq/dt =  p / m
//! dp/dt = -k · q
//! ```
//!
//! The state carries a `Position` and a `Momentum` field on a lumped domain
//! of one point, which is the layout the symplectic schemes expect.

use nalgebra::DMatrix;

use crate::diagnostics::{ObservableValue, oscillator_energy};
use crate::error::{EvolutionError, Result};
use crate::operator::{MatrixOperator, OperatorMatrix};
use crate::physics::{DomainDescriptor, Field, FieldData, State};

/// Mass on a linear spring
///
/// # Example
///
/// ```rust
/// use physkit::models::HarmonicOscillator;
/// use physkit::solver::{Leapfrog, Stepper};
///
/// let oscillator = HarmonicOscillator::new(1.0, 4.0).unwrap();
/// let op = oscillator.operator().unwrap();
/// let mut state = oscillator.initial_state(1.0, 0.0).unwrap();
/// let e0 = oscillator.energy(&state).unwrap();
///
/// for k in 0..1000 {
///     state = Leapfrog.advance(&state, &op, k as f64 * 0.01, 0.01).unwrap();
/// }
/// let drift = (oscillator.energy(&state).unwrap() - e0).abs() / e0;
/// assert!(drift < 1e-3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicOscillator {
    mass: f64,
    stiffness: f64,
}

impl HarmonicOscillator {
    pub fn new(mass: f64, stiffness: f64) -> Result<Self> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(EvolutionError::config(format!("mass must be positive, got {mass}")));
        }
        if !(stiffness > 0.0 && stiffness.is_finite()) {
            return Err(EvolutionError::config(format!("stiffness must be positive, got {stiffness}")));
        }
        Ok(Self { mass, stiffness })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Angular frequency `ω = sqrt(k/m)`
    pub fn omega(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    pub fn period(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.omega()
    }

    /// `[[0, 1/m], [-k, 0]]` acting on the flattened `(q, p)` vector
    pub fn operator(&self) -> Result<MatrixOperator> {
        let matrix = DMatrix::from_row_slice(2, 2, &[0.0, 1.0 / self.mass, -self.stiffness, 0.0]);
        MatrixOperator::new("harmonic oscillator", DomainDescriptor::lumped(1), OperatorMatrix::Real(matrix))
    }

    pub fn initial_state(&self, q: f64, p: f64) -> Result<State> {
        State::from_fields(
            DomainDescriptor::lumped(1),
            vec![(Field::Position, FieldData::from_vec(vec![q])), (Field::Momentum, FieldData::from_vec(vec![p]))],
        )
    }

    /// `p²/2m + k·q²/2`
    pub fn energy(&self, state: &State) -> Result<f64> {
        match oscillator_energy(self.mass, self.stiffness)(state)? {
            ObservableValue::Scalar(energy) => Ok(energy),
            ObservableValue::Series(_) => Err(EvolutionError::Observable {
                name: "oscillator energy".into(),
                reason: "expected a scalar".into(),
            }),
        }
    }

    /// Exact `(q(t), p(t))` from `(q₀, p₀)` at `t = 0`
    pub fn exact(&self, q0: f64, p0: f64, t: f64) -> (f64, f64) {
        let omega = self.omega();
        let (s, c) = (omega * t).sin_cos();
        let q = q0 * c + p0 / (self.mass * omega) * s;
        let p = p0 * c - self.mass * omega * q0 * s;
        (q, p)
    }
}
