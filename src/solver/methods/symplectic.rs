//! Symplectic splitting schemes
//!
//! # Mathematical Background
//!
//! For a separable Hamiltonian `H(q, p) = T(p) + V(q)` the operator returns
//! the pair of derivatives `(dq/dt, dp/dt) = (∂T/∂p, -∂V/∂q)`. Because
//! `dq/dt` depends on `p` only and `dp/dt` on `q` only, the flow splits into
//! exactly solvable *drifts* (move `q`) and *kicks* (move `p`):
//!
//! ```text
//! Leapfrog (kick-drift-kick)          Störmer-Verlet (drift-kick-drift)
//! p½ = p + dt/2 · ṗ(q)                q½ = q + dt/2 · q̇(p)
//! q' = q + dt   · q̇(p½)               p' = p + dt   · ṗ(q½)
//! p' = p½ + dt/2 · ṗ(q')              q' = q½ + dt/2 · q̇(p')
//! ```
//!
//! Both are second order, time reversible and symplectic.
//!
//! # Conserved-quantity tolerance
//!
//! On a harmonic oscillator of angular frequency `ω` both schemes conserve a
//! modified energy exactly, so the relative error of the true energy is
//! bounded for any number of steps (no secular drift):
//!
//! ```text
//! |E(t) - E(0)| / E(0) ≤ x / (1 - x),    x = (ω·dt)² / 4
//! ```
//!
//! i.e. `(ω·dt)²/4` to leading order, see [`energy_error_bound`]. Stability
//! requires `ω·dt < 2`.
//!
//! States must be real and carry `Position` and `Momentum` fields; any other
//! field is carried through unchanged.

use crate::error::{EvolutionError, Result};
use crate::operator::Operator;
use crate::physics::{Field, FieldData, State, ValueKind};
use crate::solver::{Scheme, StepOutcome, Stepper};

/// Relative energy error bound on a harmonic oscillator, `x/(1-x)` with `x = (ω·dt)²/4`
///
/// Returns infinity outside the stability region `ω·dt < 2`.
pub fn energy_error_bound(dt: f64, omega: f64) -> f64 {
    let x = (omega * dt).powi(2) / 4.0;
    if x < 1.0 { x / (1.0 - x) } else { f64::INFINITY }
}

// =================================================================================================
// Shared splitting helpers
// =================================================================================================

fn check_phase_space(state: &State, scheme: &str) -> Result<()> {
    if state.value_kind() != ValueKind::Real {
        return Err(EvolutionError::unsupported(state.value_kind(), scheme));
    }
    state.require(&Field::Position, scheme)?;
    state.require(&Field::Momentum, scheme)?;
    Ok(())
}

/// Move `field` by `h` times its derivative evaluated at `state`
fn substep(state: &State, op: &dyn Operator, t: f64, field: Field, h: f64) -> Result<State> {
    let rates = op.apply(state, t)?;
    let current = state.require(&field, "symplectic substep")?;
    let rate = rates.require(&field, "symplectic substep")?;
    let moved: FieldData = current.axpy(h, rate)?;
    state.with_field(field, moved)
}

fn drift(state: &State, op: &dyn Operator, t: f64, h: f64) -> Result<State> {
    substep(state, op, t, Field::Position, h)
}

fn kick(state: &State, op: &dyn Operator, t: f64, h: f64) -> Result<State> {
    substep(state, op, t, Field::Momentum, h)
}

// =================================================================================================
// Leapfrog
// =================================================================================================

/// Kick-drift-kick leapfrog (velocity Verlet)
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl Stepper for Leapfrog {
    fn scheme(&self) -> Scheme {
        Scheme::Leapfrog
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind == ValueKind::Real
    }

    fn validate(&self, state: &State, op: &dyn Operator) -> Result<()> {
        check_phase_space(state, self.name())?;
        op.check_input(state)
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        check_phase_space(state, self.name())?;
        let half = dt / 2.0;

        let s = kick(state, op, t, half)?;
        let s = drift(&s, op, t + half, dt)?;
        let s = kick(&s, op, t + dt, half)?;
        Ok(StepOutcome::new(s, 3))
    }
}

// =================================================================================================
// Störmer-Verlet
// =================================================================================================

/// Drift-kick-drift Störmer-Verlet (position Verlet)
#[derive(Debug, Clone, Copy, Default)]
pub struct StormerVerlet;

impl Stepper for StormerVerlet {
    fn scheme(&self) -> Scheme {
        Scheme::StormerVerlet
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind == ValueKind::Real
    }

    fn validate(&self, state: &State, op: &dyn Operator) -> Result<()> {
        check_phase_space(state, self.name())?;
        op.check_input(state)
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        check_phase_space(state, self.name())?;
        let half = dt / 2.0;

        let s = drift(state, op, t, half)?;
        let s = kick(&s, op, t + half, dt)?;
        let s = drift(&s, op, t + dt, half)?;
        Ok(StepOutcome::new(s, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{MatrixOperator, OperatorMatrix};
    use crate::physics::DomainDescriptor;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use num_complex::Complex64;

    /// Unit-mass oscillator with angular frequency ω
    fn oscillator(omega: f64) -> MatrixOperator {
        let matrix = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -omega * omega, 0.0]);
        MatrixOperator::new("oscillator", DomainDescriptor::lumped(1), OperatorMatrix::Real(matrix)).unwrap()
    }

    fn phase_point(q: f64, p: f64) -> State {
        State::from_fields(
            DomainDescriptor::lumped(1),
            vec![(Field::Position, FieldData::from_vec(vec![q])), (Field::Momentum, FieldData::from_vec(vec![p]))],
        )
        .unwrap()
    }

    fn energy(state: &State, omega: f64) -> f64 {
        let q = state.field(&Field::Position).unwrap().real_parts()[0];
        let p = state.field(&Field::Momentum).unwrap().real_parts()[0];
        0.5 * p * p + 0.5 * omega * omega * q * q
    }

    fn max_energy_error(stepper: &dyn Stepper, q: f64, p: f64, dt: f64, steps: usize) -> f64 {
        let omega = 1.0;
        let op = oscillator(omega);
        let mut state = phase_point(q, p);
        let e0 = energy(&state, omega);
        let mut worst: f64 = 0.0;
        for k in 0..steps {
            state = stepper.advance(&state, &op, k as f64 * dt, dt).unwrap();
            worst = worst.max((energy(&state, omega) - e0).abs() / e0);
        }
        worst
    }

    #[test]
    fn test_leapfrog_energy_stays_within_bound() {
        let dt = 0.1;
        for (q, p) in [(1.0, 0.0), (0.0, 1.0), (0.6, -0.8)] {
            let error = max_energy_error(&Leapfrog, q, p, dt, 2000);
            assert!(error <= energy_error_bound(dt, 1.0) * 1.01, "({q}, {p}): {error}");
        }
    }

    #[test]
    fn test_verlet_energy_stays_within_bound() {
        let dt = 0.1;
        for (q, p) in [(1.0, 0.0), (0.0, 1.0)] {
            let error = max_energy_error(&StormerVerlet, q, p, dt, 2000);
            assert!(error <= energy_error_bound(dt, 1.0) * 1.01, "({q}, {p}): {error}");
        }
    }

    #[test]
    fn test_leapfrog_matches_velocity_verlet_formula() {
        let (q, p, dt, w2) = (1.0, 0.5, 0.1, 4.0);
        let next = Leapfrog.advance(&phase_point(q, p), &oscillator(2.0), 0.0, dt).unwrap();

        let p_half = p - 0.5 * dt * w2 * q;
        let q1 = q + dt * p_half;
        let p1 = p_half - 0.5 * dt * w2 * q1;
        assert_relative_eq!(next.field(&Field::Position).unwrap().real_parts()[0], q1, epsilon = 1e-14);
        assert_relative_eq!(next.field(&Field::Momentum).unwrap().real_parts()[0], p1, epsilon = 1e-14);
    }

    #[test]
    fn test_bound_outside_stability_region() {
        assert!(energy_error_bound(2.5, 1.0).is_infinite());
        assert_relative_eq!(energy_error_bound(0.1, 1.0), 0.0025 / 0.9975);
    }

    #[test]
    fn test_complex_states_are_rejected_before_stepping() {
        let domain = DomainDescriptor::lumped(1);
        let state = State::from_fields(
            domain,
            vec![
                (Field::Position, FieldData::from_complex_vec(vec![Complex64::new(1.0, 0.0)])),
                (Field::Momentum, FieldData::from_complex_vec(vec![Complex64::new(0.0, 0.0)])),
            ],
        )
        .unwrap();

        for stepper in [&Leapfrog as &dyn Stepper, &StormerVerlet] {
            assert!(!stepper.supports(ValueKind::Complex));
            assert!(matches!(
                stepper.validate(&state, &oscillator(1.0)),
                Err(EvolutionError::UnsupportedValueKind { .. })
            ));
        }
    }

    #[test]
    fn test_missing_momentum_field() {
        let state = State::lumped(vec![1.0]).unwrap();
        let op = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(1), vec![-1.0]).unwrap();
        assert!(matches!(Leapfrog.validate(&state, &op), Err(EvolutionError::MissingField { .. })));
    }
}
