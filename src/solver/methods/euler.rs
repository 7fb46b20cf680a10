//! Forward Euler
//!
//! # Mathematical Background
//!
//! The simplest explicit scheme for `dy/dt = f(y, t)`:
//!
//! ```text
//! y_{n+1} = y_n + dt * f(y_n, t_n)
//! ```
//!
//! # Characteristics
//!
//! - **Order**: first order (global error ~ O(dt))
//! - **Stability**: conditional, `|1 + λ·dt| ≤ 1` for `dy/dt = λy`
//! - **Cost**: 1 operator evaluation per step
//!
//! Useful as a reference point for convergence studies and to show energy
//! drift on oscillators; prefer RK4 or an implicit scheme for real work.

use crate::error::Result;
use crate::operator::Operator;
use crate::physics::State;
use crate::solver::{Scheme, StepOutcome, Stepper};

/// Forward (explicit) Euler stepper
///
/// # Stability
///
/// For diffusion `D·∂²u/∂x²` on a grid of spacing `dx` the step must satisfy
/// `dt ≤ dx²/(2D)`; larger steps blow up and end the run as `Diverged`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEuler;

impl Stepper for ExplicitEuler {
    fn scheme(&self) -> Scheme {
        Scheme::ExplicitEuler
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        let slope = op.apply(state, t)?;
        Ok(StepOutcome::new(state.axpy(dt, &slope)?, 1))
    }
}
