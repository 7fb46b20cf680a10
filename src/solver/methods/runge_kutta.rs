//! Explicit Runge-Kutta schemes
//!
//! # Mathematical Background
//!
//! An `s`-stage explicit Runge-Kutta method for `dy/dt = f(y, t)`:
//!
//! ```text
//! kᵢ = f(yₙ + dt·Σⱼ aᵢⱼ·kⱼ, tₙ + cᵢ·dt)      j < i
//! yₙ₊₁ = yₙ + dt·Σᵢ bᵢ·kᵢ
//! ```
//!
//! | Scheme | Stages | Order | Error estimate |
//! |--------|--------|-------|----------------|
//! | [`Rk2`] (midpoint) | 2 | 2 | none |
//! | [`Rk4`] (classical) | 4 | 4 | none |
//! | [`DormandPrince45`] | 7 | 5 | embedded 4th order |
//!
//! Halving `dt` divides the global error of RK4 by about 16.

use crate::error::Result;
use crate::operator::Operator;
use crate::physics::State;
use crate::solver::{Scheme, StepOutcome, Stepper};

// =================================================================================================
// Midpoint RK2
// =================================================================================================

/// Explicit midpoint rule
///
/// ```text
/// k₁ = f(yₙ, tₙ)
/// k₂ = f(yₙ + dt/2·k₁, tₙ + dt/2)
/// yₙ₊₁ = yₙ + dt·k₂
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk2;

impl Stepper for Rk2 {
    fn scheme(&self) -> Scheme {
        Scheme::Rk2
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        let k1 = op.apply(state, t)?;
        let k2 = op.apply(&state.axpy(dt / 2.0, &k1)?, t + dt / 2.0)?;
        Ok(StepOutcome::new(state.axpy(dt, &k2)?, 2))
    }
}

// =================================================================================================
// Classical RK4
// =================================================================================================

/// Classical fourth-order Runge-Kutta
///
/// ```text
/// k₁ = f(yₙ, tₙ)
/// k₂ = f(yₙ + dt/2·k₁, tₙ + dt/2)
/// k₃ = f(yₙ + dt/2·k₂, tₙ + dt/2)
/// k₄ = f(yₙ + dt·k₃, tₙ + dt)
///
/// yₙ₊₁ = yₙ + dt/6·(k₁ + 2k₂ + 2k₃ + k₄)
/// ```
///
/// The weights are Simpson's rule: endpoints 1/6, midpoints 1/3.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4;

impl Stepper for Rk4 {
    fn scheme(&self) -> Scheme {
        Scheme::Rk4
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        let half = dt / 2.0;

        let k1 = op.apply(state, t)?;
        let k2 = op.apply(&state.axpy(half, &k1)?, t + half)?;
        let k3 = op.apply(&state.axpy(half, &k2)?, t + half)?;
        let k4 = op.apply(&state.axpy(dt, &k3)?, t + dt)?;

        let next = state.linear_combination(&[
            (dt / 6.0, &k1),
            (dt / 3.0, &k2),
            (dt / 3.0, &k3),
            (dt / 6.0, &k4),
        ])?;
        Ok(StepOutcome::new(next, 4))
    }
}

// =================================================================================================
// Dormand-Prince 4(5)
// =================================================================================================

const DP_C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const DP_A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0],
    [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];

/// 5th-order weights (last stage has weight 0)
const DP_B: [f64; 7] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0];

/// 5th-order minus embedded 4th-order weights
const DP_E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// Dormand-Prince 5(4) embedded pair
///
/// Advances with the 5th-order solution and reports the difference to the
/// embedded 4th-order solution as [`StepOutcome::error_estimate`]. The
/// adaptive controller scales steps with the exponent `-1/(4 + 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrince45;

impl Stepper for DormandPrince45 {
    fn scheme(&self) -> Scheme {
        Scheme::DormandPrince45
    }

    fn error_order(&self) -> usize {
        4
    }

    fn has_embedded_error(&self) -> bool {
        true
    }

    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome> {
        let mut k: Vec<State> = Vec::with_capacity(7);

        for (stage, row) in DP_A.iter().enumerate() {
            let terms: Vec<(f64, &State)> = row
                .iter()
                .zip(&k)
                .filter(|(a, _)| **a != 0.0)
                .map(|(a, ki)| (dt * a, ki))
                .collect();
            let stage_state = state.linear_combination(&terms)?;
            k.push(op.apply(&stage_state, t + DP_C[stage] * dt)?);
        }

        let next = state.linear_combination(&weighted(dt, &DP_B, &k))?;

        // error = dt·Σ eᵢ·kᵢ, built on a zero state of the same layout
        let zero = state * 0.0;
        let error = zero.linear_combination(&weighted(dt, &DP_E, &k))?;

        Ok(StepOutcome { state: next, error_estimate: Some(error), iterations: 0, evaluations: 7 })
    }
}

/// Non-zero terms `dt·wᵢ·kᵢ`
fn weighted<'a>(dt: f64, weights: &[f64; 7], k: &'a [State]) -> Vec<(f64, &'a State)> {
    weights.iter().zip(k).filter(|(w, _)| **w != 0.0).map(|(w, ki)| (dt * w, ki)).collect()
}
