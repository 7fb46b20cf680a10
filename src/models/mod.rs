//! Reference problems with analytic answers
//!
//! Each model bundles an operator, a matching initial state and the exact
//! solution (or exact spectrum) to compare a run against. They are the
//! fixtures of the convergence tests, the benches and the demos.
//!
//! # Available Models
//!
//! ## [`ExponentialDecay`]: `dx/dt = -k·x`
//!
//! Lumped linear ODE, exact solution `x₀·e^{-kt}`. The canonical order-of-
//! accuracy check for every stepper.
//!
//! ## [`HarmonicOscillator`]: `(q̇, ṗ) = (p/m, -k·q)`
//!
//! Two-field phase-space system for the symplectic schemes; energy
//! `p²/2m + k·q²/2` is exactly conserved by the flow.
//!
//! ## [`InfiniteSquareWell`]: particle in a box
//!
//! Finite-difference Hamiltonian on the interior of `(0, L)` with implicit
//! zero walls, analytic levels `E_n = ħ²π²n²/(2mL²)`.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod exponential_decay;
pub mod harmonic_oscillator;
pub mod square_well;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use exponential_decay::ExponentialDecay;
pub use harmonic_oscillator::HarmonicOscillator;
pub use square_well::InfiniteSquareWell;
