//! Stepping schemes
//!
//! Concrete implementations of the [`Stepper`](crate::solver::Stepper) trait.
//! The trait lives in `solver::traits`; adding a scheme here never touches
//! the integrator.
//!
//! # Available Schemes
//!
//! ## Explicit
//!
//! - **[`ExplicitEuler`]**: first order, 1 evaluation per step
//! - **[`Rk2`]**: explicit midpoint, second order
//! - **[`Rk4`]**: classical Runge-Kutta, fourth order
//! - **[`DormandPrince45`]**: fifth order with an embedded fourth-order error
//!   estimate, the natural choice for adaptive runs
//!
//! ## Implicit
//!
//! - **[`ImplicitEuler`]**, **[`CrankNicolson`]**: direct LU solve for linear
//!   operators, bounded fixed-point iteration otherwise
//!
//! ## Symplectic
//!
//! - **[`Leapfrog`]**, **[`StormerVerlet`]**: second order splitting schemes
//!   on `Position`/`Momentum` fields with bounded energy error
//!   ([`energy_error_bound`])
//!
//! # Example
//!
//! ```rust
//! use physkit::operator::MatrixOperator;
//! use physkit::physics::{DomainDescriptor, State};
//! use physkit::solver::{CrankNicolson, ExplicitEuler, Stepper};
//!
//! let decay = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(1), vec![-50.0]).unwrap();
//! let y0 = State::lumped(vec![1.0]).unwrap();
//!
//! // dt·k = 5: explicit Euler overshoots, Crank-Nicolson stays bounded
//! let euler = ExplicitEuler.advance(&y0, &decay, 0.0, 0.1).unwrap();
//! let cn = CrankNicolson::new(1e-10, 50).advance(&y0, &decay, 0.0, 0.1).unwrap();
//!
//! assert!(euler.primary().real_parts()[0].abs() > 1.0);
//! assert!(cn.primary().real_parts()[0].abs() < 1.0);
//! ```

mod euler;
mod implicit;
mod runge_kutta;
mod symplectic;

pub use euler::ExplicitEuler;
pub use implicit::{CrankNicolson, ImplicitEuler};
pub use runge_kutta::{DormandPrince45, Rk2, Rk4};
pub use symplectic::{Leapfrog, StormerVerlet, energy_error_bound};
