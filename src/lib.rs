//! physkit: Operator-Based Time Evolution
//!
//! A framework for evolving physical states in time. Models are written as
//! operators acting on states; numerical schemes advance `du/dt = L(u, t)`
//! without knowing where `L` came from.
//!
//! # Architecture
//!
//! physkit is built on two core principles:
//!
//! 1. **Separation of Physics and Numerics**
//!    - Operators and discretizations define equations (what to solve)
//!    - Steppers and the integrator provide methods (how to solve)
//!
//! 2. **Extensibility and Type Safety**
//!    - Trait-based design ([`operator::Operator`], [`discretization::Discretization`],
//!      [`solver::Stepper`], [`output::Exporter`])
//!    - Every state carries the domain it was sampled on; mismatches are errors
//!    - One error type, [`EvolutionError`], across the crate
//!
//! # Quick Start
//!
//! ```rust
//! use physkit::prelude::*;
//! use physkit::diagnostics::integral;
//!
//! # fn main() -> std::result::Result<(), EvolutionError> {
//! // 1. Discretize the heat equation on (0, 1) with fixed ends
//! let fd = FiniteDifference::new(0.0, 1.0, 49, BoundaryKind::Dirichlet, StencilOrder::Second)?;
//! let laplacian = fd.build_operator(&OperatorKind::Laplacian)?;
//! let initial = fd.build_state(&|x| (std::f64::consts::PI * x).sin())?;
//!
//! // 2. Configure the integrator
//! let integrator = Integrator::new(StepperConfig::implicit(Scheme::CrankNicolson, 1e-3, 1e-10, 50))?
//!     .record_every(10)
//!     .observe("heat", integral)?;
//!
//! // 3. Run
//! let trajectory = integrator.run(&initial, laplacian.as_ref(), TimeSpan::new(0.0, 0.1))?;
//!
//! // 4. Access results
//! assert_eq!(trajectory.status(), &RunStatus::Completed);
//! let heat = trajectory.observable_series("heat").unwrap();
//! assert!(heat.last().unwrap() < heat.first().unwrap());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`physics`]: states, fields and domain descriptors
//! - [`operator`]: the operator interface and its combinators
//! - [`discretization`]: finite-difference, finite-volume and spectral backends
//! - [`solver`]: steppers, the integrator and trajectories
//! - [`diagnostics`]: observables evaluated along a run
//! - [`models`]: ready-made systems (decay, oscillator, square well)
//! - [`output`]: CSV export

pub mod error;

// Core modules
pub mod physics;
pub mod operator;
pub mod discretization;
pub mod solver;
pub mod diagnostics;

pub mod models;
pub mod output;

pub use error::{EvolutionError, Result};

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use physkit::prelude::*;
    //! ```
    pub use crate::error::{EvolutionError, Result};
    pub use crate::physics::{BoundaryKind, DomainDescriptor, Field, FieldData, GridType, State, ValueKind};
    pub use crate::operator::{LinearOperator, MatrixOperator, Operator, OperatorRef};
    pub use crate::discretization::{Discretization, FiniteDifference, FiniteVolume, OperatorKind, Spectral, StencilOrder};
    pub use crate::solver::{
        Integrator,
        RunStatus,
        Scheme,
        Stepper,
        StepperConfig,
        TimeSpan,
        Trajectory,
    };
    pub use crate::diagnostics::{ObservableRegistry, ObservableValue};
}
