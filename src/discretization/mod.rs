//! Discretizations
//!
//! A discretization maps a continuous 1D domain to a finite [`State`] and
//! builds concrete operators consistent with its own [`DomainDescriptor`].
//!
//! # Backends
//!
//! | Backend | Layout | Boundaries | Operators |
//! |---------|--------|------------|-----------|
//! | [`FiniteDifference`] | node-centred, layout from boundary | all | stencils (2nd / 4th order) |
//! | [`FiniteVolume`] | cell-centred (midpoint) | all | stencils, upwind, Burgers flux |
//! | [`Spectral`] Fourier | left-closed | periodic only | FFT multipliers |
//! | [`Spectral`] Chebyshev | Gauss–Lobatto | Dirichlet, open | collocation matrices |
//!
//! # Validation policy
//!
//! - a domain with fewer points than the stencil width fails at construction
//! - an operator request incompatible with the boundary kind fails with
//!   `DiscretizationError` when the operator is built
//! - every built operator is checked against the backend's descriptor before
//!   being returned
//!
//! # Example
//!
//! ```rust
//! use physkit::discretization::{Discretization, FiniteDifference, OperatorKind, StencilOrder};
//! use physkit::operator::Operator;
//! use physkit::physics::BoundaryKind;
//!
//! let fd = FiniteDifference::new(0.0, 1.0, 49, BoundaryKind::Dirichlet, StencilOrder::Second).unwrap();
//! let state = fd.build_state(&|x| (std::f64::consts::PI * x).sin()).unwrap();
//! let laplacian = fd.build_operator(&OperatorKind::Laplacian).unwrap();
//!
//! let curvature = laplacian.apply(&state, 0.0).unwrap();
//! assert_eq!(curvature.points(), 49);
//! ```

use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::operator::{MatrixOperator, Operator, OperatorRef, scale, sum};
use crate::physics::{DomainDescriptor, Field, FieldData, State};

pub mod finite_difference;
pub mod finite_volume;
pub mod grid;
pub mod spectral;

pub use finite_difference::{FiniteDifference, StencilOrder};
pub use finite_volume::{ConservativeFlux, FiniteVolume};
pub use grid::Grid1D;
pub use spectral::{FourierOperator, Spectral, SpectralBasis};

// =================================================================================================
// Operator kinds
// =================================================================================================

/// Operators a discretization knows how to build
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorKind {
    /// `u ↦ u`
    Identity,

    /// `u ↦ ∂u/∂x`
    FirstDerivative,

    /// `u ↦ ∂²u/∂x²`
    Laplacian,

    /// `u ↦ D·∂²u/∂x²`
    Diffusion { coefficient: f64 },

    /// `u ↦ -v·∂u/∂x`
    Advection { velocity: f64 },

    /// `ψ ↦ -(ħ²/2m)·∂²ψ/∂x² + V·ψ`
    Hamiltonian { mass: f64, hbar: f64, potential: Option<Vec<f64>> },

    /// `u ↦ -∂(u²/2)/∂x`, nonlinear (finite volume only)
    Burgers,
}

impl OperatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Identity => "identity",
            OperatorKind::FirstDerivative => "first derivative",
            OperatorKind::Laplacian => "laplacian",
            OperatorKind::Diffusion { .. } => "diffusion",
            OperatorKind::Advection { .. } => "advection",
            OperatorKind::Hamiltonian { .. } => "hamiltonian",
            OperatorKind::Burgers => "burgers",
        }
    }

    /// Parameter checks independent of the backend
    pub fn validate(&self, domain: &DomainDescriptor) -> Result<()> {
        match self {
            OperatorKind::Diffusion { coefficient } if !coefficient.is_finite() => {
                Err(EvolutionError::config(format!("diffusion coefficient must be finite, got {coefficient}")))
            }
            OperatorKind::Advection { velocity } if !velocity.is_finite() => {
                Err(EvolutionError::config(format!("advection velocity must be finite, got {velocity}")))
            }
            OperatorKind::Hamiltonian { mass, hbar, potential } => {
                if !(*mass > 0.0 && mass.is_finite()) {
                    return Err(EvolutionError::config(format!("mass must be positive, got {mass}")));
                }
                if !(*hbar > 0.0 && hbar.is_finite()) {
                    return Err(EvolutionError::config(format!("hbar must be positive, got {hbar}")));
                }
                if let Some(v) = potential {
                    if v.len() != domain.points() {
                        return Err(EvolutionError::shape(format!(
                            "potential has {} samples, domain has {} points",
                            v.len(),
                            domain.points()
                        )));
                    }
                    if v.iter().any(|x| !x.is_finite()) {
                        return Err(EvolutionError::config("potential contains non-finite values"));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =================================================================================================
// Discretization trait
// =================================================================================================

/// Mapping from a continuous domain to states and operators
///
/// Implementors provide the descriptor and [`Discretization::construct_operator`];
/// the provided methods sample initial conditions and validate every
/// operator before handing it out.
pub trait Discretization: Send + Sync {
    fn name(&self) -> &str;

    fn domain_descriptor(&self) -> &DomainDescriptor;

    /// Backend-specific construction, called by [`Discretization::build_operator`]
    fn construct_operator(&self, kind: &OperatorKind) -> Result<OperatorRef>;

    fn coordinates(&self) -> Vec<f64> {
        self.domain_descriptor().coordinates()
    }

    /// Build and validate an operator
    fn build_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        kind.validate(self.domain_descriptor())?;
        let op = self.construct_operator(kind)?;
        self.validate_operator(op.as_ref())?;

        log::debug!("{}: built {} operator '{}'", self.name(), kind, op.name());
        Ok(op)
    }

    /// Check that `op` acts on this discretization's domain
    fn validate_operator(&self, op: &dyn Operator) -> Result<()> {
        self.domain_descriptor()
            .ensure_compatible(op.domain(), &format!("operator '{}' on {}", op.name(), self.name()))
    }

    /// Sample a real initial condition into a single `Value` field
    fn build_state(&self, initial_condition: &dyn Fn(f64) -> f64) -> Result<State> {
        self.build_fields(&[(Field::Value, initial_condition)])
    }

    /// Sample a complex initial condition into a single `WaveFunction` field
    fn build_complex_state(&self, initial_condition: &dyn Fn(f64) -> Complex64) -> Result<State> {
        let mut values = Vec::with_capacity(self.domain_descriptor().points());
        for x in self.coordinates() {
            let z = initial_condition(x);
            if !(z.re.is_finite() && z.im.is_finite()) {
                return Err(non_finite_sample(x));
            }
            values.push(z);
        }
        State::new(
            self.domain_descriptor().clone(),
            Field::WaveFunction,
            FieldData::from_complex_vec(values),
        )
    }

    /// Sample several real fields at once (for example position and momentum)
    fn build_fields(&self, fields: &[(Field, &dyn Fn(f64) -> f64)]) -> Result<State> {
        let x = self.coordinates();
        let mut sampled = Vec::with_capacity(fields.len());

        for (field, initial_condition) in fields {
            let mut values = Vec::with_capacity(x.len());
            for &xi in &x {
                let v = initial_condition(xi);
                if !v.is_finite() {
                    return Err(non_finite_sample(xi));
                }
                values.push(v);
            }
            sampled.push((field.clone(), FieldData::from_vec(values)));
        }

        State::from_fields(self.domain_descriptor().clone(), sampled)
    }
}

fn non_finite_sample(x: f64) -> EvolutionError {
    EvolutionError::config(format!("initial condition is not finite at x = {x}"))
}

/// `-(ħ²/2m)·laplacian + diag(V)`
pub(crate) fn hamiltonian_from(
    laplacian: OperatorRef,
    mass: f64,
    hbar: f64,
    potential: Option<&Vec<f64>>,
) -> Result<OperatorRef> {
    let kinetic = scale(-hbar * hbar / (2.0 * mass), laplacian)?;
    match potential {
        Some(v) => {
            let domain = kinetic.domain().clone();
            let potential: OperatorRef = Arc::new(MatrixOperator::diagonal("potential", domain, v.clone())?);
            sum(kinetic, potential)
        }
        None => Ok(kinetic),
    }
}
