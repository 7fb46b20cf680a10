//! Finite-difference discretization
//!
//! Node-centred stencils of second or fourth order. The grid layout follows
//! the boundary kind:
//!
//! ```text
//! periodic   left-closed [a, b)   wrap-around ghosts
//! Dirichlet  interior    (a, b)   implicit zero walls at a and b
//! Neumann    closed      [a, b]   mirrored ghosts
//! open       closed      [a, b]   linearly extrapolated ghosts
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::discretization::{Discretization, Grid1D, OperatorKind, hamiltonian_from};
use crate::error::{EvolutionError, Result};
use crate::operator::{GhostRule, OperatorRef, StencilOperator};
use crate::physics::{BoundaryKind, DomainDescriptor, GridType};

/// Accuracy order of the central stencils
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StencilOrder {
    /// 3-point stencils
    #[default]
    Second,

    /// 5-point stencils
    Fourth,
}

impl StencilOrder {
    /// Number of points in the stencil
    pub fn width(&self) -> usize {
        match self {
            StencilOrder::Second => 3,
            StencilOrder::Fourth => 5,
        }
    }

    /// Central first-derivative taps for unit spacing
    fn first_derivative(&self) -> Vec<(isize, f64)> {
        match self {
            StencilOrder::Second => vec![(-1, -0.5), (1, 0.5)],
            StencilOrder::Fourth => vec![(-2, 1.0 / 12.0), (-1, -2.0 / 3.0), (1, 2.0 / 3.0), (2, -1.0 / 12.0)],
        }
    }

    /// Central second-derivative taps for unit spacing
    fn second_derivative(&self) -> Vec<(isize, f64)> {
        match self {
            StencilOrder::Second => vec![(-1, 1.0), (0, -2.0), (1, 1.0)],
            StencilOrder::Fourth => vec![
                (-2, -1.0 / 12.0),
                (-1, 4.0 / 3.0),
                (0, -5.0 / 2.0),
                (1, 4.0 / 3.0),
                (2, -1.0 / 12.0),
            ],
        }
    }
}

/// Finite-difference backend
///
/// # Example
///
/// ```rust
/// use physkit::discretization::{FiniteDifference, StencilOrder};
/// use physkit::physics::BoundaryKind;
///
/// // a 3-point stencil cannot live on 2 points
/// assert!(FiniteDifference::new(0.0, 1.0, 2, BoundaryKind::Neumann, StencilOrder::Second).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteDifference {
    grid: Grid1D,
    order: StencilOrder,
    domain: DomainDescriptor,
}

impl FiniteDifference {
    pub fn new(a: f64, b: f64, points: usize, boundary: BoundaryKind, order: StencilOrder) -> Result<Self> {
        if points < order.width() {
            return Err(EvolutionError::discretization(format!(
                "a {}-point stencil needs at least {} points, domain has {points}",
                order.width(),
                order.width()
            )));
        }

        let grid_type = match boundary {
            BoundaryKind::Periodic => GridType::LeftClosed,
            BoundaryKind::Dirichlet => GridType::Interior,
            BoundaryKind::Neumann | BoundaryKind::Open => GridType::Closed,
        };
        let grid = Grid1D::new(a, b, points, grid_type)?;
        let domain = grid.descriptor(boundary)?;

        Ok(Self { grid, order, domain })
    }

    pub fn grid(&self) -> &Grid1D {
        &self.grid
    }

    pub fn order(&self) -> StencilOrder {
        self.order
    }

    pub fn boundary(&self) -> BoundaryKind {
        self.domain.boundary()
    }

    pub fn ghost_rule(&self) -> GhostRule {
        match self.boundary() {
            BoundaryKind::Periodic => GhostRule::Wrap,
            BoundaryKind::Dirichlet => GhostRule::OddAboutNode,
            BoundaryKind::Neumann => GhostRule::EvenAboutNode,
            BoundaryKind::Open => GhostRule::Extrapolate,
        }
    }

    fn stencil(&self, name: &str, taps: Vec<(isize, f64)>, factor: f64) -> Result<OperatorRef> {
        let taps = taps.into_iter().map(|(o, w)| (o, w * factor)).collect();
        Ok(Arc::new(StencilOperator::new(name, self.domain.clone(), taps, self.ghost_rule())?))
    }
}

impl Discretization for FiniteDifference {
    fn name(&self) -> &str {
        "finite difference"
    }

    fn domain_descriptor(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn construct_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        let dx = self.grid.dx();

        match kind {
            OperatorKind::Identity => self.stencil("identity", vec![(0, 1.0)], 1.0),
            OperatorKind::FirstDerivative => self.stencil("d/dx", self.order.first_derivative(), 1.0 / dx),
            OperatorKind::Laplacian => self.stencil("laplacian", self.order.second_derivative(), 1.0 / (dx * dx)),
            OperatorKind::Diffusion { coefficient } => {
                self.stencil("diffusion", self.order.second_derivative(), coefficient / (dx * dx))
            }
            OperatorKind::Advection { velocity } => {
                self.stencil("advection", self.order.first_derivative(), -velocity / dx)
            }
            OperatorKind::Hamiltonian { mass, hbar, potential } => {
                let laplacian = self.stencil("laplacian", self.order.second_derivative(), 1.0 / (dx * dx))?;
                hamiltonian_from(laplacian, *mass, *hbar, potential.as_ref())
            }
            OperatorKind::Burgers => Err(EvolutionError::discretization(
                "the Burgers flux is only provided by the finite-volume backend",
            )),
        }
    }
}
