//! Domain descriptors
//!
//! Every [`State`](crate::physics::State) and every operator carries a
//! [`DomainDescriptor`]: grid shape, bounds, spacing, sampling layout and
//! boundary kind. Two objects can only interact when their descriptors are
//! equal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EvolutionError, Result};

// =================================================================================================
// Boundary kinds
// =================================================================================================

/// Boundary condition tag of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Values wrap around: `u(a) = u(b)`
    Periodic,

    /// Fixed zero value at both walls
    Dirichlet,

    /// Zero normal derivative at both walls
    Neumann,

    /// Outflow / extrapolated boundary
    Open,
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryKind::Periodic => "periodic",
            BoundaryKind::Dirichlet => "Dirichlet",
            BoundaryKind::Neumann => "Neumann",
            BoundaryKind::Open => "open",
        };
        write!(f, "{name}")
    }
}

// =================================================================================================
// Uniform grid types
// =================================================================================================

/// Placement of `n` uniformly spaced points in `[a, b]`
///
/// ```text
/// LeftClosed   [a, b)   a + i·dx            dx = L/n
/// RightClosed  (a, b]   a + (i+1)·dx        dx = L/n
/// Open         (a, b)   a + (i+1)·dx        dx = L/(n+1)
/// Interior     (a, b)   a + (i+1)·dx        dx = L/(n+1)
/// Midpoint     cells    a + (i+½)·dx        dx = L/n
/// Closed       [a, b]   linspace(a, b, n)   dx = L/(n-1)
/// ```
///
/// `Interior` is `Open` with the walls understood as implicit zero-valued
/// points (Dirichlet problems).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridType {
    LeftClosed,
    RightClosed,
    Open,
    Interior,
    Midpoint,
    Closed,
}

impl GridType {
    /// Minimum number of points for a valid grid
    pub fn min_points(&self) -> usize {
        match self {
            GridType::Closed => 2,
            _ => 1,
        }
    }

    /// Point spacing for `n` points on `[a, b]`
    pub fn spacing(&self, a: f64, b: f64, n: usize) -> f64 {
        let length = b - a;
        match self {
            GridType::Closed => length / (n as f64 - 1.0),
            GridType::Open | GridType::Interior => length / (n as f64 + 1.0),
            GridType::LeftClosed | GridType::RightClosed | GridType::Midpoint => length / n as f64,
        }
    }

    /// Coordinate of point `i` given the lower bound and spacing
    pub fn coordinate(&self, a: f64, dx: f64, i: usize) -> f64 {
        let i = i as f64;
        match self {
            GridType::LeftClosed | GridType::Closed => a + i * dx,
            GridType::RightClosed | GridType::Open | GridType::Interior => a + (i + 1.0) * dx,
            GridType::Midpoint => a + (i + 0.5) * dx,
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridType::LeftClosed => "left-closed",
            GridType::RightClosed => "right-closed",
            GridType::Open => "open",
            GridType::Interior => "interior",
            GridType::Midpoint => "midpoint",
            GridType::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

// =================================================================================================
// Sampling layout
// =================================================================================================

/// How the points of a domain are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// No spatial meaning: a vector of ODE unknowns
    Lumped,

    /// Uniform grid of the given type
    Uniform(GridType),

    /// Chebyshev–Gauss–Lobatto nodes mapped to `[a, b]` (both ends included)
    ChebyshevLobatto,
}

// =================================================================================================
// Domain descriptor
// =================================================================================================

/// Shape, bounds, spacing, layout and boundary tag of a discretized domain
///
/// # Example
///
/// ```rust
/// use physkit::physics::DomainDescriptor;
///
/// let lumped = DomainDescriptor::lumped(3);
/// assert_eq!(lumped.points(), 3);
/// assert_eq!(lumped.coordinates(), vec![0.0, 1.0, 2.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    shape: Vec<usize>,
    lower: f64,
    upper: f64,
    spacing: f64,
    layout: Layout,
    boundary: BoundaryKind,
}

impl DomainDescriptor {
    /// Domain of `n` lumped unknowns (ODE systems)
    pub fn lumped(n: usize) -> Self {
        Self {
            shape: vec![n],
            lower: 0.0,
            upper: n.saturating_sub(1) as f64,
            spacing: 1.0,
            layout: Layout::Lumped,
            boundary: BoundaryKind::Open,
        }
    }

    /// Uniform grid of `n` points on `[a, b]`
    pub fn uniform(a: f64, b: f64, n: usize, grid_type: GridType, boundary: BoundaryKind) -> Result<Self> {
        validate_bounds(a, b, n)?;
        if n < grid_type.min_points() {
            return Err(EvolutionError::discretization(format!(
                "a {grid_type} grid needs at least {} points, got {n}",
                grid_type.min_points()
            )));
        }

        Ok(Self {
            shape: vec![n],
            lower: a,
            upper: b,
            spacing: grid_type.spacing(a, b, n),
            layout: Layout::Uniform(grid_type),
            boundary,
        })
    }

    /// Chebyshev–Gauss–Lobatto nodes of polynomial `degree` on `[a, b]`
    pub fn chebyshev(a: f64, b: f64, degree: usize, boundary: BoundaryKind) -> Result<Self> {
        validate_bounds(a, b, degree + 1)?;
        if degree < 2 {
            return Err(EvolutionError::discretization(format!(
                "Chebyshev collocation needs degree >= 2, got {degree}"
            )));
        }

        Ok(Self {
            shape: vec![degree + 1],
            lower: a,
            upper: b,
            spacing: (b - a) / degree as f64,
            layout: Layout::ChebyshevLobatto,
            boundary,
        })
    }

    // ======================================= accessors ==========================================

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of sample points
    pub fn points(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }

    /// Uniform spacing (mean spacing for Chebyshev nodes)
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn boundary(&self) -> BoundaryKind {
        self.boundary
    }

    /// Coordinates of every sample point, ascending
    pub fn coordinates(&self) -> Vec<f64> {
        let n = self.points();
        match self.layout {
            Layout::Lumped => (0..n).map(|i| i as f64).collect(),
            Layout::Uniform(GridType::Closed) => {
                // linspace: hit the upper bound exactly
                (0..n)
                    .map(|i| if i + 1 == n { self.upper } else { self.lower + i as f64 * self.spacing })
                    .collect()
            }
            Layout::Uniform(grid_type) => (0..n).map(|i| grid_type.coordinate(self.lower, self.spacing, i)).collect(),
            Layout::ChebyshevLobatto => {
                let degree = (n - 1) as f64;
                (0..n)
                    .map(|j| {
                        let xi = (std::f64::consts::PI * j as f64 / degree).cos();
                        self.lower + 0.5 * self.length() * (1.0 - xi)
                    })
                    .collect()
            }
        }
    }

    /// Quadrature weights used by integral observables
    ///
    /// Rectangle rule `dx` on uniform grids, trapezoid rule on closed grids and
    /// Chebyshev nodes, unit weights on lumped domains.
    pub fn quadrature_weights(&self) -> Vec<f64> {
        let n = self.points();
        match self.layout {
            Layout::Lumped => vec![1.0; n],
            Layout::Uniform(GridType::Closed) | Layout::ChebyshevLobatto => {
                let x = self.coordinates();
                (0..n)
                    .map(|i| {
                        let left = if i == 0 { x[0] } else { x[i - 1] };
                        let right = if i + 1 == n { x[n - 1] } else { x[i + 1] };
                        0.5 * (right - left)
                    })
                    .collect()
            }
            Layout::Uniform(_) => vec![self.spacing; n],
        }
    }

    /// Fail with `ShapeMismatch` unless `other` describes the same domain
    pub fn ensure_compatible(&self, other: &DomainDescriptor, context: &str) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(EvolutionError::shape(format!("{context}: expected domain {self}, got {other}")))
        }
    }
}

impl fmt::Display for DomainDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            Layout::Lumped => write!(f, "lumped[{}]", self.points()),
            Layout::Uniform(grid_type) => write!(
                f,
                "{grid_type}[{}] on [{}, {}] ({})",
                self.points(),
                self.lower,
                self.upper,
                self.boundary
            ),
            Layout::ChebyshevLobatto => write!(
                f,
                "chebyshev[{}] on [{}, {}] ({})",
                self.points(),
                self.lower,
                self.upper,
                self.boundary
            ),
        }
    }
}

fn validate_bounds(a: f64, b: f64, n: usize) -> Result<()> {
    if !a.is_finite() || !b.is_finite() {
        return Err(EvolutionError::discretization("domain bounds must be finite"));
    }
    if b <= a {
        return Err(EvolutionError::discretization(format!("upper bound {b} must exceed lower bound {a}")));
    }
    if n == 0 {
        return Err(EvolutionError::discretization("a domain needs at least one point"));
    }
    Ok(())
}
