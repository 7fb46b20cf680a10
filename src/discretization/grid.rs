//! Uniform one-dimensional grids

use serde::{Deserialize, Serialize};

use crate::error::{EvolutionError, Result};
use crate::physics::{BoundaryKind, DomainDescriptor, GridType};

/// `n` uniformly placed points on `[a, b]`
///
/// # Example
///
/// ```rust
/// use physkit::discretization::Grid1D;
/// use physkit::physics::GridType;
///
/// let grid = Grid1D::new(0.0, 1.0, 9, GridType::Interior).unwrap();
/// assert!((grid.dx() - 0.1).abs() < 1e-15);
/// assert!((grid.coordinates()[0] - 0.1).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid1D {
    a: f64,
    b: f64,
    n: usize,
    grid_type: GridType,
}

impl Grid1D {
    pub fn new(a: f64, b: f64, n: usize, grid_type: GridType) -> Result<Self> {
        if !a.is_finite() || !b.is_finite() {
            return Err(EvolutionError::discretization("grid bounds must be finite"));
        }
        if b <= a {
            return Err(EvolutionError::discretization(format!("grid needs b > a, got a = {a}, b = {b}")));
        }
        if n == 0 {
            return Err(EvolutionError::discretization("grid needs at least one point"));
        }
        if n < grid_type.min_points() {
            return Err(EvolutionError::discretization(format!(
                "a {grid_type} grid needs at least {} points, got {n}",
                grid_type.min_points()
            )));
        }
        Ok(Self { a, b, n, grid_type })
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn length(&self) -> f64 {
        self.b - self.a
    }

    pub fn dx(&self) -> f64 {
        self.grid_type.spacing(self.a, self.b, self.n)
    }

    pub fn coordinates(&self) -> Vec<f64> {
        let dx = self.dx();
        (0..self.n)
            .map(|i| {
                if self.grid_type == GridType::Closed && i + 1 == self.n {
                    self.b
                } else {
                    self.grid_type.coordinate(self.a, dx, i)
                }
            })
            .collect()
    }

    /// Descriptor of this grid tagged with a boundary kind
    pub fn descriptor(&self, boundary: BoundaryKind) -> Result<DomainDescriptor> {
        DomainDescriptor::uniform(self.a, self.b, self.n, self.grid_type, boundary)
    }
}
