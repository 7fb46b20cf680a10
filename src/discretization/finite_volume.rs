//! Finite-volume discretization
//!
//! Cell averages on a midpoint grid. Boundary conditions act on the cell
//! faces through ghost cells: odd reflection for Dirichlet, even reflection
//! for Neumann and zero-gradient outflow for open boundaries.

use std::fmt;
use std::sync::Arc;

use crate::discretization::{Discretization, Grid1D, OperatorKind, hamiltonian_from};
use crate::error::{EvolutionError, Result};
use crate::operator::{GhostRule, Operator, OperatorRef, StencilOperator};
use crate::physics::{BoundaryKind, DomainDescriptor, FieldData, GridType, State, ValueKind};

/// Smallest supported number of cells
const MIN_CELLS: usize = 3;

/// Finite-volume backend
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteVolume {
    grid: Grid1D,
    domain: DomainDescriptor,
}

impl FiniteVolume {
    pub fn new(a: f64, b: f64, cells: usize, boundary: BoundaryKind) -> Result<Self> {
        if cells < MIN_CELLS {
            return Err(EvolutionError::discretization(format!(
                "a {MIN_CELLS}-point stencil needs at least {MIN_CELLS} cells, domain has {cells}"
            )));
        }
        let grid = Grid1D::new(a, b, cells, GridType::Midpoint)?;
        let domain = grid.descriptor(boundary)?;
        Ok(Self { grid, domain })
    }

    pub fn grid(&self) -> &Grid1D {
        &self.grid
    }

    pub fn boundary(&self) -> BoundaryKind {
        self.domain.boundary()
    }

    pub fn ghost_rule(&self) -> GhostRule {
        match self.boundary() {
            BoundaryKind::Periodic => GhostRule::Wrap,
            BoundaryKind::Dirichlet => GhostRule::OddAboutFace,
            BoundaryKind::Neumann | BoundaryKind::Open => GhostRule::EvenAboutFace,
        }
    }

    fn stencil(&self, name: &str, taps: Vec<(isize, f64)>) -> Result<OperatorRef> {
        Ok(Arc::new(StencilOperator::new(name, self.domain.clone(), taps, self.ghost_rule())?))
    }

    /// Face-flux diffusion `(u_{i-1} - 2u_i + u_{i+1})·D/dx²`
    fn diffusion(&self, name: &str, coefficient: f64) -> Result<OperatorRef> {
        let dx = self.grid.dx();
        let w = coefficient / (dx * dx);
        self.stencil(name, vec![(-1, w), (0, -2.0 * w), (1, w)])
    }

    /// First-order upwind flux difference for `-v·∂u/∂x`
    fn upwind(&self, velocity: f64) -> Result<OperatorRef> {
        let c = velocity / self.grid.dx();
        let taps = if velocity > 0.0 {
            vec![(-1, c), (0, -c)]
        } else if velocity < 0.0 {
            vec![(0, c), (1, -c)]
        } else {
            vec![(0, 0.0)]
        };
        self.stencil("upwind advection", taps)
    }
}

impl Discretization for FiniteVolume {
    fn name(&self) -> &str {
        "finite volume"
    }

    fn domain_descriptor(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn construct_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        match kind {
            OperatorKind::Identity => self.stencil("identity", vec![(0, 1.0)]),
            OperatorKind::FirstDerivative => {
                let h = 0.5 / self.grid.dx();
                self.stencil("d/dx", vec![(-1, -h), (1, h)])
            }
            OperatorKind::Laplacian => self.diffusion("laplacian", 1.0),
            OperatorKind::Diffusion { coefficient } => self.diffusion("diffusion", *coefficient),
            OperatorKind::Advection { velocity } => self.upwind(*velocity),
            OperatorKind::Hamiltonian { mass, hbar, potential } => {
                hamiltonian_from(self.diffusion("laplacian", 1.0)?, *mass, *hbar, potential.as_ref())
            }
            OperatorKind::Burgers => Ok(Arc::new(ConservativeFlux::burgers(self.domain.clone(), self.ghost_rule())?)),
        }
    }
}

// =================================================================================================
// Conservative flux
// =================================================================================================

/// Nonlinear flux divergence `-∂f(u)/∂x` with Rusanov (local Lax–Friedrichs) faces
///
/// ```text
/// F_{i+½} = ½·(f(u_i) + f(u_{i+1})) - ½·max(|f'(u_i)|, |f'(u_{i+1})|)·(u_{i+1} - u_i)
/// du_i/dt = -(F_{i+½} - F_{i-½}) / dx
/// ```
///
/// Real states only.
#[derive(Clone)]
pub struct ConservativeFlux {
    name: String,
    domain: DomainDescriptor,
    ghost: GhostRule,
    flux: fn(f64) -> f64,
    wave_speed: fn(f64) -> f64,
}

impl ConservativeFlux {
    pub fn new(
        name: impl Into<String>,
        domain: DomainDescriptor,
        ghost: GhostRule,
        flux: fn(f64) -> f64,
        wave_speed: fn(f64) -> f64,
    ) -> Result<Self> {
        let name = name.into();
        if domain.points() < MIN_CELLS {
            return Err(EvolutionError::discretization(format!(
                "flux '{name}' needs at least {MIN_CELLS} cells, domain has {}",
                domain.points()
            )));
        }
        Ok(Self { name, domain, ghost, flux, wave_speed })
    }

    /// Inviscid Burgers flux `f(u) = u²/2`
    pub fn burgers(domain: DomainDescriptor, ghost: GhostRule) -> Result<Self> {
        Self::new("burgers", domain, ghost, |u| 0.5 * u * u, |u| u)
    }

    fn face_flux(&self, left: f64, right: f64) -> f64 {
        let speed = (self.wave_speed)(left).abs().max((self.wave_speed)(right).abs());
        0.5 * ((self.flux)(left) + (self.flux)(right)) - 0.5 * speed * (right - left)
    }

    fn divergence(&self, u: &[f64]) -> Vec<f64> {
        let n = u.len();
        let dx = self.domain.spacing();

        // faces[k] is the face between cells k-1 and k, k = 0..=n
        let faces: Vec<f64> = (0..=n as isize)
            .map(|k| self.face_flux(self.ghost.sample(u, k - 1), self.ghost.sample(u, k)))
            .collect();

        (0..n).map(|i| -(faces[i + 1] - faces[i]) / dx).collect()
    }
}

impl fmt::Debug for ConservativeFlux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConservativeFlux")
            .field("name", &self.name)
            .field("domain", &self.domain.to_string())
            .field("ghost", &self.ghost)
            .finish()
    }
}

impl Operator for ConservativeFlux {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn evaluate(&self, state: &State, _t: f64) -> Result<State> {
        state.map_fields(|field, data| {
            let u = data
                .as_real()
                .ok_or_else(|| EvolutionError::unsupported(data.kind(), format!("flux '{}' on field '{field}'", self.name)))?;
            Ok(FieldData::from_vec(self.divergence(u.as_slice())))
        })
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        Some(ValueKind::Real)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn total(state: &State, dx: f64) -> f64 {
        state.primary().real_parts().iter().sum::<f64>() * dx
    }

    #[test]
    fn test_minimum_cells() {
        assert!(matches!(
            FiniteVolume::new(0.0, 1.0, 2, BoundaryKind::Periodic),
            Err(EvolutionError::DiscretizationError(_))
        ));
    }

    #[test]
    fn test_midpoint_layout() {
        let fv = FiniteVolume::new(0.0, 1.0, 4, BoundaryKind::Neumann).unwrap();
        assert_eq!(fv.coordinates(), vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn test_neumann_diffusion_conserves_mass() {
        let fv = FiniteVolume::new(0.0, 1.0, 20, BoundaryKind::Neumann).unwrap();
        let state = fv.build_state(&|x| (-(x - 0.3).powi(2) * 50.0).exp()).unwrap();
        let op = fv.build_operator(&OperatorKind::Diffusion { coefficient: 0.5 }).unwrap();

        let rate = op.apply(&state, 0.0).unwrap();
        assert_relative_eq!(total(&rate, fv.grid().dx()), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_upwind_direction() {
        let fv = FiniteVolume::new(0.0, 1.0, 5, BoundaryKind::Periodic).unwrap();
        let state = fv.build_state(&|x| if x < 0.2 { 1.0 } else { 0.0 }).unwrap();

        let right = fv.build_operator(&OperatorKind::Advection { velocity: 1.0 }).unwrap();
        let rate = right.apply(&state, 0.0).unwrap().primary().real_parts();
        assert!(rate[0] < 0.0 && rate[1] > 0.0 && rate[4] == 0.0);

        let left = fv.build_operator(&OperatorKind::Advection { velocity: -1.0 }).unwrap();
        let rate = left.apply(&state, 0.0).unwrap().primary().real_parts();
        assert!(rate[0] < 0.0 && rate[4] > 0.0 && rate[1] == 0.0);
    }

    #[test]
    fn test_burgers_is_nonlinear_and_conservative() {
        let fv = FiniteVolume::new(0.0, 1.0, 16, BoundaryKind::Periodic).unwrap();
        let op = fv.build_operator(&OperatorKind::Burgers).unwrap();
        assert!(op.as_linear().is_none());

        let state = fv.build_state(&|x| 1.0 + (2.0 * std::f64::consts::PI * x).sin()).unwrap();
        let rate = op.apply(&state, 0.0).unwrap();
        assert_relative_eq!(total(&rate, fv.grid().dx()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_burgers_rejects_complex_states() {
        let fv = FiniteVolume::new(0.0, 1.0, 8, BoundaryKind::Periodic).unwrap();
        let op = fv.build_operator(&OperatorKind::Burgers).unwrap();
        let state = fv.build_state(&|x| x).unwrap().to_complex();
        assert!(matches!(op.apply(&state, 0.0), Err(EvolutionError::UnsupportedValueKind { .. })));
    }

    #[test]
    fn test_uniform_state_is_steady_under_burgers() {
        let fv = FiniteVolume::new(0.0, 1.0, 8, BoundaryKind::Periodic).unwrap();
        let op = fv.build_operator(&OperatorKind::Burgers).unwrap();
        let state = fv.build_state(&|_| 0.7).unwrap();
        for r in op.apply(&state, 0.0).unwrap().primary().real_parts() {
            assert_relative_eq!(r, 0.0, epsilon = 1e-14);
        }
    }
}
