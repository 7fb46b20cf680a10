//! Stencil operators with ghost-point boundary rules
//!
//! A stencil computes `(Lu)_i = Σ_k w_k · u_{i+o_k}`. Indices that fall
//! outside the grid are resolved by a [`GhostRule`] chosen from the domain's
//! boundary kind and sampling layout:
//!
//! ```text
//!                 node-centred (FD)        face-centred (FV)
//! periodic        Wrap                     Wrap
//! Dirichlet       OddAboutNode             OddAboutFace
//! Neumann         EvenAboutNode            EvenAboutFace
//! open            Extrapolate              EvenAboutFace
//! ```
//!
//! Every rule is linear in `u`, so stencil operators always have a matrix.

use nalgebra::DMatrix;
use std::fmt;
use std::ops::{Add, Mul};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{EvolutionError, Result};
use crate::operator::{LinearOperator, Operator, OperatorMatrix};
use crate::physics::{DomainDescriptor, FieldData, State};

// =================================================================================================
// Ghost rules
// =================================================================================================

/// How a stencil reads values beyond the grid edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GhostRule {
    /// Periodic wrap-around
    Wrap,

    /// Zero wall one spacing outside the grid, odd reflection about it
    /// (`u_{-1} = 0`, `u_{-1-k} = -u_{k-1}`)
    OddAboutNode,

    /// Mirror about the edge node (`u_{-k} = u_k`)
    EvenAboutNode,

    /// Zero wall on the cell face, odd reflection (`u_{-k} = -u_{k-1}`)
    OddAboutFace,

    /// Mirror about the cell face (`u_{-k} = u_{k-1}`)
    EvenAboutFace,

    /// Linear extrapolation from the two edge values
    Extrapolate,
}

/// Resolved ghost read: zero, one weighted sample or two weighted samples
#[derive(Debug, Clone, Copy, PartialEq)]
enum Tap {
    Zero,
    One(usize, f64),
    Two(usize, f64, usize, f64),
}

impl GhostRule {
    /// Minimum grid size for the rule to be well defined
    fn min_points(&self) -> usize {
        match self {
            GhostRule::Extrapolate => 2,
            _ => 1,
        }
    }

    /// Value of `u` at index `j`, which may lie outside the grid
    pub(crate) fn sample(&self, u: &[f64], j: isize) -> f64 {
        match self.resolve(j, u.len()) {
            Tap::Zero => 0.0,
            Tap::One(i, s) => s * u[i],
            Tap::Two(i, a, k, b) => a * u[i] + b * u[k],
        }
    }

    fn resolve(&self, j: isize, n: usize) -> Tap {
        let last = n as isize - 1;
        if (0..=last).contains(&j) {
            return Tap::One(j as usize, 1.0);
        }

        let n = n as isize;
        match self {
            GhostRule::Wrap => Tap::One(j.rem_euclid(n) as usize, 1.0),
            GhostRule::OddAboutNode => {
                if j == -1 || j == n {
                    Tap::Zero
                } else if j < 0 {
                    Tap::One((-2 - j) as usize, -1.0)
                } else {
                    Tap::One((2 * n - j) as usize, -1.0)
                }
            }
            GhostRule::EvenAboutNode => {
                if j < 0 {
                    Tap::One((-j) as usize, 1.0)
                } else {
                    Tap::One((2 * last - j) as usize, 1.0)
                }
            }
            GhostRule::OddAboutFace => {
                if j < 0 {
                    Tap::One((-j - 1) as usize, -1.0)
                } else {
                    Tap::One((2 * n - 1 - j) as usize, -1.0)
                }
            }
            GhostRule::EvenAboutFace => {
                if j < 0 {
                    Tap::One((-j - 1) as usize, 1.0)
                } else {
                    Tap::One((2 * n - 1 - j) as usize, 1.0)
                }
            }
            GhostRule::Extrapolate => {
                if j < 0 {
                    let k = (-j) as f64;
                    Tap::Two(0, 1.0 + k, 1, -k)
                } else {
                    let k = (j - last) as f64;
                    Tap::Two(last as usize, 1.0 + k, (last - 1) as usize, -k)
                }
            }
        }
    }
}

// =================================================================================================
// Stencil operator
// =================================================================================================

/// Linear constant-coefficient stencil applied to every field of a state
///
/// # Example
///
/// ```rust
/// use physkit::operator::{GhostRule, Operator, StencilOperator};
/// use physkit::physics::{BoundaryKind, DomainDescriptor, Field, FieldData, GridType, State};
///
/// let domain = DomainDescriptor::uniform(0.0, 4.0, 4, GridType::LeftClosed, BoundaryKind::Periodic).unwrap();
/// let shift = StencilOperator::new("shift", domain.clone(), vec![(1, 1.0)], GhostRule::Wrap).unwrap();
///
/// let state = State::new(domain, Field::Value, FieldData::from_vec(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
/// let shifted = shift.apply(&state, 0.0).unwrap();
/// assert_eq!(shifted.primary().real_parts(), vec![2.0, 3.0, 4.0, 1.0]);
/// ```
#[derive(Clone, PartialEq)]
pub struct StencilOperator {
    name: String,
    domain: DomainDescriptor,
    offsets: Vec<isize>,
    weights: Vec<f64>,
    ghost: GhostRule,
}

impl StencilOperator {
    /// Build from `(offset, weight)` taps
    ///
    /// Fails with `DiscretizationError` when the domain has fewer points than
    /// the stencil is wide.
    pub fn new(
        name: impl Into<String>,
        domain: DomainDescriptor,
        taps: Vec<(isize, f64)>,
        ghost: GhostRule,
    ) -> Result<Self> {
        let name = name.into();
        if taps.is_empty() {
            return Err(EvolutionError::discretization(format!("stencil '{name}' has no taps")));
        }

        let lowest = taps.iter().map(|(o, _)| *o).min().unwrap_or(0).min(0);
        let highest = taps.iter().map(|(o, _)| *o).max().unwrap_or(0).max(0);
        let width = (highest - lowest + 1) as usize;
        let points = domain.points();

        if points < width.max(ghost.min_points()) {
            return Err(EvolutionError::discretization(format!(
                "a {width}-point stencil ('{name}') needs at least {width} points, domain has {points}"
            )));
        }

        let (offsets, weights) = taps.into_iter().unzip();
        Ok(Self { name, domain, offsets, weights, ghost })
    }

    /// Same stencil with every weight multiplied by `factor`
    pub fn scaled(&self, name: impl Into<String>, factor: f64) -> Self {
        Self {
            name: name.into(),
            domain: self.domain.clone(),
            offsets: self.offsets.clone(),
            weights: self.weights.iter().map(|w| w * factor).collect(),
            ghost: self.ghost,
        }
    }

    pub fn ghost_rule(&self) -> GhostRule {
        self.ghost
    }

    /// `(offset, weight)` pairs
    pub fn taps(&self) -> Vec<(isize, f64)> {
        self.offsets.iter().copied().zip(self.weights.iter().copied()).collect()
    }

    fn apply_slice<T>(&self, u: &[T]) -> Vec<T>
    where
        T: Copy + Default + Send + Sync + Add<Output = T> + Mul<f64, Output = T>,
    {
        let n = u.len();
        let row = |i: usize| -> T {
            let mut acc = T::default();
            for (&offset, &w) in self.offsets.iter().zip(&self.weights) {
                acc = match self.ghost.resolve(i as isize + offset, n) {
                    Tap::Zero => acc,
                    Tap::One(j, s) => acc + u[j] * (w * s),
                    Tap::Two(j, a, k, b) => acc + u[j] * (w * a) + u[k] * (w * b),
                };
            }
            acc
        };

        #[cfg(feature = "parallel")]
        {
            if crate::solver::runs_in_parallel(n * self.offsets.len()) {
                return (0..n).into_par_iter().map(&row).collect();
            }
        }

        (0..n).map(&row).collect()
    }

    fn apply_field(&self, data: &FieldData) -> FieldData {
        match data {
            FieldData::Real(v) => FieldData::from_vec(self.apply_slice(v.as_slice())),
            FieldData::Complex(v) => FieldData::from_complex_vec(self.apply_slice(v.as_slice())),
        }
    }
}

impl fmt::Debug for StencilOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StencilOperator")
            .field("name", &self.name)
            .field("domain", &self.domain.to_string())
            .field("taps", &self.taps())
            .field("ghost", &self.ghost)
            .finish()
    }
}

impl Operator for StencilOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn evaluate(&self, state: &State, _t: f64) -> Result<State> {
        state.map_fields(|_, data| Ok(self.apply_field(data)))
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        Some(self)
    }
}

impl LinearOperator for StencilOperator {
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        let n = self.domain.points();
        let mut matrix = DMatrix::<f64>::zeros(n, n);

        for i in 0..n {
            for (&offset, &w) in self.offsets.iter().zip(&self.weights) {
                match self.ghost.resolve(i as isize + offset, n) {
                    Tap::Zero => {}
                    Tap::One(j, s) => matrix[(i, j)] += w * s,
                    Tap::Two(j, a, k, b) => {
                        matrix[(i, j)] += w * a;
                        matrix[(i, k)] += w * b;
                    }
                }
            }
        }

        Ok(OperatorMatrix::Real(matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BoundaryKind, Field, GridType};
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    fn domain(n: usize, grid_type: GridType, boundary: BoundaryKind) -> DomainDescriptor {
        DomainDescriptor::uniform(0.0, 1.0, n, grid_type, boundary).unwrap()
    }

    fn second_difference(domain: DomainDescriptor, ghost: GhostRule) -> StencilOperator {
        StencilOperator::new("d2", domain, vec![(-1, 1.0), (0, -2.0), (1, 1.0)], ghost).unwrap()
    }

    #[test]
    fn test_ghost_rules_resolve() {
        let n = 4;
        assert_eq!(GhostRule::Wrap.resolve(-1, n), Tap::One(3, 1.0));
        assert_eq!(GhostRule::Wrap.resolve(4, n), Tap::One(0, 1.0));

        assert_eq!(GhostRule::OddAboutNode.resolve(-1, n), Tap::Zero);
        assert_eq!(GhostRule::OddAboutNode.resolve(-2, n), Tap::One(0, -1.0));
        assert_eq!(GhostRule::OddAboutNode.resolve(4, n), Tap::Zero);
        assert_eq!(GhostRule::OddAboutNode.resolve(5, n), Tap::One(3, -1.0));

        assert_eq!(GhostRule::EvenAboutNode.resolve(-1, n), Tap::One(1, 1.0));
        assert_eq!(GhostRule::EvenAboutNode.resolve(4, n), Tap::One(2, 1.0));

        assert_eq!(GhostRule::OddAboutFace.resolve(-1, n), Tap::One(0, -1.0));
        assert_eq!(GhostRule::EvenAboutFace.resolve(4, n), Tap::One(3, 1.0));

        assert_eq!(GhostRule::Extrapolate.resolve(-1, n), Tap::Two(0, 2.0, 1, -1.0));
        assert_eq!(GhostRule::Extrapolate.resolve(5, n), Tap::Two(3, 3.0, 2, -2.0));
    }

    #[test]
    fn test_too_few_points_rejected_at_construction() {
        let result = StencilOperator::new(
            "d2",
            domain(2, GridType::Closed, BoundaryKind::Neumann),
            vec![(-1, 1.0), (0, -2.0), (1, 1.0)],
            GhostRule::EvenAboutNode,
        );
        assert!(matches!(result, Err(EvolutionError::DiscretizationError(_))));
    }

    #[test]
    fn test_dirichlet_second_difference_matrix() {
        let op = second_difference(domain(3, GridType::Interior, BoundaryKind::Dirichlet), GhostRule::OddAboutNode);
        let m = op.as_matrix().unwrap();
        let m = m.as_real().unwrap();

        let expected = DMatrix::from_row_slice(3, 3, &[-2.0, 1.0, 0.0, 1.0, -2.0, 1.0, 0.0, 1.0, -2.0]);
        assert_eq!(*m, expected);
    }

    #[test]
    fn test_neumann_preserves_constants() {
        let d = domain(5, GridType::Closed, BoundaryKind::Neumann);
        let op = second_difference(d.clone(), GhostRule::EvenAboutNode);
        let state = State::new(d, Field::Value, FieldData::uniform(5, 3.0)).unwrap();

        let out = op.apply(&state, 0.0).unwrap();
        for x in out.primary().real_parts() {
            assert_relative_eq!(x, 0.0);
        }
    }

    #[test]
    fn test_extrapolation_annihilates_linear_profiles() {
        let d = domain(5, GridType::Closed, BoundaryKind::Open);
        let op = second_difference(d.clone(), GhostRule::Extrapolate);
        let line: Vec<f64> = d.coordinates().iter().map(|x| 2.0 * x + 1.0).collect();
        let state = State::new(d, Field::Value, FieldData::from_vec(line)).unwrap();

        let out = op.apply(&state, 0.0).unwrap();
        for x in out.primary().real_parts() {
            assert_relative_eq!(x, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_matrix_matches_apply_complex() {
        let d = domain(6, GridType::LeftClosed, BoundaryKind::Periodic);
        let op = StencilOperator::new(
            "d1",
            d.clone(),
            vec![(-2, 1.0 / 12.0), (-1, -2.0 / 3.0), (1, 2.0 / 3.0), (2, -1.0 / 12.0)],
            GhostRule::Wrap,
        )
        .unwrap();

        let values: Vec<Complex64> = (0..6).map(|i| Complex64::new(i as f64, (i * i) as f64)).collect();
        let state = State::new(d, Field::WaveFunction, FieldData::from_complex_vec(values)).unwrap();

        let direct = op.apply(&state, 0.0).unwrap();
        let via_matrix = op.as_matrix().unwrap().apply_to_state(&state).unwrap();

        for (a, b) in direct.primary().to_complex().iter().zip(via_matrix.primary().to_complex().iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scaled_stencil() {
        let d = domain(3, GridType::Interior, BoundaryKind::Dirichlet);
        let op = second_difference(d, GhostRule::OddAboutNode).scaled("half", 0.5);
        assert_eq!(op.taps(), vec![(-1, 0.5), (0, -1.0), (1, 0.5)]);
        assert_eq!(op.name(), "half");
    }
}
