//! Spectral discretizations
//!
//! - **Fourier**: periodic domains only. Operators are diagonal in wavenumber
//!   space and applied through forward/inverse FFTs. The truncation is the
//!   highest retained wavenumber index; higher modes are filtered out.
//! - **Chebyshev**: collocation on Gauss–Lobatto nodes with dense
//!   differentiation matrices. The truncation is the polynomial degree.
//!   Dirichlet walls are nodes: their rows are zeroed so wall values stay put.

use nalgebra::DMatrix;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::discretization::{Discretization, OperatorKind, hamiltonian_from};
use crate::error::{EvolutionError, Result};
use crate::operator::{LinearOperator, MatrixOperator, Operator, OperatorMatrix, OperatorRef};
use crate::physics::{BoundaryKind, DomainDescriptor, FieldData, GridType, State, ValueKind};

/// Smallest Fourier grid
const MIN_FOURIER_POINTS: usize = 4;

/// Spectral basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectralBasis {
    Fourier,
    Chebyshev,
}

impl fmt::Display for SpectralBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralBasis::Fourier => write!(f, "Fourier"),
            SpectralBasis::Chebyshev => write!(f, "Chebyshev"),
        }
    }
}

// =================================================================================================
// Spectral backend
// =================================================================================================

/// Spectral backend
///
/// # Example
///
/// ```rust
/// use physkit::discretization::{Discretization, OperatorKind, Spectral};
/// use physkit::physics::BoundaryKind;
///
/// // the basis can be built on any tag, but Fourier operators need periodicity
/// let spectral = Spectral::fourier(0.0, 1.0, 32, BoundaryKind::Dirichlet).unwrap();
/// assert!(spectral.build_operator(&OperatorKind::Laplacian).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Spectral {
    basis: SpectralBasis,
    truncation: usize,
    domain: DomainDescriptor,
}

impl Spectral {
    /// Fourier collocation on `points` left-closed nodes, all modes retained
    pub fn fourier(a: f64, b: f64, points: usize, boundary: BoundaryKind) -> Result<Self> {
        if points < MIN_FOURIER_POINTS {
            return Err(EvolutionError::discretization(format!(
                "Fourier collocation needs at least {MIN_FOURIER_POINTS} points, got {points}"
            )));
        }
        let domain = DomainDescriptor::uniform(a, b, points, GridType::LeftClosed, boundary)?;
        Ok(Self { basis: SpectralBasis::Fourier, truncation: points / 2, domain })
    }

    /// Chebyshev collocation of polynomial `degree` (`degree + 1` nodes)
    pub fn chebyshev(a: f64, b: f64, degree: usize, boundary: BoundaryKind) -> Result<Self> {
        let domain = DomainDescriptor::chebyshev(a, b, degree, boundary)?;
        Ok(Self { basis: SpectralBasis::Chebyshev, truncation: degree, domain })
    }

    /// Change the truncation order
    ///
    /// Fourier: highest retained wavenumber index, `1..=points/2`.
    /// Chebyshev: polynomial degree, rebuilds the node set.
    pub fn with_truncation(self, truncation: usize) -> Result<Self> {
        match self.basis {
            SpectralBasis::Fourier => {
                let max = self.domain.points() / 2;
                if truncation == 0 || truncation > max {
                    return Err(EvolutionError::discretization(format!(
                        "Fourier truncation must be in 1..={max}, got {truncation}"
                    )));
                }
                Ok(Self { truncation, ..self })
            }
            SpectralBasis::Chebyshev => {
                Self::chebyshev(self.domain.lower(), self.domain.upper(), truncation, self.domain.boundary())
            }
        }
    }

    pub fn basis(&self) -> SpectralBasis {
        self.basis
    }

    pub fn truncation(&self) -> usize {
        self.truncation
    }

    // ======================================= Fourier ============================================

    fn fourier_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        if self.domain.boundary() != BoundaryKind::Periodic {
            return Err(EvolutionError::discretization(format!(
                "the Fourier basis needs a periodic domain, {kind} requested on a {} domain",
                self.domain.boundary()
            )));
        }

        let n = self.domain.points();
        let k0 = 2.0 * PI / self.domain.length();
        let nyquist = n % 2 == 0;

        if *kind == OperatorKind::Burgers {
            return Err(EvolutionError::discretization(
                "the Burgers flux is only provided by the finite-volume backend",
            ));
        }

        let zero = Complex64::new(0.0, 0.0);
        let multipliers = (0..n)
            .map(|j| {
                // signed wavenumber index of FFT bin j
                let index = if j <= n / 2 { j as i64 } else { j as i64 - n as i64 };
                if index.unsigned_abs() as usize > self.truncation {
                    return zero;
                }
                let k = k0 * index as f64;
                let ik = if nyquist && j == n / 2 { zero } else { Complex64::new(0.0, k) };

                match kind {
                    OperatorKind::Identity => Complex64::new(1.0, 0.0),
                    OperatorKind::FirstDerivative => ik,
                    OperatorKind::Laplacian | OperatorKind::Hamiltonian { .. } => Complex64::new(-k * k, 0.0),
                    OperatorKind::Diffusion { coefficient } => Complex64::new(-coefficient * k * k, 0.0),
                    OperatorKind::Advection { velocity } => ik * -velocity,
                    OperatorKind::Burgers => zero,
                }
            })
            .collect();

        let name = match kind {
            OperatorKind::Hamiltonian { .. } => "laplacian",
            other => other.name(),
        };
        let op: OperatorRef = Arc::new(FourierOperator::new(name, self.domain.clone(), multipliers)?);

        match kind {
            OperatorKind::Hamiltonian { mass, hbar, potential } => hamiltonian_from(op, *mass, *hbar, potential.as_ref()),
            _ => Ok(op),
        }
    }

    // ======================================= Chebyshev ==========================================

    /// First-derivative collocation matrix on the (ascending) nodes
    ///
    /// Barycentric formula: `D_ij = (w_j / w_i) / (x_i - x_j)`, `D_ii = -Σ_{j≠i} D_ij`
    /// with Lobatto weights `w_j = (-1)^j·δ_j`, `δ = ½` at both ends.
    fn chebyshev_derivative(&self) -> DMatrix<f64> {
        let x = self.domain.coordinates();
        let n = x.len();
        let weight = |j: usize| -> f64 {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            if j == 0 || j == n - 1 { 0.5 * sign } else { sign }
        };

        let mut d = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            let mut diagonal = 0.0;
            for j in 0..n {
                if i != j {
                    let value = weight(j) / weight(i) / (x[i] - x[j]);
                    d[(i, j)] = value;
                    diagonal -= value;
                }
            }
            d[(i, i)] = diagonal;
        }
        d
    }

    fn chebyshev_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        let boundary = self.domain.boundary();
        if matches!(boundary, BoundaryKind::Periodic | BoundaryKind::Neumann) {
            return Err(EvolutionError::discretization(format!(
                "the Chebyshev basis supports Dirichlet or open boundaries, {kind} requested on a {boundary} domain"
            )));
        }

        let n = self.domain.points();
        let d = self.chebyshev_derivative();
        let d2 = &d * &d;

        let matrix = match kind {
            OperatorKind::Identity => DMatrix::identity(n, n),
            OperatorKind::FirstDerivative => d,
            OperatorKind::Laplacian | OperatorKind::Hamiltonian { .. } => d2,
            OperatorKind::Diffusion { coefficient } => d2 * *coefficient,
            OperatorKind::Advection { velocity } => {
                if boundary == BoundaryKind::Dirichlet {
                    return Err(EvolutionError::discretization(
                        "advection on a Chebyshev basis with Dirichlet walls has no inflow treatment; use open boundaries",
                    ));
                }
                d * -*velocity
            }
            OperatorKind::Burgers => {
                return Err(EvolutionError::discretization(
                    "the Burgers flux is only provided by the finite-volume backend",
                ));
            }
        };

        let matrix = if boundary == BoundaryKind::Dirichlet && *kind != OperatorKind::Identity {
            pin_walls(matrix)
        } else {
            matrix
        };

        let name = match kind {
            OperatorKind::Hamiltonian { .. } => "laplacian",
            other => other.name(),
        };
        let op: OperatorRef = Arc::new(MatrixOperator::new(name, self.domain.clone(), OperatorMatrix::Real(matrix))?);

        match kind {
            OperatorKind::Hamiltonian { mass, hbar, potential } => {
                // keep the walls pinned for the potential term as well
                let potential = potential.as_ref().map(|v| {
                    let mut v = v.clone();
                    if boundary == BoundaryKind::Dirichlet {
                        v[0] = 0.0;
                        v[n - 1] = 0.0;
                    }
                    v
                });
                hamiltonian_from(op, *mass, *hbar, potential.as_ref())
            }
            _ => Ok(op),
        }
    }
}

/// Zero the first and last rows so Dirichlet wall values never change
fn pin_walls(mut matrix: DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    matrix.row_mut(0).fill(0.0);
    matrix.row_mut(n - 1).fill(0.0);
    matrix
}

impl Discretization for Spectral {
    fn name(&self) -> &str {
        match self.basis {
            SpectralBasis::Fourier => "Fourier spectral",
            SpectralBasis::Chebyshev => "Chebyshev spectral",
        }
    }

    fn domain_descriptor(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn construct_operator(&self, kind: &OperatorKind) -> Result<OperatorRef> {
        match self.basis {
            SpectralBasis::Fourier => self.fourier_operator(kind),
            SpectralBasis::Chebyshev => self.chebyshev_operator(kind),
        }
    }
}

// =================================================================================================
// Fourier operator
// =================================================================================================

/// Diagonal multiplier in Fourier space, applied with FFTs
///
/// Multipliers are indexed by FFT bin. Hermitian multipliers
/// (`m[n-j] = conj(m[j])`, which every operator the spectral backend builds
/// satisfies) map real inputs to real outputs. Any other multiplier set is
/// restricted to complex states, and its matrix is complex.
#[derive(Clone)]
pub struct FourierOperator {
    name: String,
    domain: DomainDescriptor,
    multipliers: Vec<Complex64>,
    hermitian: bool,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FourierOperator {
    pub fn new(name: impl Into<String>, domain: DomainDescriptor, multipliers: Vec<Complex64>) -> Result<Self> {
        let name = name.into();
        let n = domain.points();
        if multipliers.len() != n {
            return Err(EvolutionError::shape(format!(
                "operator '{name}' has {} multipliers for {n} points",
                multipliers.len()
            )));
        }

        let hermitian = is_hermitian(&multipliers);
        if !hermitian {
            log::debug!("operator '{name}' has non-Hermitian multipliers and needs complex states");
        }

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        Ok(Self { name, domain, multipliers, hermitian, forward, inverse })
    }

    pub fn multipliers(&self) -> &[Complex64] {
        &self.multipliers
    }

    /// Whether real inputs stay real
    pub fn is_hermitian(&self) -> bool {
        self.hermitian
    }

    fn transform(&self, values: Vec<Complex64>) -> Vec<Complex64> {
        let mut buffer = values;
        let norm = 1.0 / buffer.len() as f64;

        self.forward.process(&mut buffer);
        for (hat, m) in buffer.iter_mut().zip(&self.multipliers) {
            *hat *= *m * norm;
        }
        self.inverse.process(&mut buffer);
        buffer
    }

    fn apply_field(&self, data: &FieldData) -> FieldData {
        let values = data.to_complex().iter().copied().collect();
        let out = self.transform(values);
        match data {
            FieldData::Real(_) => FieldData::from_vec(out.iter().map(|z| z.re).collect()),
            FieldData::Complex(_) => FieldData::from_complex_vec(out),
        }
    }
}

/// Relative slack when comparing `m[n-j]` with `conj(m[j])`
const HERMITIAN_TOLERANCE: f64 = 1e-12;

fn is_hermitian(multipliers: &[Complex64]) -> bool {
    let n = multipliers.len();
    let scale = multipliers.iter().map(|m| m.norm()).fold(1.0, f64::max);
    (0..n).all(|j| (multipliers[(n - j) % n] - multipliers[j].conj()).norm() <= HERMITIAN_TOLERANCE * scale)
}

impl fmt::Debug for FourierOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FourierOperator")
            .field("name", &self.name)
            .field("domain", &self.domain.to_string())
            .field("modes", &self.multipliers.len())
            .field("hermitian", &self.hermitian)
            .finish()
    }
}

impl Operator for FourierOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn evaluate(&self, state: &State, _t: f64) -> Result<State> {
        state.map_fields(|_, data| Ok(self.apply_field(data)))
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        (!self.hermitian).then_some(ValueKind::Complex)
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        Some(self)
    }
}

impl LinearOperator for FourierOperator {
    /// Columns are the images of the unit vectors; real for Hermitian multipliers
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        let n = self.domain.points();
        let columns: Vec<Vec<Complex64>> = (0..n)
            .map(|j| {
                let mut unit = vec![Complex64::new(0.0, 0.0); n];
                unit[j] = Complex64::new(1.0, 0.0);
                self.transform(unit)
            })
            .collect();

        if self.hermitian {
            Ok(OperatorMatrix::Real(DMatrix::from_fn(n, n, |i, j| columns[j][i].re)))
        } else {
            Ok(OperatorMatrix::Complex(DMatrix::from_fn(n, n, |i, j| columns[j][i])))
        }
    }
}
