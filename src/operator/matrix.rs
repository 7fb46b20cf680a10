//! Explicit matrices and matrix-backed operators

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use std::fmt;

use crate::error::{EvolutionError, Result};
use crate::operator::{LinearOperator, Operator};
use crate::physics::{DomainDescriptor, FieldData, State, ValueKind};

// =================================================================================================
// Operator matrix
// =================================================================================================

/// Dense real or complex matrix of a linear operator
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorMatrix {
    Real(DMatrix<f64>),
    Complex(DMatrix<Complex64>),
}

impl OperatorMatrix {
    pub fn identity(n: usize) -> Self {
        OperatorMatrix::Real(DMatrix::identity(n, n))
    }

    pub fn nrows(&self) -> usize {
        match self {
            OperatorMatrix::Real(m) => m.nrows(),
            OperatorMatrix::Complex(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            OperatorMatrix::Real(m) => m.ncols(),
            OperatorMatrix::Complex(m) => m.ncols(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            OperatorMatrix::Real(_) => ValueKind::Real,
            OperatorMatrix::Complex(_) => ValueKind::Complex,
        }
    }

    pub fn as_real(&self) -> Option<&DMatrix<f64>> {
        match self {
            OperatorMatrix::Real(m) => Some(m),
            OperatorMatrix::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&DMatrix<Complex64>> {
        match self {
            OperatorMatrix::Complex(m) => Some(m),
            OperatorMatrix::Real(_) => None,
        }
    }

    /// Explicit widening to a complex matrix
    pub fn to_complex(&self) -> DMatrix<Complex64> {
        match self {
            OperatorMatrix::Real(m) => m.map(|x| Complex64::new(x, 0.0)),
            OperatorMatrix::Complex(m) => m.clone(),
        }
    }

    /// Entry `(i, j)` as a complex number
    pub fn get(&self, i: usize, j: usize) -> Option<Complex64> {
        match self {
            OperatorMatrix::Real(m) => m.get((i, j)).map(|&x| Complex64::new(x, 0.0)),
            OperatorMatrix::Complex(m) => m.get((i, j)).copied(),
        }
    }

    // ======================================= products ===========================================

    /// Matrix-vector product
    ///
    /// A complex matrix cannot act on a real vector: the result would not be
    /// real, and states never change kind implicitly.
    pub fn apply_to_field(&self, data: &FieldData) -> Result<FieldData> {
        if data.len() != self.ncols() {
            return Err(EvolutionError::shape(format!(
                "matrix with {} columns applied to {} samples",
                self.ncols(),
                data.len()
            )));
        }

        match (self, data) {
            (OperatorMatrix::Real(m), FieldData::Real(v)) => Ok(FieldData::Real(m * v)),
            (OperatorMatrix::Real(m), FieldData::Complex(v)) => {
                let re: DVector<f64> = v.map(|z| z.re);
                let im: DVector<f64> = v.map(|z| z.im);
                let (re, im) = (m * re, m * im);
                Ok(FieldData::Complex(re.zip_map(&im, Complex64::new)))
            }
            (OperatorMatrix::Complex(m), FieldData::Complex(v)) => Ok(FieldData::Complex(m * v)),
            (OperatorMatrix::Complex(_), FieldData::Real(_)) => {
                Err(EvolutionError::unsupported(ValueKind::Real, "a complex operator matrix"))
            }
        }
    }

    /// Apply to a whole state
    ///
    /// A matrix sized for the flattened state acts on all fields at once; a
    /// `points × points` block acts on each field separately.
    pub fn apply_to_state(&self, state: &State) -> Result<State> {
        if self.ncols() == state.len() {
            state.unflatten(self.apply_to_field(&state.flatten())?)
        } else if self.ncols() == state.points() {
            state.map_fields(|_, data| self.apply_to_field(data))
        } else {
            Err(EvolutionError::shape(format!(
                "{}x{} matrix cannot act on {state}",
                self.nrows(),
                self.ncols()
            )))
        }
    }

    /// Matrix acting on the flattened vector of `state`
    ///
    /// Per-field blocks are repeated along the diagonal once per field.
    pub fn expanded_for(&self, state: &State) -> Result<OperatorMatrix> {
        let blocks = state.field_count();
        if self.ncols() == state.len() {
            return Ok(self.clone());
        }
        if self.ncols() != state.points() {
            return Err(EvolutionError::shape(format!(
                "{}x{} matrix does not match {state}",
                self.nrows(),
                self.ncols()
            )));
        }

        let n = self.ncols();
        let size = n * blocks;
        Ok(match self {
            OperatorMatrix::Real(m) => OperatorMatrix::Real(DMatrix::from_fn(size, size, |i, j| {
                if i / n == j / n { m[(i % n, j % n)] } else { 0.0 }
            })),
            OperatorMatrix::Complex(m) => OperatorMatrix::Complex(DMatrix::from_fn(size, size, |i, j| {
                if i / n == j / n { m[(i % n, j % n)] } else { Complex64::new(0.0, 0.0) }
            })),
        })
    }

    /// `self + other`
    pub fn add(&self, other: &OperatorMatrix) -> Result<OperatorMatrix> {
        self.check_same_size(other, "sum")?;
        Ok(match (self, other) {
            (OperatorMatrix::Real(a), OperatorMatrix::Real(b)) => OperatorMatrix::Real(a + b),
            _ => OperatorMatrix::Complex(self.to_complex() + other.to_complex()),
        })
    }

    /// `self · other` (other acts first)
    pub fn mul(&self, other: &OperatorMatrix) -> Result<OperatorMatrix> {
        self.check_same_size(other, "composition")?;
        Ok(match (self, other) {
            (OperatorMatrix::Real(a), OperatorMatrix::Real(b)) => OperatorMatrix::Real(a * b),
            _ => OperatorMatrix::Complex(self.to_complex() * other.to_complex()),
        })
    }

    /// Multiply every entry by `factor`; real matrices stay real for real factors
    pub fn scale(&self, factor: Complex64) -> OperatorMatrix {
        match self {
            OperatorMatrix::Real(m) if factor.im == 0.0 => OperatorMatrix::Real(m * factor.re),
            _ => OperatorMatrix::Complex(self.to_complex().map(|z| z * factor)),
        }
    }

    /// `I + factor · self`, the building block of implicit schemes
    pub fn shifted_identity(&self, factor: f64) -> OperatorMatrix {
        let n = self.nrows();
        match self {
            OperatorMatrix::Real(m) => OperatorMatrix::Real(DMatrix::identity(n, n) + m * factor),
            OperatorMatrix::Complex(m) => {
                OperatorMatrix::Complex(DMatrix::identity(n, n) + m.map(|z| z * factor))
            }
        }
    }

    fn check_same_size(&self, other: &OperatorMatrix, context: &str) -> Result<()> {
        if self.nrows() != other.nrows() || self.ncols() != other.ncols() {
            return Err(EvolutionError::shape(format!(
                "{context} of {}x{} and {}x{} matrices",
                self.nrows(),
                self.ncols(),
                other.nrows(),
                other.ncols()
            )));
        }
        Ok(())
    }
}

// =================================================================================================
// Matrix operator
// =================================================================================================

/// Linear operator defined by an explicit matrix
///
/// The matrix is either a `points × points` block applied to each field or a
/// square matrix over the flattened multi-field vector (for example the
/// `(q, p)` generator of a harmonic oscillator).
#[derive(Clone, PartialEq)]
pub struct MatrixOperator {
    name: String,
    domain: DomainDescriptor,
    matrix: OperatorMatrix,
}

impl MatrixOperator {
    pub fn new(name: impl Into<String>, domain: DomainDescriptor, matrix: OperatorMatrix) -> Result<Self> {
        let name = name.into();
        let points = domain.points();
        let n = matrix.nrows();

        if n != matrix.ncols() {
            return Err(EvolutionError::shape(format!(
                "operator '{name}' needs a square matrix, got {}x{}",
                n,
                matrix.ncols()
            )));
        }
        if points == 0 || n == 0 || n % points != 0 {
            return Err(EvolutionError::shape(format!(
                "operator '{name}': {n}x{n} matrix does not fit domain {domain}"
            )));
        }

        Ok(Self { name, domain, matrix })
    }

    /// Diagonal operator `u_i ↦ d_i · u_i`
    pub fn diagonal(name: impl Into<String>, domain: DomainDescriptor, diagonal: Vec<f64>) -> Result<Self> {
        let matrix = DMatrix::from_diagonal(&DVector::from_vec(diagonal));
        Self::new(name, domain, OperatorMatrix::Real(matrix))
    }

    pub fn identity(name: impl Into<String>, domain: DomainDescriptor) -> Self {
        let n = domain.points();
        Self { name: name.into(), domain, matrix: OperatorMatrix::identity(n) }
    }

    pub fn matrix(&self) -> &OperatorMatrix {
        &self.matrix
    }
}

impl fmt::Debug for MatrixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixOperator")
            .field("name", &self.name)
            .field("domain", &self.domain.to_string())
            .field("size", &self.matrix.nrows())
            .field("kind", &self.matrix.kind())
            .finish()
    }
}

impl Operator for MatrixOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn evaluate(&self, state: &State, _t: f64) -> Result<State> {
        self.matrix.apply_to_state(state)
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        match self.matrix {
            OperatorMatrix::Complex(_) => Some(ValueKind::Complex),
            OperatorMatrix::Real(_) => None,
        }
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        Some(self)
    }
}

impl LinearOperator for MatrixOperator {
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        Ok(self.matrix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Field;
    use approx::assert_relative_eq;

    fn two_field_state() -> State {
        State::from_fields(
            DomainDescriptor::lumped(2),
            vec![
                (Field::Position, FieldData::from_vec(vec![1.0, 2.0])),
                (Field::Momentum, FieldData::from_vec(vec![3.0, 4.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_block_matrix_acts_per_field() {
        let swap = OperatorMatrix::Real(DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]));
        let state = two_field_state();
        let out = swap.apply_to_state(&state).unwrap();

        assert_eq!(out.field(&Field::Position).unwrap().real_parts(), vec![2.0, 1.0]);
        assert_eq!(out.field(&Field::Momentum).unwrap().real_parts(), vec![4.0, 3.0]);
    }

    #[test]
    fn test_expanded_matrix_matches_block_application() {
        let block = OperatorMatrix::Real(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        let state = two_field_state();

        let expanded = block.expanded_for(&state).unwrap();
        assert_eq!(expanded.nrows(), 4);

        let a = block.apply_to_state(&state).unwrap();
        let b = expanded.apply_to_state(&state).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_real_matrix_on_complex_field() {
        let m = OperatorMatrix::Real(DMatrix::from_row_slice(1, 1, &[2.0]));
        let z = FieldData::from_complex_vec(vec![Complex64::new(1.0, -1.0)]);
        let out = m.apply_to_field(&z).unwrap();
        assert_eq!(out.get(0).unwrap(), Complex64::new(2.0, -2.0));
    }

    #[test]
    fn test_complex_matrix_rejects_real_field() {
        let m = OperatorMatrix::Real(DMatrix::identity(1, 1)).scale(Complex64::new(0.0, 1.0));
        assert_eq!(m.kind(), ValueKind::Complex);
        assert!(m.apply_to_field(&FieldData::from_vec(vec![1.0])).is_err());
    }

    #[test]
    fn test_add_mul_shifted_identity() {
        let a = OperatorMatrix::Real(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]));
        let b = OperatorMatrix::identity(2);

        let sum = a.add(&b).unwrap();
        assert_relative_eq!(sum.get(0, 0).unwrap().re, 2.0);

        let product = a.mul(&a).unwrap();
        assert_relative_eq!(product.get(0, 1).unwrap().re, 4.0);

        let shifted = a.shifted_identity(-0.5);
        assert_relative_eq!(shifted.get(0, 0).unwrap().re, 0.5);
        assert_relative_eq!(shifted.get(0, 1).unwrap().re, -1.0);

        assert!(a.add(&OperatorMatrix::identity(3)).is_err());
    }

    #[test]
    fn test_matrix_operator_validation() {
        let domain = DomainDescriptor::lumped(2);
        let rect = OperatorMatrix::Real(DMatrix::zeros(2, 3));
        assert!(MatrixOperator::new("rect", domain.clone(), rect).is_err());

        let wrong = OperatorMatrix::identity(3);
        assert!(MatrixOperator::new("wrong", domain.clone(), wrong).is_err());

        let full = OperatorMatrix::identity(4);
        assert!(MatrixOperator::new("full", domain, full).is_ok());
    }

    #[test]
    fn test_complex_matrix_operator_requires_complex_states() {
        let domain = DomainDescriptor::lumped(1);
        let m = OperatorMatrix::identity(1).scale(Complex64::new(0.0, -1.0));
        let op = MatrixOperator::new("rotation", domain, m).unwrap();

        let real = State::lumped(vec![1.0]).unwrap();
        assert!(matches!(op.apply(&real, 0.0), Err(EvolutionError::UnsupportedValueKind { .. })));

        let out = op.apply(&real.to_complex(), 0.0).unwrap();
        assert_eq!(out.primary().get(0).unwrap(), Complex64::new(0.0, -1.0));
    }
}
