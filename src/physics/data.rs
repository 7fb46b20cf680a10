//! Field data types
//!
//! A field is a vector of samples over a discretized domain. Samples are
//! either real (`f64`) or complex (`Complex64`); the value kind of a field
//! never changes implicitly. Widening a real field to complex is available
//! through [`FieldData::to_complex`], narrowing is never done silently.

use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{EvolutionError, Result};

// =================================================================================================
// Value kind
// =================================================================================================

/// Numeric kind of the samples stored in a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Real,
    Complex,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Real => write!(f, "real"),
            ValueKind::Complex => write!(f, "complex"),
        }
    }
}

// =================================================================================================
// Field data
// =================================================================================================

/// Samples of one field over a domain
///
/// # Storage Types
///
/// - **Real**: `DVector<f64>`, 8n bytes (diffusion profiles, positions, momenta)
/// - **Complex**: `DVector<Complex64>`, 16n bytes (wave functions)
///
/// # Examples
///
/// ```rust
/// use physkit::physics::{FieldData, ValueKind};
///
/// let a = FieldData::from_vec(vec![1.0, 2.0, 3.0]);
/// let b = FieldData::from_vec(vec![0.5, 0.5, 0.5]);
///
/// let c = a.axpy(2.0, &b).unwrap();
/// assert_eq!(c.as_real().unwrap().as_slice(), &[2.0, 3.0, 4.0]);
/// assert_eq!(c.kind(), ValueKind::Real);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    /// Real samples
    Real(DVector<f64>),

    /// Complex samples
    Complex(DVector<Complex64>),
}

impl FieldData {
    // ======================================= constructors =======================================

    /// Create a real field from a vector
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self::Real(DVector::from_vec(values))
    }

    /// Create a complex field from a vector
    pub fn from_complex_vec(values: Vec<Complex64>) -> Self {
        Self::Complex(DVector::from_vec(values))
    }

    /// Zero field of the given kind
    pub fn zeros(kind: ValueKind, len: usize) -> Self {
        match kind {
            ValueKind::Real => Self::Real(DVector::zeros(len)),
            ValueKind::Complex => Self::Complex(DVector::from_element(len, Complex64::new(0.0, 0.0))),
        }
    }

    /// Real field with every sample equal to `value`
    pub fn uniform(len: usize, value: f64) -> Self {
        Self::Real(DVector::from_element(len, value))
    }

    // ======================================= accessors ==========================================

    pub fn kind(&self) -> ValueKind {
        match self {
            FieldData::Real(_) => ValueKind::Real,
            FieldData::Complex(_) => ValueKind::Complex,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldData::Real(v) => v.len(),
            FieldData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_real(&self) -> bool {
        matches!(self, FieldData::Real(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, FieldData::Complex(_))
    }

    pub fn as_real(&self) -> Option<&DVector<f64>> {
        match self {
            FieldData::Real(v) => Some(v),
            FieldData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&DVector<Complex64>> {
        match self {
            FieldData::Complex(v) => Some(v),
            FieldData::Real(_) => None,
        }
    }

    /// Sample `i` as a complex number (real samples get a zero imaginary part)
    pub fn get(&self, i: usize) -> Option<Complex64> {
        match self {
            FieldData::Real(v) => v.get(i).map(|&x| Complex64::new(x, 0.0)),
            FieldData::Complex(v) => v.get(i).copied(),
        }
    }

    /// Explicit widening to complex samples
    pub fn to_complex(&self) -> DVector<Complex64> {
        match self {
            FieldData::Real(v) => v.map(|x| Complex64::new(x, 0.0)),
            FieldData::Complex(v) => v.clone(),
        }
    }

    /// Real parts of the samples
    pub fn real_parts(&self) -> Vec<f64> {
        match self {
            FieldData::Real(v) => v.iter().copied().collect(),
            FieldData::Complex(v) => v.iter().map(|z| z.re).collect(),
        }
    }

    /// Imaginary parts, `None` for real fields
    pub fn imag_parts(&self) -> Option<Vec<f64>> {
        match self {
            FieldData::Real(_) => None,
            FieldData::Complex(v) => Some(v.iter().map(|z| z.im).collect()),
        }
    }

    /// Squared magnitude of every sample
    pub fn norm_sqr(&self) -> Vec<f64> {
        match self {
            FieldData::Real(v) => v.iter().map(|x| x * x).collect(),
            FieldData::Complex(v) => v.iter().map(|z| z.norm_sqr()).collect(),
        }
    }

    /// Largest sample magnitude
    pub fn max_abs(&self) -> f64 {
        match self {
            FieldData::Real(v) => v.iter().fold(0.0, |m, x| m.max(x.abs())),
            FieldData::Complex(v) => v.iter().fold(0.0, |m, z| m.max(z.norm())),
        }
    }

    /// `true` when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        match self {
            FieldData::Real(v) => v.iter().all(|x| x.is_finite()),
            FieldData::Complex(v) => v.iter().all(|z| z.re.is_finite() && z.im.is_finite()),
        }
    }

    // ======================================= arithmetic =========================================

    /// `self + alpha * other`
    ///
    /// Both fields must have the same length and kind.
    pub fn axpy(&self, alpha: f64, other: &FieldData) -> Result<FieldData> {
        self.check_compatible(other)?;

        match (self, other) {
            (FieldData::Real(a), FieldData::Real(b)) => Ok(FieldData::Real(a.zip_map(b, |x, y| x + alpha * y))),
            (FieldData::Complex(a), FieldData::Complex(b)) => {
                Ok(FieldData::Complex(a.zip_map(b, |x, y| x + y * alpha)))
            }
            _ => Err(EvolutionError::unsupported(other.kind(), format!("{} field arithmetic", self.kind()))),
        }
    }

    /// Multiply every sample by a real factor
    pub fn scale(&self, factor: f64) -> FieldData {
        match self {
            FieldData::Real(v) => FieldData::Real(v * factor),
            FieldData::Complex(v) => FieldData::Complex(v.map(|z| z * factor)),
        }
    }

    /// Multiply every sample by a complex factor
    ///
    /// A real field only accepts factors with a zero imaginary part.
    pub fn scale_complex(&self, factor: Complex64) -> Result<FieldData> {
        match self {
            FieldData::Complex(v) => Ok(FieldData::Complex(v.map(|z| z * factor))),
            FieldData::Real(v) if factor.im == 0.0 => Ok(FieldData::Real(v * factor.re)),
            FieldData::Real(_) => Err(EvolutionError::unsupported(
                ValueKind::Real,
                format!("scaling by the complex factor {factor}"),
            )),
        }
    }

    /// Apply a function to each real sample
    ///
    /// Uses rayon above the crate parallel work threshold when compiled with the
    /// `parallel` feature.
    pub fn map_real<F>(&self, f: F) -> Result<FieldData>
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let values = self
            .as_real()
            .ok_or_else(|| EvolutionError::unsupported(ValueKind::Complex, "real sample map"))?;

        #[cfg(feature = "parallel")]
        {
            if crate::solver::runs_in_parallel(values.len()) {
                let mapped: Vec<f64> = values.as_slice().par_iter().map(|&x| f(x)).collect();
                return Ok(FieldData::from_vec(mapped));
            }
        }

        Ok(FieldData::Real(values.map(f)))
    }

    /// Sum over samples of `conj(self_i) * other_i`
    pub fn dot(&self, other: &FieldData) -> Result<Complex64> {
        if self.len() != other.len() {
            return Err(EvolutionError::shape(format!(
                "inner product of fields with {} and {} samples",
                self.len(),
                other.len()
            )));
        }

        let a = self.to_complex();
        let b = other.to_complex();
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum())
    }

    fn check_compatible(&self, other: &FieldData) -> Result<()> {
        if self.len() != other.len() {
            return Err(EvolutionError::shape(format!(
                "field lengths differ ({} vs {})",
                self.len(),
                other.len()
            )));
        }
        if self.kind() != other.kind() {
            return Err(EvolutionError::unsupported(other.kind(), format!("{} field arithmetic", self.kind())));
        }
        Ok(())
    }
}

impl fmt::Display for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldData::Real(v) => write!(f, "Real[{}]", v.len()),
            FieldData::Complex(v) => write!(f, "Complex[{}]", v.len()),
        }
    }
}

impl From<DVector<f64>> for FieldData {
    fn from(values: DVector<f64>) -> Self {
        FieldData::Real(values)
    }
}

impl From<DVector<Complex64>> for FieldData {
    fn from(values: DVector<Complex64>) -> Self {
        FieldData::Complex(values)
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kind_and_len() {
        let real = FieldData::from_vec(vec![1.0, 2.0]);
        assert_eq!(real.kind(), ValueKind::Real);
        assert_eq!(real.len(), 2);
        assert!(real.is_real());

        let complex = FieldData::zeros(ValueKind::Complex, 4);
        assert_eq!(complex.kind(), ValueKind::Complex);
        assert_eq!(complex.len(), 4);
        assert!(!complex.is_empty());
    }

    #[test]
    fn test_axpy_real_and_complex() {
        let a = FieldData::from_vec(vec![1.0, 1.0]);
        let b = FieldData::from_vec(vec![2.0, 4.0]);
        let c = a.axpy(0.5, &b).unwrap();
        assert_eq!(c.as_real().unwrap().as_slice(), &[2.0, 3.0]);

        let z = FieldData::from_complex_vec(vec![Complex64::new(1.0, 1.0)]);
        let w = FieldData::from_complex_vec(vec![Complex64::new(0.0, 2.0)]);
        let sum = z.axpy(-1.0, &w).unwrap();
        assert_eq!(sum.get(0).unwrap(), Complex64::new(1.0, -1.0));
    }

    #[test]
    fn test_axpy_rejects_mixed_kinds() {
        let a = FieldData::from_vec(vec![1.0]);
        let b = FieldData::zeros(ValueKind::Complex, 1);
        assert!(matches!(a.axpy(1.0, &b), Err(EvolutionError::UnsupportedValueKind { .. })));
    }

    #[test]
    fn test_axpy_rejects_length_mismatch() {
        let a = FieldData::from_vec(vec![1.0, 2.0]);
        let b = FieldData::from_vec(vec![1.0]);
        assert!(matches!(a.axpy(1.0, &b), Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_scale_complex_on_real() {
        let a = FieldData::from_vec(vec![2.0]);
        assert!(a.scale_complex(Complex64::new(3.0, 0.0)).unwrap().is_real());
        assert!(a.scale_complex(Complex64::new(0.0, 1.0)).is_err());
    }

    #[test]
    fn test_finite_detection() {
        assert!(FieldData::from_vec(vec![1.0, 2.0]).is_finite());
        assert!(!FieldData::from_vec(vec![1.0, f64::NAN]).is_finite());
        assert!(!FieldData::from_complex_vec(vec![Complex64::new(0.0, f64::INFINITY)]).is_finite());
    }

    #[test]
    fn test_dot_conjugates_left() {
        let a = FieldData::from_complex_vec(vec![Complex64::new(0.0, 1.0)]);
        let dot = a.dot(&a).unwrap();
        assert_relative_eq!(dot.re, 1.0);
        assert_relative_eq!(dot.im, 0.0);
    }

    #[test]
    fn test_map_real() {
        let a = FieldData::from_vec(vec![1.0, 2.0, 3.0]);
        let b = a.map_real(|x| x * x).unwrap();
        assert_eq!(b.as_real().unwrap().as_slice(), &[1.0, 4.0, 9.0]);

        assert!(FieldData::zeros(ValueKind::Complex, 2).map_real(|x| x).is_err());
    }

    #[test]
    fn test_max_abs_and_parts() {
        let z = FieldData::from_complex_vec(vec![Complex64::new(3.0, 4.0), Complex64::new(1.0, 0.0)]);
        assert_relative_eq!(z.max_abs(), 5.0);
        assert_eq!(z.real_parts(), vec![3.0, 1.0]);
        assert_eq!(z.imag_parts().unwrap(), vec![4.0, 0.0]);
        assert_eq!(z.norm_sqr(), vec![25.0, 1.0]);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldData::from_vec(vec![0.0; 3]).to_string(), "Real[3]");
        assert_eq!(ValueKind::Complex.to_string(), "complex");
    }
}
