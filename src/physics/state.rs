//! Immutable physical states
//!
//! A [`State`] is an ordered list of named fields sampled on one domain.
//! Every operation returns a new state; field storage is shared through
//! `Arc` and copied only when a derived state changes it.

use nalgebra::DVector;
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::physics::{DomainDescriptor, FieldData, ValueKind};

// =================================================================================================
// Field identifiers
// =================================================================================================

/// Name of a field inside a state
///
/// # Example
/// ```
/// use physkit::physics::Field;
///
/// let density = Field::custom("density");
/// assert_eq!(density.name(), "density");
/// assert_eq!(Field::from_name("position"), Field::Position);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Generic scalar unknown (diffusion profile, ODE vector, ...)
    Value,

    /// Generalized coordinate `q`
    Position,

    /// Conjugate momentum `p`
    Momentum,

    /// Complex amplitude ψ
    WaveFunction,

    /// User-defined field name
    Custom(Arc<str>),
}

impl Field {
    pub fn custom(name: &str) -> Self {
        Field::Custom(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Value => "value",
            Field::Position => "position",
            Field::Momentum => "momentum",
            Field::WaveFunction => "wave_function",
            Field::Custom(name) => name.as_ref(),
        }
    }

    /// Inverse of [`Field::name`]
    pub fn from_name(name: &str) -> Self {
        match name {
            "value" => Field::Value,
            "position" => Field::Position,
            "momentum" => Field::Momentum,
            "wave_function" => Field::WaveFunction,
            other => Field::custom(other),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =================================================================================================
// State
// =================================================================================================

/// Discretized snapshot of a physical configuration
///
/// # Invariants
///
/// - at least one field, no duplicate field names
/// - every field has `domain.points()` samples
/// - every field has the same [`ValueKind`]
///
/// # Example
/// ```
/// use physkit::physics::{DomainDescriptor, Field, FieldData, State};
///
/// let state = State::new(
///     DomainDescriptor::lumped(2),
///     Field::Value,
///     FieldData::from_vec(vec![1.0, 2.0]),
/// ).unwrap();
///
/// let doubled = &state * 2.0;
/// assert_eq!(doubled.field(&Field::Value).unwrap().real_parts(), vec![2.0, 4.0]);
/// // the original is untouched
/// assert_eq!(state.field(&Field::Value).unwrap().real_parts(), vec![1.0, 2.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    domain: Arc<DomainDescriptor>,
    fields: Arc<Vec<(Field, FieldData)>>,
}

impl State {
    // ======================================= constructors =======================================

    /// Single-field state
    pub fn new(domain: DomainDescriptor, field: Field, data: FieldData) -> Result<Self> {
        Self::from_fields(domain, vec![(field, data)])
    }

    /// Multi-field state, fields kept in the given order
    pub fn from_fields(domain: DomainDescriptor, fields: Vec<(Field, FieldData)>) -> Result<Self> {
        Self::with_shared_domain(Arc::new(domain), fields)
    }

    /// Real ODE system `dx/dt = f(x)` on a lumped domain
    pub fn lumped(values: Vec<f64>) -> Result<Self> {
        let domain = DomainDescriptor::lumped(values.len());
        Self::new(domain, Field::Value, FieldData::from_vec(values))
    }

    pub(crate) fn with_shared_domain(domain: Arc<DomainDescriptor>, fields: Vec<(Field, FieldData)>) -> Result<Self> {
        let Some((_, first)) = fields.first() else {
            return Err(EvolutionError::shape("a state needs at least one field"));
        };
        let kind = first.kind();
        let points = domain.points();

        for (i, (field, data)) in fields.iter().enumerate() {
            if data.len() != points {
                return Err(EvolutionError::shape(format!(
                    "field '{field}' has {} samples, domain {domain} has {points} points",
                    data.len()
                )));
            }
            if data.kind() != kind {
                return Err(EvolutionError::unsupported(
                    data.kind(),
                    format!("a {kind} state (field '{field}')"),
                ));
            }
            if fields[..i].iter().any(|(other, _)| other == field) {
                return Err(EvolutionError::shape(format!("duplicate field '{field}'")));
            }
        }

        Ok(Self { domain, fields: Arc::new(fields) })
    }

    // ======================================= accessors ==========================================

    pub fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    pub(crate) fn domain_arc(&self) -> &Arc<DomainDescriptor> {
        &self.domain
    }

    pub fn fields(&self) -> &[(Field, FieldData)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<Field> {
        self.fields.iter().map(|(f, _)| f.clone()).collect()
    }

    pub fn field(&self, field: &Field) -> Option<&FieldData> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, d)| d)
    }

    /// Like [`State::field`] but fails with `MissingField`
    pub fn require(&self, field: &Field, context: &str) -> Result<&FieldData> {
        self.field(field).ok_or_else(|| EvolutionError::MissingField {
            field: field.name().to_string(),
            context: context.to_string(),
        })
    }

    /// The first field (the only one for single-field states)
    pub fn primary(&self) -> &FieldData {
        &self.fields[0].1
    }

    pub fn value_kind(&self) -> ValueKind {
        self.primary().kind()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of points per field
    pub fn points(&self) -> usize {
        self.domain.points()
    }

    /// Total number of unknowns (`fields × points`)
    pub fn len(&self) -> usize {
        self.field_count() * self.points()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First field containing NaN or infinite samples
    pub fn first_non_finite(&self) -> Option<&Field> {
        self.fields.iter().find(|(_, d)| !d.is_finite()).map(|(f, _)| f)
    }

    pub fn is_finite(&self) -> bool {
        self.first_non_finite().is_none()
    }

    /// `true` when both states share domain, field names and value kind
    pub fn same_layout(&self, other: &State) -> bool {
        (Arc::ptr_eq(&self.domain, &other.domain) || self.domain == other.domain)
            && self.value_kind() == other.value_kind()
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|((a, _), (b, _))| a == b)
    }

    /// Fail unless both states share domain, field names and value kind
    pub fn ensure_same_layout(&self, other: &State, context: &str) -> Result<()> {
        self.domain.ensure_compatible(&other.domain, context)?;
        if self.value_kind() != other.value_kind() {
            return Err(EvolutionError::unsupported(
                other.value_kind(),
                format!("{context} on a {} state", self.value_kind()),
            ));
        }
        if !self.same_layout(other) {
            return Err(EvolutionError::shape(format!(
                "{context}: field layouts differ ({:?} vs {:?})",
                self.field_names(),
                other.field_names()
            )));
        }
        Ok(())
    }

    // ======================================= derived states =====================================

    /// New state with `field` replaced (or appended when absent)
    pub fn with_field(&self, field: Field, data: FieldData) -> Result<State> {
        let mut fields = (*self.fields).clone();
        match fields.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = data,
            None => fields.push((field, data)),
        }
        Self::with_shared_domain(Arc::clone(&self.domain), fields)
    }

    /// New state on the same domain built field by field
    pub fn map_fields<F>(&self, mut f: F) -> Result<State>
    where
        F: FnMut(&Field, &FieldData) -> Result<FieldData>,
    {
        let fields = self
            .fields
            .iter()
            .map(|(field, data)| Ok((field.clone(), f(field, data)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::with_shared_domain(Arc::clone(&self.domain), fields)
    }

    /// `self + alpha * other`
    pub fn axpy(&self, alpha: f64, other: &State) -> Result<State> {
        self.ensure_same_layout(other, "state arithmetic")?;
        let fields = self
            .fields
            .iter()
            .zip(other.fields.iter())
            .map(|((field, a), (_, b))| Ok((field.clone(), a.axpy(alpha, b)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::with_shared_domain(Arc::clone(&self.domain), fields)
    }

    /// `self + Σ cᵢ·sᵢ`
    pub fn linear_combination(&self, terms: &[(f64, &State)]) -> Result<State> {
        terms.iter().try_fold(self.clone(), |acc, (c, s)| acc.axpy(*c, s))
    }

    /// `self - other`
    pub fn difference(&self, other: &State) -> Result<State> {
        self.axpy(-1.0, other)
    }

    /// Multiply every field by a complex factor
    ///
    /// Real states only accept factors with a zero imaginary part.
    pub fn scaled_complex(&self, factor: Complex64) -> Result<State> {
        self.map_fields(|_, data| data.scale_complex(factor))
    }

    /// Explicitly widen every field to complex samples
    pub fn to_complex(&self) -> State {
        let fields = self
            .fields
            .iter()
            .map(|(f, d)| (f.clone(), FieldData::Complex(d.to_complex())))
            .collect();
        State { domain: Arc::clone(&self.domain), fields: Arc::new(fields) }
    }

    // ======================================= flattening =========================================

    /// Concatenate every field into one vector (field order preserved)
    pub fn flatten(&self) -> FieldData {
        match self.value_kind() {
            ValueKind::Real => {
                let values: Vec<f64> = self.fields.iter().flat_map(|(_, d)| d.real_parts()).collect();
                FieldData::from_vec(values)
            }
            ValueKind::Complex => {
                let values: Vec<Complex64> = self.fields.iter().flat_map(|(_, d)| d.to_complex().iter().copied().collect::<Vec<_>>()).collect();
                FieldData::from_complex_vec(values)
            }
        }
    }

    /// Split a flat vector back into this state's field layout
    pub fn unflatten(&self, flat: FieldData) -> Result<State> {
        if flat.len() != self.len() {
            return Err(EvolutionError::shape(format!(
                "flat vector has {} entries, state layout needs {}",
                flat.len(),
                self.len()
            )));
        }

        let points = self.points();
        let fields = self
            .fields
            .iter()
            .enumerate()
            .map(|(k, (field, _))| {
                let range = k * points..(k + 1) * points;
                let data = match &flat {
                    FieldData::Real(v) => FieldData::Real(DVector::from_row_slice(&v.as_slice()[range])),
                    FieldData::Complex(v) => FieldData::Complex(DVector::from_row_slice(&v.as_slice()[range])),
                };
                (field.clone(), data)
            })
            .collect();

        Self::with_shared_domain(Arc::clone(&self.domain), fields)
    }

    /// Grid-shaped view of a field's real parts
    pub fn to_array(&self, field: &Field) -> Result<ArrayD<f64>> {
        let data = self.require(field, "array view")?;
        ArrayD::from_shape_vec(IxDyn(self.domain.shape()), data.real_parts())
            .map_err(|e| EvolutionError::shape(e.to_string()))
    }
}

impl std::ops::Mul<f64> for &State {
    type Output = State;

    fn mul(self, factor: f64) -> State {
        let fields = self.fields.iter().map(|(f, d)| (f.clone(), d.scale(factor))).collect();
        State { domain: Arc::clone(&self.domain), fields: Arc::new(fields) }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State on {} {{", self.domain)?;
        for (i, (field, data)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {field}: {data}")?;
        }
        write!(f, " }}")
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_state(q: f64, p: f64) -> State {
        State::from_fields(
            DomainDescriptor::lumped(1),
            vec![
                (Field::Position, FieldData::from_vec(vec![q])),
                (Field::Momentum, FieldData::from_vec(vec![p])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_construction_validates_lengths() {
        let result = State::new(DomainDescriptor::lumped(3), Field::Value, FieldData::from_vec(vec![1.0]));
        assert!(matches!(result, Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_construction_rejects_mixed_kinds() {
        let result = State::from_fields(
            DomainDescriptor::lumped(1),
            vec![
                (Field::Position, FieldData::from_vec(vec![1.0])),
                (Field::Momentum, FieldData::zeros(ValueKind::Complex, 1)),
            ],
        );
        assert!(matches!(result, Err(EvolutionError::UnsupportedValueKind { .. })));
    }

    #[test]
    fn test_construction_rejects_duplicates_and_empty() {
        let result = State::from_fields(
            DomainDescriptor::lumped(1),
            vec![
                (Field::Value, FieldData::from_vec(vec![1.0])),
                (Field::Value, FieldData::from_vec(vec![2.0])),
            ],
        );
        assert!(result.is_err());
        assert!(State::from_fields(DomainDescriptor::lumped(1), vec![]).is_err());
    }

    #[test]
    fn test_with_field_does_not_alias() {
        let original = phase_state(1.0, 0.0);
        let updated = original
            .with_field(Field::Momentum, FieldData::from_vec(vec![5.0]))
            .unwrap();

        assert_eq!(original.field(&Field::Momentum).unwrap().real_parts(), vec![0.0]);
        assert_eq!(updated.field(&Field::Momentum).unwrap().real_parts(), vec![5.0]);
        assert_eq!(updated.field_names(), vec![Field::Position, Field::Momentum]);
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = phase_state(1.0, 2.0);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.fields, &b.fields));
    }

    #[test]
    fn test_axpy_and_linear_combination() {
        let a = phase_state(1.0, 1.0);
        let b = phase_state(2.0, -1.0);

        let c = a.axpy(0.5, &b).unwrap();
        assert_eq!(c.flatten().real_parts(), vec![2.0, 0.5]);

        let d = a.linear_combination(&[(1.0, &b), (-1.0, &a)]).unwrap();
        assert_eq!(d.flatten().real_parts(), vec![2.0, -1.0]);
    }

    #[test]
    fn test_axpy_rejects_layout_mismatch() {
        let a = phase_state(1.0, 1.0);
        let b = State::lumped(vec![1.0, 2.0]).unwrap();
        assert!(matches!(a.axpy(1.0, &b), Err(EvolutionError::ShapeMismatch(_))));

        let c = a.to_complex();
        assert!(matches!(a.axpy(1.0, &c), Err(EvolutionError::UnsupportedValueKind { .. })));
    }

    #[test]
    fn test_flatten_unflatten() {
        let a = phase_state(3.0, 4.0);
        let flat = a.flatten();
        assert_eq!(flat.real_parts(), vec![3.0, 4.0]);

        let back = a.unflatten(FieldData::from_vec(vec![7.0, 8.0])).unwrap();
        assert_eq!(back.field(&Field::Position).unwrap().real_parts(), vec![7.0]);
        assert_eq!(back.field(&Field::Momentum).unwrap().real_parts(), vec![8.0]);

        assert!(a.unflatten(FieldData::from_vec(vec![1.0])).is_err());
    }

    #[test]
    fn test_missing_field() {
        let a = State::lumped(vec![1.0]).unwrap();
        assert!(matches!(
            a.require(&Field::Momentum, "leapfrog"),
            Err(EvolutionError::MissingField { .. })
        ));
    }

    #[test]
    fn test_first_non_finite() {
        let a = phase_state(1.0, f64::NAN);
        assert_eq!(a.first_non_finite(), Some(&Field::Momentum));
        assert!(!a.is_finite());
    }

    #[test]
    fn test_to_array_shape() {
        let a = State::lumped(vec![1.0, 2.0, 3.0]).unwrap();
        let array = a.to_array(&Field::Value).unwrap();
        assert_eq!(array.shape(), &[3]);
    }

    #[test]
    fn test_field_names_roundtrip() {
        for field in [Field::Value, Field::Position, Field::Momentum, Field::WaveFunction, Field::custom("rho")] {
            assert_eq!(Field::from_name(field.name()), field);
        }
    }
}
