//! Operator algebra: sums, compositions and scalar multiples
//!
//! Combinators hold shared handles to their parts and stay linear exactly
//! when every part is linear. All parts must live on the same domain.

use num_complex::Complex64;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::operator::{LinearOperator, Operator, OperatorMatrix, OperatorRef, merge_requirements};
use crate::physics::{DomainDescriptor, State, ValueKind};

/// `a + b + ...`
pub fn sum(a: OperatorRef, b: OperatorRef) -> Result<OperatorRef> {
    Ok(Arc::new(Sum::new(vec![a, b])?))
}

/// `outer ∘ inner` (inner acts first)
pub fn compose(outer: OperatorRef, inner: OperatorRef) -> Result<OperatorRef> {
    Ok(Arc::new(Composition::new(outer, inner)?))
}

/// `factor · op`
pub fn scale(factor: f64, op: OperatorRef) -> Result<OperatorRef> {
    Ok(Arc::new(Scaled::new(Complex64::new(factor, 0.0), op)?))
}

/// `factor · op` with a complex factor
pub fn scale_complex(factor: Complex64, op: OperatorRef) -> Result<OperatorRef> {
    Ok(Arc::new(Scaled::new(factor, op)?))
}

fn same_domain(first: &dyn Operator, other: &dyn Operator, context: &str) -> Result<()> {
    first
        .domain()
        .ensure_compatible(other.domain(), &format!("{context} of '{}' and '{}'", first.name(), other.name()))
}

// =================================================================================================
// Sum
// =================================================================================================

/// Sum of operators sharing one domain
#[derive(Debug, Clone)]
pub struct Sum {
    name: String,
    terms: Vec<OperatorRef>,
    requirement: Option<ValueKind>,
}

impl Sum {
    pub fn new(terms: Vec<OperatorRef>) -> Result<Self> {
        let Some(first) = terms.first() else {
            return Err(EvolutionError::config("a sum needs at least one term"));
        };

        let mut requirement = first.value_kind_requirement();
        for term in &terms[1..] {
            same_domain(first.as_ref(), term.as_ref(), "sum")?;
            requirement = merge_requirements(requirement, term.value_kind_requirement(), "sum")?;
        }

        let name = terms.iter().map(|t| t.name()).collect::<Vec<_>>().join(" + ");
        Ok(Self { name, terms, requirement })
    }

    pub fn terms(&self) -> &[OperatorRef] {
        &self.terms
    }
}

impl Operator for Sum {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        self.terms[0].domain()
    }

    fn evaluate(&self, state: &State, t: f64) -> Result<State> {
        let mut total = self.terms[0].apply(state, t)?;
        for term in &self.terms[1..] {
            total = total.axpy(1.0, &term.apply(state, t)?)?;
        }
        Ok(total)
    }

    fn is_time_dependent(&self) -> bool {
        self.terms.iter().any(|t| t.is_time_dependent())
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        self.requirement
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        if self.terms.iter().all(|t| t.is_linear()) { Some(self) } else { None }
    }
}

impl LinearOperator for Sum {
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        let mut total = self.terms[0].try_matrix()?;
        for term in &self.terms[1..] {
            total = total.add(&term.try_matrix()?)?;
        }
        Ok(total)
    }

    /// Terms may mix per-field blocks with flattened matrices; each is
    /// brought to the layout of `state` before summing
    fn as_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        let mut total = self.terms[0].try_matrix_for(state)?;
        for term in &self.terms[1..] {
            total = total.add(&term.try_matrix_for(state)?)?;
        }
        Ok(total)
    }
}

// =================================================================================================
// Composition
// =================================================================================================

/// `outer ∘ inner`
#[derive(Debug, Clone)]
pub struct Composition {
    name: String,
    outer: OperatorRef,
    inner: OperatorRef,
    requirement: Option<ValueKind>,
}

impl Composition {
    pub fn new(outer: OperatorRef, inner: OperatorRef) -> Result<Self> {
        same_domain(outer.as_ref(), inner.as_ref(), "composition")?;
        let requirement = merge_requirements(
            outer.value_kind_requirement(),
            inner.value_kind_requirement(),
            "composition",
        )?;
        let name = format!("({}) ∘ ({})", outer.name(), inner.name());
        Ok(Self { name, outer, inner, requirement })
    }
}

impl Operator for Composition {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        self.inner.domain()
    }

    fn evaluate(&self, state: &State, t: f64) -> Result<State> {
        let intermediate = self.inner.apply(state, t)?;
        self.outer.apply(&intermediate, t)
    }

    fn is_time_dependent(&self) -> bool {
        self.outer.is_time_dependent() || self.inner.is_time_dependent()
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        self.requirement
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        if self.outer.is_linear() && self.inner.is_linear() { Some(self) } else { None }
    }
}

impl LinearOperator for Composition {
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        self.outer.try_matrix()?.mul(&self.inner.try_matrix()?)
    }

    fn as_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        // inner preserves the layout, so both factors act on vectors shaped like `state`
        self.outer.try_matrix_for(state)?.mul(&self.inner.try_matrix_for(state)?)
    }
}

// =================================================================================================
// Scaled
// =================================================================================================

/// `factor · inner`
///
/// A factor with a nonzero imaginary part turns the operator complex-only.
#[derive(Debug, Clone)]
pub struct Scaled {
    name: String,
    factor: Complex64,
    inner: OperatorRef,
    requirement: Option<ValueKind>,
}

impl Scaled {
    pub fn new(factor: Complex64, inner: OperatorRef) -> Result<Self> {
        let own = (factor.im != 0.0).then_some(ValueKind::Complex);
        let requirement = merge_requirements(inner.value_kind_requirement(), own, "complex scaling")?;

        let name = if factor.im == 0.0 {
            format!("{} · {}", factor.re, inner.name())
        } else {
            format!("({factor}) · {}", inner.name())
        };
        Ok(Self { name, factor, inner, requirement })
    }

    pub fn factor(&self) -> Complex64 {
        self.factor
    }
}

impl Operator for Scaled {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        self.inner.domain()
    }

    fn evaluate(&self, state: &State, t: f64) -> Result<State> {
        self.inner.apply(state, t)?.scaled_complex(self.factor)
    }

    fn is_time_dependent(&self) -> bool {
        self.inner.is_time_dependent()
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        self.requirement
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        if self.inner.is_linear() { Some(self) } else { None }
    }
}

impl LinearOperator for Scaled {
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        Ok(self.inner.try_matrix()?.scale(self.factor))
    }

    fn as_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        Ok(self.inner.try_matrix_for(state)?.scale(self.factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{FunctionOperator, MatrixOperator};
    use approx::assert_relative_eq;

    fn diag(values: Vec<f64>) -> OperatorRef {
        let domain = DomainDescriptor::lumped(values.len());
        Arc::new(MatrixOperator::diagonal("diag", domain, values).unwrap())
    }

    fn cube(n: usize) -> OperatorRef {
        Arc::new(FunctionOperator::nonlinear("cube", DomainDescriptor::lumped(n), |s: &State, _t| {
            s.map_fields(|_, d| d.map_real(|x| x * x * x))
        }))
    }

    #[test]
    fn test_sum_applies_and_builds_matrix() {
        let op = sum(diag(vec![1.0, 2.0]), diag(vec![3.0, 4.0])).unwrap();
        let state = State::lumped(vec![1.0, 1.0]).unwrap();

        assert_eq!(op.apply(&state, 0.0).unwrap().primary().real_parts(), vec![4.0, 6.0]);

        let m = op.try_matrix().unwrap();
        assert_relative_eq!(m.get(1, 1).unwrap().re, 6.0);
    }

    #[test]
    fn test_composition_order() {
        let shift: OperatorRef = Arc::new(FunctionOperator::nonlinear("plus one", DomainDescriptor::lumped(1), |s: &State, _t| {
            s.map_fields(|_, d| d.map_real(|x| x + 1.0))
        }));
        let double = diag(vec![2.0]);
        let state = State::lumped(vec![3.0]).unwrap();

        // double first, then add one
        let op = compose(shift.clone(), double.clone()).unwrap();
        assert_eq!(op.apply(&state, 0.0).unwrap().primary().real_parts(), vec![7.0]);

        let op = compose(double, shift).unwrap();
        assert_eq!(op.apply(&state, 0.0).unwrap().primary().real_parts(), vec![8.0]);
    }

    #[test]
    fn test_nonlinear_parts_propagate() {
        let op = sum(diag(vec![1.0]), cube(1)).unwrap();
        assert!(op.as_linear().is_none());
        assert!(matches!(op.try_matrix(), Err(EvolutionError::NotLinear(_))));

        let op = compose(cube(1), diag(vec![1.0])).unwrap();
        assert!(matches!(op.try_matrix(), Err(EvolutionError::NotLinear(_))));

        let op = scale(2.0, cube(1)).unwrap();
        assert!(matches!(op.try_matrix(), Err(EvolutionError::NotLinear(_))));
    }

    #[test]
    fn test_domain_mismatch_rejected() {
        assert!(matches!(sum(diag(vec![1.0]), diag(vec![1.0, 2.0])), Err(EvolutionError::ShapeMismatch(_))));
        assert!(matches!(compose(diag(vec![1.0]), diag(vec![1.0, 2.0])), Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_complex_scaling_requires_complex_states() {
        let op = scale_complex(Complex64::new(0.0, -1.0), diag(vec![2.0])).unwrap();
        assert_eq!(op.value_kind_requirement(), Some(ValueKind::Complex));

        let real = State::lumped(vec![1.0]).unwrap();
        assert!(matches!(op.apply(&real, 0.0), Err(EvolutionError::UnsupportedValueKind { .. })));

        let out = op.apply(&real.to_complex(), 0.0).unwrap();
        assert_eq!(out.primary().get(0).unwrap(), Complex64::new(0.0, -2.0));

        let m = op.try_matrix().unwrap();
        assert_eq!(m.get(0, 0).unwrap(), Complex64::new(0.0, -2.0));
    }

    #[test]
    fn test_mixed_layouts_build_the_state_matrix() {
        use crate::physics::{Field, FieldData};
        use nalgebra::DMatrix;

        // flattened (q, p) rotation plus a per-field damping block
        let domain = DomainDescriptor::lumped(1);
        let rotation = OperatorMatrix::Real(DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -1.0, 0.0]));
        let oscillator: OperatorRef = Arc::new(MatrixOperator::new("oscillator", domain.clone(), rotation).unwrap());
        let damping: OperatorRef = Arc::new(MatrixOperator::diagonal("damping", domain.clone(), vec![-0.1]).unwrap());
        let state = State::from_fields(
            domain,
            vec![(Field::Position, FieldData::from_vec(vec![1.0])), (Field::Momentum, FieldData::from_vec(vec![0.5]))],
        )
        .unwrap();

        let total = sum(oscillator.clone(), damping.clone()).unwrap();
        assert!(matches!(total.try_matrix(), Err(EvolutionError::ShapeMismatch(_))));

        let m = total.try_matrix_for(&state).unwrap();
        let expected = total.apply(&state, 0.0).unwrap().flatten().real_parts();
        let actual = m.apply_to_field(&state.flatten()).unwrap().real_parts();
        for (a, b) in expected.iter().zip(&actual) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }

        let chained = compose(scale(2.0, damping).unwrap(), oscillator).unwrap();
        let m = chained.try_matrix_for(&state).unwrap();
        let expected = chained.apply(&state, 0.0).unwrap().flatten().real_parts();
        let actual = m.apply_to_field(&state.flatten()).unwrap().real_parts();
        for (a, b) in expected.iter().zip(&actual) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }
}
