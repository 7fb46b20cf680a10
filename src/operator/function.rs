//! Closure-backed operators

use nalgebra::DMatrix;
use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::operator::{LinearOperator, Operator, OperatorMatrix};
use crate::physics::{DomainDescriptor, Field, FieldData, State, ValueKind};

/// Signature of a user-supplied operator body
pub type OperatorFn = dyn Fn(&State, f64) -> Result<State> + Send + Sync;

/// Operator defined by a closure
///
/// The caller declares whether the closure is linear. A linear,
/// time-independent function operator exposes a matrix obtained by applying
/// it to unit vectors (real ones, or complex ones when the operator or the
/// state is complex). [`LinearOperator::as_matrix`] uses a single-field
/// state; [`LinearOperator::as_matrix_for`] uses the layout of the state
/// being stepped, which is what multi-field closures need.
///
/// # Example
///
/// ```rust
/// use physkit::operator::{FunctionOperator, Operator};
/// use physkit::physics::{DomainDescriptor, State};
///
/// let logistic = FunctionOperator::nonlinear("logistic", DomainDescriptor::lumped(1), |s: &State, _t| {
///     s.map_fields(|_, d| d.map_real(|x| x * (1.0 - x)))
/// });
///
/// let rate = logistic.apply(&State::lumped(vec![0.5]).unwrap(), 0.0).unwrap();
/// assert_eq!(rate.primary().real_parts(), vec![0.25]);
/// assert!(logistic.as_linear().is_none());
/// ```
#[derive(Clone)]
pub struct FunctionOperator {
    name: String,
    domain: DomainDescriptor,
    linear: bool,
    time_dependent: bool,
    requirement: Option<ValueKind>,
    body: Arc<OperatorFn>,
}

impl FunctionOperator {
    pub fn nonlinear<F>(name: impl Into<String>, domain: DomainDescriptor, body: F) -> Self
    where
        F: Fn(&State, f64) -> Result<State> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            domain,
            linear: false,
            time_dependent: false,
            requirement: None,
            body: Arc::new(body),
        }
    }

    /// The closure must be linear in the state
    pub fn linear<F>(name: impl Into<String>, domain: DomainDescriptor, body: F) -> Self
    where
        F: Fn(&State, f64) -> Result<State> + Send + Sync + 'static,
    {
        Self { linear: true, ..Self::nonlinear(name, domain, body) }
    }

    /// Mark the closure as depending on `t`
    ///
    /// Time-dependent operators never expose a matrix.
    pub fn time_dependent(mut self) -> Self {
        self.time_dependent = true;
        self
    }

    /// Restrict the operator to one value kind
    pub fn requires(mut self, kind: ValueKind) -> Self {
        self.requirement = Some(kind);
        self
    }

    fn requires_complex(&self) -> bool {
        self.requirement == Some(ValueKind::Complex)
    }

    fn ensure_linear(&self) -> Result<()> {
        if !self.linear || self.time_dependent {
            return Err(EvolutionError::NotLinear(self.name.clone()));
        }
        Ok(())
    }
}

fn unit_vector(n: usize, i: usize, complex: bool) -> FieldData {
    if complex {
        let mut values = vec![Complex64::new(0.0, 0.0); n];
        values[i] = Complex64::new(1.0, 0.0);
        FieldData::from_complex_vec(values)
    } else {
        let mut values = vec![0.0; n];
        values[i] = 1.0;
        FieldData::from_vec(values)
    }
}

/// Square matrix from its columns, real when every column is
fn assemble(columns: &[FieldData]) -> OperatorMatrix {
    let n = columns.len();
    if columns.iter().all(FieldData::is_real) {
        OperatorMatrix::Real(DMatrix::from_fn(n, n, |i, j| columns[j].get(i).map_or(0.0, |z| z.re)))
    } else {
        OperatorMatrix::Complex(DMatrix::from_fn(n, n, |i, j| columns[j].get(i).unwrap_or_default()))
    }
}

impl fmt::Debug for FunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionOperator")
            .field("name", &self.name)
            .field("domain", &self.domain.to_string())
            .field("linear", &self.linear)
            .field("time_dependent", &self.time_dependent)
            .finish()
    }
}

impl Operator for FunctionOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    fn evaluate(&self, state: &State, t: f64) -> Result<State> {
        (self.body)(state, t)
    }

    fn is_time_dependent(&self) -> bool {
        self.time_dependent
    }

    fn value_kind_requirement(&self) -> Option<ValueKind> {
        self.requirement
    }

    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        if self.linear && !self.time_dependent { Some(self) } else { None }
    }
}

impl LinearOperator for FunctionOperator {
    /// Per-field block from the unit vectors of a single-field state
    fn as_matrix(&self) -> Result<OperatorMatrix> {
        self.ensure_linear()?;

        let n = self.domain.points();
        let mut columns = Vec::with_capacity(n);
        for i in 0..n {
            let unit = State::new(self.domain.clone(), Field::Value, unit_vector(n, i, self.requires_complex()))?;
            columns.push(self.apply(&unit, 0.0)?.primary().clone());
        }
        Ok(assemble(&columns))
    }

    /// Full matrix from unit vectors laid out like `state`
    ///
    /// Closures that couple fields (a Position/Momentum pair, say) only make
    /// sense on the layout they were written for.
    fn as_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        self.ensure_linear()?;
        self.check_input(state)?;

        let complex = self.requires_complex() || state.value_kind() == ValueKind::Complex;
        let n = state.len();
        let mut columns = Vec::with_capacity(n);
        for i in 0..n {
            let unit = state.unflatten(unit_vector(n, i, complex))?;
            columns.push(self.apply(&unit, 0.0)?.flatten());
        }
        Ok(assemble(&columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn doubling(domain: DomainDescriptor) -> FunctionOperator {
        FunctionOperator::linear("double", domain, |s: &State, _t| Ok(s * 2.0))
    }

    #[test]
    fn test_linear_function_exposes_matrix() {
        let op = doubling(DomainDescriptor::lumped(3));
        let m = op.as_linear().unwrap().as_matrix().unwrap();
        let m = m.as_real().unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 2.0 } else { 0.0 };
                assert_relative_eq!(m[(i, j)], expected);
            }
        }
    }

    #[test]
    fn test_time_dependent_is_not_linear() {
        let op = doubling(DomainDescriptor::lumped(2)).time_dependent();
        assert!(op.as_linear().is_none());
        assert!(op.is_time_dependent());
        assert!(matches!(op.as_matrix(), Err(EvolutionError::NotLinear(_))));
    }

    #[test]
    fn test_time_argument_is_forwarded() {
        let op = FunctionOperator::nonlinear("clock", DomainDescriptor::lumped(1), |s: &State, t| {
            s.map_fields(|_, d| d.map_real(|_| t))
        })
        .time_dependent();

        let out = op.apply(&State::lumped(vec![0.0]).unwrap(), 2.5).unwrap();
        assert_eq!(out.primary().real_parts(), vec![2.5]);
    }

    #[test]
    fn test_complex_unit_vectors() {
        let op = FunctionOperator::linear("rotate", DomainDescriptor::lumped(2), |s: &State, _t| {
            s.scaled_complex(Complex64::new(0.0, 1.0))
        })
        .requires(ValueKind::Complex);

        let m = op.as_matrix().unwrap();
        assert_eq!(m.kind(), ValueKind::Complex);
        assert_eq!(m.get(1, 1).unwrap(), Complex64::new(0.0, 1.0));
        assert_eq!(m.get(0, 1).unwrap(), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_coupled_fields_matrix_matches_apply() {
        // q̇ = p, ṗ = -q - 0.5·p
        let op = FunctionOperator::linear("damped", DomainDescriptor::lumped(1), |s: &State, _t| {
            let q = s.require(&Field::Position, "damped")?;
            let p = s.require(&Field::Momentum, "damped")?.clone();
            let force = q.axpy(0.5, &p)?.scale(-1.0);
            s.with_field(Field::Position, p)?.with_field(Field::Momentum, force)
        });
        let state = State::from_fields(
            DomainDescriptor::lumped(1),
            vec![(Field::Position, FieldData::from_vec(vec![0.3])), (Field::Momentum, FieldData::from_vec(vec![-1.2]))],
        )
        .unwrap();

        assert!(op.as_matrix().is_err());

        let m = op.as_matrix_for(&state).unwrap();
        let m = m.as_real().unwrap();
        assert_eq!((m.nrows(), m.ncols()), (2, 2));
        assert_relative_eq!(m[(0, 1)], 1.0);
        assert_relative_eq!(m[(1, 0)], -1.0);
        assert_relative_eq!(m[(1, 1)], -0.5);

        let direct = op.apply(&state, 0.0).unwrap().flatten().real_parts();
        let via_matrix = op.as_matrix_for(&state).unwrap().apply_to_field(&state.flatten()).unwrap().real_parts();
        for (a, b) in direct.iter().zip(&via_matrix) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }
}
