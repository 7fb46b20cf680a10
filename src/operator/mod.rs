//! Operators
//!
//! An operator is a named mathematical action `State × t → State`. The
//! engine only needs [`Operator::apply`]; linear operators additionally
//! expose an explicit matrix through the [`LinearOperator`] capability,
//! which implicit schemes use for direct solves.
//!
//! # Core Concepts
//!
//! - **Capability interface**: [`Operator::as_linear`] returns
//!   `Some(&dyn LinearOperator)` only for linear, time-independent operators.
//!   Nonlinear operators never produce a matrix; asking for one fails with
//!   `NotLinear`.
//! - **Validation**: `apply` checks the state's domain against the operator's
//!   own descriptor (`ShapeMismatch`) and its value kind requirement
//!   (`UnsupportedValueKind`) before evaluating.
//! - **Composition**: [`sum`], [`compose`] and [`scale`] build new operators
//!   from existing ones without copying them.
//!
//! # Concrete operators
//!
//! | Type | Linear | Source |
//! |------|--------|--------|
//! | [`MatrixOperator`] | yes | explicit dense matrix |
//! | [`StencilOperator`] | yes | finite-difference / finite-volume stencil |
//! | [`FunctionOperator`] | declared | user closure |
//! | [`Sum`], [`Composition`], [`Scaled`] | if all parts are | combinators |
//!
//! Fourier multipliers and conservative fluxes live with their
//! discretizations in [`crate::discretization`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use physkit::operator::{MatrixOperator, Operator, OperatorRef, scale};
//! use physkit::physics::{DomainDescriptor, State};
//!
//! let domain = DomainDescriptor::lumped(2);
//! let decay: OperatorRef = Arc::new(MatrixOperator::diagonal("decay", domain, vec![-1.0, -2.0]).unwrap());
//! let faster = scale(3.0, decay).unwrap();
//!
//! let state = State::lumped(vec![1.0, 1.0]).unwrap();
//! let rate = faster.apply(&state, 0.0).unwrap();
//! assert_eq!(rate.primary().real_parts(), vec![-3.0, -6.0]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::physics::{DomainDescriptor, State, ValueKind};

pub mod combinators;
pub mod function;
pub mod matrix;
pub mod stencil;

pub use combinators::{Composition, Scaled, Sum, compose, scale, scale_complex, sum};
pub use function::{FunctionOperator, OperatorFn};
pub use matrix::{MatrixOperator, OperatorMatrix};
pub use stencil::{GhostRule, StencilOperator};

/// Shared handle to a type-erased operator
pub type OperatorRef = Arc<dyn Operator>;

// =================================================================================================
// Operator trait
// =================================================================================================

/// Mathematical action on a [`State`]
///
/// Implementors provide [`Operator::evaluate`]; callers use
/// [`Operator::apply`], which validates the input and the output layout
/// around it. Neither ever mutates the input state.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Name used in error messages and trajectory metadata
    fn name(&self) -> &str;

    /// Domain the operator was built for
    fn domain(&self) -> &DomainDescriptor;

    /// Raw evaluation, input already validated
    fn evaluate(&self, state: &State, t: f64) -> Result<State>;

    /// Validated evaluation
    fn apply(&self, state: &State, t: f64) -> Result<State> {
        self.check_input(state)?;
        let output = self.evaluate(state, t)?;

        if !output.same_layout(state) {
            return Err(EvolutionError::shape(format!(
                "operator '{}' changed the state layout",
                self.name()
            )));
        }
        Ok(output)
    }

    /// Domain and value kind checks performed by [`Operator::apply`]
    fn check_input(&self, state: &State) -> Result<()> {
        self.domain().ensure_compatible(state.domain(), self.name())?;

        if let Some(kind) = self.value_kind_requirement()
            && kind != state.value_kind()
        {
            return Err(EvolutionError::unsupported(
                state.value_kind(),
                format!("operator '{}' (needs {kind} states)", self.name()),
            ));
        }
        Ok(())
    }

    fn is_time_dependent(&self) -> bool {
        false
    }

    /// Value kind the operator insists on, `None` when it accepts both
    fn value_kind_requirement(&self) -> Option<ValueKind> {
        None
    }

    /// Linear capability, `None` for nonlinear operators
    fn as_linear(&self) -> Option<&dyn LinearOperator> {
        None
    }

    fn is_linear(&self) -> bool {
        self.as_linear().is_some()
    }

    /// Matrix of a linear operator, `NotLinear` otherwise
    fn try_matrix(&self) -> Result<OperatorMatrix> {
        match self.as_linear() {
            Some(linear) => linear.as_matrix(),
            None => Err(EvolutionError::NotLinear(self.name().to_string())),
        }
    }

    /// Matrix acting on the flattened vector of `state`, `NotLinear` for nonlinear operators
    fn try_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        match self.as_linear() {
            Some(linear) => linear.as_matrix_for(state),
            None => Err(EvolutionError::NotLinear(self.name().to_string())),
        }
    }
}

/// Linear operators expose an explicit matrix
///
/// The matrix acts on the flattened field vector of a state. Field-wise
/// operators return the `points × points` block; it is applied to every
/// field of a multi-field state (see [`OperatorMatrix::apply_to_state`]).
pub trait LinearOperator: Operator {
    fn as_matrix(&self) -> Result<OperatorMatrix>;

    /// Matrix acting on the flattened vector of `state`
    fn as_matrix_for(&self, state: &State) -> Result<OperatorMatrix> {
        self.as_matrix()?.expanded_for(state)
    }
}

/// Merge two value kind requirements, failing when they conflict
pub(crate) fn merge_requirements(
    a: Option<ValueKind>,
    b: Option<ValueKind>,
    context: &str,
) -> Result<Option<ValueKind>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(EvolutionError::unsupported(y, format!("{context} (mixes {x} and {y} operators)"))),
        (Some(x), _) | (None, Some(x)) => Ok(Some(x)),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Field, FieldData};

    #[test]
    fn test_apply_rejects_foreign_domain() {
        let op = MatrixOperator::identity("id", DomainDescriptor::lumped(3));
        let state = State::lumped(vec![1.0, 2.0]).unwrap();
        assert!(matches!(op.apply(&state, 0.0), Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_try_matrix_on_nonlinear() {
        let op = FunctionOperator::nonlinear("square", DomainDescriptor::lumped(1), |s: &State, _t| {
            s.map_fields(|_, d| d.map_real(|x| x * x))
        });
        assert!(matches!(op.try_matrix(), Err(EvolutionError::NotLinear(_))));
        assert!(matches!(op.try_matrix_for(&State::lumped(vec![1.0]).unwrap()), Err(EvolutionError::NotLinear(_))));
        assert!(!op.is_linear());
    }

    #[test]
    fn test_apply_rejects_layout_change() {
        let op = FunctionOperator::nonlinear("bad", DomainDescriptor::lumped(1), |s: &State, _t| {
            s.with_field(Field::Momentum, FieldData::from_vec(vec![0.0]))
        });
        let state = State::lumped(vec![1.0]).unwrap();
        assert!(matches!(op.apply(&state, 0.0), Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_merge_requirements() {
        assert_eq!(merge_requirements(None, None, "x").unwrap(), None);
        assert_eq!(merge_requirements(Some(ValueKind::Real), None, "x").unwrap(), Some(ValueKind::Real));
        assert!(merge_requirements(Some(ValueKind::Real), Some(ValueKind::Complex), "x").is_err());
    }
}
