//! Mock operators for testing
//!
//! Each has a known analytical solution or a predictable side effect.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use physkit::operator::{FunctionOperator, MatrixOperator};
use physkit::physics::{DomainDescriptor, State};
use physkit::solver::CancellationToken;

// =================================================================================================
// Exponential decay: dy/dt = -k*y
// =================================================================================================

/// Diagonal decay `dyᵢ/dt = -kᵢ·yᵢ` on a lumped domain
///
/// Analytical solution: `yᵢ(t) = yᵢ(0)·exp(-kᵢ·t)`
pub fn decay_operator(rates: &[f64]) -> MatrixOperator {
    let diagonal = rates.iter().map(|k| -k).collect();
    MatrixOperator::diagonal("decay", DomainDescriptor::lumped(rates.len()), diagonal)
        .expect("diagonal matrix matches its own domain")
}

// =================================================================================================
// Logistic growth: dy/dt = r*y*(1-y)
// =================================================================================================

/// Nonlinear logistic growth on one lumped unknown
///
/// Analytical solution: `y(t) = 1 / (1 + (1/y₀ - 1)·exp(-r·t))`
pub fn logistic_operator(rate: f64) -> FunctionOperator {
    FunctionOperator::nonlinear("logistic", DomainDescriptor::lumped(1), move |s: &State, _t| {
        s.map_fields(|_, d| d.map_real(|y| rate * y * (1.0 - y)))
    })
}

// =================================================================================================
// Cancellation from inside a run
// =================================================================================================

/// Unit decay that cancels `token` once it has been evaluated `after` times
pub fn cancelling_decay(token: CancellationToken, after: usize) -> FunctionOperator {
    let calls = Arc::new(AtomicUsize::new(0));
    FunctionOperator::nonlinear("cancelling decay", DomainDescriptor::lumped(1), move |s: &State, _t| {
        if calls.fetch_add(1, Ordering::SeqCst) + 1 >= after {
            token.cancel();
        }
        s.map_fields(|_, d| Ok(d.scale(-1.0)))
    })
}
