//! Time stepping and run control
//!
//! This module turns a [`State`] and an [`Operator`](crate::operator::Operator)
//! into a recorded [`Trajectory`]. Physics (what the operator computes) and
//! numerics (how time advances) never meet outside of it.
//!
//! # Core Concepts
//!
//! ## The Architecture (WHAT vs HOW)
//!
//! 1. **Operator** - WHAT evolves: `dstate/dt = op(state, t)`
//! 2. **StepperConfig** - HOW it is advanced: scheme, `dt`, implicit budget,
//!    adaptive tolerances, steady-state detection
//! 3. **Integrator** - WHEN to stop and WHAT to keep: time span, recording
//!    stride, observables, stop conditions, cancellation
//!
//! # Module Organization
//!
//! - **`traits`**: [`Stepper`] trait, [`Scheme`] catalogue, [`StepperConfig`]
//! - **`methods`**: explicit, implicit and symplectic schemes
//! - **`status`**: [`RunStatus`] state machine
//! - **`integrator`**: [`Integrator`], [`run`], [`run_ensemble`]
//! - **`trajectory`**: [`Trajectory`] and its persisted form
//!
//! # Workflow Diagram
//!
//! ```text
//! ┌─────────────────┐   ┌─────────────────┐
//! │  Initial State  │   │    Operator     │  (discretized physics)
//! └────────┬────────┘   └────────┬────────┘
//!          └──────────┬──────────┘
//!            ┌────────▼─────────────┐
//!            │ StepperConfig        │ ← HOW to advance
//!            │ (scheme + dt + tols) │
//!            └────────┬─────────────┘
//!            ┌────────▼─────────────┐
//!            │ Integrator           │ ← span, stride, observables,
//!            │                      │   stop conditions, cancellation
//!            └────────┬─────────────┘
//!            ┌────────▼─────────────┐
//!            │ Trajectory           │ ← entries + status + statistics
//!            └──────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use physkit::diagnostics::{ObservableRegistry, l2_norm};
//! use physkit::operator::MatrixOperator;
//! use physkit::physics::{DomainDescriptor, State};
//! use physkit::solver::{Scheme, StepperConfig, TimeSpan, run};
//!
//! let decay = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(2), vec![-1.0, -2.0]).unwrap();
//! let observables = ObservableRegistry::new().with_scalar("l2", l2_norm).unwrap();
//!
//! let trajectory = run(
//!     &State::lumped(vec![1.0, 1.0]).unwrap(),
//!     &decay,
//!     &StepperConfig::implicit(Scheme::CrankNicolson, 0.05, 1e-12, 20),
//!     TimeSpan::new(0.0, 1.0),
//!     &observables,
//! ).unwrap();
//!
//! assert!(trajectory.status().is_success());
//! assert_eq!(trajectory.len(), 21);
//! ```
//!
//! # Choosing a Scheme
//!
//! - **Non-stiff problems**: `Rk4`, or `DormandPrince45` with adaptive control
//! - **Stiff problems**: `ImplicitEuler` (L-stable) or `CrankNicolson`
//!   (second order, norm preserving for skew-Hermitian generators such as
//!   `-i·H/ħ`)
//! - **Hamiltonian mechanics**: `Leapfrog` / `StormerVerlet`, fixed step only
//!
//! # Error Handling
//!
//! Construction problems come back as `Err` before the first step; failures
//! while stepping end the run with [`RunStatus::Diverged`] and the trajectory
//! recorded so far:
//!
//! ```rust
//! # use physkit::operator::FunctionOperator;
//! # use physkit::physics::{DomainDescriptor, State};
//! # use physkit::solver::{Integrator, RunStatus, Scheme, StepperConfig, TimeSpan};
//! let blow_up = FunctionOperator::nonlinear("blow-up", DomainDescriptor::lumped(1), |s, _| {
//!     s.map_fields(|_, d| d.map_real(|x| x / 0.0))
//! });
//! let integrator = Integrator::new(StepperConfig::explicit(Scheme::ExplicitEuler, 1.0)).unwrap();
//! let trajectory = integrator.run(&State::lumped(vec![10.0]).unwrap(), &blow_up, TimeSpan::new(0.0, 5.0)).unwrap();
//!
//! assert!(matches!(trajectory.status(), RunStatus::Diverged { .. }));
//! assert_eq!(trajectory.len(), 1);
//! ```

// =================================================================================================
// Module Declarations
// =================================================================================================
mod integrator;
pub mod methods;
mod status;
mod traits;
mod trajectory;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Work is counted in sample updates: a sample map touches every sample once,
// a stencil sweep touches `points × taps` samples. Sweeps larger than the
// threshold go to rayon when the `parallel` feature is on.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default work size, in sample updates, above which sweeps run in parallel
///
/// A five-point stencil on a 4096-point grid (or a sample map over 20480
/// samples) is about where rayon's scheduling overhead stops dominating.
pub const DEFAULT_PARALLEL_WORK: usize = 5 * 4096;

static PARALLEL_WORK: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_WORK);

/// Current parallel work threshold, in sample updates
///
/// Only consulted when the crate is compiled with the `parallel` feature.
///
/// ```rust
/// use physkit::solver::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_WORK.load(Ordering::Relaxed)
}

/// Change the parallel work threshold
///
/// A zero threshold is an `InvalidConfiguration`.
///
/// ```rust
/// use physkit::solver::{parallel_threshold, set_parallel_threshold};
///
/// let previous = parallel_threshold();
/// set_parallel_threshold(2048).unwrap();
/// assert_eq!(parallel_threshold(), 2048);
/// assert!(set_parallel_threshold(0).is_err());
///
/// set_parallel_threshold(previous).unwrap();
/// ```
pub fn set_parallel_threshold(work: usize) -> Result<()> {
    if work == 0 {
        return Err(EvolutionError::config("parallel work threshold must be at least 1 sample update"));
    }
    PARALLEL_WORK.store(work, Ordering::Relaxed);
    Ok(())
}

/// Whether a sweep of `work` sample updates should run in parallel
#[cfg(feature = "parallel")]
pub(crate) fn runs_in_parallel(work: usize) -> bool {
    work > parallel_threshold()
}

/// Restores the previous threshold when dropped
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
}

#[cfg(test)]
impl ThresholdGuard {
    pub(crate) fn set(work: usize) -> Result<Self> {
        let previous = parallel_threshold();
        set_parallel_threshold(work)?;
        Ok(Self { previous })
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        PARALLEL_WORK.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use traits::{AdaptiveConfig, Scheme, SchemeFamily, StepOutcome, Stepper, StepperConfig};

pub use status::RunStatus;

pub use integrator::{CancellationToken, Integrator, StopCondition, StopPredicate, TimeSpan, run, run_ensemble};

pub use trajectory::{EntryRecord, FieldRecord, RunStatistics, Trajectory, TrajectoryEntry, TrajectoryRecord};

pub use methods::{
    CrankNicolson, DormandPrince45, ExplicitEuler, ImplicitEuler, Leapfrog, Rk2, Rk4, StormerVerlet,
    energy_error_bound,
};

// =================================================================================================
// Helper Functions
// =================================================================================================

use crate::error::{EvolutionError, Result};
use crate::physics::State;

/// Fail with `Diverged` when any sample of `state` is NaN or infinite
///
/// ```rust,ignore
/// check_finite(&state, t, 42)?;  // state produced by step 42
/// ```
pub(crate) fn check_finite(state: &State, time: f64, step: usize) -> Result<()> {
    match state.first_non_finite() {
        Some(field) => Err(EvolutionError::Diverged { field: field.name().to_string(), time, step }),
        None => Ok(()),
    }
}

// =================================================================================================
// Tests
// =================================================================================================
