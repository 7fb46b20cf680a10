//! Evolution driver
//!
//! [`Integrator`] owns one stepper configuration and drives runs:
//!
//! ```text
//! validate ─► record initial ─► ┌──────────────────────────────────────┐
//!                               │ cancelled?           → Cancelled     │
//!                               │ step (fixed/adaptive)                │
//!                               │ non-finite?          → Diverged      │
//!                               │ stop condition?      → EarlyStopped  │
//!                               │ steady state?        → Converged     │
//!                               │ record every stride-th accepted step │
//!                               └──────────────┬───────────────────────┘
//!                                              ▼
//!                                   record final ─► Completed
//! ```
//!
//! Construction problems (bad span, incompatible operator, unsupported value
//! kind, missing fields, non-finite initial state) are returned as `Err`
//! before any step. The operator is evaluated once on the initial state for
//! this, so a matrix or closure whose output does not fit the state is caught
//! up front. Failures while stepping end the run with
//! [`RunStatus::Diverged`] and the trajectory recorded so far.
//!
//! # Fixed steps
//!
//! Times are `start + k·dt`, computed from `k` rather than accumulated; the
//! last step is clipped to land exactly on `end`.
//!
//! # Adaptive steps
//!
//! The local error comes from the stepper's embedded pair, or from step
//! doubling (`(y_h/2,h/2 − y_h) / (2^p − 1)`) for schemes without one. It is
//! measured in the RMS norm scaled by `atol + rtol·max(|y|, |y_new|)`; a step
//! is accepted when that norm is at most 1. The next step is
//!
//! ```text
//! accepted:  h · min(10, max(1, 0.9 · err^(-1/(p+1))))
//! rejected:  h · max(0.2, 0.9 · err^(-1/(p+1)))
//! ```
//!
//! A rejected step below `min_dt` fails with `StepSizeUnderflow`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{ObservableRegistry, ObservableValue};
use crate::error::{EvolutionError, Result};
use crate::operator::Operator;
use crate::physics::State;
use crate::solver::{
    AdaptiveConfig, RunStatus, SchemeFamily, Stepper, StepperConfig, Trajectory, TrajectoryEntry, check_finite,
};

/// Safety factor applied to the optimal step estimate
const SAFETY: f64 = 0.9;

/// Largest shrink per rejected step
const MIN_FACTOR: f64 = 0.2;

/// Largest growth per accepted step
const MAX_FACTOR: f64 = 10.0;

/// Slack when counting fixed steps, so `duration/dt` rounding noise does not add a sliver step
const STEP_COUNT_SLACK: f64 = 1e-9;

// =================================================================================================
// Run inputs
// =================================================================================================

/// Integration interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.end.is_finite()) {
            return Err(EvolutionError::config(format!(
                "time span bounds must be finite, got [{}, {}]",
                self.start, self.end
            )));
        }
        if self.end <= self.start {
            return Err(EvolutionError::config(format!(
                "time span end ({}) must be greater than start ({})",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked between steps
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Predicate `(t, state) -> bool` ending a run when it returns `true`
pub type StopPredicate = dyn Fn(f64, &State) -> bool + Send + Sync;

/// Named stop condition
#[derive(Clone)]
pub struct StopCondition {
    name: String,
    predicate: Arc<StopPredicate>,
}

impl StopCondition {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(f64, &State) -> bool + Send + Sync + 'static,
    {
        Self { name: name.into(), predicate: Arc::new(predicate) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_met(&self, t: f64, state: &State) -> bool {
        (self.predicate)(t, state)
    }
}

impl fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopCondition").field("name", &self.name).finish()
    }
}

// =================================================================================================
// Integrator
// =================================================================================================

/// Drives a stepper over a time span and records a [`Trajectory`]
///
/// # Example
///
/// ```rust
/// use physkit::diagnostics::max_abs;
/// use physkit::operator::MatrixOperator;
/// use physkit::physics::{DomainDescriptor, State};
/// use physkit::solver::{Integrator, RunStatus, Scheme, StepperConfig, TimeSpan};
///
/// let decay = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(1), vec![-1.0]).unwrap();
/// let y0 = State::lumped(vec![1.0]).unwrap();
///
/// let integrator = Integrator::new(StepperConfig::explicit(Scheme::Rk4, 0.01))
///     .unwrap()
///     .record_every(10)
///     .observe("max", max_abs)
///     .unwrap();
///
/// let trajectory = integrator.run(&y0, &decay, TimeSpan::new(0.0, 1.0)).unwrap();
///
/// assert_eq!(trajectory.status(), &RunStatus::Completed);
/// assert_eq!(trajectory.len(), 11);
/// let last = trajectory.observable_series("max").unwrap()[10];
/// assert!((last - (-1.0f64).exp()).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct Integrator {
    config: StepperConfig,
    stepper: Box<dyn Stepper>,
    stride: usize,
    observables: ObservableRegistry,
    stop_conditions: Vec<StopCondition>,
    cancellation: Option<CancellationToken>,
}

impl Integrator {
    // ======================================= constructors =======================================

    pub fn new(config: StepperConfig) -> Result<Self> {
        config.validate()?;
        let stepper = config.build_stepper();
        Ok(Self {
            config,
            stepper,
            stride: 1,
            observables: ObservableRegistry::new(),
            stop_conditions: Vec::new(),
            cancellation: None,
        })
    }

    // ======================================= builder ============================================

    /// Record every `stride`-th accepted step (plus the initial and final states)
    pub fn record_every(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_observables(mut self, observables: ObservableRegistry) -> Self {
        self.observables = observables;
        self
    }

    /// Register one scalar observable
    pub fn observe<F>(mut self, name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn(&State) -> f64 + Send + Sync + 'static,
    {
        self.observables = self.observables.with_scalar(name, f)?;
        Ok(self)
    }

    pub fn stop_when<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(f64, &State) -> bool + Send + Sync + 'static,
    {
        self.stop_conditions.push(StopCondition::new(name, predicate));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    // ======================================= accessors ==========================================

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    pub fn stepper(&self) -> &dyn Stepper {
        self.stepper.as_ref()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn observables(&self) -> &ObservableRegistry {
        &self.observables
    }

    // ======================================= running ============================================

    /// Evolve `initial` under `op` over `span`
    pub fn run(&self, initial: &State, op: &dyn Operator, span: TimeSpan) -> Result<Trajectory> {
        span.validate()?;
        if self.stride == 0 {
            return Err(EvolutionError::config("recording stride must be at least 1"));
        }
        self.stepper.validate(initial, op)?;
        if let Some(field) = initial.first_non_finite() {
            return Err(EvolutionError::config(format!("initial state has non-finite values in field '{field}'")));
        }
        self.check_operator(initial, op, span.start)?;

        let observables = self.observables.clone();
        let initial_values = observables.evaluate(initial)?;

        let mut trajectory = Trajectory::new(self.config.scheme);
        trajectory.push(TrajectoryEntry { time: span.start, step: 0, state: initial.clone(), observables: initial_values });
        trajectory.transition(RunStatus::Stepping)?;

        log::info!(
            "{} run of '{}' over [{}, {}], dt = {}{}",
            self.stepper.name(),
            op.name(),
            span.start,
            span.end,
            self.config.dt,
            if self.config.is_adaptive() { " (adaptive)" } else { "" }
        );

        let mut run = ActiveRun {
            integrator: self,
            observables,
            trajectory,
            state: initial.clone(),
            time: span.start,
            steps: 0,
            last_recorded: 0,
        };

        let status = match self.drive(&mut run, op, span) {
            Ok(status) => status,
            Err(error) => {
                log::warn!("run diverged at t = {} after {} steps: {error}", run.time, run.steps);
                RunStatus::Diverged { error }
            }
        };

        match &status {
            RunStatus::Cancelled => log::warn!("run cancelled at t = {} after {} steps", run.time, run.steps),
            RunStatus::EarlyStopped { condition, time } => log::warn!("stop condition '{condition}' fired at t = {time}"),
            _ => {}
        }

        let mut trajectory = run.trajectory;
        trajectory.transition(status)?;

        let statistics = trajectory.statistics();
        log::info!(
            "run {}: {} accepted / {} rejected steps, {} evaluations, {} entries",
            trajectory.status(),
            statistics.accepted_steps,
            statistics.rejected_steps,
            statistics.function_evaluations,
            trajectory.len()
        );
        Ok(trajectory)
    }

    /// Evaluate `op` once on the initial state, and build the matrix an
    /// implicit direct solve would factor
    ///
    /// Operators whose output layout or matrix size does not fit the state
    /// fail here instead of at the first step.
    fn check_operator(&self, initial: &State, op: &dyn Operator, t0: f64) -> Result<()> {
        op.apply(initial, t0)?;
        if self.stepper.family() == SchemeFamily::Implicit && !op.is_time_dependent() && op.is_linear() {
            op.try_matrix_for(initial)?;
        }
        Ok(())
    }

    fn drive(&self, run: &mut ActiveRun<'_>, op: &dyn Operator, span: TimeSpan) -> Result<RunStatus> {
        let outcome = match &self.config.adaptive {
            Some(adaptive) => self.drive_adaptive(run, op, span, adaptive)?,
            None => self.drive_fixed(run, op, span)?,
        };

        match outcome {
            Some(status) => Ok(status),
            None => {
                run.record()?;
                Ok(RunStatus::Completed)
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Fixed-step loop; `Some(status)` when the run ended before `span.end`
    fn drive_fixed(&self, run: &mut ActiveRun<'_>, op: &dyn Operator, span: TimeSpan) -> Result<Option<RunStatus>> {
        let dt = self.config.dt;
        let total = fixed_step_count(span, dt);

        for k in 1..=total {
            if self.is_cancelled() {
                return Ok(Some(RunStatus::Cancelled));
            }

            let t0 = span.start + (k - 1) as f64 * dt;
            let t1 = if k == total { span.end } else { span.start + k as f64 * dt };
            let h = t1 - t0;

            let outcome = self.stepper.step(&run.state, op, t0, h)?;
            run.trajectory.statistics_mut().record_step(h, outcome.evaluations, outcome.iterations);

            if let Some(status) = run.accept(outcome.state, t1, h)? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    /// Adaptive loop; `Some(status)` when the run ended before `span.end`
    fn drive_adaptive(
        &self,
        run: &mut ActiveRun<'_>,
        op: &dyn Operator,
        span: TimeSpan,
        adaptive: &AdaptiveConfig,
    ) -> Result<Option<RunStatus>> {
        let max_dt = adaptive.max_dt.unwrap_or(f64::INFINITY);
        let exponent = -1.0 / (self.stepper.error_order() as f64 + 1.0);
        let mut h = self.config.dt.min(max_dt);

        while run.time < span.end {
            if self.is_cancelled() {
                return Ok(Some(RunStatus::Cancelled));
            }

            let remaining = span.end - run.time;
            let last = h >= remaining;
            let h_try = if last { remaining } else { h };

            let attempt = self.attempt(&run.state, op, run.time, h_try)?;
            // a smaller step cannot repair NaN or infinite samples
            check_finite(&attempt.state, run.time + h_try, run.steps + 1)?;
            let error = error_norm(&attempt.error, &run.state, &attempt.state, adaptive)?;

            if error <= 1.0 {
                run.trajectory.statistics_mut().record_step(h_try, attempt.evaluations, attempt.iterations);

                let t_next = if last { span.end } else { run.time + h_try };
                if let Some(status) = run.accept(attempt.state, t_next, h_try)? {
                    return Ok(Some(status));
                }

                let factor = if error == 0.0 { MAX_FACTOR } else { MAX_FACTOR.min((SAFETY * error.powf(exponent)).max(1.0)) };
                // a clipped final step says nothing about the next step size
                if !last {
                    h = (h_try * factor).min(max_dt);
                }
            } else {
                run.trajectory.statistics_mut().record_rejection(attempt.evaluations, attempt.iterations);

                let factor = if error.is_finite() { MIN_FACTOR.max(SAFETY * error.powf(exponent)) } else { MIN_FACTOR };
                h = h_try * factor;
                log::debug!("rejected step h = {h_try:e} at t = {} (error {error:e}), retrying with {h:e}", run.time);

                if h < adaptive.min_dt {
                    return Err(EvolutionError::StepSizeUnderflow { step: h, minimum: adaptive.min_dt, time: run.time });
                }
            }
        }
        Ok(None)
    }

    /// One trial step together with its local error estimate
    fn attempt(&self, state: &State, op: &dyn Operator, t: f64, h: f64) -> Result<Attempt> {
        let full = self.stepper.step(state, op, t, h)?;

        if self.stepper.has_embedded_error()
            && let Some(error) = full.error_estimate
        {
            return Ok(Attempt { state: full.state, error, evaluations: full.evaluations, iterations: full.iterations });
        }

        // step doubling
        let half = h / 2.0;
        let first = self.stepper.step(state, op, t, half)?;
        let second = self.stepper.step(&first.state, op, t + half, half)?;

        let richardson = 2f64.powi(self.stepper.order() as i32) - 1.0;
        let error = &second.state.difference(&full.state)? * (1.0 / richardson);

        Ok(Attempt {
            state: second.state,
            error,
            evaluations: full.evaluations + first.evaluations + second.evaluations,
            iterations: full.iterations + first.iterations + second.iterations,
        })
    }

    /// Run every initial state independently (in parallel with the `parallel` feature)
    pub fn run_ensemble(&self, initials: &[State], op: &dyn Operator, span: TimeSpan) -> Vec<Result<Trajectory>> {
        #[cfg(feature = "parallel")]
        {
            initials.par_iter().map(|initial| self.run(initial, op, span)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            initials.iter().map(|initial| self.run(initial, op, span)).collect()
        }
    }
}

// =================================================================================================
// Free functions
// =================================================================================================

/// One-shot run with a fixed observable registry
///
/// # Example
///
/// ```rust
/// use physkit::diagnostics::ObservableRegistry;
/// use physkit::operator::MatrixOperator;
/// use physkit::physics::{DomainDescriptor, State};
/// use physkit::solver::{Scheme, StepperConfig, TimeSpan, run};
///
/// let decay = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(1), vec![-2.0]).unwrap();
/// let config = StepperConfig::adaptive(Scheme::DormandPrince45, 0.1, 1e-8, 1e-10);
///
/// let trajectory = run(
///     &State::lumped(vec![1.0]).unwrap(),
///     &decay,
///     &config,
///     TimeSpan::new(0.0, 2.0),
///     &ObservableRegistry::new(),
/// ).unwrap();
///
/// let y = trajectory.final_state().unwrap().primary().real_parts()[0];
/// assert!((y - (-4.0f64).exp()).abs() < 1e-6);
/// assert_eq!(trajectory.times().last(), Some(&2.0));
/// ```
pub fn run(
    initial: &State,
    op: &dyn Operator,
    config: &StepperConfig,
    span: TimeSpan,
    observables: &ObservableRegistry,
) -> Result<Trajectory> {
    Integrator::new(config.clone())?.with_observables(observables.clone()).run(initial, op, span)
}

/// Independent runs from several initial states
pub fn run_ensemble(
    initials: &[State],
    op: &dyn Operator,
    config: &StepperConfig,
    span: TimeSpan,
    observables: &ObservableRegistry,
) -> Result<Vec<Result<Trajectory>>> {
    let integrator = Integrator::new(config.clone())?.with_observables(observables.clone());
    Ok(integrator.run_ensemble(initials, op, span))
}

// =================================================================================================
// Internals
// =================================================================================================

/// Number of fixed steps covering `span`, the last one possibly shorter
fn fixed_step_count(span: TimeSpan, dt: f64) -> usize {
    let raw = span.duration() / dt;
    ((raw - STEP_COUNT_SLACK).ceil() as usize).max(1)
}

/// RMS of `error / (atol + rtol·max(|y0|, |y1|))` over every sample of every field
fn error_norm(error: &State, y0: &State, y1: &State, adaptive: &AdaptiveConfig) -> Result<f64> {
    error.ensure_same_layout(y1, "error estimate")?;

    let mut sum = 0.0;
    let mut count = 0usize;
    for (((_, e), (_, a)), (_, b)) in error.fields().iter().zip(y0.fields()).zip(y1.fields()) {
        let (e, a, b) = (e.to_complex(), a.to_complex(), b.to_complex());
        for ((ei, ai), bi) in e.iter().zip(a.iter()).zip(b.iter()) {
            let scale = adaptive.atol + adaptive.rtol * ai.norm().max(bi.norm());
            let ratio = ei.norm() / scale;
            sum += ratio * ratio;
            count += 1;
        }
    }

    Ok(if count == 0 { 0.0 } else { (sum / count as f64).sqrt() })
}

struct Attempt {
    state: State,
    error: State,
    evaluations: usize,
    iterations: usize,
}

/// Mutable bookkeeping of a run in progress
struct ActiveRun<'a> {
    integrator: &'a Integrator,
    observables: ObservableRegistry,
    trajectory: Trajectory,
    state: State,
    time: f64,
    steps: usize,
    last_recorded: usize,
}

impl ActiveRun<'_> {
    /// Take an accepted step; `Some(status)` when it ends the run
    fn accept(&mut self, next: State, time: f64, dt: f64) -> Result<Option<RunStatus>> {
        let integrator = self.integrator;
        let step = self.steps + 1;
        check_finite(&next, time, step)?;

        let change_rate = match integrator.config.steady_state_tolerance {
            Some(_) => Some(max_change(&self.state, &next)? / dt),
            None => None,
        };

        self.state = next;
        self.time = time;
        self.steps = step;

        if let Some(condition) = integrator.stop_conditions.iter().find(|c| c.is_met(time, &self.state)) {
            self.record()?;
            return Ok(Some(RunStatus::EarlyStopped { condition: condition.name().to_string(), time }));
        }

        if let (Some(rate), Some(tolerance)) = (change_rate, integrator.config.steady_state_tolerance)
            && rate < tolerance
        {
            log::debug!("steady state reached at t = {time} (change rate {rate:e})");
            self.record()?;
            return Ok(Some(RunStatus::Converged));
        }

        if step % integrator.stride == 0 {
            self.record()?;
        }
        Ok(None)
    }

    /// Record the current state unless it already is the last entry
    fn record(&mut self) -> Result<()> {
        if self.steps == self.last_recorded {
            return Ok(());
        }

        let observables: Vec<(String, ObservableValue)> = self.observables.evaluate(&self.state)?;
        log::debug!("recording step {} at t = {}", self.steps, self.time);
        self.trajectory.push(TrajectoryEntry {
            time: self.time,
            step: self.steps,
            state: self.state.clone(),
            observables,
        });
        self.last_recorded = self.steps;
        Ok(())
    }
}

/// Largest absolute sample change between two states
fn max_change(previous: &State, next: &State) -> Result<f64> {
    let delta = next.difference(previous)?;
    Ok(delta.fields().iter().map(|(_, data)| data.max_abs()).fold(0.0, f64::max))
}
