//! Stepper traits and configuration
//!
//! # Design
//!
//! - [`Scheme`] is the closed set of known stepping rules. Each variant knows
//!   its family and order and builds the matching [`Stepper`].
//! - [`StepperConfig`] carries the numerical parameters of a run. It is
//!   validated before anything steps and copied by the integrator, so it
//!   cannot change mid-run.
//! - [`Stepper`] is the strategy trait: one time increment, no loop.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EvolutionError, Result};
use crate::operator::Operator;
use crate::physics::{State, ValueKind};
use crate::solver::methods::{
    CrankNicolson, DormandPrince45, ExplicitEuler, ImplicitEuler, Leapfrog, Rk2, Rk4, StormerVerlet,
};

// =================================================================================================
// Scheme identifiers
// =================================================================================================

/// Family of a stepping rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeFamily {
    Explicit,
    Implicit,
    Symplectic,
}

impl fmt::Display for SchemeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeFamily::Explicit => write!(f, "explicit"),
            SchemeFamily::Implicit => write!(f, "implicit"),
            SchemeFamily::Symplectic => write!(f, "symplectic"),
        }
    }
}

/// Known stepping rules
///
/// | Scheme | Family | Order | Evaluations / step |
/// |--------|--------|-------|--------------------|
/// | `ExplicitEuler` | explicit | 1 | 1 |
/// | `Rk2` | explicit | 2 | 2 |
/// | `Rk4` | explicit | 4 | 4 |
/// | `DormandPrince45` | explicit | 5 (embedded 4) | 7 |
/// | `ImplicitEuler` | implicit | 1 | matrix solve or fixed point |
/// | `CrankNicolson` | implicit | 2 | matrix solve or fixed point |
/// | `Leapfrog` | symplectic | 2 | 3 |
/// | `StormerVerlet` | symplectic | 2 | 3 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    ExplicitEuler,
    Rk2,
    Rk4,
    DormandPrince45,
    ImplicitEuler,
    CrankNicolson,
    Leapfrog,
    StormerVerlet,
}

impl Scheme {
    pub fn name(&self) -> &'static str {
        match self {
            Scheme::ExplicitEuler => "Explicit Euler",
            Scheme::Rk2 => "Runge-Kutta 2 (midpoint)",
            Scheme::Rk4 => "Runge-Kutta 4",
            Scheme::DormandPrince45 => "Dormand-Prince 4(5)",
            Scheme::ImplicitEuler => "Implicit Euler",
            Scheme::CrankNicolson => "Crank-Nicolson",
            Scheme::Leapfrog => "Leapfrog",
            Scheme::StormerVerlet => "Stormer-Verlet",
        }
    }

    pub fn family(&self) -> SchemeFamily {
        match self {
            Scheme::ExplicitEuler | Scheme::Rk2 | Scheme::Rk4 | Scheme::DormandPrince45 => SchemeFamily::Explicit,
            Scheme::ImplicitEuler | Scheme::CrankNicolson => SchemeFamily::Implicit,
            Scheme::Leapfrog | Scheme::StormerVerlet => SchemeFamily::Symplectic,
        }
    }

    /// Global order of accuracy
    pub fn order(&self) -> usize {
        match self {
            Scheme::ExplicitEuler | Scheme::ImplicitEuler => 1,
            Scheme::Rk2 | Scheme::CrankNicolson | Scheme::Leapfrog | Scheme::StormerVerlet => 2,
            Scheme::Rk4 => 4,
            Scheme::DormandPrince45 => 5,
        }
    }

    pub const ALL: [Scheme; 8] = [
        Scheme::ExplicitEuler,
        Scheme::Rk2,
        Scheme::Rk4,
        Scheme::DormandPrince45,
        Scheme::ImplicitEuler,
        Scheme::CrankNicolson,
        Scheme::Leapfrog,
        Scheme::StormerVerlet,
    ];
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =================================================================================================
// Stepper trait
// =================================================================================================

/// Result of a single step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// State at `t + dt`
    pub state: State,

    /// Embedded local error estimate, when the scheme has one
    pub error_estimate: Option<State>,

    /// Implicit iterations spent (0 for explicit schemes and direct solves)
    pub iterations: usize,

    /// Operator evaluations spent
    pub evaluations: usize,
}

impl StepOutcome {
    pub fn new(state: State, evaluations: usize) -> Self {
        Self { state, error_estimate: None, iterations: 0, evaluations }
    }
}

/// One time increment under an operator
///
/// `op.apply(state, t)` is the time derivative `dstate/dt`. Implementations
/// are stateless and can be shared between runs and threads.
///
/// # Example
///
/// ```rust
/// use physkit::operator::{MatrixOperator, Operator};
/// use physkit::physics::{DomainDescriptor, State};
/// use physkit::solver::{Stepper, Rk4};
///
/// let decay = MatrixOperator::diagonal("decay", DomainDescriptor::lumped(1), vec![-1.0]).unwrap();
/// let y0 = State::lumped(vec![1.0]).unwrap();
///
/// let y1 = Rk4.advance(&y0, &decay, 0.0, 0.1).unwrap();
/// let exact = (-0.1f64).exp();
/// assert!((y1.primary().real_parts()[0] - exact).abs() < 1e-6);
/// ```
pub trait Stepper: Send + Sync + fmt::Debug {
    fn scheme(&self) -> Scheme;

    fn name(&self) -> &str {
        self.scheme().name()
    }

    fn family(&self) -> SchemeFamily {
        self.scheme().family()
    }

    fn order(&self) -> usize {
        self.scheme().order()
    }

    /// Order of the embedded error estimate (the lower order of the pair)
    ///
    /// Steppers without an embedded pair are controlled by step doubling,
    /// whose estimate has the scheme's own order.
    fn error_order(&self) -> usize {
        self.order()
    }

    fn has_embedded_error(&self) -> bool {
        false
    }

    fn supports(&self, _kind: ValueKind) -> bool {
        true
    }

    /// Checks performed once before the first step
    fn validate(&self, state: &State, op: &dyn Operator) -> Result<()> {
        if !self.supports(state.value_kind()) {
            return Err(EvolutionError::unsupported(state.value_kind(), self.name()));
        }
        op.check_input(state)
    }

    /// Advance by `dt`, with diagnostics
    fn step(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<StepOutcome>;

    /// Advance by `dt`
    fn advance(&self, state: &State, op: &dyn Operator, t: f64, dt: f64) -> Result<State> {
        Ok(self.step(state, op, t, dt)?.state)
    }
}

// =================================================================================================
// Stepper configuration
// =================================================================================================

const DEFAULT_TOLERANCE: f64 = 1e-10;
const DEFAULT_MAX_ITERATIONS: usize = 50;

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

/// Adaptive step-size control settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Relative tolerance
    pub rtol: f64,

    /// Absolute tolerance
    pub atol: f64,

    /// Smallest step before the run fails with `StepSizeUnderflow`
    pub min_dt: f64,

    /// Largest step, unbounded when `None`
    #[serde(default)]
    pub max_dt: Option<f64>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self { rtol: 1e-6, atol: 1e-9, min_dt: 1e-12, max_dt: None }
    }
}

impl AdaptiveConfig {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rtol >= 0.0 && self.rtol.is_finite()) || !(self.atol >= 0.0 && self.atol.is_finite()) {
            return Err(EvolutionError::config("adaptive tolerances must be finite and non-negative"));
        }
        if self.rtol == 0.0 && self.atol == 0.0 {
            return Err(EvolutionError::config("rtol and atol cannot both be zero"));
        }
        if !(self.min_dt > 0.0 && self.min_dt.is_finite()) {
            return Err(EvolutionError::config(format!("min_dt must be positive, got {}", self.min_dt)));
        }
        if let Some(max_dt) = self.max_dt
            && !(max_dt >= self.min_dt && max_dt.is_finite())
        {
            return Err(EvolutionError::config(format!(
                "max_dt ({max_dt}) must be finite and at least min_dt ({})",
                self.min_dt
            )));
        }
        Ok(())
    }
}

/// Numerical parameters of a run
///
/// # Examples
///
/// ```rust
/// use physkit::solver::{Scheme, StepperConfig};
///
/// // fixed-step RK4
/// let config = StepperConfig::explicit(Scheme::Rk4, 0.01);
/// assert!(config.validate().is_ok());
///
/// // Crank-Nicolson with a tighter fixed-point budget for nonlinear operators
/// let config = StepperConfig::implicit(Scheme::CrankNicolson, 0.1, 1e-12, 100);
///
/// // adaptive Dormand-Prince
/// let config = StepperConfig::adaptive(Scheme::DormandPrince45, 0.01, 1e-8, 1e-10);
///
/// // from JSON
/// let config = StepperConfig::from_json(r#"{ "scheme": "Leapfrog", "dt": 0.05 }"#).unwrap();
/// assert_eq!(config.scheme, Scheme::Leapfrog);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepperConfig {
    pub scheme: Scheme,

    /// Time increment (initial increment in adaptive mode)
    pub dt: f64,

    /// Fixed-point tolerance of implicit schemes on nonlinear operators
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Fixed-point iteration budget of implicit schemes
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub adaptive: Option<AdaptiveConfig>,

    /// Stop with `Converged` once `max|Δy|/dt` falls below this value
    #[serde(default)]
    pub steady_state_tolerance: Option<f64>,
}

impl StepperConfig {
    // ======================================= constructors =======================================

    pub fn new(scheme: Scheme, dt: f64) -> Self {
        Self {
            scheme,
            dt,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            adaptive: None,
            steady_state_tolerance: None,
        }
    }

    /// Fixed-step explicit or symplectic run
    pub fn explicit(scheme: Scheme, dt: f64) -> Self {
        Self::new(scheme, dt)
    }

    /// Fixed-step implicit run with an explicit iteration budget
    pub fn implicit(scheme: Scheme, dt: f64, tolerance: f64, max_iterations: usize) -> Self {
        Self { tolerance, max_iterations, ..Self::new(scheme, dt) }
    }

    /// Adaptive run starting from `dt`
    pub fn adaptive(scheme: Scheme, dt: f64, rtol: f64, atol: f64) -> Self {
        Self { adaptive: Some(AdaptiveConfig::new(rtol, atol)), ..Self::new(scheme, dt) }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ======================================= builder ============================================

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
        self.adaptive = Some(adaptive);
        self
    }

    /// Bounds of the adaptive step (enables adaptivity with default tolerances if needed)
    pub fn with_step_bounds(mut self, min_dt: f64, max_dt: Option<f64>) -> Self {
        let adaptive = self.adaptive.get_or_insert_with(AdaptiveConfig::default);
        adaptive.min_dt = min_dt;
        adaptive.max_dt = max_dt;
        self
    }

    pub fn with_steady_state(mut self, tolerance: f64) -> Self {
        self.steady_state_tolerance = Some(tolerance);
        self
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive.is_some()
    }

    // ======================================= validation =========================================

    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(EvolutionError::config(format!("dt must be positive and finite, got {}", self.dt)));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(EvolutionError::config(format!("tolerance must be positive, got {}", self.tolerance)));
        }
        if self.max_iterations == 0 {
            return Err(EvolutionError::config("max_iterations must be greater than 0"));
        }
        if let Some(adaptive) = &self.adaptive {
            adaptive.validate()?;
            if self.scheme.family() == SchemeFamily::Symplectic {
                return Err(EvolutionError::config(format!(
                    "{} is a fixed-step scheme; adaptive control would break its conservation properties",
                    self.scheme
                )));
            }
        }
        if let Some(tolerance) = self.steady_state_tolerance
            && !(tolerance > 0.0 && tolerance.is_finite())
        {
            return Err(EvolutionError::config(format!(
                "steady-state tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(())
    }

    /// Stepper implementing the configured scheme
    pub fn build_stepper(&self) -> Box<dyn Stepper> {
        match self.scheme {
            Scheme::ExplicitEuler => Box::new(ExplicitEuler),
            Scheme::Rk2 => Box::new(Rk2),
            Scheme::Rk4 => Box::new(Rk4),
            Scheme::DormandPrince45 => Box::new(DormandPrince45),
            Scheme::ImplicitEuler => Box::new(ImplicitEuler::new(self.tolerance, self.max_iterations)),
            Scheme::CrankNicolson => Box::new(CrankNicolson::new(self.tolerance, self.max_iterations)),
            Scheme::Leapfrog => Box::new(Leapfrog),
            Scheme::StormerVerlet => Box::new(StormerVerlet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_metadata() {
        assert_eq!(Scheme::Rk4.order(), 4);
        assert_eq!(Scheme::CrankNicolson.family(), SchemeFamily::Implicit);
        assert_eq!(Scheme::Leapfrog.family(), SchemeFamily::Symplectic);
        assert_eq!(Scheme::DormandPrince45.to_string(), "Dormand-Prince 4(5)");
    }

    #[test]
    fn test_built_stepper_matches_scheme() {
        for scheme in Scheme::ALL {
            let stepper = StepperConfig::new(scheme, 0.1).build_stepper();
            assert_eq!(stepper.scheme(), scheme);
            assert_eq!(stepper.order(), scheme.order());
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(StepperConfig::explicit(Scheme::Rk4, 0.0).validate().is_err());
        assert!(StepperConfig::explicit(Scheme::Rk4, f64::NAN).validate().is_err());
        assert!(StepperConfig::implicit(Scheme::ImplicitEuler, 0.1, 0.0, 10).validate().is_err());
        assert!(StepperConfig::implicit(Scheme::ImplicitEuler, 0.1, 1e-8, 0).validate().is_err());
        assert!(StepperConfig::adaptive(Scheme::Rk4, 0.1, 0.0, 0.0).validate().is_err());
        assert!(StepperConfig::explicit(Scheme::Rk4, 0.1).with_steady_state(-1.0).validate().is_err());
        assert!(StepperConfig::explicit(Scheme::Rk4, 0.1).with_step_bounds(1e-3, Some(1e-4)).validate().is_err());
    }

    #[test]
    fn test_symplectic_schemes_reject_adaptivity() {
        let config = StepperConfig::adaptive(Scheme::Leapfrog, 0.1, 1e-6, 1e-9);
        assert!(matches!(config.validate(), Err(EvolutionError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_json_defaults_and_round_trip() {
        let config = StepperConfig::from_json(r#"{ "scheme": "CrankNicolson", "dt": 0.5 }"#).unwrap();
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(!config.is_adaptive());

        let adaptive = StepperConfig::adaptive(Scheme::DormandPrince45, 0.01, 1e-8, 1e-10).with_steady_state(1e-9);
        let parsed = StepperConfig::from_json(&adaptive.to_json().unwrap()).unwrap();
        assert_eq!(parsed, adaptive);
    }

    #[test]
    fn test_from_json_validates() {
        assert!(matches!(
            StepperConfig::from_json(r#"{ "scheme": "Rk4", "dt": -1.0 }"#),
            Err(EvolutionError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            StepperConfig::from_json(r#"{ "scheme": "Rk7", "dt": 1.0 }"#),
            Err(EvolutionError::Serialization(_))
        ));
    }
}
