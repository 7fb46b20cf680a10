//! Diagnostics and observables
//!
//! Observables are pure functions `State -> ObservableValue`. Discrete
//! integrals use the domain's quadrature weights (`dx` on uniform interior
//! grids, trapezoid weights on closed and Chebyshev grids, `1` on lumped
//! systems), so `probability` of a sampled unit-norm wavefunction is 1 up to
//! the quadrature error.
//!
//! # Example
//!
//! ```rust
//! use physkit::diagnostics::{ObservableRegistry, ObservableValue, l2_norm, max_abs};
//! use physkit::physics::State;
//!
//! let registry = ObservableRegistry::new()
//!     .with_scalar("l2", l2_norm).unwrap()
//!     .with_scalar("max", max_abs).unwrap();
//!
//! let values = registry.evaluate(&State::lumped(vec![3.0, -4.0]).unwrap()).unwrap();
//! assert_eq!(values[0], ("l2".to_string(), ObservableValue::Scalar(5.0)));
//! assert_eq!(values[1], ("max".to_string(), ObservableValue::Scalar(4.0)));
//!
//! // names are unique
//! assert!(registry.clone().with_scalar("l2", max_abs).is_err());
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{EvolutionError, Result};
use crate::operator::Operator;
use crate::physics::{Field, FieldData, State};

// =================================================================================================
// Observable values and registry
// =================================================================================================

/// Value of an observable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservableValue {
    Scalar(f64),
    Series(Vec<f64>),
}

impl ObservableValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ObservableValue::Scalar(x) => Some(*x),
            ObservableValue::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            ObservableValue::Series(values) => Some(values),
            ObservableValue::Scalar(_) => None,
        }
    }
}

impl fmt::Display for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservableValue::Scalar(x) => write!(f, "{x}"),
            ObservableValue::Series(values) => write!(f, "Series[{}]", values.len()),
        }
    }
}

/// Signature of an observable
pub type ObservableFn = dyn Fn(&State) -> Result<ObservableValue> + Send + Sync;

/// Shared observable handle
pub type Observable = Arc<ObservableFn>;

/// Ordered, uniquely named set of observables
///
/// The integrator takes its own copy when a run starts; registering more
/// observables afterwards does not affect a run in progress.
#[derive(Clone, Default)]
pub struct ObservableRegistry {
    entries: Vec<(String, Observable)>,
}

impl ObservableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observable, rejecting duplicate names
    pub fn register<F>(&mut self, name: impl Into<String>, observable: F) -> Result<()>
    where
        F: Fn(&State) -> Result<ObservableValue> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(EvolutionError::config(format!("observable '{name}' is already registered")));
        }
        self.entries.push((name, Arc::new(observable)));
        Ok(())
    }

    /// Builder form of [`ObservableRegistry::register`]
    pub fn with<F>(mut self, name: impl Into<String>, observable: F) -> Result<Self>
    where
        F: Fn(&State) -> Result<ObservableValue> + Send + Sync + 'static,
    {
        self.register(name, observable)?;
        Ok(self)
    }

    /// Register an infallible scalar function
    pub fn with_scalar<F>(self, name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn(&State) -> f64 + Send + Sync + 'static,
    {
        self.with(name, move |state: &State| Ok(ObservableValue::Scalar(f(state))))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate every observable in registration order
    pub fn evaluate(&self, state: &State) -> Result<Vec<(String, ObservableValue)>> {
        self.entries
            .iter()
            .map(|(name, observable)| {
                let value = observable(state).map_err(|e| match e {
                    EvolutionError::Observable { .. } => e,
                    other => EvolutionError::Observable { name: name.clone(), reason: other.to_string() },
                })?;
                Ok((name.clone(), value))
            })
            .collect()
    }
}

impl fmt::Debug for ObservableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableRegistry").field("names", &self.names()).finish()
    }
}

// =================================================================================================
// Built-in diagnostics
// =================================================================================================

/// Weighted sum `Σ wᵢ·g(uᵢ)` over one field
fn weighted_sum(state: &State, data: &FieldData, g: impl Fn(Complex64) -> f64) -> f64 {
    let weights = state.domain().quadrature_weights();
    data.to_complex().iter().zip(weights).map(|(z, w)| w * g(*z)).sum()
}

/// Discrete L2 norm over all fields, `sqrt(Σ wᵢ·|uᵢ|²)`
pub fn l2_norm(state: &State) -> f64 {
    state
        .fields()
        .iter()
        .map(|(_, data)| weighted_sum(state, data, |z| z.norm_sqr()))
        .sum::<f64>()
        .sqrt()
}

/// Integral (mass) of the primary field, `Σ wᵢ·Re(uᵢ)`
pub fn integral(state: &State) -> f64 {
    weighted_sum(state, state.primary(), |z| z.re)
}

/// Total probability of the primary field, `Σ wᵢ·|ψᵢ|²`
pub fn probability(state: &State) -> f64 {
    weighted_sum(state, state.primary(), |z| z.norm_sqr())
}

/// Pointwise `|ψᵢ|²` of the primary field
pub fn probability_density(state: &State) -> ObservableValue {
    ObservableValue::Series(state.primary().norm_sqr())
}

/// Largest magnitude over all fields
pub fn max_abs(state: &State) -> f64 {
    state.fields().iter().map(|(_, d)| d.max_abs()).fold(0.0, f64::max)
}

/// Discrete inner product `⟨a|b⟩ = Σ wᵢ·conj(aᵢ)·bᵢ` summed over fields
///
/// Both states must live on the same domain with the same field names; real
/// and complex states may be mixed.
pub fn inner_product(a: &State, b: &State) -> Result<Complex64> {
    a.domain().ensure_compatible(b.domain(), "inner product")?;
    if a.field_names() != b.field_names() {
        return Err(EvolutionError::shape(format!(
            "inner product of states with fields {:?} and {:?}",
            a.field_names(),
            b.field_names()
        )));
    }

    let weights = a.domain().quadrature_weights();
    let mut total = Complex64::new(0.0, 0.0);
    for ((_, da), (_, db)) in a.fields().iter().zip(b.fields()) {
        let (za, zb) = (da.to_complex(), db.to_complex());
        for ((x, y), w) in za.iter().zip(zb.iter()).zip(&weights) {
            total += x.conj() * y * *w;
        }
    }
    Ok(total)
}

/// New state scaled to unit L2 norm; the zero state is rejected
pub fn normalized(state: &State) -> Result<State> {
    let norm = l2_norm(state);
    if norm == 0.0 || !norm.is_finite() {
        return Err(EvolutionError::Observable {
            name: "normalize".into(),
            reason: format!("cannot normalize a state of norm {norm}"),
        });
    }
    Ok(state * (1.0 / norm))
}

/// Harmonic oscillator energy `Σ pᵢ²/(2m) + k·qᵢ²/2`
///
/// Requires real `Position` and `Momentum` fields.
pub fn oscillator_energy(mass: f64, stiffness: f64) -> impl Fn(&State) -> Result<ObservableValue> + Send + Sync + Clone {
    move |state: &State| {
        let q = state.require(&Field::Position, "oscillator energy")?.real_parts();
        let p = state.require(&Field::Momentum, "oscillator energy")?.real_parts();
        let energy = q
            .iter()
            .zip(&p)
            .map(|(q, p)| p * p / (2.0 * mass) + 0.5 * stiffness * q * q)
            .sum();
        Ok(ObservableValue::Scalar(energy))
    }
}

/// Energy expectation `Re⟨ψ|H|ψ⟩` for a time-independent Hamiltonian
///
/// The state is expected to be normalized.
pub fn energy_expectation(hamiltonian: Arc<dyn Operator>) -> impl Fn(&State) -> Result<ObservableValue> + Send + Sync + Clone {
    move |state: &State| {
        let h_psi = hamiltonian.apply(state, 0.0)?;
        Ok(ObservableValue::Scalar(inner_product(state, &h_psi)?.re))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::{Discretization, FiniteDifference, OperatorKind, StencilOrder};
    use crate::physics::{BoundaryKind, DomainDescriptor, GridType};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn ground_state(points: usize) -> (FiniteDifference, State) {
        let fd = FiniteDifference::new(0.0, 1.0, points, BoundaryKind::Dirichlet, StencilOrder::Second).unwrap();
        let state = fd
            .build_complex_state(&|x| Complex64::new(2f64.sqrt() * (PI * x).sin(), 0.0))
            .unwrap();
        (fd, state)
    }

    #[test]
    fn test_probability_of_sampled_eigenstate() {
        let (_, psi) = ground_state(99);
        assert_relative_eq!(probability(&psi), 1.0, epsilon = 1e-10);
        assert_relative_eq!(l2_norm(&psi), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_energy_expectation_of_ground_state() {
        let (fd, psi) = ground_state(199);
        let h = fd.build_operator(&OperatorKind::Hamiltonian { mass: 1.0, hbar: 1.0, potential: None }).unwrap();
        let energy = energy_expectation(h)(&psi).unwrap().as_scalar().unwrap();
        assert_relative_eq!(energy, PI * PI / 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_inner_product_is_conjugate_linear() {
        let domain = DomainDescriptor::uniform(0.0, 1.0, 4, GridType::LeftClosed, BoundaryKind::Periodic).unwrap();
        let a = State::new(domain.clone(), Field::WaveFunction, FieldData::from_complex_vec(vec![Complex64::i(); 4])).unwrap();
        let b = State::new(domain, Field::WaveFunction, FieldData::from_complex_vec(vec![Complex64::new(1.0, 0.0); 4])).unwrap();

        // Σ conj(i)·1·dx = -i
        let ab = inner_product(&a, &b).unwrap();
        assert_relative_eq!(ab.re, 0.0);
        assert_relative_eq!(ab.im, -1.0);

        let ba = inner_product(&b, &a).unwrap();
        assert_relative_eq!(ba.im, 1.0);
    }

    #[test]
    fn test_inner_product_requires_same_domain() {
        let a = State::lumped(vec![1.0, 2.0]).unwrap();
        let b = State::lumped(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(inner_product(&a, &b), Err(EvolutionError::ShapeMismatch(_))));
    }

    #[test]
    fn test_normalized() {
        let state = State::lumped(vec![3.0, 4.0]).unwrap();
        let unit = normalized(&state).unwrap();
        assert_relative_eq!(l2_norm(&unit), 1.0);
        assert_eq!(state.primary().real_parts(), vec![3.0, 4.0]);

        assert!(normalized(&State::lumped(vec![0.0, 0.0]).unwrap()).is_err());
    }

    #[test]
    fn test_integral_and_density() {
        let fd = FiniteDifference::new(0.0, 1.0, 10, BoundaryKind::Periodic, StencilOrder::Second).unwrap();
        let state = fd.build_state(&|_| 2.0).unwrap();
        assert_relative_eq!(integral(&state), 2.0, epsilon = 1e-12);

        let density = probability_density(&state);
        assert_eq!(density.as_series().unwrap(), &[4.0; 10][..]);
    }

    #[test]
    fn test_oscillator_energy_requires_phase_space() {
        let energy = oscillator_energy(1.0, 4.0);
        assert!(energy(&State::lumped(vec![1.0]).unwrap()).is_err());

        let state = State::from_fields(
            DomainDescriptor::lumped(1),
            vec![(Field::Position, FieldData::from_vec(vec![1.0])), (Field::Momentum, FieldData::from_vec(vec![2.0]))],
        )
        .unwrap();
        assert_eq!(energy(&state).unwrap(), ObservableValue::Scalar(4.0));
    }

    #[test]
    fn test_registry_wraps_errors_with_the_observable_name() {
        let registry = ObservableRegistry::new().with("energy", oscillator_energy(1.0, 1.0)).unwrap();
        let error = registry.evaluate(&State::lumped(vec![1.0]).unwrap()).unwrap_err();
        assert!(matches!(error, EvolutionError::Observable { ref name, .. } if name == "energy"));
    }

    #[test]
    fn test_registry_order_and_duplicates() {
        let mut registry = ObservableRegistry::new();
        registry.register("b", |_: &State| Ok(ObservableValue::Scalar(1.0))).unwrap();
        registry.register("a", |_: &State| Ok(ObservableValue::Scalar(2.0))).unwrap();
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert!(registry.register("a", |_: &State| Ok(ObservableValue::Scalar(3.0))).is_err());
        assert_eq!(registry.len(), 2);
    }
}
