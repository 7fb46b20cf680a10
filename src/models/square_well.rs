//! Infinite square well on `(0, L)`
//!
//! The wavefunction lives on the interior points of a closed grid of
//! `points` nodes; the walls `ψ(0) = ψ(L) = 0` are implicit. The
//! second-order finite-difference Hamiltonian is
//!
//! ```text
//! H = -(ħ²/2m) · (ψᵢ₊₁ - 2ψᵢ + ψᵢ₋₁) / dx²,     dx = L / (points - 1)
//! ```
//!
//! with analytic levels `E_n = ħ²π²n²/(2mL²)` and eigenfunctions
//! `sqrt(2/L)·sin(nπx/L)`.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::discretization::{Discretization, FiniteDifference, OperatorKind, StencilOrder};
use crate::error::{EvolutionError, Result};
use crate::operator::{OperatorRef, scale_complex};
use crate::physics::{BoundaryKind, State};

/// Particle in a one-dimensional box
///
/// # Example
///
/// ```rust
/// use physkit::diagnostics::{energy_expectation, probability};
/// use physkit::models::InfiniteSquareWell;
///
/// let well = InfiniteSquareWell::new(1.0, 201).unwrap();
/// let ground = well.eigenstate(1).unwrap();
///
/// assert!((probability(&ground) - 1.0).abs() < 1e-10);
///
/// let energy = energy_expectation(well.hamiltonian().unwrap())(&ground).unwrap();
/// let exact = well.energy_level(1);
/// assert!((energy.as_scalar().unwrap() - exact).abs() / exact < 1e-4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteSquareWell {
    length: f64,
    points: usize,
    mass: f64,
    hbar: f64,
    discretization: FiniteDifference,
}

impl InfiniteSquareWell {
    /// Well of width `length` sampled by `points` nodes including both walls, `m = ħ = 1`
    pub fn new(length: f64, points: usize) -> Result<Self> {
        Self::with_constants(length, points, 1.0, 1.0)
    }

    pub fn with_constants(length: f64, points: usize, mass: f64, hbar: f64) -> Result<Self> {
        if !(length > 0.0 && length.is_finite()) {
            return Err(EvolutionError::config(format!("well width must be positive, got {length}")));
        }
        if points < 2 + StencilOrder::Second.width() {
            return Err(EvolutionError::discretization(format!(
                "a square well needs at least {} nodes including walls, got {points}",
                2 + StencilOrder::Second.width()
            )));
        }
        if !(mass > 0.0 && mass.is_finite() && hbar > 0.0 && hbar.is_finite()) {
            return Err(EvolutionError::config(format!("mass and hbar must be positive, got m = {mass}, ħ = {hbar}")));
        }

        let discretization =
            FiniteDifference::new(0.0, length, points - 2, BoundaryKind::Dirichlet, StencilOrder::Second)?;
        Ok(Self { length, points, mass, hbar, discretization })
    }

    // ======================================= accessors ==========================================

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Total number of nodes, walls included
    pub fn points(&self) -> usize {
        self.points
    }

    pub fn interior_points(&self) -> usize {
        self.points - 2
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn hbar(&self) -> f64 {
        self.hbar
    }

    pub fn discretization(&self) -> &FiniteDifference {
        &self.discretization
    }

    /// Interior coordinates
    pub fn coordinates(&self) -> Vec<f64> {
        self.discretization.coordinates()
    }

    // ======================================= operators ==========================================

    /// `H = -(ħ²/2m)·D₂`
    pub fn hamiltonian(&self) -> Result<OperatorRef> {
        self.discretization.build_operator(&OperatorKind::Hamiltonian {
            mass: self.mass,
            hbar: self.hbar,
            potential: None,
        })
    }

    /// Generator of the Schrödinger flow, `dψ/dt = -(i/ħ)·H·ψ`
    pub fn schrodinger_generator(&self) -> Result<OperatorRef> {
        scale_complex(Complex64::new(0.0, -1.0 / self.hbar), self.hamiltonian()?)
    }

    // ======================================= analytic results ===================================

    /// `E_n = ħ²π²n²/(2mL²)`
    pub fn energy_level(&self, n: usize) -> f64 {
        let n = n as f64;
        self.hbar.powi(2) * PI.powi(2) * n * n / (2.0 * self.mass * self.length.powi(2))
    }

    /// Sampled eigenfunction `sqrt(2/L)·sin(nπx/L)`, `n ≥ 1`
    pub fn eigenstate(&self, n: usize) -> Result<State> {
        if n == 0 {
            return Err(EvolutionError::config("square well levels start at n = 1"));
        }
        let (length, k) = (self.length, n as f64 * PI / self.length);
        let amplitude = (2.0 / length).sqrt();
        self.discretization.build_complex_state(&|x| Complex64::new(amplitude * (k * x).sin(), 0.0))
    }

    /// Sample an arbitrary complex wavefunction on the interior points
    pub fn wave_packet(&self, psi: &dyn Fn(f64) -> Complex64) -> Result<State> {
        self.discretization.build_complex_state(psi)
    }

    /// Full closed grid `[0, L]` and the wavefunction with the zero walls added back
    pub fn reconstruct_with_boundaries(&self, state: &State) -> Result<(Vec<f64>, Vec<Complex64>)> {
        self.discretization.domain_descriptor().ensure_compatible(state.domain(), "square well reconstruction")?;

        let last = (self.points - 1) as f64;
        let x = (0..self.points).map(|i| self.length * i as f64 / last).collect();

        let mut psi = Vec::with_capacity(self.points);
        psi.push(Complex64::new(0.0, 0.0));
        psi.extend(state.primary().to_complex().iter().copied());
        psi.push(Complex64::new(0.0, 0.0));

        Ok((x, psi))
    }
}
