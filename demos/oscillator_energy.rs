//! Harmonic Oscillator: Energy Drift by Scheme
//!
//! dq/dt = p/m,   dp/dt = -k·q
//!
//! Runs the same oscillator for 100 periods with every fixed-step scheme and
//! reports the worst relative energy error. Symplectic schemes stay within
//! `energy_error_bound(dt, ω)`; explicit Euler gains energy every step.

use physkit::{
    diagnostics::{ObservableRegistry, oscillator_energy},
    models::HarmonicOscillator,
    solver::{Integrator, Scheme, StepperConfig, TimeSpan, energy_error_bound},
};
use std::error::Error;
use std::time::Instant;

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Harmonic Oscillator: Energy Conservation ===\n");

    let (mass, stiffness) = (1.0, 4.0);
    let oscillator = HarmonicOscillator::new(mass, stiffness)?;
    let periods = 100.0;
    let dt = 0.01;
    let span = TimeSpan::new(0.0, periods * oscillator.period());

    println!("  ω = {:.4}, T = {:.4}, dt = {dt}", oscillator.omega(), oscillator.period());
    println!("  Leapfrog bound: {:.3e}\n", energy_error_bound(dt, oscillator.omega()));
    println!("{:<28} {:>12} {:>10} {:>12}", "scheme", "max |ΔE|/E", "steps", "time (ms)");

    let schemes = [
        Scheme::ExplicitEuler,
        Scheme::Rk2,
        Scheme::Rk4,
        Scheme::ImplicitEuler,
        Scheme::CrankNicolson,
        Scheme::Leapfrog,
        Scheme::StormerVerlet,
    ];

    for scheme in schemes {
        let registry = ObservableRegistry::new().with("energy", oscillator_energy(mass, stiffness))?;
        let integrator = Integrator::new(StepperConfig::explicit(scheme, dt))?
            .record_every(10)
            .with_observables(registry);

        let start = Instant::now();
        let trajectory =
            integrator.run(&oscillator.initial_state(1.0, 0.0)?, &oscillator.operator()?, span)?;
        let elapsed = start.elapsed().as_secs_f64() * 1e3;

        let energy = trajectory.observable_series("energy").unwrap_or_default();
        let e0 = energy.first().copied().unwrap_or(1.0);
        let drift = energy.iter().map(|e| ((e - e0) / e0).abs()).fold(0.0, f64::max);

        println!(
            "{:<28} {:>12.3e} {:>10} {:>12.2}",
            scheme.name(),
            drift,
            trajectory.statistics().accepted_steps,
            elapsed
        );
    }

    Ok(())
}
