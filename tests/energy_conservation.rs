//! Long-run energy behaviour of symplectic and non-symplectic schemes

use physkit::diagnostics::{ObservableRegistry, oscillator_energy};
use physkit::models::HarmonicOscillator;
use physkit::solver::{Integrator, RunStatus, Scheme, StepperConfig, TimeSpan, Trajectory, energy_error_bound};

mod common;
use common::relative_error;

const DT: f64 = 0.01;
const STEPS: usize = 10_000;

fn oscillate(scheme: Scheme, oscillator: &HarmonicOscillator) -> Trajectory {
    let registry = ObservableRegistry::new()
        .with("energy", oscillator_energy(oscillator.mass(), oscillator.stiffness()))
        .unwrap();

    Integrator::new(StepperConfig::explicit(scheme, DT))
        .unwrap()
        .record_every(100)
        .with_observables(registry)
        .run(
            &oscillator.initial_state(1.0, 0.0).unwrap(),
            &oscillator.operator().unwrap(),
            TimeSpan::new(0.0, DT * STEPS as f64),
        )
        .unwrap()
}

fn max_energy_drift(trajectory: &Trajectory) -> f64 {
    let energy = trajectory.observable_series("energy").unwrap();
    let e0 = energy[0];
    energy.iter().map(|&e| relative_error(e, e0)).fold(0.0, f64::max)
}

#[test]
fn test_leapfrog_energy_stays_bounded() {
    let oscillator = HarmonicOscillator::new(1.0, 1.0).unwrap();
    let trajectory = oscillate(Scheme::Leapfrog, &oscillator);

    assert_eq!(trajectory.status(), &RunStatus::Completed);
    assert_eq!(trajectory.statistics().accepted_steps, STEPS);
    assert_eq!(trajectory.len(), STEPS / 100 + 1);

    let drift = max_energy_drift(&trajectory);
    let bound = energy_error_bound(DT, oscillator.omega());
    println!("leapfrog drift {drift:e}, bound {bound:e}");
    assert!(drift <= 2.0 * bound, "drift {drift} exceeds bound {bound}");
}

#[test]
fn test_stormer_verlet_energy_stays_bounded() {
    let oscillator = HarmonicOscillator::new(2.0, 8.0).unwrap();
    let trajectory = oscillate(Scheme::StormerVerlet, &oscillator);

    let drift = max_energy_drift(&trajectory);
    assert!(drift <= 2.0 * energy_error_bound(DT, oscillator.omega()), "drift {drift}");
}

#[test]
fn test_explicit_euler_energy_grows() {
    // |1 + iωdt|² = 1 + (ωdt)² per step: energy grows by about e over 10 000 steps
    let oscillator = HarmonicOscillator::new(1.0, 1.0).unwrap();
    let euler = max_energy_drift(&oscillate(Scheme::ExplicitEuler, &oscillator));
    let leapfrog = max_energy_drift(&oscillate(Scheme::Leapfrog, &oscillator));

    println!("euler drift {euler}, leapfrog drift {leapfrog}");
    assert!(euler > 1.0);
    assert!(leapfrog < 1e-3 * euler);
}

#[test]
fn test_leapfrog_keeps_the_phase() {
    let oscillator = HarmonicOscillator::new(1.0, 1.0).unwrap();
    let trajectory = oscillate(Scheme::Leapfrog, &oscillator);

    let last = trajectory.last().unwrap();
    let (q, p) = oscillator.exact(1.0, 0.0, last.time);
    let state = &last.state;
    let q_num = state.field(&physkit::physics::Field::Position).unwrap().real_parts()[0];
    let p_num = state.field(&physkit::physics::Field::Momentum).unwrap().real_parts()[0];

    // second-order phase error ω³dt²t/24 ≈ 4e-4 after t = 100
    assert!((q_num - q).abs() < 1e-2, "q {q_num} vs {q}");
    assert!((p_num - p).abs() < 1e-2, "p {p_num} vs {p}");
}
