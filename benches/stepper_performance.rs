//! Performance benchmarks for the time-stepping schemes
//!
//! # What We're Measuring
//!
//! 1. **Explicit schemes** on a periodic diffusion problem:
//!    - Euler does 1 operator evaluation per step, RK4 does 4
//!    - Expected ratio RK4 / Euler ≈ 4×
//!
//! 2. **Implicit schemes** on the same problem:
//!    - one dense LU solve per step, cost ∝ points³
//!
//! 3. **Backends**: applying a finite-difference stencil vs a Fourier
//!    multiplier vs the assembled dense matrix
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench --bench stepper_performance
//! cargo bench --bench stepper_performance explicit
//! cargo bench --bench stepper_performance --features parallel ensemble
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::f64::consts::PI;
use std::hint::black_box;
use std::time::Duration;

use physkit::diagnostics::ObservableRegistry;
use physkit::discretization::{Discretization, FiniteDifference, OperatorKind, Spectral, StencilOrder};
use physkit::operator::{MatrixOperator, Operator, OperatorRef};
use physkit::physics::{BoundaryKind, State};
use physkit::solver::{Integrator, Scheme, StepperConfig, TimeSpan, run_ensemble};

// =================================================================================================
// Problem setup
// =================================================================================================

/// Periodic diffusion `du/dt = 0.01·u_xx` on `points` nodes
fn diffusion_problem(points: usize) -> (OperatorRef, State) {
    let fd = FiniteDifference::new(0.0, 1.0, points, BoundaryKind::Periodic, StencilOrder::Second)
        .expect("valid grid");
    let op = fd.build_operator(&OperatorKind::Diffusion { coefficient: 0.01 }).expect("diffusion operator");
    let state = fd.build_state(&|x| (2.0 * PI * x).sin()).expect("finite initial condition");
    (op, state)
}

/// Step small enough for explicit stability, `D·dt/dx² = 0.25`
fn stable_dt(points: usize) -> f64 {
    let dx = 1.0 / points as f64;
    0.25 * dx * dx / 0.01
}

// =================================================================================================
// Benchmarks
// =================================================================================================

fn bench_explicit(c: &mut Criterion) {
    let mut group = c.benchmark_group("explicit");
    group.measurement_time(Duration::from_secs(10));

    for points in [64, 256, 1024] {
        let (op, state) = diffusion_problem(points);
        let dt = stable_dt(points);
        let span = TimeSpan::new(0.0, 200.0 * dt);
        group.throughput(Throughput::Elements((points * 200) as u64));

        for scheme in [Scheme::ExplicitEuler, Scheme::Rk4] {
            let integrator = Integrator::new(StepperConfig::explicit(scheme, dt)).expect("valid config").record_every(200);
            group.bench_with_input(BenchmarkId::new(format!("{scheme:?}"), points), &points, |b, _| {
                b.iter(|| black_box(integrator.run(black_box(&state), op.as_ref(), span).expect("run")))
            });
        }
    }
    group.finish();
}

fn bench_implicit(c: &mut Criterion) {
    let mut group = c.benchmark_group("implicit");
    group.sample_size(20);

    for points in [32, 64, 128] {
        let (op, state) = diffusion_problem(points);
        let span = TimeSpan::new(0.0, 1.0);

        for scheme in [Scheme::ImplicitEuler, Scheme::CrankNicolson] {
            let integrator =
                Integrator::new(StepperConfig::implicit(scheme, 0.05, 1e-10, 50)).expect("valid config").record_every(20);
            group.bench_with_input(BenchmarkId::new(format!("{scheme:?}"), points), &points, |b, _| {
                b.iter(|| black_box(integrator.run(black_box(&state), op.as_ref(), span).expect("run")))
            });
        }
    }
    group.finish();
}

fn bench_operator_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_apply");
    let points = 256;

    let fd = FiniteDifference::new(0.0, 2.0 * PI, points, BoundaryKind::Periodic, StencilOrder::Second).expect("grid");
    let spectral = Spectral::fourier(0.0, 2.0 * PI, points, BoundaryKind::Periodic).expect("grid");
    let stencil = fd.build_operator(&OperatorKind::Laplacian).expect("stencil");
    let fourier = spectral.build_operator(&OperatorKind::Laplacian).expect("fourier");
    let dense = MatrixOperator::new("dense laplacian", fd.domain_descriptor().clone(), stencil.try_matrix().expect("matrix"))
        .expect("dense operator");

    let fd_state = fd.build_state(&|x| x.sin()).expect("state");
    let spectral_state = spectral.build_state(&|x| x.sin()).expect("state");

    group.bench_function("stencil", |b| b.iter(|| black_box(stencil.apply(black_box(&fd_state), 0.0))));
    group.bench_function("fourier", |b| b.iter(|| black_box(fourier.apply(black_box(&spectral_state), 0.0))));
    group.bench_function("dense", |b| b.iter(|| black_box(dense.apply(black_box(&fd_state), 0.0))));
    group.finish();
}

fn bench_ensemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble");
    group.sample_size(10);

    let points = 128;
    let (op, _) = diffusion_problem(points);
    let fd = FiniteDifference::new(0.0, 1.0, points, BoundaryKind::Periodic, StencilOrder::Second).expect("grid");
    let initials: Vec<State> = (1..=16)
        .map(|k| fd.build_state(&move |x| (2.0 * PI * k as f64 * x).sin()).expect("state"))
        .collect();
    let config = StepperConfig::explicit(Scheme::Rk4, stable_dt(points));
    let span = TimeSpan::new(0.0, 100.0 * stable_dt(points));
    let registry = ObservableRegistry::new();

    group.bench_function("rk4_x16", |b| {
        b.iter(|| black_box(run_ensemble(&initials, op.as_ref(), &config, span, &registry).expect("ensemble")))
    });
    group.finish();
}

criterion_group!(benches, bench_explicit, bench_implicit, bench_operator_apply, bench_ensemble);
criterion_main!(benches);
