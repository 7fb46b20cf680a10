//! Wave Packet in an Infinite Square Well
//!
//! iħ·∂ψ/∂t = -(ħ²/2m)·∂²ψ/∂x²,   ψ(0) = ψ(L) = 0
//!
//! A Gaussian packet with mean momentum ħk₀ travels towards the right wall
//! and reflects. Crank-Nicolson keeps the total probability at 1 to solver
//! precision; the run exports `|ψ|` snapshots and the probability series.

use physkit::{
    diagnostics::{ObservableRegistry, energy_expectation, normalized, probability},
    models::InfiniteSquareWell,
    output::export::{CsvConfig, CsvExporter, CsvMetadata, Exporter},
    physics::Field,
    solver::{Integrator, Scheme, StepperConfig, TimeSpan},
};
use num_complex::Complex64;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Infinite Square Well: Gaussian Wave Packet ===\n");

    // Physical parameters (ħ = m = 1)
    let length = 1.0;
    let points = 257;
    let (x0, sigma, k0) = (0.3, 0.05, 40.0);

    // Simulation parameters
    let final_time = 0.03;
    let dt = 1e-4;

    println!("Physical Parameters:");
    println!("  Well width L: {length}");
    println!("  Grid nodes (walls included): {points}");
    println!("  Packet: x₀ = {x0}, σ = {sigma}, k₀ = {k0}");
    println!("\nSimulation:");
    println!("  Final time: {final_time}");
    println!("  dt: {dt}\n");

    let well = InfiniteSquareWell::new(length, points)?;
    let psi0 = normalized(&well.wave_packet(&|x| {
        let envelope = (-(x - x0).powi(2) / (4.0 * sigma * sigma)).exp();
        Complex64::from_polar(envelope, k0 * x)
    })?)?;

    let observables = ObservableRegistry::new()
        .with_scalar("probability", probability)?
        .with("energy", energy_expectation(well.hamiltonian()?))?;

    let integrator = Integrator::new(StepperConfig::implicit(Scheme::CrankNicolson, dt, 1e-12, 50))?
        .record_every(10)
        .with_observables(observables);

    let trajectory = integrator.run(&psi0, well.schrodinger_generator()?.as_ref(), TimeSpan::new(0.0, final_time))?;

    println!("Run status: {}", trajectory.status());
    println!("Entries recorded: {}", trajectory.len());

    let probability = trajectory.observable_series("probability").unwrap_or_default();
    let energy = trajectory.observable_series("energy").unwrap_or_default();
    if let (Some(p0), Some(p1)) = (probability.first(), probability.last()) {
        println!("Probability: {p0:.12} → {p1:.12}");
    }
    if let (Some(e0), Some(e1)) = (energy.first(), energy.last()) {
        println!("Energy ⟨H⟩:  {e0:.6} → {e1:.6} (free-particle estimate k₀²/2 = {})", k0 * k0 / 2.0);
    }

    std::fs::create_dir_all("output")?;
    let metadata = CsvMetadata::new("square well wave packet").add_custom("k0", k0).add_custom("sigma", sigma);
    let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
    exporter.export_observables(&trajectory, None, "output/square_well_observables.csv")?;
    exporter.export_field(&trajectory, &Field::WaveFunction, Some(7), "output/square_well_psi.csv")?;
    trajectory.save_json("output/square_well.json")?;

    println!("\n✓ Wrote output/square_well_observables.csv, output/square_well_psi.csv, output/square_well.json");
    Ok(())
}
