//! Output of simulation results
//!
//! # Architecture
//!
//! ```text
//! output/
//! ├── mod.rs              ← This file
//! └── export/             ← Data export
//!     ├── mod.rs          ← Exporter trait, downsampling
//!     └── csv.rs
//! ```
//!
//! Full trajectories (states, observables, status, statistics) round-trip
//! through JSON with [`Trajectory::save_json`](crate::solver::Trajectory::save_json)
//! and [`TrajectoryRecord::load_json`](crate::solver::TrajectoryRecord::load_json).
//! The exporters here write flat tables for spreadsheets and plotting tools.
//!
//! # CSV Export
//!
//! ```rust,ignore
//! use physkit::output::export::{CsvConfig, CsvExporter, Exporter};
//!
//! CsvExporter::new(CsvConfig::european()).export_observables(&trajectory, None, "energy.csv")?;
//! ```

pub mod export;

pub use export::{CsvConfig, CsvError, CsvExporter, CsvMetadata, Exporter};
