//! Export of recorded trajectories.
//!
//! # Architecture
//!
//! This module defines the [`Exporter`] trait that abstracts the export format.
//! Each format is an independent implementation in its own sub-module; adding
//! a format means adding a file.
//!
//! # Available formats
//!
//! | Format  | Module          |
//! |---------|-----------------|
//! | CSV     | [`csv`]         |
//! | JSON    | [`Trajectory::save_json`](crate::solver::Trajectory::save_json) (full record) |
//!
//! # Usage example
//!
//! ```rust,ignore
//! use physkit::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//!
//! // time + every scalar observable
//! exporter.export_observables(&trajectory, None, "energy.csv")?;
//!
//! // downsampled to 500 rows, first and last entry kept
//! exporter.export_observables(&trajectory, Some(500), "energy_light.csv")?;
//!
//! // time + one column per grid point of a field
//! exporter.export_field(&trajectory, &Field::Value, None, "profile.csv")?;
//! ```

pub mod csv;

pub use csv::{CsvConfig, CsvError, CsvExporter, CsvMetadata};

use std::path::Path;

use crate::physics::Field;
use crate::solver::Trajectory;

/// Abstraction trait for all export formats.
///
/// # Associated type `Error`
///
/// Each format manages its own errors via the associated type, so callers can
/// react to the precise failure without boxing.
///
/// # Parameter `n_points`
///
/// - `None`: exports every recorded entry
/// - `Some(n)`: uniformly downsamples to `n` rows, always keeping the
///   **first and last** entries
pub trait Exporter {
    /// Error type specific to this export format.
    type Error: std::error::Error;

    /// Time column followed by one column per scalar observable
    ///
    /// # Errors
    ///
    /// - the trajectory has no entries
    /// - the path cannot be written
    fn export_observables(
        &self,
        trajectory: &Trajectory,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), Self::Error>;

    /// Time column followed by one column per grid point of `field`
    ///
    /// Complex fields are written as magnitudes.
    ///
    /// # Errors
    ///
    /// - the trajectory has no entries or lacks `field`
    /// - the path cannot be written
    fn export_field(
        &self,
        trajectory: &Trajectory,
        field: &Field,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), Self::Error>;
}

/// Indices of `n` entries spread uniformly over `len`, first and last included
///
/// `n < 2` or `n >= len` keeps every index.
pub fn downsample_indices(len: usize, n_points: Option<usize>) -> Vec<usize> {
    match n_points {
        Some(n) if n >= 2 && n < len => {
            let mut indices: Vec<usize> =
                (0..n).map(|k| ((k as f64) * (len - 1) as f64 / (n - 1) as f64).round() as usize).collect();
            indices.dedup();
            indices
        }
        _ => (0..len).collect(),
    }
}
