//! CSV export of recorded trajectories
//!
//! Compatible with spreadsheets, pandas and most plotting tools.
//!
//! # Features
//!
//! - **Observables**: time plus one column per scalar observable
//! - **Fields**: time plus one column per grid point (coordinates in the header)
//! - **Metadata header**: optional `#` comment lines, timestamped
//! - **Customizable**: delimiter, decimal separator, precision
//! - **Downsampling**: `n` rows with first and last entries kept
//!
//! # Example
//!
//! ```rust
//! use physkit::diagnostics::max_abs;
//! use physkit::models::ExponentialDecay;
//! use physkit::output::export::{CsvConfig, CsvExporter, Exporter};
//! use physkit::solver::{Integrator, Scheme, StepperConfig, TimeSpan};
//!
//! let model = ExponentialDecay::new(1.0, 1.0).unwrap();
//! let trajectory = Integrator::new(StepperConfig::explicit(Scheme::Rk4, 0.1))
//!     .unwrap()
//!     .observe("x", max_abs)
//!     .unwrap()
//!     .run(&model.initial_state().unwrap(), &model.operator().unwrap(), TimeSpan::new(0.0, 1.0))
//!     .unwrap();
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("decay.csv");
//! CsvExporter::new(CsvConfig::default().precision(3))
//!     .export_observables(&trajectory, Some(3), &path)
//!     .unwrap();
//!
//! let text = std::fs::read_to_string(&path).unwrap();
//! assert_eq!(text.lines().next(), Some("time,x"));
//! assert_eq!(text.lines().count(), 4);
//! ```
//!
//! **Output** with metadata enabled:
//! ```text
//! # physkit trajectory
//! # Generated: 2026-02-11T15:30:00+00:00
//! # Scheme: Runge-Kutta 4
//! # Status: completed
//! # Entries: 11
//! #
//! time,x
//! 0.000,1.000
//! ...
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::output::export::{Exporter, downsample_indices};
use crate::physics::Field;
use crate::solver::Trajectory;

// =============================================================================
// Errors
// =============================================================================

/// Failures of the CSV exporter
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("trajectory has no entries")]
    EmptyTrajectory,

    #[error("observable '{0}' is not recorded in every entry")]
    UnknownObservable(String),

    #[error("observable '{0}' is not a scalar")]
    NonScalarObservable(String),

    #[error("field '{0}' is not part of the recorded states")]
    MissingField(String),

    #[error("non-finite value in column '{column}' at row {row}")]
    NonFinite { column: String, row: usize },

    #[error("invalid CSV configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Configuration Structures
// =============================================================================

/// Configuration for CSV export
///
/// # Example
///
/// ```rust
/// use physkit::output::export::CsvConfig;
///
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// assert!(CsvConfig::european().validate().is_ok());
/// assert!(CsvConfig::default().delimiter(',').decimal_separator(',').validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Number of decimal places (default: 6)
    pub precision: usize,

    /// Metadata written as `#` comment lines before the header
    pub metadata: Option<CsvMetadata>,

    /// Header of the time column (default: "time")
    pub time_header: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            metadata: None,
            time_header: "time".to_string(),
        }
    }
}

impl CsvConfig {
    /// Semicolon delimiter, comma decimal separator
    pub fn european() -> Self {
        Self { delimiter: ';', decimal_separator: ',', ..Default::default() }
    }

    /// 12 decimal places
    pub fn high_precision() -> Self {
        Self { precision: 12, ..Default::default() }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn time_header(mut self, header: impl Into<String>) -> Self {
        self.time_header = header.into();
        self
    }

    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<(), CsvError> {
        if self.delimiter == self.decimal_separator {
            return Err(CsvError::InvalidConfig(format!(
                "delimiter and decimal separator are both '{}'",
                self.delimiter
            )));
        }
        if self.delimiter == '\n' || self.delimiter == '"' {
            return Err(CsvError::InvalidConfig(format!("'{}' cannot be used as a delimiter", self.delimiter.escape_default())));
        }
        Ok(())
    }
}

/// Comment lines written before the CSV header
///
/// Scheme, status and entry count are taken from the trajectory; only
/// the title and custom entries are set here.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvMetadata {
    pub title: String,
    pub custom: Vec<(String, String)>,
}

impl Default for CsvMetadata {
    fn default() -> Self {
        Self { title: "physkit trajectory".to_string(), custom: Vec::new() }
    }
}

impl CsvMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), custom: Vec::new() }
    }

    /// Add a `# key: value` line
    pub fn add_custom(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.custom.push((key.into(), value.to_string()));
        self
    }
}

// =============================================================================
// Exporter
// =============================================================================

/// CSV implementation of [`Exporter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvExporter {
    config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    /// Time column followed by the named scalar observables, in the given order
    pub fn export_selected(
        &self,
        trajectory: &Trajectory,
        names: &[&str],
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), CsvError> {
        let rows = self.rows(trajectory, n_points)?;

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let mut column = Vec::with_capacity(rows.len());
            for &i in &rows {
                let value = trajectory.entries()[i]
                    .observable(name)
                    .ok_or_else(|| CsvError::UnknownObservable(name.to_string()))?;
                column.push(value.as_scalar().ok_or_else(|| CsvError::NonScalarObservable(name.to_string()))?);
            }
            columns.push(column);
        }

        let headers: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.write_table(trajectory, &rows, &headers, &columns, path.as_ref())
    }

    fn rows(&self, trajectory: &Trajectory, n_points: Option<usize>) -> Result<Vec<usize>, CsvError> {
        self.config.validate()?;
        if trajectory.is_empty() {
            return Err(CsvError::EmptyTrajectory);
        }
        if let Some(n) = n_points
            && n < 2
        {
            return Err(CsvError::InvalidConfig(format!(
                "downsampling needs at least 2 points to keep the first and last entries, got {n}"
            )));
        }
        Ok(downsample_indices(trajectory.len(), n_points))
    }

    /// Write `time` plus `columns` (column-major) for the selected rows
    fn write_table(
        &self,
        trajectory: &Trajectory,
        rows: &[usize],
        headers: &[String],
        columns: &[Vec<f64>],
        path: &Path,
    ) -> Result<(), CsvError> {
        for (header, column) in headers.iter().zip(columns) {
            if let Some(row) = column.iter().position(|v| !v.is_finite()) {
                return Err(CsvError::NonFinite { column: header.clone(), row });
            }
        }

        let config = &self.config;
        let mut file = BufWriter::new(File::create(path)?);

        if let Some(metadata) = &config.metadata {
            write_metadata_header(&mut file, metadata, trajectory)?;
        }

        write!(file, "{}", config.time_header)?;
        for header in headers {
            write!(file, "{}{}", config.delimiter, header)?;
        }
        writeln!(file)?;

        for (r, &i) in rows.iter().enumerate() {
            write!(file, "{}", format_number(trajectory.entries()[i].time, config))?;
            for column in columns {
                write!(file, "{}{}", config.delimiter, format_number(column[r], config))?;
            }
            writeln!(file)?;
        }

        file.flush()?;
        log::debug!("wrote {} rows x {} columns to {}", rows.len(), headers.len() + 1, path.display());
        Ok(())
    }
}

impl Exporter for CsvExporter {
    type Error = CsvError;

    fn export_observables(
        &self,
        trajectory: &Trajectory,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), CsvError> {
        let first = trajectory.entries().first().ok_or(CsvError::EmptyTrajectory)?;
        let names: Vec<&str> = first
            .observables
            .iter()
            .filter(|(_, value)| value.as_scalar().is_some())
            .map(|(name, _)| name.as_str())
            .collect();

        self.export_selected(trajectory, &names, n_points, path)
    }

    fn export_field(
        &self,
        trajectory: &Trajectory,
        field: &Field,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), CsvError> {
        let rows = self.rows(trajectory, n_points)?;

        let samples: Vec<Vec<f64>> = rows
            .iter()
            .map(|&i| {
                let data = trajectory.entries()[i]
                    .state
                    .field(field)
                    .ok_or_else(|| CsvError::MissingField(field.name().to_string()))?;
                Ok(if data.is_real() {
                    data.real_parts()
                } else {
                    data.norm_sqr().into_iter().map(f64::sqrt).collect()
                })
            })
            .collect::<Result<_, CsvError>>()?;

        // transpose rows -> one column per grid point
        let coordinates = trajectory.entries()[rows[0]].state.domain().coordinates();
        let headers: Vec<String> =
            coordinates.iter().map(|x| format!("{}@{}", field.name(), format_number(*x, &self.config))).collect();
        let columns: Vec<Vec<f64>> =
            (0..coordinates.len()).map(|j| samples.iter().map(|row| row[j]).collect()).collect();

        self.write_table(trajectory, &rows, &headers, &columns, path.as_ref())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Write metadata header comments
fn write_metadata_header(file: &mut impl Write, metadata: &CsvMetadata, trajectory: &Trajectory) -> Result<(), CsvError> {
    writeln!(file, "# {}", metadata.title)?;
    writeln!(file, "# Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(file, "# Scheme: {}", trajectory.scheme())?;
    writeln!(file, "# Status: {}", trajectory.status())?;
    writeln!(file, "# Entries: {}", trajectory.len())?;

    for (key, value) in &metadata.custom {
        writeln!(file, "# {key}: {value}")?;
    }
    writeln!(file, "#")?;
    Ok(())
}

/// Format number with configured precision and decimal separator
fn format_number(value: f64, config: &CsvConfig) -> String {
    let formatted = format!("{:.prec$}", value, prec = config.precision);

    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

// =================================================================================================
// Tests
// =================================================================================================
