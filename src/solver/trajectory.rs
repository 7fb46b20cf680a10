//! Recorded runs
//!
//! A [`Trajectory`] is append-only while the integrator runs and read-only
//! afterwards. [`Trajectory::to_record`] converts it to the persisted layout
//! ([`TrajectoryRecord`]), which is plain serde data: raw field values,
//! domain descriptor and observables per entry, plus status, scheme and run
//! statistics.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::diagnostics::ObservableValue;
use crate::error::{EvolutionError, Result};
use crate::physics::{DomainDescriptor, Field, FieldData, State};
use crate::solver::{RunStatus, Scheme};

// =================================================================================================
// Entries and statistics
// =================================================================================================

/// One recorded point of a run
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryEntry {
    pub time: f64,

    /// Number of accepted steps before this entry
    pub step: usize,

    pub state: State,

    /// Observable snapshot, in registry order
    pub observables: Vec<(String, ObservableValue)>,
}

impl TrajectoryEntry {
    pub fn observable(&self, name: &str) -> Option<&ObservableValue> {
        self.observables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub function_evaluations: usize,
    pub implicit_iterations: usize,
    pub min_dt: Option<f64>,
    pub max_dt: Option<f64>,
}

impl RunStatistics {
    pub(crate) fn record_step(&mut self, dt: f64, evaluations: usize, iterations: usize) {
        self.accepted_steps += 1;
        self.function_evaluations += evaluations;
        self.implicit_iterations += iterations;
        self.min_dt = Some(self.min_dt.map_or(dt, |m| m.min(dt)));
        self.max_dt = Some(self.max_dt.map_or(dt, |m| m.max(dt)));
    }

    pub(crate) fn record_rejection(&mut self, evaluations: usize, iterations: usize) {
        self.rejected_steps += 1;
        self.function_evaluations += evaluations;
        self.implicit_iterations += iterations;
    }
}

// =================================================================================================
// Trajectory
// =================================================================================================

/// Recorded time series of one run
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    scheme: Scheme,
    entries: Vec<TrajectoryEntry>,
    status: RunStatus,
    statistics: RunStatistics,
}

impl Trajectory {
    pub(crate) fn new(scheme: Scheme) -> Self {
        Self { scheme, entries: Vec::new(), status: RunStatus::Initialized, statistics: RunStatistics::default() }
    }

    pub(crate) fn push(&mut self, entry: TrajectoryEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn transition(&mut self, next: RunStatus) -> Result<()> {
        self.status = self.status.transition(next)?;
        Ok(())
    }

    pub(crate) fn statistics_mut(&mut self) -> &mut RunStatistics {
        &mut self.statistics
    }

    // ======================================= accessors ==========================================

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.time).collect()
    }

    pub fn states(&self) -> Vec<&State> {
        self.entries.iter().map(|e| &e.state).collect()
    }

    pub fn last(&self) -> Option<&TrajectoryEntry> {
        self.entries.last()
    }

    pub fn final_state(&self) -> Option<&State> {
        self.last().map(|e| &e.state)
    }

    /// Scalar observable as a time series, `None` if absent or not scalar
    pub fn observable_series(&self, name: &str) -> Option<Vec<f64>> {
        self.entries.iter().map(|e| e.observable(name)?.as_scalar()).collect()
    }

    /// Names of the observables recorded with each entry
    pub fn observable_names(&self) -> Vec<String> {
        self.entries
            .first()
            .map(|e| e.observables.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    // ======================================= persistence ========================================

    pub fn to_record(&self) -> TrajectoryRecord {
        TrajectoryRecord {
            scheme: self.scheme,
            status: self.status.clone(),
            statistics: self.statistics.clone(),
            entries: self.entries.iter().map(EntryRecord::from_entry).collect(),
        }
    }

    /// Write the persisted layout as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_record())?;
        fs::write(path, json)?;
        Ok(())
    }
}

// =================================================================================================
// Persisted layout
// =================================================================================================

/// Raw values of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    pub real: Vec<f64>,

    /// Present for complex states only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imag: Option<Vec<f64>>,
}

/// One persisted entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub time: f64,
    pub step: usize,
    pub domain: DomainDescriptor,
    pub fields: Vec<FieldRecord>,
    pub observables: Vec<(String, ObservableValue)>,
}

impl EntryRecord {
    fn from_entry(entry: &TrajectoryEntry) -> Self {
        let fields = entry
            .state
            .fields()
            .iter()
            .map(|(field, data)| FieldRecord {
                name: field.name().to_string(),
                real: data.real_parts(),
                imag: data.imag_parts(),
            })
            .collect();

        Self {
            time: entry.time,
            step: entry.step,
            domain: entry.state.domain().clone(),
            fields,
            observables: entry.observables.clone(),
        }
    }

    /// Rebuild the recorded state
    pub fn to_state(&self) -> Result<State> {
        let fields = self
            .fields
            .iter()
            .map(|record| {
                let data = match &record.imag {
                    None => FieldData::from_vec(record.real.clone()),
                    Some(imag) => {
                        if imag.len() != record.real.len() {
                            return Err(EvolutionError::Serialization(format!(
                                "field '{}' has {} real and {} imaginary parts",
                                record.name,
                                record.real.len(),
                                imag.len()
                            )));
                        }
                        FieldData::from_complex_vec(
                            record.real.iter().zip(imag).map(|(&re, &im)| num_complex::Complex64::new(re, im)).collect(),
                        )
                    }
                };
                Ok((Field::from_name(&record.name), data))
            })
            .collect::<Result<Vec<_>>>()?;

        State::from_fields(self.domain.clone(), fields)
    }
}

/// Serializable form of a [`Trajectory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub scheme: Scheme,
    pub status: RunStatus,
    pub statistics: RunStatistics,
    pub entries: Vec<EntryRecord>,
}

impl TrajectoryRecord {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild the full in-memory trajectory
    pub fn to_trajectory(&self) -> Result<Trajectory> {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                Ok(TrajectoryEntry { time: e.time, step: e.step, state: e.to_state()?, observables: e.observables.clone() })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Trajectory {
            scheme: self.scheme,
            entries,
            status: self.status.clone(),
            statistics: self.statistics.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn sample() -> Trajectory {
        let mut trajectory = Trajectory::new(Scheme::Rk4);
        for (k, value) in [1.0, 0.5, 0.25].into_iter().enumerate() {
            trajectory.push(TrajectoryEntry {
                time: k as f64,
                step: k,
                state: State::lumped(vec![value]).unwrap(),
                observables: vec![("value".into(), ObservableValue::Scalar(value))],
            });
        }
        trajectory.statistics_mut().record_step(1.0, 4, 0);
        trajectory.transition(RunStatus::Stepping).unwrap();
        trajectory.transition(RunStatus::Completed).unwrap();
        trajectory
    }

    #[test]
    fn test_accessors() {
        let trajectory = sample();
        assert_eq!(trajectory.times(), vec![0.0, 1.0, 2.0]);
        assert_eq!(trajectory.observable_series("value").unwrap(), vec![1.0, 0.5, 0.25]);
        assert!(trajectory.observable_series("missing").is_none());
        assert_eq!(trajectory.final_state().unwrap().primary().real_parts(), vec![0.25]);
        assert_eq!(trajectory.observable_names(), vec!["value".to_string()]);
    }

    #[test]
    fn test_record_round_trip() {
        let trajectory = sample();
        let json = trajectory.to_record().to_json().unwrap();
        let restored = TrajectoryRecord::from_json(&json).unwrap().to_trajectory().unwrap();
        assert_eq!(restored, trajectory);
    }

    #[test]
    fn test_complex_fields_keep_imaginary_parts() {
        let domain = DomainDescriptor::lumped(2);
        let psi = State::new(
            domain,
            Field::WaveFunction,
            FieldData::from_complex_vec(vec![Complex64::new(1.0, -1.0), Complex64::new(0.0, 2.0)]),
        )
        .unwrap();
        let entry = TrajectoryEntry { time: 0.0, step: 0, state: psi.clone(), observables: vec![] };

        let record = EntryRecord::from_entry(&entry);
        assert_eq!(record.fields[0].name, "wave_function");
        assert_eq!(record.fields[0].imag, Some(vec![-1.0, 2.0]));
        assert_eq!(record.to_state().unwrap(), psi);
    }

    #[test]
    fn test_diverged_status_is_persisted() {
        let mut trajectory = Trajectory::new(Scheme::ExplicitEuler);
        trajectory.transition(RunStatus::Stepping).unwrap();
        let error = EvolutionError::Diverged { field: "value".into(), time: 0.1, step: 1 };
        trajectory.transition(RunStatus::Diverged { error: error.clone() }).unwrap();

        let record = TrajectoryRecord::from_json(&trajectory.to_record().to_json().unwrap()).unwrap();
        assert_eq!(record.status, RunStatus::Diverged { error });
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        sample().save_json(&path).unwrap();

        let record = TrajectoryRecord::load_json(&path).unwrap();
        assert_eq!(record.entries.len(), 3);
        assert_eq!(record.status, RunStatus::Completed);
    }

    #[test]
    fn test_mismatched_imaginary_parts_are_rejected() {
        let record = EntryRecord {
            time: 0.0,
            step: 0,
            domain: DomainDescriptor::lumped(2),
            fields: vec![FieldRecord { name: "value".into(), real: vec![1.0, 2.0], imag: Some(vec![0.0]) }],
            observables: vec![],
        };
        assert!(matches!(record.to_state(), Err(EvolutionError::Serialization(_))));
    }
}
