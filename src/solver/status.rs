//! Run lifecycle
//!
//! ```text
//!                          ┌──► Completed
//!                          ├──► Converged
//! Initialized ──► Stepping ├──► EarlyStopped { condition, time }
//!                          ├──► Cancelled
//!                          └──► Diverged { error }
//! ```
//!
//! Terminal statuses never change again; every other move is rejected with
//! `InvalidTransition`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EvolutionError, Result};

/// State of one integrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Initialized,
    Stepping,

    /// Reached the end of the time span
    Completed,

    /// Step-to-step change fell below the steady-state tolerance
    Converged,

    /// A stop condition fired
    EarlyStopped { condition: String, time: f64 },

    /// The cancellation token was set
    Cancelled,

    /// A runtime failure ended the run
    Diverged { error: EvolutionError },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Initialized => "initialized",
            RunStatus::Stepping => "stepping",
            RunStatus::Completed => "completed",
            RunStatus::Converged => "converged",
            RunStatus::EarlyStopped { .. } => "early-stopped",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Diverged { .. } => "diverged",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Initialized | RunStatus::Stepping)
    }

    /// Finished without failure (completed, converged or stopped by a condition)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Converged | RunStatus::EarlyStopped { .. })
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&self, next: RunStatus) -> Result<RunStatus> {
        let allowed = match self {
            RunStatus::Initialized => matches!(next, RunStatus::Stepping),
            RunStatus::Stepping => next.is_terminal(),
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(EvolutionError::InvalidTransition { from: self.to_string(), to: next.to_string() })
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::EarlyStopped { condition, time } => write!(f, "early-stopped by '{condition}' at t = {time}"),
            RunStatus::Diverged { error } => write!(f, "diverged: {error}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_path() {
        let status = RunStatus::Initialized.transition(RunStatus::Stepping).unwrap();
        let status = status.transition(RunStatus::Completed).unwrap();
        assert!(status.is_terminal());
        assert!(status.is_success());
    }

    #[test]
    fn test_cannot_skip_stepping() {
        assert!(matches!(
            RunStatus::Initialized.transition(RunStatus::Completed),
            Err(EvolutionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        let terminals = [
            RunStatus::Completed,
            RunStatus::Converged,
            RunStatus::Cancelled,
            RunStatus::EarlyStopped { condition: "x".into(), time: 1.0 },
            RunStatus::Diverged { error: EvolutionError::config("boom") },
        ];
        for status in terminals {
            assert!(status.transition(RunStatus::Stepping).is_err());
            assert!(status.transition(RunStatus::Completed).is_err());
        }
    }

    #[test]
    fn test_stepping_cannot_restart() {
        assert!(RunStatus::Stepping.transition(RunStatus::Initialized).is_err());
        assert!(RunStatus::Stepping.transition(RunStatus::Stepping).is_err());
    }

    #[test]
    fn test_display() {
        let status = RunStatus::EarlyStopped { condition: "threshold".into(), time: 2.5 };
        assert_eq!(status.to_string(), "early-stopped by 'threshold' at t = 2.5");
        assert!(!RunStatus::Cancelled.is_success());
    }
}
