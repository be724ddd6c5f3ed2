//! Result interpretation
//!
//! Turns a terminal run payload into a typed [`RunOutcome`]. Pure: no I/O,
//! no clock, no shared state.

use crate::types::{TerminalPayload, TerminalStatus};
use serde::{Deserialize, Serialize};

/// Classified terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The executor completed the run
    Success { stdout: String },
    /// The executor ran the code and reported failure; `stderr` is authoritative
    ExecutionFailure { stdout: String, stderr: String },
    /// The executor refused to run the code
    PolicyBlocked { violations: Vec<String> },
    /// The poll budget ran out; the remote outcome is unknown
    LocalTimeout { attempts: u32 },
}

impl RunOutcome {
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Captured stdout, if the outcome carries any
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Success { stdout } | Self::ExecutionFailure { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Captured stderr, if the outcome carries any
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailure { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Short label for logs and terminals
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ExecutionFailure { .. } => "execution_failure",
            Self::PolicyBlocked { .. } => "policy_blocked",
            Self::LocalTimeout { .. } => "local_timeout",
        }
    }
}

/// Classify a terminal payload
#[must_use]
pub fn interpret(payload: &TerminalPayload) -> RunOutcome {
    let stdout = payload.stdout.clone().unwrap_or_default();
    match payload.status {
        TerminalStatus::Completed => RunOutcome::Success { stdout },
        TerminalStatus::Failed => RunOutcome::ExecutionFailure {
            stdout,
            stderr: payload.stderr.clone().unwrap_or_default(),
        },
        TerminalStatus::Blocked => RunOutcome::PolicyBlocked {
            violations: payload.violations.clone(),
        },
        TerminalStatus::TimedOut => RunOutcome::LocalTimeout {
            attempts: payload.attempts,
        },
    }
}
