use crate::types::RunPhase;

/// Illegal phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal run transition {from} -> {to}")]
pub struct TransitionError {
    pub from: RunPhase,
    pub to: RunPhase,
}

/// Validates a phase transition of the run orchestrator.
///
/// Any phase may fall back to `Idle` (local cancellation). A fresh
/// `submit()` may start from `Idle` or from any terminal phase.
pub fn validate_transition(from: RunPhase, to: RunPhase) -> Result<(), TransitionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

pub fn allowed_transitions(from: RunPhase) -> Vec<RunPhase> {
    use RunPhase::*;
    match from {
        Idle => vec![Submitting],
        Submitting => vec![Polling, Failed, Blocked, Idle],
        Polling => vec![Polling, Completed, Failed, TimedOut, Idle],
        Completed | Failed | TimedOut | Blocked => vec![Submitting, Idle],
    }
}

fn allowed(from: RunPhase, to: RunPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
