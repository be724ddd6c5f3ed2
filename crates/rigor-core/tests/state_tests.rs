use rigor_core::state_machine::{allowed_transitions, validate_transition};
use rigor_core::RunPhase;
use proptest::prelude::*;

fn any_phase() -> impl Strategy<Value = RunPhase> {
    prop_oneof![
        Just(RunPhase::Idle),
        Just(RunPhase::Submitting),
        Just(RunPhase::Polling),
        Just(RunPhase::Completed),
        Just(RunPhase::Failed),
        Just(RunPhase::TimedOut),
        Just(RunPhase::Blocked),
    ]
}

#[test]
fn test_idle_transitions() {
    assert!(validate_transition(RunPhase::Idle, RunPhase::Submitting).is_ok());

    assert!(validate_transition(RunPhase::Idle, RunPhase::Polling).is_err());
    assert!(validate_transition(RunPhase::Idle, RunPhase::Completed).is_err());
}

#[test]
fn test_submitting_transitions() {
    assert!(validate_transition(RunPhase::Submitting, RunPhase::Polling).is_ok());
    assert!(validate_transition(RunPhase::Submitting, RunPhase::Blocked).is_ok());
    assert!(validate_transition(RunPhase::Submitting, RunPhase::Failed).is_ok());

    // A run that was never accepted cannot complete or time out
    assert!(validate_transition(RunPhase::Submitting, RunPhase::Completed).is_err());
    assert!(validate_transition(RunPhase::Submitting, RunPhase::TimedOut).is_err());
}

#[test]
fn test_terminal_phases_allow_resubmission() {
    for phase in [
        RunPhase::Completed,
        RunPhase::Failed,
        RunPhase::TimedOut,
        RunPhase::Blocked,
    ] {
        assert!(validate_transition(phase, RunPhase::Submitting).is_ok());
        assert!(validate_transition(phase, RunPhase::Polling).is_err());
    }
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_phase(), to in any_phase()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            assert!(allowed.contains(&to));
        } else {
            assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_only_idle_or_terminal_can_submit(from in any_phase()) {
        let can_submit = validate_transition(from, RunPhase::Submitting).is_ok();
        prop_assert_eq!(can_submit, !from.is_active());
    }

    #[test]
    fn prop_every_active_phase_can_be_cancelled(from in any_phase()) {
        if from.is_active() {
            prop_assert!(validate_transition(from, RunPhase::Idle).is_ok());
        }
    }
}
