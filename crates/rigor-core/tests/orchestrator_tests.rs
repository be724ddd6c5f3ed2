//! Run orchestration against the in-memory backend.
//!
//! Time is paused, so poll intervals elapse instantly while keeping their
//! ordering.

use pretty_assertions::assert_eq;
use rigor_core::{
    ApiError, PollConfig, RunError, RunId, RunOrchestrator, RunOutcome, RunPhase, StoreError,
    WorkspaceId,
};
use rigor_test_utils::{
    backend_with_files, completed, failed, loaded_store, orchestrator, running, BackendCall,
    InMemoryBackend, Operation, StaticPolicy, TEST_WORKSPACE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test(start_paused = true)]
async fn three_running_polls_then_completed() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "print(1)")])
            .with_next_run_id(42)
            .with_status_script(vec![running(), running(), running(), completed("1\n")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut completions = orch.subscribe();

    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    assert_eq!(handle.run_id(), Some(RunId(42)));
    assert_eq!(handle.run().status, RunPhase::Polling);

    let done = handle.wait().await.unwrap();
    assert_eq!(done.run.status, RunPhase::Completed);
    assert_eq!(done.run.stdout.as_deref(), Some("1\n"));
    assert_eq!(done.run.poll_attempts, 4);
    assert_eq!(
        done.outcome,
        Ok(RunOutcome::Success {
            stdout: "1\n".to_string()
        })
    );
    assert_eq!(backend.poll_count(), 4);
    assert_eq!(orch.phase(), RunPhase::Completed);

    let published = completions.recv().await.unwrap();
    assert_eq!(published, done);
    assert!(matches!(completions.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn violations_block_without_polling() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "import os")])
            .rejecting_with(vec!["forbidden import: os".to_string()]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut completions = orch.subscribe();

    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    assert_eq!(handle.run().status, RunPhase::Blocked);
    assert_eq!(handle.run_id(), None);
    assert_eq!(handle.run().violations, vec!["forbidden import: os"]);

    let done = handle.wait().await.unwrap();
    assert_eq!(
        done.outcome,
        Ok(RunOutcome::PolicyBlocked {
            violations: vec!["forbidden import: os".to_string()]
        })
    );
    assert_eq!(orch.phase(), RunPhase::Blocked);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.poll_count(), 0);
    assert_eq!(completions.recv().await.unwrap(), done);
}

#[tokio::test(start_paused = true)]
async fn static_policy_rejection_lists_offending_files() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "print(1)"), ("net.py", "import socket\n")])
            .with_policy(StaticPolicy::python_sandbox()),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(done.run.status, RunPhase::Blocked);
    assert_eq!(
        done.run.violations,
        vec!["net.py: forbidden import: socket".to_string()]
    );
    assert_eq!(backend.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn never_terminal_run_times_out_after_exactly_sixty_polls() {
    let backend = Arc::new(backend_with_files(&[("main.py", "while True: pass")]));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let started = tokio::time::Instant::now();
    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(done.run.status, RunPhase::TimedOut);
    assert_eq!(done.outcome, Ok(RunOutcome::LocalTimeout { attempts: 60 }));
    assert_eq!(backend.poll_count(), 60);
    // 60 polls, 59 intervals between them
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(59) && elapsed < Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.poll_count(), 60);
    assert_eq!(orch.phase(), RunPhase::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn custom_budget_is_respected() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let orch = RunOrchestrator::new(
        TEST_WORKSPACE,
        backend.clone(),
        PollConfig::default().with_max_attempts(3).with_interval_ms(250),
    );

    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(done.outcome, Ok(RunOutcome::LocalTimeout { attempts: 3 }));
    assert_eq!(backend.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn executor_failure_is_not_a_timeout() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "1/0")])
            .with_status_script(vec![running(), failed("ZeroDivisionError")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(done.run.status, RunPhase::Failed);
    assert_eq!(done.run.exit_code, Some(1));
    assert_eq!(
        done.outcome,
        Ok(RunOutcome::ExecutionFailure {
            stdout: String::new(),
            stderr: "ZeroDivisionError".to_string()
        })
    );
    assert_eq!(backend.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn active_file_is_saved_before_submission() {
    let backend = Arc::new(backend_with_files(&[("main.py", "print(0)")])
        .with_status_script(vec![completed("1\n")]));
    let mut store = loaded_store(&backend).await;
    store.set_content("main.py", "print(1)").unwrap();
    let orch = orchestrator(&backend);

    orch.submit(&mut store, "main.py").await.unwrap().wait().await.unwrap();

    let calls = backend.calls();
    let save = calls
        .iter()
        .position(|c| matches!(c, BackendCall::SaveFile { path, content, .. } if path == "main.py" && content == "print(1)"))
        .expect("active file saved");
    let submit = calls
        .iter()
        .position(|c| matches!(c, BackendCall::SubmitRun(_)))
        .expect("run submitted");
    assert!(save < submit);
    assert!(!store.is_dirty("main.py"));
    assert_eq!(
        backend.remote_content(TEST_WORKSPACE, "main.py").as_deref(),
        Some("print(1)")
    );
}

#[tokio::test(start_paused = true)]
async fn failed_flush_never_reaches_executor() {
    let backend = Arc::new(backend_with_files(&[("main.py", "print(0)")]));
    backend.fail_next(Operation::SaveFile, ApiError::Network("connection reset".into()));
    let mut store = loaded_store(&backend).await;
    store.set_content("main.py", "print(1)").unwrap();
    let orch = orchestrator(&backend);
    let mut completions = orch.subscribe();

    let err = orch.submit(&mut store, "main.py").await.unwrap_err();
    assert_eq!(
        err,
        RunError::Flush(StoreError::Network("connection reset".into()))
    );
    assert!(err.is_retryable());
    assert_eq!(backend.submit_count(), 0);
    assert_eq!(orch.phase(), RunPhase::Failed);
    assert!(orch.current_run().is_none());
    assert!(store.is_dirty("main.py"));
    assert!(matches!(completions.try_recv(), Err(TryRecvError::Empty)));

    // The caller decides to retry; the failed phase does not stick
    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    assert_eq!(handle.run().status, RunPhase::Polling);
    orch.cancel();
}

#[tokio::test(start_paused = true)]
async fn submit_transport_error_fails_without_run() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    backend.fail_next(Operation::SubmitRun, ApiError::Network("503".into()));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let err = orch.submit(&mut store, "main.py").await.unwrap_err();
    assert_eq!(err, RunError::Network("503".into()));
    assert_eq!(orch.phase(), RunPhase::Failed);
    assert_eq!(backend.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_submit_while_polling_is_rejected_without_side_effects() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let _handle = orch.submit(&mut store, "main.py").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let calls_before = backend.calls().len() - backend.poll_count();

    store.set_content("main.py", "print(2)").unwrap();
    let err = orch.submit(&mut store, "main.py").await.unwrap_err();
    assert_eq!(err, RunError::RunInProgress(RunPhase::Polling));

    assert_eq!(backend.calls().len() - backend.poll_count(), calls_before);
    assert_eq!(backend.submit_count(), 1);
    assert!(store.is_dirty("main.py"));
    assert_eq!(orch.phase(), RunPhase::Polling);

    orch.cancel();
}

#[tokio::test(start_paused = true)]
async fn polls_never_overlap() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "")])
            .with_poll_latency(Duration::from_millis(1500))
            .with_status_script(vec![running(), running(), running(), completed("")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    orch.submit(&mut store, "main.py").await.unwrap().wait().await.unwrap();
    assert_eq!(backend.poll_count(), 4);
    assert_eq!(backend.max_concurrent_polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling_and_returns_to_idle() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut completions = orch.subscribe();

    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let polled = backend.poll_count();
    assert!(polled >= 1);

    orch.cancel();
    assert_eq!(orch.phase(), RunPhase::Idle);
    assert!(orch.current_run().is_none());
    assert_eq!(handle.wait().await.unwrap_err(), RunError::Cancelled);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.poll_count(), polled);
    assert!(matches!(completions.try_recv(), Err(TryRecvError::Empty)));
    // Local-only: nothing was sent to the executor besides submit and polls
    assert_eq!(backend.submit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_orchestrator_halts_polling() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut state = orch.state();

    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(*state.borrow_and_update(), RunPhase::Polling);
    drop(orch);

    assert_eq!(handle.wait().await.unwrap_err(), RunError::Cancelled);
    let polled = backend.poll_count();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.poll_count(), polled);
    assert_eq!(*state.borrow_and_update(), RunPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_submitting_discards_the_submission() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "print(1)")])
            .with_submit_latency(Duration::from_secs(2))
            .with_status_script(vec![completed("1\n")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut completions = orch.subscribe();

    let (submitted, ()) = tokio::join!(orch.submit(&mut store, "main.py"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(orch.phase(), RunPhase::Submitting);
        orch.cancel();
    });

    assert_eq!(submitted.unwrap_err(), RunError::Cancelled);
    assert_eq!(orch.phase(), RunPhase::Idle);
    assert!(orch.current_run().is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.poll_count(), 0);
    assert!(matches!(completions.try_recv(), Err(TryRecvError::Empty)));

    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(done.run.status, RunPhase::Completed);
    assert_eq!(backend.submit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_a_failed_submit_answers_stays_idle() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "")]).with_submit_latency(Duration::from_secs(2)),
    );
    backend.fail_next(Operation::SubmitRun, ApiError::Network("reset".into()));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let (submitted, ()) = tokio::join!(orch.submit(&mut store, "main.py"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        orch.cancel();
    });

    assert_eq!(submitted.unwrap_err(), RunError::Cancelled);
    assert_eq!(orch.phase(), RunPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn run_slots_are_held_per_orchestrator() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let first = orchestrator(&backend);
    let second = orchestrator(&backend);

    let _a = first.submit(&mut store, "main.py").await.unwrap();
    let _b = second.submit(&mut store, "main.py").await.unwrap();
    assert_eq!(first.phase(), RunPhase::Polling);
    assert_eq!(second.phase(), RunPhase::Polling);
    assert_eq!(
        first.submit(&mut store, "main.py").await.unwrap_err(),
        RunError::RunInProgress(RunPhase::Polling)
    );

    first.cancel();
    second.cancel();
}

#[tokio::test(start_paused = true)]
async fn poll_transport_error_ends_run_as_failed() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    backend.fail_next(Operation::GetRunStatus, ApiError::Network("timeout".into()));
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let done = orch
        .submit(&mut store, "main.py")
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(done.run.status, RunPhase::Failed);
    assert_eq!(done.outcome, Err(RunError::Network("timeout".into())));
    assert_eq!(backend.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn each_submit_creates_a_new_run() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "print(1)")])
            .with_next_run_id(42)
            .with_status_script(vec![completed("1\n")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);

    let first = orch.submit(&mut store, "main.py").await.unwrap().wait().await.unwrap();
    let second = orch.submit(&mut store, "main.py").await.unwrap().wait().await.unwrap();

    assert_eq!(first.run.id, Some(RunId(42)));
    assert_eq!(second.run.id, Some(RunId(43)));
    assert_eq!(orch.current_run().and_then(|r| r.id), Some(RunId(43)));
}

#[tokio::test]
async fn store_of_another_workspace_is_refused() {
    let backend = Arc::new(backend_with_files(&[("main.py", "")]));
    let mut store = loaded_store(&backend).await;
    let orch = RunOrchestrator::new(WorkspaceId(8), backend.clone(), PollConfig::default());

    let err = orch.submit(&mut store, "main.py").await.unwrap_err();
    assert_eq!(
        err,
        RunError::WorkspaceMismatch {
            expected: WorkspaceId(8),
            store: Some(TEST_WORKSPACE)
        }
    );
    assert_eq!(orch.phase(), RunPhase::Idle);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn state_channel_reports_terminal_phase() {
    let backend = Arc::new(
        backend_with_files(&[("main.py", "")]).with_status_script(vec![running(), completed("")]),
    );
    let mut store = loaded_store(&backend).await;
    let orch = orchestrator(&backend);
    let mut state = orch.state();
    assert_eq!(*state.borrow(), RunPhase::Idle);

    let handle = orch.submit(&mut store, "main.py").await.unwrap();
    assert_eq!(*state.borrow_and_update(), RunPhase::Polling);

    state
        .wait_for(|phase| phase.is_terminal())
        .await
        .expect("orchestrator alive");
    assert_eq!(*state.borrow(), RunPhase::Completed);
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn empty_backend_reports_unknown_workspace() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut store = rigor_core::WorkspaceStore::new(backend.clone(), Default::default());
    let err = store.load(TEST_WORKSPACE).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
