//! Run orchestrator
//!
//! Drives one workspace's runs through the phase machine in
//! [`crate::state_machine`]:
//! - flushes the active file, then submits to the executor
//! - polls sequentially on a fixed interval with a fixed attempt budget
//! - classifies the terminal payload and publishes one completion
//!
//! At most one run per orchestrator is in flight. Cancellation is local only:
//! it stops polling and never reaches the executor.

use crate::api::ExecutorApi;
use crate::config::PollConfig;
use crate::error::RunError;
use crate::interpreter::{interpret, RunOutcome};
use crate::state_machine::validate_transition;
use crate::types::{Run, RunId, RunPhase, RunStatusReport, SubmitResponse, WorkspaceId};
use crate::workspace_store::WorkspaceStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// Notification published once per run when it reaches a terminal phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    /// Final run snapshot
    pub run: Run,
    /// Classified result, or the error that ended polling
    pub outcome: Result<RunOutcome, RunError>,
}

/// Handle returned by [`RunOrchestrator::submit`]
#[derive(Debug)]
pub struct RunHandle {
    run: Run,
    done: oneshot::Receiver<RunCompletion>,
}

impl RunHandle {
    /// Run snapshot taken when `submit` returned (`Polling` or `Blocked`)
    #[inline]
    #[must_use]
    pub fn run(&self) -> &Run {
        &self.run
    }

    #[inline]
    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        self.run.id
    }

    /// Wait for the run to reach a terminal phase.
    ///
    /// # Errors
    /// `RunError::Cancelled` if the poll session was discarded first.
    pub async fn wait(self) -> Result<RunCompletion, RunError> {
        self.done.await.map_err(|_| RunError::Cancelled)
    }
}

#[derive(Debug, Default)]
struct Inner {
    run: Option<Run>,
    /// Cancellation token of the live poll session
    session: Option<CancellationToken>,
}

#[derive(Debug)]
struct Shared {
    phase: watch::Sender<RunPhase>,
    completions: broadcast::Sender<RunCompletion>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn set_phase(&self, to: RunPhase) {
        self.phase.send_if_modified(|phase| {
            if let Err(e) = validate_transition(*phase, to) {
                tracing::error!(error = %e, "refusing run phase change");
                return false;
            }
            let changed = *phase != to;
            *phase = to;
            changed
        });
    }

    /// Publish a terminal run unless its session was cancelled meanwhile
    fn finish(
        &self,
        token: &CancellationToken,
        run: Run,
        outcome: Result<RunOutcome, RunError>,
        done: oneshot::Sender<RunCompletion>,
    ) {
        let completion = RunCompletion {
            run: run.clone(),
            outcome,
        };
        {
            let mut inner = self.inner.lock();
            if token.is_cancelled() {
                return;
            }
            inner.session = None;
            inner.run = Some(run.clone());
            self.set_phase(run.status);
        }

        match &completion.outcome {
            Ok(outcome) => tracing::info!(
                workspace_id = %run.workspace_id,
                run_id = ?run.id,
                status = %run.status,
                outcome = outcome.label(),
                attempts = run.poll_attempts,
                "run finished"
            ),
            Err(e) => tracing::warn!(
                workspace_id = %run.workspace_id,
                run_id = ?run.id,
                status = %run.status,
                error = %e,
                attempts = run.poll_attempts,
                "run finished with error"
            ),
        }

        // No subscribers is fine
        let _ = self.completions.send(completion.clone());
        let _ = done.send(completion);
    }

    fn record_attempts(&self, token: &CancellationToken, attempts: u32) {
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return;
        }
        if let Some(run) = inner.run.as_mut() {
            run.poll_attempts = attempts;
        }
    }
}

/// Orchestrates runs of a single workspace
///
/// The one-run-in-flight rule is held per instance. Callers keep a single
/// orchestrator per workspace; two instances built for the same
/// [`WorkspaceId`] do not see each other's runs.
pub struct RunOrchestrator {
    workspace: WorkspaceId,
    executor: Arc<dyn ExecutorApi>,
    poll: PollConfig,
    shared: Arc<Shared>,
    root: CancellationToken,
}

impl RunOrchestrator {
    /// Create an idle orchestrator for `workspace`.
    ///
    /// Nothing stops a second orchestrator for the same workspace; share
    /// this one instead of building another.
    #[must_use]
    pub fn new(workspace: WorkspaceId, executor: Arc<dyn ExecutorApi>, poll: PollConfig) -> Self {
        let (phase, _) = watch::channel(RunPhase::Idle);
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            workspace,
            executor,
            poll,
            shared: Arc::new(Shared {
                phase,
                completions,
                inner: Mutex::new(Inner::default()),
            }),
            root: CancellationToken::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace
    }

    #[inline]
    #[must_use]
    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.shared.phase.borrow()
    }

    /// Observe phase transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<RunPhase> {
        self.shared.phase.subscribe()
    }

    /// Receive one [`RunCompletion`] per run that reaches a terminal phase
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunCompletion> {
        self.shared.completions.subscribe()
    }

    /// Snapshot of the latest run, if any
    #[must_use]
    pub fn current_run(&self) -> Option<Run> {
        self.shared.inner.lock().run.clone()
    }

    /// Flush `active_path` through `store`, then submit the workspace.
    ///
    /// Returns once the executor has answered: the handle's run is either
    /// `Polling` (a poll session now runs in the background) or `Blocked`
    /// (no poll is ever issued).
    ///
    /// # Errors
    /// - `RunError::RunInProgress` if a run is Submitting or Polling; nothing else happens
    /// - `RunError::WorkspaceMismatch` if `store` holds another workspace
    /// - `RunError::Flush` if saving the active file failed; phase becomes Failed
    /// - `RunError::Network` / `NotFound` / `InvalidResponse` if submission failed; phase becomes Failed
    /// - `RunError::Cancelled` if [`cancel`](Self::cancel) was called meanwhile
    pub async fn submit(
        &self,
        store: &mut WorkspaceStore,
        active_path: &str,
    ) -> Result<RunHandle, RunError> {
        if store.workspace_id() != Some(self.workspace) {
            return Err(RunError::WorkspaceMismatch {
                expected: self.workspace,
                store: store.workspace_id(),
            });
        }

        let token = self.claim()?;
        tracing::info!(workspace_id = %self.workspace, path = active_path, "submitting run");

        if let Err(e) = store.save(active_path).await {
            return Err(self.abort_submission(&token, RunError::Flush(e)));
        }
        if token.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let response = self.executor.submit_run(self.workspace).await;
        if token.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let mut run = Run::submitting(self.workspace);
        let (done_tx, done_rx) = oneshot::channel();

        match response {
            Err(e) => Err(self.abort_submission(&token, e.into())),
            Ok(SubmitResponse::Rejected { violations }) => {
                tracing::warn!(
                    workspace_id = %self.workspace,
                    violations = violations.len(),
                    "executor rejected run"
                );
                run.violations = violations;
                run.finish(RunPhase::Blocked);
                let outcome = run.terminal_payload().map(|p| interpret(&p));
                let outcome = outcome.ok_or(RunError::InvalidResponse(
                    "blocked run produced no terminal payload".into(),
                ));
                self.shared.finish(&token, run.clone(), outcome, done_tx);
                Ok(RunHandle { run, done: done_rx })
            }
            Ok(SubmitResponse::Accepted { run_id }) => {
                run.id = Some(run_id);
                run.status = RunPhase::Polling;
                {
                    let mut inner = self.shared.inner.lock();
                    if token.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    inner.run = Some(run.clone());
                    self.shared.set_phase(RunPhase::Polling);
                }
                tracing::info!(workspace_id = %self.workspace, run_id = %run_id, "run accepted, polling");

                let session = PollSession {
                    executor: Arc::clone(&self.executor),
                    shared: Arc::clone(&self.shared),
                    poll: self.poll,
                    token,
                };
                tokio::spawn(session.drive(run.clone(), run_id, done_tx));
                Ok(RunHandle { run, done: done_rx })
            }
        }
    }

    /// Stop the current poll session locally and return to `Idle`.
    ///
    /// The executor is not told; a remote run keeps going unobserved.
    pub fn cancel(&self) {
        let mut inner = self.shared.inner.lock();
        let was_active = self.phase().is_active();
        if let Some(token) = inner.session.take() {
            token.cancel();
        }
        if was_active {
            inner.run = None;
            tracing::info!(workspace_id = %self.workspace, "run discarded locally");
        }
        if self.phase() != RunPhase::Idle {
            self.shared.set_phase(RunPhase::Idle);
        }
    }

    /// Atomically move to `Submitting` and open a session token
    fn claim(&self) -> Result<CancellationToken, RunError> {
        let mut inner = self.shared.inner.lock();
        let mut busy = None;
        self.shared.phase.send_if_modified(|phase| {
            if validate_transition(*phase, RunPhase::Submitting).is_err() {
                busy = Some(*phase);
                return false;
            }
            *phase = RunPhase::Submitting;
            true
        });
        if let Some(phase) = busy {
            tracing::debug!(workspace_id = %self.workspace, %phase, "submit rejected, run in flight");
            return Err(RunError::RunInProgress(phase));
        }

        let token = self.root.child_token();
        inner.session = Some(token.clone());
        inner.run = None;
        Ok(token)
    }

    /// Submission failed before a run existed
    fn abort_submission(&self, token: &CancellationToken, err: RunError) -> RunError {
        let mut inner = self.shared.inner.lock();
        if token.is_cancelled() {
            return RunError::Cancelled;
        }
        inner.session = None;
        self.shared.set_phase(RunPhase::Failed);
        tracing::warn!(workspace_id = %self.workspace, error = %err, "submission failed");
        err
    }
}

impl Drop for RunOrchestrator {
    fn drop(&mut self) {
        // Observers see Idle before the channel closes; the remote run is left alone
        self.cancel();
        self.root.cancel();
    }
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("workspace", &self.workspace)
            .field("phase", &self.phase())
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

/// One run's sequential poll loop
struct PollSession {
    executor: Arc<dyn ExecutorApi>,
    shared: Arc<Shared>,
    poll: PollConfig,
    token: CancellationToken,
}

impl PollSession {
    async fn drive(self, mut run: Run, run_id: RunId, done: oneshot::Sender<RunCompletion>) {
        let budget = self.poll.max_attempts;

        for attempt in 1..=budget {
            let response = tokio::select! {
                biased;
                () = self.token.cancelled() => return,
                response = self.executor.get_run_status(run_id) => response,
            };
            run.poll_attempts = attempt;

            let report = match response {
                Ok(report) => report,
                Err(e) => {
                    run.finish(RunPhase::Failed);
                    self.shared.finish(&self.token, run, Err(e.into()), done);
                    return;
                }
            };

            tracing::debug!(run_id = %run_id, attempt, status = ?report.status, "polled run");

            if report.status.is_terminal() {
                let outcome = Self::capture(&mut run, report);
                self.shared.finish(&self.token, run, outcome, done);
                return;
            }

            self.shared.record_attempts(&self.token, attempt);
            if attempt == budget {
                break;
            }

            tokio::select! {
                biased;
                () = self.token.cancelled() => return,
                () = tokio::time::sleep(self.poll.interval()) => {}
            }
        }

        tracing::warn!(run_id = %run_id, attempts = budget, "poll budget exhausted, remote outcome unknown");
        run.finish(RunPhase::TimedOut);
        let outcome = run
            .terminal_payload()
            .map(|p| interpret(&p))
            .ok_or(RunError::InvalidResponse("timed out run has no payload".into()));
        self.shared.finish(&self.token, run, outcome, done);
    }

    fn capture(run: &mut Run, report: RunStatusReport) -> Result<RunOutcome, RunError> {
        use crate::types::RemoteRunStatus;

        run.stdout = report.stdout;
        run.stderr = report.stderr;
        run.exit_code = report.exit_code;
        run.finish(match report.status {
            RemoteRunStatus::Completed => RunPhase::Completed,
            _ => RunPhase::Failed,
        });
        run.terminal_payload()
            .map(|p| interpret(&p))
            .ok_or(RunError::InvalidResponse("terminal run has no payload".into()))
    }
}
