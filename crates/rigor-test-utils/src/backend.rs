//! In-memory workspace store and executor.
//!
//! Records every call in order, returns scripted run statuses and can be
//! told to fail specific operations.

use crate::policy::StaticPolicy;
use parking_lot::Mutex;
use rigor_core::{
    ApiError, ExecutorApi, RemoteRunStatus, RemoteWorkspace, RunId, RunStatusReport,
    SubmitResponse, WorkspaceApi, WorkspaceId,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetWorkspace(WorkspaceId),
    SaveFile {
        workspace: WorkspaceId,
        path: String,
        content: String,
    },
    DeleteFile {
        workspace: WorkspaceId,
        path: String,
    },
    SubmitRun(WorkspaceId),
    GetRunStatus(RunId),
}

/// Operation selector for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetWorkspace,
    SaveFile,
    DeleteFile,
    SubmitRun,
    GetRunStatus,
}

#[derive(Debug, Default)]
struct State {
    workspaces: BTreeMap<WorkspaceId, RemoteWorkspace>,
    calls: Vec<BackendCall>,
    next_run_id: u64,
    runs: BTreeMap<RunId, VecDeque<RunStatusReport>>,
    script: Vec<RunStatusReport>,
    forced_violations: Option<Vec<String>>,
    policy: Option<StaticPolicy>,
    failures: Vec<(Operation, ApiError)>,
}

impl State {
    fn take_failure(&mut self, op: Operation) -> Option<ApiError> {
        let idx = self.failures.iter().position(|(o, _)| *o == op)?;
        Some(self.failures.remove(idx).1)
    }
}

/// Recording fake for both collaborator traits
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    poll_latency: Option<Duration>,
    submit_latency: Option<Duration>,
    in_flight_polls: AtomicUsize,
    max_in_flight_polls: AtomicUsize,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_run_id: 1,
                ..State::default()
            }),
            poll_latency: None,
            submit_latency: None,
            in_flight_polls: AtomicUsize::new(0),
            max_in_flight_polls: AtomicUsize::new(0),
        }
    }

    /// Register a workspace
    #[must_use]
    pub fn with_workspace(self, workspace: RemoteWorkspace) -> Self {
        self.state
            .lock()
            .workspaces
            .insert(workspace.meta.id, workspace);
        self
    }

    /// Id handed to the next accepted run
    #[must_use]
    pub fn with_next_run_id(self, id: u64) -> Self {
        self.state.lock().next_run_id = id;
        self
    }

    /// Statuses returned, in order, by polls of each accepted run.
    ///
    /// The last entry repeats once the script is exhausted; an empty script
    /// reports `running` forever.
    #[must_use]
    pub fn with_status_script(self, script: Vec<RunStatusReport>) -> Self {
        self.state.lock().script = script;
        self
    }

    /// Reject every submission with these violations
    #[must_use]
    pub fn rejecting_with(self, violations: Vec<String>) -> Self {
        self.state.lock().forced_violations = Some(violations);
        self
    }

    /// Screen persisted files before accepting a submission
    #[must_use]
    pub fn with_policy(self, policy: StaticPolicy) -> Self {
        self.state.lock().policy = Some(policy);
        self
    }

    /// Make each status request take this long
    #[must_use]
    pub fn with_poll_latency(mut self, latency: Duration) -> Self {
        self.poll_latency = Some(latency);
        self
    }

    /// Make each submission take this long
    #[must_use]
    pub fn with_submit_latency(mut self, latency: Duration) -> Self {
        self.submit_latency = Some(latency);
        self
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: Operation, error: ApiError) {
        self.state.lock().failures.push((op, error));
    }

    /// Every call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Number of status requests so far
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::GetRunStatus(_)))
    }

    /// Number of submissions so far
    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::SubmitRun(_)))
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Highest number of overlapping status requests observed
    #[must_use]
    pub fn max_concurrent_polls(&self) -> usize {
        self.max_in_flight_polls.load(Ordering::SeqCst)
    }

    /// Content the remote store holds for a file
    #[must_use]
    pub fn remote_content(&self, workspace: WorkspaceId, path: &str) -> Option<String> {
        self.state
            .lock()
            .workspaces
            .get(&workspace)
            .and_then(|ws| ws.files.get(path).cloned())
    }

    /// Paths the remote store holds for a workspace
    #[must_use]
    pub fn remote_paths(&self, workspace: WorkspaceId) -> Vec<String> {
        self.state
            .lock()
            .workspaces
            .get(&workspace)
            .map(|ws| ws.files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn workspace_not_found(id: WorkspaceId) -> ApiError {
    ApiError::NotFound(format!("workspace {id}"))
}

#[async_trait::async_trait]
impl WorkspaceApi for InMemoryBackend {
    async fn get_workspace(&self, workspace: WorkspaceId) -> Result<RemoteWorkspace, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::GetWorkspace(workspace));
        if let Some(err) = state.take_failure(Operation::GetWorkspace) {
            return Err(err);
        }
        state
            .workspaces
            .get(&workspace)
            .cloned()
            .ok_or_else(|| workspace_not_found(workspace))
    }

    async fn save_file(
        &self,
        workspace: WorkspaceId,
        path: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::SaveFile {
            workspace,
            path: path.to_string(),
            content: content.to_string(),
        });
        if let Some(err) = state.take_failure(Operation::SaveFile) {
            return Err(err);
        }
        let ws = state
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| workspace_not_found(workspace))?;
        ws.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn delete_file(&self, workspace: WorkspaceId, path: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::DeleteFile {
            workspace,
            path: path.to_string(),
        });
        if let Some(err) = state.take_failure(Operation::DeleteFile) {
            return Err(err);
        }
        let ws = state
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| workspace_not_found(workspace))?;
        ws.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("file {path}")))
    }
}

#[async_trait::async_trait]
impl ExecutorApi for InMemoryBackend {
    async fn submit_run(&self, workspace: WorkspaceId) -> Result<SubmitResponse, ApiError> {
        if let Some(latency) = self.submit_latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        state.calls.push(BackendCall::SubmitRun(workspace));
        if let Some(err) = state.take_failure(Operation::SubmitRun) {
            return Err(err);
        }
        let files = state
            .workspaces
            .get(&workspace)
            .map(|ws| ws.files.clone())
            .ok_or_else(|| workspace_not_found(workspace))?;

        if let Some(violations) = state.forced_violations.clone() {
            return Ok(SubmitResponse::Rejected { violations });
        }
        if let Some(policy) = &state.policy {
            let violations = policy.check(&files);
            if !violations.is_empty() {
                return Ok(SubmitResponse::Rejected { violations });
            }
        }

        let run_id = RunId(state.next_run_id);
        state.next_run_id += 1;
        let script = state.script.iter().cloned().collect();
        state.runs.insert(run_id, script);
        Ok(SubmitResponse::Accepted { run_id })
    }

    async fn get_run_status(&self, run: RunId) -> Result<RunStatusReport, ApiError> {
        let now = self.in_flight_polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_polls.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.poll_latency {
            tokio::time::sleep(latency).await;
        }

        let result = {
            let mut state = self.state.lock();
            state.calls.push(BackendCall::GetRunStatus(run));
            if let Some(err) = state.take_failure(Operation::GetRunStatus) {
                Err(err)
            } else if let Some(script) = state.runs.get_mut(&run) {
                let report = if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                };
                Ok(report.unwrap_or_else(|| RunStatusReport::status(RemoteRunStatus::Running)))
            } else {
                Err(ApiError::NotFound(format!("run {run}")))
            }
        };

        self.in_flight_polls.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
