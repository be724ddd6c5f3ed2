//! Core types for Rigor
//!
//! Defines the fundamental data model:
//! - Workspace and run identifiers
//! - Workspace metadata and cached files
//! - Runs, their phases and terminal payloads
//! - Collaborator wire shapes (remote workspace, run status reports)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workspace identifier assigned by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub u64);

impl WorkspaceId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run identifier assigned by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive workspace fields, everything except the file map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub investigation_id: Option<u64>,
    #[serde(default)]
    pub agent_id: Option<u64>,
}

impl WorkspaceMeta {
    /// Metadata with only an id and a name
    #[inline]
    #[must_use]
    pub fn new(id: WorkspaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            investigation_id: None,
            agent_id: None,
        }
    }

    /// Link to an investigation
    #[inline]
    #[must_use]
    pub fn with_investigation(mut self, investigation_id: u64) -> Self {
        self.investigation_id = Some(investigation_id);
        self
    }

    /// Link to an agent
    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent_id: u64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

/// Workspace as returned by `GetWorkspace`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWorkspace {
    #[serde(flatten)]
    pub meta: WorkspaceMeta,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl RemoteWorkspace {
    /// Remote workspace with no files
    #[inline]
    #[must_use]
    pub fn empty(meta: WorkspaceMeta) -> Self {
        Self {
            meta,
            files: BTreeMap::new(),
        }
    }

    /// Add a file
    #[inline]
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

/// A file held in the local cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFile {
    pub path: String,
    pub content: String,
    /// True between a local edit and a confirmed save
    pub dirty: bool,
}

impl WorkspaceFile {
    /// A file whose content matches the remote store
    #[inline]
    #[must_use]
    pub fn clean(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            dirty: false,
        }
    }
}

/// Orchestrator phase, also used as the status of a [`Run`]
///
/// A `Run` is never `Idle`; that phase only describes an orchestrator with no
/// run in flight (or one whose run was discarded locally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Blocked,
}

impl RunPhase {
    /// Completed, Failed, TimedOut or Blocked
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Blocked
        )
    }

    /// Submitting or Polling: a run is in flight
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a workspace against the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Assigned once the executor accepts the submission
    pub id: Option<RunId>,
    pub workspace_id: WorkspaceId,
    pub status: RunPhase,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Only populated when `status` is `Blocked`
    pub violations: Vec<String>,
    pub exit_code: Option<i32>,
    /// Status requests issued so far
    pub poll_attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// A run that has just entered `Submitting`
    #[must_use]
    pub fn submitting(workspace_id: WorkspaceId) -> Self {
        Self {
            id: None,
            workspace_id,
            status: RunPhase::Submitting,
            stdout: None,
            stderr: None,
            violations: Vec::new(),
            exit_code: None,
            poll_attempts: 0,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to a terminal status and stamp the finish time
    pub fn finish(&mut self, status: RunPhase) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Payload handed to the result interpreter, if the run is terminal
    #[must_use]
    pub fn terminal_payload(&self) -> Option<TerminalPayload> {
        let status = match self.status {
            RunPhase::Completed => TerminalStatus::Completed,
            RunPhase::Failed => TerminalStatus::Failed,
            RunPhase::TimedOut => TerminalStatus::TimedOut,
            RunPhase::Blocked => TerminalStatus::Blocked,
            _ => return None,
        };
        Some(TerminalPayload {
            status,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            violations: self.violations.clone(),
            attempts: self.poll_attempts,
        })
    }
}

/// Terminal status as seen by the result interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Completed,
    Failed,
    TimedOut,
    Blocked,
}

/// Terminal run payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalPayload {
    pub status: TerminalStatus,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    #[serde(default)]
    pub violations: Vec<String>,
    /// Poll attempts made before the payload was produced
    #[serde(default)]
    pub attempts: u32,
}

/// Outcome of `SubmitRun`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    /// Executor accepted the run
    Accepted { run_id: RunId },
    /// Executor rejected the run before execution
    Rejected { violations: Vec<String> },
}

/// Status reported by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Server-side static check failure recorded on an already created run
    FailedStaticCheck,
}

impl RemoteRunStatus {
    /// Completed or any failure
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

/// Response to `GetRunStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatusReport {
    pub status: RemoteRunStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl RunStatusReport {
    /// Report with only a status
    #[inline]
    #[must_use]
    pub fn status(status: RemoteRunStatus) -> Self {
        Self {
            status,
            stdout: None,
            stderr: None,
            exit_code: None,
        }
    }

    /// With stdout
    #[inline]
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    /// With stderr
    #[inline]
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// With exit code
    #[inline]
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// Historical run as stored by the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub workspace_id: WorkspaceId,
    pub status: RemoteRunStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub code_hash: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}
