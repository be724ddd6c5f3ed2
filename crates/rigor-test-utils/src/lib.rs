//! Testing utilities for the Rigor workspace
//!
//! Shared fakes, fixtures, and setup helpers.

#![allow(missing_docs)]

pub mod backend;
pub mod policy;

pub use backend::{BackendCall, InMemoryBackend, Operation};
pub use policy::StaticPolicy;

use rigor_core::{
    PollConfig, RemoteRunStatus, RemoteWorkspace, RunOrchestrator, RunStatusReport,
    WorkspaceConfig, WorkspaceId, WorkspaceMeta, WorkspaceStore,
};
use std::sync::Arc;

/// Workspace id used by the fixtures
pub const TEST_WORKSPACE: WorkspaceId = WorkspaceId(7);

pub fn remote_workspace(files: &[(&str, &str)]) -> RemoteWorkspace {
    files.iter().fold(
        RemoteWorkspace::empty(
            WorkspaceMeta::new(TEST_WORKSPACE, "hypothesis probe").with_investigation(3),
        ),
        |ws, (path, content)| ws.with_file(*path, *content),
    )
}

pub fn backend_with_files(files: &[(&str, &str)]) -> InMemoryBackend {
    InMemoryBackend::new().with_workspace(remote_workspace(files))
}

pub fn running() -> RunStatusReport {
    RunStatusReport::status(RemoteRunStatus::Running)
}

pub fn completed(stdout: &str) -> RunStatusReport {
    RunStatusReport::status(RemoteRunStatus::Completed)
        .with_stdout(stdout)
        .with_exit_code(0)
}

pub fn failed(stderr: &str) -> RunStatusReport {
    RunStatusReport::status(RemoteRunStatus::Failed)
        .with_stderr(stderr)
        .with_exit_code(1)
}

/// Store loaded with [`TEST_WORKSPACE`]
pub async fn loaded_store(backend: &Arc<InMemoryBackend>) -> WorkspaceStore {
    let mut store = WorkspaceStore::new(backend.clone(), WorkspaceConfig::default());
    store
        .load(TEST_WORKSPACE)
        .await
        .expect("test workspace should load");
    store
}

/// Orchestrator for [`TEST_WORKSPACE`] with the default poll budget
pub fn orchestrator(backend: &Arc<InMemoryBackend>) -> RunOrchestrator {
    RunOrchestrator::new(TEST_WORKSPACE, backend.clone(), PollConfig::default())
}
