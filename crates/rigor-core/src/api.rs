//! Collaborator contracts
//!
//! The remote file store and the sandboxed executor are reached through
//! these traits. `rigor-client` implements them over HTTP; tests use the
//! in-memory backend from `rigor-test-utils` or `mockall` mocks.

use crate::error::ApiError;
use crate::types::{RemoteWorkspace, RunId, RunStatusReport, SubmitResponse, WorkspaceId};

/// Persistent workspace file store
#[async_trait::async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Fetch workspace metadata and its file map
    async fn get_workspace(&self, workspace: WorkspaceId) -> Result<RemoteWorkspace, ApiError>;

    /// Create or overwrite one file
    async fn save_file(
        &self,
        workspace: WorkspaceId,
        path: &str,
        content: &str,
    ) -> Result<(), ApiError>;

    /// Remove one file
    async fn delete_file(&self, workspace: WorkspaceId, path: &str) -> Result<(), ApiError>;
}

/// Sandboxed executor
#[async_trait::async_trait]
pub trait ExecutorApi: Send + Sync {
    /// Ask the executor to run the workspace as currently persisted.
    ///
    /// A policy rejection is a successful call returning
    /// [`SubmitResponse::Rejected`], not an error.
    async fn submit_run(&self, workspace: WorkspaceId) -> Result<SubmitResponse, ApiError>;

    /// Current status of a run
    async fn get_run_status(&self, run: RunId) -> Result<RunStatusReport, ApiError>;
}
