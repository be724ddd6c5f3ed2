//! Rigor Core - workspace synchronization and run orchestration
//!
//! Owns the lifecycle of a hypothesis-testing program:
//! - Keeps a local cache of workspace files with dirty tracking
//! - Persists edits to the remote workspace store
//! - Submits runs to the sandboxed executor and polls them to a terminal state
//! - Classifies terminal payloads into typed outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use rigor_core::prelude::*;
//!
//! # async fn example(api: std::sync::Arc<impl WorkspaceApi + ExecutorApi + 'static>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RigorConfig::new();
//! let mut store = WorkspaceStore::new(api.clone(), config.workspace.clone());
//! store.load(WorkspaceId(7)).await?;
//! store.set_content("main.py", "print(1)")?;
//!
//! let orchestrator = RunOrchestrator::new(WorkspaceId(7), api, config.poll);
//! let completion = orchestrator.submit(&mut store, "main.py").await?.wait().await?;
//! println!("{:?}", completion.outcome);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod orchestrator;
pub mod presentation;
pub mod state_machine;
pub mod types;
pub mod workspace_store;

// Re-exports for convenience
pub use api::{ExecutorApi, WorkspaceApi};
pub use config::{ClientConfig, PollConfig, RigorConfig, WorkspaceConfig, API_URL_ENV};
pub use error::{ApiError, ConfigError, RunError, StoreError, ValidationError};
pub use interpreter::{interpret, RunOutcome};
pub use orchestrator::{RunCompletion, RunHandle, RunOrchestrator};
pub use types::{
    RemoteRunStatus, RemoteWorkspace, Run, RunId, RunPhase, RunRecord, RunStatusReport,
    SubmitResponse, TerminalPayload, TerminalStatus, WorkspaceFile, WorkspaceId, WorkspaceMeta,
};
pub use workspace_store::{validate_file_name, WorkspaceStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Rigor Core
    pub use crate::{
        ExecutorApi, PollConfig, RigorConfig, RunCompletion, RunOrchestrator, RunOutcome,
        RunPhase, WorkspaceApi, WorkspaceId, WorkspaceStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
