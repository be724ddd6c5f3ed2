//! Error types for Rigor Core
//!
//! Provides typed errors for:
//! - Collaborator (REST) failures
//! - File name validation
//! - Workspace store operations
//! - Run submission and polling
//! - Configuration loading
//!
//! Nothing here retries on its own; `is_retryable` tells the caller which
//! failures are worth repeating.

use crate::types::{RunPhase, WorkspaceId};

/// Failure reported by a collaborator (workspace store or executor)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport failure, timeout or server error
    #[error("network error: {0}")]
    Network(String),

    /// The addressed workspace, file or run does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator answered with a body we could not decode
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// File name rejected before any network attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file name is empty")]
    EmptyName,

    #[error("file name {name:?} must end with {expected}")]
    MissingExtension { name: String, expected: String },

    #[error("file name {0:?} has no stem before the extension")]
    EmptyStem(String),

    #[error("invalid file path {0:?}")]
    InvalidPath(String),
}

/// Workspace store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No workspace has been loaded into the store yet
    #[error("no workspace loaded")]
    NotLoaded,

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("file already exists: {0}")]
    DuplicateFile(String),

    /// Deleting this file would leave the workspace without files
    #[error("cannot delete {0}: it is the only file in the workspace")]
    LastFile(String),
}

impl StoreError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => Self::Network(msg),
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::InvalidResponse(msg) => Self::InvalidResponse(msg),
        }
    }
}

/// Run submission and polling errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// Another run for this workspace has not reached a terminal state
    #[error("a run is already {0} for this workspace")]
    RunInProgress(RunPhase),

    /// The store handed to `submit` belongs to a different workspace
    #[error("store holds workspace {store:?}, orchestrator owns {expected}")]
    WorkspaceMismatch {
        expected: WorkspaceId,
        store: Option<WorkspaceId>,
    },

    /// Saving the active file before submission failed
    #[error("flush before submit failed: {0}")]
    Flush(#[from] StoreError),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The poll session was discarded locally
    #[error("run cancelled locally")]
    Cancelled,
}

impl RunError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Flush(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

impl From<ApiError> for RunError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => Self::Network(msg),
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::InvalidResponse(msg) => Self::InvalidResponse(msg),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
