//! Rigor Client - REST access to the workspace store and the sandboxed executor
//!
//! [`HttpBackend`] implements both [`rigor_core::WorkspaceApi`] and
//! [`rigor_core::ExecutorApi`], so one instance can back a
//! `WorkspaceStore` and a `RunOrchestrator` at the same time.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod envelope;
pub mod http;
pub mod models;

pub use http::{ClientBuildError, HttpBackend};
pub use models::{CreatedWorkspace, NewWorkspace};
