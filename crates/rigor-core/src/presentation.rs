//! Display-only annotations.
//!
//! Nothing in here feeds the orchestrator.

use crate::workspace_store::WorkspaceStore;

/// Entry files longer than this are assumed to be generated
pub const GENERATED_LENGTH_HINT: usize = 500;

/// Heuristic: does this entry file look like AI-generated test code?
#[must_use]
pub fn looks_ai_generated(entry_content: &str) -> bool {
    entry_content.contains("AI")
        || entry_content.contains("generated")
        || entry_content.len() > GENERATED_LENGTH_HINT
}

/// Apply [`looks_ai_generated`] to the store's entry file
#[must_use]
pub fn workspace_looks_ai_generated(store: &WorkspaceStore) -> bool {
    store
        .entry_path()
        .and_then(|path| store.get_file(path))
        .is_some_and(|file| looks_ai_generated(&file.content))
}
