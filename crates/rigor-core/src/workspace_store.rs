//! Workspace store
//!
//! Owns the local file-content cache of one workspace:
//! - loading (full replacement, never a merge)
//! - in-memory edits with dirty tracking
//! - save / create / delete against the remote store
//!
//! The cache is only mutated by local edits and by successful remote
//! responses. A failed save keeps the local content and leaves the file
//! dirty; there is no rollback and no conflict detection.

use crate::api::WorkspaceApi;
use crate::config::WorkspaceConfig;
use crate::error::{StoreError, ValidationError};
use crate::types::{WorkspaceFile, WorkspaceId, WorkspaceMeta};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Check a file name against the naming rules of a workspace.
///
/// Names are relative paths (`pkg/util.py` is fine); absolute paths,
/// backslashes and `..` segments are rejected.
pub fn validate_file_name(name: &str, extension: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name != name.trim()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|seg| seg.is_empty() || seg == "..")
    {
        return Err(ValidationError::InvalidPath(name.to_string()));
    }
    let Some(stem) = name.strip_suffix(extension) else {
        return Err(ValidationError::MissingExtension {
            name: name.to_string(),
            expected: extension.to_string(),
        });
    };
    if stem.is_empty() || stem.ends_with('/') {
        return Err(ValidationError::EmptyStem(name.to_string()));
    }
    Ok(())
}

/// Local cache of one workspace's files
pub struct WorkspaceStore {
    api: Arc<dyn WorkspaceApi>,
    config: WorkspaceConfig,
    meta: Option<WorkspaceMeta>,
    files: BTreeMap<String, WorkspaceFile>,
}

impl WorkspaceStore {
    /// Create an empty store; call [`load`](Self::load) before anything else
    #[must_use]
    pub fn new(api: Arc<dyn WorkspaceApi>, config: WorkspaceConfig) -> Self {
        Self {
            api,
            config,
            meta: None,
            files: BTreeMap::new(),
        }
    }

    /// Fetch the remote file map and replace the local cache with it.
    ///
    /// An empty remote map seeds the default entry file. On error the
    /// previous cache stays as it was.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the workspace id is unknown
    /// - `StoreError::Network` on transport failure
    pub async fn load(&mut self, workspace: WorkspaceId) -> Result<(), StoreError> {
        tracing::debug!(workspace_id = %workspace, "loading workspace");
        let remote = self.api.get_workspace(workspace).await.map_err(|e| {
            tracing::warn!(workspace_id = %workspace, error = %e, "workspace load failed");
            StoreError::from(e)
        })?;

        let mut files: BTreeMap<String, WorkspaceFile> = remote
            .files
            .into_iter()
            .map(|(path, content)| (path.clone(), WorkspaceFile::clean(path, content)))
            .collect();

        if files.is_empty() {
            tracing::info!(
                workspace_id = %workspace,
                entry = %self.config.default_entry,
                "remote workspace has no files, seeding default entry"
            );
            files.insert(
                self.config.default_entry.clone(),
                WorkspaceFile::clean(
                    self.config.default_entry.clone(),
                    self.config.default_entry_content.clone(),
                ),
            );
        }

        let mut meta = remote.meta;
        meta.id = workspace;
        self.meta = Some(meta);
        self.files = files;

        tracing::info!(workspace_id = %workspace, files = self.files.len(), "workspace loaded");
        Ok(())
    }

    /// Id of the loaded workspace
    #[inline]
    #[must_use]
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.meta.as_ref().map(|m| m.id)
    }

    /// Metadata of the loaded workspace
    #[inline]
    #[must_use]
    pub fn meta(&self) -> Option<&WorkspaceMeta> {
        self.meta.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn get_file(&self, path: &str) -> Option<&WorkspaceFile> {
        self.files.get(path)
    }

    /// Replace the content of a cached file and mark it dirty.
    ///
    /// # Errors
    /// `StoreError::NotFound` if the path is not in the cache. New files go
    /// through [`create_file`](Self::create_file).
    pub fn set_content(&mut self, path: &str, text: impl Into<String>) -> Result<(), StoreError> {
        let file = self
            .files
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        file.content = text.into();
        file.dirty = true;
        Ok(())
    }

    /// Persist the cached content of `path`.
    ///
    /// # Errors
    /// - `StoreError::NotLoaded` before the first successful load
    /// - `StoreError::NotFound` if the path is unknown locally or remotely
    /// - `StoreError::Network` on transport failure; the file stays dirty
    pub async fn save(&mut self, path: &str) -> Result<(), StoreError> {
        let workspace = self.workspace_id().ok_or(StoreError::NotLoaded)?;
        let content = self
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        if let Err(e) = self.api.save_file(workspace, path, &content).await {
            tracing::warn!(workspace_id = %workspace, path, error = %e, "save failed, file stays dirty");
            return Err(e.into());
        }

        if let Some(file) = self.files.get_mut(path) {
            file.dirty = false;
        }
        tracing::debug!(workspace_id = %workspace, path, bytes = content.len(), "file saved");
        Ok(())
    }

    /// Save every dirty file in path order, stopping at the first failure.
    ///
    /// Returns the number of files saved.
    pub async fn save_all(&mut self) -> Result<usize, StoreError> {
        let dirty: Vec<String> = self.dirty_paths().map(str::to_string).collect();
        for path in &dirty {
            self.save(path).await?;
        }
        Ok(dirty.len())
    }

    /// Create a new file from the template and persist it immediately.
    ///
    /// The file enters the cache only once the remote store accepted it.
    ///
    /// # Errors
    /// - `StoreError::Validation` for a bad name (no network attempted)
    /// - `StoreError::DuplicateFile` if the path already exists
    /// - `StoreError::Network` / `StoreError::NotFound` from the remote store
    pub async fn create_file(&mut self, name: &str) -> Result<(), StoreError> {
        let workspace = self.workspace_id().ok_or(StoreError::NotLoaded)?;
        validate_file_name(name, &self.config.source_extension)?;
        if self.files.contains_key(name) {
            return Err(StoreError::DuplicateFile(name.to_string()));
        }

        let content = self.config.new_file_template.clone();
        self.api.save_file(workspace, name, &content).await?;

        self.files
            .insert(name.to_string(), WorkspaceFile::clean(name, content));
        tracing::info!(workspace_id = %workspace, path = name, "file created");
        Ok(())
    }

    /// Delete a file locally and remotely.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the path is not in the cache (no network attempted)
    /// - `StoreError::LastFile` if it is the only remaining file
    /// - remote errors, in which case the file stays cached
    pub async fn delete_file(&mut self, path: &str) -> Result<(), StoreError> {
        let workspace = self.workspace_id().ok_or(StoreError::NotLoaded)?;
        if !self.files.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if self.files.len() == 1 {
            return Err(StoreError::LastFile(path.to_string()));
        }

        self.api.delete_file(workspace, path).await?;
        self.files.remove(path);
        tracing::info!(workspace_id = %workspace, path, "file deleted");
        Ok(())
    }

    /// All cached files in path order
    pub fn files(&self) -> impl Iterator<Item = &WorkspaceFile> {
        self.files.values()
    }

    /// All cached paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Paths edited locally but not yet confirmed saved
    pub fn dirty_paths(&self) -> impl Iterator<Item = &str> {
        self.files
            .values()
            .filter(|f| f.dirty)
            .map(|f| f.path.as_str())
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self, path: &str) -> bool {
        self.files.get(path).is_some_and(|f| f.dirty)
    }

    /// File to open first: the default entry if present, else the first path
    #[must_use]
    pub fn entry_path(&self) -> Option<&str> {
        if self.files.contains_key(&self.config.default_entry) {
            return Some(self.config.default_entry.as_str());
        }
        self.paths().next()
    }

    /// Snapshot of path -> content
    #[must_use]
    pub fn contents(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(path, file)| (path.clone(), file.content.clone()))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl std::fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("workspace", &self.workspace_id())
            .field("files", &self.files.len())
            .field("dirty", &self.dirty_paths().count())
            .finish_non_exhaustive()
    }
}
