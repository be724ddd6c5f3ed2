//! Request and response bodies that only the REST layer needs.

use rigor_core::{RemoteWorkspace, RunRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /workspaces`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkspace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigation_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u64>,
    /// Initial files; the server seeds its own entry file when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    /// Ask the server to generate the entry file from the linked investigation
    #[serde(default)]
    pub generate_ai_code: bool,
}

impl NewWorkspace {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn for_investigation(mut self, investigation_id: u64) -> Self {
        self.investigation_id = Some(investigation_id);
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: u64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(path.into(), content.into());
        self
    }

    /// Request server-side code generation
    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generate_ai_code = true;
        self
    }
}

/// Response of `POST /workspaces`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWorkspace {
    #[serde(flatten)]
    pub workspace: RemoteWorkspace,
    /// Present when code generation was requested, including when it fell back
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunList {
    pub(crate) runs: Vec<RunRecord>,
}
