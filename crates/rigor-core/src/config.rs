//! Configuration
//!
//! All knobs are fixed at construction time: the orchestrator never derives
//! its poll interval or budget from server hints.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`ClientConfig::base_url`]
pub const API_URL_ENV: &str = "RIGOR_API_URL";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigorConfig {
    pub client: ClientConfig,
    pub workspace: WorkspaceConfig,
    pub poll: PollConfig,
}

impl RigorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `RIGOR_API_URL` if set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.client.base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Reject values the orchestrator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be > 0".into()));
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid("poll.max_attempts must be > 0".into()));
        }
        let ext = &self.workspace.source_extension;
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "workspace.source_extension {ext:?} must look like \".py\""
            )));
        }
        if !self.workspace.default_entry.ends_with(ext.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "workspace.default_entry {:?} must end with {ext}",
                self.workspace.default_entry
            )));
        }
        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("client.base_url is empty".into()));
        }
        Ok(())
    }
}

/// REST client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, including the `/api` prefix
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Request timeout as a `Duration`
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// File naming and seeding rules for the workspace store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Accepted source-file extension, with the leading dot
    pub source_extension: String,
    /// File seeded when the remote map is empty
    pub default_entry: String,
    /// Content of the seeded entry file
    pub default_entry_content: String,
    /// Content of files created through `create_file`
    pub new_file_template: String,
}

impl WorkspaceConfig {
    /// With source extension
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.source_extension = ext.into();
        self
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            source_extension: ".py".to_string(),
            default_entry: "main.py".to_string(),
            default_entry_content: "# Write your code here\n".to_string(),
            new_file_template: "# New file\n".to_string(),
        }
    }
}

/// Poll session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between consecutive status requests
    pub interval_ms: u64,
    /// Status requests allowed before the run is forced to `TimedOut`
    pub max_attempts: u32,
}

impl PollConfig {
    /// With interval
    #[inline]
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Interval as a `Duration`
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 60,
        }
    }
}
