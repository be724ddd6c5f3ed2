//! HTTP implementation of the workspace store and executor traits.

use crate::envelope::{decode_body, error_detail, status_error, transport_error};
use crate::models::{CreatedWorkspace, NewWorkspace, RunList};
use reqwest::{Client, Method, StatusCode, Url};
use rigor_core::{
    ApiError, ClientConfig, ExecutorApi, RemoteWorkspace, RunId, RunRecord, RunStatusReport,
    SubmitResponse, WorkspaceApi, WorkspaceId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Failure to construct an [`HttpBackend`]
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct FileBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct Rejection {
    violations: Vec<String>,
}

/// REST backend for both collaborators
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    /// Build a client for `config.base_url` with the configured request timeout
    pub fn new(config: &ClientConfig) -> Result<Self, ClientBuildError> {
        let invalid = |reason: String| ClientBuildError::InvalidUrl {
            url: config.base_url.clone(),
            reason,
        };
        let base = Url::parse(config.base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a hierarchical url".into()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { base, client })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Past runs of a workspace, as stored by the executor
    pub async fn list_runs(&self, workspace: WorkspaceId) -> Result<Vec<RunRecord>, ApiError> {
        let url = self.endpoint(&["workspaces", &workspace.to_string(), "runs"]);
        let list: RunList = self.fetch(Method::GET, url, "list runs").await?;
        Ok(list.runs)
    }

    /// Create a workspace on the remote store
    pub async fn create_workspace(&self, request: &NewWorkspace) -> Result<CreatedWorkspace, ApiError> {
        let url = self.endpoint(&["workspaces"]);
        let (status, body) = self
            .send(self.client.post(url).json(request), "create workspace")
            .await?;
        if !status.is_success() {
            return Err(status_error(status, &body, "create workspace"));
        }
        let created: CreatedWorkspace = decode_body(&body)?;
        tracing::info!(
            workspace_id = %created.workspace.meta.id,
            generated = request.generate_ai_code,
            "workspace created"
        );
        Ok(created)
    }

    /// `base` + segments, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn file_endpoint(&self, workspace: WorkspaceId, path: &str) -> Url {
        let id = workspace.to_string();
        let mut segments = vec!["workspaces", id.as_str(), "file"];
        segments.extend(path.split('/'));
        self.endpoint(&segments)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<(StatusCode, String), ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "{what} request failed");
            transport_error(&e, what)
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e, what))?;
        tracing::debug!(%status, bytes = body.len(), "{what} answered");
        Ok((status, body))
    }

    async fn fetch<T: DeserializeOwned>(&self, method: Method, url: Url, what: &str) -> Result<T, ApiError> {
        let (status, body) = self.send(self.client.request(method, url), what).await?;
        if !status.is_success() {
            return Err(status_error(status, &body, what));
        }
        decode_body(&body)
    }

    async fn expect_success(&self, request: reqwest::RequestBuilder, what: &str) -> Result<(), ApiError> {
        let (status, body) = self.send(request, what).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, &body, what))
        }
    }
}

#[async_trait::async_trait]
impl WorkspaceApi for HttpBackend {
    async fn get_workspace(&self, workspace: WorkspaceId) -> Result<RemoteWorkspace, ApiError> {
        let url = self.endpoint(&["workspaces", &workspace.to_string()]);
        self.fetch(Method::GET, url, "get workspace").await
    }

    async fn save_file(&self, workspace: WorkspaceId, path: &str, content: &str) -> Result<(), ApiError> {
        let url = self.file_endpoint(workspace, path);
        self.expect_success(self.client.post(url).json(&FileBody { content }), "save file")
            .await
    }

    async fn delete_file(&self, workspace: WorkspaceId, path: &str) -> Result<(), ApiError> {
        let url = self.file_endpoint(workspace, path);
        self.expect_success(self.client.delete(url), "delete file")
            .await
    }
}

#[async_trait::async_trait]
impl ExecutorApi for HttpBackend {
    async fn submit_run(&self, workspace: WorkspaceId) -> Result<SubmitResponse, ApiError> {
        let url = self.endpoint(&["workspaces", &workspace.to_string(), "run"]);
        let (status, body) = self.send(self.client.post(url), "submit run").await?;

        if status == StatusCode::BAD_REQUEST {
            // Policy rejection carries the violation list
            return match serde_json::from_str::<Rejection>(&body) {
                Ok(rejection) => Ok(SubmitResponse::Rejected {
                    violations: rejection.violations,
                }),
                Err(_) => Err(ApiError::InvalidResponse(format!(
                    "submit run: rejected without violations: {}",
                    error_detail(&body)
                ))),
            };
        }
        if !status.is_success() {
            return Err(status_error(status, &body, "submit run"));
        }
        decode_body(&body)
    }

    async fn get_run_status(&self, run: RunId) -> Result<RunStatusReport, ApiError> {
        let url = self.endpoint(&["runs", &run.to_string()]);
        self.fetch(Method::GET, url, "get run status").await
    }
}
