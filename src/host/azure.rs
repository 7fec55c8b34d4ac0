// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Azure DevOps REST client
//!
//! Implements [`HostApi`] on top of the Azure DevOps REST API 7.0.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{
    ChangePage, ChangeRecord, ChangeType, ConfigurationType, HostApi, PipelineDetail,
    PipelinePage, PipelineSummary, PreviewRequest, PreviewRun, Revision,
};
use crate::config::{normalize_org_url, Credential};
use crate::errors::{HostError, ValidatorError, ValidatorResult};

const API_VERSION: &str = "7.0";
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// HTTP client for one Azure DevOps organization
#[derive(Clone)]
pub struct AzureDevOpsClient {
    base_url: Url,
    credential: Credential,
    client: Client,
}

impl AzureDevOpsClient {
    /// Create a client for an organization URL such as
    /// `https://dev.azure.com/contoso`
    pub fn new(
        organization_url: &str,
        credential: Credential,
        request_timeout: Duration,
    ) -> ValidatorResult<Self> {
        let normalized = normalize_org_url(organization_url);
        let base_url = Url::parse(&normalized).map_err(|e| {
            ValidatorError::invalid_config(
                format!("invalid organization URL '{}': {}", organization_url, e),
                Some("Expected a URL like https://dev.azure.com/<organization>"),
            )
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ValidatorError::invalid_config(
                format!("invalid organization URL '{}'", organization_url),
                None,
            ));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("pipeval/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ValidatorError::invalid_config(format!("HTTP client: {}", e), None))?;

        Ok(Self {
            base_url,
            credential,
            client,
        })
    }

    /// Organization URL this client talks to
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Id of the newest iteration of a pull request
    pub async fn latest_iteration(
        &self,
        repository_id: &str,
        pull_request_id: u32,
    ) -> Result<u32, HostError> {
        let pr = pull_request_id.to_string();
        let url = self.endpoint(&[
            "_apis",
            "git",
            "repositories",
            repository_id,
            "pullRequests",
            pr.as_str(),
            "iterations",
        ])?;

        let response = self.send(self.client.get(url)).await?;
        let list: WireList<WireIteration> = Self::handle_response(response).await?;

        list.value
            .iter()
            .map(|it| it.id)
            .max()
            .ok_or_else(|| HostError::Parse(format!("pull request {} has no iterations", pr)))
    }

    /// Id of a repository looked up by name; `None` when it does not exist
    pub async fn repository_id(&self, project: &str, name: &str) -> Result<Option<String>, HostError> {
        let url = self.endpoint(&[project, "_apis", "git", "repositories", name])?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let repo: WireRepository = Self::handle_response(response).await?;
        Ok(Some(repo.id))
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HostError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HostError::Parse(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, HostError> {
        let request = match &self.credential {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::Pat(token) => request.basic_auth("", Some(token)),
        };

        request
            .header("X-TFS-FedAuthRedirect", "Suppress")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(HostError::from)
    }

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, HostError> {
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HostError::api(status.as_u16(), error_message(&body)));
        }

        response
            .json()
            .await
            .map_err(|e| HostError::Parse(format!("Failed to parse JSON response: {}", e)))
    }
}

impl std::fmt::Debug for AzureDevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsClient")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .finish()
    }
}

/// Pull the `message` out of an Azure error body, or return the body
fn error_message(body: &str) -> String {
    serde_json::from_str::<WireError>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl HostApi for AzureDevOpsClient {
    async fn get_changes(
        &self,
        revision: &Revision,
        skip: u32,
        top: u32,
    ) -> Result<ChangePage, HostError> {
        let pr = revision.pull_request_id.to_string();
        let iteration = revision.iteration_id.to_string();
        let mut url = self.endpoint(&[
            "_apis",
            "git",
            "repositories",
            revision.repository_id.as_str(),
            "pullRequests",
            pr.as_str(),
            "iterations",
            iteration.as_str(),
            "changes",
        ])?;
        url.query_pairs_mut()
            .append_pair("$top", &top.to_string())
            .append_pair("$skip", &skip.to_string());

        tracing::debug!("GET changes of {} (skip {}, top {})", revision, skip, top);
        let response = self.send(self.client.get(url)).await?;
        let wire: WireIterationChanges = Self::handle_response(response).await?;

        let entries = wire
            .change_entries
            .into_iter()
            .filter_map(|change| {
                let path = change
                    .source_server_item
                    .or_else(|| change.item.and_then(|item| item.path))?;
                let change_type = change
                    .change_type
                    .map(ChangeType::from)
                    .unwrap_or(ChangeType::Other(String::new()));
                Some(ChangeRecord { path, change_type })
            })
            .collect();

        Ok(ChangePage {
            entries,
            next_skip: wire.next_skip,
            next_top: wire.next_top,
        })
    }

    async fn list_pipelines(
        &self,
        project: &str,
        top: u32,
        continuation_token: Option<&str>,
    ) -> Result<PipelinePage, HostError> {
        let mut url = self.endpoint(&[project, "_apis", "pipelines"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("$top", &top.to_string());
            if let Some(token) = continuation_token {
                query.append_pair("continuationToken", token);
            }
        }

        tracing::debug!("GET pipelines of '{}' (top {})", project, top);
        let response = self.send(self.client.get(url)).await?;
        let continuation = response
            .headers()
            .get(CONTINUATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|v| !v.is_empty());

        let list: WireList<WirePipeline> = Self::handle_response(response).await?;
        let pipelines = list
            .value
            .into_iter()
            .map(|p| PipelineSummary {
                id: p.id,
                configuration_type: p.configuration.and_then(|c| c.kind),
            })
            .collect();

        Ok(PipelinePage {
            pipelines,
            continuation_token: continuation,
        })
    }

    async fn get_pipeline_detail(
        &self,
        project: &str,
        id: u32,
    ) -> Result<PipelineDetail, HostError> {
        let id_segment = id.to_string();
        let url = self.endpoint(&[project, "_apis", "pipelines", id_segment.as_str()])?;

        tracing::debug!("GET pipeline {}", id);
        let response = self.send(self.client.get(url)).await?;
        let wire: WirePipelineDetail = Self::handle_response(response).await?;

        let source_path = wire
            .configuration
            .and_then(|c| c.path)
            .or_else(|| wire.process.and_then(|p| p.yaml_filename))
            .unwrap_or_default();

        Ok(PipelineDetail { source_path })
    }

    async fn preview_pipeline(
        &self,
        project: &str,
        id: u32,
        request: &PreviewRequest,
    ) -> Result<PreviewRun, HostError> {
        let id_segment = id.to_string();
        let url = self.endpoint(&[project, "_apis", "pipelines", id_segment.as_str(), "preview"])?;

        let body = PreviewBody::new(request);
        tracing::debug!("POST preview of pipeline {} at {}", id, request.ref_name);
        let response = self.send(self.client.post(url).json(&body)).await?;

        Self::handle_response(response).await
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Request body of the preview endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreviewBody<'a> {
    resources: RunResources<'a>,
    preview_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    yaml_override: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RunResources<'a> {
    repositories: HashMap<&'static str, RepositoryResource<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryResource<'a> {
    ref_name: &'a str,
}

impl<'a> PreviewBody<'a> {
    pub(crate) fn new(request: &'a PreviewRequest) -> Self {
        let repositories = HashMap::from([(
            "self",
            RepositoryResource {
                ref_name: &request.ref_name,
            },
        )]);

        Self {
            resources: RunResources { repositories },
            preview_run: true,
            yaml_override: request.yaml_override.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireIteration {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct WireRepository {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIterationChanges {
    #[serde(default)]
    change_entries: Vec<WireChange>,
    next_skip: Option<u32>,
    next_top: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChange {
    change_type: Option<String>,
    source_server_item: Option<String>,
    item: Option<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePipeline {
    id: u32,
    configuration: Option<WireConfiguration>,
}

#[derive(Debug, Deserialize)]
struct WireConfiguration {
    #[serde(rename = "type")]
    kind: Option<ConfigurationType>,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePipelineDetail {
    configuration: Option<WireConfiguration>,
    process: Option<WireProcess>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProcess {
    yaml_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> AzureDevOpsClient {
        AzureDevOpsClient::new(url, Credential::Pat("x".into()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_is_normalized() {
        assert_eq!(
            client("https://dev.azure.com/Contoso/").base_url(),
            "https://dev.azure.com/contoso"
        );
    }

    #[test]
    fn test_invalid_url_is_setup_error() {
        let err = AzureDevOpsClient::new("not a url", Credential::Pat("x".into()), Duration::from_secs(5))
            .unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = client("https://dev.azure.com/contoso")
            .endpoint(&["My Project", "_apis", "pipelines", "7"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/contoso/My%20Project/_apis/pipelines/7?api-version=7.0"
        );
    }

    #[test]
    fn test_preview_body_shape() {
        let request = PreviewRequest {
            ref_name: "refs/heads/main".into(),
            yaml_override: None,
        };
        let body = serde_json::to_value(PreviewBody::new(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "resources": { "repositories": { "self": { "refName": "refs/heads/main" } } },
                "previewRun": true
            })
        );

        let request = PreviewRequest {
            ref_name: "refs/heads/main".into(),
            yaml_override: Some("steps: []".into()),
        };
        let body = serde_json::to_value(PreviewBody::new(&request)).unwrap();
        assert_eq!(body["yamlOverride"], "steps: []");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"$id":"1","message":"/a.yml (Line: 3, Col: 1): Unexpected value 'stepz'","typeKey":"PipelineValidationException"}"#;
        assert_eq!(error_message(body), "/a.yml (Line: 3, Col: 1): Unexpected value 'stepz'");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }
}
