// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Host API
//!
//! The remote service the orchestrator talks to: changed files of a
//! revision, the project's pipeline list, pipeline details and the
//! preview (dry-run) endpoint. Credentials live inside the implementation.

mod azure;
#[cfg(test)]
pub(crate) mod fake;

pub use azure::AzureDevOpsClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::HostError;

/// A pull request revision: one iteration (push) of a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Repository id (GUID)
    pub repository_id: String,
    pub pull_request_id: u32,
    pub iteration_id: u32,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pull request {} iteration {}",
            self.pull_request_id, self.iteration_id
        )
    }
}

/// Kind of change applied to a file
///
/// The service reports flag combinations such as `"edit, rename"`; any
/// combination containing `delete` is a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ChangeType {
    Add,
    Edit,
    Delete,
    Rename,
    Other(String),
}

impl From<String> for ChangeType {
    fn from(raw: String) -> Self {
        let flags: Vec<&str> = raw.split(',').map(str::trim).collect();

        if flags.iter().any(|f| f.eq_ignore_ascii_case("delete")) {
            return Self::Delete;
        }

        match flags.first().map(|f| f.to_ascii_lowercase()).as_deref() {
            Some("add") => Self::Add,
            Some("edit") => Self::Edit,
            Some("rename") => Self::Rename,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for ChangeType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

/// One changed file in a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub path: String,
    pub change_type: ChangeType,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, change_type: impl Into<ChangeType>) -> Self {
        Self {
            path: path.into(),
            change_type: change_type.into(),
        }
    }
}

/// One page of changed files plus the cursor for the next page
#[derive(Debug, Clone, Default)]
pub struct ChangePage {
    pub entries: Vec<ChangeRecord>,
    pub next_skip: Option<u32>,
    pub next_top: Option<u32>,
}

/// How a pipeline is configured
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ConfigurationType {
    Yaml,
    DesignerJson,
    Other(String),
}

impl From<String> for ConfigurationType {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "yaml" => Self::Yaml,
            "designerjson" | "designerhyphenjson" => Self::DesignerJson,
            _ => Self::Other(raw),
        }
    }
}

/// Pipeline as returned by the project listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub id: u32,
    pub configuration_type: Option<ConfigurationType>,
}

impl PipelineSummary {
    pub fn is_yaml(&self) -> bool {
        self.configuration_type == Some(ConfigurationType::Yaml)
    }
}

/// One page of the pipeline listing
#[derive(Debug, Clone, Default)]
pub struct PipelinePage {
    pub pipelines: Vec<PipelineSummary>,
    /// Present when more pipelines follow
    pub continuation_token: Option<String>,
}

/// Resolved detail of a single pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDetail {
    pub source_path: String,
}

/// Parameters of a preview call
///
/// Preview calls never queue a run; the request always carries
/// `previewRun: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    /// Ref the `self` repository resource is evaluated at
    pub ref_name: String,
    /// Literal YAML that replaces the committed file
    pub yaml_override: Option<String>,
}

/// Preview response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRun {
    #[serde(default)]
    pub final_yaml: Option<String>,
}

/// Capability interface of the remote service
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Fetch one page of the files changed by a revision
    async fn get_changes(
        &self,
        revision: &Revision,
        skip: u32,
        top: u32,
    ) -> Result<ChangePage, HostError>;

    /// Fetch one page of the project's pipelines
    async fn list_pipelines(
        &self,
        project: &str,
        top: u32,
        continuation_token: Option<&str>,
    ) -> Result<PipelinePage, HostError>;

    /// Fetch the detail of one pipeline
    async fn get_pipeline_detail(&self, project: &str, id: u32)
        -> Result<PipelineDetail, HostError>;

    /// Dry-run a pipeline
    async fn preview_pipeline(
        &self,
        project: &str,
        id: u32,
        request: &PreviewRequest,
    ) -> Result<PreviewRun, HostError>;
}
