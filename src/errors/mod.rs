// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Error types
//!
//! Setup and fetch errors abort a run; resolution and validation errors are
//! isolated to the pipeline they belong to.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeval operations
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Errors raised by the Host API transport
#[derive(Error, Debug, Diagnostic)]
pub enum HostError {
    #[error("HTTP request failed: {0}")]
    #[diagnostic(code(pipeval::host::request))]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    #[diagnostic(code(pipeval::host::api))]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    #[diagnostic(code(pipeval::host::parse))]
    Parse(String),
}

impl HostError {
    /// Create an API error from status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// The service evaluated the submitted YAML and refused it (400 or 422).
    /// Auth failures and missing resources are not rejections.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status: 400 | 422, .. })
    }
}

/// Main error type for pipeval
#[derive(Error, Debug, Diagnostic)]
pub enum ValidatorError {
    // ─────────────────────────────────────────────────────────────────────────
    // Setup Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Environment variable '{name}' is not set")]
    #[diagnostic(
        code(pipeval::missing_env),
        help("'pipeval pr' must run inside an Azure Pipelines job triggered by a pull request")
    )]
    MissingEnvVar { name: String },

    #[error("Environment variable '{name}' has an invalid value '{value}': {reason}")]
    #[diagnostic(code(pipeval::invalid_env))]
    InvalidEnvVar {
        name: String,
        value: String,
        reason: String,
    },

    #[error("No credential given")]
    #[diagnostic(
        code(pipeval::missing_credential),
        help("Pass either --bearer <TOKEN> or --pat <TOKEN>")
    )]
    MissingCredential,

    #[error("Repository '{name}' not found in project '{project}'")]
    #[diagnostic(
        code(pipeval::repository_not_found),
        help("Check the --repo value; repository names are matched exactly")
    )]
    RepositoryNotFound { name: String, project: String },

    #[error("Could not parse an Azure DevOps remote from '{url}'")]
    #[diagnostic(
        code(pipeval::unrecognized_remote),
        help("Pass --org, --project and --repo explicitly")
    )]
    UnrecognizedRemote { url: String },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(
        code(pipeval::tool_not_found),
        help("Install {tool} and ensure it's in your PATH, or list the files to validate explicitly")
    )]
    ToolNotFound { tool: String },

    #[error("git {command} failed: {stderr}")]
    #[diagnostic(code(pipeval::git_failed))]
    GitFailed { command: String, stderr: String },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(pipeval::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipeval::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("No files matched pattern: {pattern}")]
    #[diagnostic(code(pipeval::no_input_files))]
    NoInputFiles { pattern: String },

    #[error("Could not resolve the latest iteration of pull request {pull_request_id}: {source}")]
    #[diagnostic(code(pipeval::iteration_lookup))]
    IterationLookup {
        pull_request_id: u32,
        #[source]
        source: HostError,
    },

    #[error("Could not look up repository '{name}': {source}")]
    #[diagnostic(code(pipeval::repository_lookup))]
    RepositoryLookup {
        name: String,
        #[source]
        source: HostError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Fetch Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to get changed files for {revision}: {source}")]
    #[diagnostic(code(pipeval::change_listing))]
    ChangeListing {
        revision: String,
        #[source]
        source: HostError,
    },

    #[error("Failed to list pipelines in project '{project}': {source}")]
    #[diagnostic(code(pipeval::pipeline_listing))]
    PipelineListing {
        project: String,
        #[source]
        source: HostError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Per-pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to resolve pipeline {id}: {source}")]
    #[diagnostic(code(pipeval::resolution_failed))]
    Resolution {
        id: u32,
        #[source]
        source: HostError,
    },

    #[error("Pipeline {id} has no YAML source path")]
    #[diagnostic(code(pipeval::empty_source_path))]
    EmptySourcePath { id: u32 },

    #[error("Preview rejected (status {status}): {message}")]
    #[diagnostic(code(pipeval::preview_rejected))]
    PreviewRejected { status: u16, message: String },

    #[error("Preview request failed: {source}")]
    #[diagnostic(code(pipeval::preview_transport))]
    PreviewTransport {
        #[source]
        source: HostError,
    },

    #[error("Validation task for pipeline {id} did not finish: {message}")]
    #[diagnostic(code(pipeval::worker_lost))]
    WorkerLost { id: u32, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Run Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Run cancelled")]
    #[diagnostic(code(pipeval::cancelled))]
    Cancelled,

    #[error("IO error: {message}")]
    #[diagnostic(code(pipeval::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipeval::yaml_error))]
    Yaml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(pipeval::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for ValidatorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ValidatorError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for ValidatorError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl ValidatorError {
    /// Classify a failed preview call
    ///
    /// Only a [`HostError::is_rejection`] answer blames the YAML; anything
    /// else, 401/403/404 included, is a transport problem.
    pub fn from_preview(error: HostError) -> Self {
        if !error.is_rejection() {
            return Self::PreviewTransport { source: error };
        }
        match error {
            HostError::Api { status, message } => Self::PreviewRejected { status, message },
            other => Self::PreviewTransport { source: other },
        }
    }

    /// Whether this error happened before any validation could start
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEnvVar { .. }
                | Self::InvalidEnvVar { .. }
                | Self::MissingCredential
                | Self::RepositoryNotFound { .. }
                | Self::UnrecognizedRemote { .. }
                | Self::ToolNotFound { .. }
                | Self::GitFailed { .. }
                | Self::InvalidConfig { .. }
                | Self::FileReadError { .. }
                | Self::NoInputFiles { .. }
                | Self::IterationLookup { .. }
                | Self::RepositoryLookup { .. }
                | Self::Yaml { .. }
                | Self::GlobPattern { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a missing environment variable error
    pub fn missing_env(name: &str) -> Self {
        Self::MissingEnvVar {
            name: name.to_string(),
        }
    }

    /// Create an invalid configuration error with a hint
    pub fn invalid_config(reason: impl Into<String>, help: Option<&str>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
            help: help.map(str::to_string),
        }
    }
}
