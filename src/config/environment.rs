// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Connection settings
//!
//! Credentials and the pull request environment provided by an
//! Azure Pipelines job.

use std::fmt;

use crate::errors::{ValidatorError, ValidatorResult};

/// Organization URL of the running job
pub const ENV_COLLECTION_URI: &str = "SYSTEM_TEAMFOUNDATIONCOLLECTIONURI";
/// Job access token (must be mapped into the step explicitly)
pub const ENV_ACCESS_TOKEN: &str = "SYSTEM_ACCESSTOKEN";
/// Project name
pub const ENV_PROJECT: &str = "SYSTEM_TEAMPROJECT";
/// Ref the build runs on (the PR merge ref)
pub const ENV_SOURCE_BRANCH: &str = "BUILD_SOURCEBRANCH";
/// Repository id
pub const ENV_REPOSITORY_ID: &str = "BUILD_REPOSITORY_ID";
/// Pull request id
pub const ENV_PULL_REQUEST_ID: &str = "SYSTEM_PULLREQUEST_PULLREQUESTID";

/// Opaque credential attached to every request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth token, sent as `Authorization: Bearer`
    Bearer(String),
    /// Personal access token, sent as basic auth with an empty user
    Pat(String),
}

impl Credential {
    /// Build from the mutually exclusive `--bearer` / `--pat` flags
    pub fn from_flags(bearer: Option<String>, pat: Option<String>) -> ValidatorResult<Self> {
        match (bearer, pat) {
            (Some(token), None) if !token.is_empty() => Ok(Self::Bearer(token)),
            (None, Some(token)) if !token.is_empty() => Ok(Self::Pat(token)),
            (Some(_), Some(_)) => Err(ValidatorError::invalid_config(
                "--bearer and --pat cannot be used together",
                None,
            )),
            _ => Err(ValidatorError::MissingCredential),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Pat(_) => f.write_str("Pat(***)"),
        }
    }
}

/// Lowercase and strip trailing slashes from an organization URL
pub fn normalize_org_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

/// Build the organization URL for an organization name
pub fn org_url(organization: &str) -> String {
    format!("https://dev.azure.com/{}", organization)
}

/// Everything PR mode needs, read from the job environment
#[derive(Debug, Clone)]
pub struct PrEnvironment {
    pub organization_url: String,
    pub project: String,
    pub run_branch: String,
    pub repository_id: String,
    pub pull_request_id: u32,
    pub credential: Credential,
}

impl PrEnvironment {
    /// Read the process environment
    pub fn from_env() -> ValidatorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> ValidatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| -> ValidatorResult<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ValidatorError::missing_env(name))
        };

        let organization_url = normalize_org_url(&require(ENV_COLLECTION_URI)?);
        let token = require(ENV_ACCESS_TOKEN)?;
        let project = require(ENV_PROJECT)?;
        let run_branch = require(ENV_SOURCE_BRANCH)?;
        let repository_id = require(ENV_REPOSITORY_ID)?;

        let raw_pr = require(ENV_PULL_REQUEST_ID)?;
        let pull_request_id = raw_pr
            .parse::<u32>()
            .map_err(|e| ValidatorError::InvalidEnvVar {
                name: ENV_PULL_REQUEST_ID.to_string(),
                value: raw_pr.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            organization_url,
            project,
            run_branch,
            repository_id,
            pull_request_id,
            credential: Credential::Bearer(token),
        })
    }
}
