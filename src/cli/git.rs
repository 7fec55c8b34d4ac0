// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Git helpers for local mode

use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::errors::{ValidatorError, ValidatorResult};

/// Organization, project and repository named by an Azure Repos remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureRemote {
    pub organization: String,
    pub project: String,
    pub repository: String,
}

impl AzureRemote {
    /// Parse an Azure Repos remote URL
    ///
    /// Accepts the forms git prints for `origin`:
    ///
    /// - `https://[user@]dev.azure.com/{org}/{project}/_git/{repo}`
    /// - `git@ssh.dev.azure.com:v3/{org}/{project}/{repo}`
    /// - `https://{org}.visualstudio.com/[DefaultCollection/]{project}/_git/{repo}`
    pub fn parse(url: &str) -> ValidatorResult<Self> {
        let url = url.trim();
        let unrecognized = || ValidatorError::UnrecognizedRemote {
            url: url.to_string(),
        };

        let patterns = [
            r"^https://(?:[^@/]+@)?dev\.azure\.com/(?P<org>[^/]+)/(?P<project>[^/]+)/_git/(?P<repo>[^/]+?)/?$",
            r"^(?:ssh://)?[^@]+@(?:vs-)?ssh\.dev\.azure\.com[:/]v3/(?P<org>[^/]+)/(?P<project>[^/]+)/(?P<repo>[^/]+?)/?$",
            r"^https://(?:[^@/]+@)?(?P<org>[^./]+)\.visualstudio\.com/(?:DefaultCollection/)?(?P<project>[^/]+)/_git/(?P<repo>[^/]+?)/?$",
        ];

        for pattern in patterns {
            let re = Regex::new(pattern).map_err(|_| unrecognized())?;
            if let Some(caps) = re.captures(url) {
                return Ok(Self {
                    organization: decode(&caps["org"]),
                    project: decode(&caps["project"]),
                    repository: decode(&caps["repo"]),
                });
            }
        }

        Err(unrecognized())
    }
}

fn decode(segment: &str) -> String {
    segment.replace("%20", " ")
}

/// The `git` executable
pub struct Git {
    bin: PathBuf,
}

impl Git {
    /// Locate git on the PATH
    pub fn locate() -> ValidatorResult<Self> {
        let bin = which::which("git").map_err(|_| ValidatorError::ToolNotFound {
            tool: "git".to_string(),
        })?;
        Ok(Self { bin })
    }

    /// URL of the `origin` remote
    pub async fn origin_url(&self, dir: &Path) -> ValidatorResult<String> {
        self.run(dir, &["remote", "get-url", "origin"]).await
    }

    /// Absolute path of the working tree root
    pub async fn toplevel(&self, dir: &Path) -> ValidatorResult<PathBuf> {
        self.run(dir, &["rev-parse", "--show-toplevel"])
            .await
            .map(PathBuf::from)
    }

    /// Files that differ from `branch`, relative to the working tree root
    pub async fn changed_files(&self, dir: &Path, branch: &str) -> ValidatorResult<Vec<String>> {
        let output = self.run(dir, &["diff", "--name-only", branch]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> ValidatorResult<String> {
        tracing::debug!("git {}", args.join(" "));

        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| ValidatorError::GitFailed {
                command: args.join(" "),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ValidatorError::GitFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
