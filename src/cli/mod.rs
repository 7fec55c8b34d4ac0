// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipeval.

pub mod git;
pub mod local;
pub mod output;
pub mod pr;

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{RunSettings, SettingsLayer};
use crate::errors::ValidatorResult;
use crate::orchestrator::PathMatching;

/// Dry-run validation of Azure Pipelines YAML
///
/// Finds the pipelines whose YAML file changed and asks Azure DevOps to
/// preview each of them without queuing a run.
#[derive(Parser, Debug)]
#[clap(
    name = "pipeval",
    version,
    about = "Dry-run validation of Azure Pipelines YAML touched by a change",
    long_about = None,
    after_help = "Examples:\n\
        pipeval pr                               Validate pipelines changed by the current PR build\n\
        pipeval local --pat $PAT                 Validate YAML files changed against master\n\
        pipeval local --pat $PAT ci/*.yml        Validate specific files\n\n\
        See 'pipeval <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Settings file (defaults to .pipeval.yaml when present)
    #[clap(long, global = true, value_name = "FILE", env = "PIPEVAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum concurrent requests per stage
    #[clap(long, global = true, value_name = "N", env = "PIPEVAL_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Cancel the run after this many seconds
    #[clap(long, global = true, value_name = "SECS", env = "PIPEVAL_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Compare paths ignoring case, leading '/' and separator style
    #[clap(long, global = true)]
    pub normalize_paths: bool,
}

impl Cli {
    /// Settings given on the command line or through the environment
    pub fn settings_layer(&self) -> SettingsLayer {
        SettingsLayer {
            max_in_flight: self.max_in_flight,
            path_matching: self.normalize_paths.then_some(PathMatching::Normalized),
            run_timeout_secs: self.timeout,
            ..SettingsLayer::default()
        }
    }

    /// Defaults, then the settings file, then flags
    pub fn load_settings(&self, dir: &Path) -> ValidatorResult<RunSettings> {
        let mut settings = RunSettings::default();
        if let Some(file) = SettingsLayer::discover(dir, self.config.as_deref())? {
            settings = settings.apply(&file);
        }
        settings.apply(&self.settings_layer()).validated()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the pipelines affected by the pull request of this build
    ///
    /// Reads its configuration from the Azure Pipelines job environment.
    /// SYSTEM_ACCESSTOKEN must be mapped into the step.
    Pr,

    /// Validate local YAML files against the pipelines that use them
    Local(LocalArgs),
}

#[derive(Args, Debug, Clone)]
#[clap(group(ArgGroup::new("credential").required(true).args(["bearer", "pat"])))]
pub struct LocalArgs {
    /// Files or glob patterns (default: YAML files changed against --branch)
    pub files: Vec<String>,

    /// Organization name, or its URL (default: parsed from the origin remote)
    #[clap(long, requires_all = ["project", "repo"])]
    pub org: Option<String>,

    /// Project name
    #[clap(long, requires_all = ["org", "repo"])]
    pub project: Option<String>,

    /// Repository name
    #[clap(long, requires_all = ["org", "project"])]
    pub repo: Option<String>,

    /// Branch to compare with and to validate against
    #[clap(long, default_value = "master")]
    pub branch: String,

    /// OAuth token
    #[clap(long, env = "PIPEVAL_BEARER", hide_env_values = true)]
    pub bearer: Option<String>,

    /// Personal access token
    #[clap(long, env = "PIPEVAL_PAT", hide_env_values = true)]
    pub pat: Option<String>,
}

/// Token cancelled on Ctrl-C or when `timeout` elapses
pub fn cancellation(timeout: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();

    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    if let Some(limit) = timeout {
        let on_timeout = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!("Run timeout of {}s elapsed, cancelling", limit.as_secs());
                    on_timeout.cancel();
                }
                _ = on_timeout.cancelled() => {}
            }
        });
    }

    token
}

/// Ref a branch name refers to
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_local_requires_one_credential() {
        assert!(Cli::try_parse_from(["pipeval", "local"]).is_err());
        assert!(Cli::try_parse_from(["pipeval", "local", "--pat", "p", "--bearer", "b"]).is_err());

        let cli = Cli::try_parse_from(["pipeval", "local", "--pat", "p"]).unwrap();
        match cli.command {
            Commands::Local(args) => {
                assert_eq!(args.pat.as_deref(), Some("p"));
                assert_eq!(args.branch, "master");
                assert!(args.files.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_org_project_repo_go_together() {
        assert!(Cli::try_parse_from(["pipeval", "local", "--pat", "p", "--org", "contoso"]).is_err());
        assert!(Cli::try_parse_from([
            "pipeval", "local", "--pat", "p", "--org", "contoso", "--project", "Fabrikam", "--repo",
            "infra",
        ])
        .is_ok());
    }

    #[test]
    fn test_flags_override_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".pipeval.yaml"),
            "max_in_flight: 2\npipeline_page_size: 50\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(["pipeval", "--max-in-flight", "5", "--normalize-paths", "pr"])
            .unwrap();
        let settings = cli.load_settings(dir.path()).unwrap();

        assert_eq!(settings.max_in_flight, 5);
        assert_eq!(settings.pipeline_page_size, 50);
        assert_eq!(settings.path_matching, PathMatching::Normalized);
    }

    #[test]
    fn test_branch_ref() {
        assert_eq!(branch_ref("master"), "refs/heads/master");
        assert_eq!(branch_ref("feature/x"), "refs/heads/feature/x");
        assert_eq!(branch_ref("refs/pull/3/merge"), "refs/pull/3/merge");
    }
}
