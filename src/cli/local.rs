// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Local command - validate working tree YAML before pushing

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::git::{AzureRemote, Git};
use super::output::{exit_code, print_report, ConsoleObserver, EXIT_SUCCESS};
use super::{branch_ref, cancellation, LocalArgs};
use crate::config::{org_url, Credential, RunSettings};
use crate::errors::{ValidatorError, ValidatorResult};
use crate::host::AzureDevOpsClient;
use crate::orchestrator::{is_yaml_path, LocalFile, Orchestrator};
use crate::utils::print_info;

/// Run the local command
pub async fn run(args: LocalArgs, settings: RunSettings, verbose: bool) -> ValidatorResult<u8> {
    let credential = Credential::from_flags(args.bearer, args.pat)?;
    let cwd = std::env::current_dir()?;
    let git = Git::locate().ok();

    let remote = match (args.org, args.project, args.repo) {
        (Some(organization), Some(project), Some(repository)) => AzureRemote {
            organization,
            project,
            repository,
        },
        _ => {
            let url = require_git(git.as_ref())?.origin_url(&cwd).await?;
            AzureRemote::parse(&url)?
        }
    };
    debug!("Using {:?}", remote);

    let organization_url = if remote.organization.contains("://") {
        remote.organization.clone()
    } else {
        org_url(&remote.organization)
    };
    let client = AzureDevOpsClient::new(&organization_url, credential, settings.request_timeout)?;

    let repository_id = client
        .repository_id(&remote.project, &remote.repository)
        .await
        .map_err(|source| ValidatorError::RepositoryLookup {
            name: remote.repository.clone(),
            source,
        })?
        .ok_or_else(|| ValidatorError::RepositoryNotFound {
            name: remote.repository.clone(),
            project: remote.project.clone(),
        })?;
    debug!("Repository '{}' has id {}", remote.repository, repository_id);

    let root = match &git {
        Some(git) => git.toplevel(&cwd).await.unwrap_or_else(|_| cwd.clone()),
        None => cwd.clone(),
    };

    let paths = if args.files.is_empty() {
        let changed = require_git(git.as_ref())?
            .changed_files(&root, &args.branch)
            .await?;
        changed
            .into_iter()
            .filter(|p| is_yaml_path(p))
            .map(|p| root.join(p))
            .filter(|p| p.exists())
            .collect()
    } else {
        keep_yaml(resolve_globs(&args.files, &cwd)?)
    };

    let files = read_local_files(&root, &paths).await?;
    if files.is_empty() {
        print_info("No YAML files to validate");
        return Ok(EXIT_SUCCESS);
    }

    let ref_name = branch_ref(&args.branch);
    println!(
        "{} {} file(s) of {}/{} against {}",
        "Validating".bold(),
        files.len(),
        remote.project.cyan(),
        remote.repository.cyan(),
        ref_name
    );
    if verbose {
        for file in &files {
            println!("  {}", file.repo_path.dimmed());
        }
    }
    println!();

    let cancel = cancellation(settings.run_timeout);
    let orchestrator = Orchestrator::new(Arc::new(client), remote.project.clone(), settings);
    let mut observer = ConsoleObserver::new(verbose);

    let report = orchestrator
        .validate_local(files, &ref_name, &cancel, &mut observer)
        .await;
    observer.finish();

    print_report(&report);
    Ok(exit_code(&report))
}

fn require_git(git: Option<&Git>) -> ValidatorResult<&Git> {
    git.ok_or_else(|| ValidatorError::ToolNotFound {
        tool: "git".to_string(),
    })
}

/// Resolve glob patterns to file paths
pub fn resolve_globs(patterns: &[String], base_dir: &Path) -> ValidatorResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            base_dir.join(pattern).to_string_lossy().to_string()
        };

        let matches: Vec<_> = glob::glob(&full_pattern)?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();

        if matches.is_empty() {
            return Err(ValidatorError::NoInputFiles {
                pattern: pattern.to_string(),
            });
        }

        files.extend(matches);
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Drop non-YAML paths with a warning
pub fn keep_yaml(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| {
            let yaml = is_yaml_path(&path.to_string_lossy());
            if !yaml {
                warn!("Skipping {}: not a YAML file", path.display());
            }
            yaml
        })
        .collect()
}

/// Repository-rooted form of `file`, e.g. `/ci/build.yml`
pub fn repo_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}

/// Read files under `root`; files outside it are skipped
pub async fn read_local_files(root: &Path, paths: &[PathBuf]) -> ValidatorResult<Vec<LocalFile>> {
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut files = Vec::with_capacity(paths.len());

    for path in paths {
        let absolute = std::fs::canonicalize(path).map_err(|e| ValidatorError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        let Some(rooted) = repo_path(&root, &absolute) else {
            warn!("Skipping {}: outside {}", path.display(), root.display());
            continue;
        };

        let content = tokio::fs::read_to_string(&absolute)
            .await
            .map_err(|e| ValidatorError::FileReadError {
                path: path.clone(),
                error: e.to_string(),
            })?;

        files.push(LocalFile {
            repo_path: rooted,
            content,
        });
    }

    Ok(files)
}
