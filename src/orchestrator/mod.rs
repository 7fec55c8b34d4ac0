// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Validation orchestrator
//!
//! A run goes through four stages:
//!
//! 1. collect the changed YAML files (paged change listing, or local files)
//! 2. resolve the project's YAML pipeline catalog, concurrently
//! 3. keep the pipelines whose source file changed
//! 4. preview each of them concurrently and aggregate the outcomes
//!
//! Only failing to enumerate changes or pipelines stops a run, and even
//! then the caller gets a report with one run-level failure entry.

mod catalog;
mod changes;
mod dispatch;
mod fanout;
mod matcher;
mod report;

pub use catalog::{list_all_pipelines, PipelineCatalog, PipelineDefinition};
pub use changes::{is_relevant_change, is_yaml_path, ChangeSetFetcher, YAML_EXTENSIONS};
pub use dispatch::{Dispatch, DispatchEvent, ValidationDispatcher, ValidationJob, ValidationOutcome};
pub use matcher::{match_pipelines, ChangedPathSet, PathMatching};
pub use report::{ResultAggregator, ValidationFailure, ValidationReport};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::RunSettings;
use crate::errors::{ValidatorError, ValidatorResult};
use crate::host::{HostApi, Revision};

/// Stage a run has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    FetchingChanges,
    ResolvingCatalog,
    /// Dispatching `count` previews
    Validating { count: usize },
}

/// Receives progress of a run
pub trait RunObserver: Send {
    fn stage(&mut self, _stage: RunStage) {}

    fn outcome(&mut self, _outcome: &ValidationOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// A file from the working tree validated in local mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Repository-rooted path, e.g. `/ci/build.yml`
    pub repo_path: String,
    pub content: String,
}

/// Runs the validation stages against a host
pub struct Orchestrator<H: ?Sized> {
    host: Arc<H>,
    project: String,
    settings: RunSettings,
}

impl<H> Orchestrator<H>
where
    H: HostApi + ?Sized + 'static,
{
    pub fn new(host: Arc<H>, project: impl Into<String>, settings: RunSettings) -> Self {
        Self {
            host,
            project: project.into(),
            settings,
        }
    }

    /// Validate every pipeline affected by a pull request revision
    ///
    /// Previews run against `ref_name` using the committed content.
    pub async fn validate_revision(
        &self,
        revision: &Revision,
        ref_name: &str,
        cancel: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> ValidationReport {
        observer.stage(RunStage::FetchingChanges);
        let fetcher = ChangeSetFetcher::new(self.settings.change_page_size);
        let changed = match until_cancelled(cancel, fetcher.fetch(&*self.host, revision)).await {
            Ok(changed) => changed,
            Err(e) => return run_failed(e),
        };
        info!("{} changed YAML file(s) in {}", changed.len(), revision);

        let changed = ChangedPathSet::new(changed, self.settings.path_matching);
        if changed.is_empty() {
            return ValidationReport::empty();
        }

        let matched = match self.matched_pipelines(&changed, cancel, observer).await {
            Ok(matched) => matched,
            Err(e) => return run_failed(e),
        };

        let jobs = matched.into_iter().map(ValidationJob::committed).collect();
        self.run_jobs(jobs, ref_name, cancel, observer).await
    }

    /// Validate local files against the pipelines defined by them
    ///
    /// Each matched pipeline is previewed with its file's local content.
    pub async fn validate_local(
        &self,
        files: Vec<LocalFile>,
        ref_name: &str,
        cancel: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> ValidationReport {
        let mode = self.settings.path_matching;
        let changed = ChangedPathSet::new(files.iter().map(|f| f.repo_path.as_str()), mode);
        if changed.is_empty() {
            return ValidationReport::empty();
        }

        let matched = match self.matched_pipelines(&changed, cancel, observer).await {
            Ok(matched) => matched,
            Err(e) => return run_failed(e),
        };

        let contents: HashMap<String, String> = files
            .into_iter()
            .map(|f| (mode.key(&f.repo_path).into_owned(), f.content))
            .collect();

        let jobs = matched
            .into_iter()
            .map(|pipeline| {
                let content = contents.get(mode.key(&pipeline.source_path).as_ref()).cloned();
                match content {
                    Some(content) => ValidationJob::with_override(pipeline, content),
                    None => ValidationJob::committed(pipeline),
                }
            })
            .collect();
        self.run_jobs(jobs, ref_name, cancel, observer).await
    }

    async fn matched_pipelines(
        &self,
        changed: &ChangedPathSet,
        cancel: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> ValidatorResult<Vec<PipelineDefinition>> {
        observer.stage(RunStage::ResolvingCatalog);
        let catalog = PipelineCatalog::resolve(
            Arc::clone(&self.host),
            &self.project,
            self.settings.pipeline_page_size,
            self.settings.max_in_flight,
            cancel,
        )
        .await?;

        let matched = match_pipelines(catalog.definitions(), changed);
        info!(
            "{} of {} pipeline(s) use a changed file",
            matched.len(),
            catalog.len()
        );
        Ok(matched)
    }

    async fn run_jobs(
        &self,
        jobs: Vec<ValidationJob>,
        ref_name: &str,
        cancel: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> ValidationReport {
        if jobs.is_empty() {
            return ValidationReport::empty();
        }

        observer.stage(RunStage::Validating { count: jobs.len() });
        let dispatcher = ValidationDispatcher::new(
            Arc::clone(&self.host),
            self.project.clone(),
            self.settings.max_in_flight,
        );
        let dispatch = dispatcher.dispatch(jobs, ref_name, cancel);
        ResultAggregator::collect(dispatch, |outcome| observer.outcome(outcome)).await
    }
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, work: F) -> ValidatorResult<T>
where
    F: Future<Output = ValidatorResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ValidatorError::Cancelled),
        result = work => result,
    }
}

fn run_failed(e: ValidatorError) -> ValidationReport {
    if !e.is_cancelled() {
        error!("{}", e);
    }
    ValidationReport::from_run_error(e)
}
