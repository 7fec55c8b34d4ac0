// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Pipeline catalog
//!
//! Lists the project's pipelines, keeps the YAML ones and resolves the
//! source file of each concurrently. A pipeline that fails to resolve is
//! logged and left out; it never fails the catalog.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::fanout::{FanOut, Next};
use crate::errors::{HostError, ValidatorError, ValidatorResult};
use crate::host::{HostApi, PipelineSummary};

/// A YAML pipeline and the file that defines it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDefinition {
    pub id: u32,
    /// Never empty
    pub source_path: String,
}

/// Resolved YAML pipelines of a project, ordered by id
#[derive(Debug, Clone, Default)]
pub struct PipelineCatalog {
    definitions: Vec<PipelineDefinition>,
    unresolved: Vec<u32>,
}

impl PipelineCatalog {
    pub fn new(mut definitions: Vec<PipelineDefinition>) -> Self {
        definitions.sort_by_key(|d| d.id);
        Self {
            definitions,
            unresolved: Vec::new(),
        }
    }

    pub fn definitions(&self) -> &[PipelineDefinition] {
        &self.definitions
    }

    /// Ids of YAML pipelines that could not be resolved
    pub fn unresolved(&self) -> &[u32] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Build the catalog of `project`
    ///
    /// Fails only when the pipeline listing fails or the run is cancelled.
    pub async fn resolve<H>(
        host: Arc<H>,
        project: &str,
        page_size: u32,
        max_in_flight: usize,
        cancel: &CancellationToken,
    ) -> ValidatorResult<Self>
    where
        H: HostApi + ?Sized + 'static,
    {
        let listing = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ValidatorError::Cancelled),
            listing = list_all_pipelines(&*host, project, page_size) => listing,
        };
        let all = listing.map_err(|source| ValidatorError::PipelineListing {
            project: project.to_string(),
            source,
        })?;

        let yaml_ids: Vec<u32> = all.iter().filter(|p| p.is_yaml()).map(|p| p.id).collect();
        debug!(
            "{} pipeline(s) in '{}', {} configured as YAML",
            all.len(),
            project,
            yaml_ids.len()
        );

        let project_owned = project.to_string();
        let mut fan = FanOut::spawn(yaml_ids, max_in_flight, cancel, move |id| {
            let host = Arc::clone(&host);
            let project = project_owned.clone();
            async move { resolve_one(&*host, &project, id).await }
        });

        let mut definitions = Vec::with_capacity(fan.expected());
        let mut unresolved = Vec::new();

        loop {
            match fan.next().await {
                Next::Item(Ok(definition)) => definitions.push(definition),
                Next::Item(Err((id, error))) => {
                    warn!("Skipping pipeline {}: {}", id, error);
                    unresolved.push(id);
                }
                Next::Done => break,
                Next::Cancelled => return Err(ValidatorError::Cancelled),
            }
        }

        if fan.lost() > 0 {
            warn!("{} pipeline resolution(s) ended without a result", fan.lost());
        }

        let mut catalog = Self::new(definitions);
        unresolved.sort_unstable();
        catalog.unresolved = unresolved;
        Ok(catalog)
    }
}

/// Page through the pipeline listing until no continuation token is returned
pub async fn list_all_pipelines<H>(
    host: &H,
    project: &str,
    page_size: u32,
) -> Result<Vec<PipelineSummary>, HostError>
where
    H: HostApi + ?Sized,
{
    let mut all = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = host
            .list_pipelines(project, page_size, token.as_deref())
            .await?;
        all.extend(page.pipelines);

        match page.continuation_token {
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(HostError::Parse(format!(
                    "pipeline listing repeated continuation token '{}'",
                    next
                )));
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(all)
}

async fn resolve_one<H>(
    host: &H,
    project: &str,
    id: u32,
) -> Result<PipelineDefinition, (u32, ValidatorError)>
where
    H: HostApi + ?Sized,
{
    let detail = host
        .get_pipeline_detail(project, id)
        .await
        .map_err(|source| (id, ValidatorError::Resolution { id, source }))?;

    if detail.source_path.trim().is_empty() {
        return Err((id, ValidatorError::EmptySourcePath { id }));
    }

    Ok(PipelineDefinition {
        id,
        source_path: detail.source_path,
    })
}
