// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Scriptable in-memory host for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    ChangePage, ChangeRecord, ConfigurationType, HostApi, PipelineDetail, PipelinePage,
    PipelineSummary, PreviewRequest, PreviewRun, Revision,
};
use crate::errors::HostError;

/// What a scripted call does
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Answer after an optional delay
    Succeed(Duration),
    /// Answer with an API error
    Fail(u16, String),
    /// Never answer
    Hang,
}

impl Behavior {
    pub(crate) fn immediate() -> Self {
        Self::Succeed(Duration::ZERO)
    }

    async fn play(&self) -> Result<(), HostError> {
        match self {
            Self::Succeed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(())
            }
            Self::Fail(status, message) => Err(HostError::api(*status, message.clone())),
            Self::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeHost {
    change_pages: HashMap<u32, Result<ChangePage, u16>>,
    pipeline_pages: HashMap<Option<String>, Result<PipelinePage, u16>>,
    details: HashMap<u32, (String, Behavior)>,
    previews: HashMap<u32, Behavior>,

    pub(crate) change_calls: Mutex<Vec<(u32, u32)>>,
    pub(crate) detail_calls: Mutex<Vec<u32>>,
    pub(crate) preview_calls: Mutex<Vec<(u32, PreviewRequest)>>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve a change page at `skip`
    pub(crate) fn with_change_page(
        mut self,
        skip: u32,
        entries: Vec<(&str, &str)>,
        next_skip: Option<u32>,
        next_top: Option<u32>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(path, kind)| ChangeRecord::new(path, kind))
            .collect();
        self.change_pages.insert(
            skip,
            Ok(ChangePage {
                entries,
                next_skip,
                next_top,
            }),
        );
        self
    }

    /// Fail the change page at `skip`
    pub(crate) fn with_failing_change_page(mut self, skip: u32, status: u16) -> Self {
        self.change_pages.insert(skip, Err(status));
        self
    }

    /// Serve a pipeline listing page for a continuation token
    pub(crate) fn with_pipeline_page(
        mut self,
        token: Option<&str>,
        pipelines: Vec<(u32, &str)>,
        next: Option<&str>,
    ) -> Self {
        let pipelines = pipelines
            .into_iter()
            .map(|(id, kind)| PipelineSummary {
                id,
                configuration_type: Some(ConfigurationType::from(kind.to_string())),
            })
            .collect();
        self.pipeline_pages.insert(
            token.map(str::to_string),
            Ok(PipelinePage {
                pipelines,
                continuation_token: next.map(str::to_string),
            }),
        );
        self
    }

    pub(crate) fn with_failing_pipeline_listing(mut self, status: u16) -> Self {
        self.pipeline_pages.insert(None, Err(status));
        self
    }

    /// Single-page YAML catalog where every pipeline resolves
    pub(crate) fn with_catalog(mut self, pipelines: &[(u32, &str)]) -> Self {
        let summaries = pipelines.iter().map(|(id, _)| (*id, "yaml")).collect();
        self = self.with_pipeline_page(None, summaries, None);
        for (id, path) in pipelines {
            self = self.with_detail(*id, path, Behavior::immediate());
        }
        self
    }

    pub(crate) fn with_detail(mut self, id: u32, path: &str, behavior: Behavior) -> Self {
        self.details.insert(id, (path.to_string(), behavior));
        self
    }

    pub(crate) fn with_preview(mut self, id: u32, behavior: Behavior) -> Self {
        self.previews.insert(id, behavior);
        self
    }

    pub(crate) fn observed_max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(&self.in_flight)
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn get_changes(
        &self,
        _revision: &Revision,
        skip: u32,
        top: u32,
    ) -> Result<ChangePage, HostError> {
        self.change_calls.lock().unwrap().push((skip, top));
        match self.change_pages.get(&skip) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(HostError::api(*status, "change listing failed")),
            None => Err(HostError::api(404, format!("no page at skip {}", skip))),
        }
    }

    async fn list_pipelines(
        &self,
        _project: &str,
        _top: u32,
        continuation_token: Option<&str>,
    ) -> Result<PipelinePage, HostError> {
        match self.pipeline_pages.get(&continuation_token.map(str::to_string)) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(HostError::api(*status, "pipeline listing failed")),
            None => Ok(PipelinePage::default()),
        }
    }

    async fn get_pipeline_detail(
        &self,
        _project: &str,
        id: u32,
    ) -> Result<PipelineDetail, HostError> {
        self.detail_calls.lock().unwrap().push(id);
        let _guard = self.enter();
        let (path, behavior) = self
            .details
            .get(&id)
            .cloned()
            .ok_or_else(|| HostError::api(404, format!("pipeline {} not found", id)))?;
        behavior.play().await?;
        Ok(PipelineDetail { source_path: path })
    }

    async fn preview_pipeline(
        &self,
        _project: &str,
        id: u32,
        request: &PreviewRequest,
    ) -> Result<PreviewRun, HostError> {
        self.preview_calls
            .lock()
            .unwrap()
            .push((id, request.clone()));
        let _guard = self.enter();
        let behavior = self
            .previews
            .get(&id)
            .cloned()
            .unwrap_or_else(Behavior::immediate);
        behavior.play().await?;
        Ok(PreviewRun {
            final_yaml: Some(format!("# pipeline {}", id)),
        })
    }
}
