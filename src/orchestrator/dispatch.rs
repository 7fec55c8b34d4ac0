// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Validation dispatch
//!
//! One preview call per matched pipeline, run concurrently under the
//! in-flight bound.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::catalog::PipelineDefinition;
use super::fanout::{FanOut, Next};
use crate::errors::ValidatorError;
use crate::host::{HostApi, PreviewRequest};

/// A pipeline to validate, optionally against uncommitted YAML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationJob {
    pub pipeline: PipelineDefinition,
    /// Local content sent instead of the committed file
    pub yaml_override: Option<String>,
}

impl ValidationJob {
    /// Validate the committed content
    pub fn committed(pipeline: PipelineDefinition) -> Self {
        Self {
            pipeline,
            yaml_override: None,
        }
    }

    /// Validate local content
    pub fn with_override(pipeline: PipelineDefinition, yaml: String) -> Self {
        Self {
            pipeline,
            yaml_override: Some(yaml),
        }
    }
}

/// Pass/fail result of one preview call
#[derive(Debug)]
pub struct ValidationOutcome {
    pub pipeline_id: u32,
    pub pipeline_path: String,
    /// `None` when the pipeline passed
    pub error: Option<ValidatorError>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Triggers preview calls for matched pipelines
pub struct ValidationDispatcher<H: ?Sized> {
    host: Arc<H>,
    project: String,
    max_in_flight: usize,
}

impl<H> ValidationDispatcher<H>
where
    H: HostApi + ?Sized + 'static,
{
    pub fn new(host: Arc<H>, project: impl Into<String>, max_in_flight: usize) -> Self {
        Self {
            host,
            project: project.into(),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Start one preview per job against `ref_name`
    pub fn dispatch(
        &self,
        jobs: Vec<ValidationJob>,
        ref_name: &str,
        cancel: &CancellationToken,
    ) -> Dispatch {
        let pipelines = jobs.iter().map(|j| j.pipeline.clone()).collect();
        let host = Arc::clone(&self.host);
        let project = self.project.clone();
        let ref_name = ref_name.to_string();

        tracing::info!(
            "Validating {} pipeline(s) at {} ({} at a time)",
            jobs.len(),
            ref_name,
            self.max_in_flight
        );

        let fan = FanOut::spawn(jobs, self.max_in_flight, cancel, move |job: ValidationJob| {
            let ValidationJob {
                pipeline,
                yaml_override,
            } = job;
            let host = Arc::clone(&host);
            let project = project.clone();
            let request = PreviewRequest {
                ref_name: ref_name.clone(),
                yaml_override,
            };
            async move {
                let result = host.preview_pipeline(&project, pipeline.id, &request).await;
                ValidationOutcome {
                    pipeline_id: pipeline.id,
                    pipeline_path: pipeline.source_path,
                    error: result.err().map(ValidatorError::from_preview),
                }
            }
        });

        Dispatch { fan, pipelines }
    }
}

/// Outcomes of a dispatch still arriving
pub struct Dispatch {
    fan: FanOut<ValidationOutcome>,
    pipelines: Vec<PipelineDefinition>,
}

/// Next event of a dispatch
#[derive(Debug)]
pub enum DispatchEvent {
    Outcome(ValidationOutcome),
    Finished,
    Cancelled,
}

impl Dispatch {
    /// Number of pipelines dispatched
    pub fn len(&self) -> usize {
        self.fan.expected()
    }

    pub fn is_empty(&self) -> bool {
        self.fan.expected() == 0
    }

    /// Pipelines dispatched, in dispatch order
    pub fn pipelines(&self) -> &[PipelineDefinition] {
        &self.pipelines
    }

    /// Wait for the next outcome
    pub async fn next(&mut self) -> DispatchEvent {
        match self.fan.next().await {
            Next::Item(outcome) => DispatchEvent::Outcome(outcome),
            Next::Done => DispatchEvent::Finished,
            Next::Cancelled => DispatchEvent::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::{Behavior, FakeHost};

    fn def(id: u32, path: &str) -> PipelineDefinition {
        PipelineDefinition {
            id,
            source_path: path.into(),
        }
    }

    #[tokio::test]
    async fn test_one_preview_per_job() {
        let host = Arc::new(FakeHost::new());
        let dispatcher = ValidationDispatcher::new(Arc::clone(&host), "proj", 4);
        let cancel = CancellationToken::new();

        let jobs = vec![
            ValidationJob::committed(def(1, "/a.yml")),
            ValidationJob::with_override(def(2, "/b.yml"), "steps: []".into()),
        ];
        let mut dispatch = dispatcher.dispatch(jobs, "refs/heads/main", &cancel);
        assert_eq!(dispatch.len(), 2);

        let mut outcomes = Vec::new();
        while let DispatchEvent::Outcome(outcome) = dispatch.next().await {
            outcomes.push(outcome);
        }
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ValidationOutcome::passed));

        let mut calls = host.preview_calls.lock().unwrap().clone();
        calls.sort_by_key(|(id, _)| *id);
        assert_eq!(calls[0].1.ref_name, "refs/heads/main");
        assert_eq!(calls[0].1.yaml_override, None);
        assert_eq!(calls[1].1.yaml_override.as_deref(), Some("steps: []"));
    }

    #[tokio::test]
    async fn test_rejection_becomes_failed_outcome() {
        let host = Arc::new(
            FakeHost::new().with_preview(2, Behavior::Fail(400, "Unexpected value 'stepz'".into())),
        );
        let dispatcher = ValidationDispatcher::new(host, "proj", 4);
        let cancel = CancellationToken::new();

        let jobs = vec![
            ValidationJob::committed(def(1, "/a.yml")),
            ValidationJob::committed(def(2, "/b.yml")),
        ];
        let mut dispatch = dispatcher.dispatch(jobs, "refs/pull/1/merge", &cancel);

        let mut failed = Vec::new();
        while let DispatchEvent::Outcome(outcome) = dispatch.next().await {
            if let Some(error) = outcome.error {
                assert!(matches!(error, ValidatorError::PreviewRejected { status: 400, .. }));
                failed.push(outcome.pipeline_path);
            }
        }
        assert_eq!(failed, vec!["/b.yml".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_dispatch_finishes() {
        let dispatcher = ValidationDispatcher::new(Arc::new(FakeHost::new()), "proj", 4);
        let cancel = CancellationToken::new();
        let mut dispatch = dispatcher.dispatch(Vec::new(), "refs/heads/main", &cancel);
        assert!(dispatch.is_empty());
        assert!(matches!(dispatch.next().await, DispatchEvent::Finished));
    }
}
