// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Result aggregation

use std::collections::HashSet;
use std::fmt;

use super::dispatch::{Dispatch, DispatchEvent, ValidationOutcome};
use crate::errors::ValidatorError;

/// A failed pipeline, or a run-level failure when `pipeline_path` is `None`
#[derive(Debug)]
pub struct ValidationFailure {
    pub pipeline_path: Option<String>,
    pub error: ValidatorError,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pipeline_path {
            Some(path) => write!(f, "{}: {}", path, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Combined result of one run
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Paths of pipelines that passed, in completion order
    pub passed: Vec<String>,
    /// Failures in completion order
    pub failures: Vec<ValidationFailure>,
    /// The run stopped before every outcome arrived
    pub cancelled: bool,
    /// Number of pipelines dispatched
    pub matched: usize,
}

impl ValidationReport {
    /// Report of a run where nothing matched
    pub fn empty() -> Self {
        Self::default()
    }

    /// Report holding a single run-level failure
    pub fn from_run_error(error: ValidatorError) -> Self {
        if error.is_cancelled() {
            return Self {
                cancelled: true,
                ..Self::default()
            };
        }
        Self {
            failures: vec![ValidationFailure {
                pipeline_path: None,
                error,
            }],
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of outcomes accounted for
    pub fn completed(&self) -> usize {
        self.passed.len() + self.failures.len()
    }
}

/// Collects outcomes of a dispatch into a report
pub struct ResultAggregator;

impl ResultAggregator {
    /// Wait for every dispatched outcome, or for cancellation
    ///
    /// `on_outcome` sees each outcome as it arrives. Pipelines whose task
    /// ended without publishing are reported as failures.
    pub async fn collect<F>(mut dispatch: Dispatch, mut on_outcome: F) -> ValidationReport
    where
        F: FnMut(&ValidationOutcome),
    {
        let mut report = ValidationReport {
            matched: dispatch.len(),
            ..ValidationReport::default()
        };
        let mut seen = HashSet::with_capacity(dispatch.len());

        loop {
            match dispatch.next().await {
                DispatchEvent::Outcome(outcome) => {
                    on_outcome(&outcome);
                    seen.insert(outcome.pipeline_id);
                    match outcome.error {
                        None => report.passed.push(outcome.pipeline_path),
                        Some(error) => report.failures.push(ValidationFailure {
                            pipeline_path: Some(outcome.pipeline_path),
                            error,
                        }),
                    }
                }
                DispatchEvent::Finished => break,
                DispatchEvent::Cancelled => {
                    tracing::warn!(
                        "Run cancelled with {} of {} outcome(s) received",
                        report.completed(),
                        report.matched
                    );
                    report.cancelled = true;
                    return report;
                }
            }
        }

        for pipeline in dispatch.pipelines() {
            if !seen.contains(&pipeline.id) {
                report.failures.push(ValidationFailure {
                    pipeline_path: Some(pipeline.source_path.clone()),
                    error: ValidatorError::WorkerLost {
                        id: pipeline.id,
                        message: "task ended without an outcome".into(),
                    },
                });
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::{Behavior, FakeHost};
    use crate::orchestrator::catalog::PipelineDefinition;
    use crate::orchestrator::dispatch::{ValidationDispatcher, ValidationJob};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn jobs(paths: &[(u32, &str)]) -> Vec<ValidationJob> {
        paths
            .iter()
            .map(|(id, path)| {
                ValidationJob::committed(PipelineDefinition {
                    id: *id,
                    source_path: path.to_string(),
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_b() {
        let host = Arc::new(
            FakeHost::new().with_preview(2, Behavior::Fail(400, "Unexpected value 'stepz'".into())),
        );
        let cancel = CancellationToken::new();
        let dispatch = ValidationDispatcher::new(host, "proj", 8).dispatch(
            jobs(&[(1, "/a.yml"), (2, "/b.yml")]),
            "refs/pull/1/merge",
            &cancel,
        );

        let mut observed = 0;
        let report = ResultAggregator::collect(dispatch, |_| observed += 1).await;

        assert_eq!(observed, 2);
        assert_eq!(report.matched, 2);
        assert_eq!(report.passed, vec!["/a.yml".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pipeline_path.as_deref(), Some("/b.yml"));
        assert!(report.failures[0].to_string().contains("stepz"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_scenario_d() {
        let host = Arc::new(
            FakeHost::new()
                .with_preview(3, Behavior::Hang)
                .with_preview(4, Behavior::Hang)
                .with_preview(5, Behavior::Hang),
        );
        let cancel = CancellationToken::new();
        let dispatch = ValidationDispatcher::new(host, "proj", 8).dispatch(
            jobs(&[(1, "/1.yml"), (2, "/2.yml"), (3, "/3.yml"), (4, "/4.yml"), (5, "/5.yml")]),
            "refs/pull/1/merge",
            &cancel,
        );

        let trigger = cancel.clone();
        let mut arrived = 0;
        let report = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            ResultAggregator::collect(dispatch, move |_| {
                arrived += 1;
                if arrived == 2 {
                    trigger.cancel();
                }
            }),
        )
        .await
        .expect("aggregator must not hang after cancellation");

        assert!(report.cancelled);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.matched, 5);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_all_passed_is_success() {
        let host = Arc::new(FakeHost::new());
        let cancel = CancellationToken::new();
        let dispatch = ValidationDispatcher::new(host, "proj", 2).dispatch(
            jobs(&[(1, "/a.yml"), (2, "/b.yml"), (3, "/c.yml")]),
            "refs/heads/main",
            &cancel,
        );

        let report = ResultAggregator::collect(dispatch, |_| {}).await;
        assert!(report.is_success());
        assert_eq!(report.completed(), 3);
    }

    #[test]
    fn test_run_error_is_single_synthetic_failure() {
        let report = ValidationReport::from_run_error(ValidatorError::PipelineListing {
            project: "proj".into(),
            source: crate::errors::HostError::api(500, "boom"),
        });
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].pipeline_path.is_none());
        assert!(report.failures[0].to_string().contains("proj"));
        assert!(!report.is_success());
    }

    #[test]
    fn test_cancelled_run_error() {
        let report = ValidationReport::from_run_error(ValidatorError::Cancelled);
        assert!(report.cancelled);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_empty_report_is_success() {
        assert!(ValidationReport::empty().is_success());
    }
}
