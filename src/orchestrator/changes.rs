// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Changed YAML files of a revision
//!
//! Walks the paginated change listing and keeps YAML files that still
//! exist after the change.

use std::path::Path;

use crate::errors::{HostError, ValidatorError, ValidatorResult};
use crate::host::{ChangeRecord, ChangeType, HostApi, Revision};

/// File extensions treated as pipeline YAML (case-sensitive)
pub const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Whether a path has a YAML extension
pub fn is_yaml_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| YAML_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Whether a change entry can affect a pipeline
pub fn is_relevant_change(record: &ChangeRecord) -> bool {
    record.change_type != ChangeType::Delete && is_yaml_path(&record.path)
}

/// Retrieves the changed YAML files of a revision
#[derive(Debug, Clone, Copy)]
pub struct ChangeSetFetcher {
    page_size: u32,
}

impl ChangeSetFetcher {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Fetch every page and return the relevant paths in page order
    ///
    /// Any failed page fails the whole fetch; no partial list is returned.
    pub async fn fetch<H>(&self, host: &H, revision: &Revision) -> ValidatorResult<Vec<String>>
    where
        H: HostApi + ?Sized,
    {
        let mut paths = Vec::new();
        let mut skip = 0;
        let mut top = self.page_size;
        let mut pages = 0usize;

        loop {
            let page = host
                .get_changes(revision, skip, top)
                .await
                .map_err(|source| ValidatorError::ChangeListing {
                    revision: revision.to_string(),
                    source,
                })?;
            pages += 1;

            paths.extend(
                page.entries
                    .into_iter()
                    .filter(is_relevant_change)
                    .map(|record| record.path),
            );

            match page.next_skip {
                Some(next) if next != 0 => {
                    if next <= skip {
                        return Err(ValidatorError::ChangeListing {
                            revision: revision.to_string(),
                            source: HostError::Parse(format!(
                                "change listing cursor did not advance past skip {}",
                                skip
                            )),
                        });
                    }
                    skip = next;
                    top = page.next_top.filter(|t| *t != 0).unwrap_or(top);
                }
                _ => break,
            }
        }

        tracing::debug!(
            "{} changed YAML file(s) across {} page(s) of {}",
            paths.len(),
            pages,
            revision
        );
        Ok(paths)
    }
}

impl Default for ChangeSetFetcher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;

    fn revision() -> Revision {
        Revision {
            repository_id: "repo".into(),
            pull_request_id: 7,
            iteration_id: 1,
        }
    }

    #[test]
    fn test_yaml_extension_is_case_sensitive() {
        assert!(is_yaml_path("/ci/build.yaml"));
        assert!(is_yaml_path("/ci/build.yml"));
        assert!(!is_yaml_path("/ci/build.YML"));
        assert!(!is_yaml_path("/ci/build.yaml.bak"));
        assert!(!is_yaml_path("/README.md"));
        assert!(!is_yaml_path("/ci/yaml"));
    }

    #[test]
    fn test_deleted_yaml_is_never_relevant() {
        assert!(!is_relevant_change(&ChangeRecord::new("/a.yaml", "delete")));
        assert!(is_relevant_change(&ChangeRecord::new("/a.yaml", "edit")));
        assert!(is_relevant_change(&ChangeRecord::new("/a.yml", "add")));
    }

    #[test]
    fn test_non_yaml_is_never_relevant() {
        for kind in ["add", "edit", "rename", "delete"] {
            assert!(!is_relevant_change(&ChangeRecord::new("/c.txt", kind)));
        }
    }

    #[tokio::test]
    async fn test_single_page_filters() {
        let host = FakeHost::new().with_change_page(
            0,
            vec![
                ("/a.yaml", "edit"),
                ("/b.yml", "add"),
                ("/c.txt", "edit"),
                ("/d.yaml", "delete"),
            ],
            None,
            None,
        );

        let paths = ChangeSetFetcher::default().fetch(&host, &revision()).await.unwrap();
        assert_eq!(paths, vec!["/a.yaml", "/b.yml"]);
        assert_eq!(*host.change_calls.lock().unwrap(), vec![(0, 1000)]);
    }

    #[tokio::test]
    async fn test_scenario_c_two_pages_follow_cursor() {
        let host = FakeHost::new()
            .with_change_page(0, vec![("/a.yaml", "edit"), ("/x.txt", "edit")], Some(1000), Some(1000))
            .with_change_page(1000, vec![("/b.yml", "edit")], Some(0), Some(0));

        let paths = ChangeSetFetcher::default().fetch(&host, &revision()).await.unwrap();
        assert_eq!(paths, vec!["/a.yaml", "/b.yml"]);
        assert_eq!(
            *host.change_calls.lock().unwrap(),
            vec![(0, 1000), (1000, 1000)]
        );
    }

    #[tokio::test]
    async fn test_result_is_independent_of_page_split() {
        let entries = vec![
            ("/p/one.yaml", "edit"),
            ("/p/two.txt", "add"),
            ("/p/three.yml", "add"),
            ("/p/four.yaml", "delete"),
            ("/p/five.yml", "edit, rename"),
            ("/p/six.YAML", "edit"),
        ];

        let single = FakeHost::new().with_change_page(0, entries.clone(), None, None);
        let expected = ChangeSetFetcher::new(100).fetch(&single, &revision()).await.unwrap();

        for split in 1..entries.len() {
            let (first, second) = entries.split_at(split);
            let host = FakeHost::new()
                .with_change_page(0, first.to_vec(), Some(split as u32), Some(100))
                .with_change_page(split as u32, second.to_vec(), None, None);
            let paths = ChangeSetFetcher::new(100).fetch(&host, &revision()).await.unwrap();
            assert_eq!(paths, expected, "split at {}", split);
        }

        assert_eq!(expected, vec!["/p/one.yaml", "/p/three.yml", "/p/five.yml"]);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_fetch() {
        let host = FakeHost::new()
            .with_change_page(0, vec![("/a.yaml", "edit")], Some(1000), Some(1000))
            .with_failing_change_page(1000, 500);

        let err = ChangeSetFetcher::default()
            .fetch(&host, &revision())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::ChangeListing { .. }));
        assert!(err.to_string().contains("pull request 7"));
    }

    #[tokio::test]
    async fn test_stalled_cursor_fails_instead_of_looping() {
        let host = FakeHost::new()
            .with_change_page(0, vec![("/a.yaml", "edit")], Some(1000), Some(1000))
            .with_change_page(1000, vec![("/b.yaml", "edit")], Some(1000), Some(1000));

        let err = ChangeSetFetcher::default()
            .fetch(&host, &revision())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ValidatorError::ChangeListing {
                source: HostError::Parse(_),
                ..
            }
        ));
        assert_eq!(
            *host.change_calls.lock().unwrap(),
            vec![(0, 1000), (1000, 1000)]
        );
    }
}
