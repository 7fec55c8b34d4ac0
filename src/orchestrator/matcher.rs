// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Matching changed files to pipelines

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;

use super::catalog::PipelineDefinition;

/// How changed paths are compared with pipeline source paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMatching {
    /// Byte-for-byte equality
    #[default]
    Exact,
    /// Ignore a leading `/`, treat `\` as `/` and compare case-insensitively
    Normalized,
}

impl PathMatching {
    /// Comparison key of a path under this mode
    pub fn key<'a>(&self, path: &'a str) -> Cow<'a, str> {
        match self {
            Self::Exact => Cow::Borrowed(path),
            Self::Normalized => {
                let unified = path.replace('\\', "/");
                Cow::Owned(unified.trim_start_matches('/').to_lowercase())
            }
        }
    }
}

/// Deduplicated set of changed paths
#[derive(Debug, Clone)]
pub struct ChangedPathSet {
    mode: PathMatching,
    keys: HashSet<String>,
}

impl ChangedPathSet {
    pub fn new<I, S>(paths: I, mode: PathMatching) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = paths
            .into_iter()
            .map(|p| mode.key(p.as_ref()).into_owned())
            .collect();
        Self { mode, keys }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.keys.contains(self.mode.key(path).as_ref())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Catalog entries whose source file changed, in catalog order
pub fn match_pipelines(
    catalog: &[PipelineDefinition],
    changed: &ChangedPathSet,
) -> Vec<PipelineDefinition> {
    catalog
        .iter()
        .filter(|p| changed.contains(&p.source_path))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: u32, path: &str) -> PipelineDefinition {
        PipelineDefinition {
            id,
            source_path: path.into(),
        }
    }

    #[test]
    fn test_scenario_a() {
        // c.txt never reaches the set: the fetcher drops non-YAML files
        let changed = ChangedPathSet::new(["a.yaml", "b.yml"], PathMatching::Exact);
        let catalog = vec![def(1, "a.yaml"), def(2, "b.yml"), def(3, "d.yaml")];

        let matched = match_pipelines(&catalog, &changed);
        assert_eq!(matched, vec![def(1, "a.yaml"), def(2, "b.yml")]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let changed = ChangedPathSet::new(["/other.yml"], PathMatching::Exact);
        let catalog = vec![def(1, "/a.yml")];
        assert!(match_pipelines(&catalog, &changed).is_empty());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let changed = ChangedPathSet::new(["/b.yml", "/a.yml", "/b.yml"], PathMatching::Exact);
        assert_eq!(changed.len(), 2);
        let catalog = vec![def(3, "/a.yml"), def(1, "/b.yml"), def(2, "/c.yml")];

        let first = match_pipelines(&catalog, &changed);
        for _ in 0..10 {
            assert_eq!(match_pipelines(&catalog, &changed), first);
        }
        assert_eq!(first, vec![def(3, "/a.yml"), def(1, "/b.yml")]);
    }

    #[test]
    fn test_exact_mode_is_strict() {
        let changed = ChangedPathSet::new(["/CI/Build.yml"], PathMatching::Exact);
        assert!(!changed.contains("ci/build.yml"));
        assert!(!changed.contains("/ci/build.yml"));
        assert!(changed.contains("/CI/Build.yml"));
    }

    #[test]
    fn test_normalized_mode() {
        let changed = ChangedPathSet::new(["/CI/Build.yml"], PathMatching::Normalized);
        assert!(changed.contains("ci/build.yml"));
        assert!(changed.contains("\\ci\\build.yml"));
        assert!(!changed.contains("/ci/build.yaml"));
    }
}
