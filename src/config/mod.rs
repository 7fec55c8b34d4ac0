// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Run configuration
//!
//! Settings are layered: built-in defaults, then `.pipeval.yaml`, then
//! command-line flags and environment variables.

mod environment;

pub use environment::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ValidatorError, ValidatorResult};
use crate::orchestrator::PathMatching;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = ".pipeval.yaml";

/// Largest accepted `max_in_flight`
pub const MAX_IN_FLIGHT_LIMIT: usize = 256;

/// Tuning knobs of one orchestration run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Upper bound on concurrent remote calls per stage
    pub max_in_flight: usize,
    /// Initial `top` of the change cursor
    pub change_page_size: u32,
    /// `$top` used when listing pipelines
    pub pipeline_page_size: u32,
    /// How changed paths are compared with pipeline source paths
    pub path_matching: PathMatching,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Deadline for the whole run
    pub run_timeout: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            change_page_size: 1000,
            pipeline_page_size: 500,
            path_matching: PathMatching::Exact,
            request_timeout: Duration::from_secs(30),
            run_timeout: None,
        }
    }
}

impl RunSettings {
    /// Apply a layer on top of these settings; set fields win
    pub fn apply(mut self, layer: &SettingsLayer) -> Self {
        if let Some(v) = layer.max_in_flight {
            self.max_in_flight = v;
        }
        if let Some(v) = layer.change_page_size {
            self.change_page_size = v;
        }
        if let Some(v) = layer.pipeline_page_size {
            self.pipeline_page_size = v;
        }
        if let Some(v) = layer.path_matching {
            self.path_matching = v;
        }
        if let Some(secs) = layer.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = layer.run_timeout_secs {
            self.run_timeout = Some(Duration::from_secs(secs));
        }
        self
    }

    /// Check value ranges
    pub fn validated(self) -> ValidatorResult<Self> {
        if self.max_in_flight == 0 {
            return Err(ValidatorError::invalid_config(
                "max_in_flight must be at least 1",
                Some("Set max_in_flight in .pipeval.yaml or pass --max-in-flight"),
            ));
        }
        if self.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(ValidatorError::invalid_config(
                format!("max_in_flight must be at most {}", MAX_IN_FLIGHT_LIMIT),
                Some("Lower max_in_flight in .pipeval.yaml or --max-in-flight"),
            ));
        }
        if self.change_page_size == 0 {
            return Err(ValidatorError::invalid_config(
                "change_page_size must be at least 1",
                None,
            ));
        }
        if self.pipeline_page_size == 0 {
            return Err(ValidatorError::invalid_config(
                "pipeline_page_size must be at least 1",
                None,
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ValidatorError::invalid_config(
                "request_timeout_secs must be at least 1",
                None,
            ));
        }
        Ok(self)
    }
}

/// A partial set of settings from one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsLayer {
    pub max_in_flight: Option<usize>,
    pub change_page_size: Option<u32>,
    pub pipeline_page_size: Option<u32>,
    pub path_matching: Option<PathMatching>,
    pub request_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
}

impl SettingsLayer {
    /// Load a layer from a YAML file
    pub fn from_file(path: &Path) -> ValidatorResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ValidatorError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content).map_err(|e| {
            ValidatorError::invalid_config(
                format!("{}: {}", path.display(), e),
                Some("See the README for the supported keys"),
            )
        })
    }

    /// Parse a layer from YAML; an empty document is an empty layer
    pub fn from_yaml(yaml: &str) -> ValidatorResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Locate the config file
    ///
    /// An explicit path must exist; otherwise `.pipeval.yaml` in `dir` is
    /// used when present.
    pub fn discover(dir: &Path, explicit: Option<&Path>) -> ValidatorResult<Option<Self>> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(None);
                }
                candidate
            }
        };

        tracing::debug!("Loading settings from {}", path.display());
        Self::from_file(&path).map(Some)
    }
}
