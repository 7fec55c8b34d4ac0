// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! # pipeval - Azure Pipelines dry-run validator
//!
//! `pipeval` finds the pipeline definitions whose YAML file changed and asks
//! Azure DevOps to preview each of them, without queuing a run.
//!
//! ## Features
//!
//! - **PR mode** - validates the pipelines touched by a pull request build
//! - **Local mode** - validates working tree YAML before it is pushed
//! - **Bounded concurrency** - catalog resolution and previews share one limit
//! - **Partial failure** - one broken pipeline never hides the others
//!
//! ## Quick Start
//!
//! ```bash
//! # Inside a PR validation build (map SYSTEM_ACCESSTOKEN into the step)
//! pipeval pr
//!
//! # From a working tree, comparing with master
//! pipeval local --pat "$AZURE_DEVOPS_PAT"
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod host;
pub mod orchestrator;
pub mod utils;

// Re-export commonly used types
pub use errors::{HostError, ValidatorError, ValidatorResult};
pub use host::{AzureDevOpsClient, HostApi, Revision};
pub use orchestrator::{Orchestrator, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
