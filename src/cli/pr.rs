// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! PR command - validate the pipelines changed by a pull request build

use colored::Colorize;
use std::sync::Arc;

use super::cancellation;
use super::output::{exit_code, print_report, ConsoleObserver};
use crate::config::{PrEnvironment, RunSettings};
use crate::errors::{ValidatorError, ValidatorResult};
use crate::host::{AzureDevOpsClient, Revision};
use crate::orchestrator::Orchestrator;

/// Run the pr command
pub async fn run(settings: RunSettings, verbose: bool) -> ValidatorResult<u8> {
    let env = PrEnvironment::from_env()?;
    let client = AzureDevOpsClient::new(
        &env.organization_url,
        env.credential.clone(),
        settings.request_timeout,
    )?;

    let iteration_id = client
        .latest_iteration(&env.repository_id, env.pull_request_id)
        .await
        .map_err(|source| ValidatorError::IterationLookup {
            pull_request_id: env.pull_request_id,
            source,
        })?;

    let revision = Revision {
        repository_id: env.repository_id.clone(),
        pull_request_id: env.pull_request_id,
        iteration_id,
    };

    println!(
        "{} {} in {}",
        "Validating".bold(),
        revision,
        env.project.cyan()
    );
    if verbose {
        println!("  Organization: {}", client.base_url());
        println!("  Ref: {}", env.run_branch);
        println!("  Concurrency: {}", settings.max_in_flight);
    }
    println!();

    let cancel = cancellation(settings.run_timeout);
    let orchestrator = Orchestrator::new(Arc::new(client), env.project.clone(), settings);
    let mut observer = ConsoleObserver::new(verbose);

    let report = orchestrator
        .validate_revision(&revision, &env.run_branch, &cancel, &mut observer)
        .await;
    observer.finish();

    print_report(&report);
    Ok(exit_code(&report))
}
