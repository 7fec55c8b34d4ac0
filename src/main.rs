// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! pipeval - Azure Pipelines dry-run validator

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeval::cli::output::EXIT_SETUP;
use pipeval::cli::{Cli, Commands};
use pipeval::errors::{RecoverySuggestion, ValidatorError, ValidatorResult};
use pipeval::utils::configure_colors;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "pipeval=debug" } else { "pipeval=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
    configure_colors();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            let suggestion = RecoverySuggestion::for_error(&error);
            eprintln!("{:?}", miette::Report::new(error));
            if let Some(suggestion) = suggestion {
                eprintln!("{}", suggestion);
            }
            ExitCode::from(EXIT_SETUP)
        }
    }
}

async fn run(cli: Cli) -> ValidatorResult<u8> {
    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| ValidatorError::FileReadError {
            path: dir.clone(),
            error: e.to_string(),
        })?;
    }

    let cwd = std::env::current_dir()?;
    let settings = cli.load_settings(&cwd)?;
    tracing::debug!("Settings: {:?}", settings);

    match cli.command {
        Commands::Pr => pipeval::cli::pr::run(settings, cli.verbose).await,
        Commands::Local(args) => pipeval::cli::local::run(args, settings, cli.verbose).await,
    }
}
