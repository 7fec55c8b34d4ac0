// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Run progress and report rendering

use colored::Colorize;

use crate::orchestrator::{RunObserver, RunStage, ValidationOutcome, ValidationReport};
use crate::utils::{print_error, print_info, print_section, print_success, print_warning, StageSpinner};

/// Exit code when every matched pipeline passed
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when at least one pipeline or fetch failed
pub const EXIT_FAILURES: u8 = 1;
/// Exit code for setup errors
pub const EXIT_SETUP: u8 = 2;
/// Exit code of a cancelled run (128 + SIGINT)
pub const EXIT_CANCELLED: u8 = 130;

/// Process exit code for a finished run
pub fn exit_code(report: &ValidationReport) -> u8 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if !report.failures.is_empty() {
        EXIT_FAILURES
    } else {
        EXIT_SUCCESS
    }
}

/// Prints stages as spinners and outcomes as they arrive
pub struct ConsoleObserver {
    spinner: StageSpinner,
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self {
            spinner: StageSpinner::new(),
            verbose,
        }
    }

    /// Stop any running spinner
    pub fn finish(&mut self) {
        self.spinner.clear();
    }
}

impl RunObserver for ConsoleObserver {
    fn stage(&mut self, stage: RunStage) {
        match stage {
            RunStage::FetchingChanges => self.spinner.set("Fetching changed files..."),
            RunStage::ResolvingCatalog => self.spinner.set("Resolving pipeline catalog..."),
            RunStage::Validating { count } => {
                self.spinner.clear();
                println!("{}", format!("Validating {} pipeline(s)", count).bold());
            }
        }
    }

    fn outcome(&mut self, outcome: &ValidationOutcome) {
        let label = if self.verbose {
            format!("{} (#{})", outcome.pipeline_path, outcome.pipeline_id)
        } else {
            outcome.pipeline_path.clone()
        };

        match &outcome.error {
            None => print_success(&label),
            Some(_) => print_error(&label),
        }
    }
}

/// Print the final summary of a run
pub fn print_report(report: &ValidationReport) {
    if !report.failures.is_empty() {
        print_section("Failures");
        for failure in &report.failures {
            match &failure.pipeline_path {
                Some(path) => {
                    println!("  {} {}", "✗".red(), path.bold());
                    println!("    {}", failure.error.to_string().dimmed());
                }
                None => println!("  {} {}", "✗".red(), failure.error),
            }
        }
    }

    println!();

    if report.cancelled {
        print_warning(&format!(
            "Run cancelled after {} of {} outcome(s)",
            report.completed(),
            report.matched
        ));
    } else if report.matched == 0 && report.failures.is_empty() {
        print_info("No pipeline uses the changed files");
    } else if report.failures.is_empty() {
        println!(
            "{}",
            format!("All {} pipeline(s) passed.", report.passed.len())
                .green()
                .bold()
        );
    } else if report.matched == 0 {
        println!("{}", "Validation could not run.".red().bold());
    } else {
        println!(
            "{}",
            format!(
                "{} of {} pipeline(s) failed.",
                report.failures.len(),
                report.matched
            )
            .red()
            .bold()
        );
    }
}
