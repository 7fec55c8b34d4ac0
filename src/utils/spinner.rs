// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Progress spinner utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate progress
///
/// Draws to stderr and stays hidden when stderr is not a terminal.
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("{spinner:.blue} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner that can be restarted with a new message
#[derive(Default)]
pub struct StageSpinner {
    bar: Option<ProgressBar>,
}

impl StageSpinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `message`, reusing the running spinner if any
    pub fn set(&mut self, message: &str) {
        match &self.bar {
            Some(bar) => bar.set_message(message.to_string()),
            None => self.bar = Some(create_spinner(message)),
        }
    }

    /// Remove the spinner from the terminal
    pub fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for StageSpinner {
    fn drop(&mut self) {
        self.clear();
    }
}
