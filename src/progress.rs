//! Progress reporting for batch conversions.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Receives incremental progress from a batch driver
pub trait ProgressObserver: Send + Sync {
    fn start(&self, total: usize);

    /// Called once per completed file with the running count
    fn advance(&self, done: usize, source: &Path);

    fn finish(&self, done: usize);
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&self, _total: usize) {}
    fn advance(&self, _done: usize, _source: &Path) {}
    fn finish(&self, _done: usize) {}
}

/// Terminal progress bar
#[derive(Debug)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new("Locating and converting where necessary")
    }
}

impl ProgressObserver for ProgressReporter {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn advance(&self, done: usize, _source: &Path) {
        self.bar.set_position(done as u64);
    }

    fn finish(&self, done: usize) {
        self.bar
            .finish_with_message(format!("{done} files ready"));
    }
}
