//! Progress bar driven by pipeline callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tilegen::pipeline::{PipelineState, ProgressObserver};
use tilegen::supervisor::ProgressEvent;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// One bar, reset at the start of every round.
pub struct ProgressDisplay {
    bar: ProgressBar,
    failed: AtomicU64,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bar)
    }

    /// Display that draws nothing (non-TTY or `--no-progress`).
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            failed: AtomicU64::new(0),
        }
    }

    /// Clears the bar once the run is over.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn failed_message(&self) -> String {
        match self.failed.load(Ordering::Relaxed) {
            0 => String::new(),
            n => style(format!("{} failed", n)).red().to_string(),
        }
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressDisplay {
    fn on_state(&self, state: &PipelineState) {
        match state {
            PipelineState::Validating { .. } => {
                self.bar.set_message("validating on disk...");
            }
            PipelineState::Retrying { round, missing } => {
                self.bar.println(format!(
                    "{} round {}: {} tile(s) missing",
                    style("retry").yellow(),
                    round,
                    missing
                ));
            }
            PipelineState::Completed => {
                self.bar.println(format!("{} all tiles present", style("done").green()));
            }
            PipelineState::PartialFailure { failed } => {
                self.bar.println(format!(
                    "{} {} tile(s) could not be generated",
                    style("partial").yellow(),
                    failed.len()
                ));
            }
            PipelineState::Aborted { message } => {
                self.bar.println(format!("{} {}", style("aborted").red().bold(), message));
            }
            PipelineState::Planning | PipelineState::Generating { .. } => {}
        }
    }

    fn on_round_start(&self, round: u32, tiles: u64) {
        self.failed.store(0, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_length(tiles);
        self.bar.set_prefix(format!("round {}", round));
        self.bar.set_message("");
    }

    fn on_event(&self, _round: u32, event: &ProgressEvent) {
        match event {
            ProgressEvent::TileCompleted { .. } => self.bar.inc(1),
            ProgressEvent::TileFailed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.bar.inc(1);
                self.bar.set_message(self.failed_message());
            }
            ProgressEvent::Diagnostic { line } => {
                if let Some(zoom) = line.strip_prefix("# zoom ") {
                    self.bar.set_message(format!("zoom {} {}", zoom, self.failed_message()));
                }
            }
            ProgressEvent::RunError { message } => {
                self.bar.println(format!("{} {}", style("worker error").red(), message));
            }
            ProgressEvent::RunFinished {
                success_count,
                fail_count,
            } => {
                self.bar.println(format!(
                    "worker finished: {} ok, {} failed",
                    success_count, fail_count
                ));
            }
        }
    }
}
