// src/pipeline/progress.rs

//! Progress and ETA reporting. Sinks only observe; none of them can slow the
//! executor down or fail it.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::report::ExecutionReport;
use super::task::TaskSpec;

/// Point-in-time view of one task's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub task: String,
    pub completed: usize,
    pub total_rows: usize,
    pub percent: f64,
    pub eta: Duration,
}

impl ProgressSnapshot {
    /// An empty task is complete from the start.
    pub fn from_report(task: &str, report: &ExecutionReport) -> Self {
        let percent = if report.total_rows == 0 {
            100.0
        } else {
            report.completed as f64 * 100.0 / report.total_rows as f64
        };
        Self {
            task: task.to_string(),
            completed: report.completed,
            total_rows: report.total_rows,
            percent,
            eta: report.estimated_remaining.unwrap_or(Duration::ZERO),
        }
    }

    /// `Progress: 45.00% | Estimated time remaining: 12.30 seconds`
    pub fn message(&self) -> String {
        format!(
            "Progress: {:.2}% | Estimated time remaining: {:.2} seconds",
            self.percent,
            self.eta.as_secs_f64()
        )
    }
}

pub trait ProgressSink: Send {
    fn task_started(&mut self, _spec: &TaskSpec, _total_rows: usize) {}

    fn on_progress(&mut self, snapshot: &ProgressSnapshot);

    fn task_finished(&mut self, _spec: &TaskSpec, _report: &ExecutionReport) {}
}

/// One `info!` line per row.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        info!(task = %snapshot.task, "{}", snapshot.message());
    }
}

/// A terminal progress bar per task.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars that track state but never draw.
    pub fn hidden() -> Self {
        Self {
            bar: None,
            hidden: true,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl ProgressSink for BarProgress {
    fn task_started(&mut self, spec: &TaskSpec, total_rows: usize) {
        let bar = ProgressBar::new(total_rows as u64);
        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(Self::style());
        }
        bar.set_message(spec.label.clone());
        self.bar = Some(bar);
    }

    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        if let Some(bar) = &self.bar {
            bar.set_position(snapshot.completed as u64);
        }
    }

    fn task_finished(&mut self, spec: &TaskSpec, report: &ExecutionReport) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!(
                "{} ({} failed, {} not found)",
                spec.label, report.failures, report.not_found
            ));
        }
    }
}

/// Forwards snapshots to another task. A full or closed channel drops the
/// snapshot instead of waiting.
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressSnapshot>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<ProgressSnapshot>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        if let Err(e) = self.tx.try_send(snapshot.clone()) {
            debug!(error = %e, "progress snapshot dropped");
        }
    }
}

#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _snapshot: &ProgressSnapshot) {}
}
