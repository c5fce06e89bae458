// src/pipeline/report.rs

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::errors::LookupFailure;

/// One failed row, kept so the run summary shows what went wrong where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub kind: &'static str,
    pub reason: String,
}

/// Per-task accounting. Created fresh for each task.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub total_rows: usize,
    pub completed: usize,
    pub failures: usize,
    pub not_found: usize,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
    #[serde(serialize_with = "opt_as_secs")]
    pub estimated_remaining: Option<Duration>,
    /// Stopped between rows before reaching the end.
    pub abandoned: bool,
    /// Row whose failure made the task's failures recurring.
    pub escalated_at: Option<usize>,
    pub failed_rows: Vec<RowFailure>,
}

impl ExecutionReport {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    /// Rows not yet processed. `completed + pending() == total_rows`.
    pub fn pending(&self) -> usize {
        self.total_rows - self.completed
    }

    /// Count a failed row. Returns true exactly once: on the failure that
    /// brings the count to `escalate_after` (0 disables escalation).
    pub fn record_failure(&mut self, row: usize, failure: &LookupFailure, escalate_after: usize) -> bool {
        self.failures += 1;
        self.failed_rows.push(RowFailure {
            row,
            kind: failure.kind(),
            reason: failure.to_string(),
        });
        if escalate_after > 0 && self.failures >= escalate_after && self.escalated_at.is_none() {
            self.escalated_at = Some(row);
            return true;
        }
        false
    }

    /// Mark one more row done and recompute the timing fields.
    pub fn row_done(&mut self, elapsed: Duration) {
        self.completed += 1;
        self.elapsed = elapsed;
        self.estimated_remaining = estimate_remaining(elapsed, self.total_rows, self.completed);
    }
}

/// `elapsed * (total - completed) / completed`, or `None` before the first row.
pub fn estimate_remaining(elapsed: Duration, total: usize, completed: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let pending = total.saturating_sub(completed);
    Some(elapsed.mul_f64(pending as f64 / completed as f64))
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn opt_as_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}
