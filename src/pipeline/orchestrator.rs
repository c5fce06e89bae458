// src/pipeline/orchestrator.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::executor::RowTaskExecutor;
use super::progress::ProgressSink;
use super::report::ExecutionReport;
use super::task::TaskSpec;
use crate::errors::ConfigError;
use crate::lookup::{AdapterTable, LookupAdapter};
use crate::table::Workbook;

/// A task together with the adapter that serves it, or the reason no
/// adapter could be built.
pub struct TaskBinding {
    pub spec: TaskSpec,
    pub adapter: Result<Box<dyn LookupAdapter>, ConfigError>,
}

impl TaskBinding {
    pub fn new(spec: TaskSpec, adapter: Box<dyn LookupAdapter>) -> Self {
        Self {
            spec,
            adapter: Ok(adapter),
        }
    }

    /// Bind every spec through the dispatch table, in order.
    pub fn bind_all(specs: Vec<TaskSpec>, adapters: &AdapterTable) -> Vec<Self> {
        specs
            .into_iter()
            .map(|spec| {
                let adapter = adapters.build(&spec);
                Self { spec, adapter }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Abandoned,
    ConfigError,
    /// Never started because a stop was requested earlier.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub label: String,
    pub sheet: String,
    pub output_column: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExecutionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    fn new(spec: &TaskSpec, status: TaskStatus) -> Self {
        Self {
            label: spec.label.clone(),
            sheet: spec.sheet.clone(),
            output_column: spec.output_column.clone(),
            status,
            report: None,
            error: None,
        }
    }
}

/// What happened to each task, in run order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    pub fn has_config_errors(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == TaskStatus::ConfigError)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.report.as_ref())
            .map(|r| r.failures)
            .sum()
    }
}

/// Runs tasks one after another against a shared workbook, so a later task
/// sees the columns written by earlier ones.
pub struct Orchestrator {
    executor: RowTaskExecutor,
}

impl Orchestrator {
    pub fn new(executor: RowTaskExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RowTaskExecutor {
        &self.executor
    }

    #[instrument(level = "info", skip_all, fields(tasks = bindings.len()))]
    pub async fn run(
        &self,
        workbook: &mut Workbook,
        bindings: Vec<TaskBinding>,
        progress: &mut dyn ProgressSink,
    ) -> RunSummary {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(bindings.len());

        for TaskBinding { spec, adapter } in bindings {
            if self.executor.is_stopped() {
                warn!(task = %spec.label, "skipped after stop request");
                outcomes.push(TaskOutcome::new(&spec, TaskStatus::Skipped));
                continue;
            }

            // The adapter, and any session it opened, is dropped at the end
            // of this iteration whatever the outcome.
            let result = match (workbook.sheet_mut(&spec.sheet), adapter) {
                (None, _) => Err(ConfigError::MissingSheet(spec.sheet.clone())),
                (Some(_), Err(e)) => Err(e),
                (Some(table), Ok(mut adapter)) => {
                    self.executor
                        .execute(table, &spec, adapter.as_mut(), progress)
                        .await
                }
            };

            outcomes.push(match result {
                Ok(report) => {
                    let status = if report.abandoned {
                        TaskStatus::Abandoned
                    } else {
                        TaskStatus::Completed
                    };
                    TaskOutcome {
                        report: Some(report),
                        ..TaskOutcome::new(&spec, status)
                    }
                }
                Err(e) => {
                    error!(task = %spec.label, error = %e, "task not run");
                    TaskOutcome {
                        error: Some(e.to_string()),
                        ..TaskOutcome::new(&spec, TaskStatus::ConfigError)
                    }
                }
            });
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        info!(
            tasks = summary.outcomes.len(),
            failures = summary.failures(),
            config_errors = summary.has_config_errors(),
            "run finished"
        );
        summary
    }
}
