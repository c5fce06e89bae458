// src/pipeline/executor.rs

use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::progress::{ProgressSink, ProgressSnapshot};
use super::report::ExecutionReport;
use super::task::{OutputMode, TaskSpec};
use crate::config::PipelineConfig;
use crate::errors::{ConfigError, LookupFailure};
use crate::lookup::{render, LookupAdapter, LookupResult, LookupValue};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Upper bound on one row's lookup, adapter retries included.
    pub row_timeout: Duration,
    /// Pause between consecutive rows.
    pub pacing: Duration,
    /// Failure count at which a task's failures are reported as recurring.
    pub escalate_after: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ExecutorOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            row_timeout: Duration::from_secs(config.row_timeout_secs),
            pacing: Duration::from_millis(config.pacing_ms),
            escalate_after: config.escalate_after,
        }
    }
}

/// Applies one adapter to every row of a table, in order.
pub struct RowTaskExecutor {
    options: ExecutorOptions,
    stop: CancellationToken,
}

impl RowTaskExecutor {
    pub fn new(options: ExecutorOptions, stop: CancellationToken) -> Self {
        Self { options, stop }
    }

    /// Cancelling this token stops every task between rows.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Run `spec` over `table`. Bad column bindings fail before any row is
    /// touched; row failures are written into the output column and counted.
    #[instrument(level = "info", skip_all, fields(task = %spec.label, sheet = %spec.sheet))]
    pub async fn execute(
        &self,
        table: &mut Table,
        spec: &TaskSpec,
        adapter: &mut dyn LookupAdapter,
        progress: &mut dyn ProgressSink,
    ) -> Result<ExecutionReport, ConfigError> {
        spec.check(table)?;
        let inputs: Vec<usize> = spec
            .input_columns
            .iter()
            .map(|c| table.column_index(c).ok_or_else(|| missing(spec, c)))
            .collect::<Result<_, _>>()?;
        let output = match spec.output_mode {
            OutputMode::CreateNew => table.reset_column(&spec.output_column),
            OutputMode::UseExisting => table
                .column_index(&spec.output_column)
                .ok_or_else(|| missing(spec, &spec.output_column))?,
        };

        info!("Processing {}...", spec.label);
        let mut report = ExecutionReport::new(table.len());
        progress.task_started(spec, report.total_rows);
        if report.total_rows == 0 {
            progress.on_progress(&ProgressSnapshot::from_report(&spec.label, &report));
        }

        let started = Instant::now();
        for row in 0..table.len() {
            if row > 0 && !self.options.pacing.is_zero() {
                tokio::select! {
                    _ = sleep(self.options.pacing) => {}
                    _ = self.stop.cancelled() => {}
                }
            }
            if self.stop.is_cancelled() {
                report.abandoned = true;
                warn!(row, pending = report.pending(), "stop requested; abandoning task");
                break;
            }

            let result = match row_inputs(table, row, &inputs, spec) {
                Ok(values) => self.lookup_row(adapter, &values).await,
                Err(failure) => Err(failure),
            };
            table.set_cell(row, output, render(&result));

            match &result {
                Ok(LookupValue::Found(_)) => {}
                Ok(LookupValue::NotFound) => {
                    report.not_found += 1;
                    debug!(row, "no match");
                }
                Err(failure) => {
                    warn!(row, kind = failure.kind(), error = %failure, "lookup failed");
                    if report.record_failure(row, failure, self.options.escalate_after) {
                        error!(
                            failures = report.failures,
                            adapter = adapter.name(),
                            "recurring lookup failures"
                        );
                    }
                }
            }

            report.row_done(started.elapsed());
            progress.on_progress(&ProgressSnapshot::from_report(&spec.label, &report));
        }

        if !report.abandoned {
            info!(
                failures = report.failures,
                not_found = report.not_found,
                "{} processed and saved to column '{}'",
                spec.label,
                spec.output_column
            );
        }
        progress.task_finished(spec, &report);
        Ok(report)
    }

    async fn lookup_row(&self, adapter: &mut dyn LookupAdapter, inputs: &[String]) -> LookupResult {
        match timeout(self.options.row_timeout, adapter.lookup(inputs)).await {
            Ok(result) => result,
            Err(_) => Err(LookupFailure::Timeout(format!(
                "row did not finish within {}s",
                self.options.row_timeout.as_secs_f64()
            ))),
        }
    }
}

/// The row's values for the bound input columns. The first one is required;
/// a blank optional album is dropped.
fn row_inputs(
    table: &Table,
    row: usize,
    columns: &[usize],
    spec: &TaskSpec,
) -> Result<Vec<String>, LookupFailure> {
    let mut values = Vec::with_capacity(columns.len());
    for (i, &col) in columns.iter().enumerate() {
        match table.cell_at(row, col).and_then(|c| c.as_input()) {
            Some(v) => values.push(v),
            None if i == 0 => {
                return Err(LookupFailure::InvalidInput(format!(
                    "'{}' is empty",
                    spec.input_columns[0]
                )))
            }
            None => {}
        }
    }
    Ok(values)
}

fn missing(spec: &TaskSpec, column: &str) -> ConfigError {
    ConfigError::MissingColumn {
        sheet: spec.sheet.clone(),
        column: column.to_string(),
    }
}
