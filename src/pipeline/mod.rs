// src/pipeline/mod.rs

//! Row-wise enrichment: task definitions, the per-task executor, progress
//! reporting and the orchestrator that runs tasks in order.

pub mod executor;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod task;

pub use executor::{ExecutorOptions, RowTaskExecutor};
pub use orchestrator::{Orchestrator, RunSummary, TaskBinding, TaskOutcome, TaskStatus};
pub use progress::{
    BarProgress, ChannelProgress, LogProgress, NoProgress, ProgressSink, ProgressSnapshot,
};
pub use report::{estimate_remaining, ExecutionReport, RowFailure};
pub use task::{OutputMode, Platform, TaskKind, TaskSpec};
