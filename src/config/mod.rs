// src/config/mod.rs

//! Run configuration: which tasks to run, how they bind to columns, and how
//! the lookup backends are reached.

pub mod loader;
pub mod model;

pub use loader::{load_from_path, resolve_credentials, Credentials};
pub use model::{
    AudioConfig, BackendsConfig, PageConfig, PipelineConfig, RendererKind, RunConfig, TaskConfig,
    VideoConfig,
};
