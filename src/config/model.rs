// src/config/model.rs

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::task::{OutputMode, Platform, TaskKind, TaskSpec};

/// Top-level run file as written by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub label: Option<String>,
    pub platform: Platform,
    pub kind: TaskKind,
    pub sheet: String,
    pub input_columns: Vec<String>,
    #[serde(default)]
    pub output_column: Option<String>,
    #[serde(default)]
    pub output_mode: OutputMode,
}

impl TaskConfig {
    /// Fill in the default label and output column.
    pub fn to_spec(&self) -> TaskSpec {
        TaskSpec {
            label: self
                .label
                .clone()
                .unwrap_or_else(|| self.platform.default_label(self.kind).to_string()),
            platform: self.platform,
            kind: self.kind,
            sheet: self.sheet.clone(),
            input_columns: self.input_columns.clone(),
            output_column: self
                .output_column
                .clone()
                .unwrap_or_else(|| self.platform.default_output_column(self.kind).to_string()),
            output_mode: self.output_mode,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendsConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub page: PageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoConfig {
    pub program: String,
    pub search_results: usize,
    pub timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".into(),
            search_results: 1,
            timeout_secs: 60,
        }
    }
}

impl VideoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub market: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            market: None,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl AudioConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Plain fetch; only sees server-rendered markup.
    Http,
    /// Headless Chromium; runs the page's scripts before the DOM is read.
    #[default]
    Chrome,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub renderer: RendererKind,
    pub chrome_program: String,
    pub navigation_timeout_secs: u64,
    pub element_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub selector: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Chrome,
            chrome_program: "chromium".into(),
            navigation_timeout_secs: 60,
            element_wait_secs: 30,
            poll_interval_ms: 2000,
            selector: r#"[data-testid="playcount"]"#.into(),
        }
    }
}

impl PageConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub row_timeout_secs: u64,
    pub pacing_ms: u64,
    pub escalate_after: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            row_timeout_secs: 120,
            pacing_ms: 0,
            escalate_after: 3,
        }
    }
}
