// src/pipeline/task.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;
use crate::table::Table;

/// Which external catalog a task talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// song (+ album) -> canonical link
    LinkLookup,
    /// link -> popularity metric
    MetricLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    CreateNew,
    UseExisting,
}

impl TaskKind {
    /// Inclusive bounds on the number of input columns.
    pub fn input_arity(self) -> (usize, usize) {
        match self {
            TaskKind::LinkLookup => (1, 2),
            TaskKind::MetricLookup => (1, 1),
        }
    }
}

impl Platform {
    /// Column name used when the configuration does not name one.
    pub fn default_output_column(self, kind: TaskKind) -> &'static str {
        match (self, kind) {
            (Platform::Video, TaskKind::LinkLookup) => "YouTube_Links",
            (Platform::Video, TaskKind::MetricLookup) => "YouTube_Views",
            (Platform::Audio, TaskKind::LinkLookup) => "Spotify_Links",
            (Platform::Audio, TaskKind::MetricLookup) => "Spotify_Playcount",
        }
    }

    pub fn default_label(self, kind: TaskKind) -> &'static str {
        match (self, kind) {
            (Platform::Video, TaskKind::LinkLookup) => "YouTube Links",
            (Platform::Video, TaskKind::MetricLookup) => "YouTube Views",
            (Platform::Audio, TaskKind::LinkLookup) => "Spotify Links",
            (Platform::Audio, TaskKind::MetricLookup) => "Spotify Playcount",
        }
    }
}

/// One row task: an adapter bound to input/output columns of one sheet.
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSpec {
    pub label: String,
    pub platform: Platform,
    pub kind: TaskKind,
    pub sheet: String,
    pub input_columns: Vec<String>,
    pub output_column: String,
    pub output_mode: OutputMode,
}

impl TaskSpec {
    pub fn new(
        platform: Platform,
        kind: TaskKind,
        sheet: impl Into<String>,
        input_columns: &[&str],
        output_column: impl Into<String>,
        output_mode: OutputMode,
    ) -> Self {
        Self {
            label: platform.default_label(kind).to_string(),
            platform,
            kind,
            sheet: sheet.into(),
            input_columns: input_columns.iter().map(|c| c.to_string()).collect(),
            output_column: output_column.into(),
            output_mode,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Check the bindings against the table without touching it.
    pub fn check(&self, table: &Table) -> Result<(), ConfigError> {
        let (min, max) = self.kind.input_arity();
        let got = self.input_columns.len();
        if got < min || got > max {
            return Err(ConfigError::InputArity {
                task: self.label.clone(),
                expected: if min == max { "exactly 1" } else { "1 or 2" },
                got,
            });
        }

        for column in &self.input_columns {
            if !table.has_column(column) {
                return Err(self.missing(column));
            }
        }

        if self.output_mode == OutputMode::UseExisting && !table.has_column(&self.output_column) {
            return Err(self.missing(&self.output_column));
        }

        if self.output_column.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{}: output column name is empty",
                self.label
            )));
        }

        Ok(())
    }

    fn missing(&self, column: &str) -> ConfigError {
        ConfigError::MissingColumn {
            sheet: self.sheet.clone(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}: {} -> {}]",
            self.label,
            self.sheet,
            self.input_columns.join(", "),
            self.output_column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(["Song", "Album", "Links"])
    }

    #[test]
    fn link_lookup_accepts_one_or_two_inputs() {
        let t = table();
        let two = TaskSpec::new(Platform::Video, TaskKind::LinkLookup, "S", &["Song", "Album"], "Out", OutputMode::CreateNew);
        let one = TaskSpec::new(Platform::Video, TaskKind::LinkLookup, "S", &["Song"], "Out", OutputMode::CreateNew);
        assert_eq!(two.check(&t), Ok(()));
        assert_eq!(one.check(&t), Ok(()));
    }

    #[test]
    fn metric_lookup_rejects_two_inputs() {
        let spec = TaskSpec::new(Platform::Audio, TaskKind::MetricLookup, "S", &["Links", "Song"], "Plays", OutputMode::CreateNew);
        assert!(matches!(spec.check(&table()), Err(ConfigError::InputArity { got: 2, .. })));
    }

    #[test]
    fn use_existing_requires_output_column() {
        let spec = TaskSpec::new(Platform::Video, TaskKind::MetricLookup, "S", &["Links"], "Views", OutputMode::UseExisting);
        assert_eq!(
            spec.check(&table()),
            Err(ConfigError::MissingColumn { sheet: "S".into(), column: "Views".into() })
        );
    }

    #[test]
    fn missing_input_column_is_reported() {
        let spec = TaskSpec::new(Platform::Audio, TaskKind::LinkLookup, "S", &["Track", "Album"], "Out", OutputMode::CreateNew);
        assert_eq!(
            spec.check(&table()),
            Err(ConfigError::MissingColumn { sheet: "S".into(), column: "Track".into() })
        );
    }

    #[test]
    fn defaults_follow_platform_and_kind() {
        assert_eq!(Platform::Audio.default_output_column(TaskKind::MetricLookup), "Spotify_Playcount");
        assert_eq!(Platform::Video.default_label(TaskKind::LinkLookup), "YouTube Links");
    }
}
