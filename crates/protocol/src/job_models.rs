//! Runtime job state models.
//!
//! This module defines the structures for tracking a single
//! fetch-stage-run-cleanup cycle and the output it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle status of a script job.
///
/// The status progresses through these states during normal execution:
/// Pending -> Downloading -> Staged -> Running -> Completed
///
/// `Failed` can be reached from `Downloading`, `Staged` or `Running`;
/// `Cancelled` only from `Running`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job has been created but nothing has happened yet.
    Pending,

    /// Script content is being fetched from its source URL.
    Downloading,

    /// Script content has been written to a staged file.
    Staged,

    /// The interpreter process is running.
    Running,

    /// The interpreter exited with code 0.
    Completed,

    /// The harness could not run the script, or the script exited non-zero.
    Failed,

    /// The process was killed on request.
    Cancelled,
}

impl JobState {
    /// Whether no further transition can follow this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a job in this state may move to `next`.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Staged)
                | (Downloading, Failed)
                | (Staged, Running)
                | (Staged, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Whether a staged file exists for a job that reached this state
    /// through staging.
    pub fn holds_staged_file(self) -> bool {
        matches!(
            self,
            Self::Staged | Self::Running | Self::Completed | Self::Failed | Self::Cancelled
        )
    }
}

/// Where a captured log line came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum LogSource {
    /// Standard output of the child process.
    StdOut,
    /// Standard error of the child process.
    StdErr,
    /// Status line generated by the harness itself.
    System,
}

/// One line of captured output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct LogLine {
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    /// Line content without the trailing newline.
    pub text: String,
}

impl LogLine {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            text: text.into(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(LogSource::StdOut, text)
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(LogSource::StdErr, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(LogSource::System, text)
    }

    /// Harness-generated failure line (`ERROR: ...`).
    pub fn is_error(&self) -> bool {
        self.source == LogSource::System && self.text.starts_with("ERROR:")
    }
}

/// One fetch-stage-run-cleanup cycle.
///
/// A job is never mutated again once its state is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct ScriptJob {
    #[ts(type = "string")]
    pub id: Uuid,

    /// Remote location of the script.
    pub source_url: String,

    /// Human label used in log lines and status displays.
    pub display_name: String,

    /// Extra interpreter arguments appended after the staged path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Path of the staged script; `None` until staging succeeds.
    #[ts(type = "string | null")]
    pub staged_path: Option<PathBuf>,

    pub state: JobState,

    /// Set once, when the job leaves `Running` as `Completed` or `Failed`.
    pub exit_code: Option<i32>,

    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    /// Captured output, append-only while the job runs.
    pub log: Vec<LogLine>,
}
