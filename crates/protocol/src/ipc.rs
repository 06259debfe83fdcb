//! Inter-process communication protocol.
//!
//! This module defines the message types exchanged between a front end
//! (console, GUI) and the session controller in the core.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: Commands sent from the front end to the core
//! - `Event`: Status updates sent from the core to the front end
//!
//! Events are delivered through the output relay, so a front end only ever
//! observes state transitions and log lines, never raw errors.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::job_models::{JobState, LogLine};

/// State of the session controller as seen by a front end.
///
/// `Completed`, `Failed` and `Cancelled` are transient: the controller
/// cleans up and returns to `Idle` on its own.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Downloading,
    Staged,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Whether the controller accepts a new job.
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

impl From<JobState> for SessionState {
    fn from(state: JobState) -> Self {
        match state {
            // A pending job is about to start downloading.
            JobState::Pending | JobState::Downloading => Self::Downloading,
            JobState::Staged => Self::Staged,
            JobState::Running => Self::Running,
            JobState::Completed => Self::Completed,
            JobState::Failed => Self::Failed,
            JobState::Cancelled => Self::Cancelled,
        }
    }
}

/// Operations sent from a front end to the core.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "runScript",
///   "payload": {
///     "url": "https://example.com/ok.ps1",
///     "display_name": "OK",
///     "args": []
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Fetch, stage and run a remote script.
    RunScript {
        url: String,
        display_name: String,
        #[serde(default)]
        args: Vec<String>,
    },

    /// Forcefully terminate the running script.
    StopJob,

    /// Write a line to the running script's stdin.
    SendInput { text: String },

    /// Ask for a `SessionStateChanged` event carrying the current state.
    GetSessionState,

    /// Stop any running script and remove all staged files.
    Shutdown,
}

/// Events sent from the core to a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A job has been accepted.
    JobStarted {
        #[ts(type = "string")]
        job_id: Uuid,
        display_name: String,
        source_url: String,
    },

    /// A job moved to a new state.
    JobStateChanged {
        #[ts(type = "string")]
        job_id: Uuid,
        state: JobState,
    },

    /// A job produced a line of output.
    JobLog {
        #[ts(type = "string")]
        job_id: Uuid,
        line: LogLine,
    },

    /// A job reached a terminal state. No `JobLog` for this job follows.
    JobFinished {
        #[ts(type = "string")]
        job_id: Uuid,
        state: JobState,
        exit_code: Option<i32>,
    },

    /// The controller state changed (including the return to `Idle`).
    SessionStateChanged { state: SessionState },

    /// An `Op` could not be carried out, e.g. `RunScript` while busy.
    OpRejected { reason: String },
}

impl Event {
    /// The job this event belongs to, if any.
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Event::JobStarted { job_id, .. }
            | Event::JobStateChanged { job_id, .. }
            | Event::JobLog { job_id, .. }
            | Event::JobFinished { job_id, .. } => Some(*job_id),
            Event::SessionStateChanged { .. } | Event::OpRejected { .. } => None,
        }
    }
}
