//! Job state machine.
//!
//! Functions for moving a [`ScriptJob`] through its lifecycle. Every
//! transition is checked against [`JobState::can_advance_to`], so a job
//! can never leave a terminal state or skip a step.

use ab_protocol::job_models::{JobState, LogLine, ScriptJob};
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Job {job_id} cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub job_id: Uuid,
    pub from: JobState,
    pub to: JobState,
}

/// Create a new job in `Pending` state.
pub fn create_job(source_url: String, display_name: String, args: Vec<String>) -> ScriptJob {
    ScriptJob {
        id: Uuid::new_v4(),
        source_url,
        display_name,
        args,
        staged_path: None,
        state: JobState::Pending,
        exit_code: None,
        started_at: None,
        ended_at: None,
        log: Vec::new(),
    }
}

fn advance(job: &mut ScriptJob, to: JobState) -> Result<(), TransitionError> {
    if !job.state.can_advance_to(to) {
        return Err(TransitionError {
            job_id: job.id,
            from: job.state,
            to,
        });
    }
    job.state = to;
    Ok(())
}

/// `Pending → Downloading`. Stamps the start time.
pub fn begin_download(job: &mut ScriptJob) -> Result<(), TransitionError> {
    advance(job, JobState::Downloading)?;
    job.started_at = Some(Utc::now());
    Ok(())
}

/// `Downloading → Staged`, recording where the script was written.
pub fn mark_staged(job: &mut ScriptJob, path: PathBuf) -> Result<(), TransitionError> {
    advance(job, JobState::Staged)?;
    job.staged_path = Some(path);
    Ok(())
}

/// `Staged → Running`.
pub fn mark_running(job: &mut ScriptJob) -> Result<(), TransitionError> {
    advance(job, JobState::Running)
}

/// Move to a terminal state.
///
/// `exit_code` is only recorded for `Completed` and `Failed`.
pub fn finish(
    job: &mut ScriptJob,
    state: JobState,
    exit_code: Option<i32>,
) -> Result<(), TransitionError> {
    if !state.is_terminal() {
        return Err(TransitionError {
            job_id: job.id,
            from: job.state,
            to: state,
        });
    }
    advance(job, state)?;
    if state != JobState::Cancelled {
        job.exit_code = exit_code;
    }
    job.ended_at = Some(Utc::now());
    Ok(())
}

/// Append a captured line. Lines arriving after a terminal state are dropped.
pub fn append_line(job: &mut ScriptJob, line: LogLine) -> bool {
    if job.state.is_terminal() {
        return false;
    }
    job.log.push(line);
    true
}
