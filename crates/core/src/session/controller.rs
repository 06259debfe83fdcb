//! Session controller.
//!
//! The controller runs one script job at a time through
//! fetch → stage → run → relay → cleanup and is the only owner of the
//! job state. Front ends talk to it through [`SessionController::run_script`],
//! [`SessionController::stop`] and the relay; failures never escape as
//! errors, they become `ERROR:` log lines and a `Failed` job.

use crate::fetch::{FetcherBuildError, HttpFetcher, ScriptSource};
use crate::relay::{Listener, OutputRelay, SubscriptionId};
use crate::runner::{KillSwitch, ProcessRunner, RunnerError, ScriptInput, Termination};
use crate::session::job::{
    append_line, begin_download, create_job, finish, mark_running, mark_staged, TransitionError,
};
use crate::staging::StagingArea;
use ab_protocol::config_models::HarnessConfig;
use ab_protocol::ipc::{Event, Op, SessionState};
use ab_protocol::job_models::{JobState, LogLine, ScriptJob};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("'{display_name}' is still in progress (job {job_id})")]
    AlreadyRunning { job_id: Uuid, display_name: String },

    #[error("No script is running")]
    NotRunning,

    #[error("The session is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Input(#[from] RunnerError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Fetcher(#[from] FetcherBuildError),
}

/// Tuning knobs that are not part of any single component.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Kill scripts that run longer than this. `None` lets them run until stopped.
    pub job_timeout: Option<Duration>,
    /// Number of finished jobs kept for [`SessionController::job`].
    pub history_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            job_timeout: None,
            history_limit: 50,
        }
    }
}

struct ActiveJob {
    job: ScriptJob,
    kill: Option<KillSwitch>,
    stdin: Option<Arc<Mutex<ScriptInput>>>,
    stop_requested: bool,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveJob>,
    history: VecDeque<ScriptJob>,
}

struct Shared {
    source: Arc<dyn ScriptSource>,
    staging: Arc<StagingArea>,
    runner: ProcessRunner,
    relay: Arc<OutputRelay>,
    options: SessionOptions,
    slot: Mutex<Slot>,
    state_tx: watch::Sender<SessionState>,
    shutting_down: AtomicBool,
}

/// Single-flight script execution harness.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        source: Arc<dyn ScriptSource>,
        staging: Arc<StagingArea>,
        runner: ProcessRunner,
        relay: Arc<OutputRelay>,
        options: SessionOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            shared: Arc::new(Shared {
                source,
                staging,
                runner,
                relay,
                options,
                slot: Mutex::new(Slot::default()),
                state_tx,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Build a controller with the HTTPS fetcher, a staging directory under
    /// the OS temp dir and the configured interpreter.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, SessionError> {
        let source = HttpFetcher::from_config(&config.fetch)?;
        Ok(Self::new(
            Arc::new(source),
            Arc::new(StagingArea::from_config(&config.staging)),
            ProcessRunner::from_config(&config.runner),
            Arc::new(OutputRelay::new()),
            SessionOptions {
                job_timeout: config.runner.job_timeout_secs.map(Duration::from_secs),
                history_limit: config.session.history_limit,
            },
        ))
    }

    pub fn relay(&self) -> &Arc<OutputRelay> {
        &self.shared.relay
    }

    pub fn staging(&self) -> &Arc<StagingArea> {
        &self.shared.staging
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.shared.runner
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> SubscriptionId {
        self.shared.relay.subscribe(listener)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    pub fn current_state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    /// Resolves once the controller is `Idle`.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| state.is_idle()).await;
    }

    /// Snapshot of the job in flight, if any.
    pub async fn active_job(&self) -> Option<ScriptJob> {
        let slot = self.shared.slot.lock().await;
        slot.active.as_ref().map(|a| a.job.clone())
    }

    /// Look up a job, in flight or finished.
    pub async fn job(&self, job_id: Uuid) -> Option<ScriptJob> {
        let slot = self.shared.slot.lock().await;
        match &slot.active {
            Some(active) if active.job.id == job_id => Some(active.job.clone()),
            _ => slot.history.iter().find(|j| j.id == job_id).cloned(),
        }
    }

    /// Remove a finished job from the history and return it.
    pub async fn take_job(&self, job_id: Uuid) -> Option<ScriptJob> {
        let mut slot = self.shared.slot.lock().await;
        let index = slot.history.iter().position(|j| j.id == job_id)?;
        slot.history.remove(index)
    }

    /// Start a job for `url`.
    ///
    /// Returns immediately with the job id; progress arrives through the
    /// relay. Fails with [`SessionError::AlreadyRunning`] unless the
    /// controller is idle, leaving the job in flight untouched.
    pub async fn run_script(
        &self,
        url: impl Into<String>,
        display_name: impl Into<String>,
        args: Vec<String>,
    ) -> Result<Uuid, SessionError> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(SessionError::ShuttingDown);
        }

        let mut slot = self.shared.slot.lock().await;
        if let Some(active) = &slot.active {
            return Err(SessionError::AlreadyRunning {
                job_id: active.job.id,
                display_name: active.job.display_name.clone(),
            });
        }

        let mut job = create_job(url.into(), display_name.into(), args);
        begin_download(&mut job)?;
        let job_id = job.id;
        tracing::info!(%job_id, name = %job.display_name, url = %job.source_url, "job accepted");

        self.publish(&Event::JobStarted {
            job_id,
            display_name: job.display_name.clone(),
            source_url: job.source_url.clone(),
        });
        self.publish(&Event::JobStateChanged {
            job_id,
            state: JobState::Downloading,
        });
        self.set_state(SessionState::Downloading);

        let banner = [
            LogLine::system(format!("▶ {}", job.display_name)),
            LogLine::system(format!("Downloading from {}", job.source_url)),
        ];
        slot.active = Some(ActiveJob {
            job,
            kill: None,
            stdin: None,
            stop_requested: false,
        });
        for line in banner {
            self.record_locked(&mut slot, job_id, line);
        }
        drop(slot);

        let span = tracing::info_span!("job", %job_id);
        let this = self.clone();
        tokio::spawn(async move {
            let driver = tokio::spawn(this.clone().drive(job_id).instrument(span));
            if let Err(e) = driver.await {
                tracing::error!(%job_id, error = %e, "job task aborted");
                this.finish_job(
                    job_id,
                    JobState::Failed,
                    None,
                    format!("ERROR: internal failure: {e}"),
                )
                .await;
            }
        });

        Ok(job_id)
    }

    /// Forcefully kill the running script.
    ///
    /// Only meaningful while `Running`; in any other state nothing happens
    /// and no line is logged. The script gets no chance to clean up, so a
    /// cancelled script may leave system changes half applied. Returns
    /// whether a kill was issued.
    pub async fn stop(&self) -> bool {
        let mut slot = self.shared.slot.lock().await;
        let Some(active) = slot.active.as_mut() else {
            return false;
        };
        if active.job.state != JobState::Running || active.stop_requested {
            return false;
        }
        // The kill switch refuses once the process is reaped and drained.
        if !active.kill.as_ref().is_some_and(KillSwitch::kill) {
            return false;
        }

        active.stop_requested = true;
        let job_id = active.job.id;
        let line = LogLine::system(format!("Stopping {}...", active.job.display_name));
        tracing::info!(%job_id, "stop requested");
        self.record_locked(&mut slot, job_id, line);
        true
    }

    /// Echo `text` as `> text` and write it to the running script's stdin.
    ///
    /// The echo is logged before the write, so it always precedes whatever
    /// the script prints in response.
    pub async fn send_input(&self, text: &str) -> Result<(), SessionError> {
        let stdin = {
            let mut slot = self.shared.slot.lock().await;
            let (job_id, stdin) = match &slot.active {
                Some(active) if active.job.state == JobState::Running => match &active.stdin {
                    Some(stdin) => (active.job.id, Arc::clone(stdin)),
                    None => return Err(SessionError::NotRunning),
                },
                _ => return Err(SessionError::NotRunning),
            };
            self.record_locked(&mut slot, job_id, LogLine::system(format!("> {text}")));
            stdin
        };

        // Written outside the slot lock: a script that stops reading must
        // not block stop().
        stdin.lock().await.send_line(text).await?;
        Ok(())
    }

    /// Carry out an [`Op`] from a front end.
    ///
    /// Nothing is returned; rejections are published as
    /// [`Event::OpRejected`].
    pub async fn dispatch(&self, op: Op) {
        let rejected = match op {
            Op::RunScript {
                url,
                display_name,
                args,
            } => self.run_script(url, display_name, args).await.err(),
            Op::StopJob => {
                self.stop().await;
                None
            }
            Op::SendInput { text } => self.send_input(&text).await.err(),
            Op::GetSessionState => {
                self.publish(&Event::SessionStateChanged {
                    state: self.current_state(),
                });
                None
            }
            Op::Shutdown => {
                self.shutdown().await;
                None
            }
        };
        if let Some(e) = rejected {
            self.publish(&Event::OpRejected {
                reason: e.to_string(),
            });
        }
    }

    /// Stop the running script, wait for the session to settle and remove
    /// every staged file. New jobs are refused afterwards.
    pub async fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.stop().await;
        self.wait_idle().await;
        self.shared.staging.cleanup_all();
        tracing::info!("session shut down");
    }

    async fn drive(self, job_id: Uuid) {
        let Some((url, args)) = self.with_job(job_id, |j| (j.source_url.clone(), j.args.clone())).await
        else {
            return;
        };

        let content = match self.shared.source.fetch(&url).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "fetch failed");
                return self.fail(job_id, e).await;
            }
        };

        let staging = Arc::clone(&self.shared.staging);
        let path = match tokio::task::spawn_blocking(move || staging.stage(&content)).await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => return self.fail(job_id, e).await,
            Err(e) => return self.fail(job_id, e).await,
        };
        if !self.advance_to_staged(job_id, path.clone()).await {
            // The job vanished; do not leave the file behind.
            self.shared.staging.cleanup(&path);
            return;
        }

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let mut handle = match self.shared.runner.start(&path, &args, line_tx) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "interpreter failed to start");
                return self.fail(job_id, e).await;
            }
        };
        let stdin = handle.take_stdin().map(|s| Arc::new(Mutex::new(s)));
        self.advance_to_running(job_id, handle.kill_switch(), stdin)
            .await;

        let waiter = tokio::spawn(handle.wait(self.shared.options.job_timeout));
        while let Some(line) = line_rx.recv().await {
            let mut slot = self.shared.slot.lock().await;
            self.record_locked(&mut slot, job_id, line);
        }

        // A stop that lands after the process exited keeps its exit code.
        let (state, exit_code, summary) = match waiter.await {
            Ok(Ok(outcome)) => match (outcome.termination, outcome.code) {
                (Termination::Killed, _) => (JobState::Cancelled, None, "[Stopped]".to_string()),
                (Termination::TimedOut, code) => (
                    JobState::Failed,
                    code,
                    format!(
                        "ERROR: script timed out after {}s",
                        self.shared
                            .options
                            .job_timeout
                            .map(|t| t.as_secs())
                            .unwrap_or_default()
                    ),
                ),
                (Termination::Exited, Some(0)) => (
                    JobState::Completed,
                    Some(0),
                    "[Completed] Exit code: 0".to_string(),
                ),
                (Termination::Exited, Some(code)) => (
                    JobState::Failed,
                    Some(code),
                    format!("ERROR: Exit code: {code}"),
                ),
                (Termination::Exited, None) => (
                    JobState::Failed,
                    None,
                    "ERROR: script was terminated by a signal".to_string(),
                ),
            },
            Ok(Err(e)) => (JobState::Failed, None, format!("ERROR: {e}")),
            Err(e) => (
                JobState::Failed,
                None,
                format!("ERROR: script process task failed: {e}"),
            ),
        };
        self.finish_job(job_id, state, exit_code, summary).await;
    }

    async fn with_job<T>(&self, job_id: Uuid, f: impl FnOnce(&ScriptJob) -> T) -> Option<T> {
        let slot = self.shared.slot.lock().await;
        slot.active
            .as_ref()
            .filter(|a| a.job.id == job_id)
            .map(|a| f(&a.job))
    }

    async fn advance_to_staged(&self, job_id: Uuid, path: PathBuf) -> bool {
        let mut slot = self.shared.slot.lock().await;
        let Some(active) = slot.active.as_mut().filter(|a| a.job.id == job_id) else {
            return false;
        };
        if let Err(e) = mark_staged(&mut active.job, path.clone()) {
            tracing::error!(error = %e, "unexpected transition");
            return false;
        }
        self.publish(&Event::JobStateChanged {
            job_id,
            state: JobState::Staged,
        });
        self.set_state(SessionState::Staged);
        self.record_locked(
            &mut slot,
            job_id,
            LogLine::system(format!("Saved to {}", path.display())),
        );
        true
    }

    async fn advance_to_running(
        &self,
        job_id: Uuid,
        kill: KillSwitch,
        stdin: Option<Arc<Mutex<ScriptInput>>>,
    ) {
        let mut slot = self.shared.slot.lock().await;
        let Some(active) = slot.active.as_mut().filter(|a| a.job.id == job_id) else {
            return;
        };
        if let Err(e) = mark_running(&mut active.job) {
            tracing::error!(error = %e, "unexpected transition");
            return;
        }
        active.stdin = stdin;
        // shutdown() may have found the job still Staged and skipped the stop.
        let stop_now = self.shared.shutting_down.load(Ordering::SeqCst) && kill.kill();
        active.stop_requested = stop_now;
        active.kill = Some(kill);
        let stopping = LogLine::system(format!("Stopping {}...", active.job.display_name));
        self.publish(&Event::JobStateChanged {
            job_id,
            state: JobState::Running,
        });
        self.set_state(SessionState::Running);
        if stop_now {
            tracing::info!(%job_id, "stopping for shutdown");
            self.record_locked(&mut slot, job_id, stopping);
        }
    }

    async fn fail(&self, job_id: Uuid, error: impl std::fmt::Display) {
        self.finish_job(job_id, JobState::Failed, None, format!("ERROR: {error}"))
            .await;
    }

    /// Terminal transition, cleanup and return to `Idle`, in that order.
    ///
    /// Runs entirely under the slot lock, so no new job can start before the
    /// staged file is gone. A second call for the same job does nothing.
    async fn finish_job(
        &self,
        job_id: Uuid,
        state: JobState,
        exit_code: Option<i32>,
        summary: String,
    ) {
        let mut slot = self.shared.slot.lock().await;
        if slot.active.as_ref().map(|a| a.job.id) != Some(job_id) {
            return;
        }
        self.record_locked(&mut slot, job_id, LogLine::system(summary));

        let Some(mut active) = slot.active.take() else {
            return;
        };
        let job = &mut active.job;
        if let Err(e) = finish(job, state, exit_code) {
            tracing::error!(error = %e, "unexpected terminal transition");
            job.state = state;
        }
        self.publish(&Event::JobStateChanged { job_id, state });
        self.publish(&Event::JobFinished {
            job_id,
            state,
            exit_code: job.exit_code,
        });
        self.set_state(SessionState::from(state));
        tracing::info!(?state, exit_code = ?job.exit_code, "job finished");

        if let Some(path) = &job.staged_path {
            self.shared.staging.cleanup(path);
        }

        slot.history.push_back(active.job);
        while slot.history.len() > self.shared.options.history_limit {
            slot.history.pop_front();
        }
        self.set_state(SessionState::Idle);
    }

    /// Append a line to the active job and publish it.
    ///
    /// Lines for a job that is no longer active, or already terminal, are
    /// dropped, so nothing is delivered after a job finishes.
    fn record_locked(&self, slot: &mut Slot, job_id: Uuid, line: LogLine) {
        let Some(active) = slot.active.as_mut().filter(|a| a.job.id == job_id) else {
            return;
        };
        if append_line(&mut active.job, line.clone()) {
            self.publish(&Event::JobLog { job_id, line });
        }
    }

    fn set_state(&self, state: SessionState) {
        self.shared.state_tx.send_replace(state);
        self.publish(&Event::SessionStateChanged { state });
    }

    fn publish(&self, event: &Event) {
        self.shared.relay.publish(event);
    }
}
