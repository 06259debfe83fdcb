//! Interpreter subprocess runner.
//!
//! This module spawns the script interpreter against a staged file with
//! stdout and stderr redirected, and streams each completed line as a
//! [`LogLine`] while the process runs.

use ab_protocol::config_models::RunnerConfig;
use ab_protocol::job_models::{LogLine, LogSource};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to start '{program}': {source}")]
    StartFailed {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed waiting for the script process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to write to script stdin: {0}")]
    Input(#[source] std::io::Error),
}

/// Launches the configured interpreter.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    leading_args: Vec<String>,
    drain_grace: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
            drain_grace: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
            .with_drain_grace(Duration::from_millis(config.drain_grace_ms))
    }

    /// How long to wait for pipe EOF after a forced kill.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the interpreter can be found on `PATH` (or at its given path).
    pub fn interpreter_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Spawn the interpreter against `script`.
    ///
    /// The command line is `<program> <leading args> <script> <args>`.
    /// Each line the child writes to stdout or stderr is sent on `lines` as
    /// soon as it is complete. Lines from one stream keep their order; the
    /// two streams interleave as the OS delivers them.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::StartFailed`] when the process cannot be
    /// spawned (missing interpreter, permission denied).
    pub fn start(
        &self,
        script: &Path,
        args: &[String],
        lines: mpsc::UnboundedSender<LogLine>,
    ) -> Result<RunHandle, RunnerError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(script)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd.spawn().map_err(|source| RunnerError::StartFailed {
            program: self.program.clone(),
            source,
        })?;
        tracing::info!(
            program = %self.program,
            script = %script.display(),
            pid = ?child.id(),
            "script process started"
        );

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, lines.clone(), LogSource::StdOut));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, lines, LogSource::StdErr));
        }

        let stdin = child.stdin.take().map(ScriptInput);
        let (kill_tx, kill_rx) = mpsc::channel(1);

        Ok(RunHandle {
            child,
            readers,
            stdin,
            kill_tx,
            kill_rx,
            drain_grace: self.drain_grace,
        })
    }
}

fn spawn_reader<R>(
    stream: R,
    lines: mpsc::UnboundedSender<LogLine>,
    source: LogSource,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    // Scripts write in whatever code page the host uses.
                    if lines.send(LogLine::new(source, decode_line(&buf))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed reading script output");
                    break;
                }
            }
        }
    })
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(raw: &[u8]) -> std::borrow::Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// How a script process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Exited,
    /// The process was killed through a [`KillSwitch`].
    Killed,
    /// The process outlived the deadline passed to [`RunHandle::wait`] and was killed.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, absent when the process died from a signal.
    pub code: Option<i32>,
    pub termination: Termination,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.code == Some(0)
    }
}

/// Cloneable handle for killing a running script from another task.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: mpsc::Sender<()>,
}

impl KillSwitch {
    /// Request immediate termination.
    ///
    /// Returns `false` when the process has already been reaped, in which
    /// case nothing happens.
    pub fn kill(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            // A kill is already queued.
            Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Writer for a running script's stdin.
#[derive(Debug)]
pub struct ScriptInput(ChildStdin);

impl ScriptInput {
    /// Write `text` followed by a newline.
    pub async fn send_line(&mut self, text: &str) -> Result<(), RunnerError> {
        self.0
            .write_all(format!("{text}\n").as_bytes())
            .await
            .map_err(RunnerError::Input)?;
        self.0.flush().await.map_err(RunnerError::Input)
    }
}

/// A running script process.
#[derive(Debug)]
pub struct RunHandle {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    stdin: Option<ScriptInput>,
    kill_tx: mpsc::Sender<()>,
    kill_rx: mpsc::Receiver<()>,
    drain_grace: Duration,
}

impl RunHandle {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            tx: self.kill_tx.clone(),
        }
    }

    /// Take the stdin writer. Returns `None` on the second call.
    pub fn take_stdin(&mut self) -> Option<ScriptInput> {
        self.stdin.take()
    }

    /// Kill the process right away.
    ///
    /// Returns `false` if it had already exited.
    pub fn kill(&mut self) -> bool {
        self.child.start_kill().is_ok()
    }

    /// Wait for the process to exit and for both output streams to end.
    ///
    /// With a `deadline`, a process still running after that long is killed
    /// and reported as [`Termination::TimedOut`]. After any forced kill the
    /// readers get the drain grace period to reach end-of-stream; readers
    /// still blocked after that (a grandchild holding the pipe) are aborted,
    /// so no line is delivered once this returns.
    ///
    /// A process that exits on its own can leave the pipes open through a
    /// background child. The kill switch and the deadline stay armed until
    /// both streams end; either one then drops the remaining output after
    /// the drain grace, and the outcome keeps the exit code.
    pub async fn wait(mut self, deadline: Option<Duration>) -> Result<ExitOutcome, RunnerError> {
        let mut termination = Termination::Exited;
        let timer = async {
            match deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        let status: ExitStatus = loop {
            tokio::select! {
                status = self.child.wait() => break status.map_err(RunnerError::Wait)?,
                Some(()) = self.kill_rx.recv(), if termination == Termination::Exited => {
                    termination = Termination::Killed;
                    if let Err(e) = self.child.start_kill() {
                        tracing::debug!(error = %e, "kill after exit ignored");
                    }
                }
                () = &mut timer, if termination == Termination::Exited => {
                    termination = Termination::TimedOut;
                    if let Err(e) = self.child.start_kill() {
                        tracing::debug!(error = %e, "kill after exit ignored");
                    }
                }
            }
        };

        // Closing stdin lets a script blocked on input see EOF.
        drop(self.stdin.take());

        let readers = std::mem::take(&mut self.readers);
        let aborts: Vec<_> = readers.iter().map(|r| r.abort_handle()).collect();
        let drain = join_readers(readers);
        tokio::pin!(drain);

        let forced = termination != Termination::Exited;
        let cut_short = forced
            || tokio::select! {
                () = &mut drain => false,
                Some(()) = self.kill_rx.recv() => {
                    tracing::info!("stop requested after exit, output still open");
                    true
                }
                () = &mut timer => {
                    tracing::warn!("output still open at the job deadline");
                    true
                }
            };
        // Later kill requests report that the process is gone.
        self.kill_rx.close();

        if cut_short && tokio::time::timeout(self.drain_grace, &mut drain).await.is_err() {
            tracing::warn!("output pipes still open, dropping remaining output");
            for abort in aborts {
                abort.abort();
            }
        }

        let outcome = ExitOutcome {
            code: status.code(),
            termination,
        };
        tracing::info!(code = ?outcome.code, termination = ?outcome.termination, "script process ended");
        Ok(outcome)
    }
}

async fn join_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let _ = reader.await;
    }
}
