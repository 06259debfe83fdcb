//! Test fixtures for building controllers and sample projects.

use ab_core::fetch::ScriptSource;
use ab_core::relay::{ChannelListener, OutputRelay};
use ab_core::runner::ProcessRunner;
use ab_core::session::{SessionController, SessionOptions};
use ab_core::staging::StagingArea;
use ab_protocol::ipc::Event;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Upper bound for any single job in these tests.
#[allow(dead_code)]
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// A controller wired to a private staging directory, the POSIX shell
/// and a channel that receives every relayed event.
///
/// The `TempDir` must be kept alive for the test duration.
#[allow(dead_code)]
pub struct TestHarness {
    pub controller: SessionController,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub staging_dir: TempDir,
}

#[allow(dead_code)]
pub fn harness(source: impl ScriptSource + 'static) -> TestHarness {
    harness_with(source, shell_runner(), SessionOptions::default())
}

#[allow(dead_code)]
pub fn harness_with(
    source: impl ScriptSource + 'static,
    runner: ProcessRunner,
    options: SessionOptions,
) -> TestHarness {
    let staging_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let staging = StagingArea::new(staging_dir.path().join("staged"), "sh");
    harness_with_staging(source, runner, options, staging, staging_dir)
}

#[allow(dead_code)]
pub fn harness_with_staging(
    source: impl ScriptSource + 'static,
    runner: ProcessRunner,
    options: SessionOptions,
    staging: StagingArea,
    staging_dir: TempDir,
) -> TestHarness {
    let relay = Arc::new(OutputRelay::new());
    let (listener, events) = ChannelListener::new();
    relay.subscribe(Arc::new(listener));

    let controller = SessionController::new(
        Arc::new(source),
        Arc::new(staging),
        runner,
        relay,
        options,
    );

    TestHarness {
        controller,
        events,
        staging_dir,
    }
}

/// `sh` with a short drain grace so killed jobs settle quickly.
#[allow(dead_code)]
pub fn shell_runner() -> ProcessRunner {
    ProcessRunner::new("sh", vec![]).with_drain_grace(Duration::from_millis(500))
}

/// Collect events until `JobFinished` arrives or `timeout` elapses.
#[allow(dead_code)]
pub async fn collect_until_finished(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    collect_until(rx, timeout, |e| matches!(e, Event::JobFinished { .. })).await
}

/// Collect events until one satisfies `done` (inclusive) or `timeout` elapses.
#[allow(dead_code)]
pub async fn collect_until(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    timeout: Duration,
    done: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => {
                let finished = done(&event);
                events.push(event);
                if finished {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => panic!("Timed out waiting for event; collected so far: {:#?}", events),
        }
    }

    events
}

/// Drain whatever is already queued without waiting.
#[allow(dead_code)]
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Create a temporary project directory with `.autobyte` configuration.
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let ab_dir = temp_dir.path().join(".autobyte");
    std::fs::create_dir_all(ab_dir.join("scripts"))?;

    std::fs::write(
        ab_dir.join("config.toml"),
        r#"
[fetch]
timeout_secs = 5

[staging]
dir_name = "autobyte-test"
extension = "sh"

[runner]
program = "sh"
args = []
drain_grace_ms = 500

[session]
history_limit = 2
"#,
    )?;

    std::fs::write(
        ab_dir.join("scripts/greet.md"),
        r#"---
name: greet
url: https://scripts.example.com/greet.sh
args: ["world"]
---
Prints a greeting."#,
    )?;

    Ok(temp_dir)
}
