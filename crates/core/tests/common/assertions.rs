//! Custom assertion helpers over relayed events.

use ab_protocol::ipc::Event;
use ab_protocol::job_models::{JobState, LogLine};
use uuid::Uuid;

/// Text of every `JobLog` event, in delivery order.
#[allow(dead_code)]
pub fn log_texts(events: &[Event]) -> Vec<String> {
    log_lines(events).into_iter().map(|l| l.text).collect()
}

#[allow(dead_code)]
pub fn log_lines(events: &[Event]) -> Vec<LogLine> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::JobLog { line, .. } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// Job states in the order they were announced.
#[allow(dead_code)]
pub fn job_states(events: &[Event]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::JobStateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Extract the job id from the first `JobStarted` event.
#[allow(dead_code)]
pub fn started_job_id(events: &[Event]) -> Option<Uuid> {
    events.iter().find_map(|e| match e {
        Event::JobStarted { job_id, .. } => Some(*job_id),
        _ => None,
    })
}

/// Assert the event sequence of a single job is well formed.
///
/// Checks that:
/// 1. `JobStarted` comes before any other event of the job
/// 2. `JobFinished` is the last event of the job
/// 3. No log line is delivered after the terminal state
#[allow(dead_code)]
pub fn assert_job_sequence(events: &[Event]) {
    let job_events: Vec<&Event> = events.iter().filter(|e| e.job_id().is_some()).collect();
    assert!(!job_events.is_empty(), "Event sequence is empty");

    assert!(
        matches!(job_events[0], Event::JobStarted { .. }),
        "First event should be JobStarted, got: {:?}",
        job_events[0]
    );

    let last = job_events[job_events.len() - 1];
    assert!(
        matches!(last, Event::JobFinished { .. }),
        "Last event should be JobFinished, got: {:?}",
        last
    );

    let terminal_at = job_events
        .iter()
        .position(|e| matches!(e, Event::JobStateChanged { state, .. } if state.is_terminal()))
        .expect("terminal state should be announced");
    assert!(
        !job_events[terminal_at..]
            .iter()
            .any(|e| matches!(e, Event::JobLog { .. })),
        "no log line may follow the terminal state"
    );
}

/// Assert that a string contains a substring (case-insensitive).
#[allow(dead_code)]
pub fn assert_contains_ci(haystack: &str, needle: &str) {
    assert!(
        haystack.to_lowercase().contains(&needle.to_lowercase()),
        "Expected '{}' to contain '{}' (case-insensitive)",
        haystack,
        needle
    );
}
