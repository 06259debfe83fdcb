//! Output relay.
//!
//! The relay fans every [`Event`] out to all current subscribers,
//! synchronously and in subscription order. It keeps nothing after delivery.
//!
//! Publishing happens on whichever task produced the event, so listeners
//! must not touch UI state directly. A front end subscribes a
//! [`ChannelListener`] and drains the channel on its own thread.

use ab_protocol::ipc::Event;
use ab_protocol::job_models::{LogLine, LogSource};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Receives events from the relay.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> Listener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Identifies a subscription for [`OutputRelay::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Arc<dyn Listener>)>,
}

/// Fan-out dispatcher for job events.
#[derive(Default)]
pub struct OutputRelay {
    subscribers: RwLock<Subscribers>,
}

impl OutputRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> SubscriptionId {
        let mut subs = self.write();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.listeners.push((id, listener));
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.write();
        let before = subs.listeners.len();
        subs.listeners.retain(|(sid, _)| *sid != id);
        subs.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().listeners.len()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Listeners run outside the subscriber lock, so a listener may
    /// subscribe or unsubscribe without deadlocking. A listener that panics
    /// is logged and skipped; the rest still receive the event.
    pub fn publish(&self, event: &Event) {
        let listeners: Vec<Arc<dyn Listener>> = self
            .read()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("unknown panic");
                tracing::error!(reason, ?event, "relay listener panicked");
            }
        }
    }

    /// Subscribe a channel and expose it as a stream of events.
    ///
    /// The subscription ends when the stream is dropped and the next event
    /// fails to send.
    pub fn event_stream(
        &self,
    ) -> (SubscriptionId, Pin<Box<dyn Stream<Item = Event> + Send>>) {
        let (listener, mut rx) = ChannelListener::new();
        let id = self.subscribe(Arc::new(listener));
        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        (id, Box::pin(stream))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Subscribers> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Subscribers> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Forwards events into an unbounded channel.
///
/// This is the hand-off point between the task that produces output and
/// the thread that owns the UI.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl Listener for ChannelListener {
    fn on_event(&self, event: &Event) {
        // A closed receiver means the front end went away.
        let _ = self.tx.send(event.clone());
    }
}

/// Keeps the most recent log lines of every job.
#[derive(Debug)]
pub struct HistoryListener {
    capacity: usize,
    lines: Mutex<VecDeque<LogLine>>,
}

impl HistoryListener {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.buffer().iter().cloned().collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.buffer().iter().map(|l| l.text.clone()).collect()
    }

    /// Empty the buffer (the "Clear" button of a log pane).
    pub fn clear(&self) {
        self.buffer().clear();
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, VecDeque<LogLine>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Listener for HistoryListener {
    fn on_event(&self, event: &Event) {
        if let Event::JobLog { line, .. } = event {
            let mut lines = self.buffer();
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            if self.capacity > 0 {
                lines.push_back(line.clone());
            }
        }
    }
}

/// Writes job output and transitions to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn on_event(&self, event: &Event) {
        match event {
            Event::JobLog { job_id, line } => match line.source {
                LogSource::StdErr => tracing::warn!(target: "autobyte::script", %job_id, "{}", line.text),
                LogSource::StdOut | LogSource::System => {
                    tracing::info!(target: "autobyte::script", %job_id, "{}", line.text)
                }
            },
            Event::JobFinished {
                job_id,
                state,
                exit_code,
            } => tracing::info!(%job_id, ?state, ?exit_code, "job finished"),
            _ => tracing::trace!(?event, "relay event"),
        }
    }
}
