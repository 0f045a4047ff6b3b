//! Progress-event delivery: serializer channel, heartbeat, and the
//! terminal-event guarantee.
//!
//! Every producer (orchestrator and each sub-investigator) writes into one
//! mpsc queue; the consumer side reads events in FIFO order. The consumer
//! wrapper enforces the stream contract: exactly one terminal event, and
//! nothing delivered after it. Dropping the consumer cancels the
//! investigation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lt_domain::{Phase, ProgressEvent};

/// Sending half used by the orchestrator and all sub-investigators.
///
/// Emission is infallible from the producer's perspective: if the consumer
/// is gone the event is dropped and cancellation takes care of shutdown.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSink {
    pub fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("event dropped: consumer disconnected");
        }
    }
}

/// Consuming half handed to the delivery edge.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    terminal_seen: bool,
}

impl EventStream {
    /// Receive the next event. Returns `None` once the stream has ended:
    /// after the terminal event, or after all producers are gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        if self.terminal_seen {
            return None;
        }
        let event = self.rx.recv().await?;
        if event.is_terminal() {
            self.terminal_seen = true;
            self.rx.close();
        }
        Some(event)
    }

    /// Drain the whole stream into a vector (test helper for non-streaming
    /// callers).
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // Consumer disconnect is the cancellation signal for the whole
        // investigation.
        self.cancel.cancel();
    }
}

/// Create the linked sink/stream pair for one investigation.
pub fn event_channel(cancel: CancellationToken) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink { tx },
        EventStream {
            rx,
            cancel,
            terminal_seen: false,
        },
    )
}

/// Shared progress state read by the heartbeat task.
pub struct ProgressTracker {
    phase: Mutex<Phase>,
    sources_completed: AtomicUsize,
    sources_total: AtomicUsize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            phase: Mutex::new(Phase::Routing),
            sources_completed: AtomicUsize::new(0),
            sources_total: AtomicUsize::new(0),
        }
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_sources(&self, count: usize) {
        self.sources_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn complete_source(&self) {
        self.sources_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.sources_completed.load(Ordering::Relaxed),
            self.sources_total.load(Ordering::Relaxed),
        )
    }

    /// Build a heartbeat event from the current state.
    pub fn heartbeat(&self) -> ProgressEvent {
        let phase = self.phase();
        let (completed, total) = self.counts();
        ProgressEvent::Heartbeat {
            ts: Utc::now(),
            progress_percent: phase.progress_percent(completed, total),
            phase,
            sources_completed: completed,
            sources_total: total,
        }
    }
}

/// Spawn the heartbeat producer. Runs until `stop` is cancelled.
pub fn spawn_heartbeat(
    sink: EventSink,
    tracker: std::sync::Arc<ProgressTracker>,
    interval: std::time::Duration,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so heartbeats start one
        // interval in.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => sink.emit(tracker.heartbeat()),
            }
        }
    })
}
