// src/jobs/broadcast.rs

//! Per-job fan-out of log lines to live subscribers.
//!
//! Every subscriber owns an unbounded channel, so delivery never waits on a
//! slow or abandoned consumer. The set itself is not synchronized; it lives
//! inside the job's state lock (see [`super::record`]) so that appending a
//! line and registering a subscriber are mutually atomic.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use super::record::JobRecord;

/// An item on a subscriber's live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Line(String),
    /// End of stream. Always the last event, delivered exactly once.
    End,
}

/// Identifies one registered endpoint within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    endpoints: HashMap<SubscriberId, mpsc::UnboundedSender<LogEvent>>,
}

impl Subscribers {
    pub(crate) fn register(&mut self) -> (SubscriberId, mpsc::UnboundedReceiver<LogEvent>) {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.insert(id, tx);
        (id, rx)
    }

    /// Push a line to every endpoint. Endpoints whose receiver is gone are
    /// pruned.
    pub(crate) fn deliver(&mut self, line: &str) {
        self.endpoints.retain(|id, tx| {
            let alive = tx.send(LogEvent::Line(line.to_owned())).is_ok();
            if !alive {
                trace!(subscriber = id.0, "pruning closed subscriber");
            }
            alive
        });
    }

    /// Push the end-of-stream sentinel to every endpoint and drop them all.
    pub(crate) fn close(&mut self) {
        for (_, tx) in self.endpoints.drain() {
            let _ = tx.send(LogEvent::End);
        }
    }

    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        self.endpoints.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.endpoints.len()
    }
}

/// A subscriber's view of a job: the log as it was at subscription time, then
/// every later line, then [`LogEvent::End`].
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    history: Vec<String>,
    rx: mpsc::UnboundedReceiver<LogEvent>,
    job: Option<Arc<JobRecord>>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        history: Vec<String>,
        rx: mpsc::UnboundedReceiver<LogEvent>,
        job: Arc<JobRecord>,
    ) -> Self {
        Self {
            id,
            history,
            rx,
            job: Some(job),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Lines that existed when the subscription was taken.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Hand the history over to the caller, leaving it empty here.
    pub fn take_history(&mut self) -> Vec<String> {
        std::mem::take(&mut self.history)
    }

    /// Next live event. Returns `None` once `End` has been consumed.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.rx.try_recv().ok()
    }

    /// Remove this endpoint from the job. Calling it again, or after the job
    /// has terminated, does nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(job) = self.job.take() {
            job.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
