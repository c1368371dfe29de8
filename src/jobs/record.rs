// src/jobs/record.rs

//! State container for a single job.
//!
//! Readers go through [`JobRecord`]. All mutation goes through a
//! [`JobWriter`], of which exactly one exists per job: the executor owns it
//! first and moves it into the detached-unit monitor on handoff. Finishing
//! consumes the writer, so a terminal job can never be written again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::broadcast::{LogEvent, SubscriberId, Subscribers, Subscription};
use super::types::{JobId, JobSnapshot, JobStatus};

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    exit_code: Option<i32>,
    finished_at: Option<DateTime<Utc>>,
    logs: Vec<String>,
    subscribers: Subscribers,
}

#[derive(Debug)]
pub struct JobRecord {
    id: JobId,
    command: String,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
    status_tx: watch::Sender<JobStatus>,
}

impl JobRecord {
    /// Create a record in `Started` together with its single writer.
    pub fn create(command: impl Into<String>) -> (Arc<JobRecord>, JobWriter) {
        let (status_tx, _) = watch::channel(JobStatus::Started);
        let record = Arc::new(JobRecord {
            id: JobId::new_random(),
            command: command.into(),
            created_at: Utc::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Started,
                exit_code: None,
                finished_at: None,
                logs: Vec::new(),
                subscribers: Subscribers::default(),
            }),
            status_tx,
        });
        let writer = JobWriter {
            record: Arc::clone(&record),
            finished: false,
        };
        (record, writer)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock();
        JobSnapshot {
            job_id: self.id,
            status: state.status,
            exit_code: state.exit_code,
            started_at: self.created_at,
            finished_at: state.finished_at,
            command: self.command.clone(),
        }
    }

    /// Copy of the accumulated log.
    pub fn logs(&self) -> Vec<String> {
        self.lock().logs.clone()
    }

    /// Capture the log so far and register a live endpoint, atomically with
    /// respect to the writer.
    ///
    /// If the job is already terminal, the endpoint is not registered and its
    /// stream holds only [`LogEvent::End`].
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let mut state = self.lock();
        let history = state.logs.clone();
        let (id, rx) = state.subscribers.register();
        if state.status.is_terminal() {
            state.subscribers.close();
        }
        drop(state);

        debug!(job_id = %self.id, history = history.len(), "subscriber registered");
        Subscription::new(id, history, rx, Arc::clone(self))
    }

    /// Remove an endpoint. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.lock().subscribers.remove(id) {
            debug!(job_id = %self.id, "subscriber removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Resolve once the job is terminal, returning its final snapshot.
    pub async fn wait_finished(&self) -> JobSnapshot {
        let mut rx = self.status_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a
        // closed channel.
        let _ = rx.wait_for(|status| status.is_terminal()).await;
        self.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive write access to one job.
#[derive(Debug)]
pub struct JobWriter {
    record: Arc<JobRecord>,
    finished: bool,
}

impl JobWriter {
    pub fn job_id(&self) -> JobId {
        self.record.id
    }

    pub fn record(&self) -> &Arc<JobRecord> {
        &self.record
    }

    /// `Started -> Running`.
    pub fn mark_running(&mut self) {
        self.transition(JobStatus::Running, |_| {});
    }

    /// Append a line and deliver it to every current subscriber.
    pub fn append(&mut self, line: impl Into<String>) {
        let line = line.into();
        let mut state = self.record.lock();
        if state.status.is_terminal() {
            warn!(job_id = %self.record.id, "dropping log line for finished job");
            return;
        }
        state.subscribers.deliver(&line);
        state.logs.push(line);
    }

    /// Finalize with a status derived from the exit code.
    pub fn finish_with_exit_code(self, exit_code: i32) {
        self.finish(JobStatus::from_exit_code(exit_code), exit_code);
    }

    /// Record the terminal status, exit code and finish time, then send the
    /// end-of-stream sentinel to every subscriber.
    pub fn finish(mut self, status: JobStatus, exit_code: i32) {
        self.finalize(status, exit_code);
    }

    fn finalize(&mut self, status: JobStatus, exit_code: i32) {
        if !status.is_terminal() {
            error!(
                job_id = %self.record.id,
                %status,
                "refusing to finish with a non-terminal status"
            );
            return;
        }
        let applied = self.transition(status, |state| {
            state.exit_code = Some(exit_code);
            state.finished_at = Some(Utc::now());
            state.subscribers.close();
        });
        if applied {
            self.finished = true;
            debug!(job_id = %self.record.id, %status, exit_code, "job finished");
        }
    }

    /// The single assignment point for `status`. Illegal transitions are
    /// logged and ignored.
    fn transition(&mut self, next: JobStatus, apply: impl FnOnce(&mut JobState)) -> bool {
        let mut state = self.record.lock();
        let current = state.status;
        if !current.can_transition_to(next) {
            error!(
                job_id = %self.record.id,
                from = %current,
                to = %next,
                "illegal job status transition"
            );
            return false;
        }
        state.status = next;
        apply(&mut state);
        drop(state);

        self.record.status_tx.send_replace(next);
        true
    }
}

impl Drop for JobWriter {
    fn drop(&mut self) {
        if self.finished || self.record.status().is_terminal() {
            return;
        }
        error!(job_id = %self.record.id, "job driver dropped before finishing");
        if self.record.status() == JobStatus::Started {
            self.mark_running();
        }
        self.append("Internal Error: job driver exited before the job finished");
        self.finalize(JobStatus::Failed, -1);
    }
}
