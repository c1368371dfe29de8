// src/jobs/registry.rs

//! Owner of every job created by this controller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{JobctlError, Result};
use crate::exec::{ExecutionContext, run_job};

use super::broadcast::Subscription;
use super::record::JobRecord;
use super::types::{JobId, JobSnapshot};

/// Creates jobs, starts their executors, and answers lookups.
///
/// Jobs are kept for the lifetime of the registry.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobRecord>>>,
    drivers: Mutex<Vec<JoinHandle<()>>>,
    context: ExecutionContext,
}

impl JobRegistry {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            drivers: Mutex::new(Vec::new()),
            context,
        }
    }

    /// Register a job for `argv` and start its executor in the background.
    ///
    /// Returns immediately; the process is spawned by the background task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the driver task is
    /// spawned onto the current one.
    pub fn create_job(&self, argv: Vec<String>) -> JobId {
        let (record, writer) = JobRecord::create(argv.join(" "));
        let id = record.id();

        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);
        info!(job_id = %id, cmd = %argv.join(" "), "job created");

        let ctx = self.context.clone();
        let driver = tokio::spawn(async move {
            run_job(writer, argv, ctx).await;
            debug!(job_id = %id, "job driver finished");
        });

        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        drivers.retain(|handle| !handle.is_finished());
        drivers.push(driver);

        id
    }

    /// Stop every job driver that is still running and wait for it to unwind.
    ///
    /// Dropping a driver kills the processes it owns (the job command and any
    /// unit log follower with its process group). Detached units are left to
    /// the service manager. Unfinished jobs end `Failed` with exit code -1.
    pub async fn shutdown(&self) {
        let drivers: Vec<JoinHandle<()>> = self
            .drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for driver in drivers {
            driver.abort();
            if let Err(err) = driver.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "job driver failed during shutdown");
                }
            }
        }
        info!("job registry shut down");
    }

    pub fn job(&self, id: JobId) -> Option<Arc<JobRecord>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Current status of a job.
    pub fn get_job(&self, id: JobId) -> Option<JobSnapshot> {
        self.job(id).map(|record| record.snapshot())
    }

    /// Log history plus a live stream ending in a single end-of-stream event.
    pub fn subscribe(&self, id: JobId) -> Result<Subscription> {
        self.job(id)
            .map(|record| record.subscribe())
            .ok_or(JobctlError::JobNotFound(id))
    }

    /// Wait until the job is terminal and return its final snapshot.
    pub async fn wait(&self, id: JobId) -> Result<JobSnapshot> {
        let record = self.job(id).ok_or(JobctlError::JobNotFound(id))?;
        Ok(record.wait_finished().await)
    }

    /// Snapshots of jobs that have not finished yet, oldest first.
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        let mut active: Vec<JobSnapshot> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|record| record.snapshot())
            .filter(|snap| !snap.status.is_terminal())
            .collect();
        active.sort_by_key(|snap| snap.started_at);
        active
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(ExecutionContext::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobStatus, LogEvent};
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn test_create_and_complete() {
        let registry = JobRegistry::default();
        let id = registry.create_job(vec!["echo".into(), "hello".into()]);

        let snap = registry.get_job(id).unwrap();
        assert_eq!(snap.command, "echo hello");

        let done = tokio::time::timeout(Duration::from_secs(5), registry.wait(id))
            .await
            .expect("timeout waiting for job")
            .unwrap();
        assert_eq!(done.status, JobStatus::Success);
        assert_eq!(done.exit_code, Some(0));
        assert_eq!(registry.job(id).unwrap().logs(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::default();
        let other = JobRecord::create("x").0.id();
        assert!(registry.get_job(other).is_none());
        assert!(matches!(
            registry.subscribe(other),
            Err(JobctlError::JobNotFound(id)) if id == other
        ));
        assert!(registry.wait(other).await.is_err());
    }

    #[tokio::test]
    async fn test_active_jobs_lists_running_only() {
        let registry = JobRegistry::default();
        let quick = registry.create_job(sh("true"));
        let slow = registry.create_job(sh("sleep 5"));
        registry.wait(quick).await.unwrap();

        let active = registry.active_jobs();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].job_id, slow);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_create_job_outside_runtime_panics() {
        let registry = JobRegistry::default();
        registry.create_job(sh("true"));
    }

    #[tokio::test]
    async fn test_shutdown_fails_unfinished_jobs() {
        let registry = JobRegistry::default();
        let done = registry.create_job(sh("true"));
        registry.wait(done).await.unwrap();
        let slow = registry.create_job(sh("echo started; exec sleep 30"));
        let mut sub = registry.subscribe(slow).unwrap();
        assert_eq!(sub.recv().await, Some(LogEvent::Line("started".into())));

        tokio::time::timeout(Duration::from_secs(5), registry.shutdown())
            .await
            .expect("shutdown did not complete");

        let snap = registry.get_job(slow).unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.exit_code, Some(-1));
        assert_eq!(registry.get_job(done).unwrap().status, JobStatus::Success);
        let last_line = sub.recv().await;
        assert!(matches!(last_line, Some(LogEvent::Line(l)) if l.starts_with("Internal Error")));
        assert_eq!(sub.recv().await, Some(LogEvent::End));
    }

    #[tokio::test]
    async fn test_subscribe_streams_live_lines() {
        let registry = JobRegistry::default();
        let id = registry.create_job(sh("sleep 0.2; echo one; echo two"));
        let mut sub = registry.subscribe(id).unwrap();

        let mut seen = sub.take_history();
        while let Some(event) = sub.recv().await {
            match event {
                LogEvent::Line(line) => seen.push(line),
                LogEvent::End => break,
            }
        }
        assert_eq!(seen, vec!["one", "two"]);
        assert!(sub.recv().await.is_none());
    }
}
