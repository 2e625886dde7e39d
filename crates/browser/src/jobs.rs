//! Background jobs - timers and other deferred script work
//!
//! Best effort only: jobs are tokio tasks tracked by id so a window can
//! interrupt them when its page goes away, and the client can wait for them
//! before shutting down. No ordering guarantees between jobs.

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub type JobId = u64;

/// Poll interval while waiting for jobs to drain
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct JobManager {
    /// Owner label for logging
    label: String,
    jobs: Arc<DashMap<JobId, JoinHandle<()>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl JobManager {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            jobs: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Start a job; `None` once the manager was shut down
    ///
    /// Must be called within a tokio runtime.
    pub fn start_job<F>(&self, name: &str, job: F) -> Option<JobId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::debug!("[JobManager] {}: refusing job {} after shutdown", self.label, name);
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let jobs = self.jobs.clone();
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let label = self.label.clone();
        let name = name.to_string();

        let handle = tokio::spawn(async move {
            // don't race our own registration
            let _ = registered_rx.await;
            tracing::debug!("[JobManager] {}: job {} ({}) started", label, id, name);
            job.await;
            jobs.remove(&id);
            tracing::debug!("[JobManager] {}: job {} ({}) finished", label, id, name);
        });

        self.jobs.insert(id, handle);
        let _ = registered_tx.send(());
        Some(id)
    }

    /// Jobs still pending or running
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Abort one job; false if it already finished
    pub fn interrupt(&self, id: JobId) -> bool {
        match self.jobs.remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                tracing::debug!("[JobManager] {}: job {} interrupted", self.label, id);
                true
            }
            None => false,
        }
    }

    pub fn interrupt_all(&self) -> usize {
        let ids: Vec<JobId> = self.jobs.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|&id| self.interrupt(id)).count()
    }

    /// Wait until every job finished, including jobs started meanwhile;
    /// true when that happened before `timeout`
    pub async fn join_all(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.jobs.is_empty() {
                return true;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(JOIN_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Wait up to `timeout`, then report how many jobs remain
    pub async fn wait_for_jobs(&self, timeout: Duration) -> usize {
        self.join_all(timeout).await;
        self.job_count()
    }

    /// Interrupt everything and refuse new jobs
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let interrupted = self.interrupt_all();
        if interrupted > 0 {
            tracing::debug!("[JobManager] {}: {} job(s) interrupted on shutdown", self.label, interrupted);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("label", &self.label)
            .field("jobs", &self.jobs.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.value().abort();
        }
    }
}
