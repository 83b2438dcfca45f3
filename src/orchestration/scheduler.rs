//! # Scheduler Abstraction
//!
//! The orchestrator depends on this small abstraction instead of a concrete
//! timer implementation: "schedule a repeating fixed-delay job, get a
//! cancellable handle back". Production uses the tokio-backed scheduler;
//! tests drive the jobs deterministically through a manual implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// A repeating job: every invocation returns a fresh future for one run.
pub type RecurringJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Cancellable handle on a scheduled job.
///
/// Cancelling is idempotent and safe to call at any time; a cancelled job
/// finishes its current run and is never started again.
#[derive(Debug, Clone)]
pub struct ScheduledJobHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ScheduledJobHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
            debug!(job_id = %self.id, "Scheduled job cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn wait_for_cancellation(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

impl Default for ScheduledJobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedules repeating background jobs.
pub trait TaskScheduler: Send + Sync {
    /// Schedule a job to run repeatedly, waiting `delay` between the end of
    /// one run and the start of the next. The first run starts immediately.
    fn schedule_fixed_delay(&self, job: RecurringJob, delay: Duration) -> ScheduledJobHandle;
}

/// Tokio-backed scheduler: each job runs on its own spawned task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTaskScheduler;

impl TokioTaskScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn schedule_fixed_delay(&self, job: RecurringJob, delay: Duration) -> ScheduledJobHandle {
        let handle = ScheduledJobHandle::new();
        let job_handle = handle.clone();

        tokio::spawn(async move {
            loop {
                if job_handle.is_cancelled() {
                    break;
                }

                job().await;

                if job_handle.is_cancelled() {
                    break;
                }

                let notify = job_handle.wait_for_cancellation();
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            debug!(job_id = %job_handle.id(), "Scheduled job loop ended");
        });

        handle
    }
}
