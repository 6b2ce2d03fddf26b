//! Self-rescheduling recurring tasks.
//!
//! A task is an async closure returning the delay before its next run, so
//! runs of one task never overlap. Each task runs on its own tokio task and
//! stops when its [`RecurringTask`] handle is stopped or the owning
//! [`Scheduler`] shuts down.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns recurring tasks that share one shutdown signal.
#[derive(Debug, Default)]
pub struct Scheduler {
    cancel: CancellationToken,
}

/// Handle to one recurring task.
#[derive(Debug)]
pub struct RecurringTask {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RecurringTask {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task and wait for it to wind down. A run in progress is
    /// dropped at its next suspension point.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(task = %self.name, error = %e, "recurring task ended abnormally");
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `initial_delay`, then again after whatever delay each
    /// run returns.
    pub fn queue_recurring_task<F, Fut>(
        &self,
        name: impl Into<String>,
        initial_delay: Duration,
        mut task: F,
    ) -> RecurringTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        let name = name.into();
        let cancel = self.cancel.child_token();
        let token = cancel.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut delay = initial_delay;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                delay = tokio::select! {
                    () = token.cancelled() => break,
                    next = task() => next,
                };
                tracing::debug!(task = %task_name, next_in = ?delay, "recurring task rescheduled");
            }
            tracing::debug!(task = %task_name, "recurring task stopped");
        });

        RecurringTask {
            name,
            cancel,
            handle,
        }
    }

    /// Cancel every task queued on this scheduler.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
