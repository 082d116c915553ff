//! Background notification dispatcher
//!
//! One process-wide pool executes every background notification. The
//! pool is an explicitly owned value wired into the notifier at startup
//! and shut down exactly once during teardown; shutdown cancels
//! in-flight and queued work immediately rather than draining it.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::notifier::NotificationResult;

pub struct NotificationDispatcher {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Submits one notification task and returns a handle to its
    /// eventual result. Never blocks beyond task submission. After
    /// shutdown, submissions resolve immediately to a failed result.
    pub fn submit<F>(&self, work: F) -> JoinHandle<NotificationResult>
    where
        F: Future<Output = NotificationResult> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return tokio::spawn(async {
                NotificationResult::failure(None, "notification dispatcher is shut down")
            });
        }

        let cancelled = self.shutdown.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    NotificationResult::failure(None, "notification cancelled during shutdown")
                }
                result = work => result,
            }
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels all in-flight and queued tasks and stops accepting new
    /// work. Called exactly once during system teardown.
    pub async fn shutdown(&self) {
        debug!("Shutting down notification dispatcher");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
