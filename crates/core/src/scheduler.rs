//! Polling scheduler driving periodic re-evaluation.
//!
//! The scheduler owns its cancellation handle; stopping it cancels the
//! pending timer, so no scheduled tick ever outlives its owner.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct PollScheduler {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Spawn the polling loop.
    ///
    /// `tick` runs once immediately, then again after each delay it
    /// returns. Re-reading the cadence inside the tick means a changed
    /// refresh preference takes effect on the next cycle.
    pub fn spawn<F, Fut>(mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Duration> + Send,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let delay = tick().await;
                tokio::select! {
                    _ = rx.changed() => {
                        debug!("Polling scheduler stopped");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        });
        Self {
            shutdown,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Cancel the pending timer and wait for the loop to exit. A tick
    /// already in flight finishes first.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        // Dropped without stop(): abort rather than leak the loop.
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
