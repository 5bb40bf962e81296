//! Background flushing.
//!
//! Aggregate summaries normally ride along with the next `send` call. A
//! flusher task delivers them on a fixed interval so a quiet system still
//! reports what it swallowed.

use crate::application::dispatcher::{BuildError, Dispatcher};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Error returned when the flusher task cannot be stopped cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The task panicked or was cancelled
    #[error("flusher task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Handle to a running flusher task.
///
/// Dropping the handle stops the task at its next wakeup without a final
/// flush.
#[derive(Debug)]
pub struct FlushHandle {
    stop: oneshot::Sender<bool>,
    task: JoinHandle<()>,
}

impl FlushHandle {
    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        self.stop_with(false).await
    }

    /// Run one last flush, then stop the task and wait for it to finish.
    pub async fn shutdown_and_flush(self) -> Result<(), ShutdownError> {
        self.stop_with(true).await
    }

    /// Check if the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    async fn stop_with(self, final_flush: bool) -> Result<(), ShutdownError> {
        // The receiver is gone only if the task already exited; join reports why.
        let _ = self.stop.send(final_flush);
        self.task.await?;
        Ok(())
    }
}

impl Dispatcher {
    /// Spawn a task that calls [`Dispatcher::flush`] every `period`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `BuildError::ZeroFlushInterval` if `period` is zero.
    pub fn spawn_flusher(&self, period: Duration) -> Result<FlushHandle, BuildError> {
        if period.is_zero() {
            return Err(BuildError::ZeroFlushInterval);
        }

        let dispatcher = self.clone();
        let (stop, mut stopped) = oneshot::channel::<bool>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            tracing::info!(period_ms = period.as_millis() as u64, "flusher started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let results = dispatcher.flush().await;
                        if !results.is_empty() {
                            tracing::info!(dispatched = results.len(), "flusher delivered summaries");
                        }
                    }
                    signal = &mut stopped => {
                        if let Ok(true) = signal {
                            let results = dispatcher.flush().await;
                            tracing::info!(dispatched = results.len(), "final flush before stop");
                        }
                        break;
                    }
                }
            }

            tracing::info!("flusher stopped");
        });

        Ok(FlushHandle { stop, task })
    }
}
