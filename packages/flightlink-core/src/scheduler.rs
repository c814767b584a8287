//! # Scheduler
//!
//! Drives periodic background jobs (directory sweeps, config refresh) on
//! tokio with a shared cancellation signal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PERIODIC TASKS                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Scheduler ──spawn_every(task, period)──► tokio task                   │
//! │      │                                      loop {                      │
//! │      │                                        select! {                 │
//! │      │  shutdown_tx (watch<bool>)               cancelled → exit        │
//! │      └────────────────────────────────────►     tick → task.run()      │
//! │                                               }                         │
//! │                                             }                           │
//! │                                                                         │
//! │  The first run happens immediately; later runs follow the period.      │
//! │  A run that overruns delays the next tick instead of bursting.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};

/// A job run on a fixed period
///
/// `run` handles and logs its own failures; one failed run never stops the
/// schedule.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn run(&self);
}

/// Observes scheduler shutdown
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shutdown_rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Resolves once shutdown has been requested
    pub async fn cancelled(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if *shutdown_rx.borrow() {
                return;
            }
            if shutdown_rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

/// Owns the background tasks and their shutdown signal
#[derive(Debug)]
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken {
            shutdown_rx: self.shutdown_tx.subscribe(),
        }
    }

    /// Number of spawned tasks not yet shut down
    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Run `task` now and then every `period` until shutdown
    ///
    /// Must be called from within a tokio runtime. A zero `period` is an
    /// `Argument` error and nothing is spawned.
    pub fn spawn_every(&self, task: Arc<dyn PeriodicTask>, period: Duration) -> Result<()> {
        let name = task.name();
        if period.is_zero() {
            return Err(Error::Argument(format!(
                "Period of task '{}' must be positive",
                name
            )));
        }
        let token = self.cancellation_token();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(task = name, period_secs = period.as_secs(), "Periodic task started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = task.run() => {}
                }
            }
            tracing::info!(task = name, "Periodic task stopped");
        });

        self.handles.lock().push(handle);
        Ok(())
    }

    /// Signal every task to stop and wait for them to finish
    ///
    /// An in-progress run is dropped at its next await point.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Periodic task panicked");
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTask {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CountingTask {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_period() {
        let scheduler = Scheduler::new();
        let task = Arc::new(CountingTask::default());
        scheduler
            .spawn_every(task.clone(), Duration::from_secs(600))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(task.runs(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(task.runs(), 2);

        scheduler.shutdown().await;
        assert_eq!(scheduler.task_count(), 0);

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(task.runs(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_token_observes_shutdown() {
        let scheduler = Scheduler::new();
        let token = scheduler.cancellation_token();
        assert!(!token.is_cancelled());

        scheduler.shutdown().await;

        assert!(token.is_cancelled());
        // Already cancelled: must resolve immediately
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_token_taken_after_shutdown_is_cancelled() {
        let scheduler = Scheduler::new();
        scheduler.shutdown().await;

        let token = scheduler.cancellation_token();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let scheduler = Scheduler::new();
        let task = Arc::new(CountingTask::default());

        let err = scheduler.spawn_every(task.clone(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::Argument(ref m) if m.contains("counting")));
        assert_eq!(scheduler.task_count(), 0);

        tokio::task::yield_now().await;
        assert_eq!(task.runs(), 0);
    }
}
