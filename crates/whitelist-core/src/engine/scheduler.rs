//! Background scheduling of reconciliation passes
//!
//! The scheduler owns one tokio task that runs a pass, then waits for the
//! refresh interval, an explicit wake-up, a re-arm request or shutdown,
//! whichever comes first.
//!
//! ```text
//!  Stopped ──start()──▶ Running ──stop()──▶ Stopping ──task exits──▶ Stopped
//! ```
//!
//! Shutdown only interrupts the idle wait. A pass that has started always
//! runs to completion, commit included.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No background task
    Stopped,
    /// Background task running
    Running,
    /// Shutdown requested, waiting for the task to exit
    Stopping,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "Stopped",
            LifecycleState::Running => "Active",
            LifecycleState::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// Work the scheduler drives
#[async_trait]
pub trait PassRunner: Send + Sync + 'static {
    /// Run one pass; errors are handled inside
    async fn run_scheduled_pass(&self);

    /// How long to wait before the next pass
    async fn refresh_interval(&self) -> Duration;
}

/// Cancellable interval loop around a [`PassRunner`]
pub struct Scheduler {
    state: Mutex<LifecycleState>,
    shutdown_tx: watch::Sender<bool>,
    wake: Arc<Notify>,
    rearm: Arc<Notify>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(LifecycleState::Stopped),
            shutdown_tx,
            wake: Arc::new(Notify::new()),
            rearm: Arc::new(Notify::new()),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Spawn the background loop
    ///
    /// The first pass runs immediately.
    pub async fn start(&self, runner: Arc<dyn PassRunner>) -> Result<()> {
        let mut handle = self.handle.lock().await;

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != LifecycleState::Stopped {
                return Err(Error::invalid_state(format!(
                    "Scheduler cannot start while {}",
                    state
                )));
            }
            *state = LifecycleState::Running;
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();

        *handle = Some(tokio::spawn(run_loop(
            runner,
            shutdown_rx,
            Arc::clone(&self.wake),
            Arc::clone(&self.rearm),
        )));

        info!("Whitelist scheduler started");
        Ok(())
    }

    /// Signal shutdown and wait for the loop to exit
    ///
    /// Stopping an already stopped scheduler is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;

        let Some(task) = handle.take() else {
            self.set_state(LifecycleState::Stopped);
            return Ok(());
        };

        self.set_state(LifecycleState::Stopping);
        self.shutdown_tx.send_replace(true);

        let result = task.await;
        self.set_state(LifecycleState::Stopped);

        match result {
            Ok(()) => {
                info!("Whitelist scheduler stopped");
                Ok(())
            }
            Err(e) => Err(Error::Other(format!("Scheduler task failed: {}", e))),
        }
    }

    /// Ask the loop to run a pass now
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Restart the current wait without running a pass
    pub fn rearm(&self) {
        self.rearm.notify_one();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    runner: Arc<dyn PassRunner>,
    mut shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
    rearm: Arc<Notify>,
) {
    'passes: loop {
        if *shutdown_rx.borrow_and_update() {
            break;
        }

        // Run the pass in its own task so a panic cannot take the loop down
        let pass_runner = Arc::clone(&runner);
        if let Err(e) = tokio::spawn(async move { pass_runner.run_scheduled_pass().await }).await {
            error!("Whitelist refresh pass panicked: {}", e);
        }

        loop {
            let interval = runner.refresh_interval().await;
            debug!("Next whitelist refresh in {:?}", interval);

            tokio::select! {
                // Only `true` is ever sent after subscribe; a dropped sender also means stop
                _ = shutdown_rx.changed() => {
                    break 'passes;
                }
                _ = wake.notified() => {
                    debug!("Whitelist refresh triggered");
                    continue 'passes;
                }
                _ = rearm.notified() => {
                    debug!("Whitelist refresh timer re-armed");
                }
                _ = tokio::time::sleep(interval) => {
                    continue 'passes;
                }
            }
        }
    }

    debug!("Whitelist scheduler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        passes: AtomicUsize,
    }

    #[async_trait]
    impl PassRunner for CountingRunner {
        async fn run_scheduled_pass(&self) {
            self.passes.fetch_add(1, Ordering::SeqCst);
        }

        async fn refresh_interval(&self) -> Duration {
            Duration::from_secs(60)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_states() {
        let scheduler = Scheduler::new();
        let runner = Arc::new(CountingRunner {
            passes: AtomicUsize::new(0),
        });

        assert_eq!(scheduler.state(), LifecycleState::Stopped);

        scheduler.start(runner.clone()).await.unwrap();
        assert_eq!(scheduler.state(), LifecycleState::Running);
        assert!(scheduler.start(runner.clone()).await.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 1);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), LifecycleState::Stopped);

        // Restartable after a stop
        scheduler.start(runner.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 2);
        scheduler.stop().await.unwrap();
    }

    struct PanicOnceRunner {
        passes: AtomicUsize,
    }

    #[async_trait]
    impl PassRunner for PanicOnceRunner {
        async fn run_scheduled_pass(&self) {
            if self.passes.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first pass blows up");
            }
        }

        async fn refresh_interval(&self) -> Duration {
            Duration::from_secs(60)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_pass_does_not_end_loop() {
        let scheduler = Scheduler::new();
        let runner = Arc::new(PanicOnceRunner {
            passes: AtomicUsize::new(0),
        });

        scheduler.start(runner.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), LifecycleState::Running);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 2);

        scheduler.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 3);

        assert!(scheduler.stop().await.is_ok());
        assert_eq!(scheduler.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_runs_pass_and_rearm_does_not() {
        let scheduler = Scheduler::new();
        let runner = Arc::new(CountingRunner {
            passes: AtomicUsize::new(0),
        });

        scheduler.start(runner.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        scheduler.rearm();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 1);

        scheduler.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.passes.load(Ordering::SeqCst), 2);

        scheduler.stop().await.unwrap();
    }
}
