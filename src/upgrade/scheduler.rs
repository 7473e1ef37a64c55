//! Background check loop.
//!
//! One long-lived task sleeps for the configured interval and then runs an
//! automatic check. Cancellation is observed between sleeps; a check already
//! in flight finishes. Changing the interval or turning auto-check off stops
//! the loop and, when still enabled, starts a fresh one.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Work run on every tick.
#[async_trait]
pub trait ScheduledCheck: Send + Sync + 'static {
    /// Run one automatic check.
    async fn run_scheduled_check(&self);
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns at most one live check loop.
#[derive(Default)]
pub struct Scheduler {
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    /// Scheduler with no loop running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the loop, replacing any running one. The first check runs after
    /// `first_delay`, later ones every `interval`. The loop ends when `target`
    /// is dropped.
    pub fn start(&self, first_delay: Duration, interval: Duration, target: Weak<dyn ScheduledCheck>) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                if token.is_cancelled() {
                    break;
                }
                let Some(target) = target.upgrade() else {
                    break;
                };
                debug!("Scheduled update check");
                target.run_scheduled_check().await;
                delay = interval;
            }
            debug!("Update check loop stopped");
        });

        info!("Automatic update checks every {:?} (first in {:?})", interval, first_delay);
        let previous = self.lock().replace(Running {
            cancel,
            handle,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    /// Stop the loop if running.
    pub fn stop(&self) {
        if let Some(running) = self.lock().take() {
            info!("Stopping automatic update checks");
            running.cancel.cancel();
        }
    }

    /// Stop the current loop and start a new one.
    pub fn restart(&self, first_delay: Duration, interval: Duration, target: Weak<dyn ScheduledCheck>) {
        self.stop();
        self.start(first_delay, interval, target);
    }

    /// Whether a loop is live.
    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|running| !running.handle.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
