//! One-shot deadline timers with explicit cancel-and-replace semantics
//!
//! Matchmaking deadlines and match timers are the only scheduled tasks in
//! the core. Both go through this abstraction so every timer is owned,
//! cancellable, and released on shutdown.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A single scheduled firing; dropping or cancelling aborts the task.
#[derive(Debug)]
pub struct DeadlineTimer {
    handle: JoinHandle<()>,
}

impl DeadlineTimer {
    /// Schedule `on_fire` to run once after `delay`.
    pub fn schedule<F>(delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });

        Self { handle }
    }

    /// Cancel the pending firing. Idempotent; a timer that already fired
    /// is unaffected.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the timer task has finished (fired or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
