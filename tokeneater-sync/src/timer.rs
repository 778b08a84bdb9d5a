//! Coalescing timer.
//!
//! Every trigger cancels the pending action and schedules a new one after the
//! quiet period, so a burst of triggers runs the action once.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default quiet period for settings reloads.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

/// Cancel-and-reschedule timer.
///
/// Once the quiet period has elapsed the action runs to completion even if a
/// new trigger arrives meanwhile. Dropping the timer cancels a pending action.
#[derive(Debug)]
pub struct CoalescingTimer {
    quiet: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Default for CoalescingTimer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl CoalescingTimer {
    /// Creates a timer with the given quiet period.
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Mutex::new(None),
        }
    }

    /// Quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Schedules `action` after the quiet period, replacing any pending one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            trace!("Rescheduling pending action");
            previous.cancel();
        }

        let quiet = self.quiet;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(quiet) => action().await,
            }
        });
    }

    /// Cancels the pending action, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}

impl Drop for CoalescingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_action(count: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let timer = CoalescingTimer::new(Duration::from_millis(300));
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            timer.trigger(counter_action(&count));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let timer = CoalescingTimer::new(Duration::from_millis(300));
        let count = Arc::new(AtomicUsize::new(0));

        timer.trigger(counter_action(&count));
        tokio::time::sleep(Duration::from_millis(500)).await;
        timer.trigger(counter_action(&count));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let timer = CoalescingTimer::new(Duration::from_millis(300));
            timer.trigger(counter_action(&count));
            timer.cancel();
            timer.trigger(counter_action(&count));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
