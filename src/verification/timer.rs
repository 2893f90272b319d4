//! Cancellable one-second countdown
//!
//! A countdown runs as its own tokio task. Ticks report the seconds left,
//! strictly decreasing and ending at zero; the completion callback runs once
//! after the last tick. Once `cancel` returns no further callback starts.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

struct RunningCountdown {
    cancelled: Arc<AtomicBool>,
    /// Held while a callback runs, so `cancel` can wait it out
    callback_section: Arc<Mutex<()>>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct CountdownTimer {
    active: Option<RunningCountdown>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `duration_seconds`, replacing any running countdown
    pub fn start<T, C>(&mut self, duration_seconds: u32, mut on_tick: T, on_complete: C)
    where
        T: FnMut(u32) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.cancel();

        let cancelled = Arc::new(AtomicBool::new(false));
        let callback_section = Arc::new(Mutex::new(()));

        let task_cancelled = cancelled.clone();
        let task_section = callback_section.clone();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);

            for remaining in (0..duration_seconds).rev() {
                ticker.tick().await;
                let _section = task_section.lock();
                if task_cancelled.load(Ordering::SeqCst) {
                    return;
                }
                on_tick(remaining);
            }

            let _section = task_section.lock();
            if !task_cancelled.swap(true, Ordering::SeqCst) {
                on_complete();
            }
        });

        debug!("Countdown started for {}s", duration_seconds);
        self.active = Some(RunningCountdown {
            cancelled,
            callback_section,
            handle,
        });
    }

    /// Stop the countdown; a no-op when nothing is running
    pub fn cancel(&mut self) {
        if let Some(running) = self.active.take() {
            running.cancelled.store(true, Ordering::SeqCst);
            // Wait for a callback already in progress on another worker
            drop(running.callback_section.lock());
            running.handle.abort();
            debug!("Countdown cancelled");
        }
    }

    /// Whether a countdown was started and has not finished or been cancelled
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|r| !r.cancelled.load(Ordering::SeqCst) && !r.handle.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        // No lock here: the owner may be dropped while a callback holds other locks
        if let Some(running) = self.active.take() {
            running.cancelled.store(true, Ordering::SeqCst);
            running.handle.abort();
        }
    }
}
