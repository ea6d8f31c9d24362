//! Elapsed-time tracking for workout sessions.
//!
//! [`ElapsedClock`] recomputes elapsed seconds from the wall-clock delta
//! since activation, never by counting ticks, so delayed or skipped ticks
//! cannot accumulate drift. Uses `std::time::Instant` for monotonic
//! guarantees.
//!
//! [`TickDriver`] is the periodic prompt: a spawned task that fires a
//! callback at a fixed cadence until cancelled. `stop()` cancels the
//! token *and* joins the task, so once it returns no further tick can be
//! delivered.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Monotonic clock that tracks elapsed session time in whole seconds.
///
/// When active, the clock stores the activation instant and a baseline of
/// seconds accumulated before activation. The current value is
/// `baseline + floor(now - activation)`, recomputed on every tick.
#[derive(Debug)]
pub struct ElapsedClock {
    /// When the clock was activated (None if deactivated)
    activated_at: Option<Instant>,

    /// Seconds carried in from before this activation
    baseline_seconds: u64,

    /// Last computed elapsed value (updated by tick())
    current_seconds: u64,
}

impl ElapsedClock {
    /// Create a new clock at zero, deactivated.
    pub fn new() -> Self {
        Self {
            activated_at: None,
            baseline_seconds: 0,
            current_seconds: 0,
        }
    }

    /// Start counting from `baseline_seconds`.
    ///
    /// A no-op while already active, so a double start cannot reset the
    /// activation instant.
    pub fn activate(&mut self, baseline_seconds: u64) {
        if self.activated_at.is_none() {
            self.activated_at = Some(Instant::now());
            self.baseline_seconds = baseline_seconds;
            self.current_seconds = self.current_seconds.max(baseline_seconds);
        }
    }

    /// Check if the clock is counting
    pub fn is_running(&self) -> bool {
        self.activated_at.is_some()
    }

    /// Recompute elapsed seconds from the wall clock.
    ///
    /// Returns the frozen value when deactivated. Never decreases.
    pub fn tick(&mut self) -> u64 {
        let Some(start) = self.activated_at else {
            return self.current_seconds;
        };

        let computed = self.baseline_seconds + start.elapsed().as_secs();
        if computed > self.current_seconds {
            self.current_seconds = computed;
        }
        self.current_seconds
    }

    /// Take a final tick, then freeze at that value.
    pub fn deactivate(&mut self) -> u64 {
        if self.activated_at.is_some() {
            self.tick();
            self.activated_at = None;
        }
        self.current_seconds
    }

    /// Last computed elapsed value, without recomputing.
    pub fn elapsed_seconds(&self) -> u64 {
        self.current_seconds
    }
}

impl Default for ElapsedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic tick task with a hard cancellation guarantee.
pub struct TickDriver {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TickDriver {
    /// Spawn a task invoking `on_tick` every `period` until stopped.
    ///
    /// The first invocation fires immediately. Missed ticks are skipped,
    /// not bursted; the clock recomputes from the wall clock so skipping
    /// cannot cause drift.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => on_tick(),
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel and wait for the task to exit.
    ///
    /// No tick callback runs after this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_clock_at_zero() {
        let clock = ElapsedClock::new();
        assert_eq!(clock.elapsed_seconds(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_activate_sets_running() {
        let mut clock = ElapsedClock::new();
        clock.activate(0);
        assert!(clock.is_running());
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn test_activate_with_baseline() {
        let mut clock = ElapsedClock::new();
        clock.activate(42);
        assert_eq!(clock.tick(), 42);
    }

    #[test]
    fn test_double_activate_keeps_baseline() {
        let mut clock = ElapsedClock::new();
        clock.activate(0);
        clock.activate(99);
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn test_tick_advances_with_time() {
        let mut clock = ElapsedClock::new();
        clock.activate(0);

        thread::sleep(Duration::from_millis(1100));

        let elapsed = clock.tick();
        assert!(elapsed >= 1, "elapsed {} should be >= 1", elapsed);
        assert!(elapsed <= 2, "elapsed {} should be <= 2", elapsed);
    }

    #[test]
    fn test_deactivate_freezes_value() {
        let mut clock = ElapsedClock::new();
        clock.activate(10);

        let frozen = clock.deactivate();
        assert!(!clock.is_running());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(clock.tick(), frozen);
        assert_eq!(clock.elapsed_seconds(), frozen);
    }

    #[test]
    fn test_reactivate_resumes_from_baseline() {
        let mut clock = ElapsedClock::new();
        clock.activate(0);
        let frozen = clock.deactivate();

        clock.activate(frozen + 5);
        assert_eq!(clock.tick(), frozen + 5);
    }

    #[test]
    fn test_tick_monotonic() {
        let mut clock = ElapsedClock::new();
        clock.activate(7);

        let mut last = 0;
        for _ in 0..20 {
            let now = clock.tick();
            assert!(now >= last, "elapsed went backwards: {} < {}", now, last);
            last = now;
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_driver_delivers_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let driver = TickDriver::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        driver.stop().await;

        let delivered = count.load(Ordering::Relaxed);
        assert!(delivered >= 3, "expected ticks, got {}", delivered);
    }

    #[tokio::test]
    async fn test_no_tick_after_stop_returns() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let driver = TickDriver::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        driver.stop().await;

        let at_stop = count.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::Relaxed), at_stop);
    }
}
