//! Clock interface and implementations for testability.
//!
//! The scheduler's deadlines (`Runnable::ready`, `WorkersPool`'s
//! earliest-deadline-first wait) are expressed against this trait rather
//! than `std::time::Instant` directly, so tests can swap in
//! [`SimulatedClocks`] instead of sleeping in real time.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

/// Abstract interface to the system clock. This exists for testability.
pub trait Clocks: Send + Sync + 'static {
    /// Gets the current time from a monotonic clock.
    fn monotonic(&self) -> Instant;

    /// Causes the current thread to sleep for the specified time.
    fn sleep(&self, how_long: Duration);
}

#[derive(Copy, Clone, Default)]
pub struct RealClocks {}

impl Clocks for RealClocks {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, how_long: Duration) {
        thread::sleep(how_long);
    }
}

/// Logs a warning if the guarded critical section runs "too long", using
/// the label produced by a supplied function only when that happens (so
/// the label itself may be expensive to format).
pub struct TimerGuard<'a, C: Clocks + ?Sized, S: AsRef<str>, F: FnOnce() -> S + 'a> {
    clocks: &'a C,
    label_f: Option<F>,
    start: Instant,
    warn_after: Duration,
}

impl<'a, C: Clocks + ?Sized, S: AsRef<str>, F: FnOnce() -> S + 'a> TimerGuard<'a, C, S, F> {
    pub fn new(clocks: &'a C, label_f: F) -> Self {
        Self::with_threshold(clocks, Duration::from_millis(100), label_f)
    }

    pub fn with_threshold(clocks: &'a C, warn_after: Duration, label_f: F) -> Self {
        TimerGuard {
            clocks,
            label_f: Some(label_f),
            start: clocks.monotonic(),
            warn_after,
        }
    }
}

impl<'a, C, S, F> Drop for TimerGuard<'a, C, S, F>
where
    C: Clocks + ?Sized,
    S: AsRef<str>,
    F: FnOnce() -> S + 'a,
{
    fn drop(&mut self) {
        let elapsed = self.clocks.monotonic() - self.start;
        if elapsed >= self.warn_after {
            let label_f = self.label_f.take().unwrap();
            warn!(?elapsed, "{} took longer than expected", label_f().as_ref());
        }
    }
}

/// Simulated clock for deterministic tests: `monotonic()` only advances
/// when [`SimulatedClocks::sleep`] is called.
#[derive(Clone)]
pub struct SimulatedClocks(Arc<Inner>);

struct Inner {
    base: Instant,
    elapsed: Mutex<Duration>,
}

impl SimulatedClocks {
    pub fn new() -> Self {
        SimulatedClocks(Arc::new(Inner {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }))
    }
}

impl Default for SimulatedClocks {
    fn default() -> Self {
        Self::new()
    }
}

impl Clocks for SimulatedClocks {
    fn monotonic(&self) -> Instant {
        self.0.base + *self.0.elapsed.lock().unwrap()
    }

    /// Advances the clock by the specified amount without actually sleeping.
    fn sleep(&self, how_long: Duration) {
        let mut l = self.0.elapsed.lock().unwrap();
        *l += how_long;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clock_advances_only_on_sleep() {
        let c = SimulatedClocks::new();
        let t0 = c.monotonic();
        c.sleep(Duration::from_millis(50));
        assert_eq!(c.monotonic() - t0, Duration::from_millis(50));
    }

    #[test]
    fn timer_guard_warns_past_threshold() {
        let c = SimulatedClocks::new();
        {
            let _g = TimerGuard::with_threshold(&c, Duration::from_millis(10), || "slow op");
            c.sleep(Duration::from_millis(20));
        }
        // No direct assertion on the emitted log; this exercises the Drop path
        // without panicking, which is what regressions in the threshold
        // arithmetic would otherwise do.
    }
}
