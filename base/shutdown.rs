//! A cooperative shutdown signal propagated through the program.
//!
//! Dropping the [`Sender`] marks every clone of the paired [`Receiver`] as
//! shut down: [`Receiver::check`] starts failing and any thread blocked in
//! [`Receiver::wait_for`] wakes immediately. [`WorkersPool`](crate)
//! composes this with its own `run` flag so callers have an independent,
//! cloneable way to observe "the pool is draining" without reaching into
//! scheduler internals.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub struct ShutdownError;

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("shutdown requested")
    }
}

impl std::error::Error for ShutdownError {}

struct Inner {
    /// `false` until the `Sender` is dropped.
    shutdown: Mutex<bool>,
    condvar: Condvar,
}

pub struct Sender(Arc<Inner>);

impl Drop for Sender {
    fn drop(&mut self) {
        *self.0.shutdown.lock() = true;
        self.0.condvar.notify_all();
    }
}

#[derive(Clone)]
pub struct Receiver(Arc<Inner>);

impl Receiver {
    pub fn check(&self) -> Result<(), ShutdownError> {
        if *self.0.shutdown.lock() {
            Err(ShutdownError)
        } else {
            Ok(())
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.shutdown.lock()
    }

    /// Blocks up to `timeout`, returning early if shutdown is requested.
    ///
    /// Returns `Ok(())` if `timeout` elapsed without a shutdown, `Err` if
    /// shutdown was (or became) active.
    pub fn wait_for(&self, timeout: Duration) -> Result<(), ShutdownError> {
        let mut l = self.0.shutdown.lock();
        if *l {
            return Err(ShutdownError);
        }
        let result = self.0.condvar.wait_for(&mut l, timeout);
        if *l {
            Err(ShutdownError)
        } else {
            debug_assert!(result.timed_out());
            Ok(())
        }
    }
}

/// Returns a sender and receiver for graceful shutdown.
///
/// Dropping the sender requests shutdown; every clone of the receiver
/// observes it.
pub fn channel() -> (Sender, Receiver) {
    let inner = Arc::new(Inner {
        shutdown: Mutex::new(false),
        condvar: Condvar::new(),
    });
    (Sender(inner.clone()), Receiver(inner))
}
