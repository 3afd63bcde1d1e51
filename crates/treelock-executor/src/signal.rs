//! One-shot waitable signal

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// Upper bound on a single condvar wait so cancellation is observed
/// promptly even without a notify.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Signal that can be set exactly once and waited on with a bound
#[derive(Debug, Default)]
pub struct WaitableSignal {
    signalled: Mutex<bool>,
    cond: Condvar,
}

impl WaitableSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal; returns `true` for exactly one caller, ever
    pub fn signal(&self) -> bool {
        let mut signalled = self.signalled.lock();
        let first = !*signalled;
        *signalled = true;
        self.cond.notify_all();
        first
    }

    pub fn is_signalled(&self) -> bool {
        *self.signalled.lock()
    }

    /// Bounded wait for the signal
    ///
    /// Returns `Ok(true)` once signalled, `Ok(false)` if `timeout` elapsed
    /// first, and `Err(Error::Cancelled)` if `cancel` was signalled before
    /// or during the wait.
    pub fn wait_timeout(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut signalled = self.signalled.lock();
        loop {
            if *signalled {
                return Ok(true);
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let slice = WAIT_SLICE.min(deadline - now);
            self.cond.wait_for(&mut signalled, slice);
        }
    }
}
