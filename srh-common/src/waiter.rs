//! Readiness waiting after a restart has been triggered.
//!
//! Polls the readiness probe with exponential backoff, starting at 10ms and
//! doubling up to a 500ms ceiling, until the probe reports ready, the
//! overall timeout elapses, or the wait is cancelled. The timeout and the
//! cancellation token are the two ways out of a service that never comes
//! back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::{HarnessError, HarnessResult};
use crate::lifecycle::ReadinessProbe;

/// Cooperative cancellation flag for readiness waits.
///
/// Clones share the flag; any clone can cancel. The waiter checks it between
/// polls, so cancellation takes effect within one backoff interval.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Timing knobs for the readiness wait.
#[derive(Debug, Clone)]
pub struct WaiterConfig {
    /// First backoff interval.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Overall budget before giving up with a timeout error.
    pub timeout: Duration,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Blocks the calling thread until a restarted service reports ready.
#[derive(Debug, Clone)]
pub struct RestartWaiter {
    config: WaiterConfig,
    cancel: CancelToken,
}

impl RestartWaiter {
    pub fn new(config: WaiterConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a shared cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll the probe until it reports ready.
    ///
    /// Returns [`HarnessError::ReadinessTimeout`] when the budget runs out
    /// and [`HarnessError::Cancelled`] when the token fires first.
    pub fn wait_until_ready(&self, probe: &dyn ReadinessProbe) -> HarnessResult<()> {
        let start = Instant::now();
        let mut delay = self.config.initial_delay;

        loop {
            if self.cancel.is_cancelled() {
                debug!("readiness wait cancelled");
                return Err(HarnessError::Cancelled);
            }
            if probe.is_ready() {
                debug!(elapsed = ?start.elapsed(), "service ready");
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= self.config.timeout {
                warn!(timeout = ?self.config.timeout, "service never became ready");
                return Err(HarnessError::ReadinessTimeout(self.config.timeout));
            }

            // Never sleep past the deadline; the final poll happens right at it.
            let remaining = self.config.timeout - elapsed;
            thread::sleep(delay.min(remaining));
            delay = (delay * 2).min(self.config.max_delay);
        }
    }
}
