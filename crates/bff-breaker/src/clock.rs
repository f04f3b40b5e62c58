//! Monotonic time source for breaker timing.
//!
//! Breaker probe scheduling must tolerate wall-clock skew, so it runs on
//! monotonic time with an arbitrary origin.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Monotonic seconds since an arbitrary per-process origin.
pub trait MonotonicClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Real monotonic clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SteadyClock {
    origin: Instant,
}

impl Default for SteadyClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock for SteadyClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap() += secs;
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}
