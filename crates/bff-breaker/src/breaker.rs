//! The breaker state machine.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::clock::{MonotonicClock, SteadyClock};
use crate::error::{BreakerError, FailureStatus};

/// Observable breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls fail fast with [`BreakerError::Open`].
    Open,
    /// A probe call has been admitted.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<f64>,
    frozen: bool,
}

/// Circuit breaker controlling calls to one unreliable provider.
///
/// Consecutive failures open the circuit; after `probe_interval` a single
/// call is admitted as a probe (the boundary is inclusive). An upstream 403
/// opens the circuit *frozen*: no probe is admitted, for any elapsed time,
/// until an operator [`reset`](CircuitBreaker::reset).
///
/// Timing runs on an injectable monotonic clock so it tolerates wall-clock
/// skew and is deterministic under test.
pub struct CircuitBreaker {
    failure_threshold: u32,
    probe_interval: f64,
    clock: Arc<dyn MonotonicClock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker opening after `failure_threshold` consecutive
    /// failures and probing every `probe_interval` thereafter.
    pub fn new(failure_threshold: u32, probe_interval: Duration) -> Self {
        Self::with_clock(
            failure_threshold,
            probe_interval,
            Arc::new(SteadyClock::default()),
        )
    }

    /// Like [`new`](Self::new) with an explicit time source.
    pub fn with_clock(
        failure_threshold: u32,
        probe_interval: Duration,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        Self {
            failure_threshold,
            probe_interval: probe_interval.as_secs_f64(),
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                frozen: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// True while a 403 latch is in force.
    pub fn is_frozen(&self) -> bool {
        self.inner.lock().unwrap().frozen
    }

    /// Operator control: trips the breaker open (not frozen).
    pub fn force_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.frozen = false;
    }

    /// Operator control: closes the breaker and clears the frozen latch.
    pub fn reset(&self, trace_id: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
        inner.frozen = false;
        tracing::info!(trace_id, "breaker reset");
    }

    /// Executes `op` respecting the breaker state.
    ///
    /// When open, the call fails fast unless the probe interval has elapsed
    /// and the breaker is not frozen, in which case the breaker moves to
    /// half-open and admits this call as the probe. Success closes the
    /// circuit and clears the failure count; failure re-opens it, and an
    /// upstream 403 opens it frozen.
    pub async fn call<T, E, F, Fut>(
        &self,
        op: F,
        trace_id: Option<&str>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureStatus,
    {
        let now = self.clock.now();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == CircuitState::Open {
                let probe_due = !inner.frozen
                    && inner
                        .opened_at
                        .is_some_and(|opened| now - opened >= self.probe_interval);
                if probe_due {
                    inner.state = CircuitState::HalfOpen;
                } else {
                    #[cfg(feature = "metrics")]
                    counter!("breaker_calls_rejected_total").increment(1);
                    return Err(BreakerError::Open);
                }
            }
        }

        match op().await {
            Ok(value) => {
                let mut inner = self.inner.lock().unwrap();
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                inner.opened_at = None;
                Ok(value)
            }
            Err(err) => {
                let mut inner = self.inner.lock().unwrap();
                inner.failures += 1;
                if err.http_status() == Some(403) {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    inner.frozen = true;
                    tracing::info!(trace_id, "breaker frozen");
                    #[cfg(feature = "metrics")]
                    counter!("breaker_frozen_total").increment(1);
                } else if inner.state == CircuitState::HalfOpen
                    || inner.failures >= self.failure_threshold
                {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
                Err(BreakerError::Inner(err))
            }
        }
    }
}
