//! Token bucket with shared state and in-process fallback.

use std::sync::{Arc, Mutex};

use crate::backend::{BackendError, CoordinationBackend};
use crate::clock::Clock;

/// One token bucket for a single `(provider, period)` pair.
///
/// The authoritative `(available, last_refill_time)` pair lives in the
/// coordination backend under this bucket's key so that all gateway
/// processes draw from the same quota. When the backend errors, the bucket
/// transparently switches to a process-local mirror running the same
/// algorithm; a fallback never errors and still denies when exhausted.
pub struct TokenBucket {
    key: String,
    capacity: f64,
    refill_rate: f64,
    backend: Arc<dyn CoordinationBackend>,
    clock: Arc<dyn Clock>,
    local: Mutex<Option<(f64, f64)>>,
}

impl TokenBucket {
    /// Creates a bucket holding at most `capacity` tokens and refilling at
    /// `refill_rate` tokens per second.
    pub fn new(
        key: impl Into<String>,
        capacity: f64,
        refill_rate: f64,
        backend: Arc<dyn CoordinationBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: key.into(),
            capacity,
            refill_rate,
            backend,
            clock,
            local: Mutex::new(None),
        }
    }

    /// The backend key this bucket's state is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Attempts to take `cost` tokens from the bucket.
    ///
    /// Returns `(allowed, retry_after_seconds)`. `retry_after` is zero when
    /// allowed, otherwise the time until the deficit refills. State is
    /// written back on every call; a denied call refreshes the refill
    /// timestamp but does not debit.
    pub async fn acquire(&self, cost: f64) -> (bool, f64) {
        let now = self.clock.now();
        match self.acquire_shared(cost, now).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "bucket backend unavailable, using local fallback");
                self.acquire_local(cost, now)
            }
        }
    }

    async fn acquire_shared(&self, cost: f64, now: f64) -> Result<(bool, f64), BackendError> {
        let (available, last) = match self.backend.get(&self.key).await? {
            Some(raw) => serde_json::from_slice::<(f64, f64)>(&raw)
                .map_err(|e| BackendError::Protocol(e.to_string()))?,
            None => (self.capacity, now),
        };

        let (allowed, retry_after, remaining) = self.step(available, last, cost, now);

        let raw = serde_json::to_vec(&(remaining, now))
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        self.backend.set(&self.key, raw).await?;
        Ok((allowed, retry_after))
    }

    fn acquire_local(&self, cost: f64, now: f64) -> (bool, f64) {
        let mut local = self.local.lock().unwrap();
        let (available, last) = local.unwrap_or((self.capacity, now));
        let (allowed, retry_after, remaining) = self.step(available, last, cost, now);
        *local = Some((remaining, now));
        (allowed, retry_after)
    }

    /// The refill-and-debit step shared by both storage paths.
    ///
    /// `max(0, now - last)` guards against clock regressions granting
    /// negative refill.
    fn step(&self, available: f64, last: f64, cost: f64, now: f64) -> (bool, f64, f64) {
        let refilled = (available + (now - last).max(0.0) * self.refill_rate).min(self.capacity);
        if refilled >= cost {
            (true, 0.0, refilled - cost)
        } else {
            let retry_after = if self.refill_rate > 0.0 {
                (cost - refilled) / self.refill_rate
            } else {
                f64::INFINITY
            };
            (false, retry_after, refilled)
        }
    }
}
