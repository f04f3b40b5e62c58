//! The provider invocation contract.
//!
//! Every outbound provider operation runs through [`guarded_call`]: the
//! breaker short-circuits first (no retries happen while it is open), the
//! attempt loop applies a per-call timeout and a bounded retry budget, and
//! the outcome feeds the adaptive clamp exactly once per outer invocation.

use std::future::Future;
use std::time::Duration;

use bff_breaker::{BreakerError, CircuitBreaker};
use bff_ratelimit::AdaptiveClamp;

use crate::error::ApiError;
use crate::providers::ProviderError;

/// Timeout and retry budget for one provider operation.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    /// Deadline applied to each individual attempt.
    pub timeout: Duration,
    /// Attempts per invocation; transport errors, HTTP error statuses, and
    /// missing-field decodes all consume one.
    pub retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 3,
        }
    }
}

/// Runs `op` under the provider's breaker with timeout and retries, then
/// records the outcome with the clamp.
pub async fn guarded_call<T, F, Fut>(
    breaker: &CircuitBreaker,
    clamp: &AdaptiveClamp,
    provider: &str,
    trace_id: &str,
    policy: CallPolicy,
    op: F,
) -> Result<T, BreakerError<ProviderError>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let result = breaker
        .call(|| run_attempts(policy, op), Some(trace_id))
        .await;
    clamp.adjust(provider, result.is_ok());
    result
}

async fn run_attempts<T, F, Fut>(policy: CallPolicy, op: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err = None;
    for _ in 0..policy.retries.max(1) {
        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => last_err = Some(err),
            Err(_) => last_err = Some(ProviderError::Timeout),
        }
        // Keep the scheduler responsive between attempts.
        tokio::task::yield_now().await;
    }
    Err(last_err.unwrap_or(ProviderError::Timeout))
}

/// Maps a guarded-call failure onto the client-facing envelope.
///
/// Open breakers (shared or the FX client's internal one) surface as
/// `provider_throttled`; anything else ran out of retries and is an
/// upstream failure.
pub fn map_call_error(err: BreakerError<ProviderError>, trace_id: &str) -> ApiError {
    match err {
        BreakerError::Open | BreakerError::Inner(ProviderError::CircuitOpen) => {
            ApiError::breaker_open(trace_id)
        }
        BreakerError::Inner(inner) => ApiError::upstream(inner.to_string(), trace_id),
    }
}
