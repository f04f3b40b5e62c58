//! Admission gate composing buckets and the adaptive clamp.

use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::backend::CoordinationBackend;
use crate::bucket::TokenBucket;
use crate::budgets::ProviderBudget;
use crate::clamp::AdaptiveClamp;
use crate::clock::Clock;

/// Outcome of one admission decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    /// Seconds until the request would fit; zero when allowed.
    pub retry_after: f64,
}

impl Admission {
    const ALLOWED: Admission = Admission {
        allowed: true,
        retry_after: 0.0,
    };
}

/// The rate-limit gate every inbound request passes through.
///
/// Admission multiplies the requested token cost by the inverse of the
/// provider's clamp, then asks every bucket registered for the provider.
/// All buckets are queried even after one denies, so refill bookkeeping
/// stays consistent; a denying bucket does not debit.
pub struct RateLimitGate {
    buckets: HashMap<String, Vec<TokenBucket>>,
    clamp: AdaptiveClamp,
}

impl RateLimitGate {
    /// Materializes one bucket per defined period per provider.
    pub fn new(
        backend: Arc<dyn CoordinationBackend>,
        budgets: HashMap<String, ProviderBudget>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut buckets: HashMap<String, Vec<TokenBucket>> = HashMap::new();
        for (provider, budget) in budgets {
            let provider_buckets = budget
                .periods()
                .into_iter()
                .map(|(period, ceiling)| {
                    TokenBucket::new(
                        format!("{provider}:{}", period.label()),
                        ceiling,
                        ceiling / period.seconds(),
                        Arc::clone(&backend),
                        Arc::clone(&clock),
                    )
                })
                .collect();
            buckets.insert(provider, provider_buckets);
        }
        Self {
            buckets,
            clamp: AdaptiveClamp::new(clock),
        }
    }

    /// Decides whether a call against `provider` may proceed.
    ///
    /// A provider with no registered budget has no buckets and is admitted
    /// vacuously; routes without an upstream provider ride through the gate
    /// this way.
    pub async fn admit(&self, provider: &str, route: &str, tokens: f64) -> Admission {
        let Some(buckets) = self.buckets.get(provider) else {
            return Admission::ALLOWED;
        };

        let clamp = self.clamp.current(provider);
        let cost = tokens / clamp;

        let mut allowed = true;
        let mut retry_after = 0.0_f64;
        for bucket in buckets {
            let (bucket_allowed, bucket_retry) = bucket.acquire(cost).await;
            if !bucket_allowed {
                allowed = false;
                retry_after = retry_after.max(bucket_retry);
            }
        }

        if !allowed {
            tracing::debug!(provider, route, cost, retry_after, "admission denied");
        }

        #[cfg(feature = "metrics")]
        counter!(
            "ratelimit_admissions_total",
            "provider" => provider.to_string(),
            "outcome" => if allowed { "allowed" } else { "throttled" }
        )
        .increment(1);

        Admission {
            allowed,
            retry_after,
        }
    }

    /// The clamp controller, for outcome feedback and metrics snapshots.
    pub fn clamp(&self) -> &AdaptiveClamp {
        &self.clamp
    }

    /// Names of the providers with registered budgets.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }
}
