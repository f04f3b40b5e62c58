//! End-to-end scenarios for the governance pipeline, driven on manual
//! clocks so every timing boundary is exact.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bff_breaker::{BreakerError, CircuitBreaker, CircuitState, FailureStatus, ManualClock};
use bff_ratelimit::{
    AdaptiveClamp, CoordinationBackend, MemoryBackend, ProviderBudget, RateLimitGate,
};

#[derive(Debug)]
struct UpstreamError {
    status: Option<u16>,
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream error")
    }
}

impl FailureStatus for UpstreamError {
    fn http_status(&self) -> Option<u16> {
        self.status
    }
}

fn single_second_budget(provider: &str, ceiling: f64) -> HashMap<String, ProviderBudget> {
    HashMap::from([(
        provider.to_string(),
        ProviderBudget::new().with_per_sec(ceiling),
    )])
}

/// A single per-second budget admits, denies with a one-second hint, and
/// refills.
#[tokio::test]
async fn token_bucket_single_period() {
    let clock = bff_ratelimit::ManualClock::new(0.0);
    let backend: Arc<dyn CoordinationBackend> = Arc::new(MemoryBackend::new());
    let gate = RateLimitGate::new(
        backend,
        single_second_budget("p", 1.0),
        Arc::new(clock.clone()),
    );

    let first = gate.admit("p", "/r", 1.0).await;
    assert!(first.allowed);
    assert_eq!(first.retry_after, 0.0);

    let second = gate.admit("p", "/r", 1.0).await;
    assert!(!second.allowed);
    assert!((second.retry_after - 1.0).abs() < 1e-9);

    clock.advance(1.0);
    assert!(gate.admit("p", "/r", 1.0).await.allowed);
}

/// Admit-then-wait law: a denied acquire succeeds after waiting exactly the
/// reported retry_after with no other traffic on the key.
#[tokio::test]
async fn denied_admission_recovers_after_reported_wait() {
    let clock = bff_ratelimit::ManualClock::new(0.0);
    let backend: Arc<dyn CoordinationBackend> = Arc::new(MemoryBackend::new());
    let gate = RateLimitGate::new(
        backend,
        single_second_budget("p", 3.0),
        Arc::new(clock.clone()),
    );

    assert!(gate.admit("p", "/r", 3.0).await.allowed);
    let denied = gate.admit("p", "/r", 2.0).await;
    assert!(!denied.allowed);

    // A hair past the hint, so f64 rounding cannot land short of the cost.
    clock.advance(denied.retry_after + 1e-9);
    assert!(gate.admit("p", "/r", 2.0).await.allowed);
}

/// Clamp hysteresis across the 60 s cooldown.
#[tokio::test]
async fn clamp_hysteresis_sequence() {
    let clock = bff_ratelimit::ManualClock::new(0.0);
    let clamp = AdaptiveClamp::new(Arc::new(clock.clone()));

    assert_eq!(clamp.adjust("cg", false), 0.9);
    assert_eq!(clamp.adjust("cg", true), 0.9);
    clock.advance(60.0);
    assert_eq!(clamp.adjust("cg", true), 1.0);
}

/// Breaker auto-recovery through the probe interval.
#[tokio::test]
async fn breaker_auto_recovery() {
    let clock = ManualClock::new(0.0);
    let breaker = CircuitBreaker::with_clock(1, Duration::from_secs(10), Arc::new(clock.clone()));

    let opened = breaker
        .call(
            || async { Err::<(), _>(UpstreamError { status: None }) },
            None,
        )
        .await;
    assert!(matches!(opened, Err(BreakerError::Inner(_))));
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(5.0);
    let blocked: Result<(), BreakerError<UpstreamError>> =
        breaker.call(|| async { Ok(()) }, None).await;
    assert!(matches!(blocked, Err(BreakerError::Open)));

    clock.advance(6.0);
    let recovered: Result<(), BreakerError<UpstreamError>> =
        breaker.call(|| async { Ok(()) }, None).await;
    assert!(recovered.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// A 403 freezes the breaker until an operator reset.
#[tokio::test]
async fn breaker_403_freeze_and_operator_reset() {
    let clock = ManualClock::new(0.0);
    let breaker = CircuitBreaker::with_clock(5, Duration::from_secs(10), Arc::new(clock.clone()));

    let frozen = breaker
        .call(
            || async { Err::<(), _>(UpstreamError { status: Some(403) }) },
            Some("tid"),
        )
        .await;
    assert!(frozen.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.is_frozen());

    clock.advance(1e6);
    let blocked: Result<(), BreakerError<UpstreamError>> =
        breaker.call(|| async { Ok(()) }, None).await;
    assert!(matches!(blocked, Err(BreakerError::Open)));

    breaker.reset(Some("tid"));
    assert_eq!(breaker.state(), CircuitState::Closed);

    let recovered: Result<u32, BreakerError<UpstreamError>> =
        breaker.call(|| async { Ok(5) }, None).await;
    assert_eq!(recovered.unwrap(), 5);
}

/// Backend loss must degrade to local state, never to unlimited admission.
#[tokio::test]
async fn backend_outage_still_denies_when_exhausted() {
    struct DownBackend;

    #[async_trait::async_trait]
    impl CoordinationBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, bff_ratelimit::BackendError> {
            Err(bff_ratelimit::BackendError::Transport("down".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), bff_ratelimit::BackendError> {
            Err(bff_ratelimit::BackendError::Transport("down".into()))
        }

        async fn ping(&self) -> Result<(), bff_ratelimit::BackendError> {
            Err(bff_ratelimit::BackendError::Transport("down".into()))
        }
    }

    let clock = bff_ratelimit::ManualClock::new(0.0);
    let gate = RateLimitGate::new(
        Arc::new(DownBackend),
        single_second_budget("p", 2.0),
        Arc::new(clock.clone()),
    );

    assert!(gate.admit("p", "/r", 1.0).await.allowed);
    assert!(gate.admit("p", "/r", 1.0).await.allowed);
    assert!(!gate.admit("p", "/r", 1.0).await.allowed);

    clock.advance(1.0);
    assert!(gate.admit("p", "/r", 1.0).await.allowed);
}
