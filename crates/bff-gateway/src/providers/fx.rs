//! FX rate sources.
//!
//! [`FxClient`] talks to a real FX service with its own timeout, retry, and
//! consecutive-failure breaker. The internal breaker predates the shared
//! breaker registry and is kept for compatibility: the registry breaker
//! wrapping the call remains authoritative, this one only stops a runaway
//! client when no registry breaker is in front of it.
//!
//! [`DeterministicFx`] is the stub used in development and tests: a stable
//! pseudo rate derived from a SHA-256 hash of the currency pair.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{FxSource, ProviderError};

#[derive(Debug, Default)]
struct LegacyBreaker {
    failures: u32,
    opened_at: Option<Instant>,
}

/// HTTP FX client enforcing timeout, retries, and its internal breaker.
#[derive(Debug)]
pub struct FxClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retries: u32,
    breaker_threshold: u32,
    reset_timeout: Duration,
    breaker: Mutex<LegacyBreaker>,
}

impl FxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(5),
            retries: 3,
            breaker_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            breaker: Mutex::new(LegacyBreaker::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, reset_timeout: Duration) -> Self {
        self.breaker_threshold = threshold;
        self.reset_timeout = reset_timeout;
        self
    }

    /// True while the internal breaker blocks calls; an elapsed reset
    /// timeout clears it in place.
    fn breaker_open(&self) -> bool {
        let mut breaker = self.breaker.lock().unwrap();
        match breaker.opened_at {
            Some(opened_at) if opened_at.elapsed() > self.reset_timeout => {
                breaker.failures = 0;
                breaker.opened_at = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    async fn fetch(&self, base: &str, quote: &str) -> Result<f64, ProviderError> {
        let url = format!("{}/latest?base={base}&symbols={quote}", self.base_url);
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        #[derive(Deserialize)]
        struct RatesBody {
            rates: HashMap<String, f64>,
        }

        let body: RatesBody = response.json().await?;
        body.rates
            .get(quote)
            .copied()
            .ok_or(ProviderError::MissingField("rates"))
    }
}

#[async_trait]
impl FxSource for FxClient {
    async fn rate(&self, base: &str, quote: &str) -> Result<f64, ProviderError> {
        if self.breaker_open() {
            return Err(ProviderError::CircuitOpen);
        }

        let mut last_err = None;
        for _ in 0..self.retries {
            match self.fetch(base, quote).await {
                Ok(rate) => {
                    let mut breaker = self.breaker.lock().unwrap();
                    breaker.failures = 0;
                    breaker.opened_at = None;
                    return Ok(rate);
                }
                Err(err) => {
                    last_err = Some(err);
                    // Let other request tasks make progress between attempts.
                    tokio::task::yield_now().await;
                }
            }
        }

        let mut breaker = self.breaker.lock().unwrap();
        breaker.failures += 1;
        if breaker.failures >= self.breaker_threshold {
            breaker.opened_at = Some(Instant::now());
        }
        Err(last_err.unwrap_or(ProviderError::Transport("no attempts made".to_string())))
    }
}

/// Stable pseudo rate in `[0.5, 1.5)` derived from the currency pair.
///
/// Deterministic for the same inputs so downstream calculations are
/// reproducible without network access.
pub fn deterministic_rate(base: &str, quote: &str) -> f64 {
    let digest = Sha256::digest(format!("{base}:{quote}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(prefix);
    let rate = 0.5 + (value % 1000) as f64 / 1000.0;
    (rate * 1e6).round() / 1e6
}

/// The deterministic FX stub wired in when no FX service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicFx;

#[async_trait]
impl FxSource for DeterministicFx {
    async fn rate(&self, base: &str, quote: &str) -> Result<f64, ProviderError> {
        Ok(deterministic_rate(base, quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn deterministic_rate_is_stable_and_bounded() {
        let first = deterministic_rate("USD", "EUR");
        let second = deterministic_rate("USD", "EUR");
        assert_eq!(first, second);
        assert!((0.5..1.5).contains(&first));
    }

    #[test]
    fn deterministic_rate_depends_on_pair_order() {
        assert_ne!(
            deterministic_rate("USD", "EUR"),
            deterministic_rate("EUR", "USD")
        );
    }

    #[tokio::test]
    async fn stub_source_returns_the_stub_rate() {
        let rate = DeterministicFx.rate("USD", "JPY").await.unwrap();
        assert_eq!(rate, deterministic_rate("USD", "JPY"));
    }

    #[tokio::test]
    async fn retries_recover_from_a_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "USD"))
            .and(query_param("symbols", "EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rates": {"EUR": 0.9}
            })))
            .mount(&server)
            .await;

        let client = FxClient::new(server.uri());
        let rate = client.rate("USD", "EUR").await.unwrap();
        assert_eq!(rate, 0.9);
    }

    #[tokio::test]
    async fn missing_rate_field_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rates": {}
            })))
            .mount(&server)
            .await;

        let client = FxClient::new(server.uri()).with_retries(1);
        let err = client.rate("USD", "EUR").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingField("rates")));
    }

    #[tokio::test]
    async fn exhaustion_opens_the_internal_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = FxClient::new(server.uri())
            .with_retries(1)
            .with_breaker(2, Duration::from_secs(60));

        // Two exhausted invocations reach the threshold.
        assert!(matches!(
            client.rate("USD", "EUR").await.unwrap_err(),
            ProviderError::Status(500)
        ));
        assert!(matches!(
            client.rate("USD", "EUR").await.unwrap_err(),
            ProviderError::Status(500)
        ));

        // The third call is blocked without touching the network.
        assert!(matches!(
            client.rate("USD", "EUR").await.unwrap_err(),
            ProviderError::CircuitOpen
        ));
    }
}
