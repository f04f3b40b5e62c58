//! Shared fixtures for the gateway integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use tower::ServiceExt;

use bff_gateway::providers::{
    Candle, CandleSource, FxSource, GasPrices, GasSource, MempoolData, MempoolSource,
    ProviderError,
};
use bff_gateway::{Gateway, GatewayBuilder, ImportError, ImportProcessor, ImportResult, Settings};

pub fn test_settings() -> Settings {
    Settings::from_vars(|name| match name {
        "REDIS_URL" => Some("redis://127.0.0.1:6379/0".to_string()),
        "ETHERSCAN_API_KEY" => Some("test-etherscan-key".to_string()),
        _ => None,
    })
    .expect("test settings should load")
}

/// Builder preloaded with deterministic stubs for every provider.
pub fn stub_gateway() -> GatewayBuilder {
    Gateway::builder(test_settings())
        .candles(Arc::new(StubCandles))
        .gas(Arc::new(StubGas))
        .mempool(Arc::new(StubMempool))
}

pub async fn send(gateway: Arc<Gateway>, request: Request<Body>) -> Response<Body> {
    bff_gateway::router(gateway)
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn get(gateway: Arc<Gateway>, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = send(
        gateway,
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build"),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

pub struct StubCandles;

#[async_trait]
impl CandleSource for StubCandles {
    async fn candles(&self, _asset_id: &str) -> Result<Vec<Candle>, ProviderError> {
        Ok(vec![Candle {
            t: 0,
            o: 1.0,
            h: 2.0,
            l: 0.5,
            c: 1.5,
            v: 100.0,
            resolution: "1d".to_string(),
            asof: 1_700_000_000.0,
            source: "coingecko".to_string(),
        }])
    }
}

pub struct StubGas;

#[async_trait]
impl GasSource for StubGas {
    async fn gas_prices(&self) -> Result<GasPrices, ProviderError> {
        Ok(GasPrices {
            safe: 10.0,
            propose: 12.0,
            fast: 20.0,
        })
    }
}

pub struct StubMempool;

#[async_trait]
impl MempoolSource for StubMempool {
    async fn mempool(&self) -> Result<MempoolData, ProviderError> {
        Ok(MempoolData {
            txs: 1000,
            size: 5_000_000,
        })
    }
}

/// Gas source failing every attempt with a fixed HTTP status.
pub struct FailingGas {
    pub status: u16,
}

#[async_trait]
impl GasSource for FailingGas {
    async fn gas_prices(&self) -> Result<GasPrices, ProviderError> {
        Err(ProviderError::Status(self.status))
    }
}

/// Gas source that serves 403 for the first `deny_attempts` attempts, then
/// recovers.
pub struct RecoveringGas {
    pub deny_attempts: usize,
    pub attempts: AtomicUsize,
}

impl RecoveringGas {
    pub fn new(deny_attempts: usize) -> Self {
        Self {
            deny_attempts,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GasSource for RecoveringGas {
    async fn gas_prices(&self) -> Result<GasPrices, ProviderError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.deny_attempts {
            Err(ProviderError::Status(403))
        } else {
            Ok(GasPrices {
                safe: 1.0,
                propose: 2.0,
                fast: 3.0,
            })
        }
    }
}

/// Import processor recording how many times it actually ran.
pub struct CountingImporter {
    pub calls: AtomicUsize,
}

impl CountingImporter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImportProcessor for CountingImporter {
    async fn process(&self, _csv_path: &std::path::Path) -> Result<ImportResult, ImportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ImportResult { imported: 1 })
    }
}

/// FX stub pinned to a constant rate.
pub struct FixedFx(pub f64);

#[async_trait]
impl FxSource for FixedFx {
    async fn rate(&self, _base: &str, _quote: &str) -> Result<f64, ProviderError> {
        Ok(self.0)
    }
}
