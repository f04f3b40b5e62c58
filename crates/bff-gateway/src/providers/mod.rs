//! Provider clients and the interfaces handlers depend on.
//!
//! Each external data source is a constructor-injected trait object so
//! tests substitute stubs without touching global state. The reqwest
//! implementations are deliberately thin: timeouts, retries, and breaker
//! wrapping live in [`crate::call`], not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bff_breaker::FailureStatus;

pub use coingecko::CoinGeckoClient;
pub use etherscan::EtherscanClient;
pub use fx::{deterministic_rate, DeterministicFx, FxClient};
pub use mempool::MempoolSpaceClient;

pub mod coingecko;
pub mod etherscan;
pub mod fx;
pub mod mempool;

/// One OHLCV candle as served to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
    pub resolution: String,
    pub asof: f64,
    /// Provenance marker; filled with the provider name when the upstream
    /// payload omits it.
    #[serde(default)]
    pub source: String,
}

/// Ethereum gas price estimates in gwei.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasPrices {
    pub safe: f64,
    pub propose: f64,
    pub fast: f64,
}

/// Bitcoin mempool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolData {
    pub txs: u64,
    pub size: u64,
}

/// Failures observable from a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure: connect, DNS, broken transfer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(u16),

    /// The response parsed but lacked an expected field.
    #[error("missing field {0:?} in upstream response")]
    MissingField(&'static str),

    /// The per-attempt deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// The FX client's internal breaker is open.
    #[error("circuit breaker open")]
    CircuitOpen,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Status(status.as_u16())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl FailureStatus for ProviderError {
    fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// OHLCV candles for an asset.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn candles(&self, asset_id: &str) -> Result<Vec<Candle>, ProviderError>;
}

/// Ethereum gas price estimates.
#[async_trait]
pub trait GasSource: Send + Sync {
    async fn gas_prices(&self) -> Result<GasPrices, ProviderError>;
}

/// Bitcoin mempool statistics.
#[async_trait]
pub trait MempoolSource: Send + Sync {
    async fn mempool(&self) -> Result<MempoolData, ProviderError>;
}

/// Spot FX rates between two ISO-4217 currencies.
#[async_trait]
pub trait FxSource: Send + Sync {
    async fn rate(&self, base: &str, quote: &str) -> Result<f64, ProviderError>;
}
