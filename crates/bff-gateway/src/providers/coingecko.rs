//! CoinGecko price data client.

use async_trait::async_trait;

use super::{Candle, CandleSource, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Minimal CoinGecko HTTP client.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl CandleSource for CoinGeckoClient {
    async fn candles(&self, asset_id: &str) -> Result<Vec<Candle>, ProviderError> {
        let url = format!("{}/candles/{asset_id}", self.base_url);
        let response = self.http.get(url).send().await?.error_for_status()?;
        let mut candles: Vec<Candle> = response.json().await?;
        for candle in &mut candles {
            if candle.source.is_empty() {
                candle.source = "coingecko".to_string();
            }
        }
        Ok(candles)
    }
}
