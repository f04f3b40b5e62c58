//! Etherscan gas price client.

use async_trait::async_trait;

use super::{GasPrices, GasSource, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/api";

/// Minimal client for Etherscan gas price estimates.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EtherscanClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl GasSource for EtherscanClient {
    async fn gas_prices(&self) -> Result<GasPrices, ProviderError> {
        let mut request = self.http.get(format!("{}/gas", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key)]);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
