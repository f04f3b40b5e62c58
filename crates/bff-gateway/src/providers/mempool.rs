//! mempool.space statistics client.

use async_trait::async_trait;

use super::{MempoolData, MempoolSource, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://mempool.space/api";

#[derive(Debug, Clone)]
pub struct MempoolSpaceClient {
    http: reqwest::Client,
    base_url: String,
}

impl MempoolSpaceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for MempoolSpaceClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl MempoolSource for MempoolSpaceClient {
    async fn mempool(&self) -> Result<MempoolData, ProviderError> {
        let url = format!("{}/mempool", self.base_url);
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
