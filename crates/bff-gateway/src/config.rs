//! Typed runtime settings loaded from environment variables.

use thiserror::Error;

/// Hosts the gateway may bind to. The service sits behind an internal
/// reverse proxy; binding a public interface is a misconfiguration and is
/// rejected at startup.
const LOCAL_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("API_HOST must be a local address, got {0:?}")]
    NonLocalHost(String),
}

/// Immutable settings snapshot taken once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_host: String,
    pub api_port: u16,
    pub redis_url: String,
    pub debug: bool,
    pub etherscan_api_key: Option<String>,
    pub mempool_space_api_key: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Loads settings through a variable lookup, so tests never have to
    /// mutate the process environment.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_host = get("API_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        if !LOCAL_HOSTS.contains(&api_host.as_str()) {
            return Err(ConfigError::NonLocalHost(api_host));
        }

        let api_port = match get("API_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("API_PORT", raw))?,
            None => 8000,
        };

        let redis_url = get("REDIS_URL").ok_or(ConfigError::Missing("REDIS_URL"))?;

        let debug = get("DEBUG").map(|raw| parse_bool(&raw)).unwrap_or(false);

        Ok(Self {
            api_host,
            api_port,
            redis_url,
            debug,
            etherscan_api_key: get("ETHERSCAN_API_KEY").filter(|v| !v.is_empty()),
            mempool_space_api_key: get("MEMPOOL_SPACE_API_KEY").filter(|v| !v.is_empty()),
        })
    }

    /// Capability flag: Ethereum gas prices require an Etherscan key.
    pub fn eth_gas_enabled(&self) -> bool {
        self.etherscan_api_key.is_some()
    }

    /// Capability flag: Bitcoin mempool stats require a mempool.space key.
    pub fn btc_mempool_enabled(&self) -> bool {
        self.mempool_space_api_key.is_some()
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "on"
    )
}
