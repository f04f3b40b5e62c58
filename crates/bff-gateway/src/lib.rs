//! Backend-for-frontend gateway for the analytics UI.
//!
//! The gateway fronts several unreliable third-party HTTP providers (price,
//! on-chain gas, mempool, FX) and exposes a small typed surface. Every
//! request passes the rate-limit gate; every outbound provider call runs
//! under a circuit breaker with timeout and retries; unsafe writes are
//! deduplicated by idempotency key.
//!
//! [`Gateway`] is the single composed object handlers borrow: the gate,
//! the breaker registry, the idempotency cache, and the provider clients
//! are built once at startup and injected, never reached through globals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use bff_breaker::{BreakerRegistry, CircuitBreaker};
use bff_idempotency::IdempotencyCache;
use bff_ratelimit::{
    default_budgets, Clock, CoordinationBackend, MemoryBackend, ProviderBudget, RateLimitGate,
    SystemClock,
};

pub use call::{guarded_call, map_call_error, CallPolicy};
pub use config::{ConfigError, Settings};
pub use error::{ApiError, ErrorCode};
pub use import::{CsvImporter, ImportError, ImportProcessor, ImportResult, MAX_UPLOAD_BYTES};
pub use trace::TraceId;

use providers::{
    CandleSource, CoinGeckoClient, DeterministicFx, EtherscanClient, FxSource, GasSource,
    MempoolSource, MempoolSpaceClient,
};

pub mod call;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod providers;
pub mod routes;
pub mod trace;

/// Provider names as registered in budgets and the breaker registry.
pub const PROVIDER_COINGECKO: &str = "coingecko";
pub const PROVIDER_ETHERSCAN: &str = "etherscan";
pub const PROVIDER_MEMPOOL: &str = "mempool_space";
pub const PROVIDER_FX: &str = "fx";
/// Pseudo-provider for routes with no upstream; it carries no budget, so
/// the gate admits it vacuously.
pub const PROVIDER_GATEWAY: &str = "gateway";

/// Everything a handler needs, composed once at startup.
pub struct Gateway {
    settings: Settings,
    started_at: Instant,
    backend: Arc<dyn CoordinationBackend>,
    gate: RateLimitGate,
    breakers: BreakerRegistry,
    idempotency: IdempotencyCache<ImportResult>,
    candles: Arc<dyn CandleSource>,
    gas: Arc<dyn GasSource>,
    mempool: Arc<dyn MempoolSource>,
    fx: Arc<dyn FxSource>,
    importer: Arc<dyn ImportProcessor>,
    policy: CallPolicy,
}

impl Gateway {
    pub fn builder(settings: Settings) -> GatewayBuilder {
        GatewayBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &dyn CoordinationBackend {
        self.backend.as_ref()
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn idempotency(&self) -> &IdempotencyCache<ImportResult> {
        &self.idempotency
    }

    pub fn candles(&self) -> &Arc<dyn CandleSource> {
        &self.candles
    }

    pub fn gas(&self) -> &Arc<dyn GasSource> {
        &self.gas
    }

    pub fn mempool(&self) -> &Arc<dyn MempoolSource> {
        &self.mempool
    }

    pub fn fx(&self) -> &Arc<dyn FxSource> {
        &self.fx
    }

    pub fn importer(&self) -> &Arc<dyn ImportProcessor> {
        &self.importer
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    /// Seconds since the gateway came up.
    pub fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Builder wiring real collaborators by default; tests inject stubs.
pub struct GatewayBuilder {
    settings: Settings,
    backend: Option<Arc<dyn CoordinationBackend>>,
    budgets: Option<HashMap<String, ProviderBudget>>,
    clock: Option<Arc<dyn Clock>>,
    candles: Option<Arc<dyn CandleSource>>,
    gas: Option<Arc<dyn GasSource>>,
    mempool: Option<Arc<dyn MempoolSource>>,
    fx: Option<Arc<dyn FxSource>>,
    importer: Option<Arc<dyn ImportProcessor>>,
    policy: CallPolicy,
    breaker_failure_threshold: u32,
    breaker_probe_interval: Duration,
}

impl GatewayBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            backend: None,
            budgets: None,
            clock: None,
            candles: None,
            gas: None,
            mempool: None,
            fx: None,
            importer: None,
            policy: CallPolicy::default(),
            breaker_failure_threshold: 5,
            breaker_probe_interval: Duration::from_secs(30),
        }
    }

    pub fn backend(mut self, backend: Arc<dyn CoordinationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn budgets(mut self, budgets: HashMap<String, ProviderBudget>) -> Self {
        self.budgets = Some(budgets);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn candles(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.candles = Some(source);
        self
    }

    pub fn gas(mut self, source: Arc<dyn GasSource>) -> Self {
        self.gas = Some(source);
        self
    }

    pub fn mempool(mut self, source: Arc<dyn MempoolSource>) -> Self {
        self.mempool = Some(source);
        self
    }

    pub fn fx(mut self, source: Arc<dyn FxSource>) -> Self {
        self.fx = Some(source);
        self
    }

    pub fn importer(mut self, importer: Arc<dyn ImportProcessor>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn call_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn breaker_config(mut self, failure_threshold: u32, probe_interval: Duration) -> Self {
        self.breaker_failure_threshold = failure_threshold;
        self.breaker_probe_interval = probe_interval;
        self
    }

    pub fn build(self) -> Arc<Gateway> {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let budgets = self.budgets.unwrap_or_else(default_budgets);

        let breakers = BreakerRegistry::new();
        for provider in budgets.keys() {
            breakers.register(
                provider.clone(),
                Arc::new(CircuitBreaker::new(
                    self.breaker_failure_threshold,
                    self.breaker_probe_interval,
                )),
            );
        }

        let gate = RateLimitGate::new(Arc::clone(&backend), budgets, clock);

        let candles = self
            .candles
            .unwrap_or_else(|| Arc::new(CoinGeckoClient::default()));
        let gas = self.gas.unwrap_or_else(|| {
            Arc::new(EtherscanClient::new(
                providers::etherscan::DEFAULT_BASE_URL,
                self.settings.etherscan_api_key.clone(),
            ))
        });
        let mempool = self
            .mempool
            .unwrap_or_else(|| Arc::new(MempoolSpaceClient::default()));
        let fx = self.fx.unwrap_or_else(|| Arc::new(DeterministicFx));
        let importer = self.importer.unwrap_or_else(|| Arc::new(CsvImporter));

        Arc::new(Gateway {
            settings: self.settings,
            started_at: Instant::now(),
            backend,
            gate,
            breakers,
            idempotency: IdempotencyCache::new(),
            candles,
            gas,
            mempool,
            fx,
            importer,
            policy: self.policy,
        })
    }
}

/// Builds the HTTP surface over a composed [`Gateway`].
pub fn router(gateway: Arc<Gateway>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://localhost:3000"),
        ])
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    Router::new()
        .route("/health", get(routes::health))
        .route("/capabilities", get(routes::capabilities))
        .route("/assets/:asset_id/candles", get(routes::asset_candles))
        .route("/portfolio/holdings/import", post(routes::import_holdings))
        .route("/fx/:base/:quote", get(routes::fx_rate))
        .route("/onchain/eth/gas", get(routes::eth_gas))
        .route("/onchain/btc/mempool", get(routes::btc_mempool))
        .route("/operator/breaker/:provider/reset", post(routes::reset_breaker))
        .route("/metrics", get(routes::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(gateway)
}
