//! HTTP handlers for the gateway surface.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;

use bff_breaker::CircuitState;

use crate::call::{guarded_call, map_call_error};
use crate::error::ApiError;
use crate::import::{ImportResult, MAX_UPLOAD_BYTES};
use crate::providers::{Candle, GasPrices, MempoolData};
use crate::trace::TraceId;
use crate::{
    Gateway, PROVIDER_COINGECKO, PROVIDER_ETHERSCAN, PROVIDER_FX, PROVIDER_GATEWAY,
    PROVIDER_MEMPOOL,
};

/// Liveness payload for `/health`.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: String,
    pub versions: HashMap<&'static str, String>,
    pub uptime: f64,
    pub backend: String,
}

/// Passes the request through the rate-limit gate, mapping a denial onto
/// the 429 envelope with its `Retry-After` hint.
async fn admit(gateway: &Gateway, provider: &str, route: &str, trace: &TraceId) -> Result<(), ApiError> {
    let admission = gateway.gate().admit(provider, route, 1.0).await;
    if admission.allowed {
        Ok(())
    } else {
        Err(ApiError::throttled(admission.retry_after, trace.as_str()))
    }
}

pub async fn health(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
) -> Result<Json<Health>, ApiError> {
    admit(&gateway, PROVIDER_GATEWAY, "/health", &trace).await?;

    let backend = match gateway.backend().ping().await {
        Ok(()) => "ok",
        Err(_) => "down",
    };

    Ok(Json(Health {
        status: "ok".to_string(),
        versions: HashMap::from([("app", env!("CARGO_PKG_VERSION").to_string())]),
        uptime: gateway.uptime(),
        backend: backend.to_string(),
    }))
}

pub async fn capabilities(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
) -> Result<Json<serde_json::Value>, ApiError> {
    admit(&gateway, PROVIDER_GATEWAY, "/capabilities", &trace).await?;

    let settings = gateway.settings();
    Ok(Json(json!({
        "news": false,
        "eth_gas": { "enabled": settings.eth_gas_enabled() },
        "btc_mempool": { "enabled": settings.btc_mempool_enabled() },
    })))
}

pub async fn asset_candles(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
    Path(asset_id): Path<String>,
) -> Result<Json<Vec<Candle>>, ApiError> {
    if !is_valid_asset_id(&asset_id) {
        return Err(ApiError::invalid_contract(
            "asset id must match [A-Za-z0-9_-]{1,64}",
            trace.as_str(),
        ));
    }

    admit(&gateway, PROVIDER_COINGECKO, "/assets/candles", &trace).await?;

    let breaker = gateway
        .breakers()
        .get(PROVIDER_COINGECKO)
        .ok_or_else(|| ApiError::internal("coingecko breaker not registered", trace.as_str()))?;

    let source = Arc::clone(gateway.candles());
    let candles = guarded_call(
        &breaker,
        gateway.gate().clamp(),
        PROVIDER_COINGECKO,
        trace.as_str(),
        gateway.policy(),
        || {
            let source = Arc::clone(&source);
            let asset_id = asset_id.clone();
            async move { source.candles(&asset_id).await }
        },
    )
    .await
    .map_err(|err| map_call_error(err, trace.as_str()))?;

    Ok(Json(candles))
}

pub async fn fx_rate(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
    Path((base, quote)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !is_valid_currency(&base) || !is_valid_currency(&quote) {
        return Err(ApiError::invalid_contract(
            "currency codes must match [A-Z]{3}",
            trace.as_str(),
        ));
    }

    admit(&gateway, PROVIDER_FX, "/fx", &trace).await?;

    let breaker = gateway
        .breakers()
        .get(PROVIDER_FX)
        .ok_or_else(|| ApiError::internal("fx breaker not registered", trace.as_str()))?;

    let source = Arc::clone(gateway.fx());
    let rate = guarded_call(
        &breaker,
        gateway.gate().clamp(),
        PROVIDER_FX,
        trace.as_str(),
        gateway.policy(),
        || {
            let source = Arc::clone(&source);
            let base = base.clone();
            let quote = quote.clone();
            async move { source.rate(&base, &quote).await }
        },
    )
    .await
    .map_err(|err| map_call_error(err, trace.as_str()))?;

    Ok(Json(json!({ "base": base, "quote": quote, "rate": rate })))
}

pub async fn eth_gas(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
) -> Result<Json<GasPrices>, ApiError> {
    admit(&gateway, PROVIDER_ETHERSCAN, "/onchain/eth/gas", &trace).await?;

    let breaker = gateway
        .breakers()
        .get(PROVIDER_ETHERSCAN)
        .ok_or_else(|| ApiError::internal("etherscan breaker not registered", trace.as_str()))?;

    let source = Arc::clone(gateway.gas());
    let prices = guarded_call(
        &breaker,
        gateway.gate().clamp(),
        PROVIDER_ETHERSCAN,
        trace.as_str(),
        gateway.policy(),
        || {
            let source = Arc::clone(&source);
            async move { source.gas_prices().await }
        },
    )
    .await
    .map_err(|err| map_call_error(err, trace.as_str()))?;

    Ok(Json(prices))
}

pub async fn btc_mempool(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
) -> Result<Json<MempoolData>, ApiError> {
    admit(&gateway, PROVIDER_MEMPOOL, "/onchain/btc/mempool", &trace).await?;

    let breaker = gateway
        .breakers()
        .get(PROVIDER_MEMPOOL)
        .ok_or_else(|| ApiError::internal("mempool breaker not registered", trace.as_str()))?;

    let source = Arc::clone(gateway.mempool());
    let stats = guarded_call(
        &breaker,
        gateway.gate().clamp(),
        PROVIDER_MEMPOOL,
        trace.as_str(),
        gateway.policy(),
        || {
            let source = Arc::clone(&source);
            async move { source.mempool().await }
        },
    )
    .await
    .map_err(|err| map_call_error(err, trace.as_str()))?;

    Ok(Json(stats))
}

pub async fn import_holdings(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<ImportResult>, ApiError> {
    admit(&gateway, PROVIDER_GATEWAY, "/portfolio/holdings/import", &trace).await?;

    let key = headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::invalid_contract("Idempotency-Key header is required", trace.as_str())
        })?;
    if !bff_idempotency::IdempotencyCache::<ImportResult>::is_valid_key(key) {
        return Err(ApiError::invalid_contract(
            "Idempotency-Key must match [A-Za-z0-9_-]{1,255}",
            trace.as_str(),
        ));
    }
    let key = key.to_string();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if content_type != "text/csv" && !content_type.starts_with("text/csv;") {
        return Err(ApiError::unsupported_media_type(trace.as_str()));
    }

    // A declared oversized payload is rejected before any byte is read.
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
    {
        if length > MAX_UPLOAD_BYTES {
            return Err(ApiError::payload_too_large(trace.as_str()));
        }
    }

    // Spool the upload to a temp file; dropping the spool on any early
    // return removes the file, so rejected requests leave the temp
    // directory untouched.
    let spool = tempfile::NamedTempFile::new()
        .map_err(|err| ApiError::internal(format!("spool create failed: {err}"), trace.as_str()))?;

    let mut total: u64 = 0;
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            ApiError::internal(format!("upload read failed: {err}"), trace.as_str())
        })?;
        total += chunk.len() as u64;
        if total > MAX_UPLOAD_BYTES {
            return Err(ApiError::payload_too_large(trace.as_str()));
        }
        spool.as_file().write_all(&chunk).map_err(|err| {
            ApiError::internal(format!("spool write failed: {err}"), trace.as_str())
        })?;
    }

    let importer = Arc::clone(gateway.importer());
    let path = spool.path().to_path_buf();
    let result = gateway
        .idempotency()
        .get_or_compute(&key, || async move { importer.process(&path).await })
        .await
        .map_err(|err| ApiError::internal(err.to_string(), trace.as_str()))?;

    Ok(Json(result))
}

pub async fn reset_breaker(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer operator");
    if !authorized {
        return Err(ApiError::unauthorized(trace.as_str()));
    }

    let breaker = gateway
        .breakers()
        .get(&provider)
        .ok_or_else(|| ApiError::unknown_provider(&provider, trace.as_str()))?;

    breaker.reset(Some(trace.as_str()));
    Ok(Json(json!({ "status": "reset" })))
}

pub async fn metrics(
    State(gateway): State<Arc<Gateway>>,
    trace: TraceId,
) -> Result<Response, ApiError> {
    admit(&gateway, PROVIDER_GATEWAY, "/metrics", &trace).await?;

    let mut body = String::new();
    body.push_str(&format!("app_uptime_seconds {:.3}\n", gateway.uptime()));

    let mut providers: Vec<&str> = gateway.gate().providers().collect();
    providers.sort_unstable();
    for provider in providers {
        body.push_str(&format!(
            "rate_limit_clamp{{provider=\"{provider}\"}} {:.1}\n",
            gateway.gate().clamp().current(provider)
        ));
    }

    for snapshot in gateway.breakers().snapshot() {
        let state = match snapshot.state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        };
        body.push_str(&format!(
            "breaker_state{{provider=\"{}\"}} {state}\n",
            snapshot.provider
        ));
        body.push_str(&format!(
            "breaker_frozen{{provider=\"{}\"}} {}\n",
            snapshot.provider,
            u8::from(snapshot.frozen)
        ));
    }

    body.push_str(&format!(
        "idempotency_entries {}\n",
        gateway.idempotency().len()
    ));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

fn is_valid_asset_id(asset_id: &str) -> bool {
    !asset_id.is_empty()
        && asset_id.len() <= 64
        && asset_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}
