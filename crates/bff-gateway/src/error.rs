//! The error envelope every 4xx/5xx response carries.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ClientInvalidContract,
    Unauthorized,
    UnknownProvider,
    PayloadTooLarge,
    UnsupportedMediaType,
    ProviderThrottled,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ClientInvalidContract => "client_invalid_contract",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::UnknownProvider => "unknown_provider",
            ErrorCode::PayloadTooLarge => "payload_too_large",
            ErrorCode::UnsupportedMediaType => "unsupported_media_type",
            ErrorCode::ProviderThrottled => "provider_throttled",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ClientInvalidContract => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::UnknownProvider => StatusCode::NOT_FOUND,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::ProviderThrottled => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An error response: `{ "code": ..., "message": ..., "trace_id": ... }`,
/// plus a `Retry-After` header on throttles coming from the gate.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    trace_id: Option<String>,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    fn new(code: ErrorCode, message: impl Into<String>, trace_id: &str) -> Self {
        Self {
            code,
            message: message.into(),
            trace_id: Some(trace_id.to_string()),
            retry_after_secs: None,
        }
    }

    pub fn invalid_contract(message: impl Into<String>, trace_id: &str) -> Self {
        Self::new(ErrorCode::ClientInvalidContract, message, trace_id)
    }

    pub fn unauthorized(trace_id: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, "operator token required", trace_id)
    }

    pub fn unknown_provider(provider: &str, trace_id: &str) -> Self {
        Self::new(
            ErrorCode::UnknownProvider,
            format!("no breaker registered for provider {provider:?}"),
            trace_id,
        )
    }

    pub fn payload_too_large(trace_id: &str) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            "upload exceeds the 10 MiB limit",
            trace_id,
        )
    }

    pub fn unsupported_media_type(trace_id: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedMediaType,
            "upload must be text/csv",
            trace_id,
        )
    }

    /// A rate-limit gate denial: 429 with `Retry-After: ceil(seconds)`.
    pub fn throttled(retry_after: f64, trace_id: &str) -> Self {
        let mut err = Self::new(
            ErrorCode::ProviderThrottled,
            "provider rate limit exceeded",
            trace_id,
        );
        err.retry_after_secs = Some(retry_after.ceil() as u64);
        err
    }

    /// A breaker refusing calls: same code as a throttle, no retry hint.
    pub fn breaker_open(trace_id: &str) -> Self {
        Self::new(
            ErrorCode::ProviderThrottled,
            "provider temporarily unavailable",
            trace_id,
        )
    }

    pub fn upstream(message: impl Into<String>, trace_id: &str) -> Self {
        Self::new(ErrorCode::UpstreamError, message, trace_id)
    }

    pub fn internal(message: impl Into<String>, trace_id: &str) -> Self {
        Self::new(ErrorCode::InternalError, message, trace_id)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_secs
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        });

        let mut response = (self.code.status(), body).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
