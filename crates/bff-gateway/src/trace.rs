//! Per-request trace ids.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

pub const TRACE_HEADER: &str = "x-trace-id";

/// The trace id attached to every request.
///
/// Taken from the `X-Trace-Id` header when the caller supplies one,
/// otherwise generated as 32 lowercase hex characters. Error envelopes echo
/// it back so client reports can be correlated with logs.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TraceId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(TRACE_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| TraceId(value.to_string()));
        Ok(supplied.unwrap_or_else(TraceId::generate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let trace = TraceId::generate();
        assert_eq!(trace.0.len(), 32);
        assert!(trace.0.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TraceId::generate().0, TraceId::generate().0);
    }
}
