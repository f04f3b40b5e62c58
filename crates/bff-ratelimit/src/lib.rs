//! Provider rate limiting for the BFF gateway.
//!
//! This crate implements the admission half of the provider-governance
//! pipeline:
//!
//! - [`TokenBucket`]: a multi-period token bucket whose state lives in a
//!   shared coordination backend (Redis), with a transparent per-process
//!   fallback when the backend is unreachable.
//! - [`ProviderBudget`]: declarative per-provider ceilings (per second,
//!   per minute, per day), each defined period yielding one bucket.
//! - [`AdaptiveClamp`]: a closed-loop controller that derates the usable
//!   fraction of a provider's budget when calls fail and restores it as
//!   they recover.
//! - [`RateLimitGate`]: composes buckets and clamp into a single
//!   `admit(provider, route)` decision.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bff_ratelimit::{default_budgets, MemoryBackend, RateLimitGate, SystemClock};
//!
//! # async fn example() {
//! let gate = RateLimitGate::new(
//!     Arc::new(MemoryBackend::new()),
//!     default_budgets(),
//!     Arc::new(SystemClock),
//! );
//!
//! let admission = gate.admit("coingecko", "/assets/eth/candles", 1.0).await;
//! if !admission.allowed {
//!     // Tell the client to come back in `admission.retry_after` seconds.
//! }
//! # }
//! ```

pub use backend::{BackendError, CoordinationBackend, MemoryBackend, RedisBackend};
pub use bucket::TokenBucket;
pub use budgets::{default_budgets, Period, ProviderBudget};
pub use clamp::{AdaptiveClamp, CLAMP_COOLDOWN_SECS, CLAMP_HYSTERESIS, CLAMP_MAX, CLAMP_MIN, CLAMP_STEP};
pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{Admission, RateLimitGate};

mod backend;
mod bucket;
mod budgets;
mod clamp;
mod clock;
mod gate;
