//! Circuit breaker guarding calls to one upstream provider.
//!
//! The breaker follows the classic closed → open → half-open transitions,
//! with one addition: an upstream HTTP 403 latches the breaker open in a
//! *frozen* sub-state. A 403 signals a credential or ACL failure rather
//! than a transient fault, so no probe is ever admitted until an operator
//! explicitly resets the breaker.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use bff_breaker::{BreakerError, CircuitBreaker, FailureStatus};
//!
//! #[derive(Debug)]
//! struct UpstreamError(Option<u16>);
//!
//! impl FailureStatus for UpstreamError {
//!     fn http_status(&self) -> Option<u16> {
//!         self.0
//!     }
//! }
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
//! let result: Result<&str, BreakerError<UpstreamError>> = breaker
//!     .call(|| async { Ok("payload") }, Some("a1b2"))
//!     .await;
//! # let _ = result;
//! # }
//! ```

pub use breaker::{CircuitBreaker, CircuitState};
pub use clock::{ManualClock, MonotonicClock, SteadyClock};
pub use error::{BreakerError, FailureStatus};
pub use registry::{BreakerRegistry, BreakerSnapshot};

mod breaker;
mod clock;
mod error;
mod registry;
