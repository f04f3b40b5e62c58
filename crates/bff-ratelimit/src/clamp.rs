//! Adaptive per-provider budget clamp.
//!
//! The clamp scales the usable fraction of a provider's budget between 50%
//! and 100% in 10% steps, with a 60 second cooldown between adjustments.
//! Failures weigh twice as much as successes, so after a cooldown it takes
//! two successes to offset one failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// Lower bound of the clamp.
pub const CLAMP_MIN: f64 = 0.5;
/// Upper bound (no derating).
pub const CLAMP_MAX: f64 = 1.0;
/// Adjustment step per cooldown window.
pub const CLAMP_STEP: f64 = 0.1;
/// Minimum seconds between adjustments.
pub const CLAMP_COOLDOWN_SECS: f64 = 60.0;
/// Counter magnitude required before a step is taken.
pub const CLAMP_HYSTERESIS: i64 = 2;

#[derive(Debug, Clone, Copy)]
struct ClampState {
    clamp: f64,
    last_adjust: f64,
    counter: i64,
}

/// Closed-loop controller derating unhealthy providers.
///
/// One state per provider, created lazily on the first recorded outcome and
/// never destroyed. All state is process-local.
pub struct AdaptiveClamp {
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<String, ClampState>>,
}

impl AdaptiveClamp {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Records a call outcome for `provider` and returns the clamp in force.
    ///
    /// The counter moves by +1 on success and -2 on failure. Inside the
    /// cooldown window the counter is retained but no step is taken. Once
    /// the cooldown has elapsed, a counter at or past the hysteresis
    /// threshold steps the clamp by [`CLAMP_STEP`] toward [`CLAMP_MIN`]
    /// (failures) or [`CLAMP_MAX`] (successes) and resets the counter.
    pub fn adjust(&self, provider: &str, success: bool) -> f64 {
        let now = self.clock.now();
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(provider.to_string())
            .or_insert_with(|| ClampState {
                clamp: CLAMP_MAX,
                last_adjust: now - CLAMP_COOLDOWN_SECS,
                counter: 0,
            });

        state.counter += if success { 1 } else { -2 };

        if now - state.last_adjust < CLAMP_COOLDOWN_SECS {
            return state.clamp;
        }

        if state.counter <= -CLAMP_HYSTERESIS {
            state.clamp = snap((state.clamp - CLAMP_STEP).max(CLAMP_MIN));
            state.counter = 0;
            state.last_adjust = now;
        } else if state.counter >= CLAMP_HYSTERESIS {
            state.clamp = snap((state.clamp + CLAMP_STEP).min(CLAMP_MAX));
            state.counter = 0;
            state.last_adjust = now;
        }

        state.clamp
    }

    /// The clamp currently in force for `provider`, without recording an
    /// outcome. Providers with no history run unclamped.
    pub fn current(&self, provider: &str) -> f64 {
        self.states
            .lock()
            .unwrap()
            .get(provider)
            .map(|s| s.clamp)
            .unwrap_or(CLAMP_MAX)
    }

    /// Current `(provider, clamp)` pairs, for metrics rendering.
    pub fn snapshot(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<_> = self
            .states
            .lock()
            .unwrap()
            .iter()
            .map(|(name, state)| (name.clone(), state.clamp))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

/// Keeps clamp values on exact multiples of 0.1 despite f64 stepping.
fn snap(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
