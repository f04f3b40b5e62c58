//! Name-keyed registry of provider breakers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::breaker::{CircuitBreaker, CircuitState};

/// Point-in-time view of one registered breaker, for metrics rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub frozen: bool,
}

/// Registry populated at startup with one breaker per provider.
///
/// The operator reset endpoint resolves providers through this registry;
/// unknown names are a distinct error surfaced as 404 by the HTTP layer.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `breaker` under `provider`, replacing any previous entry.
    pub fn register(&self, provider: impl Into<String>, breaker: Arc<CircuitBreaker>) {
        self.breakers
            .write()
            .unwrap()
            .insert(provider.into(), breaker);
    }

    /// Looks up the breaker registered for `provider`.
    pub fn get(&self, provider: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().unwrap().get(provider).cloned()
    }

    /// Snapshots every registered breaker, sorted by provider name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .read()
            .unwrap()
            .iter()
            .map(|(provider, breaker)| BreakerSnapshot {
                provider: provider.clone(),
                state: breaker.state(),
                frozen: breaker.is_frozen(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }
}
