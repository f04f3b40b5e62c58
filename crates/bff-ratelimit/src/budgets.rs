//! Declarative per-provider rate-limit ceilings.

use std::collections::HashMap;

/// A refill period for one bucket of a provider budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Second,
    Minute,
    Day,
}

impl Period {
    /// Length of the period in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            Period::Second => 1.0,
            Period::Minute => 60.0,
            Period::Day => 86_400.0,
        }
    }

    /// Short label used in backend keys (`"{provider}:{period}"`).
    pub fn label(&self) -> &'static str {
        match self {
            Period::Second => "sec",
            Period::Minute => "min",
            Period::Day => "day",
        }
    }
}

/// Ceiling definitions for one provider, immutable after registration.
///
/// Each defined period yields one independent bucket with
/// `capacity = ceiling` and `refill_rate = ceiling / period_seconds`.
/// At least one period must be defined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProviderBudget {
    pub per_sec: Option<f64>,
    pub per_min: Option<f64>,
    pub per_day: Option<f64>,
}

impl ProviderBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-second ceiling (tokens per 1 s).
    pub fn with_per_sec(mut self, ceiling: f64) -> Self {
        self.per_sec = Some(ceiling);
        self
    }

    /// Sets the per-minute ceiling (tokens per 60 s).
    pub fn with_per_min(mut self, ceiling: f64) -> Self {
        self.per_min = Some(ceiling);
        self
    }

    /// Sets the per-day ceiling (tokens per 86 400 s).
    pub fn with_per_day(mut self, ceiling: f64) -> Self {
        self.per_day = Some(ceiling);
        self
    }

    /// The defined `(period, ceiling)` pairs, one bucket each.
    pub fn periods(&self) -> Vec<(Period, f64)> {
        let mut periods = Vec::with_capacity(3);
        if let Some(ceiling) = self.per_sec {
            periods.push((Period::Second, ceiling));
        }
        if let Some(ceiling) = self.per_min {
            periods.push((Period::Minute, ceiling));
        }
        if let Some(ceiling) = self.per_day {
            periods.push((Period::Day, ceiling));
        }
        periods
    }

    /// True when no period is defined.
    pub fn is_empty(&self) -> bool {
        self.per_sec.is_none() && self.per_min.is_none() && self.per_day.is_none()
    }
}

/// The reference budget set for the providers this gateway fronts.
pub fn default_budgets() -> HashMap<String, ProviderBudget> {
    HashMap::from([
        (
            "coingecko".to_string(),
            ProviderBudget::new().with_per_sec(5.0).with_per_min(30.0),
        ),
        (
            "etherscan".to_string(),
            ProviderBudget::new().with_per_sec(5.0).with_per_day(100_000.0),
        ),
        (
            "mempool_space".to_string(),
            ProviderBudget::new().with_per_sec(1.0),
        ),
        ("fx".to_string(), ProviderBudget::new().with_per_min(10.0)),
    ])
}
