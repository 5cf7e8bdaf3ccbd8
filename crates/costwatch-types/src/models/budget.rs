use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Budget thresholds, already resolved by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// Monthly budget in the billing currency
    pub amount: Decimal,
    /// Utilization percentages that raise a threshold alert (e.g. 50, 75, 90, 100)
    pub levels: Vec<u32>,
    /// Percent above baseline that counts as an anomaly
    pub anomaly_threshold_pct: Decimal,
}

impl BudgetConfig {
    /// Build a config with levels sorted ascending and de-duplicated
    pub fn new(
        amount: Decimal,
        levels: impl IntoIterator<Item = u32>,
        anomaly_threshold_pct: Decimal,
    ) -> Self {
        Self {
            amount,
            levels: normalize_levels(levels),
            anomaly_threshold_pct,
        }
    }

    /// Positive levels in ascending order, regardless of how the config was built
    pub fn sorted_levels(&self) -> Vec<u32> {
        normalize_levels(self.levels.iter().copied())
    }
}

fn normalize_levels(levels: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut levels: Vec<u32> = levels.into_iter().filter(|l| *l > 0).collect();
    levels.sort_unstable();
    levels.dedup();
    levels
}

/// How credits are projected when computing forecast-after-credits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditForecastPolicy {
    /// Subtract the credits applied so far, unchanged
    #[default]
    PassThrough,
    /// Scale credits applied so far to the full month at the observed daily rate
    LinearExtrapolation,
}

impl std::str::FromStr for CreditForecastPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pass_through" | "passthrough" => Ok(Self::PassThrough),
            "linear" | "linear_extrapolation" => Ok(Self::LinearExtrapolation),
            other => Err(format!("unknown credit forecast policy: {}", other)),
        }
    }
}
