use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Alert dedup window: a calendar month, formatted `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Period containing `date`
    pub fn from_date(date: NaiveDate) -> Self {
        Self(format!("{:04}-{:02}", date.year(), date.month()))
    }

    /// Parse and validate a `YYYY-MM` key
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
            .map(Self::from_date)
            .ok()
            .filter(|key| key.0 == raw)
            .ok_or_else(|| format!("invalid period key '{}', expected YYYY-MM", raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.0
    }
}

/// Per-period alert firing history. The only durable state of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub period: PeriodKey,
    #[serde(default)]
    pub fired_levels: BTreeSet<u32>,
    #[serde(default)]
    pub adhoc_fired: bool,
}

impl AlertState {
    /// Fresh state for a period nothing has fired in yet
    pub fn empty(period: PeriodKey) -> Self {
        Self {
            period,
            fired_levels: BTreeSet::new(),
            adhoc_fired: false,
        }
    }

    pub fn has_fired(&self, level: u32) -> bool {
        self.fired_levels.contains(&level)
    }

    /// All configured levels have fired
    pub fn is_terminal(&self, levels: &[u32]) -> bool {
        levels.iter().all(|l| self.fired_levels.contains(l))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ThresholdCrossed,
    Anomaly,
    AdHocBudgetExceeded,
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ThresholdCrossed => "Budget threshold",
            Self::Anomaly => "Cost anomaly",
            Self::AdHocBudgetExceeded => "Budget exceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// What an anomaly flag was measured on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum AnomalyMetric {
    /// Total daily cost against the rolling average
    DailyTotal,
    /// One service, day over day
    Service { name: String },
}

impl AnomalyMetric {
    pub fn name(&self) -> &str {
        match self {
            Self::DailyTotal => "daily total",
            Self::Service { name } => name,
        }
    }
}

/// Deviation of an observed cost from its baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFlag {
    pub metric: AnomalyMetric,
    pub date: NaiveDate,
    pub observed: Decimal,
    pub baseline: Decimal,
    /// Percent above baseline
    pub deviation_pct: Decimal,
    pub threshold_pct: Decimal,
    pub severity: AlertSeverity,
}

/// Structured alert content. Rendering is left to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertPayload {
    Threshold {
        level: u32,
        #[serde(rename = "utilizationPct")]
        utilization_pct: Decimal,
        #[serde(rename = "monthToDate")]
        month_to_date: Decimal,
        budget: Decimal,
    },
    AdHocBudget {
        #[serde(rename = "monthToDate")]
        month_to_date: Decimal,
        budget: Decimal,
        #[serde(rename = "creditsApplied")]
        credits_applied: Decimal,
        #[serde(rename = "netAfterCredits")]
        net_after_credits: Decimal,
    },
    Anomaly(AnomalyFlag),
}

/// One alert emitted by a run. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub period: PeriodKey,
    pub payload: AlertPayload,
}

impl AlertEvent {
    /// Threshold level carried by a `ThresholdCrossed` event
    pub fn level(&self) -> Option<u32> {
        match &self.payload {
            AlertPayload::Threshold { level, .. } => Some(*level),
            _ => None,
        }
    }
}
