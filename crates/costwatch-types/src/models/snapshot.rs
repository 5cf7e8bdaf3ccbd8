use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::alert::PeriodKey;
use super::metric::Metric;

/// One day of the trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Month-to-date cost of a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBreakdownEntry {
    pub service: String,
    pub amount: Decimal,
    /// Share of gross MTD, in percent
    pub share_pct: Metric<Decimal>,
}

/// Same-weekday comparison of this week against last week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverWeek {
    /// Monday up to (excluding) the run date
    pub current: Decimal,
    /// Same weekday span one week earlier
    pub prior: Decimal,
    pub change_pct: Metric<Decimal>,
}

/// Average daily credit consumption over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRate {
    pub window_days: u32,
    pub daily_average: Decimal,
    /// `daily_average` × days in the current month
    pub projected_monthly: Decimal,
}

/// Credit usage projection for the current billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditEstimate {
    pub credits_used: Decimal,
    pub daily_burn: Decimal,
    pub projected_monthly: Decimal,
    pub days_elapsed: u32,
    pub days_remaining: u32,
}

/// All derived metrics for one run. Rebuilt from scratch on every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub as_of: NaiveDate,
    pub period: PeriodKey,
    pub currency: String,

    /// Gross spend (Usage + Other) for the month so far
    pub month_to_date: Decimal,
    /// Gross spend of the last complete day
    pub previous_day: Decimal,
    /// Credit + EDP offsets applied this month, as a positive value
    pub credits_applied: Decimal,
    /// `month_to_date - credits_applied`, may be negative
    pub net_after_credits: Decimal,

    pub forecast_month_end: Metric<Decimal>,
    pub forecast_after_credits: Metric<Decimal>,

    pub week_over_week: Metric<WeekOverWeek>,
    pub burn_rate: Metric<BurnRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_estimate: Option<CreditEstimate>,

    /// Chronological, zero-filled daily gross spend
    pub trend: Vec<TrendPoint>,
    pub top_services: Vec<ServiceBreakdownEntry>,

    /// Per-service gross spend for the last two complete days, used for
    /// day-over-day spike detection. Aligned with `top_services`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_day_over_day: Vec<ServiceDayOverDay>,
}

/// Latest-day vs previous-day amount of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDayOverDay {
    pub service: String,
    pub date: NaiveDate,
    pub latest: Decimal,
    pub previous: Decimal,
}
