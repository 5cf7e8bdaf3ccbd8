//! Derived cost metrics
//!
//! Turns one complete [`RawCostData`] snapshot into a [`MetricsSnapshot`]:
//! month-to-date gross, credits, net, forecast, week-over-week, burn rate,
//! trend series and top services. Pure: no I/O, no clock reads. The run date
//! comes from the input.

use chrono::Duration;
use costwatch_types::{
    CreditForecastPolicy, Metric, MetricsSnapshot, PeriodKey, RawCostData, Unavailability,
};
use rust_decimal::{Decimal, RoundingStrategy};

pub mod calendar;
mod breakdown;
mod credits;
mod ledger;
mod validate;
mod week;


use breakdown::top_services;
use credits::{burn_rate, credit_estimate, forecast_after_credits};
use ledger::DailyLedger;
use week::week_over_week;

/// Knobs for the aggregation windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Number of services kept in the breakdown
    pub top_services: usize,
    /// Length of the daily trend series
    pub trend_days: u32,
    /// Trailing window for the credit burn rate
    pub burn_window_days: u32,
    pub credit_forecast: CreditForecastPolicy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_services: 10,
            trend_days: 7,
            burn_window_days: 14,
            credit_forecast: CreditForecastPolicy::PassThrough,
        }
    }
}

/// Compute every derived metric for one run
///
/// # Errors
/// `CoreError::IncompleteInput` when the input does not cover the windows
/// this run reads, or contains malformed records. Nothing is zero-filled for
/// days outside the declared coverage.
pub fn aggregate(
    raw: &RawCostData,
    config: &AggregationConfig,
) -> Result<MetricsSnapshot, crate::CoreError> {
    validate::validate(raw, config)?;

    let as_of = raw.as_of;
    let month_start = calendar::month_start(as_of);
    let ledger = DailyLedger::from_records(&raw.records)?;

    let month_to_date = ledger.gross_between(month_start, as_of);
    let credits_applied = ledger.credits_between(month_start, as_of).abs();
    let net_after_credits = month_to_date - credits_applied;
    let previous_day = ledger.gross_on(as_of - Duration::days(1));

    let forecast_month_end = match raw.forecast_remaining {
        Some(remaining) => Metric::value(forecast_total(month_to_date, remaining)?),
        None => Metric::not_computable(Unavailability::ForecastMissing),
    };
    let forecast_after_credits =
        forecast_after_credits(forecast_month_end, credits_applied, as_of, config.credit_forecast);

    let burn = burn_rate(&ledger, as_of, config.burn_window_days);
    let estimate = credit_estimate(credits_applied, &burn, as_of);

    let trend_start = as_of - Duration::days(config.trend_days as i64);
    let trend = ledger.series(trend_start, as_of);

    let (top, day_over_day) =
        top_services(&ledger, month_start, as_of, month_to_date, config.top_services);

    tracing::debug!(
        as_of = %as_of,
        mtd = %month_to_date,
        credits = %credits_applied,
        forecast_available = forecast_month_end.is_available(),
        services = top.len(),
        "Metrics aggregated"
    );

    Ok(MetricsSnapshot {
        as_of,
        period: PeriodKey::from_date(as_of),
        currency: raw.currency.clone(),
        month_to_date,
        previous_day,
        credits_applied,
        net_after_credits,
        forecast_month_end,
        forecast_after_credits,
        week_over_week: week_over_week(&ledger, as_of),
        burn_rate: burn,
        credit_estimate: estimate,
        trend,
        top_services: top,
        service_day_over_day: day_over_day,
    })
}

/// Month-to-date plus the upstream remaining-month forecast
fn forecast_total(month_to_date: Decimal, remaining: Decimal) -> Result<Decimal, crate::CoreError> {
    Some(remaining)
        .filter(|r| r.abs() <= ledger::MAX_TOTAL_MAGNITUDE)
        .and_then(|r| month_to_date.checked_add(r))
        .ok_or_else(|| {
            crate::CoreError::incomplete(
                "forecastRemaining",
                format!("{} is out of range for a cost forecast", remaining),
            )
        })
}

/// Round a display percentage to two decimals, half away from zero
pub(crate) fn round_pct(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / whole × 100`, or `None` when `whole` is not positive
pub(crate) fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return None;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

/// Percent change from `baseline` to `observed`, `None` when the baseline is not positive
pub(crate) fn percent_change(observed: Decimal, baseline: Decimal) -> Option<Decimal> {
    percent_of(observed - baseline, baseline)
}
