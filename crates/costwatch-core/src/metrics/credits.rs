//! Credit-adjusted forecast, burn rate and credit usage projection

use chrono::{Duration, NaiveDate};
use costwatch_types::{BurnRate, CreditEstimate, CreditForecastPolicy, Metric, Unavailability};
use rust_decimal::Decimal;

use super::calendar;
use super::ledger::DailyLedger;

/// Forecast month-end minus credits, following `policy`.
///
/// `LinearExtrapolation` scales credits applied so far to the whole month at
/// the observed daily rate. With no complete day this month there is nothing
/// to extrapolate from and credits pass through unchanged.
pub(crate) fn forecast_after_credits(
    forecast_month_end: Metric<Decimal>,
    credits_applied: Decimal,
    as_of: NaiveDate,
    policy: CreditForecastPolicy,
) -> Metric<Decimal> {
    forecast_month_end.map(|month_end| {
        let projected_credits = match policy {
            CreditForecastPolicy::PassThrough => credits_applied,
            CreditForecastPolicy::LinearExtrapolation => {
                extrapolate_credits(credits_applied, as_of).unwrap_or(credits_applied)
            }
        };
        month_end - projected_credits
    })
}

fn extrapolate_credits(credits_applied: Decimal, as_of: NaiveDate) -> Option<Decimal> {
    let elapsed = calendar::days_elapsed(as_of);
    if elapsed == 0 {
        return None;
    }
    let daily = credits_applied.checked_div(Decimal::from(elapsed))?;
    daily.checked_mul(Decimal::from(calendar::days_in_month(as_of)))
}

/// Mean daily credit consumption over `[as_of - window, as_of)`, zero-filled
pub(crate) fn burn_rate(
    ledger: &DailyLedger,
    as_of: NaiveDate,
    window_days: u32,
) -> Metric<BurnRate> {
    if window_days == 0 {
        return Metric::not_computable(Unavailability::NoBurnWindow);
    }

    let start = as_of - Duration::days(window_days as i64);
    let total: Decimal = calendar::days(start, as_of)
        .map(|day| ledger.credit_burn_on(day))
        .sum();

    let daily_average = total / Decimal::from(window_days);
    let projected_monthly = daily_average * Decimal::from(calendar::days_in_month(as_of));

    Metric::value(BurnRate {
        window_days,
        daily_average,
        projected_monthly,
    })
}

/// Credit usage projection, only meaningful once credits are being consumed
pub(crate) fn credit_estimate(
    credits_applied: Decimal,
    burn: &Metric<BurnRate>,
    as_of: NaiveDate,
) -> Option<CreditEstimate> {
    let burn = burn.as_option()?;
    if credits_applied <= Decimal::ZERO || burn.daily_average <= Decimal::ZERO {
        return None;
    }

    let days_in_month = calendar::days_in_month(as_of);
    let days_elapsed = calendar::days_elapsed(as_of).max(1);

    Some(CreditEstimate {
        credits_used: credits_applied,
        daily_burn: burn.daily_average,
        projected_monthly: burn.projected_monthly,
        days_elapsed,
        days_remaining: days_in_month.saturating_sub(days_elapsed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_types::{CostRecord, RecordType};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[test]
    fn test_pass_through_subtracts_credits_so_far() {
        let result = forecast_after_credits(
            Metric::value(dec!(300)),
            dec!(40),
            date(4, 11),
            CreditForecastPolicy::PassThrough,
        );
        assert_eq!(result, Metric::value(dec!(260)));
    }

    #[test]
    fn test_linear_extrapolation_scales_to_month() {
        // April: 30 days, 10 complete days elapsed on the 11th, 40 credits so far
        let result = forecast_after_credits(
            Metric::value(dec!(300)),
            dec!(40),
            date(4, 11),
            CreditForecastPolicy::LinearExtrapolation,
        );
        assert_eq!(result, Metric::value(dec!(180)));
    }

    #[test]
    fn test_linear_extrapolation_falls_back_on_first_day() {
        let result = forecast_after_credits(
            Metric::value(dec!(300)),
            dec!(0),
            date(4, 1),
            CreditForecastPolicy::LinearExtrapolation,
        );
        assert_eq!(result, Metric::value(dec!(300)));
    }

    #[test]
    fn test_missing_forecast_stays_missing() {
        let result = forecast_after_credits(
            Metric::not_computable(Unavailability::ForecastMissing),
            dec!(40),
            date(4, 11),
            CreditForecastPolicy::LinearExtrapolation,
        );
        assert_eq!(result.reason(), Some(Unavailability::ForecastMissing));
    }

    #[test]
    fn test_burn_rate_zero_fills_window() {
        // Two credit days of -7 each within a 14-day window
        let records = vec![
            CostRecord::new(date(4, 5), RecordType::Credit, dec!(-7)),
            CostRecord::new(date(4, 9), RecordType::Edp, dec!(-7)),
        ];
        let ledger = DailyLedger::from_records(&records).unwrap();
        let burn = burn_rate(&ledger, date(4, 11), 14).into_option().unwrap();

        assert_eq!(burn.daily_average, dec!(1));
        assert_eq!(burn.projected_monthly, dec!(30));
    }

    #[test]
    fn test_burn_rate_without_window() {
        let ledger = DailyLedger::default();
        assert_eq!(
            burn_rate(&ledger, date(4, 11), 0).reason(),
            Some(Unavailability::NoBurnWindow)
        );
    }

    #[test]
    fn test_credit_estimate_requires_consumption() {
        let ledger = DailyLedger::default();
        let burn = burn_rate(&ledger, date(4, 11), 14);
        assert!(credit_estimate(dec!(10), &burn, date(4, 11)).is_none());

        let burn = Metric::value(BurnRate {
            window_days: 14,
            daily_average: dec!(2),
            projected_monthly: dec!(60),
        });
        let estimate = credit_estimate(dec!(20), &burn, date(4, 11)).unwrap();
        assert_eq!(estimate.days_elapsed, 10);
        assert_eq!(estimate.days_remaining, 20);
    }
}
