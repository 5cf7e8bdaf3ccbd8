//! Input checks run before any figure is derived

use chrono::{Duration, NaiveDate};
use costwatch_types::RawCostData;

use super::{calendar, AggregationConfig};
use crate::error::CoreError;

/// Earliest date any metric window of this run reads from
///
/// # Errors
/// `InvalidConfig` when a window reaches past the representable date range.
pub(crate) fn required_coverage_start(
    as_of: NaiveDate,
    config: &AggregationConfig,
) -> Result<NaiveDate, CoreError> {
    let mut earliest = calendar::month_start(as_of);

    // Trend needs one extra day so the service day-over-day baseline exists
    earliest = earliest.min(days_before(as_of, config.trend_days.max(2), "trend")?);
    earliest = earliest.min(days_before(as_of, config.burn_window_days, "burn window")?);

    let monday = calendar::week_start(as_of);
    if monday < as_of {
        earliest = earliest.min(days_before(monday, 7, "prior week")?);
    }

    Ok(earliest)
}

fn days_before(date: NaiveDate, days: u32, window: &str) -> Result<NaiveDate, CoreError> {
    date.checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| CoreError::InvalidConfig {
            message: format!("{} of {} days before {} is out of date range", window, days, date),
        })
}

/// Reject data that would make a figure silently wrong
pub(crate) fn validate(raw: &RawCostData, config: &AggregationConfig) -> Result<(), CoreError> {
    if raw.currency.trim().is_empty() {
        return Err(CoreError::incomplete("currency", "currency unit is empty"));
    }

    if raw.coverage_start > raw.as_of {
        return Err(CoreError::incomplete(
            "coverageStart",
            format!("{} is after the run date {}", raw.coverage_start, raw.as_of),
        ));
    }

    let required = required_coverage_start(raw.as_of, config)?;
    if raw.coverage_start > required {
        return Err(CoreError::incomplete(
            "coverageStart",
            format!(
                "data starts at {} but the run needs data from {}",
                raw.coverage_start, required
            ),
        ));
    }

    for (idx, record) in raw.records.iter().enumerate() {
        if record.date >= raw.as_of {
            return Err(CoreError::incomplete(
                format!("records[{}].date", idx),
                format!("{} is not before the run date {}", record.date, raw.as_of),
            ));
        }
        if record.date < raw.coverage_start {
            return Err(CoreError::incomplete(
                format!("records[{}].date", idx),
                format!("{} is before coverage start {}", record.date, raw.coverage_start),
            ));
        }
        if let Some(end) = record.end {
            if end <= record.date {
                return Err(CoreError::incomplete(
                    format!("records[{}].end", idx),
                    format!("range end {} is not after start {}", end, record.date),
                ));
            }
        }
        if let Some(service) = &record.service {
            if service.trim().is_empty() {
                return Err(CoreError::incomplete(
                    format!("records[{}].service", idx),
                    "service name is empty",
                ));
            }
        }
    }

    Ok(())
}
