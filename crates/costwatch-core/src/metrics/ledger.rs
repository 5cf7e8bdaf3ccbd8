//! Day-bucketed view over raw cost records

use chrono::NaiveDate;
use costwatch_types::{CostRecord, TrendPoint};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use super::calendar;
use crate::error::CoreError;

/// Upper bound (10^24) on the summed magnitude of all amounts in one run.
///
/// Range sums never exceed it, and month projections (×31) and percentages
/// (×100) of it stay inside `Decimal` range.
pub(crate) const MAX_TOTAL_MAGNITUDE: Decimal =
    Decimal::from_parts(0xa100_0000, 0x1bce_cced, 0xd3c2, false, 0);

/// Daily gross and credit amounts, plus per-service gross amounts.
///
/// Refunds are not bucketed anywhere: they are excluded from gross spend and
/// from credits.
#[derive(Debug, Default)]
pub(crate) struct DailyLedger {
    gross: BTreeMap<NaiveDate, Decimal>,
    credits: BTreeMap<NaiveDate, Decimal>,
    services: HashMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl DailyLedger {
    /// Bucket `records` by day
    ///
    /// # Errors
    /// `IncompleteInput` naming the first record that pushes the summed
    /// magnitude past [`MAX_TOTAL_MAGNITUDE`].
    pub(crate) fn from_records(records: &[CostRecord]) -> Result<Self, CoreError> {
        let mut ledger = Self::default();
        let mut magnitude = Decimal::ZERO;

        for (idx, record) in records.iter().enumerate() {
            magnitude = magnitude
                .checked_add(record.amount.abs())
                .filter(|total| *total <= MAX_TOTAL_MAGNITUDE)
                .ok_or_else(|| {
                    CoreError::incomplete(
                        format!("records[{}].amount", idx),
                        format!("{} is out of range for a cost export", record.amount),
                    )
                })?;

            let day = record.bucket_date();
            if record.record_type.is_gross() {
                accumulate(ledger.gross.entry(day).or_default(), record.amount);
                if let Some(service) = &record.service {
                    let days = ledger.services.entry(service.clone()).or_default();
                    accumulate(days.entry(day).or_default(), record.amount);
                }
            } else if record.record_type.is_credit() {
                accumulate(ledger.credits.entry(day).or_default(), record.amount);
            }
        }

        Ok(ledger)
    }

    /// Gross spend over `[start, end)`
    pub(crate) fn gross_between(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        sum_range(&self.gross, start, end)
    }

    /// Signed credit amounts over `[start, end)`
    pub(crate) fn credits_between(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        sum_range(&self.credits, start, end)
    }

    pub(crate) fn gross_on(&self, day: NaiveDate) -> Decimal {
        self.gross.get(&day).copied().unwrap_or_default()
    }

    /// Credit magnitude consumed on one day
    pub(crate) fn credit_burn_on(&self, day: NaiveDate) -> Decimal {
        self.credits.get(&day).copied().unwrap_or_default().abs()
    }

    pub(crate) fn service_on(&self, service: &str, day: NaiveDate) -> Decimal {
        self.services
            .get(service)
            .and_then(|days| days.get(&day))
            .copied()
            .unwrap_or_default()
    }

    /// Gross spend per service over `[start, end)`
    pub(crate) fn service_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<(String, Decimal)> {
        self.services
            .iter()
            .map(|(name, days)| (name.clone(), sum_range(days, start, end)))
            .filter(|(_, amount)| !amount.is_zero())
            .collect()
    }

    /// Zero-filled daily gross series over `[start, end)`
    pub(crate) fn series(&self, start: NaiveDate, end: NaiveDate) -> Vec<TrendPoint> {
        calendar::days(start, end)
            .map(|date| TrendPoint {
                date,
                amount: self.gross_on(date),
            })
            .collect()
    }
}

// Bounded by the magnitude check in `from_records`
fn accumulate(slot: &mut Decimal, amount: Decimal) {
    *slot = slot.saturating_add(amount);
}

fn sum_range(map: &BTreeMap<NaiveDate, Decimal>, start: NaiveDate, end: NaiveDate) -> Decimal {
    if start >= end {
        return Decimal::ZERO;
    }
    map.range(start..end)
        .fold(Decimal::ZERO, |total, (_, amount)| total.saturating_add(*amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_types::RecordType;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_refunds_are_not_bucketed() {
        let records = vec![
            CostRecord::usage(date(2), "Amazon S3", dec!(10)),
            CostRecord::new(date(2), RecordType::Refund, dec!(-4)),
            CostRecord::new(date(2), RecordType::Credit, dec!(-3)),
        ];
        let ledger = DailyLedger::from_records(&records).unwrap();

        assert_eq!(ledger.gross_on(date(2)), dec!(10));
        assert_eq!(ledger.credits_between(date(1), date(3)), dec!(-3));
        assert_eq!(ledger.credit_burn_on(date(2)), dec!(3));
    }

    #[test]
    fn test_series_is_zero_filled() {
        let records = vec![
            CostRecord::usage(date(2), "Amazon S3", dec!(1.5)),
            CostRecord::usage(date(4), "Amazon S3", dec!(2.5)),
        ];
        let ledger = DailyLedger::from_records(&records).unwrap();
        let series = ledger.series(date(1), date(5));

        let amounts: Vec<_> = series.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![dec!(0), dec!(1.5), dec!(0), dec!(2.5)]);
        assert_eq!(series[0].date, date(1));
    }

    #[test]
    fn test_empty_range_sums_to_zero() {
        let ledger =
            DailyLedger::from_records(&[CostRecord::usage(date(2), "EC2", dec!(1))]).unwrap();
        assert_eq!(ledger.gross_between(date(3), date(3)), Decimal::ZERO);
        assert_eq!(ledger.gross_between(date(4), date(1)), Decimal::ZERO);
    }

    #[test]
    fn test_out_of_range_amount_is_rejected() {
        let records = vec![
            CostRecord::usage(date(2), "EC2", Decimal::MAX),
            CostRecord::usage(date(2), "EC2", Decimal::MAX),
        ];
        let err = DailyLedger::from_records(&records).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IncompleteInput { ref field, .. } if field == "records[0].amount"
        ));
    }

    #[test]
    fn test_magnitude_limit_counts_credits() {
        let half = MAX_TOTAL_MAGNITUDE / Decimal::TWO;
        let records = vec![
            CostRecord::usage(date(2), "EC2", half),
            CostRecord::new(date(2), RecordType::Credit, -half),
            CostRecord::usage(date(3), "EC2", dec!(1)),
        ];
        let err = DailyLedger::from_records(&records).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IncompleteInput { ref field, .. } if field == "records[2].amount"
        ));
    }
}
