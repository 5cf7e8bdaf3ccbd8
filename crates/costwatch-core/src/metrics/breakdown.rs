use chrono::{Duration, NaiveDate};
use costwatch_types::{Metric, ServiceBreakdownEntry, ServiceDayOverDay, Unavailability};
use rust_decimal::Decimal;

use super::ledger::DailyLedger;
use super::{percent_of, round_pct};

/// Top `limit` services by month-to-date gross spend.
///
/// Sorted by descending amount, ties broken by ascending name so the order is
/// stable across runs. Services past `limit` are dropped, not folded into an
/// "Other" row. Also returns the last two complete days of each kept service
/// for day-over-day spike detection.
pub(crate) fn top_services(
    ledger: &DailyLedger,
    month_start: NaiveDate,
    as_of: NaiveDate,
    month_to_date: Decimal,
    limit: usize,
) -> (Vec<ServiceBreakdownEntry>, Vec<ServiceDayOverDay>) {
    let mut totals = ledger.service_totals(month_start, as_of);
    totals.sort_by(|(name_a, amount_a), (name_b, amount_b)| {
        amount_b.cmp(amount_a).then_with(|| name_a.cmp(name_b))
    });
    totals.truncate(limit);

    let latest = as_of - Duration::days(1);
    let previous = as_of - Duration::days(2);

    let day_over_day = totals
        .iter()
        .map(|(name, _)| ServiceDayOverDay {
            service: name.clone(),
            date: latest,
            latest: ledger.service_on(name, latest),
            previous: ledger.service_on(name, previous),
        })
        .collect();

    let entries = totals
        .into_iter()
        .map(|(service, amount)| ServiceBreakdownEntry {
            share_pct: Metric::from_option(
                percent_of(amount, month_to_date).map(round_pct),
                Unavailability::ZeroBaseline,
            ),
            service,
            amount,
        })
        .collect();

    (entries, day_over_day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_types::CostRecord;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_ties_broken_by_name() {
        let ledger = DailyLedger::from_records(&[
            CostRecord::usage(date(2), "Amazon S3", dec!(20)),
            CostRecord::usage(date(2), "AWS Lambda", dec!(20)),
            CostRecord::usage(date(2), "Amazon EC2", dec!(50)),
        ]).unwrap();
        let (top, _) = top_services(&ledger, date(1), date(5), dec!(90), 10);

        let names: Vec<_> = top.iter().map(|e| e.service.as_str()).collect();
        assert_eq!(names, vec!["Amazon EC2", "AWS Lambda", "Amazon S3"]);
    }

    #[test]
    fn test_truncates_without_other_bucket() {
        let ledger = DailyLedger::from_records(&[
            CostRecord::usage(date(2), "A", dec!(30)),
            CostRecord::usage(date(2), "B", dec!(20)),
            CostRecord::usage(date(2), "C", dec!(10)),
        ]).unwrap();
        let (top, day_over_day) = top_services(&ledger, date(1), date(5), dec!(60), 2);

        assert_eq!(top.len(), 2);
        assert_eq!(day_over_day.len(), 2);
        assert!(top.iter().all(|e| e.service != "Other"));
        assert_eq!(top[0].share_pct, Metric::value(dec!(50)));
    }

    #[test]
    fn test_share_not_computable_without_spend() {
        let ledger = DailyLedger::from_records(&[
            CostRecord::usage(date(2), "A", dec!(5)),
            CostRecord::usage(date(3), "A", dec!(-5)),
            CostRecord::usage(date(3), "B", dec!(-1)),
        ]).unwrap();
        let (top, _) = top_services(&ledger, date(1), date(5), dec!(-1), 10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].share_pct.reason(), Some(Unavailability::ZeroBaseline));
    }

    #[test]
    fn test_day_over_day_uses_last_two_complete_days() {
        let ledger = DailyLedger::from_records(&[
            CostRecord::usage(date(3), "A", dec!(4)),
            CostRecord::usage(date(4), "A", dec!(9)),
        ]).unwrap();
        let (_, day_over_day) = top_services(&ledger, date(1), date(5), dec!(13), 10);
        assert_eq!(day_over_day[0].date, date(4));
        assert_eq!(day_over_day[0].latest, dec!(9));
        assert_eq!(day_over_day[0].previous, dec!(4));
    }
}
