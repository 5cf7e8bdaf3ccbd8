use chrono::{Duration, NaiveDate};
use costwatch_types::{Metric, Unavailability, WeekOverWeek};

use super::ledger::DailyLedger;
use super::{calendar, percent_change, round_pct};

/// Compare Monday..run date against the same weekday span a week earlier.
///
/// On a Monday no day of the current week is complete, so the comparison is
/// reported as not computable rather than as zero spend.
pub(crate) fn week_over_week(ledger: &DailyLedger, as_of: NaiveDate) -> Metric<WeekOverWeek> {
    let monday = calendar::week_start(as_of);
    if monday == as_of {
        return Metric::not_computable(Unavailability::WeekNotStarted);
    }

    let span = as_of - monday;
    let prior_start = monday - Duration::days(7);
    let prior_end = prior_start + span;

    let current = ledger.gross_between(monday, as_of);
    let prior = ledger.gross_between(prior_start, prior_end);

    Metric::value(WeekOverWeek {
        current,
        prior,
        change_pct: Metric::from_option(
            percent_change(current, prior).map(round_pct),
            Unavailability::NoPriorWeekSpend,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_types::CostRecord;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn ledger() -> DailyLedger {
        // Week of 2026-03-02 (prior) and 2026-03-09 (current)
        DailyLedger::from_records(&[
            CostRecord::usage(date(2), "EC2", dec!(10)),
            CostRecord::usage(date(3), "EC2", dec!(10)),
            CostRecord::usage(date(4), "EC2", dec!(99)),
            CostRecord::usage(date(9), "EC2", dec!(15)),
            CostRecord::usage(date(10), "EC2", dec!(15)),
        ]).unwrap()
    }

    #[test]
    fn test_unavailable_on_monday() {
        let wow = week_over_week(&ledger(), date(9));
        assert_eq!(wow.reason(), Some(Unavailability::WeekNotStarted));
    }

    #[test]
    fn test_aligned_weekday_windows() {
        // Wednesday: current = Mon+Tue, prior = previous Mon+Tue (Wed 99 excluded)
        let wow = week_over_week(&ledger(), date(11)).into_option().unwrap();
        assert_eq!(wow.current, dec!(30));
        assert_eq!(wow.prior, dec!(20));
        assert_eq!(wow.change_pct, Metric::value(dec!(50)));
    }

    #[test]
    fn test_change_not_computable_without_prior_spend() {
        let ledger =
            DailyLedger::from_records(&[CostRecord::usage(date(9), "EC2", dec!(5))]).unwrap();
        let wow = week_over_week(&ledger, date(10)).into_option().unwrap();
        assert_eq!(wow.current, dec!(5));
        assert_eq!(wow.prior, dec!(0));
        assert_eq!(wow.change_pct.reason(), Some(Unavailability::NoPriorWeekSpend));
    }
}
