//! Anomaly detection for unusual cost spikes
//!
//! Two rules, both threshold-based on a percent above baseline:
//! - daily total: latest complete day vs the mean of the rest of the trend series
//! - per service: latest complete day vs the day before (day over day)
//!
//! Stateless: nothing here reads or updates alert state.

use costwatch_types::{
    AlertSeverity, AnomalyFlag, AnomalyMetric, BudgetConfig, Metric, MetricsSnapshot,
    ServiceDayOverDay, TrendPoint, Unavailability,
};
use rust_decimal::Decimal;

use crate::metrics::{percent_change, round_pct};

/// Flags costs exceeding `(1 + threshold_pct / 100) × baseline`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyDetector {
    threshold_pct: Decimal,
}

impl AnomalyDetector {
    pub fn new(threshold_pct: Decimal) -> Self {
        Self {
            threshold_pct: threshold_pct.max(Decimal::ZERO),
        }
    }

    pub fn from_budget(budget: &BudgetConfig) -> Self {
        Self::new(budget.anomaly_threshold_pct)
    }

    pub fn threshold_pct(&self) -> Decimal {
        self.threshold_pct
    }

    /// Run both rules against a snapshot
    ///
    /// # Returns
    /// Daily flag first (if any), then service flags by descending deviation
    pub fn detect(&self, snapshot: &MetricsSnapshot) -> Vec<AnomalyFlag> {
        let mut flags = Vec::new();

        if let Some(flag) = self.detect_daily(&snapshot.trend) {
            flags.push(flag);
        }

        let mut services = self.detect_services(&snapshot.service_day_over_day);
        services.sort_by(|a, b| {
            b.deviation_pct
                .cmp(&a.deviation_pct)
                .then_with(|| a.metric.name().cmp(b.metric.name()))
        });
        flags.extend(services);

        if !flags.is_empty() {
            tracing::debug!(count = flags.len(), "Cost anomalies detected");
        }

        flags
    }

    /// Rolling baseline: mean of the trend series excluding its last point
    pub fn daily_baseline(trend: &[TrendPoint]) -> Metric<Decimal> {
        let Some((_, history)) = trend.split_last() else {
            return Metric::not_computable(Unavailability::EmptySeries);
        };
        if history.is_empty() {
            return Metric::not_computable(Unavailability::EmptySeries);
        }

        let total: Decimal = history.iter().map(|p| p.amount).sum();
        Metric::value(total / Decimal::from(history.len()))
    }

    /// Latest trend point against the rolling baseline
    pub fn detect_daily(&self, trend: &[TrendPoint]) -> Option<AnomalyFlag> {
        let latest = trend.last()?;
        let baseline = Self::daily_baseline(trend).into_option()?;
        self.flag(AnomalyMetric::DailyTotal, latest.date, latest.amount, baseline)
    }

    /// Each service's latest day against its previous day
    pub fn detect_services(&self, day_over_day: &[ServiceDayOverDay]) -> Vec<AnomalyFlag> {
        day_over_day
            .iter()
            .filter_map(|entry| {
                self.flag(
                    AnomalyMetric::Service {
                        name: entry.service.clone(),
                    },
                    entry.date,
                    entry.latest,
                    entry.previous,
                )
            })
            .collect()
    }

    fn flag(
        &self,
        metric: AnomalyMetric,
        date: chrono::NaiveDate,
        observed: Decimal,
        baseline: Decimal,
    ) -> Option<AnomalyFlag> {
        // Zero or negative baseline: deviation is undefined, never flag
        let deviation = percent_change(observed, baseline)?;
        if deviation <= self.threshold_pct {
            return None;
        }

        let severity = if deviation >= self.threshold_pct.saturating_mul(Decimal::TWO) {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        Some(AnomalyFlag {
            metric,
            date,
            observed,
            baseline,
            deviation_pct: round_pct(deviation),
            threshold_pct: self.threshold_pct,
            severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    fn series(amounts: &[Decimal]) -> Vec<TrendPoint> {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| TrendPoint {
                date: start + Duration::days(i as i64),
                amount: *amount,
            })
            .collect()
    }

    fn dod(service: &str, latest: Decimal, previous: Decimal) -> ServiceDayOverDay {
        ServiceDayOverDay {
            service: service.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            latest,
            previous,
        }
    }

    #[test]
    fn test_spike_against_rolling_average() {
        // 13 days at 3, latest at 10: (10 - 3) / 3 = 233.33%
        let mut amounts = vec![dec!(3); 13];
        amounts.push(dec!(10));
        let detector = AnomalyDetector::new(dec!(30));

        let flag = detector.detect_daily(&series(&amounts)).unwrap();
        assert_eq!(flag.metric, AnomalyMetric::DailyTotal);
        assert_eq!(flag.observed, dec!(10));
        assert_eq!(flag.baseline, dec!(3));
        assert_eq!(flag.deviation_pct, dec!(233.33));
        assert_eq!(flag.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_no_flag_at_exact_threshold() {
        // Baseline 10, latest 13 = exactly +30%: not exceeding
        let detector = AnomalyDetector::new(dec!(30));
        assert!(detector
            .detect_daily(&series(&[dec!(10), dec!(10), dec!(13)]))
            .is_none());
        assert!(detector
            .detect_daily(&series(&[dec!(10), dec!(10), dec!(13.01)]))
            .is_some());
    }

    #[test]
    fn test_zero_baseline_never_flags() {
        let detector = AnomalyDetector::new(dec!(30));
        assert!(detector
            .detect_daily(&series(&[dec!(0), dec!(0), dec!(50)]))
            .is_none());
        assert!(detector.detect_services(&[dod("EC2", dec!(50), dec!(0))]).is_empty());
    }

    #[test]
    fn test_empty_and_single_point_series() {
        let detector = AnomalyDetector::new(dec!(30));
        assert!(detector.detect_daily(&[]).is_none());
        assert!(detector.detect_daily(&series(&[dec!(100)])).is_none());
        assert_eq!(
            AnomalyDetector::daily_baseline(&series(&[dec!(100)])).reason(),
            Some(Unavailability::EmptySeries)
        );
    }

    #[test]
    fn test_service_day_over_day() {
        let detector = AnomalyDetector::new(dec!(50));
        let flags = detector.detect_services(&[
            dod("Amazon EC2", dec!(16), dec!(10)),
            dod("Amazon S3", dec!(15), dec!(10)),
            dod("AWS Lambda", dec!(2), dec!(4)),
        ]);

        assert_eq!(flags.len(), 1);
        assert_eq!(
            flags[0].metric,
            AnomalyMetric::Service {
                name: "Amazon EC2".to_string()
            }
        );
        assert_eq!(flags[0].deviation_pct, dec!(60));
        assert_eq!(flags[0].severity, AlertSeverity::Warning);
    }
}
