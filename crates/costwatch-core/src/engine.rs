//! Run orchestration: aggregate, detect, evaluate, persist
//!
//! One `CostEngine` call is one run. The only durable effect is the alert
//! state write, done as a versioned compare-and-set with bounded retries.
//! Losing the write never loses alerts: events are always returned, and the
//! state outcome tells the caller whether dedup was recorded.

use costwatch_types::{AlertEvent, AnomalyFlag, BudgetConfig, Metric, MetricsSnapshot, RawCostData};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alerts::{AlertEvaluator, EvaluationMode, Transition};
use crate::analytics::AnomalyDetector;
use crate::error::CoreError;
use crate::metrics::{aggregate, AggregationConfig};
use crate::state::{DedupStateStore, WriteOutcome};

/// Default compare-and-set attempts before giving up on recording state
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What happened to the alert state this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StateOutcome {
    /// Nothing new fired
    Unchanged,
    /// New firing history recorded
    Written { version: u64 },
    /// Events were emitted but not recorded; a later run may emit them again
    Degraded { reason: String },
}

impl StateOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StateOutcome::Degraded { .. })
    }
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub snapshot: MetricsSnapshot,
    pub anomalies: Vec<AnomalyFlag>,
    pub events: Vec<AlertEvent>,
    pub utilization_pct: Metric<Decimal>,
    pub state: StateOutcome,
}

impl Evaluation {
    pub fn has_alerts(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Cost aggregation and alert engine
pub struct CostEngine {
    store: Arc<dyn DedupStateStore>,
    budget: BudgetConfig,
    aggregation: AggregationConfig,
    max_attempts: u32,
}

impl CostEngine {
    pub fn new(
        store: Arc<dyn DedupStateStore>,
        budget: BudgetConfig,
        aggregation: AggregationConfig,
    ) -> Self {
        Self {
            store,
            budget,
            aggregation,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Compare-and-set attempts per run (at least 1)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Daily run: metrics, anomalies, threshold and ad-hoc alerts
    pub fn evaluate(&self, raw: &RawCostData) -> Result<Evaluation, CoreError> {
        self.run(raw, EvaluationMode::Full)
    }

    /// Periodic monitor run: ad-hoc budget check only
    pub fn monitor(&self, raw: &RawCostData) -> Result<Evaluation, CoreError> {
        self.run(raw, EvaluationMode::AdHocOnly)
    }

    fn run(&self, raw: &RawCostData, mode: EvaluationMode) -> Result<Evaluation, CoreError> {
        let snapshot = aggregate(raw, &self.aggregation)?;

        let anomalies = match mode {
            EvaluationMode::Full => AnomalyDetector::from_budget(&self.budget).detect(&snapshot),
            EvaluationMode::AdHocOnly => Vec::new(),
        };

        let evaluator = AlertEvaluator::new(self.budget.clone()).with_mode(mode);
        let (transition, state) = self.evaluate_and_record(&evaluator, &snapshot, &anomalies)?;

        for event in &transition.events {
            info!(
                kind = ?event.kind,
                severity = ?event.severity,
                period = %event.period,
                level = ?event.level(),
                "Alert emitted"
            );
        }

        Ok(Evaluation {
            snapshot,
            anomalies,
            events: transition.events,
            utilization_pct: transition.utilization_pct,
            state,
        })
    }

    /// Read, evaluate, compare-and-set. On conflict the fresh state is
    /// re-read so levels recorded by the other writer are not re-emitted.
    fn evaluate_and_record(
        &self,
        evaluator: &AlertEvaluator,
        snapshot: &MetricsSnapshot,
        anomalies: &[AnomalyFlag],
    ) -> Result<(Transition, StateOutcome), CoreError> {
        let period = &snapshot.period;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let current = self
                .store
                .read(period)
                .map_err(|source| CoreError::StateUnavailable {
                    period: period.clone(),
                    source,
                })?;

            let transition =
                evaluator.evaluate(snapshot, anomalies, current.as_ref().map(|v| &v.state));
            if !transition.changed {
                debug!(period = %period, "Alert state unchanged");
                return Ok((transition, StateOutcome::Unchanged));
            }

            let expected = current.as_ref().map(|v| v.version);
            match self.store.write(period, &transition.state, expected) {
                Ok(WriteOutcome::Written { version }) => {
                    info!(
                        period = %period,
                        version,
                        fired = ?transition.state.fired_levels,
                        adhoc_fired = transition.state.adhoc_fired,
                        "Alert state recorded"
                    );
                    return Ok((transition, StateOutcome::Written { version }));
                }
                Ok(WriteOutcome::Conflict) if attempt < self.max_attempts => {
                    debug!(
                        period = %period,
                        attempt,
                        "Alert state changed concurrently, re-evaluating"
                    );
                }
                Ok(WriteOutcome::Conflict) => {
                    warn!(
                        period = %period,
                        attempts = attempt,
                        "Alert state kept changing, events returned without recording"
                    );
                    let reason = format!("write conflict after {} attempts", attempt);
                    return Ok((transition, StateOutcome::Degraded { reason }));
                }
                Err(e) => {
                    warn!(period = %period, error = %e, "Failed to record alert state");
                    return Ok((transition, StateOutcome::Degraded { reason: e.to_string() }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::state::{MemoryStateStore, VersionedState};
    use chrono::NaiveDate;
    use costwatch_types::{AlertKind, AlertState, CostRecord, PeriodKey};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    /// 11 days at 10/day this month, as of Thursday 2026-03-12
    fn raw() -> RawCostData {
        let mut records = Vec::new();
        let mut day = date(2, 20);
        while day < date(3, 12) {
            records.push(CostRecord::usage(day, "Amazon EC2", dec!(10)));
            day += chrono::Duration::days(1);
        }
        RawCostData::new(date(3, 12), date(2, 20)).with_records(records)
    }

    fn engine(store: Arc<dyn DedupStateStore>) -> CostEngine {
        CostEngine::new(
            store,
            BudgetConfig::new(dec!(100), [50, 75, 90, 100], dec!(30)),
            AggregationConfig::default(),
        )
    }

    /// Reads fine, writes always fail
    struct ReadOnlyStore;

    impl DedupStateStore for ReadOnlyStore {
        fn read(&self, _: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
            Ok(None)
        }

        fn write(
            &self,
            _: &PeriodKey,
            _: &AlertState,
            _: Option<u64>,
        ) -> Result<WriteOutcome, StoreError> {
            Err(StoreError::Timeout {
                operation: "write",
                timeout_ms: 10,
            })
        }
    }

    /// Reads always fail
    struct DownStore;

    impl DedupStateStore for DownStore {
        fn read(&self, _: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
            Err(StoreError::Timeout {
                operation: "read",
                timeout_ms: 10,
            })
        }

        fn write(
            &self,
            _: &PeriodKey,
            _: &AlertState,
            _: Option<u64>,
        ) -> Result<WriteOutcome, StoreError> {
            unreachable!("write without a successful read")
        }
    }

    /// Another writer records level 50 between our read and our first write
    struct RacingStore {
        inner: MemoryStateStore,
        raced: Mutex<bool>,
        writes: AtomicU32,
    }

    impl DedupStateStore for RacingStore {
        fn read(&self, period: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
            self.inner.read(period)
        }

        fn write(
            &self,
            period: &PeriodKey,
            state: &AlertState,
            expected: Option<u64>,
        ) -> Result<WriteOutcome, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut raced = self.raced.lock();
            if !*raced {
                *raced = true;
                let mut theirs = AlertState::empty(period.clone());
                theirs.fired_levels.insert(50);
                self.inner.write(period, &theirs, None)?;
            }
            self.inner.write(period, state, expected)
        }
    }

    /// Every write conflicts
    struct ContendedStore {
        writes: AtomicU32,
    }

    impl DedupStateStore for ContendedStore {
        fn read(&self, _: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
            Ok(None)
        }

        fn write(
            &self,
            _: &PeriodKey,
            _: &AlertState,
            _: Option<u64>,
        ) -> Result<WriteOutcome, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(WriteOutcome::Conflict)
        }
    }

    #[test]
    fn test_evaluate_records_state_and_dedups() {
        let store = Arc::new(MemoryStateStore::new());
        let engine = engine(store.clone());

        // MTD 110 on a budget of 100
        let first = engine.evaluate(&raw()).unwrap();
        let levels: Vec<_> = first.events.iter().filter_map(AlertEvent::level).collect();
        assert_eq!(levels, vec![50, 75, 90, 100]);
        assert!(first.events.iter().any(|e| e.kind == AlertKind::AdHocBudgetExceeded));
        assert_eq!(first.state, StateOutcome::Written { version: 1 });

        let second = engine.evaluate(&raw()).unwrap();
        assert!(!second.has_alerts());
        assert_eq!(second.state, StateOutcome::Unchanged);
    }

    #[test]
    fn test_write_failure_degrades_but_returns_events() {
        let engine = engine(Arc::new(ReadOnlyStore));
        let evaluation = engine.evaluate(&raw()).unwrap();

        assert!(evaluation.has_alerts());
        assert!(evaluation.state.is_degraded());
    }

    #[test]
    fn test_read_failure_fails_the_run() {
        let engine = engine(Arc::new(DownStore));
        let err = engine.evaluate(&raw()).unwrap_err();
        assert!(matches!(err, CoreError::StateUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_conflict_re_evaluates_against_fresh_state() {
        let store = Arc::new(RacingStore {
            inner: MemoryStateStore::new(),
            raced: Mutex::new(false),
            writes: AtomicU32::new(0),
        });
        let engine = engine(store.clone());
        let evaluation = engine.evaluate(&raw()).unwrap();

        // Level 50 went out from the other writer
        let levels: Vec<_> = evaluation.events.iter().filter_map(AlertEvent::level).collect();
        assert_eq!(levels, vec![75, 90, 100]);
        assert_eq!(evaluation.state, StateOutcome::Written { version: 2 });
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retries_are_bounded() {
        let store = Arc::new(ContendedStore {
            writes: AtomicU32::new(0),
        });
        let engine = engine(store.clone());
        let evaluation = engine.evaluate(&raw()).unwrap();

        assert_eq!(store.writes.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
        assert!(evaluation.state.is_degraded());
        assert!(evaluation.has_alerts());
    }

    #[test]
    fn test_monitor_only_checks_adhoc() {
        let store = Arc::new(MemoryStateStore::new());
        let engine = engine(store.clone());

        let evaluation = engine.monitor(&raw()).unwrap();
        assert_eq!(evaluation.events.len(), 1);
        assert_eq!(evaluation.events[0].kind, AlertKind::AdHocBudgetExceeded);
        assert!(evaluation.anomalies.is_empty());

        // The daily run still fires thresholds, but not the ad-hoc alert again
        let daily = engine.evaluate(&raw()).unwrap();
        assert!(daily.events.iter().all(|e| e.kind == AlertKind::ThresholdCrossed));
        assert_eq!(daily.events.len(), 4);
    }

    #[test]
    fn test_incomplete_input_never_touches_state() {
        let engine = engine(Arc::new(DownStore));
        let mut raw = raw();
        raw.coverage_start = date(3, 5);
        raw.records.retain(|r| r.date >= date(3, 5));

        let err = engine.evaluate(&raw).unwrap_err();
        assert!(matches!(err, CoreError::IncompleteInput { .. }));
    }
}
