//! Alert state transition
//!
//! Given a snapshot, the anomaly flags of the same run and the firing history
//! of the current period, decide which alerts to emit and what the history
//! becomes. No I/O: persisting the new state is the engine's job.
//!
//! State per period is `{levels fired} × {ad-hoc fired}`. Both only grow within
//! a period and start empty when a new period key is first seen.

use costwatch_types::{
    AlertEvent, AlertKind, AlertPayload, AlertSeverity, AlertState, AnomalyFlag, BudgetConfig,
    Metric, MetricsSnapshot, Unavailability,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::{percent_of, round_pct};

/// Which alert paths a run evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Threshold levels, ad-hoc budget check and anomalies
    #[default]
    Full,
    /// Ad-hoc budget check only (periodic monitor)
    AdHocOnly,
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Thresholds ascending, then ad-hoc, then anomalies in detector order
    pub events: Vec<AlertEvent>,
    /// State after this run
    pub state: AlertState,
    /// `state` differs from what was read and must be written back
    pub changed: bool,
    pub utilization_pct: Metric<Decimal>,
}

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    budget: BudgetConfig,
    mode: EvaluationMode,
}

impl AlertEvaluator {
    pub fn new(budget: BudgetConfig) -> Self {
        Self {
            budget,
            mode: EvaluationMode::Full,
        }
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Gross month-to-date as a percentage of the budget, unrounded
    pub fn utilization(&self, month_to_date: Decimal) -> Metric<Decimal> {
        Metric::from_option(
            percent_of(month_to_date, self.budget.amount),
            Unavailability::ZeroBudget,
        )
    }

    /// Compute events and the next state.
    ///
    /// `current` is whatever the store returned for the snapshot's period. A
    /// missing state, or one recorded for another period, counts as empty.
    pub fn evaluate(
        &self,
        snapshot: &MetricsSnapshot,
        anomalies: &[AnomalyFlag],
        current: Option<&AlertState>,
    ) -> Transition {
        let period = &snapshot.period;
        let before = match current {
            Some(state) if &state.period == period => state.clone(),
            Some(state) => {
                tracing::debug!(
                    stored = %state.period,
                    current = %period,
                    "Alert state belongs to another period, starting fresh"
                );
                AlertState::empty(period.clone())
            }
            None => AlertState::empty(period.clone()),
        };

        let mut state = before.clone();
        let mut events = Vec::new();
        let utilization_pct = self.utilization(snapshot.month_to_date);

        // Budget of zero or less: no threshold and no ad-hoc alerts
        if let Some(utilization) = utilization_pct.as_option().copied() {
            if self.mode == EvaluationMode::Full {
                for level in self.budget.sorted_levels() {
                    if utilization >= Decimal::from(level) && state.fired_levels.insert(level) {
                        events.push(AlertEvent {
                            kind: AlertKind::ThresholdCrossed,
                            severity: if level >= 100 {
                                AlertSeverity::Critical
                            } else {
                                AlertSeverity::Warning
                            },
                            period: period.clone(),
                            payload: AlertPayload::Threshold {
                                level,
                                utilization_pct: round_pct(utilization),
                                month_to_date: snapshot.month_to_date,
                                budget: self.budget.amount,
                            },
                        });
                    }
                }
            }

            if snapshot.month_to_date > self.budget.amount && !state.adhoc_fired {
                state.adhoc_fired = true;
                events.push(AlertEvent {
                    kind: AlertKind::AdHocBudgetExceeded,
                    severity: AlertSeverity::Critical,
                    period: period.clone(),
                    payload: AlertPayload::AdHocBudget {
                        month_to_date: snapshot.month_to_date,
                        budget: self.budget.amount,
                        credits_applied: snapshot.credits_applied,
                        net_after_credits: snapshot.net_after_credits,
                    },
                });
            }
        }

        if self.mode == EvaluationMode::Full {
            events.extend(anomalies.iter().map(|flag| AlertEvent {
                kind: AlertKind::Anomaly,
                severity: flag.severity,
                period: period.clone(),
                payload: AlertPayload::Anomaly(flag.clone()),
            }));
        }

        let changed = state != before || current.is_some_and(|c| c.period != *period);

        Transition {
            events,
            state,
            changed,
            utilization_pct,
        }
    }
}
