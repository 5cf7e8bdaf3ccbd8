//! costwatch-types - Shared data types for costwatch
//!
//! This crate contains pure data structures without heavy dependencies.
//! No tokio, no storage - just serde-serializable types.
//!
//! Used by:
//! - costwatch-core (aggregation, alert evaluation, state stores)
//! - costwatch (CLI)
//! - downstream report renderers consuming the engine output

pub mod models;

pub use models::{
    AlertEvent, AlertKind, AlertPayload, AlertSeverity, AlertState, AnomalyFlag, AnomalyMetric,
    BudgetConfig, BurnRate, CostRecord, CreditEstimate, CreditForecastPolicy, Metric,
    MetricsSnapshot, PeriodKey, RawCostData, RecordType, ServiceBreakdownEntry,
    ServiceDayOverDay, TrendPoint, Unavailability, WeekOverWeek,
};
