//! Data models shared between the engine and its consumers

pub mod alert;
pub mod budget;
pub mod cost_record;
pub mod metric;
pub mod snapshot;

pub use alert::{
    AlertEvent, AlertKind, AlertPayload, AlertSeverity, AlertState, AnomalyFlag, AnomalyMetric,
    PeriodKey,
};
pub use budget::{BudgetConfig, CreditForecastPolicy};
pub use cost_record::{CostRecord, RawCostData, RecordType};
pub use metric::{Metric, Unavailability};
pub use snapshot::{
    BurnRate, CreditEstimate, MetricsSnapshot, ServiceBreakdownEntry, ServiceDayOverDay,
    TrendPoint, WeekOverWeek,
};
