//! costwatch-core - Cost aggregation and alert engine
//!
//! Provides metrics aggregation, anomaly detection, deduplicated budget
//! alerts, alert state stores, configuration and report archival.

pub mod alerts;
pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod format;
pub mod metrics;
pub mod state;

pub use alerts::{AlertEvaluator, EvaluationMode, Transition};
pub use analytics::AnomalyDetector;
pub use config::Settings;
pub use engine::{CostEngine, Evaluation, StateOutcome};
pub use error::{CoreError, StoreError};
pub use export::write_report_json;
pub use metrics::{aggregate, AggregationConfig};
pub use state::{DedupStateStore, MemoryStateStore, SqliteStateStore, VersionedState, WriteOutcome};
