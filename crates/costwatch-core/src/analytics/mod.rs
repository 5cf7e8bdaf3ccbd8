//! Cost analytics on top of an aggregated snapshot
//!
//! Currently anomaly detection only. Alert dedup lives in [`crate::alerts`].

pub mod anomalies;

pub use anomalies::AnomalyDetector;
