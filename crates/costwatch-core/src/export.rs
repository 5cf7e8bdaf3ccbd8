//! Report archival
//!
//! One JSON artifact per run date under `<dir>/reports/`. The layout carries a
//! schema version so downstream readers can tell formats apart.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use costwatch_types::{AlertEvent, AnomalyFlag, Metric, MetricsSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::{Evaluation, StateOutcome};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Archived run output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub snapshot: MetricsSnapshot,
    pub anomalies: Vec<AnomalyFlag>,
    pub events: Vec<AlertEvent>,
    pub utilization_pct: Metric<Decimal>,
    pub state: StateOutcome,
}

impl ReportArtifact {
    pub fn new(evaluation: &Evaluation, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at,
            snapshot: evaluation.snapshot.clone(),
            anomalies: evaluation.anomalies.clone(),
            events: evaluation.events.clone(),
            utilization_pct: evaluation.utilization_pct,
            state: evaluation.state.clone(),
        }
    }
}

/// `<dir>/reports/<as_of>.json`
pub fn report_path(dir: &Path, as_of: NaiveDate) -> PathBuf {
    dir.join("reports")
        .join(format!("{}.json", as_of.format("%Y-%m-%d")))
}

/// Write the run's report artifact, overwriting a previous one for the same date
///
/// # Errors
/// Returns error if the directory cannot be created or the file written
///
/// # Examples
///
/// ```no_run
/// # fn demo(evaluation: &costwatch_core::Evaluation) -> anyhow::Result<()> {
/// let dir = std::path::Path::new("archive");
/// let path = costwatch_core::export::write_report_json(dir, evaluation)?;
/// println!("archived to {}", path.display());
/// # Ok(())
/// # }
/// ```
pub fn write_report_json(dir: &Path, evaluation: &Evaluation) -> Result<PathBuf> {
    let path = report_path(dir, evaluation.snapshot.as_of);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let artifact = ReportArtifact::new(evaluation, Utc::now());
    let json = serde_json::to_string_pretty(&artifact)
        .context("Failed to serialize report to JSON")?;

    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))?;

    tracing::debug!(path = %path.display(), events = evaluation.events.len(), "Report archived");
    Ok(path)
}
