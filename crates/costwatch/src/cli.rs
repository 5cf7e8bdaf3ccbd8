//! Terminal rendering for reports, alerts and stored state
//!
//! Tables use comfy-table; `json` variants print what downstream consumers
//! read, unchanged.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use costwatch_core::format::{currency, percentage, signed_percentage};
use costwatch_core::{Evaluation, StateOutcome, VersionedState};
use costwatch_types::{
    AlertEvent, AlertPayload, AlertSeverity, Metric, MetricsSnapshot, RawCostData,
};
use std::io::Read;
use std::path::Path;

// ============================================================================
// Input
// ============================================================================

/// Read cost data from a JSON file, or stdin when `path` is `-`
pub fn read_input(path: &Path) -> Result<RawCostData> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read cost data from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cost data: {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Invalid cost data in {}", path.display()))
}

// ============================================================================
// Report
// ============================================================================

fn header(table: &mut Table, columns: &[&str], no_color: bool) {
    if no_color {
        table.set_header(columns.to_vec());
    } else {
        table.set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

/// Full human-readable run summary, or the evaluation as JSON
pub fn format_report(evaluation: &Evaluation, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(evaluation).unwrap_or_else(|_| "{}".to_string());
    }

    let snapshot = &evaluation.snapshot;
    let mut sections = vec![format_summary(snapshot, &evaluation.utilization_pct)];

    if !snapshot.top_services.is_empty() {
        sections.push(format_services_table(snapshot, no_color));
    }
    sections.push(format_events(&evaluation.events, &snapshot.currency, no_color));
    if let Some(line) = state_line(&evaluation.state) {
        sections.push(line);
    }

    sections.join("\n\n")
}

/// Key figures, one per line
pub fn format_summary(
    snapshot: &MetricsSnapshot,
    utilization: &Metric<rust_decimal::Decimal>,
) -> String {
    let unit = &snapshot.currency;
    let money = |m: &Metric<rust_decimal::Decimal>| match m.as_option() {
        Some(v) => currency(*v, unit),
        None => format!("N/A ({})", m.reason().map(|r| r.describe()).unwrap_or("")),
    };

    let mut lines = vec![
        format!("Cost report for {} (period {})", snapshot.as_of, snapshot.period),
        String::new(),
        format!("Month to date:      {}", currency(snapshot.month_to_date, unit)),
        format!("Previous day:       {}", currency(snapshot.previous_day, unit)),
        format!("Credits applied:    {}", currency(snapshot.credits_applied, unit)),
        format!("Net after credits:  {}", currency(snapshot.net_after_credits, unit)),
        format!("Forecast month end: {}", money(&snapshot.forecast_month_end)),
        format!("  after credits:    {}", money(&snapshot.forecast_after_credits)),
        format!("Budget used:        {}", percentage(utilization)),
    ];

    match snapshot.week_over_week.as_option() {
        Some(wow) => lines.push(format!(
            "Week over week:     {} vs {} ({})",
            currency(wow.current, unit),
            currency(wow.prior, unit),
            signed_percentage(&wow.change_pct)
        )),
        None => lines.push("Week over week:     N/A".to_string()),
    }

    if let Some(estimate) = &snapshot.credit_estimate {
        lines.push(format!(
            "Credit burn:        {}/day, ~{} this month ({} days left)",
            currency(estimate.daily_burn, unit),
            currency(estimate.projected_monthly, unit),
            estimate.days_remaining
        ));
    }

    lines.join("\n")
}

pub fn format_services_table(snapshot: &MetricsSnapshot, no_color: bool) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(&mut table, &["Service", "Month to date", "Share"], no_color);

    for entry in &snapshot.top_services {
        table.add_row(Row::from(vec![
            entry.service.clone(),
            currency(entry.amount, &snapshot.currency),
            percentage(&entry.share_pct),
        ]));
    }

    table.to_string()
}

pub fn format_events(events: &[AlertEvent], unit: &str, no_color: bool) -> String {
    if events.is_empty() {
        return "No new alerts.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(&mut table, &["Severity", "Alert", "Details"], no_color);

    for event in events {
        let severity = match event.severity {
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::Warning => "WARNING",
        };
        let severity_cell = if no_color {
            Cell::new(severity)
        } else {
            Cell::new(severity).fg(match event.severity {
                AlertSeverity::Critical => Color::Red,
                AlertSeverity::Warning => Color::Yellow,
            })
        };

        table.add_row(Row::from(vec![
            severity_cell,
            Cell::new(event.kind.label()),
            Cell::new(describe_event(event, unit)),
        ]));
    }

    table.to_string()
}

/// One-line alert description
pub fn describe_event(event: &AlertEvent, unit: &str) -> String {
    match &event.payload {
        AlertPayload::Threshold {
            level,
            utilization_pct,
            month_to_date,
            budget,
        } => format!(
            "{}% of budget reached: {} of {} ({})",
            level,
            currency(*month_to_date, unit),
            currency(*budget, unit),
            percentage(&Metric::value(*utilization_pct))
        ),
        AlertPayload::AdHocBudget {
            month_to_date,
            budget,
            net_after_credits,
            ..
        } => format!(
            "{} spent against a {} budget (net {} after credits)",
            currency(*month_to_date, unit),
            currency(*budget, unit),
            currency(*net_after_credits, unit)
        ),
        AlertPayload::Anomaly(flag) => format!(
            "{} on {}: {} vs baseline {} (+{}%)",
            flag.metric.name(),
            flag.date,
            currency(flag.observed, unit),
            currency(flag.baseline, unit),
            flag.deviation_pct
        ),
    }
}

fn state_line(state: &StateOutcome) -> Option<String> {
    match state {
        StateOutcome::Unchanged => None,
        StateOutcome::Written { version } => {
            Some(format!("Alert state recorded (version {}).", version))
        }
        StateOutcome::Degraded { reason } => Some(format!(
            "WARNING: alert state not recorded ({}); these alerts may repeat on the next run.",
            reason
        )),
    }
}

// ============================================================================
// Stored state
// ============================================================================

pub fn format_state_table(states: &[VersionedState], json: bool, no_color: bool) -> String {
    if json {
        let values: Vec<_> = states.iter().map(|s| &s.state).collect();
        return serde_json::to_string_pretty(&values).unwrap_or_else(|_| "[]".to_string());
    }

    if states.is_empty() {
        return "No alert state stored.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(&mut table, &["Period", "Levels fired", "Ad-hoc fired", "Version"], no_color);

    for stored in states {
        let levels = if stored.state.fired_levels.is_empty() {
            "-".to_string()
        } else {
            stored
                .state
                .fired_levels
                .iter()
                .map(|l| format!("{}%", l))
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(Row::from(vec![
            stored.state.period.to_string(),
            levels,
            if stored.state.adhoc_fired { "yes" } else { "no" }.to_string(),
            stored.version.to_string(),
        ]));
    }

    table.to_string()
}
