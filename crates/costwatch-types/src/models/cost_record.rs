use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Billing record classification, as reported by the upstream query layer.
///
/// Gross spend only counts `Usage` and `Other`. `Credit` and `Edp` are the
/// credit-like offsets; `Refund` is excluded from both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Usage,
    Credit,
    Refund,
    /// Enterprise discount program discount
    #[serde(alias = "EDP", alias = "enterprise_discount_program")]
    Edp,
    Other,
}

impl RecordType {
    /// Counted towards gross spend
    pub fn is_gross(self) -> bool {
        matches!(self, Self::Usage | Self::Other)
    }

    /// Counted towards credits applied
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Credit | Self::Edp)
    }
}

/// A single cost amount produced by the upstream collaborator.
///
/// Ranged records (`end` set, exclusive) are attributed to their start date
/// whenever amounts are bucketed per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    pub amount: Decimal,
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl CostRecord {
    /// Single-day usage record attributed to a service
    pub fn usage(date: NaiveDate, service: impl Into<String>, amount: Decimal) -> Self {
        Self {
            date,
            end: None,
            amount,
            record_type: RecordType::Usage,
            service: Some(service.into()),
        }
    }

    /// Single-day record without service attribution
    pub fn new(date: NaiveDate, record_type: RecordType, amount: Decimal) -> Self {
        Self {
            date,
            end: None,
            amount,
            record_type,
            service: None,
        }
    }

    /// Date the amount is bucketed under
    pub fn bucket_date(&self) -> NaiveDate {
        self.date
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Complete snapshot of query results handed to the engine for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCostData {
    /// Run date. Complete data covers the days strictly before it.
    pub as_of: NaiveDate,
    /// Earliest date the collaborator queried. Days in
    /// `[coverage_start, as_of)` without records had zero cost.
    pub coverage_start: NaiveDate,
    /// Currency unit reported by the billing API
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub records: Vec<CostRecord>,
    /// Forecasted spend from `as_of` to month end. `None` when the forecast
    /// query failed or was not issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_remaining: Option<Decimal>,
}

impl RawCostData {
    pub fn new(as_of: NaiveDate, coverage_start: NaiveDate) -> Self {
        Self {
            as_of,
            coverage_start,
            currency: default_currency(),
            records: Vec::new(),
            forecast_remaining: None,
        }
    }

    pub fn with_records(mut self, records: Vec<CostRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_forecast(mut self, remaining: Decimal) -> Self {
        self.forecast_remaining = Some(remaining);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_type_classification() {
        assert!(RecordType::Usage.is_gross());
        assert!(RecordType::Other.is_gross());
        assert!(!RecordType::Refund.is_gross());
        assert!(!RecordType::Refund.is_credit());
        assert!(RecordType::Edp.is_credit());
        assert!(RecordType::Credit.is_credit());
    }

    #[test]
    fn test_raw_cost_data_from_json() {
        let json = r#"{
            "asOf": "2026-03-11",
            "coverageStart": "2026-02-20",
            "records": [
                {"date": "2026-03-02", "amount": "12.50", "recordType": "usage",
                 "service": "Amazon EC2"},
                {"date": "2026-03-02", "amount": "-4", "recordType": "EDP"}
            ],
            "forecastRemaining": "80.25"
        }"#;

        let data: RawCostData = serde_json::from_str(json).unwrap();
        assert_eq!(data.currency, "USD");
        assert_eq!(data.records.len(), 2);
        assert_eq!(data.records[0].amount, dec!(12.50));
        assert_eq!(data.records[1].record_type, RecordType::Edp);
        assert_eq!(data.forecast_remaining, Some(dec!(80.25)));
    }

    #[test]
    fn test_missing_forecast_is_none_not_zero() {
        let json = r#"{"asOf": "2026-03-11", "coverageStart": "2026-02-20"}"#;
        let data: RawCostData = serde_json::from_str(json).unwrap();
        assert!(data.forecast_remaining.is_none());
        assert!(data.records.is_empty());
    }
}
