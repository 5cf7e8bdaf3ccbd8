use serde::{Deserialize, Serialize};

/// Why a derived value could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailability {
    /// Upstream forecast was not provided
    ForecastMissing,
    /// Budget amount is zero or negative
    ZeroBudget,
    /// Series has no data points to average
    EmptySeries,
    /// Baseline is zero, percent deviation is undefined
    ZeroBaseline,
    /// Run date is a Monday, no day of the current week has completed
    WeekNotStarted,
    /// Prior-week window has no positive spend to compare against
    NoPriorWeekSpend,
    /// Burn window is configured to zero days
    NoBurnWindow,
}

impl Unavailability {
    pub fn describe(self) -> &'static str {
        match self {
            Self::ForecastMissing => "forecast unavailable",
            Self::ZeroBudget => "no budget configured",
            Self::EmptySeries => "no data points",
            Self::ZeroBaseline => "baseline is zero",
            Self::WeekNotStarted => "week not started",
            Self::NoPriorWeekSpend => "no prior-week spend",
            Self::NoBurnWindow => "burn window is empty",
        }
    }
}

/// A derived value, or an explicit marker that it is not computable.
///
/// Financial figures are never defaulted to zero when they cannot be derived:
/// callers have to handle `NotComputable` before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Metric<T> {
    Value { value: T },
    NotComputable { reason: Unavailability },
}

impl<T> Metric<T> {
    pub fn value(value: T) -> Self {
        Self::Value { value }
    }

    pub fn not_computable(reason: Unavailability) -> Self {
        Self::NotComputable { reason }
    }

    /// Wrap an optional result, using `reason` when absent
    pub fn from_option(value: Option<T>, reason: Unavailability) -> Self {
        match value {
            Some(value) => Self::Value { value },
            None => Self::NotComputable { reason },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value { .. })
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Value { value } => Some(value),
            Self::NotComputable { .. } => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value { value } => Some(value),
            Self::NotComputable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<Unavailability> {
        match self {
            Self::Value { .. } => None,
            Self::NotComputable { reason } => Some(*reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Self::Value { value } => Metric::Value { value: f(value) },
            Self::NotComputable { reason } => Metric::NotComputable { reason },
        }
    }

    /// Chain a computation that can itself be not computable
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Metric<U>) -> Metric<U> {
        match self {
            Self::Value { value } => f(value),
            Self::NotComputable { reason } => Metric::NotComputable { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_serializes_with_explicit_status() {
        let available: Metric<u32> = Metric::value(42);
        let missing: Metric<u32> = Metric::not_computable(Unavailability::ForecastMissing);

        assert_eq!(
            serde_json::to_string(&available).unwrap(),
            r#"{"status":"value","value":42}"#
        );
        assert_eq!(
            serde_json::to_string(&missing).unwrap(),
            r#"{"status":"not_computable","reason":"forecast_missing"}"#
        );
    }

    #[test]
    fn test_and_then_propagates_reason() {
        let base: Metric<u32> = Metric::not_computable(Unavailability::ZeroBudget);
        let chained = base.and_then(|v| Metric::value(v * 2));
        assert_eq!(chained.reason(), Some(Unavailability::ZeroBudget));

        let ok = Metric::value(2u32)
            .and_then(|_| Metric::<u32>::not_computable(Unavailability::ZeroBaseline));
        assert_eq!(ok.reason(), Some(Unavailability::ZeroBaseline));
    }
}
