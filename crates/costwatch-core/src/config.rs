//! Layered configuration
//!
//! Priority: environment > config file > built-in defaults. CLI flags are
//! applied on top by the binary.
//!
//! Invalid environment values are ignored with a warning and the lower layer
//! wins. A missing budget amount is an error when the budget is requested,
//! never a silent default.

use costwatch_types::{BudgetConfig, CreditForecastPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::metrics::AggregationConfig;

pub const ENV_BUDGET_AMOUNT: &str = "COSTWATCH_BUDGET_AMOUNT";
pub const ENV_BUDGET_THRESHOLDS: &str = "COSTWATCH_BUDGET_THRESHOLDS";
pub const ENV_ANOMALY_THRESHOLD: &str = "COSTWATCH_ANOMALY_THRESHOLD_PERCENT";
pub const ENV_TOP_SERVICES: &str = "COSTWATCH_TOP_SERVICES";
pub const ENV_TREND_DAYS: &str = "COSTWATCH_TREND_DAYS";
pub const ENV_BURN_WINDOW_DAYS: &str = "COSTWATCH_BURN_WINDOW_DAYS";
pub const ENV_CREDIT_FORECAST: &str = "COSTWATCH_CREDIT_FORECAST";
pub const ENV_STATE_DB: &str = "COSTWATCH_STATE_DB";

/// Longest trend or burn window accepted from any layer
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub budget_amount: Option<Decimal>,
    pub budget_thresholds: Vec<u32>,
    pub anomaly_threshold_percent: Decimal,
    pub top_services: usize,
    pub trend_days: u32,
    pub burn_window_days: u32,
    pub credit_forecast: CreditForecastPolicy,
    pub state_db: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            budget_amount: None,
            budget_thresholds: vec![50, 75, 90, 100],
            anomaly_threshold_percent: Decimal::from(30),
            top_services: 10,
            trend_days: 7,
            burn_window_days: 14,
            credit_forecast: CreditForecastPolicy::PassThrough,
            state_db: None,
        }
    }
}

/// One config file layer. Absent keys leave the lower layer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    pub budget_amount: Option<Decimal>,
    pub budget_thresholds: Option<Vec<u32>>,
    pub anomaly_threshold_percent: Option<Decimal>,
    pub top_services: Option<usize>,
    pub trend_days: Option<u32>,
    pub burn_window_days: Option<u32>,
    pub credit_forecast: Option<CreditForecastPolicy>,
    pub state_db: Option<PathBuf>,
}

impl Settings {
    /// `<config_dir>/costwatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("costwatch").join("config.toml"))
    }

    /// `<data_local_dir>/costwatch/state.db`
    pub fn default_state_db() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("costwatch").join("state.db"))
    }

    /// Resolve defaults, then `path` (or the default config file if it
    /// exists), then the process environment.
    ///
    /// An explicit `path` that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut settings = Self::default();

        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        if let Some(file) = file {
            settings.merge_file(Self::read_file(&file)?);
            debug!(path = %file.display(), "Loaded config file");
        }

        settings.apply_env();
        Ok(settings)
    }

    /// Parse a `.json` or `.toml` config file
    pub fn read_file(path: &Path) -> Result<SettingsFile, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn merge_file(&mut self, file: SettingsFile) {
        // Scalar fields: override if present
        if file.budget_amount.is_some() {
            self.budget_amount = file.budget_amount;
        }
        if let Some(thresholds) = file.budget_thresholds {
            self.budget_thresholds = normalize_levels(thresholds);
        }
        if let Some(pct) = file.anomaly_threshold_percent {
            self.anomaly_threshold_percent = pct;
        }
        if let Some(n) = file.top_services {
            self.top_services = n;
        }
        if let Some(days) = file.trend_days.and_then(|d| window_days("trendDays", d)) {
            self.trend_days = days;
        }
        if let Some(days) = file
            .burn_window_days
            .and_then(|d| window_days("burnWindowDays", d))
        {
            self.burn_window_days = days;
        }
        if let Some(policy) = file.credit_forecast {
            self.credit_forecast = policy;
        }
        if file.state_db.is_some() {
            self.state_db = file.state_db;
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = read(ENV_BUDGET_AMOUNT) {
            if let Some(amount) = positive::<Decimal>(ENV_BUDGET_AMOUNT, &raw) {
                self.budget_amount = Some(amount);
            }
        }

        if let Some(raw) = read(ENV_BUDGET_THRESHOLDS) {
            let levels: Vec<u32> = raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .filter_map(|part| positive::<u32>(ENV_BUDGET_THRESHOLDS, part))
                .collect();
            if levels.is_empty() {
                warn!(
                    key = ENV_BUDGET_THRESHOLDS,
                    value = %raw,
                    "No valid thresholds, keeping previous"
                );
            } else {
                self.budget_thresholds = normalize_levels(levels);
            }
        }

        if let Some(raw) = read(ENV_ANOMALY_THRESHOLD) {
            if let Some(pct) = positive::<Decimal>(ENV_ANOMALY_THRESHOLD, &raw) {
                self.anomaly_threshold_percent = pct;
            }
        }

        if let Some(raw) = read(ENV_TOP_SERVICES) {
            if let Some(n) = positive::<usize>(ENV_TOP_SERVICES, &raw) {
                self.top_services = n;
            }
        }

        if let Some(raw) = read(ENV_TREND_DAYS) {
            if let Some(days) = positive::<u32>(ENV_TREND_DAYS, &raw)
                .and_then(|d| window_days(ENV_TREND_DAYS, d))
            {
                self.trend_days = days;
            }
        }

        if let Some(raw) = read(ENV_BURN_WINDOW_DAYS) {
            if let Some(days) = positive::<u32>(ENV_BURN_WINDOW_DAYS, &raw)
                .and_then(|d| window_days(ENV_BURN_WINDOW_DAYS, d))
            {
                self.burn_window_days = days;
            }
        }

        if let Some(raw) = read(ENV_CREDIT_FORECAST) {
            match raw.parse::<CreditForecastPolicy>() {
                Ok(policy) => self.credit_forecast = policy,
                Err(e) => warn!(key = ENV_CREDIT_FORECAST, error = %e, "Ignoring invalid value"),
            }
        }

        if let Some(raw) = read(ENV_STATE_DB) {
            self.state_db = Some(PathBuf::from(raw.trim()));
        }
    }

    /// Budget for the alert evaluator
    ///
    /// # Errors
    /// `InvalidConfig` when no budget amount was configured or it is negative
    pub fn budget_config(&self) -> Result<BudgetConfig, CoreError> {
        let amount = self.budget_amount.ok_or_else(|| CoreError::InvalidConfig {
            message: "budget amount is not set".to_string(),
        })?;
        if amount < Decimal::ZERO {
            return Err(CoreError::InvalidConfig {
                message: format!("budget amount must not be negative, got {}", amount),
            });
        }

        Ok(BudgetConfig::new(
            amount,
            self.budget_thresholds.iter().copied(),
            self.anomaly_threshold_percent,
        ))
    }

    pub fn aggregation_config(&self) -> AggregationConfig {
        AggregationConfig {
            top_services: self.top_services,
            trend_days: self.trend_days,
            burn_window_days: self.burn_window_days,
            credit_forecast: self.credit_forecast,
        }
    }

    /// Configured state database, else the platform default
    pub fn state_db_path(&self) -> Option<PathBuf> {
        self.state_db.clone().or_else(Self::default_state_db)
    }
}

fn positive<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!(key, value = raw.trim(), "Ignoring invalid or non-positive value");
            None
        }
    }
}

fn window_days(key: &str, days: u32) -> Option<u32> {
    if days > MAX_WINDOW_DAYS {
        warn!(key, days, max = MAX_WINDOW_DAYS, "Ignoring window longer than a year");
        return None;
    }
    Some(days)
}

fn normalize_levels(mut levels: Vec<u32>) -> Vec<u32> {
    levels.retain(|l| *l > 0);
    levels.sort_unstable();
    levels.dedup();
    levels
}
