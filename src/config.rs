use crate::model::{Currency, CurrencyError};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Top-N must be at least 1")]
    ZeroTopN,

    #[error("Unknown grouping dimension `{0}`")]
    UnknownGrouping(String),

    #[error("Invalid currency")]
    Currency(#[from] CurrencyError),

    #[error("Unable to read settings {0:?}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Settings file {0:?} is not valid")]
    Json(PathBuf, #[source] serde_json::Error),
}

/// Run-wide options. Every key in the settings file is optional.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Abort the whole batch on the first invalid row instead of skipping it.
    pub strict: bool,

    /// All amounts are converted into this currency before aggregation.
    pub base_currency: Currency,

    /// Keep only the N largest groups.
    pub top_n: Option<usize>,

    /// Resolve every needed rate before computing the report.
    pub prefetch: bool,

    /// Currencies whose rates against the base currency are listed with the report.
    pub user_currencies: Vec<Currency>,

    /// Stock tickers. Accepted so existing settings files load; no stock price source exists.
    pub user_stocks: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: false,
            base_currency: Currency::USD,
            top_n: None,
            prefetch: true,
            user_currencies: Vec::new(),
            user_stocks: Vec::new(),
        }
    }
}

impl Config {
    /// Load settings from a JSON file.
    pub fn load<P>(path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        debug!("Loading settings from {path:?}");

        let data =
            fs::read_to_string(path).map_err(|err| ConfigurationError::Io(path.into(), err))?;
        let config: Self =
            serde_json::from_str(&data).map_err(|err| ConfigurationError::Json(path.into(), err))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.top_n == Some(0) {
            Err(ConfigurationError::ZeroTopN)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::constants::DEFAULT_PATH_SETTINGS;
    use similar_asserts::assert_eq;

    #[test]
    fn test_load_settings() {
        let config = Config::load(DEFAULT_PATH_SETTINGS).unwrap();
        let expected = Config {
            strict: false,
            base_currency: Currency::RUB,
            top_n: Some(5),
            prefetch: true,
            user_currencies: vec![Currency::USD, Currency::EUR],
            user_stocks: vec!["AAPL".to_string(), "AMZN".to_string()],
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert!(config.strict);
        assert_eq!(config.base_currency, Currency::USD);
        assert_eq!(config.top_n, None);
        assert!(config.prefetch);
        assert!(config.user_currencies.is_empty());
    }

    #[test]
    fn test_user_settings_only() {
        let config: Config =
            serde_json::from_str(r#"{"user_currencies": ["usd", "EUR"], "user_stocks": ["AAPL"]}"#)
                .unwrap();
        assert_eq!(config.user_currencies, [Currency::USD, Currency::EUR]);
        assert_eq!(config.user_stocks, ["AAPL"]);
        assert_eq!(config.base_currency, Currency::USD);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(serde_json::from_str::<Config>(r#"{"base_currency": "dollars"}"#).is_err());
        assert!(serde_json::from_str::<Config>(r#"{"user_bonds": ["OFZ"]}"#).is_err());
        assert!(serde_json::from_str::<Config>(r#"{"user_currencies": ["euro"]}"#).is_err());

        let config: Config = serde_json::from_str(r#"{"top_n": 0}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigurationError::ZeroTopN)));
    }

    #[test]
    fn test_missing_settings_file() {
        let err = Config::load("./references/sample/does-not-exist.json").unwrap_err();
        assert!(matches!(err, ConfigurationError::Io(..)));
    }
}
