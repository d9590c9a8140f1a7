use crate::config::ConfigurationError;
use crate::model::TransactionRecord;
use chrono::{Days, NaiveDate};
use std::{fmt, str::FromStr};

/// Inclusive calendar date range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigurationError> {
        let range = Self { start, end };
        range.validate()?;

        Ok(range)
    }

    /// The `days`-long window ending on `end`, e.g. the last three months of spending.
    pub fn trailing_days(end: NaiveDate, days: u64) -> Self {
        let start = end.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);

        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.start > self.end {
            Err(ConfigurationError::InvalidDateRange {
                start: self.start,
                end: self.end,
            })
        } else {
            Ok(())
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// The record field used as the breakdown key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GroupBy {
    #[default]
    Category,
    Counterparty,
    Currency,
    /// Calendar month of the transaction, `YYYY-MM`.
    Month,
}

impl GroupBy {
    pub fn key(&self, record: &TransactionRecord) -> String {
        match self {
            Self::Category => record.category.clone(),
            Self::Counterparty => record.counterparty.clone(),
            Self::Currency => record.currency.to_string(),
            Self::Month => record.timestamp.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for GroupBy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "counterparty" => Ok(Self::Counterparty),
            "currency" => Ok(Self::Currency),
            "month" => Ok(Self::Month),
            _ => Err(ConfigurationError::UnknownGrouping(s.to_string())),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Category => "category",
            Self::Counterparty => "counterparty",
            Self::Currency => "currency",
            Self::Month => "month",
        };

        f.write_str(name)
    }
}

/// What to report on: a date range, optional exact-match filters, and a grouping dimension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportRequest {
    pub range: DateRange,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub group_by: GroupBy,
    pub top_n: Option<usize>,
}

impl ReportRequest {
    pub fn new(range: DateRange, group_by: GroupBy) -> Self {
        Self {
            range,
            category: None,
            counterparty: None,
            group_by,
            top_n: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_top_n(mut self, top_n: Option<usize>) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.range.validate()?;
        if self.top_n == Some(0) {
            return Err(ConfigurationError::ZeroTopN);
        }

        Ok(())
    }

    /// Date range and filter check. An absent filter matches everything.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.range.contains(record.date())
            && self
                .category
                .as_ref()
                .is_none_or(|category| *category == record.category)
            && self
                .counterparty
                .as_ref()
                .is_none_or(|counterparty| *counterparty == record.counterparty)
    }
}
