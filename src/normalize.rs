//! Turns raw rows into [`TransactionRecord`]s.

use crate::model::{Amount, Currency, CurrencyError, ParseAmountError, Stats};
use crate::model::{RawRow, SourceRef, TransactionRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Fields every raw row must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["id", "timestamp", "amount", "currency"];

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Row {row}: unreadable record ({reason})")]
    Unreadable { row: SourceRef, reason: String },

    #[error("Row {row}: missing required field `{field}`")]
    MissingField { row: SourceRef, field: &'static str },

    #[error("Row {row}: field `{field}` must be a string or a number")]
    InvalidType { row: SourceRef, field: &'static str },

    #[error("Row {row} (id `{id}`): unparsable timestamp `{value}`")]
    InvalidTimestamp {
        row: SourceRef,
        id: String,
        value: String,
    },

    #[error("Row {row} (id `{id}`): unparsable amount `{value}`")]
    InvalidAmount {
        row: SourceRef,
        id: String,
        value: String,
        #[source]
        source: ParseAmountError,
    },

    #[error("Row {row} (id `{id}`): invalid currency")]
    InvalidCurrency {
        row: SourceRef,
        id: String,
        #[source]
        source: CurrencyError,
    },
}

impl ValidationError {
    /// Where the offending row came from.
    pub fn row(&self) -> &SourceRef {
        match self {
            Self::Unreadable { row, .. }
            | Self::MissingField { row, .. }
            | Self::InvalidType { row, .. }
            | Self::InvalidTimestamp { row, .. }
            | Self::InvalidAmount { row, .. }
            | Self::InvalidCurrency { row, .. } => row,
        }
    }
}

/// Records that passed validation, in input order, plus the rows that were skipped.
#[derive(Debug, Default)]
pub struct Normalized {
    pub records: Vec<TransactionRecord>,
    pub skipped: Vec<ValidationError>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Normalizer {
    strict: bool,
}

impl Normalizer {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Normalize a batch of rows.
    ///
    /// In strict mode the first invalid row aborts the batch. Otherwise invalid rows are logged,
    /// counted, and returned in [`Normalized::skipped`].
    pub fn normalize<I>(&self, stats: &mut Stats, rows: I) -> Result<Normalized, ValidationError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut normalized = Normalized::default();

        debug!("Normalizing rows (strict: {})", self.strict);
        for row in rows {
            stats.inc_raw_rows();
            trace!("Raw: {row:?}");

            match normalize_row(&row) {
                Ok(record) => {
                    trace!("Normalized: {record:?}");
                    stats.inc_records();
                    normalized.records.push(record);
                }
                Err(err) if self.strict => return Err(err),
                Err(err) => {
                    warn!("Skipping invalid row: {err}");
                    stats.inc_skipped();
                    normalized.skipped.push(err);
                }
            }
        }

        Ok(normalized)
    }
}

/// Validate the required-field contract of a single row and coerce its values.
pub fn normalize_row(row: &RawRow) -> Result<TransactionRecord, ValidationError> {
    if let Some(reason) = &row.unreadable {
        return Err(ValidationError::Unreadable {
            row: row.source.clone(),
            reason: reason.clone(),
        });
    }

    for field in REQUIRED_FIELDS {
        if row.get(field).is_none() {
            return Err(ValidationError::MissingField {
                row: row.source.clone(),
                field,
            });
        }
    }

    let id = required_scalar(row, "id")?;

    let timestamp = required_scalar(row, "timestamp")?;
    let timestamp =
        parse_timestamp(&timestamp).ok_or_else(|| ValidationError::InvalidTimestamp {
            row: row.source.clone(),
            id: id.clone(),
            value: timestamp,
        })?;

    let amount = required_scalar(row, "amount")?;
    let amount = amount
        .parse::<Amount>()
        .map_err(|source| ValidationError::InvalidAmount {
            row: row.source.clone(),
            id: id.clone(),
            value: amount,
            source,
        })?
        .normalized();

    let currency = required_scalar(row, "currency")?
        .parse::<Currency>()
        .map_err(|source| ValidationError::InvalidCurrency {
            row: row.source.clone(),
            id: id.clone(),
            source,
        })?;

    let category = optional_scalar(row, "category")?;
    let counterparty = optional_scalar(row, "counterparty")?;
    let description = optional_scalar(row, "description")?;

    Ok(TransactionRecord {
        id,
        timestamp,
        amount,
        currency,
        category,
        counterparty,
        description,
        source: row.source.clone(),
    })
}

/// Parse any of the supported timestamp forms into a naive (bank-local) date and time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|datetime| datetime.naive_local())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn scalar(row: &RawRow, field: &'static str) -> Result<Option<String>, ValidationError> {
    match row.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ValidationError::InvalidType {
            row: row.source.clone(),
            field,
        }),
    }
}

fn required_scalar(row: &RawRow, field: &'static str) -> Result<String, ValidationError> {
    scalar(row, field)?.ok_or_else(|| ValidationError::MissingField {
        row: row.source.clone(),
        field,
    })
}

fn optional_scalar(row: &RawRow, field: &'static str) -> Result<String, ValidationError> {
    Ok(scalar(row, field)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn raw(line: u64, value: Value) -> RawRow {
        let Value::Object(fields) = value else {
            panic!("Test rows must be objects");
        };

        RawRow::new(SourceRef::new("test", line), fields)
    }

    fn rows() -> Vec<RawRow> {
        vec![
            raw(
                1,
                json!({"id": 1, "timestamp": "2024-01-05", "amount": 100, "currency": "USD",
                    "category": "food", "counterparty": "Grocer"}),
            ),
            raw(
                2,
                json!({"id": "2", "timestamp": "2024-01-10 12:30:00", "currency": "USD",
                    "category": "food"}),
            ),
            raw(
                3,
                json!({"id": 3, "timestamp": "10.01.2024 18:00:00", "amount": "-1 200,50",
                    "currency": "rub", "category": "transport", "unused": [1, 2, 3]}),
            ),
        ]
    }

    #[test]
    fn test_normalize_row() {
        let record = normalize_row(&rows()[0]).unwrap();
        assert_eq!(record.id, "1");
        assert_eq!(record.date(), "2024-01-05".parse::<NaiveDate>().unwrap());
        assert_eq!(record.amount.to_string(), "100.00");
        assert_eq!(record.currency, Currency::USD);
        assert_eq!(record.category, "food");
        assert_eq!(record.counterparty, "Grocer");
        assert_eq!(record.description, "");
        assert_eq!(record.source.to_string(), "test:1");

        let record = normalize_row(&rows()[2]).unwrap();
        assert_eq!(record.amount.to_string(), "-1200.50");
        assert_eq!(record.currency, Currency::RUB);
        assert_eq!(
            record.timestamp,
            parse_timestamp("2024-01-10T18:00:00").unwrap()
        );
    }

    #[test]
    #[traced_test]
    fn test_strict_aborts_on_missing_amount() {
        let mut stats = Stats::default();
        let err = Normalizer::new(true)
            .normalize(&mut stats, rows())
            .unwrap_err();

        assert!(matches!(
            &err,
            ValidationError::MissingField { field: "amount", .. }
        ));
        assert_eq!(err.row().line, 2);
    }

    #[test]
    #[traced_test]
    fn test_lenient_skips_missing_amount() {
        let mut stats = Stats::default();
        let normalized = Normalizer::new(false)
            .normalize(&mut stats, rows())
            .unwrap();

        let ids: Vec<_> = normalized.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(normalized.skipped.len(), 1);
        assert_eq!(normalized.skipped[0].row().line, 2);
        assert_eq!(stats.raw_rows(), 3);
        assert_eq!(stats.records(), 2);
        assert_eq!(stats.skipped(), 1);
        assert!(logs_contain("Skipping invalid row"));
    }

    #[test]
    #[traced_test]
    fn test_unreadable_rows() {
        let mut input = rows();
        input[1] = RawRow::unreadable(SourceRef::new("test", 2), "invalid utf-8");

        let mut stats = Stats::default();
        let normalized = Normalizer::new(false)
            .normalize(&mut stats, input.clone())
            .unwrap();
        let ids: Vec<_> = normalized.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(
            normalized.skipped[0].to_string(),
            "Row test:2: unreadable record (invalid utf-8)"
        );
        assert_eq!(stats.skipped(), 1);

        let err = Normalizer::new(true)
            .normalize(&mut Stats::default(), input)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
        assert_eq!(err.row().line, 2);
    }

    #[test]
    fn test_invalid_values() {
        let row = raw(
            7,
            json!({"id": 7, "timestamp": "yesterday", "amount": 1, "currency": "USD"}),
        );
        assert!(matches!(
            normalize_row(&row),
            Err(ValidationError::InvalidTimestamp { id, value, .. }) if id == "7" && value == "yesterday"
        ));

        let row = raw(
            8,
            json!({"id": 8, "timestamp": "2024-01-01", "amount": "lots", "currency": "USD"}),
        );
        assert!(matches!(
            normalize_row(&row),
            Err(ValidationError::InvalidAmount { id, .. }) if id == "8"
        ));

        let row = raw(
            9,
            json!({"id": 9, "timestamp": "2024-01-01", "amount": 1, "currency": "dollars"}),
        );
        assert!(matches!(
            normalize_row(&row),
            Err(ValidationError::InvalidCurrency { id, .. }) if id == "9"
        ));

        let row = raw(
            10,
            json!({"id": {"nested": true}, "timestamp": "2024-01-01", "amount": 1, "currency": "USD"}),
        );
        assert!(matches!(
            normalize_row(&row),
            Err(ValidationError::InvalidType { field: "id", .. })
        ));

        let row = raw(
            11,
            json!({"id": 11, "timestamp": "2024-01-01", "amount": "  ", "currency": "USD"}),
        );
        assert!(matches!(
            normalize_row(&row),
            Err(ValidationError::MissingField { field: "amount", .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2020, 4, 27)
            .unwrap()
            .and_hms_opt(19, 30, 30)
            .unwrap();

        for input in [
            "2020-04-27 19:30:30",
            "2020-04-27T19:30:30",
            "2020-04-27T19:30:30+03:00",
            "27.04.2020 19:30:30",
            "2020-04-27 19:30:30.000",
        ] {
            assert_eq!(parse_timestamp(input), Some(expected), "input `{input}`");
        }

        let midnight = NaiveDate::from_ymd_opt(2020, 4, 27)
            .unwrap()
            .and_hms_opt(0, 0, 0);
        assert_eq!(parse_timestamp("2020-04-27"), midnight);
        assert_eq!(parse_timestamp("27.04.2020"), midnight);
        assert_eq!(parse_timestamp("2020-04-27 19:30"), None);
    }
}
