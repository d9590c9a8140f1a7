use crate::model::{Amount, Currency};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// Where a raw row came from. Rendered as `name:line`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: Arc<str>,
    pub line: u64,
}

impl SourceRef {
    pub fn new(name: impl Into<Arc<str>>, line: u64) -> Self {
        Self {
            name: name.into(),
            line,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.line)
    }
}

/// A heterogeneous key/value row, exactly as produced by a row source.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRow {
    pub source: SourceRef,
    pub fields: Map<String, Value>,

    /// Set when the source could not decode the row. `fields` is empty then.
    pub unreadable: Option<String>,
}

impl RawRow {
    pub fn new(source: SourceRef, fields: Map<String, Value>) -> Self {
        Self {
            source,
            fields,
            unreadable: None,
        }
    }

    /// A row the source found but could not decode.
    pub fn unreadable(source: SourceRef, reason: impl Into<String>) -> Self {
        Self {
            source,
            fields: Map::new(),
            unreadable: Some(reason.into()),
        }
    }

    /// Get a field, treating JSON `null` and blank strings as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        }
    }
}

/// A normalized bank transaction. Never mutated after normalization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub amount: Amount,
    pub currency: Currency,
    pub category: String,
    pub counterparty: String,
    pub description: String,
    pub source: SourceRef,
}

impl TransactionRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
