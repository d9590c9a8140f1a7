//! CSV bank statement exports.

use super::{FetchError, RowSource};
use crate::model::{RawRow, SourceRef};
use csv::ByteRecord;
use serde_json::{Map, Value};
use std::{path::Path, path::PathBuf, sync::Arc};
use tracing::debug;

/// Reads CSV statements. Headers are mapped to canonical row keys; unknown headers are kept as-is.
///
/// A record that is not valid UTF-8 becomes an unreadable row instead of failing the file.
#[derive(Debug, Default)]
pub struct StatementSource {
    paths: Vec<PathBuf>,
}

impl StatementSource {
    pub fn new<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl RowSource for StatementSource {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, FetchError> {
        let mut rows = Vec::new();
        for path in &self.paths {
            rows.extend(read_statement(path)?);
        }

        Ok(rows)
    }
}

/// Canonical row key for a statement header.
pub fn canonical_key(header: &str) -> String {
    let header = header.trim().trim_start_matches('\u{feff}');

    let key = match header.to_lowercase().as_str() {
        "id" | "txid" | "transaction id" => "id",
        "timestamp" | "date" | "time" | "дата операции" => "timestamp",
        "amount" | "сумма операции" => "amount",
        "currency" | "валюта операции" => "currency",
        "category" | "категория" => "category",
        "counterparty" | "payee" | "merchant" => "counterparty",
        "description" | "описание" => "description",
        _ => header,
    };

    key.to_string()
}

pub fn read_statement(path: impl AsRef<Path>) -> Result<Vec<RawRow>, FetchError> {
    let path = path.as_ref();
    let name: Arc<str> = Arc::from(path.display().to_string());
    let csv_error = |err| FetchError::Csv(path.into(), err);

    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(canonical_key)
        .collect();

    debug!("Parsing statement rows from {path:?}");
    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map_or(0, |pos| pos.line());
        let source = SourceRef::new(name.clone(), line);

        let row = match decode_fields(&headers, &record) {
            Ok(fields) => RawRow::new(source, fields),
            Err(reason) => RawRow::unreadable(source, reason),
        };
        debug!("Deserialized: {row:?}");

        rows.push(row);
    }

    Ok(rows)
}

fn decode_fields(headers: &[String], record: &ByteRecord) -> Result<Map<String, Value>, String> {
    headers
        .iter()
        .zip(record.iter())
        .map(|(key, value)| {
            let value = std::str::from_utf8(value)
                .map_err(|err| format!("column `{key}` is not UTF-8: {err}"))?;

            Ok((key.clone(), Value::String(value.to_string())))
        })
        .collect()
}
