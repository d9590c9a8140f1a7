//! Row sources: the collaborators that produce raw rows for normalization.

use crate::model::RawRow;
use std::path::PathBuf;
use thiserror::Error;

pub mod json;
pub mod statement;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to read {0:?}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error in {0:?}")]
    Csv(PathBuf, #[source] csv::Error),

    #[error("JSON error in {0:?}")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("{0:?}: entry {1} is not an object")]
    NotAnObject(PathBuf, u64),
}

/// Produces the raw rows of one reporting run.
pub trait RowSource {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, FetchError>;
}

/// Rows already in memory.
impl RowSource for Vec<RawRow> {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, FetchError> {
        Ok(std::mem::take(self))
    }
}

/// Several sources, read in order. Stops at the first failing source.
impl RowSource for Vec<Box<dyn RowSource>> {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, FetchError> {
        let mut rows = Vec::new();
        for source in self.iter_mut() {
            rows.extend(source.fetch_rows()?);
        }

        Ok(rows)
    }
}
