use super::{FetchError, RowSource};
use crate::model::{RawRow, SourceRef};
use serde_json::Value;
use std::{fs, path::Path, path::PathBuf, sync::Arc};
use tracing::debug;

/// Reads JSON files holding an array of row objects.
#[derive(Debug, Default)]
pub struct JsonSource {
    paths: Vec<PathBuf>,
}

impl JsonSource {
    pub fn new<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl RowSource for JsonSource {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, FetchError> {
        let mut rows = Vec::new();
        for path in &self.paths {
            rows.extend(read_json(path)?);
        }

        Ok(rows)
    }
}

/// Each row's source line is its 1-based index in the array.
pub fn read_json(path: impl AsRef<Path>) -> Result<Vec<RawRow>, FetchError> {
    let path = path.as_ref();
    let name: Arc<str> = Arc::from(path.display().to_string());

    debug!("Parsing JSON rows from {path:?}");
    let data = fs::read_to_string(path).map_err(|err| FetchError::Io(path.into(), err))?;
    let entries: Vec<Value> =
        serde_json::from_str(&data).map_err(|err| FetchError::Json(path.into(), err))?;

    entries
        .into_iter()
        .zip(1..)
        .map(|(entry, line)| match entry {
            Value::Object(fields) => Ok(RawRow::new(SourceRef::new(name.clone(), line), fields)),
            _ => Err(FetchError::NotAnObject(path.into(), line)),
        })
        .collect()
}
