//! Dataset sources and the per-column descriptor encoding.
//!
//! Encoding is pure: given the column order and the caller's type mapping it
//! always produces the same descriptor list, with no network or filesystem
//! side effects beyond reading the source itself.

use crate::error::{Error, Result};
use crate::model::SemanticType;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

/// Tabular input for a space submission.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// CSV content already in memory.
    Memory(Vec<u8>),
    /// Path to a delimited file on disk. The file extension rides into the
    /// upload key; missing or non-UTF-8 extensions fall back to `csv`.
    File(PathBuf),
}

impl DatasetSource {
    pub fn csv(bytes: impl Into<Vec<u8>>) -> Self {
        DatasetSource::Memory(bytes.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        DatasetSource::File(path.into())
    }

    pub(crate) fn extension(&self) -> &str {
        match self {
            DatasetSource::Memory(_) => "csv",
            DatasetSource::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("csv"),
        }
    }

    /// Column names from the header row, in file order.
    pub(crate) fn columns(&self) -> Result<Vec<String>> {
        let input: Box<dyn Read> = match self {
            DatasetSource::Memory(bytes) => Box::new(bytes.as_slice()),
            DatasetSource::File(path) => Box::new(std::fs::File::open(path).map_err(|err| {
                Error::Precondition(format!("unreadable dataset {}: {err}", path.display()))
            })?),
        };
        let mut reader = csv::Reader::from_reader(input);
        let headers = reader
            .headers()
            .map_err(|err| Error::Precondition(format!("unreadable dataset header: {err}")))?;
        if headers.is_empty() {
            return Err(Error::Precondition("dataset has no columns".to_string()));
        }
        Ok(headers.iter().map(str::to_string).collect())
    }

    pub(crate) fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DatasetSource::Memory(bytes) => Ok(bytes),
            DatasetSource::File(path) => std::fs::read(&path).map_err(|err| {
                Error::Precondition(format!("unreadable dataset {}: {err}", path.display()))
            }),
        }
    }
}

/// Encode every column, in order, as a one-hot record over the full
/// [`SemanticType`] domain. Columns absent from `types` encode as
/// [`SemanticType::Delete`].
pub fn one_hot_descriptors(
    columns: &[String],
    types: &HashMap<String, SemanticType>,
) -> Vec<serde_json::Map<String, Value>> {
    columns
        .iter()
        .map(|column| {
            let assigned = types
                .get(column.as_str())
                .copied()
                .unwrap_or(SemanticType::Delete);
            SemanticType::ALL
                .iter()
                .map(|ty| (ty.as_str().to_string(), Value::Bool(*ty == assigned)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn every_column_gets_exactly_one_flag() {
        let types = HashMap::from([
            ("Name".to_string(), SemanticType::Title),
            ("Description".to_string(), SemanticType::Semantic),
        ]);
        let descriptors =
            one_hot_descriptors(&columns(&["Name", "Description", "Unused"]), &types);

        assert_eq!(descriptors.len(), 3);
        for descriptor in &descriptors {
            assert_eq!(descriptor.len(), SemanticType::ALL.len());
            let set: Vec<_> = descriptor
                .iter()
                .filter(|(_, flag)| flag.as_bool() == Some(true))
                .collect();
            assert_eq!(set.len(), 1);
        }
        assert_eq!(descriptors[0]["title"], Value::Bool(true));
        assert_eq!(descriptors[1]["semantic"], Value::Bool(true));
    }

    #[test]
    fn unmapped_columns_encode_as_delete() {
        let descriptors = one_hot_descriptors(&columns(&["Orphan"]), &HashMap::new());
        assert_eq!(descriptors[0]["delete"], Value::Bool(true));
        assert_eq!(descriptors[0]["title"], Value::Bool(false));
    }

    #[test]
    fn encoding_is_deterministic() {
        let types = HashMap::from([("a".to_string(), SemanticType::Numeric)]);
        let cols = columns(&["a", "b"]);
        assert_eq!(
            one_hot_descriptors(&cols, &types),
            one_hot_descriptors(&cols, &types)
        );
    }

    #[test]
    fn memory_source_reads_header_columns() {
        let source = DatasetSource::csv(&b"Name,Market Cap,Description\nacme,1,widgets\n"[..]);
        assert_eq!(
            source.columns().unwrap(),
            columns(&["Name", "Market Cap", "Description"])
        );
        assert_eq!(source.extension(), "csv");
    }

    #[test]
    fn missing_file_is_a_precondition_error() {
        let source = DatasetSource::file("/nonexistent/data.csv");
        assert!(matches!(
            source.columns(),
            Err(crate::error::Error::Precondition(_))
        ));
    }
}
