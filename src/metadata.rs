//! Trial-level metadata: one row per trial, scalar cells only.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::eye::EyeTable;

/// Column-named table of scalar values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Metadata {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of trials
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of a column, in trial order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Build metadata from an eye-tracking table.
    ///
    /// Only scalar variables and the per-trial offset are carried over.
    /// Fixation, blink and trace lists, and any variable that holds a list
    /// in some trial, have no scalar representation and are left out.
    pub fn from_eye_table(table: &EyeTable) -> Self {
        let names: BTreeSet<&String> = table.iter().flat_map(|t| t.variables.keys()).collect();
        let mut columns: Vec<String> = names
            .into_iter()
            .filter(|name| name.as_str() != "eye_offset")
            .filter(|name| {
                table
                    .iter()
                    .filter_map(|t| t.variables.get(name.as_str()))
                    .all(is_scalar)
            })
            .cloned()
            .collect();
        let with_offset = table.iter().any(|t| t.eye_offset.is_some());

        let rows = table
            .iter()
            .map(|trial| {
                let mut row: Vec<Value> = columns
                    .iter()
                    .map(|name| trial.variables.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                if with_offset {
                    row.push(
                        trial
                            .eye_offset
                            .and_then(Number::from_f64)
                            .map_or(Value::Null, Value::Number),
                    );
                }
                row
            })
            .collect();

        if with_offset {
            columns.push("eye_offset".to_string());
        }
        Self { columns, rows }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Reads the behavioral log of a subject
pub trait BehavioralReader: Send + Sync {
    /// File extension (without the dot) the reader expects
    fn extension(&self) -> &str {
        "csv"
    }

    fn read(&self, path: &Path) -> Result<Metadata>;
}

/// Comma-separated behavioral log with a header row.
///
/// Cells that parse as numbers become numbers, empty cells become null,
/// everything else is kept as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvBehavioralReader;

impl BehavioralReader for CsvBehavioralReader {
    fn read(&self, path: &Path) -> Result<Metadata> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open behavioral log {}", path.display()))?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Bad record {} in {}", line + 1, path.display()))?;
            rows.push(record.iter().map(infer_cell).collect());
        }

        tracing::debug!(
            "Read {} rows x {} columns from {}",
            rows.len(),
            columns.len(),
            path.display()
        );
        Ok(Metadata { columns, rows })
    }
}

fn infer_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = cell.parse::<f64>() {
        return Number::from_f64(float).map_or(Value::Null, Value::Number);
    }
    Value::String(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eye::{Blinks, EyeTrial};
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn csv_cells_are_typed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trial,condition,response_time,correct").unwrap();
        writeln!(file, "1,left,512.5,1").unwrap();
        writeln!(file, "2,right,,0").unwrap();
        writeln!(file, "3,left,nan,1").unwrap();

        let metadata = CsvBehavioralReader.read(file.path()).unwrap();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.columns, vec!["trial", "condition", "response_time", "correct"]);
        assert_eq!(metadata.get(0, "trial"), Some(&json!(1)));
        assert_eq!(metadata.get(0, "condition"), Some(&json!("left")));
        assert_eq!(metadata.get(0, "response_time"), Some(&json!(512.5)));
        assert_eq!(metadata.get(1, "response_time"), Some(&Value::Null));
        assert_eq!(metadata.get(2, "response_time"), Some(&Value::Null));
        assert_eq!(metadata.column("correct").unwrap(), vec![&json!(1), &json!(0), &json!(1)]);
    }

    #[test]
    fn ragged_csv_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2,3").unwrap();
        assert!(CsvBehavioralReader.read(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CsvBehavioralReader.read(&dir.path().join("beh.csv")).is_err());
    }

    #[test]
    fn eye_table_drops_series_columns() {
        let mut first = EyeTrial::default();
        first.variables.insert("t_onset_1".into(), json!(1050.0));
        first.variables.insert("condition".into(), json!("easy"));
        first.variables.insert("samples".into(), json!([1, 2, 3]));
        first.blinks = Blinks {
            start: vec![1.0],
            end: vec![2.0],
        };
        first.eye_offset = Some(1.5);
        let mut second = EyeTrial::default();
        second.variables.insert("t_onset_1".into(), json!(2050.0));

        let metadata = Metadata::from_eye_table(&EyeTable::new(vec![first, second]));
        assert_eq!(metadata.columns, vec!["condition", "t_onset_1", "eye_offset"]);
        assert_eq!(metadata.get(0, "samples"), None);
        assert_eq!(metadata.get(1, "condition"), Some(&Value::Null));
        assert_eq!(metadata.get(0, "eye_offset"), Some(&json!(1.5)));
        assert_eq!(metadata.get(1, "eye_offset"), Some(&Value::Null));
        assert_eq!(metadata.get(1, "t_onset_1"), Some(&json!(2050.0)));
    }

    #[test]
    fn unaligned_eye_table_has_no_offset_column() {
        let metadata = Metadata::from_eye_table(&EyeTable::new(vec![EyeTrial::default(); 2]));
        assert!(metadata.columns.is_empty());
        assert_eq!(metadata.len(), 2);
    }
}
