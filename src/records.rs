//! Log records and the CSV tables they travel in.
//!
//! Training data and classification uploads are both plain CSV tables. The
//! columns this crate cares about are `source`, `log_message` and
//! `target_label`; any other columns are carried through untouched.

use crate::error::{ClassifierError, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

pub const SOURCE_COLUMN: &str = "source";
pub const MESSAGE_COLUMN: &str = "log_message";
pub const TARGET_COLUMN: &str = "target_label";
pub const CLUSTER_COLUMN: &str = "cluster";
pub const REGEX_LABEL_COLUMN: &str = "regex_label";

/// Label returned whenever no tier can commit to a category.
pub const UNCLASSIFIED: &str = "Unclassified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub source: String,
    #[serde(rename = "log_message")]
    pub message: String,
}

impl LogRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledLogRecord {
    #[serde(flatten)]
    pub record: LogRecord,
    pub target_label: String,
}

impl LabeledLogRecord {
    pub fn new(
        source: impl Into<String>,
        message: impl Into<String>,
        target_label: impl Into<String>,
    ) -> Self {
        Self {
            record: LogRecord::new(source, message),
            target_label: target_label.into(),
        }
    }
}

/// An in-memory CSV table with a header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl LogTable {
    pub fn new(headers: Vec<String>, rows: Vec<StringRecord>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV file; a missing file is a `DataNotFound` error.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::DataNotFound(path.to_path_buf()));
        }
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // Short rows are padded with empty fields; extra fields cannot be placed
        let mut rows = Vec::new();
        let mut padded = 0usize;
        for record in reader.records() {
            let mut record = record?;
            if record.len() > headers.len() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(ClassifierError::InvalidData(format!(
                    "line {} has {} fields, header has {}",
                    line,
                    record.len(),
                    headers.len()
                )));
            }
            if record.len() < headers.len() {
                padded += 1;
                while record.len() < headers.len() {
                    record.push_field("");
                }
            }
            rows.push(record);
        }
        if padded > 0 {
            tracing::warn!(component = "LogTable", padded, "padded short rows with empty fields");
        }

        Ok(Self { headers, rows })
    }

    /// Write the table to `path`, creating parent directories as needed.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_to(File::create(path)?)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Resolve column indices, failing with every missing column named.
    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| self.column(name).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(ClassifierError::InvalidData(format!(
                "table is missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(names.iter().filter_map(|name| self.column(name)).collect())
    }

    /// Values of a single column, in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require_columns(&[name])?[0];
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).unwrap_or_default())
            .collect())
    }

    /// Append a column. Replaces the column instead if it already exists.
    pub fn with_column(mut self, name: &str, values: Vec<String>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(ClassifierError::InvalidData(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    let mut rebuilt = StringRecord::new();
                    for (i, field) in row.iter().enumerate() {
                        if i == idx {
                            rebuilt.push_field(&value);
                        } else {
                            rebuilt.push_field(field);
                        }
                    }
                    *row = rebuilt;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push_field(&value);
                }
            }
        }

        Ok(self)
    }

    /// Keep only the rows whose index satisfies `keep`.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize, &StringRecord) -> bool) -> LogTable {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, row)| keep(*i, row))
            .map(|(_, row)| row.clone())
            .collect();

        LogTable {
            headers: self.headers.clone(),
            rows,
        }
    }

    pub fn log_records(&self) -> Result<Vec<LogRecord>> {
        let idx = self.require_columns(&[SOURCE_COLUMN, MESSAGE_COLUMN])?;
        Ok(self
            .rows
            .iter()
            .map(|row| LogRecord {
                source: row.get(idx[0]).unwrap_or_default().to_string(),
                message: row.get(idx[1]).unwrap_or_default().to_string(),
            })
            .collect())
    }

    pub fn labeled_records(&self) -> Result<Vec<LabeledLogRecord>> {
        let idx = self.require_columns(&[SOURCE_COLUMN, MESSAGE_COLUMN, TARGET_COLUMN])?;
        Ok(self
            .rows
            .iter()
            .map(|row| {
                LabeledLogRecord::new(
                    row.get(idx[0]).unwrap_or_default(),
                    row.get(idx[1]).unwrap_or_default(),
                    row.get(idx[2]).unwrap_or_default(),
                )
            })
            .collect())
    }
}
