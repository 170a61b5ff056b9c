//! Batch conversion
//!
//! Runs the [`RecordBuilder`] over every row and shapes the result:
//! an array of records, or only the first one. Rows that produce an empty
//! record are dropped and reported as suppressed.

use serde::Serialize;
use serde_json::Value;

use super::builder::{OutputTree, RecordBuilder};
use crate::error::RowError;
use crate::models::{row_from_json, ColumnMapping, ConvertOptions, CustomKey, MappingPreset, Row};

/// Result of converting a batch of rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutput {
    /// Non-empty records, in input row order
    pub records: Vec<OutputTree>,
    /// Indices of rows whose record came out empty
    pub suppressed: Vec<usize>,
    /// Rows that could not be read at all
    #[serde(skip)]
    pub errors: Vec<RowError>,
}

impl BatchOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if every row could be read
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Final JSON value: all records, or the first one (`{}` when none).
    pub fn to_json(&self, wrap_array: bool) -> Value {
        if wrap_array {
            Value::Array(self.records.iter().cloned().map(Value::Object).collect())
        } else {
            self.records
                .first()
                .cloned()
                .map(Value::Object)
                .unwrap_or_else(|| Value::Object(OutputTree::new()))
        }
    }

    /// Same as [`BatchOutput::to_json`], consuming the output.
    pub fn into_json(self, wrap_array: bool) -> Value {
        if wrap_array {
            Value::Array(self.records.into_iter().map(Value::Object).collect())
        } else {
            self.records
                .into_iter()
                .next()
                .map(Value::Object)
                .unwrap_or_else(|| Value::Object(OutputTree::new()))
        }
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Converted: {} records, {} suppressed, {} errors",
            self.records.len(),
            self.suppressed.len(),
            self.errors.len()
        )
    }

    fn push(&mut self, index: usize, record: OutputTree) {
        if record.is_empty() {
            self.suppressed.push(index);
        } else {
            self.records.push(record);
        }
    }
}

/// Convert `rows` and return the final JSON value.
pub fn run(
    rows: &[Row],
    mappings: &[ColumnMapping],
    custom_keys: &[CustomKey],
    options: ConvertOptions,
) -> Value {
    run_batch(rows, mappings, custom_keys, options).into_json(options.wrap_array)
}

/// Convert `rows`, keeping per-row diagnostics.
pub fn run_batch(
    rows: &[Row],
    mappings: &[ColumnMapping],
    custom_keys: &[CustomKey],
    options: ConvertOptions,
) -> BatchOutput {
    let builder = RecordBuilder::new(mappings, custom_keys, options.skip_empty);
    let mut output = BatchOutput::new();

    for (index, row) in rows.iter().enumerate() {
        output.push(index, builder.build(row));
    }

    output
}

/// Convert rows given as JSON objects.
///
/// A row that is not an object of scalars is recorded in
/// [`BatchOutput::errors`]; the remaining rows are still converted.
pub fn run_json_rows(rows: &[Value], preset: &MappingPreset, options: ConvertOptions) -> BatchOutput {
    let builder = RecordBuilder::new(&preset.mapping, &preset.custom_keys, options.skip_empty);
    let mut output = BatchOutput::new();

    for (index, value) in rows.iter().enumerate() {
        match row_from_json(value, index) {
            Ok(row) => output.push(index, builder.build(&row)),
            Err(err) => output.errors.push(err),
        }
    }

    output
}
