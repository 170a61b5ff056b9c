//! Error types for the SheetMap conversion pipeline.
//!
//! The mapping engine itself never fails on bad values or bad paths: it
//! degrades (see [`crate::transform`]). The types below cover what is left:
//!
//! - [`RowError`] - A single input row is not a usable record
//! - [`CsvError`] - CSV reading and decoding errors
//! - [`PresetError`] - Preset documents and the on-disk registry
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Row Errors
// =============================================================================

/// A row that could not be read as a flat record.
///
/// Row errors are reported alongside the batch output; the other rows of the
/// batch are still converted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowError {
    /// The row is not a JSON object.
    #[error("Row {row} is not an object")]
    NotAnObject { row: usize },

    /// A cell holds an array or an object instead of a scalar.
    #[error("Row {row}, column '{column}': nested values are not supported")]
    InvalidCell { row: usize, column: String },
}

impl RowError {
    /// Index of the offending row in the input.
    pub fn row(&self) -> usize {
        match self {
            RowError::NotAnObject { row } | RowError::InvalidCell { row, .. } => *row,
        }
    }
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading tabular input.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded with the detected encoding.
    #[error("Failed to decode content as {0}")]
    Decode(String),

    /// Malformed CSV record.
    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::Parse {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Preset Errors
// =============================================================================

/// Errors from preset documents and the preset registry.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Preset not found.
    #[error("Preset not found: {0}")]
    NotFound(String),

    /// Document is not a valid preset.
    #[error("Invalid preset: {0}")]
    Invalid(String),

    /// IO error.
    #[error("Preset IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Preset JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert_csv`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Preset error.
    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),

    /// IO error outside of CSV reading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input or output error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No rows to convert.
    #[error("No rows to convert")]
    EmptyInput,

    /// The preset keeps columns the input does not have.
    #[error("Preset references unknown columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for preset operations.
pub type PresetResult<T> = Result<T, PresetError>;

/// Result type for pipeline operations.
pub type PipelineOutcome<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let preset_err = PresetError::NotFound("orders-1".into());
        let pipeline_err: PipelineError = preset_err.into();
        assert!(pipeline_err.to_string().contains("orders-1"));

        let server_err: ServerError = PipelineError::EmptyInput.into();
        assert!(server_err.to_string().contains("No rows"));
    }

    #[test]
    fn test_row_error_format() {
        let err = RowError::InvalidCell {
            row: 3,
            column: "Tags".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 3"));
        assert!(msg.contains("'Tags'"));
        assert_eq!(err.row(), 3);
    }

    #[test]
    fn test_missing_columns_lists_names() {
        let err = PipelineError::MissingColumns(vec!["Qty".into(), "SKU".into()]);
        assert_eq!(err.to_string(), "Preset references unknown columns: Qty, SKU");
    }
}
