//! # SheetMap - Flat spreadsheet rows to nested JSON
//!
//! SheetMap maps the columns of a sheet onto paths of a nested JSON document.
//! A preset says, per column, where the value goes (`customer.name`,
//! `items[].sku`), how to type it and which substitutions to apply.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│ Nested JSON │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (preset)   │     │  (records)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetmap::{run, ColumnMapping, ConvertOptions, Row};
//!
//! let mappings = vec![
//!     ColumnMapping::new("Customer", "customer.name"),
//!     ColumnMapping::new("SKU", "items[].sku"),
//! ];
//! let rows: Vec<Row> = load_rows();
//! let json = run(&rows, &mappings, &[], ConvertOptions::default());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Cells, mappings, custom keys and presets
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Conversion engine and pipeline
//! - [`presets`] - On-disk preset registry
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Stored presets
pub mod presets;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CsvError, PipelineError, PresetError, RowError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Action, ColumnMapping, ConvertOptions, CustomKey, CustomKeyType, DataType, MappingPreset, Row, Scalar,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto, parse_csv_str,
    ParseResult,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use transform::{
    apply_rule, build_record, convert_value, resolve, run, run_batch, run_json_rows, BatchOutput, OutputTree,
    RecordBuilder, TargetPath, TransformRule,
};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use presets::{PresetRegistry, StoredPreset};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert_bytes, convert_csv, convert_records, CsvInfo, PipelineOptions, PipelineReport, PresetSource,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ConvertRequest, ConvertResponse, CsvMetadata, PresetSummary, ResponseMetadata};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
