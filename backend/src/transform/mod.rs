//! Transformation module.
//!
//! This module handles flat row to nested JSON conversion:
//! - Convert: Cell value typing
//! - Rules: `FIND=REPLACE` substitutions
//! - Path: Target path parsing
//! - Builder: One row to one nested record
//! - Batch: Many rows to the final JSON value
//! - Pipeline: Sheet file to report, with preset resolution

pub mod batch;
pub mod builder;
pub mod convert;
pub mod path;
pub mod pipeline;
pub mod rules;

pub use batch::{run, run_batch, run_json_rows, BatchOutput};
pub use builder::{build_record, OutputTree, RecordBuilder};
pub use convert::convert_value;
pub use path::{resolve, TargetPath};
pub use pipeline::*;
pub use rules::{apply_rule, RuleClause, TransformRule};
