//! REST API types.
//!
//! Responses carry the converted JSON value exactly as the CLI would write
//! it, plus counters about the run.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{ConvertOptions, MappingPreset};
use crate::presets::StoredPreset;
use crate::transform::batch::BatchOutput;
use crate::transform::pipeline::PipelineReport;

/// Body of `POST /api/convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    /// Flat rows as JSON objects
    pub rows: Vec<Value>,

    /// Mapping to apply
    pub preset: MappingPreset,

    #[serde(default)]
    pub options: ConvertOptions,
}

/// Response sent after a conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" or "warning"
    pub status: String,

    /// Converted JSON value
    pub output: Value,

    pub metadata: ResponseMetadata,
}

/// Metadata about the conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Records in the output batch
    pub converted_rows: usize,

    /// Indices of rows that produced an empty record
    pub suppressed_rows: Vec<usize>,

    /// Rows that could not be read
    pub row_errors: Vec<String>,

    /// Stored preset used or created, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,

    /// Kept columns missing from the sheet
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_columns: Vec<String>,

    /// Present for sheet uploads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_info: Option<CsvMetadata>,
}

/// Sheet metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Entry of `GET /api/presets`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSummary {
    pub id: String,
    pub name: String,
    pub columns: Vec<String>,
    pub use_count: u32,
    pub last_used: Option<String>,
}

impl From<&StoredPreset> for PresetSummary {
    fn from(stored: &StoredPreset) -> Self {
        Self {
            id: stored.id.clone(),
            name: stored.name.clone(),
            columns: stored.csv_columns.clone(),
            use_count: stored.use_count,
            last_used: stored.last_used.clone(),
        }
    }
}

fn status(warning: bool) -> String {
    if warning { "warning" } else { "ready" }.to_string()
}

impl ConvertResponse {
    /// Response for rows converted by the batch processor directly.
    pub fn from_batch(batch: BatchOutput, wrap_array: bool) -> Self {
        let metadata = ResponseMetadata {
            converted_rows: batch.records.len(),
            suppressed_rows: batch.suppressed.clone(),
            row_errors: batch.errors.iter().map(ToString::to_string).collect(),
            preset_id: None,
            missing_columns: Vec::new(),
            csv_info: None,
        };
        let warning = !metadata.suppressed_rows.is_empty() || !metadata.row_errors.is_empty();

        ConvertResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(warning),
            output: batch.into_json(wrap_array),
            metadata,
        }
    }
}

impl From<PipelineReport> for ConvertResponse {
    fn from(report: PipelineReport) -> Self {
        let warning = report.has_warnings();

        ConvertResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(warning),
            output: report.output,
            metadata: ResponseMetadata {
                converted_rows: report.converted,
                suppressed_rows: report.suppressed,
                row_errors: report.row_errors,
                preset_id: report.preset_id,
                missing_columns: report.missing_columns,
                csv_info: Some(CsvMetadata {
                    encoding: report.csv_info.encoding,
                    delimiter: report.csv_info.delimiter.to_string(),
                    row_count: report.csv_info.row_count,
                    columns: report.csv_info.headers,
                }),
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "output": null,
        "metadata": {
            "convertedRows": 0,
            "suppressedRows": [],
            "rowErrors": []
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnMapping;
    use crate::transform::batch::run_json_rows;

    #[test]
    fn test_request_defaults() {
        let req: ConvertRequest = serde_json::from_value(json!({
            "rows": [{"A": "1"}],
            "preset": {"mapping": [{"originalKey": "A", "targetPath": "a"}]}
        }))
        .unwrap();

        assert!(req.options.wrap_array);
        assert!(req.preset.custom_keys.is_empty());
    }

    #[test]
    fn test_batch_response_status() {
        let preset = MappingPreset::new(vec![ColumnMapping::new("A", "a")], vec![]);
        let rows = vec![json!({"A": "x"}), json!(42)];
        let batch = run_json_rows(&rows, &preset, ConvertOptions::default());

        let response = ConvertResponse::from_batch(batch, true);
        assert_eq!(response.status, "warning");
        assert_eq!(response.output, json!([{"a": "x"}]));
        assert_eq!(response.metadata.converted_rows, 1);
        assert_eq!(response.metadata.row_errors, vec!["Row 1 is not an object".to_string()]);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("jobId").is_some());
        assert!(json["metadata"].get("csvInfo").is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert!(body["output"].is_null());
    }
}
