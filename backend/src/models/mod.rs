//! Domain models for the SheetMap conversion engine.
//!
//! - [`Scalar`] - A raw or converted cell value
//! - [`Row`] - One flat input record
//! - [`ColumnMapping`] - Where and how one column lands in the output
//! - [`CustomKey`] - A static key injected into every output record
//! - [`MappingPreset`] - The persisted `{ mapping, customKeys }` document
//! - [`ConvertOptions`] - Output shape flags

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::error::RowError;

// =============================================================================
// Scalar values
// =============================================================================

/// A cell value: the only leaf types a row or an output record can hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Text form of the value, as a spreadsheet would display it.
    ///
    /// Integral numbers print without a fractional part (`3`, not `3.0`).
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Num(n) => format_number(*n),
            Scalar::Str(s) => s.clone(),
        }
    }

    /// Read a JSON leaf. Arrays and objects are not scalars.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Scalar::Num),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// JSON leaf for the output tree. Integral numbers become JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Num(n) => number_to_json(*n),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Num(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::Number((n as i64).into())
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One flat input record: column name to cell value.
pub type Row = HashMap<String, Scalar>;

/// Read a JSON object as a [`Row`].
///
/// `index` is the position of the row in its batch and is only used to
/// label errors.
pub fn row_from_json(value: &Value, index: usize) -> Result<Row, RowError> {
    let obj = value
        .as_object()
        .ok_or(RowError::NotAnObject { row: index })?;

    obj.iter()
        .map(|(column, cell)| {
            Scalar::from_json(cell)
                .map(|scalar| (column.clone(), scalar))
                .ok_or_else(|| RowError::InvalidCell {
                    row: index,
                    column: column.clone(),
                })
        })
        .collect()
}

/// JSON object for a row, with columns in `headers` order.
pub fn row_to_json(row: &Row, headers: &[String]) -> Value {
    let obj: Map<String, Value> = headers
        .iter()
        .map(|h| {
            let cell = row.get(h).map(Scalar::to_json).unwrap_or(Value::Null);
            (h.clone(), cell)
        })
        .collect();
    Value::Object(obj)
}

// =============================================================================
// Column mappings
// =============================================================================

/// Requested type of a converted column value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Infer booleans and numbers, keep everything else as text.
    #[default]
    Auto,
    String,
    Number,
    /// Render as `YYYY-MM-DD`.
    Date,
    Boolean,
}

/// Whether a column contributes to the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Keep,
    Skip,
}

/// Mapping of one input column to a location in the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    /// Column name in the input rows
    pub original_key: String,

    /// Dotted target path, e.g. `customer.name` or `items[].sku`
    #[serde(default)]
    pub target_path: String,

    #[serde(default)]
    pub data_type: DataType,

    /// Substitution rule, e.g. `PO=Purchase Order|SO=Sales Order`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_rule: Option<String>,

    #[serde(default)]
    pub action: Action,
}

impl ColumnMapping {
    /// Keep `original_key` at `target_path` with automatic typing.
    pub fn new(original_key: &str, target_path: &str) -> Self {
        Self {
            original_key: original_key.to_string(),
            target_path: target_path.to_string(),
            data_type: DataType::Auto,
            transform_rule: None,
            action: Action::Keep,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_rule(mut self, rule: &str) -> Self {
        self.transform_rule = Some(rule.to_string());
        self
    }

    /// Mark the column as skipped.
    pub fn skipped(mut self) -> Self {
        self.action = Action::Skip;
        self
    }

    /// The configured rule, if any. An empty rule counts as no rule.
    pub fn rule(&self) -> Option<&str> {
        self.transform_rule.as_deref().filter(|r| !r.is_empty())
    }

    /// True when this column can write into the output.
    pub fn is_active(&self) -> bool {
        self.action == Action::Keep && !self.target_path.trim().is_empty()
    }
}

// =============================================================================
// Custom keys
// =============================================================================

/// Type of a custom key's static value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomKeyType {
    #[default]
    String,
    Number,
    Boolean,
}

impl From<CustomKeyType> for DataType {
    fn from(t: CustomKeyType) -> Self {
        match t {
            CustomKeyType::String => DataType::String,
            CustomKeyType::Number => DataType::Number,
            CustomKeyType::Boolean => DataType::Boolean,
        }
    }
}

/// A static value written into every output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomKey {
    /// Dotted path, e.g. `meta.version`
    pub key: String,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(rename = "type", default)]
    pub value_type: CustomKeyType,
}

impl CustomKey {
    pub fn new(key: &str, value: &str, value_type: CustomKeyType) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            value_type,
        }
    }
}

// =============================================================================
// Presets
// =============================================================================

/// A saved mapping: column mappings plus custom keys.
///
/// This is the document users persist and share. It is consumed verbatim by
/// the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPreset {
    #[serde(default)]
    pub mapping: Vec<ColumnMapping>,

    #[serde(default)]
    pub custom_keys: Vec<CustomKey>,
}

impl MappingPreset {
    pub fn new(mapping: Vec<ColumnMapping>, custom_keys: Vec<CustomKey>) -> Self {
        Self {
            mapping,
            custom_keys,
        }
    }

    /// One kept, auto-typed column per header, targeting a snake_case key.
    pub fn from_headers(headers: &[String]) -> Self {
        let mapping = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let key = default_target_key(header);
                let target = if key.is_empty() {
                    format!("column_{}", i + 1)
                } else {
                    key
                };
                ColumnMapping::new(header, &target)
            })
            .collect();

        Self::new(mapping, Vec::new())
    }

    /// Parse a preset from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Input columns read by kept mappings, sorted and deduplicated.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .mapping
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.original_key.clone())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Check that every kept mapping reads a column present in `headers`.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .source_columns()
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h == col))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

/// snake_case key for a header: non-alphanumerics become `_`, runs collapse.
fn default_target_key(header: &str) -> String {
    let lowered: String = header
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    lowered
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

// =============================================================================
// Options
// =============================================================================

/// Output shape flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    /// Return every record in an array instead of only the first one
    pub wrap_array: bool,

    /// Drop columns whose converted value is null
    pub skip_empty: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            wrap_array: true,
            skip_empty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_json_leaves() {
        assert_eq!(Scalar::Num(1.0).to_json(), json!(1));
        assert_eq!(Scalar::Num(2.5).to_json(), json!(2.5));
        assert_eq!(Scalar::Num(f64::NAN).to_json(), Value::Null);
        assert_eq!(Scalar::from("x").to_json(), json!("x"));
        assert_eq!(Scalar::Null.to_json(), Value::Null);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(Scalar::Num(45292.0).to_text(), "45292");
        assert_eq!(Scalar::Num(-1.25).to_text(), "-1.25");
        assert_eq!(Scalar::Bool(false).to_text(), "false");
    }

    #[test]
    fn test_scalar_deserialize_untagged() {
        let cells: Vec<Scalar> = serde_json::from_str(r#"[null, true, 3, "a"]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                Scalar::Null,
                Scalar::Bool(true),
                Scalar::Num(3.0),
                Scalar::from("a")
            ]
        );
    }

    #[test]
    fn test_row_from_json() {
        let row = row_from_json(&json!({"A": "1", "B": null, "C": 2}), 0).unwrap();
        assert_eq!(row["A"], Scalar::from("1"));
        assert_eq!(row["B"], Scalar::Null);
        assert_eq!(row["C"], Scalar::Num(2.0));

        assert_eq!(
            row_from_json(&json!([1, 2]), 4),
            Err(RowError::NotAnObject { row: 4 })
        );
        assert_eq!(
            row_from_json(&json!({"Tags": ["a"]}), 1),
            Err(RowError::InvalidCell {
                row: 1,
                column: "Tags".into()
            })
        );
    }

    #[test]
    fn test_preset_defaults_when_fields_missing() {
        let preset = MappingPreset::from_json(
            r#"{"mapping": [{"originalKey": "Name"}], "customKeys": [{"key": "v", "value": "1"}]}"#,
        )
        .unwrap();

        let m = &preset.mapping[0];
        assert_eq!(m.target_path, "");
        assert_eq!(m.data_type, DataType::Auto);
        assert_eq!(m.action, Action::Keep);
        assert!(m.rule().is_none());
        assert!(!m.is_active());
        assert_eq!(preset.custom_keys[0].value_type, CustomKeyType::String);
    }

    #[test]
    fn test_preset_serialization_roundtrip() {
        let preset = MappingPreset::new(
            vec![
                ColumnMapping::new("Order Type", "type").with_rule("PO=Purchase Order"),
                ColumnMapping::new("Date", "placedAt").with_type(DataType::Date),
                ColumnMapping::new("Notes", "notes").skipped(),
            ],
            vec![CustomKey::new("meta.version", "2", CustomKeyType::Number)],
        );

        let json = preset.to_json().unwrap();
        assert!(json.contains("\"originalKey\""));
        assert!(json.contains("\"customKeys\""));
        assert!(json.contains("\"type\": \"number\""));
        assert_eq!(MappingPreset::from_json(&json).unwrap(), preset);
    }

    #[test]
    fn test_from_headers_default_keys() {
        let headers = vec![
            "Customer Name".to_string(),
            "  Unit-Price ($) ".to_string(),
            "###".to_string(),
        ];
        let preset = MappingPreset::from_headers(&headers);

        assert_eq!(preset.mapping[0].target_path, "customer_name");
        assert_eq!(preset.mapping[1].target_path, "unit_price");
        assert_eq!(preset.mapping[2].target_path, "column_3");
        assert!(preset.mapping.iter().all(|m| m.action == Action::Keep));
    }

    #[test]
    fn test_validate_headers_ignores_skipped() {
        let preset = MappingPreset::new(
            vec![
                ColumnMapping::new("SKU", "sku"),
                ColumnMapping::new("Legacy", "legacy").skipped(),
            ],
            vec![],
        );

        assert!(preset.validate_headers(&["SKU".to_string()]).is_ok());
        assert_eq!(
            preset.validate_headers(&["Qty".to_string()]),
            Err(vec!["SKU".to_string()])
        );
    }

    #[test]
    fn test_options_default() {
        let opts: ConvertOptions = serde_json::from_str(r#"{"skipEmpty": true}"#).unwrap();
        assert!(opts.wrap_array);
        assert!(opts.skip_empty);
    }
}
