//! High-level pipeline API for sheet to JSON conversion.
//!
//! Combines all steps: parsing, preset resolution, column checks and batch
//! conversion.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetmap::transform::pipeline::{convert_csv, PipelineOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = convert_csv(Path::new("orders.csv"), PipelineOptions::default())?;
//!     println!("Converted {} rows", report.converted);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::batch::run_batch;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{PipelineError, PipelineOutcome, RowError};
use crate::models::{ConvertOptions, MappingPreset, Row};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::presets::PresetRegistry;

/// Options for the conversion pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Use a preset file instead of the registry
    pub preset_path: Option<String>,

    /// Use a stored preset by id
    pub preset_id: Option<String>,

    /// Use this preset as-is (takes precedence over the two above)
    #[serde(skip)]
    pub preset: Option<MappingPreset>,

    /// Output shape flags
    pub convert: ConvertOptions,

    /// Don't look up compatible stored presets
    pub no_cache: bool,

    /// Don't store the default preset generated from headers
    pub no_save: bool,

    /// Fail instead of warning when kept columns are missing from the sheet
    pub strict_columns: bool,
}

/// Where the preset of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetSource {
    Provided,
    File,
    Stored,
    Compatible,
    Generated,
}

/// Result of a complete conversion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    /// Final JSON value (array of records, or the first record)
    pub output: Value,

    /// Number of records in the output batch
    pub converted: usize,

    /// Indices of rows that produced an empty record
    pub suppressed: Vec<usize>,

    /// Rows that could not be read
    pub row_errors: Vec<String>,

    /// Preset used for the conversion
    pub preset: MappingPreset,

    /// Stored preset id, if the registry provided or received it
    pub preset_id: Option<String>,

    pub preset_source: PresetSource,

    /// Kept columns the sheet does not have
    pub missing_columns: Vec<String>,

    /// Sheet parsing metadata
    pub csv_info: CsvInfo,
}

impl PipelineReport {
    pub fn has_warnings(&self) -> bool {
        !self.suppressed.is_empty() || !self.row_errors.is_empty() || !self.missing_columns.is_empty()
    }
}

/// Sheet information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Convert a CSV file.
///
/// This is the main entry point for the pipeline. It:
/// 1. Parses the CSV with auto-detection
/// 2. Resolves the mapping preset
/// 3. Checks the preset against the headers
/// 4. Converts every row
pub fn convert_csv(path: &Path, options: PipelineOptions) -> PipelineOutcome<PipelineReport> {
    let parse_result = parse_csv_file_auto(path)?;
    convert_parsed(parse_result, options, Some(path))
}

/// Same as [`convert_csv`] but accepts raw bytes instead of a file path.
pub fn convert_bytes(bytes: &[u8], options: PipelineOptions) -> PipelineOutcome<PipelineReport> {
    let parse_result = parse_bytes_auto(bytes)?;
    convert_parsed(parse_result, options, None)
}

/// Convert already-parsed rows.
pub fn convert_records(rows: Vec<Row>, headers: Vec<String>, options: PipelineOptions) -> PipelineOutcome<PipelineReport> {
    let parse_result = ParseResult {
        rows,
        headers,
        encoding: "utf-8".to_string(),
        delimiter: ',',
    };
    convert_parsed(parse_result, options, None)
}

fn convert_parsed(
    parse_result: ParseResult,
    options: PipelineOptions,
    source_path: Option<&Path>,
) -> PipelineOutcome<PipelineReport> {
    log_info("📖 Reading sheet...");
    log_success(format!("Detected encoding: {}", parse_result.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parse_result.delimiter)));
    log_success(format!("Read {} rows", parse_result.rows.len()));

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.headers.clone(),
        row_count: parse_result.rows.len(),
    };

    if parse_result.rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    log_info(format!("📋 Sheet has {} columns:", parse_result.headers.len()));
    for (i, col) in parse_result.headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    let (preset, preset_id, preset_source) = resolve_preset(&parse_result.headers, &options, source_path)?;
    print_mapping(&preset);

    let missing_columns = match preset.validate_headers(&parse_result.headers) {
        Ok(()) => Vec::new(),
        Err(missing) if options.strict_columns => {
            log_error(format!("Missing columns: {}", missing.join(", ")));
            return Err(PipelineError::MissingColumns(missing));
        }
        Err(missing) => {
            log_warning(format!(
                "Preset reads {} column(s) the sheet does not have: {}",
                missing.len(),
                missing.join(", ")
            ));
            missing
        }
    };

    log_info("⚙️  Converting rows...");
    let batch = run_batch(&parse_result.rows, &preset.mapping, &preset.custom_keys, options.convert);
    print_batch_result(batch.records.len(), &batch.suppressed, &batch.errors);

    let converted = batch.records.len();
    let suppressed = batch.suppressed.clone();
    let row_errors = batch.errors.iter().map(ToString::to_string).collect();
    let output = batch.into_json(options.convert.wrap_array);

    Ok(PipelineReport {
        output,
        converted,
        suppressed,
        row_errors,
        preset,
        preset_id,
        preset_source,
        missing_columns,
        csv_info,
    })
}

/// Pick the preset for a run.
///
/// Order: preset given inline, preset file, stored preset id, best compatible
/// stored preset, default preset from headers.
fn resolve_preset(
    headers: &[String],
    options: &PipelineOptions,
    source_path: Option<&Path>,
) -> PipelineOutcome<(MappingPreset, Option<String>, PresetSource)> {
    if let Some(ref preset) = options.preset {
        log_info("Using provided preset");
        return Ok((preset.clone(), None, PresetSource::Provided));
    }

    if let Some(ref preset_path) = options.preset_path {
        log_info(format!("Using preset file: {}", preset_path));
        let content = std::fs::read_to_string(preset_path)?;
        let preset = MappingPreset::from_json(&content)?;
        return Ok((preset, None, PresetSource::File));
    }

    if let Some(ref id) = options.preset_id {
        let mut registry = PresetRegistry::new();
        let stored = registry
            .get(id)
            .cloned()
            .ok_or_else(|| crate::error::PresetError::NotFound(id.clone()))?;
        log_success(format!("Using stored preset \"{}\"", stored.name));
        if let Err(e) = registry.touch(id) {
            log_warning(format!("Could not update preset stats: {}", e));
        }
        return Ok((stored.preset, Some(stored.id), PresetSource::Stored));
    }

    if !options.no_cache {
        log_info("Looking for compatible stored presets...");
        let mut registry = PresetRegistry::new();
        let best = registry
            .find_compatible(headers)
            .first()
            .map(|(stored, score)| ((*stored).clone(), *score));

        match best {
            Some((stored, score)) => {
                log_success(format!(
                    "Using preset \"{}\" (score: {:.0}%, used {} times)",
                    stored.name,
                    score * 100.0,
                    stored.use_count
                ));
                if let Err(e) = registry.touch(&stored.id) {
                    log_warning(format!("Could not update preset stats: {}", e));
                }
                return Ok((stored.preset, Some(stored.id), PresetSource::Compatible));
            }
            None => log_warning("No compatible presets found"),
        }
    }

    log_info("🗺️  Generating default preset from headers...");
    let preset = MappingPreset::from_headers(headers);

    let preset_id = if options.no_save {
        None
    } else {
        let name = source_path
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("auto-generated");
        let mut registry = PresetRegistry::new();
        match registry.save(preset.clone(), name, headers.to_vec()) {
            Ok(id) => {
                log_success(format!("→ Saved as: {}", id));
                Some(id)
            }
            Err(e) => {
                log_warning(format!("Could not save preset: {}", e));
                None
            }
        }
    };

    Ok((preset, preset_id, PresetSource::Generated))
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

fn print_mapping(preset: &MappingPreset) {
    log_info("🗺️  Mapping:");
    for mapping in preset.mapping.iter().filter(|m| m.is_active()) {
        log_info_indent(format!("{} → {}", mapping.original_key, mapping.target_path), 1);
    }
    for custom in &preset.custom_keys {
        log_info_indent(format!("(custom) → {}", custom.key), 1);
    }
}

fn print_batch_result(converted: usize, suppressed: &[usize], errors: &[RowError]) {
    log_success(format!("Generated {} records", converted));

    if !suppressed.is_empty() {
        let sample: Vec<String> = suppressed.iter().take(5).map(|r| r.to_string()).collect();
        let more = if suppressed.len() > 5 {
            format!("... +{}", suppressed.len() - 5)
        } else {
            String::new()
        };
        log_warning(format!(
            "{} rows produced empty records (rows: {}{})",
            suppressed.len(),
            sample.join(", "),
            more
        ));
    }

    if !errors.is_empty() {
        log_warning(format!("{} rows could not be read", errors.len()));
        for err in errors.iter().take(3) {
            log_error(err.to_string());
        }
    }
}
