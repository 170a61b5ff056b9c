//! SheetMap CLI - Turn flat spreadsheet rows into nested JSON
//!
//! # Main Commands
//!
//! ```bash
//! sheetmap convert orders.csv --preset orders.json   # CSV to nested JSON
//! sheetmap apply rows.json --preset orders.json      # JSON rows to nested JSON
//! sheetmap serve                                     # Start HTTP server (port 3000)
//! sheetmap preset list                               # Manage stored presets
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! sheetmap parse orders.csv          # Just parse CSV to JSON rows
//! sheetmap init-preset orders.csv    # Write a starter preset for a sheet
//! ```

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use sheetmap::{
    convert_csv, models::row_to_json, parse_csv_file_auto, run_json_rows, ConvertOptions, MappingPreset,
    PipelineOptions, PipelineReport, PresetRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "sheetmap", version)]
#[command(about = "Map flat spreadsheet rows onto nested JSON documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output shape and destination
#[derive(Args, Clone)]
struct OutputArgs {
    /// Output only the first record instead of an array
    #[arg(long)]
    single: bool,

    /// Drop keys whose value is empty
    #[arg(long)]
    skip_empty: bool,

    /// Write compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl OutputArgs {
    fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            wrap_array: !self.single,
            skip_empty: self.skip_empty,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → preset → nested JSON
    Convert {
        /// Input CSV file
        input: PathBuf,

        /// Preset file (`{ mapping, customKeys }`)
        #[arg(short, long)]
        preset: Option<PathBuf>,

        /// Stored preset ID
        #[arg(short, long)]
        template: Option<String>,

        /// Don't look for compatible stored presets
        #[arg(long)]
        no_cache: bool,

        /// Don't store the preset generated from headers
        #[arg(long)]
        no_save: bool,

        /// Fail when the preset reads columns the sheet does not have
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Apply a preset to a JSON file of rows
    Apply {
        /// JSON file holding an array of flat objects
        input: PathBuf,

        /// Preset file
        #[arg(short, long)]
        preset: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default preset for a CSV file's headers
    InitPreset {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "SHEETMAP_PORT", default_value = "3000")]
        port: u16,
    },

    /// Manage stored presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List all stored presets
    List,

    /// Import a preset JSON file
    Import {
        /// Preset JSON file to import
        file: PathBuf,
        /// Name for the preset
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a preset
    Show {
        /// Preset ID
        id: String,
    },

    /// Delete a preset
    Delete {
        /// Preset ID
        id: String,
    },

    /// Use a specific preset to convert a CSV
    Use {
        /// Preset ID
        id: String,
        /// Input CSV file
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            preset,
            template,
            no_cache,
            no_save,
            strict,
            out,
        } => {
            let options = PipelineOptions {
                preset_path: preset.map(|p| p.to_string_lossy().into_owned()),
                preset_id: template,
                convert: out.convert_options(),
                no_cache,
                no_save,
                strict_columns: strict,
                ..Default::default()
            };
            cmd_convert(&input, options, &out)
        }

        Commands::Apply { input, preset, out } => cmd_apply(&input, &preset, &out),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::InitPreset { input, output } => cmd_init_preset(&input, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Preset { action } => cmd_preset(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_convert(input: &Path, options: PipelineOptions, out: &OutputArgs) -> CliResult {
    eprintln!("📄 Processing: {}", input.display());

    let report = convert_csv(input, options)?;
    print_report(&report);

    write_json(&report.output, out)?;
    eprintln!("\n✨ Done!");
    Ok(())
}

fn print_report(report: &PipelineReport) {
    eprintln!("   Encoding: {}", report.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(report.csv_info.delimiter));
    eprintln!("   Rows: {}", report.csv_info.row_count);
    if let Some(ref id) = report.preset_id {
        eprintln!("   Preset: {}", id);
    }

    eprintln!("\n⚙️  Converted: {} records", report.converted);
    if !report.suppressed.is_empty() {
        eprintln!("   ⚠️  {} rows produced empty records", report.suppressed.len());
    }
    if !report.missing_columns.is_empty() {
        eprintln!("   ⚠️  Missing columns: {}", report.missing_columns.join(", "));
    }
}

fn cmd_apply(input: &Path, preset_path: &Path, out: &OutputArgs) -> CliResult {
    eprintln!("📄 Applying {} to {}", preset_path.display(), input.display());

    let preset = MappingPreset::from_json(&fs::read_to_string(preset_path)?)?;
    let rows = match serde_json::from_str::<Value>(&fs::read_to_string(input)?)? {
        Value::Array(rows) => rows,
        single @ Value::Object(_) => vec![single],
        _ => return Err("Input must be a JSON array of objects".into()),
    };

    let batch = run_json_rows(&rows, &preset, out.convert_options());
    eprintln!("   {}", batch.summary());
    for err in batch.errors.iter().take(5) {
        eprintln!("   ❌ {}", err);
    }

    write_json(&batch.into_json(!out.single), out)
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} rows", result.rows.len());

    let rows: Vec<Value> = result.rows.iter().map(|row| row_to_json(row, &result.headers)).collect();
    write_output(&serde_json::to_string_pretty(&rows)?, output)
}

fn cmd_init_preset(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("🗺️  Building preset for: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    let preset = MappingPreset::from_headers(&result.headers);
    eprintln!("   {} columns mapped", preset.mapping.len());

    write_output(&preset.to_json()?, output)
}

async fn cmd_serve(port: u16) -> CliResult {
    sheetmap::server::start_server(port).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_json<T: Serialize>(value: &T, out: &OutputArgs) -> CliResult {
    let json = if out.compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    write_output(&json, out.output.as_deref())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_preset(action: PresetAction) -> CliResult {
    let mut registry = PresetRegistry::new();

    match action {
        PresetAction::List => {
            let presets = registry.list();
            if presets.is_empty() {
                eprintln!("📋 No presets stored yet.");
                eprintln!("   Use 'sheetmap preset import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored presets ({}):\n", presets.len());
            for p in presets {
                println!("  📄 {} ({})", p.name, p.id);
                println!("     Columns: {}", p.csv_columns.join(", "));
                println!("     Uses: {}", p.use_count);
                if let Some(ref last) = p.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        PresetAction::Import { file, name } => {
            eprintln!("📥 Importing preset from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Preset saved with ID: {}", id);
        }

        PresetAction::Show { id } => {
            let p = registry
                .get(&id)
                .ok_or_else(|| format!("Preset not found: {}", id))?;
            println!("📄 Preset: {} ({})\n", p.name, p.id);
            println!("Columns: {}", p.csv_columns.join(", "));
            println!("Created: {}", p.created_at);
            println!("Uses: {}", p.use_count);
            println!("\nPreset:");
            println!("{}", p.preset.to_json()?);
        }

        PresetAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Preset deleted: {}", id);
        }

        PresetAction::Use { id, input, out } => {
            let options = PipelineOptions {
                preset_id: Some(id),
                convert: out.convert_options(),
                ..Default::default()
            };
            cmd_convert(&input, options, &out)?;
        }
    }

    Ok(())
}
