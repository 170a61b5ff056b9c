//! Generic CSV reader with encoding and delimiter auto-detection.
//!
//! Turns a sheet into [`Row`]s keyed by normalized headers. No mapping logic
//! here.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Row, Scalar};

/// Header used for columns with a blank title.
pub const UNNAMED_COLUMN: &str = "Unnamed_Column";

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub rows: Vec<Row>,
    /// Column headers, normalized and unique
    pub headers: Vec<String>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => decode_with(encoding_rs::WINDOWS_1252, bytes, encoding)?,
        "windows-1252" | "cp1252" => decode_with(encoding_rs::WINDOWS_1252, bytes, encoding)?,
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => decode_with(enc, bytes, encoding)?,
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    Ok(decoded)
}

fn decode_with(enc: &'static encoding_rs::Encoding, bytes: &[u8], label: &str) -> CsvResult<String> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors && enc == encoding_rs::UTF_8 {
        return Err(CsvError::Decode(label.to_string()));
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when none of `; , \t |` appears.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Trim headers, name blank ones and make duplicates unique.
///
/// ```text
/// ["Name", "", "Name", " "]  →  ["Name", "Unnamed_Column", "Name_2", "Unnamed_Column_2"]
/// ```
pub fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();

    raw.into_iter()
        .map(|header| {
            let trimmed = header.as_ref().trim();
            let base = if trimmed.is_empty() {
                UNNAMED_COLUMN.to_string()
            } else {
                trimmed.to_string()
            };

            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}_{}", base, count)
            }
        })
        .collect()
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use sheetmap::parser::parse_csv_str;
///
/// let (headers, rows) = parse_csv_str("name;age\nAlice;30", ';').unwrap();
/// assert_eq!(headers, vec!["name", "age"]);
/// assert_eq!(rows[0]["age"], "30".into());
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<Row>)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::Parse {
        line: 1,
        message: format!("Unsupported delimiter '{}'", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let raw_headers = reader.headers()?.clone();
    if raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }
    let headers = normalize_headers(raw_headers.iter());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;

        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = match record.get(i) {
                    Some(value) if !value.is_empty() => Scalar::from(value),
                    _ => Scalar::Null,
                };
                (header.clone(), cell)
            })
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let (headers, rows) = parse_csv_str(&content, delimiter)?;

    Ok(ParseResult {
        rows,
        headers,
        encoding,
        delimiter,
    })
}

/// Parse CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("/path/to/orders.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.rows.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}
