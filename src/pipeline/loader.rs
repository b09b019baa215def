//! Dataset loading and saving for CSV and Parquet files

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Text encoding a CSV file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

impl std::fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceEncoding::Utf8 => write!(f, "UTF-8"),
            SourceEncoding::Latin1 => write!(f, "ISO-8859-1"),
        }
    }
}

/// Decode raw CSV bytes, falling back to ISO-8859-1 when they are not valid UTF-8
pub fn decode_csv_bytes(bytes: Vec<u8>) -> (Vec<u8>, SourceEncoding) {
    match String::from_utf8(bytes) {
        Ok(text) => (text.into_bytes(), SourceEncoding::Utf8),
        Err(err) => {
            // encoding_rs maps the ISO-8859-1 label to windows-1252, a superset
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
            (text.into_owned().into_bytes(), SourceEncoding::Latin1)
        }
    }
}

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let (df, encoding) = load_dataset_with_encoding(path, infer_schema_length)?;
    if encoding == SourceEncoding::Latin1 {
        tracing::warn!(
            path = %path.display(),
            "UTF-8 decoding failed, read as ISO-8859-1"
        );
    }
    Ok(df)
}

/// Load a dataset and report which encoding the CSV text was decoded with
pub fn load_dataset_with_encoding(
    path: &Path,
    infer_schema_length: usize,
) -> Result<(DataFrame, SourceEncoding)> {
    let extension = extension_of(path);

    match extension.as_str() {
        "csv" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
            let (utf8, encoding) = decode_csv_bytes(bytes);
            let df = read_csv_bytes(utf8, infer_schema_length)
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?;
            tracing::debug!(path = %path.display(), rows = df.height(), %encoding, "loaded CSV");
            Ok((df, encoding))
        }
        "parquet" => {
            let df = LazyFrame::scan_parquet(path, Default::default())
                .and_then(|lf| lf.collect())
                .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?;
            Ok((df, SourceEncoding::Utf8))
        }
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    }
}

fn read_csv_bytes(bytes: Vec<u8>, infer_schema_length: usize) -> PolarsResult<DataFrame> {
    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(schema_length)
        .map_parse_options(|opts| {
            opts.with_null_values(Some(NullValues::AllColumnsSingle("NA".into())))
        })
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
}

/// Save dataset to file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let extension = extension_of(path);

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Fail with the list of columns that are absent from the DataFrame
pub fn require_columns(df: &DataFrame, columns: &[String], what: &str) -> Result<()> {
    let missing: Vec<&String> = columns
        .iter()
        .filter(|c| df.column(c.as_str()).is_err())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("{} is missing required column(s): {:?}", what, missing);
    }
    Ok(())
}

/// Column values as floats.
///
/// String columns are accepted when every non-empty value parses as a number;
/// a short schema inference window types a column whose first values are
/// missing as `str`.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;

    if column.dtype() == &DataType::String {
        let mut values = Vec::with_capacity(column.len());
        for value in column.str()?.into_iter() {
            match value.map(str::trim).filter(|s| !s.is_empty()) {
                None => values.push(None),
                Some(s) => match s.parse::<f64>() {
                    Ok(v) => values.push(Some(v)),
                    Err(_) => anyhow::bail!(
                        "Column '{}' must be numeric, found value '{}'",
                        name,
                        s
                    ),
                },
            }
        }
        return Ok(values);
    }

    if !column.dtype().is_primitive_numeric() && column.dtype() != &DataType::Boolean {
        anyhow::bail!(
            "Column '{}' must be numeric, found {}",
            name,
            column.dtype()
        );
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Integer survey codes; integral floats and numeric strings are accepted,
/// anything else becomes missing
pub fn column_codes(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;

    let codes = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_code))
            .collect(),
        dt if dt.is_primitive_numeric() => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().map(|v| v.and_then(float_code)).collect()
        }
        _ => {
            let cast = column.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.and_then(parse_code))
                .collect()
        }
    };

    Ok(codes)
}

fn float_code(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

fn parse_code(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(float_code))
}

/// Column values as grouping keys
pub fn column_keys(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;

    let keys = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Float32 | DataType::Float64 => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(format_key))
                .collect()
        }
        _ => {
            let cast = column.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(keys)
}

fn format_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_passthrough() {
        let (bytes, encoding) = decode_csv_bytes("economy\nCôte d'Ivoire\n".as_bytes().to_vec());
        assert_eq!(encoding, SourceEncoding::Utf8);
        assert_eq!(String::from_utf8(bytes).unwrap(), "economy\nCôte d'Ivoire\n");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "Côte" with ô encoded as a single ISO-8859-1 byte
        let raw = vec![b'C', 0xF4, b't', b'e'];
        let (bytes, encoding) = decode_csv_bytes(raw);
        assert_eq!(encoding, SourceEncoding::Latin1);
        assert_eq!(String::from_utf8(bytes).unwrap(), "Côte");
    }

    #[test]
    fn test_column_codes_from_floats_and_strings() {
        let df = df! {
            "f" => [Some(1.0f64), Some(2.5), None, Some(3.0)],
            "s" => [Some("1"), Some(" 2 "), Some("x"), None],
        }
        .unwrap();
        assert_eq!(
            column_codes(&df, "f").unwrap(),
            vec![Some(1), None, None, Some(3)]
        );
        assert_eq!(
            column_codes(&df, "s").unwrap(),
            vec![Some(1), Some(2), None, None]
        );
    }

    #[test]
    fn test_column_keys_render_integral_floats() {
        let df = df! { "year" => [2017.0f64, 2021.0] }.unwrap();
        assert_eq!(
            column_keys(&df, "year").unwrap(),
            vec![Some("2017".to_string()), Some("2021".to_string())]
        );
    }

    #[test]
    fn test_column_f64_rejects_strings() {
        let df = df! { "name" => ["a", "b"] }.unwrap();
        assert!(column_f64(&df, "name").is_err());
    }

    #[test]
    fn test_column_f64_parses_numeric_strings() {
        let df = df! { "x" => [None, Some(""), Some("1"), Some(" 0.5 ")] }.unwrap();
        assert_eq!(
            column_f64(&df, "x").unwrap(),
            vec![None, None, Some(1.0), Some(0.5)]
        );
    }

    #[test]
    fn test_require_columns_lists_missing() {
        let df = df! { "a" => [1i32] }.unwrap();
        let err = require_columns(&df, &["a".to_string(), "b".to_string()], "Input")
            .unwrap_err()
            .to_string();
        assert!(err.contains("\"b\""));
    }
}
