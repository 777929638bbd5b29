use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::types::Matrix;

const COMPRESSION_SUFFIXES: [&str; 3] = ["", ".gz", ".bz2"];

/// Reads a delimited table. Tab and comma separated files go through the
/// polars CSV reader; anything else is split on runs of whitespace.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = compression_ext(path);
    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path)?;
        return read_table_plain(tmp.path());
    }
    read_table_plain(path)
}

/// Finds `<prefix>`, `<prefix>.gz` or `<prefix>.bz2`, in that order.
pub fn resolve_compressed(prefix: &str) -> Result<PathBuf> {
    for suffix in COMPRESSION_SUFFIXES {
        let candidate = PathBuf::from(format!("{prefix}{suffix}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(anyhow::anyhow!(
        "could not open {prefix}[{}]",
        COMPRESSION_SUFFIXES[1..].join("|")
    ))
}

pub fn open_maybe_compressed(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(match compression_ext(path).as_str() {
        "gz" => Box::new(BufReader::new(GzDecoder::new(file))),
        "bz2" => Box::new(BufReader::new(BzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    })
}

fn compression_ext(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        return read_table_whitespace(BufReader::new(file))
            .with_context(|| format!("read {}", path.display()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .with_ignore_errors(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))?;
    trim_string_columns(df)
}

/// Whitespace tables are typed column by column: a column whose every
/// non-missing token parses as a float becomes `Float64`, otherwise `String`.
/// The `SNP` identifier column is always kept as text.
fn read_table_whitespace<R: Read>(reader: R) -> Result<DataFrame> {
    let mut reader = BufReader::new(reader);
    let mut header_line = String::new();
    reader.read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(anyhow::anyhow!("empty file"));
    }
    let headers: Vec<&str> = header_line.split_whitespace().collect();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        for col in columns.iter_mut() {
            col.push(parts.next().and_then(normalize_missing_token));
        }
    }

    let height = columns.first().map(|c| c.len()).unwrap_or(0);
    let cols: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| typed_series(name, values).into())
        .collect();
    Ok(DataFrame::new_with_height(height, cols)?)
}

fn typed_series(name: &str, values: Vec<Option<String>>) -> Series {
    if name.eq_ignore_ascii_case("SNP") {
        return Series::new(name.into(), values);
    }
    let parsed: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|v| match v {
            Some(token) => token.parse::<f64>().ok().map(Some),
            None => Some(None),
        })
        .collect();
    match parsed {
        Some(numeric) => Series::new(name.into(), numeric),
        None => Series::new(name.into(), values),
    }
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path) -> Result<NamedTempFile> {
    let mut decoder = open_maybe_compressed(path)?;
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)
        .with_context(|| format!("decompress {}", path.display()))?;
    Ok(tmp)
}

fn trim_string_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if let Ok(column) = df.column(&name)
            && column.dtype() == &DataType::String
        {
            let utf8 = column.as_series().context("series")?.str()?;
            let mut trimmed = utf8
                .apply(|v| v.map(|s| Cow::Owned(s.trim().to_string())))
                .into_series();
            trimmed.rename(name.clone().into());
            df.with_column::<Column>(trimmed.into())?;
        }
    }
    Ok(df)
}

fn normalize_missing_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    if trimmed.is_empty() || upper == "NA" || upper == "NAN" || trimmed == "." {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whitespace-separated numeric dump, one matrix row per line.
pub fn write_matrix(matrix: &Matrix, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    for row in matrix {
        let line = row
            .iter()
            .map(|v| format!("{v:.18e}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(file, "{line}")?;
    }
    Ok(())
}

pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut csv = CsvWriter::new(&mut file).with_separator(b'\t');
    let mut df = df.clone();
    csv.finish(&mut df)?;
    Ok(())
}
