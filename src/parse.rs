//! Readers for the LD Score regression input files.
//!
//! LD Score, M and annotation files come either consolidated (one prefix) or
//! split over the 22 autosomes, where `@` in the prefix marks the chromosome
//! number. Several prefixes may be given as a comma-separated list.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::df_utils::{
    column_names, drop_cols_if_present, ensure_f64, ensure_utf8, extract_f64_column,
    extract_string_column, uppercase_alleles,
};
use crate::error::LdscError;
use crate::io::{open_maybe_compressed, read_table, resolve_compressed};
use crate::logging::LogSink;
use crate::merge::{SNP_COL, concat_on_snp};
use crate::schema::resolve_headers;
use crate::types::Matrix;

pub const N_CHROMOSOMES: usize = 22;
pub const CHR_PLACEHOLDER: char = '@';

const LD_DROP_COLS: [&str; 4] = ["CHR", "BP", "CM", "MAF"];
const ANNOT_DROP_COLS: [&str; 4] = ["CHR", "BP", "SNP", "CM"];
const MAF_LOWER: f64 = 0.05;
const MAF_UPPER: f64 = 0.95;

/// Where a family of LD Score style files lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdSource {
    Single(String),
    PerChromosome(String),
}

impl LdSource {
    /// Picks the consolidated or chromosome-split form of an option pair.
    /// Exactly one of the two must be set.
    pub fn from_pair(single: Option<&str>, per_chr: Option<&str>, flag: &str) -> Result<Self> {
        match (single, per_chr) {
            (Some(s), None) => Ok(Self::Single(s.to_string())),
            (None, Some(c)) => Ok(Self::PerChromosome(c.to_string())),
            (Some(_), Some(_)) => Err(LdscError::Configuration(format!(
                "cannot set both --{flag} and --{flag}-chr"
            ))
            .into()),
            (None, None) => Err(LdscError::Configuration(format!(
                "must set either --{flag} or --{flag}-chr"
            ))
            .into()),
        }
    }

    /// Splits a comma-separated list into one source per entry.
    pub fn entries(&self) -> Vec<LdSource> {
        let (raw, chr) = match self {
            Self::Single(s) => (s.as_str(), false),
            Self::PerChromosome(s) => (s.as_str(), true),
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                if chr {
                    Self::PerChromosome(s.to_string())
                } else {
                    Self::Single(s.to_string())
                }
            })
            .collect()
    }

    /// File prefixes of one entry, chromosome 1 through 22 for split sources.
    pub fn prefixes(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::PerChromosome(pattern) => (1..=N_CHROMOSOMES)
                .map(|chr| sub_chr(pattern, chr))
                .collect(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Single(s) => s.clone(),
            Self::PerChromosome(pattern) if pattern.contains(CHR_PLACEHOLDER) => {
                pattern.replace(CHR_PLACEHOLDER, "[1-22]")
            }
            Self::PerChromosome(pattern) => format!("{pattern}[1-22]"),
        }
    }
}

/// Substitutes `chr` for the `@` placeholder, appending it when absent.
pub fn sub_chr(pattern: &str, chr: usize) -> String {
    if pattern.contains(CHR_PLACEHOLDER) {
        pattern.replace(CHR_PLACEHOLDER, &chr.to_string())
    } else {
        format!("{pattern}{chr}")
    }
}

/// Reads `<prefix>.l2.ldscore[.gz|.bz2]` for every entry of `source`.
///
/// Chromosome files are stacked in order. With more than one entry the
/// category columns are concatenated and suffixed `_0`, `_1`, ...; every
/// entry must then list the same SNPs in the same order.
pub fn read_ld_scores(source: &LdSource, noun: &str, log: &mut LogSink) -> Result<DataFrame> {
    log.log_line(&format!("Reading {noun} from {} ...", source.describe()))?;
    let entries = source.entries();
    if entries.is_empty() {
        return Err(LdscError::Configuration(format!("no files given for {noun}")).into());
    }
    let suffix = entries.len() > 1;

    let mut out: Option<DataFrame> = None;
    for (idx, entry) in entries.iter().enumerate() {
        let mut df = read_ld_entry(entry)
            .with_context(|| format!("error parsing {noun}"))?;
        if suffix {
            for name in column_names(&df) {
                if name != SNP_COL {
                    df.rename(&name, format!("{name}_{idx}").into())?;
                }
            }
        }
        out = Some(match out {
            None => df,
            Some(acc) => {
                if extract_string_column(&acc, SNP_COL)? != extract_string_column(&df, SNP_COL)? {
                    return Err(LdscError::Parse(
                        "LD Scores for concatenation must have identical SNP columns".into(),
                    )
                    .into());
                }
                concat_on_snp(&acc, &df)?
            }
        });
    }
    out.ok_or_else(|| anyhow::anyhow!("no LD Scores read for {noun}"))
}

fn read_ld_entry(entry: &LdSource) -> Result<DataFrame> {
    let mut stacked: Option<DataFrame> = None;
    for prefix in entry.prefixes() {
        let path = resolve_compressed(&format!("{prefix}.l2.ldscore"))?;
        let df = read_table(&path)?;
        match stacked.as_mut() {
            None => stacked = Some(df),
            Some(acc) => {
                acc.vstack_mut(&df)
                    .with_context(|| format!("stack {}", path.display()))?;
            }
        }
    }
    let mut df = stacked.ok_or_else(|| anyhow::anyhow!("no LD Score files"))?;
    drop_cols_if_present(&mut df, &LD_DROP_COLS)?;
    if df.column(SNP_COL).is_err() {
        return Err(LdscError::MissingColumn {
            column: SNP_COL.into(),
            source_name: entry.describe(),
        }
        .into());
    }
    let df = ensure_utf8(df, &[SNP_COL])?;
    let numeric: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|c| c != SNP_COL)
        .collect();
    if numeric.is_empty() {
        return Err(LdscError::Parse(format!(
            "{} has no LD Score columns",
            entry.describe()
        ))
        .into());
    }
    let refs: Vec<&str> = numeric.iter().map(String::as_str).collect();
    ensure_f64(df, &refs)
}

/// Sums the per-category SNP counts in `<prefix>.l2.M_5_50` (or `.l2.M`
/// when `common_only` is false) over chromosomes; entries of a comma list
/// are concatenated.
pub fn read_category_totals(source: &LdSource, common_only: bool) -> Result<Vec<f64>> {
    let suffix = if common_only { ".l2.M_5_50" } else { ".l2.M" };
    let mut out = Vec::new();
    for entry in source.entries() {
        let mut sums: Vec<f64> = Vec::new();
        for prefix in entry.prefixes() {
            let path = PathBuf::from(format!("{prefix}{suffix}"));
            let values = read_numeric_row(&path)?;
            if sums.is_empty() {
                sums = values;
            } else if values.len() != sums.len() {
                return Err(LdscError::Parse(format!(
                    "M column count mismatch in {}",
                    path.display()
                ))
                .into());
            } else {
                for (acc, v) in sums.iter_mut().zip(values) {
                    *acc += v;
                }
            }
        }
        out.extend(sums);
    }
    Ok(out)
}

fn read_numeric_row(path: &Path) -> Result<Vec<f64>> {
    let reader = open_maybe_compressed(path)?;
    let mut values = Vec::new();
    for line in reader.lines() {
        let line = line?;
        for token in line.split_whitespace() {
            let v = token.parse::<f64>().map_err(|_| {
                LdscError::Parse(format!("non-numeric value {token:?} in {}", path.display()))
            })?;
            values.push(v);
        }
    }
    Ok(values)
}

/// Builds the category overlap matrix (`XᵀX` of the annotation matrix) and
/// the number of annotated SNPs from `<prefix>.annot[.gz|.bz2]` files.
///
/// With a frequency source, only SNPs with 0.05 < MAF < 0.95 in the matching
/// `<frq>.frq` file are counted. Frequency rows are matched to annotation rows
/// by position.
pub fn read_annotations(source: &LdSource, frq: Option<&LdSource>) -> Result<(Matrix, f64)> {
    let entries = source.entries();
    let chunks: Vec<Vec<String>> = entries.iter().map(LdSource::prefixes).collect();
    let n_chunks = chunks.first().map(Vec::len).unwrap_or(0);
    let frq_prefixes = frq.map(LdSource::prefixes);
    if let Some(fp) = &frq_prefixes
        && fp.len() != n_chunks
    {
        return Err(LdscError::Configuration(
            "--frqfile and --frqfile-chr must be split the same way as the annotations".into(),
        )
        .into());
    }

    let mut overlap: Matrix = Vec::new();
    let mut m_tot = 0.0;
    for chunk in 0..n_chunks {
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for prefixes in &chunks {
            let path = resolve_compressed(&format!("{}.annot", prefixes[chunk]))?;
            let mut df = read_table(&path)?;
            drop_cols_if_present(&mut df, &ANNOT_DROP_COLS)?;
            for name in column_names(&df) {
                let df = ensure_f64(df.select([name.as_str()])?, &[name.as_str()])?;
                columns.push(
                    extract_f64_column(&df, &name)?
                        .into_iter()
                        .map(|v| if v.is_nan() { 0.0 } else { v })
                        .collect(),
                );
            }
        }
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        if columns.iter().any(|c| c.len() != rows) {
            return Err(LdscError::Parse(
                "annotation files for one chromosome have different lengths".into(),
            )
            .into());
        }

        let keep = match &frq_prefixes {
            Some(fp) => {
                let mask = read_common_mask(&fp[chunk])?;
                if mask.len() != rows {
                    return Err(LdscError::Parse(format!(
                        "{}.frq has {} rows but the annotation has {rows}",
                        fp[chunk],
                        mask.len()
                    ))
                    .into());
                }
                mask
            }
            None => vec![true; rows],
        };
        let columns: Vec<Vec<f64>> = columns
            .into_iter()
            .map(|c| {
                c.into_iter()
                    .zip(&keep)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect()
            })
            .collect();

        if overlap.is_empty() {
            overlap = vec![vec![0.0; columns.len()]; columns.len()];
        } else if overlap.len() != columns.len() {
            return Err(LdscError::Parse(
                "annotation files disagree on the number of categories".into(),
            )
            .into());
        }
        add_cross_product(&mut overlap, &columns);
        m_tot += keep.iter().filter(|k| **k).count() as f64;
    }
    Ok((overlap, m_tot))
}

fn read_common_mask(prefix: &str) -> Result<Vec<bool>> {
    let path = resolve_compressed(&format!("{prefix}.frq"))?;
    let df = read_table(&path)?;
    let name = ["FRQ", "MAF"]
        .into_iter()
        .find(|c| df.column(c).is_ok())
        .ok_or_else(|| LdscError::MissingColumn {
            column: "FRQ".into(),
            source_name: path.display().to_string(),
        })?;
    let df = ensure_f64(df, &[name])?;
    Ok(extract_f64_column(&df, name)?
        .into_iter()
        .map(|f| f > MAF_LOWER && f < MAF_UPPER)
        .collect())
}

#[allow(clippy::needless_range_loop)]
fn add_cross_product(acc: &mut Matrix, columns: &[Vec<f64>]) {
    let n = columns.len();
    for i in 0..n {
        for j in 0..n {
            let sum: f64 = columns[i]
                .iter()
                .zip(&columns[j])
                .map(|(a, b)| a * b)
                .sum();
            acc[i][j] += sum;
        }
    }
}

/// Reads a summary-statistics file down to `SNP`, `N`, `Z` and/or `CHISQ`
/// and, when present, `A1` and `A2`.
///
/// Rows with any missing value are dropped unless `keep_missing`. Duplicated
/// SNP identifiers are an error unless `skip_checks`, in which case the first
/// occurrence is kept.
pub fn read_sumstats(
    path: &Path,
    require_alleles: bool,
    keep_missing: bool,
    skip_checks: bool,
    log: &mut LogSink,
) -> Result<DataFrame> {
    let source_name = path.display().to_string();
    log.log_line(&format!("Reading summary statistics from {source_name} ..."))?;
    let mut df = read_table(path).with_context(|| format!("read {source_name}"))?;

    let headers = column_names(&df);
    let resolved = resolve_headers(&headers, &source_name)?;
    for (old, new) in headers.iter().zip(&resolved.headers) {
        if old != new {
            df.rename(old, new.as_str().into())?;
        }
    }
    for line in &resolved.info {
        log.log_line(line)?;
    }

    let has = |df: &DataFrame, c: &str| df.column(c).is_ok();
    let missing = |column: &str| LdscError::MissingColumn {
        column: column.into(),
        source_name: source_name.clone(),
    };
    for required in [SNP_COL, "N"] {
        if !has(&df, required) {
            return Err(missing(required).into());
        }
    }
    if require_alleles {
        for required in ["A1", "A2", "Z"] {
            if !has(&df, required) {
                return Err(missing(required).into());
            }
        }
    } else if !has(&df, "Z") && !has(&df, "CHISQ") {
        return Err(missing("Z").into());
    }

    let keep: Vec<&str> = [SNP_COL, "N", "Z", "CHISQ", "A1", "A2"]
        .into_iter()
        .filter(|c| has(&df, c))
        .collect();
    let df = df.select(keep.iter().copied())?;
    let df = ensure_utf8(df, &[SNP_COL, "A1", "A2"])?;
    let df = uppercase_alleles(df, &["A1", "A2"])?;
    let mut df = ensure_f64(df, &["N", "Z", "CHISQ"])?;

    if !keep_missing {
        let mut mask = BooleanChunked::full("keep".into(), true, df.height());
        for name in &keep {
            let column = df.column(name)?;
            let present: BooleanChunked = match column.dtype() {
                DataType::Float64 => column
                    .f64()?
                    .into_iter()
                    .map(|v| v.is_some_and(|x| !x.is_nan()))
                    .collect(),
                _ => column.as_materialized_series().is_not_null(),
            };
            mask = &mask & &present;
        }
        df = df.filter(&mask)?;
    }

    log.log_line(&format!("Read summary statistics for {} SNPs.", df.height()))?;

    let ids = extract_string_column(&df, SNP_COL)?;
    let mut seen = HashSet::with_capacity(ids.len());
    let first: BooleanChunked = ids.iter().map(|id| seen.insert(id.as_str())).collect();
    let dropped = ids.len() - seen.len();
    if dropped > 0 {
        if !skip_checks {
            return Err(LdscError::Parse(format!(
                "{source_name} contains {dropped} duplicated rs numbers"
            ))
            .into());
        }
        df = df.filter(&first)?;
        log.log_line(&format!(
            "Dropped {dropped} SNPs with duplicated rs numbers."
        ))?;
    }
    Ok(df)
}
