use std::borrow::Cow;

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::error::LdscError;
use crate::logging::LogSink;

pub fn ensure_utf8(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::String
        {
            let mut casted = series.cast(&DataType::String)?;
            casted.rename((*col).into());
            df.with_column::<Column>(casted.into())?;
        }
    }
    Ok(df)
}

pub fn ensure_f64(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::Float64
        {
            let mut casted = series.cast(&DataType::Float64)?;
            casted.rename((*col).into());
            df.with_column::<Column>(casted.into())?;
        }
    }
    Ok(df)
}

pub fn uppercase_alleles(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && let Ok(utf8) = series.str()
        {
            let mut upper = utf8
                .apply(|v| v.map(|s| Cow::Owned(s.to_ascii_uppercase())))
                .into_series();
            upper.rename((*col).into());
            df.with_column::<Column>(upper.into())?;
        }
    }
    Ok(df)
}

pub fn drop_cols_if_present(df: &mut DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        if df.column(name).is_ok() {
            df.drop_in_place(name)?;
        }
    }
    Ok(())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Non-missing, non-NaN mask over a float column.
pub fn present_mask(df: &DataFrame, col: &str) -> Result<BooleanChunked> {
    let values = df.column(col)?.f64().context(col.to_string())?;
    Ok(values
        .into_iter()
        .map(|v| v.is_some_and(|x| !x.is_nan()))
        .collect())
}

/// Keeps the rows selected by `mask` and logs `{N} SNPs with {what}.`
///
/// An empty selection is an error naming the filter that emptied the table.
pub fn select_and_log(
    df: DataFrame,
    mask: &BooleanChunked,
    what: &str,
    log: &mut LogSink,
) -> Result<DataFrame> {
    let kept = mask.iter().filter(|v| matches!(v, Some(true))).count();
    if kept == 0 {
        return Err(LdscError::EmptyMerge {
            step: format!("keeping SNPs with {what}"),
        }
        .into());
    }
    let df = df.filter(mask)?;
    log.log_line(&format!("{kept} SNPs with {what}."))?;
    Ok(df)
}

pub fn extract_f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .f64()
        .with_context(|| format!("{name} is not numeric"))?;
    Ok(series.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

pub fn extract_string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)?
        .str()
        .with_context(|| format!("{name} is not text"))?;
    Ok(series
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}
