//! Assembles the row-aligned regression table shared by the h2 and rg flows.

use std::path::Path;

use anyhow::Result;
use ndarray::Array2;
use polars::prelude::*;

use crate::df_utils::{column_names, extract_f64_column};
use crate::error::LdscError;
use crate::ldsc::LdscConfig;
use crate::logging::LogSink;
use crate::matrix::columns_to_array2;
use crate::merge::{SNP_COL, merge_with_logging};
use crate::parse::{read_category_totals, read_ld_scores, read_sumstats};
use crate::qc::{check_condition_number, check_equal_length, nonconstant_columns, warn_length};

pub const WEIGHT_COL: &str = "LD_weights";

/// Merged table plus the column layout every later stage relies on.
#[derive(Debug, Clone)]
pub struct AssembledInputs {
    pub df: DataFrame,
    /// Category LD Score columns, in the order of `m_annot`.
    pub categories: Vec<String>,
    pub weight_column: String,
    /// SNP totals per retained category.
    pub m_annot: Vec<f64>,
    /// Positions of the retained categories among those read from disk.
    pub retained: Vec<usize>,
}

impl AssembledInputs {
    pub fn n_snps(&self) -> usize {
        self.df.height()
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        extract_f64_column(&self.df, name)
    }

    pub fn ld_matrix(&self) -> Result<Array2<f64>> {
        self.ld_matrix_of(&self.df)
    }

    /// SNP-by-category LD Score matrix of any table carrying these categories.
    pub fn ld_matrix_of(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let columns = self
            .categories
            .iter()
            .map(|name| extract_f64_column(df, name))
            .collect::<Result<Vec<_>>>()?;
        columns_to_array2(&columns)
    }

    pub fn weights_of(&self, df: &DataFrame) -> Result<Vec<f64>> {
        extract_f64_column(df, &self.weight_column)
    }
}

/// Reads and merges summary statistics, reference LD Scores, category totals
/// and regression weights, then checks that the LD Score matrix can be
/// regressed on.
pub fn assemble(
    sumstats_path: &Path,
    config: &LdscConfig,
    require_alleles: bool,
    keep_missing: bool,
    log: &mut LogSink,
) -> Result<AssembledInputs> {
    let sumstats = read_sumstats(
        sumstats_path,
        require_alleles,
        keep_missing,
        config.no_check,
        log,
    )?;

    let ref_source = config.ref_ld_source()?;
    let ref_ld = read_ld_scores(&ref_source, "reference panel LD Score", log)?;
    log.log_line(&format!(
        "Read reference panel LD Scores for {} SNPs.",
        ref_ld.height()
    ))?;
    let read_categories: Vec<String> = column_names(&ref_ld)
        .into_iter()
        .filter(|c| c != SNP_COL)
        .collect();

    let m_all = resolve_category_totals(config, read_categories.len())?;

    let df = merge_with_logging(&ref_ld, &sumstats, "reference panel LD", log)?;

    let category_values = read_categories
        .iter()
        .map(|name| extract_f64_column(&df, name))
        .collect::<Result<Vec<_>>>()?;
    let retained = nonconstant_columns(&category_values)?;
    let mut df = df;
    if retained.len() < read_categories.len() {
        let removed: Vec<&str> = (0..read_categories.len())
            .filter(|i| !retained.contains(i))
            .map(|i| read_categories[i].as_str())
            .collect();
        for name in &removed {
            df.drop_in_place(name)?;
        }
        log.log_line(&format!(
            "Removing partitioned LD Scores with zero variance: {}",
            removed.join(", ")
        ))?;
    }
    let categories: Vec<String> = retained.iter().map(|&i| read_categories[i].clone()).collect();
    let m_annot: Vec<f64> = retained.iter().map(|&i| m_all[i]).collect();

    let w_ld = read_weight_ld(config, log)?;
    let df = merge_with_logging(&df, &w_ld, "regression SNP LD", log)?;

    let inputs = AssembledInputs {
        df,
        categories,
        weight_column: WEIGHT_COL.to_string(),
        m_annot,
        retained,
    };
    check_condition_number(&inputs.ld_matrix()?, config.invert_anyway, log)?;
    warn_length(inputs.n_snps(), log)?;
    Ok(inputs)
}

/// Category totals from `--M` when given, otherwise from the M files next to
/// the reference LD Scores.
pub fn resolve_category_totals(config: &LdscConfig, n_categories: usize) -> Result<Vec<f64>> {
    let m = match config.m.as_deref() {
        Some(raw) => raw
            .split(',')
            .map(|v| {
                v.trim().parse::<f64>().map_err(|_| {
                    LdscError::Configuration(format!("could not cast --M value {v:?} to float"))
                })
            })
            .collect::<std::result::Result<Vec<f64>, _>>()?,
        None => read_category_totals(&config.ref_ld_source()?, !config.not_m_5_50)?,
    };
    let source = if config.m.is_some() { "--M" } else { "the M files" };
    check_equal_length(
        m.len(),
        n_categories,
        source,
        "the reference panel LD Scores",
    )?;
    Ok(m)
}

fn read_weight_ld(config: &LdscConfig, log: &mut LogSink) -> Result<DataFrame> {
    let source = config.w_ld_source()?;
    let mut w_ld = read_ld_scores(&source, "regression weight LD Score", log)?;
    let numeric: Vec<String> = column_names(&w_ld)
        .into_iter()
        .filter(|c| c != SNP_COL)
        .collect();
    if numeric.len() != 1 {
        return Err(LdscError::Configuration(format!(
            "regression weight LD Scores must have exactly one LD Score column, found {}",
            numeric.len()
        ))
        .into());
    }
    w_ld.rename(&numeric[0], WEIGHT_COL.into())?;
    log.log_line(&format!(
        "Read regression weight LD Scores for {} SNPs.",
        w_ld.height()
    ))?;
    Ok(w_ld)
}
