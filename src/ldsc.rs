//! Heritability and genetic correlation runs.
//!
//! `estimate_h2` fits one phenotype, optionally partitioned over categories
//! with an enrichment report. `estimate_rg` pairs a fixed first phenotype with
//! each of the others in turn; a failure on one pair is logged and recorded
//! without stopping the batch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::alleles::{flip_combination, is_valid_combination};
use crate::df_utils::{
    drop_cols_if_present, extract_f64_column, extract_string_column, present_mask,
    select_and_log,
};
use crate::error::LdscError;
use crate::inputs::{AssembledInputs, assemble};
use crate::io::write_dataframe;
use crate::logging::LogSink;
use crate::matrix::shrink_matrix;
use crate::merge::{SNP_COL, merge_with_logging};
use crate::parse::{LdSource, read_annotations, read_sumstats};
use crate::qc::{check_condition_number, warn_length};
use crate::regressions::{CorrelationInput, HeritabilityInput, RegressionEstimator};
use crate::report::{
    RULE, gencov_summary, hsq_summary, overlap_output, print_cov, print_delete_values,
    rg_summary, rg_table,
};
use crate::types::{Hsq, RgComparison, RgEstimate, RgOutcome};

pub const DEFAULT_N_BLOCKS: usize = 200;

#[derive(Debug, Clone)]
pub struct LdscConfig {
    pub ref_ld: Option<String>,
    pub ref_ld_chr: Option<String>,
    pub w_ld: Option<String>,
    pub w_ld_chr: Option<String>,
    /// Report enrichment using the overlap between annotation categories.
    pub overlap_annot: bool,
    pub frqfile: Option<String>,
    pub frqfile_chr: Option<String>,
    /// Comma-separated category totals overriding the M files.
    pub m: Option<String>,
    /// Read `.l2.M` instead of `.l2.M_5_50`.
    pub not_m_5_50: bool,
    pub n_blocks: usize,
    /// One value for h2, three for rg (h2 of each phenotype, then gencov).
    pub constrain_intercept: Vec<f64>,
    pub no_check_alleles: bool,
    pub invert_anyway: bool,
    /// Skip duplicate checks on summary statistics and keep the first copy.
    pub no_check: bool,
    pub print_coefficients: bool,
    pub print_cov: bool,
    pub print_delete_vals: bool,
    pub out: String,
}

impl Default for LdscConfig {
    fn default() -> Self {
        Self {
            ref_ld: None,
            ref_ld_chr: None,
            w_ld: None,
            w_ld_chr: None,
            overlap_annot: false,
            frqfile: None,
            frqfile_chr: None,
            m: None,
            not_m_5_50: false,
            n_blocks: DEFAULT_N_BLOCKS,
            constrain_intercept: Vec::new(),
            no_check_alleles: false,
            invert_anyway: false,
            no_check: false,
            print_coefficients: false,
            print_cov: false,
            print_delete_vals: false,
            out: "ldsc".to_string(),
        }
    }
}

impl LdscConfig {
    pub fn ref_ld_source(&self) -> Result<LdSource> {
        LdSource::from_pair(self.ref_ld.as_deref(), self.ref_ld_chr.as_deref(), "ref-ld")
    }

    pub fn w_ld_source(&self) -> Result<LdSource> {
        LdSource::from_pair(self.w_ld.as_deref(), self.w_ld_chr.as_deref(), "w-ld")
    }

    /// Frequency files are optional; setting both forms is an error.
    pub fn frq_source(&self) -> Result<Option<LdSource>> {
        match (&self.frqfile, &self.frqfile_chr) {
            (None, None) => Ok(None),
            (single, per_chr) => {
                LdSource::from_pair(single.as_deref(), per_chr.as_deref(), "frqfile").map(Some)
            }
        }
    }

    pub fn out_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{suffix}", self.out))
    }

    fn validate(&self) -> Result<()> {
        self.ref_ld_source()?;
        self.w_ld_source()?;
        self.frq_source()?;
        if self.n_blocks < 2 {
            return Err(LdscError::Configuration(format!(
                "--n-blocks must be at least 2, got {}",
                self.n_blocks
            ))
            .into());
        }
        Ok(())
    }
}

/// Estimates (partitioned) heritability for one set of summary statistics.
pub fn estimate_h2(
    sumstats: &Path,
    config: &LdscConfig,
    estimator: &dyn RegressionEstimator,
    log: &mut LogSink,
) -> Result<Hsq> {
    config.validate()?;
    if config.constrain_intercept.len() > 1 {
        return Err(LdscError::Configuration(
            "--intercept-h2 takes a single value".into(),
        )
        .into());
    }

    let inputs = assemble(sumstats, config, false, false, log)?;
    let chisq = match inputs.df.column("CHISQ") {
        Ok(_) => inputs.column("CHISQ")?,
        Err(_) => inputs.column("Z")?.iter().map(|z| z * z).collect(),
    };
    let n_snps = inputs.n_snps();
    let hsq = estimator.fit_heritability(&HeritabilityInput {
        chisq,
        ld: inputs.ld_matrix()?,
        weights: inputs.column(&inputs.weight_column)?,
        n: inputs.column("N")?,
        m: inputs.m_annot.clone(),
        n_blocks: config.n_blocks.min(n_snps),
        intercept: config.constrain_intercept.first().copied(),
    })?;

    if config.print_cov {
        print_cov(&hsq.cat_cov, &config.out_path(".cov"), log)?;
    }
    if config.print_delete_vals {
        print_delete_values(&hsq.delete_values, &config.out_path(".delete_k"), log)?;
    }
    if config.overlap_annot {
        write_enrichment(config, &inputs, &hsq, log)?;
    }

    log.log_line(&format!("Total Observed scale h2 over {n_snps} SNPs"))?;
    log.log_line(&hsq_summary(&hsq, &inputs.categories, config.overlap_annot))?;
    Ok(hsq)
}

fn write_enrichment(
    config: &LdscConfig,
    inputs: &AssembledInputs,
    hsq: &Hsq,
    log: &mut LogSink,
) -> Result<()> {
    let source = config.ref_ld_source()?;
    let frq = config.frq_source()?;
    log.log_line(&format!("Reading annot matrix from {} ...", source.describe()))?;
    let (overlap, m_tot) = read_annotations(&source, frq.as_ref()).context("error parsing annot matrix")?;
    if inputs.retained.iter().any(|&i| i >= overlap.len()) {
        return Err(LdscError::Configuration(format!(
            "annotation files have {} categories, fewer than the LD Scores",
            overlap.len()
        ))
        .into());
    }
    let overlap = shrink_matrix(&overlap, &inputs.retained);
    let table = overlap_output(
        &overlap,
        &inputs.m_annot,
        m_tot,
        hsq,
        &inputs.categories,
        config.print_coefficients,
    )?;
    let path = config.out_path(".results");
    write_dataframe(&table, &path)?;
    log.log_line(&format!("Results printed to {}", path.display()))
}

/// Genetic correlation of the first phenotype with each of the others.
///
/// Returns one comparison per additional phenotype, in order. A phenotype
/// that fails is logged and recorded as `RgOutcome::Failed`.
pub fn estimate_rg(
    phenotypes: &[PathBuf],
    config: &LdscConfig,
    estimator: &dyn RegressionEstimator,
    log: &mut LogSink,
) -> Result<Vec<RgComparison>> {
    if phenotypes.len() < 2 {
        return Err(LdscError::Configuration(
            "must specify at least two phenotypes for rg estimation".into(),
        )
        .into());
    }
    let intercepts: [Option<f64>; 3] = match config.constrain_intercept.as_slice() {
        [] => [None; 3],
        [h1, h2, gencov] => [Some(*h1), Some(*h2), Some(*gencov)],
        other => {
            return Err(LdscError::Configuration(format!(
                "rg intercept constraints need three values, got {}",
                other.len()
            ))
            .into());
        }
    };
    config.validate()?;

    let inputs = assemble(&phenotypes[0], config, true, true, log)?;
    let total = phenotypes.len();
    let p1 = phenotypes[0].display().to_string();
    let mut printed_hsq1 = false;
    let mut comparisons = Vec::with_capacity(total - 1);

    for (offset, pheno) in phenotypes[1..].iter().enumerate() {
        let idx = offset + 2;
        log.log_line(&format!(
            "Computing genetic correlation for phenotype {idx}/{total}"
        ))?;
        let pair = PairRun {
            inputs: &inputs,
            config,
            estimator,
            intercepts,
            idx,
            total,
        };
        let outcome = match pair.run(&phenotypes[0], pheno, &mut printed_hsq1, log) {
            Ok(rghat) => RgOutcome::Succeeded {
                rg: rghat.rg,
                se: rghat.rg_se,
                z: rghat.z,
                p: rghat.p,
            },
            Err(err) => {
                log.log_line(&format!(
                    "ERROR computing rg for phenotype {idx}/{total}, from file {}.",
                    pheno.display()
                ))?;
                log.log_line(&format!("{err:?}"))?;
                RgOutcome::Failed(format!("{err:#}"))
            }
        };
        comparisons.push(RgComparison {
            p1: p1.clone(),
            p2: pheno.display().to_string(),
            outcome,
        });
    }

    log.log_line("\nSummary of Genetic Correlation Results")?;
    log.log_line(&format!("{}\n", rg_table(&comparisons)))?;
    Ok(comparisons)
}

struct PairRun<'a> {
    inputs: &'a AssembledInputs,
    config: &'a LdscConfig,
    estimator: &'a dyn RegressionEstimator,
    intercepts: [Option<f64>; 3],
    idx: usize,
    total: usize,
}

impl PairRun<'_> {
    fn run(
        &self,
        first: &Path,
        pheno: &Path,
        printed_hsq1: &mut bool,
        log: &mut LogSink,
    ) -> Result<RgEstimate> {
        let config = self.config;
        let sumstats2 = read_sumstats(pheno, true, true, config.no_check, log)?;
        let merged =
            merge_sumstats_sumstats(&self.inputs.df, sumstats2, config.no_check_alleles, log)?;

        let ld = self.inputs.ld_matrix_of(&merged)?;
        check_condition_number(&ld, config.invert_anyway, log)?;
        warn_length(merged.height(), log)?;

        let rghat = self.estimator.fit_genetic_correlation(&CorrelationInput {
            z1: extract_f64_column(&merged, "Z")?,
            z2: extract_f64_column(&merged, "Z2")?,
            ld,
            weights: self.inputs.weights_of(&merged)?,
            n1: extract_f64_column(&merged, "N")?,
            n2: extract_f64_column(&merged, "N2")?,
            m: self.inputs.m_annot.clone(),
            n_blocks: config.n_blocks.min(merged.height()),
            intercepts: self.intercepts,
        })?;

        self.log_report(&rghat, printed_hsq1, log)?;
        let prefix = format!("{}{}_{}", config.out, file_name(first), file_name(pheno));
        let path = |suffix: &str| PathBuf::from(format!("{prefix}{suffix}"));
        if config.print_cov {
            print_cov(&rghat.hsq1.cat_cov, &path(".hsq1.cov"), log)?;
            print_cov(&rghat.hsq2.cat_cov, &path(".hsq2.cov"), log)?;
            print_cov(&rghat.gencov.cat_cov, &path(".gencov.cov"), log)?;
        }
        if config.print_delete_vals {
            print_delete_values(&rghat.hsq1.delete_values, &path(".hsq1.delete_k"), log)?;
            print_delete_values(&rghat.hsq2.delete_values, &path(".hsq2.delete_k"), log)?;
            print_delete_values(&rghat.gencov.delete_values, &path(".gencov.delete_k"), log)?;
        }
        Ok(rghat)
    }

    fn log_report(&self, rghat: &RgEstimate, printed_hsq1: &mut bool, log: &mut LogSink) -> Result<()> {
        let categories = &self.inputs.categories;
        let overlap = self.config.overlap_annot;
        if !*printed_hsq1 {
            log.log_line(&format!("\nHeritability of phenotype 1\n{RULE}"))?;
            log.log_line(&hsq_summary(&rghat.hsq1, categories, overlap))?;
            *printed_hsq1 = true;
        }
        let title = format!("Heritability of phenotype {}/{}", self.idx, self.total);
        log.log_line(&format!("\n{title}\n{}", "-".repeat(title.len())))?;
        log.log_line(&hsq_summary(&rghat.hsq2, categories, overlap))?;
        log.log_line(&format!("\nGenetic Covariance\n{RULE}"))?;
        log.log_line(&gencov_summary(&rghat.gencov, categories))?;
        log.log_line(&format!("\nGenetic Correlation\n{RULE}"))?;
        log.log_line(&format!("{}\n", rg_summary(rghat)))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Joins a second phenotype onto the first and aligns its Z-scores to the
/// first phenotype's reference allele.
///
/// The second table's `Z`, `N`, `A1` and `A2` become `Z2`, `N2`, `A1x` and
/// `A2x`. Rows missing a Z-score or a sample size in either phenotype are
/// dropped; unless `no_check_alleles`, so are rows whose alleles are not the
/// same valid SNP. `Z2` is negated
/// where the alleles are swapped. Allele columns are removed from the result.
pub fn merge_sumstats_sumstats(
    primary: &DataFrame,
    other: DataFrame,
    no_check_alleles: bool,
    log: &mut LogSink,
) -> Result<DataFrame> {
    let mut other = other.select([SNP_COL, "Z", "N", "A1", "A2"])?;
    for (old, new) in [("Z", "Z2"), ("N", "N2"), ("A1", "A1x"), ("A2", "A2x")] {
        other.rename(old, new.into())?;
    }
    let merged = merge_with_logging(primary, &other, "summary statistics", log)?;

    let mut mask = present_mask(&merged, "Z")?;
    for column in ["Z2", "N", "N2"] {
        mask = &mask & &present_mask(&merged, column)?;
    }
    let merged = select_and_log(merged, &mask, "nonmissing values", log)?;

    let alleles = allele_combinations(&merged)?;
    let (mut merged, alleles) = if no_check_alleles {
        (merged, alleles)
    } else {
        let mask: BooleanChunked = alleles.iter().map(|a| is_valid_combination(a)).collect();
        let kept: Vec<String> = alleles
            .into_iter()
            .zip(mask.iter())
            .filter_map(|(a, keep)| keep.unwrap_or(false).then_some(a))
            .collect();
        (select_and_log(merged, &mask, "valid alleles", log)?, kept)
    };

    let z2 = extract_f64_column(&merged, "Z2")?;
    let aligned = z2
        .into_iter()
        .zip(&alleles)
        .map(|(z, a)| Ok(if flip_combination(a)? { -z } else { z }))
        .collect::<Result<Vec<f64>>>()?;
    merged.with_column::<Column>(Series::new("Z2".into(), aligned).into())?;
    drop_cols_if_present(&mut merged, &["A1", "A2", "A1x", "A2x"])?;
    Ok(merged)
}

fn allele_combinations(df: &DataFrame) -> Result<Vec<String>> {
    let columns = ["A1", "A2", "A1x", "A2x"]
        .into_iter()
        .map(|c| extract_string_column(df, c))
        .collect::<Result<Vec<_>>>()?;
    Ok((0..df.height())
        .map(|i| columns.iter().map(|c| c[i].as_str()).collect::<String>())
        .collect())
}
