//! Human-readable summaries, the enrichment table and matrix dumps.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::io::write_matrix;
use crate::logging::LogSink;
use crate::matrix::{ensure_square, mat_vec_mul, sandwich};
use crate::types::{Gencov, Hsq, Matrix, RgComparison, RgEstimate, RgOutcome};

/// Categories whose SNP share exceeds this cover the whole genome.
pub const WHOLE_GENOME_PROP: f64 = 0.9999;

pub const RULE: &str = "----------------------------";

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn intercept_line(intercept: f64, se: Option<f64>) -> String {
    match se {
        Some(se) => format!("Intercept: {intercept:.4} ({se:.4})"),
        None => format!("Intercept: constrained to {intercept:.4}"),
    }
}

pub fn hsq_summary(hsq: &Hsq, categories: &[String], overlap: bool) -> String {
    let mut out = vec![format!(
        "Total Observed scale h2: {:.4} ({:.4})",
        hsq.tot, hsq.tot_se
    )];
    if categories.len() > 1 || overlap {
        out.push(format!("Categories: {}", categories.join(" ")));
        if !overlap {
            out.push(format!("Observed scale h2: {}", join_values(&hsq.cat)));
            out.push(format!("Observed scale h2 SE: {}", join_values(&hsq.cat_se)));
            out.push(format!("Proportion of h2: {}", join_values(&hsq.prop)));
            out.push(format!("Proportion of h2 std error: {}", join_values(&hsq.prop_se)));
        }
        out.push(format!("Coefficients: {}", join_values(&hsq.coef)));
        out.push(format!("Coefficient SE: {}", join_values(&hsq.coef_se)));
    }
    out.push(format!("Lambda GC: {:.4}", hsq.lambda_gc));
    out.push(format!("Mean Chi^2: {:.4}", hsq.mean_chisq));
    out.push(intercept_line(hsq.intercept, hsq.intercept_se));
    out.push(match hsq.ratio() {
        None => "Ratio: NA (mean chi^2 < 1)".to_string(),
        Some((ratio, _)) if ratio < 0.0 => {
            "Ratio < 0 (usually indicates GC correction).".to_string()
        }
        Some((ratio, Some(se))) => format!("Ratio: {ratio:.4} ({se:.4})"),
        Some((ratio, None)) => format!("Ratio: {ratio:.4}"),
    });
    out.join("\n")
}

pub fn gencov_summary(gencov: &Gencov, categories: &[String]) -> String {
    let mut out = vec![format!(
        "Total Observed scale gencov: {:.4} ({:.4})",
        gencov.tot, gencov.tot_se
    )];
    if categories.len() > 1 {
        out.push(format!("Categories: {}", categories.join(" ")));
        out.push(format!("Observed scale gencov: {}", join_values(&gencov.cat)));
        out.push(format!("Observed scale gencov SE: {}", join_values(&gencov.cat_se)));
    }
    out.push(format!("Mean z1*z2: {:.4}", gencov.mean_z1z2));
    out.push(intercept_line(gencov.intercept, gencov.intercept_se));
    out.join("\n")
}

pub fn rg_summary(rg: &RgEstimate) -> String {
    if !rg.rg.is_finite() {
        return "Genetic Correlation: nan (nan) (h2 out of bounds)\nZ-score: nan (nan) (h2 out of bounds)\nP: nan (nan) (h2 out of bounds)".to_string();
    }
    [
        format!("Genetic Correlation: {:.4} ({:.4})", rg.rg, rg.rg_se),
        format!("Z-score: {:.4}", rg.z),
        format!("P: {:.4e}", rg.p),
    ]
    .join("\n")
}

struct EnrichRow {
    category: String,
    prop_snps: f64,
    prop_h2: f64,
    prop_h2_se: f64,
    enrichment: f64,
    enrichment_se: f64,
    enrichment_p: f64,
    coef: f64,
    coef_se: f64,
}

/// Enrichment of heritability in each category, accounting for categories
/// that share SNPs.
///
/// `overlap` is the category-by-category SNP overlap count and `m_tot` the
/// number of SNPs it was counted over. Entry `(i, j)` is scaled by the total
/// of category `j`, so row `i` holds the share of each category's SNPs that
/// also fall in category `i`. Categories covering the whole genome
/// are left out of the table.
pub fn overlap_output(
    overlap: &Matrix,
    m_annot: &[f64],
    m_tot: f64,
    hsq: &Hsq,
    categories: &[String],
    print_coefficients: bool,
) -> Result<DataFrame> {
    ensure_square(overlap, "overlap matrix")?;
    let k = categories.len();
    if overlap.len() != k || m_annot.len() != k || hsq.prop.len() != k {
        return Err(anyhow::anyhow!(
            "overlap matrix has {} categories but the regression has {k}",
            overlap.len()
        ));
    }
    let fractional: Matrix = overlap
        .iter()
        .map(|row| row.iter().zip(m_annot).map(|(v, m)| v / m).collect())
        .collect();
    let prop_h2 = mat_vec_mul(&fractional, &hsq.prop);
    let prop_h2_var = sandwich(&fractional, &hsq.prop_cov);
    let chi_sq = ChiSquared::new(1.0).context("chi-square")?;

    let rows: Vec<EnrichRow> = (0..k)
        .map(|i| {
            let prop_snps = m_annot[i] / m_tot;
            let prop_h2_se = prop_h2_var[i][i].max(0.0).sqrt();
            let enrichment = prop_h2[i] / prop_snps;
            let enrichment_se = prop_h2_se / prop_snps;
            let stat = ((enrichment - 1.0) / enrichment_se).powi(2);
            EnrichRow {
                category: categories[i].clone(),
                prop_snps,
                prop_h2: prop_h2[i],
                prop_h2_se,
                enrichment,
                enrichment_se,
                enrichment_p: if stat.is_nan() { f64::NAN } else { chi_sq.sf(stat) },
                coef: hsq.coef[i],
                coef_se: hsq.coef_se[i],
            }
        })
        .filter(|row| !(row.prop_snps > WHOLE_GENOME_PROP))
        .collect();
    enrich_rows_to_df(&rows, print_coefficients)
}

fn enrich_rows_to_df(rows: &[EnrichRow], print_coefficients: bool) -> Result<DataFrame> {
    let col = |name: &str, f: fn(&EnrichRow) -> f64| -> Column {
        Series::new(name.into(), rows.iter().map(f).collect::<Vec<f64>>()).into()
    };
    let mut columns: Vec<Column> = vec![
        Series::new(
            "Category".into(),
            rows.iter().map(|r| r.category.clone()).collect::<Vec<_>>(),
        )
        .into(),
        col("Prop._SNPs", |r| r.prop_snps),
        col("Prop._h2", |r| r.prop_h2),
        col("Prop._h2_std_error", |r| r.prop_h2_se),
        col("Enrichment", |r| r.enrichment),
        col("Enrichment_std_error", |r| r.enrichment_se),
        col("Enrichment_p", |r| r.enrichment_p),
    ];
    if print_coefficients {
        columns.push(col("Coefficient", |r| r.coef));
        columns.push(col("Coefficient_std_error", |r| r.coef_se));
        columns.push(col("Coefficient_z-score", |r| r.coef / r.coef_se));
    }
    Ok(DataFrame::new_with_height(rows.len(), columns)?)
}

pub fn print_cov(matrix: &Matrix, path: &Path, log: &mut LogSink) -> Result<()> {
    log.log_line(&format!(
        "Printing covariance matrix of the estimates to {}.",
        path.display()
    ))?;
    write_matrix(matrix, path)
}

pub fn print_delete_values(matrix: &Matrix, path: &Path, log: &mut LogSink) -> Result<()> {
    log.log_line(&format!(
        "Printing block jackknife delete values to {}.",
        path.display()
    ))?;
    write_matrix(matrix, path)
}

/// One row per comparison; failed comparisons show `NA` in every estimate
/// column.
pub fn rg_table(comparisons: &[RgComparison]) -> String {
    let header = ["p1", "p2", "rg", "se", "z", "p"].map(String::from);
    let mut rows: Vec<[String; 6]> = vec![header];
    for c in comparisons {
        let stats = match &c.outcome {
            RgOutcome::Succeeded { rg, se, z, p } => [
                format!("{rg:.4}"),
                format!("{se:.4}"),
                format!("{z:.4}"),
                format!("{p:.4e}"),
            ],
            RgOutcome::Failed(_) => ["NA", "NA", "NA", "NA"].map(String::from),
        };
        let [rg, se, z, p] = stats;
        rows.push([c.p1.clone(), c.p2.clone(), rg, se, z, p]);
    }
    let mut widths = [0usize; 6];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(widths)
                .map(|(cell, w)| format!("{cell:>w$}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
