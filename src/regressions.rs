//! Block-jackknife LD Score regression.
//!
//! `RegressionEstimator` is the seam between the orchestrators and the
//! numerics; `JackknifeEstimator` is the weighted least squares
//! implementation used by the binary.

use anyhow::{Context, Result};
use ndarray::Array2;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::LdscError;
use crate::matrix::{covariance, diag_sqrt, quadratic_form, scale_matrix, solve_linear};
use crate::types::{Gencov, Hsq, Matrix, RgEstimate};

/// Inputs for a one-phenotype fit. Vectors have one entry per SNP and `ld`
/// has one row per SNP and one column per category.
#[derive(Debug, Clone)]
pub struct HeritabilityInput {
    pub chisq: Vec<f64>,
    pub ld: Array2<f64>,
    pub weights: Vec<f64>,
    pub n: Vec<f64>,
    pub m: Vec<f64>,
    pub n_blocks: usize,
    pub intercept: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CorrelationInput {
    pub z1: Vec<f64>,
    pub z2: Vec<f64>,
    pub ld: Array2<f64>,
    pub weights: Vec<f64>,
    pub n1: Vec<f64>,
    pub n2: Vec<f64>,
    pub m: Vec<f64>,
    pub n_blocks: usize,
    /// Fixed intercepts for the first h2, the second h2 and the genetic
    /// covariance, in that order.
    pub intercepts: [Option<f64>; 3],
}

pub trait RegressionEstimator {
    fn fit_heritability(&self, input: &HeritabilityInput) -> Result<Hsq>;
    fn fit_genetic_correlation(&self, input: &CorrelationInput) -> Result<RgEstimate>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JackknifeEstimator;

impl RegressionEstimator for JackknifeEstimator {
    fn fit_heritability(&self, input: &HeritabilityInput) -> Result<Hsq> {
        check_shapes(input.chisq.len(), &input.ld, &input.m, input.n_blocks)?;
        let n_bar = mean(&input.n);
        let x_tot = row_sums(&input.ld);
        let weights = heritability_weights(
            &input.chisq,
            &input.n,
            &x_tot,
            &input.weights,
            input.m.iter().sum(),
            input.intercept.unwrap_or(1.0),
        )?;
        let scale: Vec<f64> = input.n.iter().map(|v| v / n_bar).collect();
        let fit = fit_blocks(
            &input.ld,
            &scale,
            &input.chisq,
            &weights,
            input.n_blocks,
            input.intercept,
        )?;
        let parts = Partitioned::new(&fit, n_bar, &input.m, input.intercept);
        let (prop, prop_cov) = proportions(&parts, &fit, n_bar, &input.m);

        let chi_sq = ChiSquared::new(1.0).context("chi-square")?;
        Ok(Hsq {
            coef: parts.coef,
            coef_se: parts.coef_se,
            coef_cov: parts.coef_cov,
            cat: parts.cat,
            cat_se: parts.cat_se,
            cat_cov: parts.cat_cov,
            tot: parts.tot,
            tot_se: parts.tot_se,
            prop_se: diag_sqrt(&prop_cov),
            prop,
            prop_cov,
            intercept: parts.intercept,
            intercept_se: parts.intercept_se,
            mean_chisq: mean(&input.chisq),
            lambda_gc: median(&input.chisq).map_or(f64::NAN, |m| m / chi_sq.inverse_cdf(0.5)),
            n_bar,
            n_blocks: input.n_blocks,
            tot_delete_values: parts.tot_delete_values,
            delete_values: fit.delete_values,
        })
    }

    fn fit_genetic_correlation(&self, input: &CorrelationInput) -> Result<RgEstimate> {
        let n_snps = input.z1.len();
        check_shapes(n_snps, &input.ld, &input.m, input.n_blocks)?;
        if input.z2.len() != n_snps || input.n2.len() != n_snps {
            return Err(anyhow::anyhow!("phenotype vectors differ in length"));
        }
        let chi1: Vec<f64> = input.z1.iter().map(|z| z * z).collect();
        let chi2: Vec<f64> = input.z2.iter().map(|z| z * z).collect();
        let hsq_input = |chisq: Vec<f64>, n: &[f64], intercept: Option<f64>| HeritabilityInput {
            chisq,
            ld: input.ld.clone(),
            weights: input.weights.clone(),
            n: n.to_vec(),
            m: input.m.clone(),
            n_blocks: input.n_blocks,
            intercept,
        };
        let hsq1 = self.fit_heritability(&hsq_input(chi1.clone(), &input.n1, input.intercepts[0]))?;
        let hsq2 = self.fit_heritability(&hsq_input(chi2.clone(), &input.n2, input.intercepts[1]))?;

        let m_tot: f64 = input.m.iter().sum();
        let x_tot = row_sums(&input.ld);
        let w1 = heritability_weights(&chi1, &input.n1, &x_tot, &input.weights, m_tot, hsq1.intercept)?;
        let w2 = heritability_weights(&chi2, &input.n2, &x_tot, &input.weights, m_tot, hsq2.intercept)?;
        let weights = combine_weights(&w1, &w2);

        let n_geo: Vec<f64> = input
            .n1
            .iter()
            .zip(&input.n2)
            .map(|(a, b)| (a * b).sqrt())
            .collect();
        let n_bar = mean(&n_geo);
        let scale: Vec<f64> = n_geo.iter().map(|v| v / n_bar).collect();
        let z1z2: Vec<f64> = input.z1.iter().zip(&input.z2).map(|(a, b)| a * b).collect();
        let fit = fit_blocks(
            &input.ld,
            &scale,
            &z1z2,
            &weights,
            input.n_blocks,
            input.intercepts[2],
        )?;
        let parts = Partitioned::new(&fit, n_bar, &input.m, input.intercepts[2]);
        let gencov = Gencov {
            coef: parts.coef,
            coef_se: parts.coef_se,
            coef_cov: parts.coef_cov,
            cat: parts.cat,
            cat_se: parts.cat_se,
            cat_cov: parts.cat_cov,
            tot: parts.tot,
            tot_se: parts.tot_se,
            intercept: parts.intercept,
            intercept_se: parts.intercept_se,
            mean_z1z2: mean(&z1z2),
            n_bar,
            n_blocks: input.n_blocks,
            tot_delete_values: parts.tot_delete_values,
            delete_values: fit.delete_values,
        };

        let (rg, rg_se) = genetic_correlation(&hsq1, &hsq2, &gencov);
        let z = rg / rg_se;
        let normal = Normal::new(0.0, 1.0).context("normal distribution")?;
        let p = 2.0 * normal.sf(z.abs());
        Ok(RgEstimate {
            hsq1,
            hsq2,
            gencov,
            rg,
            rg_se,
            z,
            p,
        })
    }
}

fn check_shapes(n_snps: usize, ld: &Array2<f64>, m: &[f64], n_blocks: usize) -> Result<()> {
    if ld.nrows() != n_snps {
        return Err(anyhow::anyhow!(
            "LD Score matrix has {} rows for {n_snps} SNPs",
            ld.nrows()
        ));
    }
    if ld.ncols() != m.len() {
        return Err(LdscError::Configuration(format!(
            "{} LD Score columns but {} category totals",
            ld.ncols(),
            m.len()
        ))
        .into());
    }
    if n_blocks < 2 || n_blocks > n_snps {
        return Err(LdscError::Configuration(format!(
            "need between 2 and {n_snps} jackknife blocks, got {n_blocks}"
        ))
        .into());
    }
    Ok(())
}

/// Heteroskedasticity and over-counting weights from a first-pass aggregate
/// estimate, normalised to sum to one. Returned as square roots, ready to
/// multiply into both sides of the regression.
fn heritability_weights(
    chi: &[f64],
    n: &[f64],
    x_tot: &[f64],
    wld: &[f64],
    m_tot: f64,
    intercept: f64,
) -> Result<Vec<f64>> {
    let mean_chi = mean(chi);
    let mean_xn = mean_product(x_tot, n);
    let mut tot_agg = if mean_xn != 0.0 {
        m_tot * (mean_chi - intercept) / mean_xn
    } else {
        0.0
    };
    if !tot_agg.is_finite() {
        tot_agg = 0.0;
    }
    tot_agg = tot_agg.clamp(0.0, 1.0);

    let mut weights = Vec::with_capacity(chi.len());
    let mut sum_w = 0.0;
    for i in 0..chi.len() {
        let ld = x_tot[i].max(1.0);
        let w_ld = wld[i].max(1.0);
        let c = tot_agg * n[i] / m_tot;
        let het_w = 1.0 / (2.0 * (intercept.max(f64::EPSILON) + c * ld).powi(2));
        let oc_w = 1.0 / w_ld;
        let w = (het_w * oc_w).sqrt();
        sum_w += w;
        weights.push(w);
    }
    if sum_w == 0.0 || !sum_w.is_finite() {
        return Err(anyhow::anyhow!("sum of regression weights is zero"));
    }
    for w in weights.iter_mut() {
        *w /= sum_w;
    }
    Ok(weights)
}

fn combine_weights(w1: &[f64], w2: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = w1.iter().zip(w2).map(|(a, b)| a + b).collect();
    let sum: f64 = out.iter().sum();
    if sum != 0.0 {
        for v in &mut out {
            *v /= sum;
        }
    }
    out
}

/// Full-data and leave-one-block-out regression coefficients.
struct BlockFit {
    reg: Vec<f64>,
    delete_values: Matrix,
    /// Jackknife covariance of `reg`.
    jk_cov: Matrix,
    n_annot: usize,
}

#[allow(clippy::needless_range_loop)]
fn fit_blocks(
    ld: &Array2<f64>,
    scale: &[f64],
    y: &[f64],
    weights: &[f64],
    n_blocks: usize,
    intercept: Option<f64>,
) -> Result<BlockFit> {
    let n_annot = ld.ncols();
    let free_intercept = intercept.is_none();
    let p = n_annot + usize::from(free_intercept);
    let mut xty_blocks = vec![vec![0.0; p]; n_blocks];
    let mut xtx_blocks = vec![vec![vec![0.0; p]; p]; n_blocks];

    let mut x_vals = vec![0.0; p];
    for (b, (start, end)) in block_bounds(y.len(), n_blocks).into_iter().enumerate() {
        for row in start..end {
            let w = weights[row];
            for j in 0..n_annot {
                x_vals[j] = ld[[row, j]] * scale[row] * w;
            }
            if free_intercept {
                x_vals[n_annot] = w;
            }
            let y_w = (y[row] - intercept.unwrap_or(0.0)) * w;
            for i in 0..p {
                xty_blocks[b][i] += x_vals[i] * y_w;
                for j in 0..p {
                    xtx_blocks[b][i][j] += x_vals[i] * x_vals[j];
                }
            }
        }
    }

    let mut xty = vec![0.0; p];
    let mut xtx = vec![vec![0.0; p]; p];
    for b in 0..n_blocks {
        for i in 0..p {
            xty[i] += xty_blocks[b][i];
            for j in 0..p {
                xtx[i][j] += xtx_blocks[b][i][j];
            }
        }
    }
    let reg = solve_linear(&xtx, &xty)?;

    let mut delete_values = vec![vec![0.0; p]; n_blocks];
    for b in 0..n_blocks {
        let mut xty_del = xty.clone();
        let mut xtx_del = xtx.clone();
        for i in 0..p {
            xty_del[i] -= xty_blocks[b][i];
            for j in 0..p {
                xtx_del[i][j] -= xtx_blocks[b][i][j];
            }
        }
        delete_values[b] = solve_linear(&xtx_del, &xty_del)
            .with_context(|| format!("jackknife block {b}"))?;
    }

    let pseudo = jackknife_pseudo(&reg, &delete_values);
    let jk_cov = scale_matrix(&covariance(&pseudo), 1.0 / n_blocks as f64);
    Ok(BlockFit {
        reg,
        delete_values,
        jk_cov,
        n_annot,
    })
}

/// Contiguous blocks of near-equal size covering `0..n_snps`.
fn block_bounds(n_snps: usize, n_blocks: usize) -> Vec<(usize, usize)> {
    (0..n_blocks)
        .map(|b| (b * n_snps / n_blocks, (b + 1) * n_snps / n_blocks))
        .collect()
}

fn jackknife_pseudo(reg: &[f64], delete_values: &[Vec<f64>]) -> Matrix {
    let nb = delete_values.len() as f64;
    delete_values
        .iter()
        .map(|del| {
            reg.iter()
                .zip(del)
                .map(|(r, d)| nb * r - (nb - 1.0) * d)
                .collect()
        })
        .collect()
}

/// Regression slopes translated into per-SNP and per-category quantities.
struct Partitioned {
    coef: Vec<f64>,
    coef_se: Vec<f64>,
    coef_cov: Matrix,
    cat: Vec<f64>,
    cat_se: Vec<f64>,
    cat_cov: Matrix,
    tot: f64,
    tot_se: f64,
    intercept: f64,
    intercept_se: Option<f64>,
    tot_delete_values: Vec<f64>,
}

impl Partitioned {
    fn new(fit: &BlockFit, n_bar: f64, m: &[f64], fixed_intercept: Option<f64>) -> Self {
        let k = fit.n_annot;
        let coef: Vec<f64> = fit.reg[..k].iter().map(|v| v / n_bar).collect();
        let coef_cov: Matrix = (0..k)
            .map(|i| (0..k).map(|j| fit.jk_cov[i][j] / (n_bar * n_bar)).collect())
            .collect();
        let cat: Vec<f64> = coef.iter().zip(m).map(|(c, mi)| c * mi).collect();
        let cat_cov: Matrix = (0..k)
            .map(|i| (0..k).map(|j| coef_cov[i][j] * m[i] * m[j]).collect())
            .collect();
        let tot = cat.iter().sum();
        let tot_se = quadratic_form(&coef_cov, m).max(0.0).sqrt();
        let tot_delete_values = fit
            .delete_values
            .iter()
            .map(|del| del[..k].iter().zip(m).map(|(d, mi)| d * mi / n_bar).sum())
            .collect();
        let (intercept, intercept_se) = match fixed_intercept {
            Some(value) => (value, None),
            None => (fit.reg[k], Some(fit.jk_cov[k][k].max(0.0).sqrt())),
        };
        Self {
            coef_se: diag_sqrt(&coef_cov),
            coef,
            coef_cov,
            cat_se: diag_sqrt(&cat_cov),
            cat,
            cat_cov,
            tot,
            tot_se,
            intercept,
            intercept_se,
            tot_delete_values,
        }
    }
}

/// Proportion of h2 per category with its jackknife covariance.
fn proportions(parts: &Partitioned, fit: &BlockFit, n_bar: f64, m: &[f64]) -> (Vec<f64>, Matrix) {
    let k = fit.n_annot;
    let prop: Vec<f64> = parts.cat.iter().map(|c| c / parts.tot).collect();
    let delete_props: Matrix = fit
        .delete_values
        .iter()
        .zip(&parts.tot_delete_values)
        .map(|(del, tot_del)| (0..k).map(|j| del[j] * m[j] / n_bar / tot_del).collect())
        .collect();
    let pseudo = jackknife_pseudo(&prop, &delete_props);
    let cov = scale_matrix(&covariance(&pseudo), 1.0 / fit.delete_values.len() as f64);
    (prop, cov)
}

/// `rg = gencov / sqrt(h2_1 * h2_2)` with a ratio jackknife standard error.
/// Undefined (NaN) unless both heritabilities are positive.
fn genetic_correlation(hsq1: &Hsq, hsq2: &Hsq, gencov: &Gencov) -> (f64, f64) {
    if hsq1.tot <= 0.0 || hsq2.tot <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let rg = gencov.tot / (hsq1.tot * hsq2.tot).sqrt();
    let delete_rg: Vec<Vec<f64>> = gencov
        .tot_delete_values
        .iter()
        .zip(&hsq1.tot_delete_values)
        .zip(&hsq2.tot_delete_values)
        .map(|((g, h1), h2)| vec![g / (h1 * h2).sqrt()])
        .collect();
    let nb = delete_rg.len() as f64;
    let pseudo = jackknife_pseudo(&[rg], &delete_rg);
    let var = covariance(&pseudo)
        .first()
        .and_then(|row| row.first())
        .copied()
        .unwrap_or(f64::NAN);
    (rg, (var / nb).sqrt())
}

fn row_sums(ld: &Array2<f64>) -> Vec<f64> {
    ld.rows().into_iter().map(|row| row.sum()).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_product(a: &[f64], b: &[f64]) -> f64 {
    let products: Vec<f64> = a.iter().zip(b).map(|(x, y)| x * y).collect();
    mean(&products)
}

fn median(values: &[f64]) -> Option<f64> {
    let mut vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return None;
    }
    vals.sort_by(|a, b| a.total_cmp(b));
    let mid = vals.len() / 2;
    if vals.len() % 2 == 1 {
        Some(vals[mid])
    } else {
        Some((vals[mid - 1] + vals[mid]) / 2.0)
    }
}
