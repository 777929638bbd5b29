use approx::assert_abs_diff_eq;
use ldscore::error::LdscError;
use ldscore::regressions::{
    CorrelationInput, HeritabilityInput, JackknifeEstimator, RegressionEstimator,
};
use ndarray::Array2;

const N_SNPS: usize = 200;
const N: f64 = 10_000.0;

fn single_ld() -> Array2<f64> {
    Array2::from_shape_fn((N_SNPS, 1), |(i, _)| 1.0 + (i % 17) as f64 + 0.1 * i as f64)
}

fn two_category_ld() -> Array2<f64> {
    Array2::from_shape_fn((N_SNPS, 2), |(i, j)| match j {
        0 => 1.0 + (i % 7) as f64,
        _ => 0.5 + 0.3 * (i % 11) as f64 + (i / 50) as f64,
    })
}

/// Noiseless chi^2 = intercept + N * sum_j tau_j * l_j.
fn chisq(ld: &Array2<f64>, taus: &[f64], intercept: f64) -> Vec<f64> {
    ld.rows()
        .into_iter()
        .map(|row| intercept + N * row.iter().zip(taus).map(|(l, t)| l * t).sum::<f64>())
        .collect()
}

fn h2_input(ld: Array2<f64>, chisq: Vec<f64>, m: Vec<f64>) -> HeritabilityInput {
    HeritabilityInput {
        weights: ld.column(0).to_vec(),
        n: vec![N; chisq.len()],
        chisq,
        ld,
        m,
        n_blocks: 10,
        intercept: None,
    }
}

#[test]
fn recovers_heritability_and_intercept() {
    let ld = single_ld();
    let m = 1000.0;
    let chi = chisq(&ld, &[0.3 / m], 1.05);
    let hsq = JackknifeEstimator
        .fit_heritability(&h2_input(ld, chi, vec![m]))
        .expect("fit");

    assert_abs_diff_eq!(hsq.tot, 0.3, epsilon = 1e-8);
    assert_abs_diff_eq!(hsq.intercept, 1.05, epsilon = 1e-8);
    assert!(hsq.tot_se < 1e-6);
    assert!(hsq.intercept_se.expect("free intercept") < 1e-6);
    assert_eq!(hsq.delete_values.len(), 10);
    assert_eq!(hsq.delete_values[0].len(), 2);
    assert_eq!(hsq.n_blocks, 10);
    assert_abs_diff_eq!(hsq.n_bar, N);
}

#[test]
fn partitions_heritability_across_categories() {
    let ld = two_category_ld();
    let m = vec![600.0, 400.0];
    let chi = chisq(&ld, &[1e-4, 5e-5], 1.0);
    let hsq = JackknifeEstimator
        .fit_heritability(&h2_input(ld, chi, m))
        .expect("fit");

    assert_abs_diff_eq!(hsq.coef[0], 1e-4, epsilon = 1e-10);
    assert_abs_diff_eq!(hsq.coef[1], 5e-5, epsilon = 1e-10);
    assert_abs_diff_eq!(hsq.cat[0], 0.06, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.cat[1], 0.02, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.tot, 0.08, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.prop[0], 0.75, epsilon = 1e-6);
    assert_abs_diff_eq!(hsq.prop[1], 0.25, epsilon = 1e-6);
    assert_eq!(hsq.cat_cov.len(), 2);
    assert_eq!(hsq.prop_cov.len(), 2);
}

#[test]
fn fixed_intercept_is_reported_without_error() {
    let ld = single_ld();
    let chi = chisq(&ld, &[2e-4], 1.0);
    let mut input = h2_input(ld, chi, vec![1000.0]);
    input.intercept = Some(1.0);
    let hsq = JackknifeEstimator.fit_heritability(&input).expect("fit");

    assert_eq!(hsq.intercept, 1.0);
    assert!(hsq.intercept_se.is_none());
    assert_abs_diff_eq!(hsq.tot, 0.2, epsilon = 1e-8);
    assert_eq!(hsq.delete_values[0].len(), 1);
}

#[test]
fn block_count_and_totals_are_validated() {
    let ld = single_ld();
    let chi = chisq(&ld, &[2e-4], 1.0);

    let mut input = h2_input(ld.clone(), chi.clone(), vec![1000.0]);
    input.n_blocks = N_SNPS + 1;
    let err = JackknifeEstimator.fit_heritability(&input).expect_err("too many blocks");
    assert!(matches!(
        err.downcast_ref::<LdscError>(),
        Some(LdscError::Configuration(_))
    ));

    let input = h2_input(ld, chi, vec![500.0, 500.0]);
    let err = JackknifeEstimator.fit_heritability(&input).expect_err("two totals");
    assert!(matches!(
        err.downcast_ref::<LdscError>(),
        Some(LdscError::Configuration(_))
    ));
}

fn rg_input(z1: Vec<f64>, z2: Vec<f64>) -> CorrelationInput {
    let ld = single_ld();
    CorrelationInput {
        weights: ld.column(0).to_vec(),
        n1: vec![N; z1.len()],
        n2: vec![N; z2.len()],
        z1,
        z2,
        ld,
        m: vec![1000.0],
        n_blocks: 10,
        intercepts: [None; 3],
    }
}

fn z_scores(chi: &[f64], sign: f64) -> Vec<f64> {
    chi.iter().map(|c| sign * c.sqrt()).collect()
}

#[test]
fn identical_phenotypes_correlate_perfectly() {
    let chi = chisq(&single_ld(), &[3e-4], 1.0);
    let z = z_scores(&chi, 1.0);
    let rg = JackknifeEstimator
        .fit_genetic_correlation(&rg_input(z.clone(), z))
        .expect("rg");

    assert_abs_diff_eq!(rg.hsq1.tot, 0.3, epsilon = 1e-8);
    assert_abs_diff_eq!(rg.gencov.tot, 0.3, epsilon = 1e-8);
    assert_abs_diff_eq!(rg.rg, 1.0, epsilon = 1e-8);
    assert!(rg.rg_se < 1e-6);
}

#[test]
fn flipped_phenotype_correlates_negatively() {
    let chi = chisq(&single_ld(), &[3e-4], 1.0);
    let rg = JackknifeEstimator
        .fit_genetic_correlation(&rg_input(z_scores(&chi, 1.0), z_scores(&chi, -1.0)))
        .expect("rg");

    assert_abs_diff_eq!(rg.gencov.tot, -0.3, epsilon = 1e-8);
    assert_abs_diff_eq!(rg.gencov.intercept, -1.0, epsilon = 1e-8);
    assert_abs_diff_eq!(rg.rg, -1.0, epsilon = 1e-8);
}

#[test]
fn negative_heritability_leaves_rg_undefined() {
    let ld = single_ld();
    let z1 = z_scores(&chisq(&ld, &[3e-4], 1.0), 1.0);
    let z2: Vec<f64> = ld
        .column(0)
        .iter()
        .map(|l| (2.0 - 0.05 * l).sqrt())
        .collect();
    let rg = JackknifeEstimator
        .fit_genetic_correlation(&rg_input(z1, z2))
        .expect("rg");

    assert!(rg.hsq2.tot < 0.0);
    assert!(rg.rg.is_nan());
    assert!(rg.rg_se.is_nan());
}
