mod common;

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use ldscore::error::LdscError;
use ldscore::ldsc::{LdscConfig, estimate_h2};
use ldscore::logging::LogSink;
use ldscore::regressions::JackknifeEstimator;
use tempfile::tempdir;

use common::{config, write_file, write_ld_scores, write_m};

const N_SNPS: usize = 300;
const N: f64 = 10_000.0;

fn base_ld(i: usize) -> f64 {
    1.0 + (i % 7) as f64
}

fn coding_ld(i: usize) -> f64 {
    0.5 + 0.3 * (i % 11) as f64 + (i / 50) as f64
}

/// Writes a partitioned fixture: LD Scores for `base` and `coding` (plus a
/// constant `flat` category when asked), matching M and annot files, and
/// noiseless summary statistics with `h2 = 0.03` in each real category.
fn write_partitioned(dir: &Path, with_flat: bool) -> (PathBuf, LdscConfig) {
    let snps: Vec<String> = (0..N_SNPS).map(|i| format!("rs{i}")).collect();
    let ld_values: Vec<Vec<f64>> = (0..N_SNPS)
        .map(|i| match with_flat {
            true => vec![base_ld(i), 2.0, coding_ld(i)],
            false => vec![base_ld(i), coding_ld(i)],
        })
        .collect();
    let ld_rows: Vec<(&str, &[f64])> = snps
        .iter()
        .zip(&ld_values)
        .map(|(s, v)| (s.as_str(), v.as_slice()))
        .collect();
    let (names, totals): (&[&str], &[f64]) = match with_flat {
        true => (&["base", "flat", "coding"], &[300.0, 100.0, 60.0]),
        false => (&["base", "coding"], &[300.0, 60.0]),
    };
    let ref_ld = write_ld_scores(dir, "ref", names, &ld_rows);
    write_m(&ref_ld, totals);
    let weight_rows: Vec<(&str, &[f64])> = snps
        .iter()
        .zip(&ld_values)
        .map(|(s, v)| (s.as_str(), &v[..1]))
        .collect();
    let w_ld = write_ld_scores(dir, "w", &["L2"], &weight_rows);

    let mut annot = format!("CHR\tBP\tSNP\tCM\t{}\n", names.join("\t"));
    for (i, snp) in snps.iter().enumerate() {
        let coding = u8::from(i % 5 == 0);
        let flat = if with_flat {
            format!("{}\t", u8::from(i % 3 == 0))
        } else {
            String::new()
        };
        annot.push_str(&format!(
            "1\t{}\t{snp}\t0\t1\t{flat}{coding}\n",
            100 * (i + 1)
        ));
    }
    write_file(dir, "ref.annot", &annot);

    let (tau_base, tau_coding) = (1e-4, 5e-4);
    let mut sumstats = String::from("SNP A1 A2 N Z\n");
    for (i, snp) in snps.iter().enumerate() {
        let chi = 1.0 + N * (tau_base * base_ld(i) + tau_coding * coding_ld(i));
        sumstats.push_str(&format!("{snp} A C {N} {}\n", chi.sqrt()));
    }
    let sumstats = write_file(dir, "trait.sumstats", &sumstats);

    let mut cfg = config(&ref_ld, &w_ld);
    cfg.out = dir.join("out").display().to_string();
    cfg.n_blocks = 20;
    cfg.overlap_annot = true;
    (sumstats, cfg)
}

fn coding_enrichment(dir: &Path) -> f64 {
    let results = fs::read_to_string(dir.join("out.results")).expect("results");
    let lines: Vec<&str> = results.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Category\tProp._SNPs\tProp._h2"));
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields[0], "coding");
    fields[4].parse().expect("enrichment")
}

#[test]
fn partitioned_run_writes_enrichment_and_dumps() {
    let dir = tempdir().expect("tempdir");
    let (sumstats, mut cfg) = write_partitioned(dir.path(), false);
    cfg.print_cov = true;
    cfg.print_delete_vals = true;
    let mut log = LogSink::memory();
    let hsq = estimate_h2(&sumstats, &cfg, &JackknifeEstimator, &mut log).expect("h2");

    assert_abs_diff_eq!(hsq.cat[0], 0.03, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.cat[1], 0.03, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.tot, 0.06, epsilon = 1e-7);
    assert_abs_diff_eq!(hsq.intercept, 1.0, epsilon = 1e-7);
    assert_eq!(hsq.n_blocks, 20);
    assert_abs_diff_eq!(coding_enrichment(dir.path()), 3.0, epsilon = 1e-5);

    let cov = fs::read_to_string(dir.path().join("out.cov")).expect("cov");
    assert_eq!(cov.lines().count(), 2);
    let delete = fs::read_to_string(dir.path().join("out.delete_k")).expect("delete values");
    assert_eq!(delete.lines().count(), 20);

    assert!(log.contains("Read summary statistics for 300 SNPs."));
    assert!(log.contains("After merging with regression SNP LD, 300 SNPs remain."));
    assert!(log.contains("Results printed to"));
    assert!(log.contains("Categories: base coding"));
}

#[test]
fn enrichment_skips_a_dropped_constant_category() {
    let dir = tempdir().expect("tempdir");
    let (sumstats, cfg) = write_partitioned(dir.path(), true);
    let mut log = LogSink::memory();
    let hsq = estimate_h2(&sumstats, &cfg, &JackknifeEstimator, &mut log).expect("h2");

    assert!(log.contains("Removing partitioned LD Scores with zero variance: flat"));
    assert_eq!(hsq.cat.len(), 2);
    assert_abs_diff_eq!(hsq.tot, 0.06, epsilon = 1e-7);
    assert_abs_diff_eq!(coding_enrichment(dir.path()), 3.0, epsilon = 1e-5);
    assert!(log.contains("Categories: base coding"));
}

#[test]
fn h2_takes_at_most_one_intercept() {
    let mut cfg = config("ref", "w");
    cfg.constrain_intercept = vec![1.0, 1.0];
    let mut log = LogSink::memory();
    let err = estimate_h2("trait.sumstats".as_ref(), &cfg, &JackknifeEstimator, &mut log)
        .expect_err("two intercepts");
    assert!(matches!(
        err.downcast_ref::<LdscError>(),
        Some(LdscError::Configuration(_))
    ));

    let mut cfg = config("ref", "w");
    cfg.n_blocks = 1;
    let err = estimate_h2("trait.sumstats".as_ref(), &cfg, &JackknifeEstimator, &mut log)
        .expect_err("one block");
    assert!(matches!(
        err.downcast_ref::<LdscError>(),
        Some(LdscError::Configuration(_))
    ));
}
