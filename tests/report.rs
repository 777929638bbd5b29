use std::fs;

use approx::assert_abs_diff_eq;
use ldscore::logging::LogSink;
use ldscore::report::{hsq_summary, overlap_output, print_cov, rg_summary, rg_table};
use ldscore::types::{Gencov, Hsq, RgComparison, RgEstimate, RgOutcome};
use tempfile::tempdir;

fn hsq(prop: Vec<f64>, prop_var: Vec<f64>) -> Hsq {
    let k = prop.len();
    let prop_cov = (0..k)
        .map(|i| (0..k).map(|j| if i == j { prop_var[i] } else { 0.0 }).collect())
        .collect();
    Hsq {
        coef: vec![2e-4; k],
        coef_se: vec![1e-4; k],
        coef_cov: vec![vec![0.0; k]; k],
        cat: vec![0.1; k],
        cat_se: vec![0.01; k],
        cat_cov: vec![vec![0.0; k]; k],
        tot: 0.1 * k as f64,
        tot_se: 0.02,
        prop_se: prop_var.iter().map(|v| v.sqrt()).collect(),
        prop,
        prop_cov,
        intercept: 1.02,
        intercept_se: Some(0.01),
        mean_chisq: 1.5,
        lambda_gc: 1.3,
        n_bar: 50_000.0,
        n_blocks: 200,
        delete_values: Vec::new(),
        tot_delete_values: Vec::new(),
    }
}

fn categories() -> Vec<String> {
    vec!["base".to_string(), "coding".to_string()]
}

#[test]
fn enrichment_counts_overlapping_snps() {
    let overlap = vec![vec![1000.0, 100.0], vec![100.0, 100.0]];
    let fit = hsq(vec![0.6, 0.4], vec![0.01, 0.0025]);
    let table = overlap_output(&overlap, &[1000.0, 100.0], 1000.0, &fit, &categories(), false)
        .expect("table");

    assert_eq!(table.height(), 1);
    assert_eq!(
        table.get_column_names_str(),
        vec![
            "Category",
            "Prop._SNPs",
            "Prop._h2",
            "Prop._h2_std_error",
            "Enrichment",
            "Enrichment_std_error",
            "Enrichment_p",
        ]
    );
    let value = |name: &str| {
        table
            .column(name)
            .expect("column")
            .f64()
            .expect("f64")
            .get(0)
            .expect("value")
    };
    let category = table.column("Category").expect("Category");
    assert_eq!(category.str().expect("str").get(0), Some("coding"));
    assert_abs_diff_eq!(value("Prop._SNPs"), 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(value("Prop._h2"), 0.46, epsilon = 1e-12);
    assert_abs_diff_eq!(value("Prop._h2_std_error"), 0.0026f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(value("Enrichment"), 4.6, epsilon = 1e-10);
    assert_abs_diff_eq!(value("Enrichment_std_error"), 0.0026f64.sqrt() / 0.1, epsilon = 1e-10);
    assert!(value("Enrichment_p") < 1e-6);
}

#[test]
fn coefficients_are_appended_on_request() {
    let overlap = vec![vec![1000.0, 100.0], vec![100.0, 100.0]];
    let fit = hsq(vec![0.6, 0.4], vec![0.01, 0.0025]);
    let table = overlap_output(&overlap, &[1000.0, 100.0], 1000.0, &fit, &categories(), true)
        .expect("table");

    assert_eq!(table.width(), 10);
    let z = table
        .column("Coefficient_z-score")
        .expect("z")
        .f64()
        .expect("f64")
        .get(0)
        .expect("value");
    assert_abs_diff_eq!(z, 2.0, epsilon = 1e-12);
}

#[test]
fn overlap_must_match_the_categories() {
    let fit = hsq(vec![0.6, 0.4], vec![0.01, 0.0025]);
    let overlap = vec![vec![1000.0]];
    assert!(overlap_output(&overlap, &[1000.0, 100.0], 1000.0, &fit, &categories(), false).is_err());
}

#[test]
fn summary_lists_categories_only_when_partitioned() {
    let single = hsq(vec![1.0], vec![0.0]);
    let text = hsq_summary(&single, &["L2".to_string()], false);
    assert!(text.starts_with("Total Observed scale h2: 0.1000 (0.0200)"));
    assert!(!text.contains("Categories"));
    assert!(text.contains("Lambda GC: 1.3000"));
    assert!(text.contains("Intercept: 1.0200 (0.0100)"));
    assert!(text.contains("Ratio: 0.0400 (0.0200)"));

    let mut fixed = hsq(vec![0.6, 0.4], vec![0.01, 0.0025]);
    fixed.intercept_se = None;
    fixed.intercept = 1.0;
    let text = hsq_summary(&fixed, &categories(), false);
    assert!(text.contains("Categories: base coding"));
    assert!(text.contains("Proportion of h2: 0.6000 0.4000"));
    assert!(text.contains("Intercept: constrained to 1.0000"));
}

#[test]
fn undefined_rg_is_reported_as_out_of_bounds() {
    let h = hsq(vec![1.0], vec![0.0]);
    let gencov = Gencov {
        coef: vec![0.0],
        coef_se: vec![0.0],
        coef_cov: vec![vec![0.0]],
        cat: vec![0.0],
        cat_se: vec![0.0],
        cat_cov: vec![vec![0.0]],
        tot: 0.0,
        tot_se: 0.0,
        intercept: 0.0,
        intercept_se: Some(0.0),
        mean_z1z2: 0.0,
        n_bar: 1.0,
        n_blocks: 2,
        delete_values: Vec::new(),
        tot_delete_values: Vec::new(),
    };
    let estimate = RgEstimate {
        hsq1: h.clone(),
        hsq2: h,
        gencov,
        rg: f64::NAN,
        rg_se: f64::NAN,
        z: f64::NAN,
        p: f64::NAN,
    };
    assert!(rg_summary(&estimate).contains("(h2 out of bounds)"));
}

#[test]
fn rg_table_marks_failed_pairs() {
    let comparisons = vec![
        RgComparison {
            p1: "height.sumstats".into(),
            p2: "bmi.sumstats".into(),
            outcome: RgOutcome::Succeeded {
                rg: 0.25,
                se: 0.05,
                z: 5.0,
                p: 5.7e-7,
            },
        },
        RgComparison {
            p1: "height.sumstats".into(),
            p2: "broken.sumstats".into(),
            outcome: RgOutcome::Failed("missing column".into()),
        },
    ];
    let table = rg_table(&comparisons);
    let lines: Vec<&str> = table.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0].split_whitespace().collect::<Vec<_>>(),
        ["p1", "p2", "rg", "se", "z", "p"]
    );
    assert!(lines[1].contains("0.2500"));
    assert_eq!(lines[2].split_whitespace().filter(|c| *c == "NA").count(), 4);
    assert!(comparisons[0].succeeded());
    assert!(!comparisons[1].succeeded());
    assert_eq!(lines[0].len(), lines[1].len());
}

#[test]
fn covariance_is_written_one_row_per_line() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out.cov");
    let mut log = LogSink::memory();
    print_cov(&vec![vec![1.0, 0.5], vec![0.5, 2.0]], &path, &mut log).expect("print");

    let text = fs::read_to_string(&path).expect("read");
    let rows: Vec<Vec<f64>> = text
        .lines()
        .map(|l| l.split_whitespace().map(|v| v.parse().expect("number")).collect())
        .collect();
    assert_eq!(rows, vec![vec![1.0, 0.5], vec![0.5, 2.0]]);
    assert!(log.contains("Printing covariance matrix"));
}
