#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ldscore::ldsc::LdscConfig;

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Writes `<dir>/<name>.l2.ldscore` with one line per `(snp, values)` row
/// and returns the prefix.
pub fn write_ld_scores(dir: &Path, name: &str, columns: &[&str], rows: &[(&str, &[f64])]) -> String {
    let mut text = format!("CHR\tSNP\tBP\t{}\n", columns.join("\t"));
    for (i, (snp, values)) in rows.iter().enumerate() {
        let values = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        text.push_str(&format!("1\t{snp}\t{}\t{values}\n", 100 * (i + 1)));
    }
    write_file(dir, &format!("{name}.l2.ldscore"), &text);
    dir.join(name).display().to_string()
}

pub fn write_m(prefix: &str, values: &[f64]) {
    let line = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\t");
    fs::write(format!("{prefix}.l2.M_5_50"), format!("{line}\n")).expect("write M");
}

/// `(snp, a1, a2, n, z)` rows as a whitespace-delimited sumstats file.
pub fn write_sumstats(dir: &Path, name: &str, rows: &[(&str, &str, &str, f64, f64)]) -> PathBuf {
    let mut text = String::from("SNP A1 A2 N Z\n");
    for (snp, a1, a2, n, z) in rows {
        text.push_str(&format!("{snp} {a1} {a2} {n} {z}\n"));
    }
    write_file(dir, name, &text)
}

pub fn config(ref_ld: &str, w_ld: &str) -> LdscConfig {
    LdscConfig {
        ref_ld: Some(ref_ld.to_string()),
        w_ld: Some(w_ld.to_string()),
        ..LdscConfig::default()
    }
}
