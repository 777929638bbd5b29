//! Header normalisation for summary-statistics files.

use crate::error::{LdscError, Result};

/// Canonical column and the upper-cased headers accepted for it.
const SYNONYMS: [(&str, &[&str]); 6] = [
    (
        "SNP",
        &[
            "SNP",
            "SNPID",
            "RSID",
            "RS_NUMBER",
            "RS_NUMBERS",
            "MARKERNAME",
            "SNP_ID",
            "VARIANT_ID",
        ],
    ),
    (
        "A1",
        &["A1", "ALLELE1", "EFFECT_ALLELE", "INC_ALLELE", "REFERENCE_ALLELE", "EA"],
    ),
    (
        "A2",
        &["A2", "ALLELE2", "ALLELE0", "OTHER_ALLELE", "NON_EFFECT_ALLELE", "DEC_ALLELE", "NEA"],
    ),
    ("Z", &["Z", "ZSCORE", "Z-SCORE", "ZSTATISTIC", "ZSTAT", "Z-STATISTIC"]),
    ("CHISQ", &["CHISQ", "CHI2", "CHISQUARE"]),
    (
        "N",
        &["N", "NCOMPLETESAMPLES", "TOTALSAMPLESIZE", "TOTALN", "TOTAL_N", "SAMPLESIZE", "N_COMPLETE_SAMPLES"],
    ),
];

#[derive(Debug, Clone)]
pub struct HeaderMap {
    pub headers: Vec<String>,
    pub info: Vec<String>,
}

/// Maps recognised header synonyms onto the canonical names `SNP`, `A1`,
/// `A2`, `Z`, `CHISQ` and `N`. Unrecognised headers are kept as they were.
/// Two headers that resolve to the same canonical name are an error.
pub fn resolve_headers(headers: &[String], source_name: &str) -> Result<HeaderMap> {
    let mut out: Vec<String> = headers.to_vec();
    let mut info = Vec::new();

    for (canonical, synonyms) in SYNONYMS {
        let hits: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| synonyms.contains(&h.trim().to_ascii_uppercase().as_str()))
            .map(|(i, _)| i)
            .collect();
        match hits.as_slice() {
            [] => {}
            [idx] => {
                if headers[*idx] != canonical {
                    info.push(format!(
                        "Interpreting the {} column as the {canonical} column.",
                        headers[*idx]
                    ));
                }
                out[*idx] = canonical.to_string();
            }
            _ => {
                let names = hits
                    .iter()
                    .map(|i| headers[*i].as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(LdscError::Parse(format!(
                    "multiple columns in {source_name} could be {canonical}: {names}"
                )));
            }
        }
    }

    Ok(HeaderMap { headers: out, info })
}
