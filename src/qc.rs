//! Sanity checks applied to assembled LD Score regression inputs.

use anyhow::Result;
use ndarray::Array2;

use crate::error::LdscError;
use crate::logging::LogSink;
use crate::matrix::condition_number;

pub const MAX_CONDITION_NUMBER: f64 = 100_000.0;
pub const MIN_RECOMMENDED_SNPS: usize = 200_000;

pub fn check_equal_length(
    left_len: usize,
    right_len: usize,
    left_name: &str,
    right_name: &str,
) -> Result<()> {
    if left_len != right_len {
        return Err(LdscError::Configuration(format!(
            "{left_name} has {left_len} values but {right_name} has {right_len}"
        ))
        .into());
    }
    Ok(())
}

/// Indices of the columns that are not constant.
///
/// Every column constant is `DegenerateInput`.
pub fn nonconstant_columns(columns: &[Vec<f64>]) -> Result<Vec<usize>> {
    let keep: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, col)| match col.first() {
            Some(first) => col.iter().any(|v| v != first),
            None => false,
        })
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(LdscError::DegenerateInput.into());
    }
    Ok(keep)
}

/// Fails with `IllConditioned` when the condition number of `ld` exceeds
/// the threshold, unless `invert_anyway`, which only logs a warning.
pub fn check_condition_number(
    ld: &Array2<f64>,
    invert_anyway: bool,
    log: &mut LogSink,
) -> Result<()> {
    let cond = condition_number(ld)?;
    if cond > MAX_CONDITION_NUMBER {
        if !invert_anyway {
            return Err(LdscError::IllConditioned {
                condition_number: cond,
                threshold: MAX_CONDITION_NUMBER,
            }
            .into());
        }
        log.warn_line(&format!(
            "WARNING: LD Score matrix condition number is {cond:.0}. Inverting anyway because the --invert-anyway flag is set."
        ))?;
    }
    Ok(())
}

pub fn warn_length(n_snps: usize, log: &mut LogSink) -> Result<()> {
    if n_snps < MIN_RECOMMENDED_SNPS {
        log.warn_line("WARNING: number of SNPs less than 200k; this is almost always bad.")?;
    }
    Ok(())
}
