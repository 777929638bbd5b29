//! Row intersection of SNP-indexed tables on the `SNP` identifier.

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::df_utils::column_names;
use crate::error::LdscError;
use crate::logging::LogSink;

pub const SNP_COL: &str = "SNP";

fn same_identifiers(left: &DataFrame, right: &DataFrame) -> Result<bool> {
    if left.height() != right.height() {
        return Ok(false);
    }
    let left_ids = left.column(SNP_COL)?.str().context("left SNP column")?;
    let right_ids = right.column(SNP_COL)?.str().context("right SNP column")?;
    Ok(left_ids.into_iter().eq(right_ids.into_iter()))
}

/// Inner join on `SNP`. When both tables already list the same identifiers in
/// the same order the columns are concatenated instead, preserving order.
pub fn smart_merge(left: &DataFrame, right: &DataFrame) -> Result<DataFrame> {
    if same_identifiers(left, right)? {
        return concat_on_snp(left, right);
    }
    join_on_snp(left, right)
}

/// Column-wise concatenation of two tables with identical `SNP` columns.
/// Clashing column names from `right` get the same `_right` suffix the join
/// would give them.
pub fn concat_on_snp(left: &DataFrame, right: &DataFrame) -> Result<DataFrame> {
    let mut right = right.drop(SNP_COL)?;
    for name in column_names(&right) {
        if left.column(&name).is_ok() {
            right.rename(&name, format!("{name}_right").into())?;
        }
    }
    Ok(left.hstack(right.get_columns())?)
}

/// Inner join on `SNP`, keeping the row order of `left`.
pub fn join_on_snp(left: &DataFrame, right: &DataFrame) -> Result<DataFrame> {
    Ok(left.join(
        right,
        [SNP_COL],
        [SNP_COL],
        JoinArgs {
            maintain_order: MaintainOrderJoin::Left,
            ..JoinArgs::new(JoinType::Inner)
        },
        None,
    )?)
}

/// `smart_merge`, failing when nothing survives and otherwise logging the
/// number of SNPs left after bringing in `noun`.
pub fn merge_with_logging(
    left: &DataFrame,
    right: &DataFrame,
    noun: &str,
    log: &mut LogSink,
) -> Result<DataFrame> {
    let merged = smart_merge(left, right)?;
    if merged.height() == 0 {
        return Err(LdscError::EmptyMerge {
            step: format!("merging with {noun}"),
        }
        .into());
    }
    log.log_line(&format!(
        "After merging with {noun}, {} SNPs remain.",
        merged.height()
    ))?;
    Ok(merged)
}
