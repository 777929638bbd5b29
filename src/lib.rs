//! LD Score regression (library crate).
//!
//! Estimates SNP heritability, partitioned heritability and genetic
//! correlation from GWAS summary statistics and precomputed LD Scores.

pub mod error;
pub mod logging;
pub mod types;

pub mod alleles;
pub mod df_utils;
pub mod io;
pub mod matrix;
pub mod merge;
pub mod qc;
pub mod schema;

pub mod inputs;
pub mod ldsc;
pub mod parse;
pub mod regressions;
pub mod report;

