//! Allele reconciliation over the {A, C, G, T} alphabet.
//!
//! Every relation is precomputed once into small lookup tables: 16 entries
//! for allele pairs and 256 for a pair-of-pairs written as the 4-character
//! string `A1 A2 A1x A2x`.

use once_cell::sync::Lazy;

use crate::error::{LdscError, Result};

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];
// complement of BASES[i] is BASES[COMPLEMENT_INDEX[i]]
const COMPLEMENT_INDEX: [usize; 4] = [3, 2, 1, 0];

static STRAND_AMBIGUOUS: Lazy<[[bool; 4]; 4]> = Lazy::new(|| {
    let mut table = [[false; 4]; 4];
    for (a, row) in table.iter_mut().enumerate() {
        for (b, cell) in row.iter_mut().enumerate() {
            *cell = a != b && a == COMPLEMENT_INDEX[b];
        }
    }
    table
});

static VALID_SNPS: Lazy<[[bool; 4]; 4]> = Lazy::new(|| {
    let mut table = [[false; 4]; 4];
    for (a, row) in table.iter_mut().enumerate() {
        for (b, cell) in row.iter_mut().enumerate() {
            *cell = a != b && !STRAND_AMBIGUOUS[a][b];
        }
    }
    table
});

static MATCH_ALLELES: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for_each_valid_combination(|[a, b, c, d], idx| {
        let comp = COMPLEMENT_INDEX;
        table[idx] = (a == c && b == d)
            || (a == comp[c] && b == comp[d])
            || (a == d && b == c)
            || (a == comp[d] && b == comp[c]);
    });
    table
});

static FLIP_ALLELES: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for_each_valid_combination(|[a, b, c, d], idx| {
        let comp = COMPLEMENT_INDEX;
        table[idx] =
            MATCH_ALLELES[idx] && ((a == d && b == c) || (a == comp[d] && b == comp[c]));
    });
    table
});

fn for_each_valid_combination<F: FnMut([usize; 4], usize)>(mut f: F) {
    for a in 0..4 {
        for b in 0..4 {
            if !VALID_SNPS[a][b] {
                continue;
            }
            for c in 0..4 {
                for d in 0..4 {
                    if VALID_SNPS[c][d] {
                        f([a, b, c, d], combination_index([a, b, c, d]));
                    }
                }
            }
        }
    }
}

fn combination_index([a, b, c, d]: [usize; 4]) -> usize {
    a * 64 + b * 16 + c * 4 + d
}

fn base_index(base: char) -> Result<usize> {
    BASES
        .iter()
        .position(|b| *b == base)
        .ok_or(LdscError::InvalidBase(base))
}

fn parse_bases<const N: usize>(alleles: &str) -> Result<[usize; N]> {
    let mut out = [0usize; N];
    let mut chars = alleles.chars();
    for slot in out.iter_mut() {
        let c = chars.next().ok_or_else(|| {
            LdscError::Parse(format!("expected {} alleles, found {alleles:?}", N))
        })?;
        *slot = base_index(c)?;
    }
    if chars.next().is_some() {
        return Err(LdscError::Parse(format!(
            "expected {} alleles, found {alleles:?}",
            N
        )));
    }
    Ok(out)
}

pub fn complement(base: char) -> Result<char> {
    let idx = base_index(base)?;
    Ok(BASES[COMPLEMENT_INDEX[idx]])
}

/// True iff the two bases of `pair` are complements (A/T, C/G).
pub fn is_strand_ambiguous(pair: &str) -> Result<bool> {
    let [a, b] = parse_bases::<2>(pair)?;
    Ok(STRAND_AMBIGUOUS[a][b])
}

/// Whitelist check: two distinct, non-complementary bases.
pub fn is_valid_snp(pair: &str) -> bool {
    parse_bases::<2>(pair)
        .map(|[a, b]| VALID_SNPS[a][b])
        .unwrap_or(false)
}

/// True iff both pairs describe the same biallelic SNP, allowing a strand
/// flip, a reference/alternate swap, or both.
pub fn alleles_match(pair1: &str, pair2: &str) -> bool {
    match (parse_bases::<2>(pair1), parse_bases::<2>(pair2)) {
        (Ok([a, b]), Ok([c, d])) => MATCH_ALLELES[combination_index([a, b, c, d])],
        _ => false,
    }
}

/// True iff `pair2` matches `pair1` through a reference/alternate swap, so the
/// effect measured against `pair2` must be negated to align with `pair1`.
pub fn flip_sign(pair1: &str, pair2: &str) -> bool {
    match (parse_bases::<2>(pair1), parse_bases::<2>(pair2)) {
        (Ok([a, b]), Ok([c, d])) => FLIP_ALLELES[combination_index([a, b, c, d])],
        _ => false,
    }
}

/// Whitelist for a 4-letter `A1 A2 A1x A2x` string: both halves are valid
/// SNPs and they describe the same site.
pub fn is_valid_combination(alleles: &str) -> bool {
    parse_bases::<4>(alleles)
        .map(|bases| MATCH_ALLELES[combination_index(bases)])
        .unwrap_or(false)
}

pub fn flip_combination(alleles: &str) -> Result<bool> {
    let bases = parse_bases::<4>(alleles)?;
    Ok(FLIP_ALLELES[combination_index(bases)])
}
