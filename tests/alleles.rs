use ldscore::alleles::{
    alleles_match, complement, flip_combination, flip_sign, is_strand_ambiguous,
    is_valid_combination, is_valid_snp,
};
use ldscore::error::LdscError;

#[test]
fn complement_is_an_involution() {
    for base in ['A', 'C', 'G', 'T'] {
        let twice = complement(complement(base).expect("complement")).expect("complement");
        assert_eq!(twice, base);
    }
    assert_eq!(complement('A').expect("A"), 'T');
    assert_eq!(complement('G').expect("G"), 'C');
}

#[test]
fn complement_rejects_other_characters() {
    assert!(matches!(complement('N'), Err(LdscError::InvalidBase('N'))));
    assert!(matches!(complement('a'), Err(LdscError::InvalidBase('a'))));
}

#[test]
fn strand_ambiguity() {
    assert!(is_strand_ambiguous("AT").expect("AT"));
    assert!(is_strand_ambiguous("GC").expect("GC"));
    assert!(!is_strand_ambiguous("AC").expect("AC"));
    assert!(is_strand_ambiguous("AX").is_err());
}

#[test]
fn valid_snps_exclude_ambiguous_and_repeated_bases() {
    assert!(is_valid_snp("AC"));
    assert!(is_valid_snp("GT"));
    assert!(!is_valid_snp("AT"));
    assert!(!is_valid_snp("AA"));
    assert!(!is_valid_snp("A"));
    assert!(!is_valid_snp("ACG"));
}

#[test]
fn matching_under_strand_and_reference_flips() {
    assert!(alleles_match("AC", "AC"));
    assert!(alleles_match("AC", "CA"));
    assert!(alleles_match("AC", "TG"));
    assert!(alleles_match("AC", "GT"));
    assert!(!alleles_match("AC", "AG"));
    assert!(!alleles_match("AT", "AT"));
}

#[test]
fn sign_flips_only_on_reference_swap() {
    assert!(flip_sign("AC", "CA"));
    assert!(flip_sign("AC", "GT"));
    assert!(!flip_sign("AC", "AC"));
    assert!(!flip_sign("AC", "TG"));
    assert!(!flip_sign("AC", "AG"));
}

#[test]
fn four_letter_combinations() {
    assert!(is_valid_combination("ACCA"));
    assert!(is_valid_combination("ACTG"));
    assert!(!is_valid_combination("ATAT"));
    assert!(!is_valid_combination("ACAG"));
    assert!(!is_valid_combination("ACC"));

    assert!(flip_combination("ACCA").expect("ACCA"));
    assert!(!flip_combination("ACAC").expect("ACAC"));
    assert!(matches!(
        flip_combination("ACNA"),
        Err(LdscError::InvalidBase('N'))
    ));
}
