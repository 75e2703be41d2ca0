use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::dna::reverse_complement_str;

/// Index of a k-mer in a [`KmerCatalog`](crate::catalog::KmerCatalog) pool
pub type KmerId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }

    /// Report letter, `F` or `R`
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => 'F',
            Strand::Reverse => 'R',
        }
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for bool {
    fn from(strand: Strand) -> Self {
        matches!(strand, Strand::Forward)
    }
}

/// A k-mer with its foreground/background sequence membership.
///
/// `kmer` is the canonical string kept in the catalog. `strand` selects which
/// of `kmer` / `rc` is the active pattern once the k-mer has been aligned, and
/// `shift` is the offset of that pattern from the inferred motif start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kmer {
    kmer: String,
    rc: String,
    pos_hits: BTreeSet<usize>,
    neg_hits: BTreeSet<usize>,
    pub shift: i32,
    pub strand: Strand,
    hgp: f64,
}

impl Kmer {
    pub fn new(kmer: String, pos_hits: BTreeSet<usize>) -> Self {
        let rc = reverse_complement_str(&kmer);
        Self {
            kmer,
            rc,
            pos_hits,
            neg_hits: BTreeSet::new(),
            shift: 0,
            strand: Strand::Forward,
            hgp: 0.0,
        }
    }

    pub fn k(&self) -> usize {
        self.kmer.len()
    }

    /// Canonical string
    pub fn as_str(&self) -> &str {
        &self.kmer
    }

    pub fn rc(&self) -> &str {
        &self.rc
    }

    /// The orientation currently used for matching
    pub fn pattern(&self) -> &str {
        match self.strand {
            Strand::Forward => &self.kmer,
            Strand::Reverse => &self.rc,
        }
    }

    pub fn is_palindrome(&self) -> bool {
        self.kmer == self.rc
    }

    pub fn pos_hits(&self) -> &BTreeSet<usize> {
        &self.pos_hits
    }

    pub fn neg_hits(&self) -> &BTreeSet<usize> {
        &self.neg_hits
    }

    pub fn pos_hit_count(&self) -> usize {
        self.pos_hits.len()
    }

    pub fn neg_hit_count(&self) -> usize {
        self.neg_hits.len()
    }

    pub fn set_pos_hits(&mut self, hits: BTreeSet<usize>) {
        self.pos_hits = hits;
    }

    pub fn set_neg_hits(&mut self, hits: BTreeSet<usize>) {
        self.neg_hits = hits;
    }

    /// Cached log10 hyper-geometric p-value
    pub fn hgp(&self) -> f64 {
        self.hgp
    }

    pub fn set_hgp(&mut self, hgp: f64) {
        self.hgp = hgp;
    }

    /// Copy of this k-mer carrying a resolved alignment
    pub fn aligned(&self, shift: i32, strand: Strand) -> Self {
        Self {
            shift,
            strand,
            ..self.clone()
        }
    }

    /// Most significant first; ties go to the larger foreground count, then
    /// to the lexicographically smaller string.
    pub fn cmp_by_hgp(&self, other: &Self) -> Ordering {
        self.hgp
            .total_cmp(&other.hgp)
            .then_with(|| other.pos_hit_count().cmp(&self.pos_hit_count()))
            .then_with(|| self.kmer.cmp(&other.kmer))
    }
}

/// Score cutoff chosen by the threshold search.
///
/// The default value is the neutral sentinel: zero score, zero hits and a
/// p-value of 1 (log10 = 0), meaning no usable threshold was found.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotifThreshold {
    pub score: f64,
    pub pos_hit: usize,
    pub neg_hit: usize,
    pub hgp: f64,
}

impl MotifThreshold {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.pos_hit == 0 && self.neg_hit == 0 && self.hgp == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ids: &[usize]) -> BTreeSet<usize> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_kmer_pattern_follows_strand() {
        let km = Kmer::new("AACG".to_string(), hits(&[0, 1]));
        assert_eq!(km.pattern(), "AACG");
        let flipped = km.aligned(-2, Strand::Reverse);
        assert_eq!(flipped.pattern(), "CGTT");
        assert_eq!(flipped.shift, -2);
        assert_eq!(flipped.as_str(), "AACG");
    }

    #[test]
    fn test_palindrome_detection() {
        assert!(Kmer::new("ACGT".to_string(), hits(&[0])).is_palindrome());
        assert!(!Kmer::new("AAAA".to_string(), hits(&[0])).is_palindrome());
    }

    #[test]
    fn test_cmp_by_hgp_ordering() {
        let mut a = Kmer::new("AAAA".to_string(), hits(&[0, 1]));
        let mut b = Kmer::new("CCCC".to_string(), hits(&[0, 1, 2]));
        a.set_hgp(-2.0);
        b.set_hgp(-2.0);
        assert_eq!(b.cmp_by_hgp(&a), Ordering::Less);
        a.set_hgp(-5.0);
        assert_eq!(a.cmp_by_hgp(&b), Ordering::Less);
    }

    #[test]
    fn test_strand_conversions() {
        assert_eq!(Strand::from(true), Strand::Forward);
        assert_eq!(Strand::Reverse.flip(), Strand::Forward);
        assert_eq!(Strand::Reverse.as_char(), 'R');
        assert!(bool::from(Strand::Forward));
    }

    #[test]
    fn test_threshold_sentinel() {
        assert!(MotifThreshold::none().is_none());
    }
}
