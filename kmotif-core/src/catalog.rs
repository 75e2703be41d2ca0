//! Enriched k-mer selection
//!
//! Counts the foreground sequences containing each k-mer, folds every k-mer
//! onto a single strand-canonical entry, fills in background membership with
//! a both-strand matcher scan and keeps the k-mers that pass the fold and
//! significance tests.

use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::dna::{is_unambiguous, reverse_complement_str};
use crate::error::MotifResult;
use crate::matcher::MultiPatternMatcher;
use crate::params::CatalogParams;
use crate::significance::SignificanceScorer;
use crate::types::{Kmer, KmerId};

/// Read-only pool of enriched k-mers, most significant first.
///
/// Positions in the pool are the [`KmerId`]s used by the alignment code.
#[derive(Debug, Clone)]
pub struct KmerCatalog {
    k: usize,
    kmers: Vec<Kmer>,
    negatives: Vec<Kmer>,
    negative_index: HashSet<String>,
}

impl KmerCatalog {
    /// Select enriched k-mers from `foreground` against `background`.
    ///
    /// Both sets are expected to be normalized (uppercase `ACGTN`).
    pub fn build<S: AsRef<str>>(
        foreground: &[S],
        background: &[S],
        scorer: &SignificanceScorer,
        params: &CatalogParams,
    ) -> MotifResult<Self> {
        params.validate()?;
        let k = params.k;

        let membership = count_unique_kmers(foreground, k);
        let merged = merge_reverse_complements(membership);

        let expected = (foreground.len() as f64 / 4f64.powi(k as i32)).round() as usize;
        let floor = expected.max(params.effective_min_hit_count());
        let mut candidates: Vec<Kmer> = merged
            .into_iter()
            .filter(|(_, hits)| hits.len() >= floor)
            .map(|(kmer, hits)| Kmer::new(kmer, hits))
            .collect();
        candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        info!(
            "k={}, mapped {} k-mers from {} sequences (membership floor {})",
            k,
            candidates.len(),
            foreground.len(),
            floor
        );

        fill_background_hits(&mut candidates, background);

        let pos_total = scorer.pos_total() as f64;
        let neg_total = scorer.neg_total() as f64;
        let mut kmers = Vec::new();
        let mut negatives = Vec::new();
        for mut kmer in candidates {
            let hgp = scorer.hgp(kmer.pos_hit_count(), kmer.neg_hit_count());
            kmer.set_hgp(hgp);
            // background hits rescaled to the foreground set size
            let scaled_neg = if neg_total > 0.0 {
                kmer.neg_hit_count() as f64 * pos_total / neg_total
            } else {
                0.0
            };
            if (kmer.pos_hit_count() as f64) < scaled_neg * params.k_fold
                || hgp > params.hgp_threshold
            {
                negatives.push(kmer);
            } else {
                kmers.push(kmer);
            }
        }
        kmers.sort_by(Kmer::cmp_by_hgp);
        negatives.sort_by(Kmer::cmp_by_hgp);

        if kmers.is_empty() {
            warn!("k={}: no k-mer passed the enrichment tests", k);
        }
        info!(
            "k={}, selected {} k-mers from {}+/{}- sequences ({} rejected as un-enriched)",
            k,
            kmers.len(),
            scorer.pos_total(),
            scorer.neg_total(),
            negatives.len()
        );

        let negative_index = negatives.iter().map(|km| km.as_str().to_string()).collect();
        Ok(Self {
            k,
            kmers,
            negatives,
            negative_index,
        })
    }

    /// Catalog over an explicit k-mer list, e.g. one loaded from a previous run
    pub fn from_kmers(k: usize, mut kmers: Vec<Kmer>) -> Self {
        kmers.sort_by(Kmer::cmp_by_hgp);
        Self {
            k,
            kmers,
            negatives: Vec::new(),
            negative_index: HashSet::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn kmers(&self) -> &[Kmer] {
        &self.kmers
    }

    pub fn get(&self, id: KmerId) -> Option<&Kmer> {
        self.kmers.get(id)
    }

    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    /// Id of the entry for `kmer` in either orientation
    pub fn find(&self, kmer: &str) -> Option<KmerId> {
        let rc = reverse_complement_str(kmer);
        self.kmers
            .iter()
            .position(|km| km.as_str() == kmer || km.as_str() == rc)
    }

    /// K-mers that met the membership floor but failed the enrichment tests
    pub fn negatives(&self) -> &[Kmer] {
        &self.negatives
    }

    /// True if `kmer`, or its reverse complement, was rejected as un-enriched
    pub fn is_negative_kmer(&self, kmer: &str) -> bool {
        let kmer = kmer.to_ascii_uppercase();
        self.negative_index.contains(&kmer)
            || self.negative_index.contains(&reverse_complement_str(&kmer))
    }
}

/// Sequence ids per k-mer, counting each k-mer at most once per sequence
fn count_unique_kmers<S: AsRef<str>>(sequences: &[S], k: usize) -> HashMap<String, BTreeSet<usize>> {
    let mut membership: HashMap<String, BTreeSet<usize>> = HashMap::new();
    for (id, seq) in sequences.iter().enumerate() {
        let seq = seq.as_ref();
        if seq.len() < k {
            debug!("sequence {} is shorter than k={}, skipped", id, k);
            continue;
        }
        let unique: HashSet<&[u8]> = seq
            .as_bytes()
            .windows(k)
            .filter(|w| is_unambiguous(w))
            .collect();
        for window in unique {
            let kmer = String::from_utf8_lossy(window).into_owned();
            membership.entry(kmer).or_default().insert(id);
        }
    }
    membership
}

/// Fold each k-mer and its reverse complement onto one entry.
///
/// The orientation with more members absorbs the other; on a tie the
/// lexicographically smaller string survives.
fn merge_reverse_complements(
    mut membership: HashMap<String, BTreeSet<usize>>,
) -> HashMap<String, BTreeSet<usize>> {
    let mut keys: Vec<String> = membership.keys().cloned().collect();
    keys.sort_unstable();
    for key in keys {
        let rc = reverse_complement_str(&key);
        if rc == key || !membership.contains_key(&key) || !membership.contains_key(&rc) {
            continue;
        }
        let key_count = membership.get(&key).map_or(0, BTreeSet::len);
        let rc_count = membership.get(&rc).map_or(0, BTreeSet::len);
        let key_wins = key_count > rc_count || (key_count == rc_count && key < rc);
        let (winner, loser) = if key_wins { (key, rc) } else { (rc, key) };
        if let Some(absorbed) = membership.remove(&loser) {
            membership.entry(winner).or_default().extend(absorbed);
        }
    }
    membership
}

fn fill_background_hits<S: AsRef<str>>(kmers: &mut [Kmer], background: &[S]) {
    if kmers.is_empty() {
        return;
    }
    let matcher = {
        let patterns: Vec<&str> = kmers.iter().map(Kmer::as_str).collect();
        MultiPatternMatcher::new(&patterns)
    };
    let mut neg_hits: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); kmers.len()];
    for (id, seq) in background.iter().enumerate() {
        for pattern in matcher.patterns_present(seq.as_ref().as_bytes(), true) {
            neg_hits[pattern].insert(id);
        }
    }
    for (kmer, hits) in kmers.iter_mut().zip(neg_hits) {
        kmer.set_neg_hits(hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn permissive(k: usize) -> CatalogParams {
        CatalogParams {
            k,
            min_hit_count: 2,
            hgp_threshold: 0.0,
            k_fold: 0.0,
        }
    }

    fn build(fg: &[&str], bg: &[&str], params: &CatalogParams) -> KmerCatalog {
        let scorer = SignificanceScorer::new(fg.len(), bg.len());
        KmerCatalog::build(fg, bg, &scorer, params).unwrap()
    }

    fn entry<'a>(catalog: &'a KmerCatalog, kmer: &str) -> &'a Kmer {
        let id = catalog.find(kmer).unwrap();
        catalog.get(id).unwrap()
    }

    #[test]
    fn test_two_sequence_scenario() {
        let catalog = build(&["AAAACCCC", "GGGGAAAA"], &["TTTTGGGG"], &permissive(4));
        let aaaa = entry(&catalog, "AAAA");
        assert_eq!(aaaa.as_str(), "AAAA");
        assert_eq!(aaaa.pos_hit_count(), 2);
        // TTTT on the background forward strand is AAAA on its reverse strand
        assert_eq!(aaaa.neg_hit_count(), 1);

        // CCCC and GGGG are one strand-canonical entry carrying both sequences
        let cccc = entry(&catalog, "GGGG");
        assert_eq!(cccc.as_str(), "CCCC");
        let both: BTreeSet<usize> = [0, 1].into_iter().collect();
        assert_eq!(cccc.pos_hits(), &both);
        assert!(catalog.kmers().iter().all(|km| km.as_str() != "GGGG"));
    }

    #[test]
    fn test_shared_kmer_beats_single_sequence_kmer() {
        let fg = ["AAAACCCC", "GGGGAAAA"];
        let bg = ["CGCGCGCG"];
        let catalog = build(&fg, &bg, &permissive(4));
        let aaaa = entry(&catalog, "AAAA");
        assert_eq!(aaaa.pos_hit_count(), 2);
        assert_eq!(aaaa.neg_hit_count(), 0);

        let scorer = SignificanceScorer::new(fg.len(), bg.len());
        assert!(aaaa.hgp() < scorer.hgp(1, 0));
        // single-sequence k-mers never reach the catalog
        assert!(catalog.find("AAAC").is_none());
    }

    #[test]
    fn test_singletons_never_survive() {
        let params = CatalogParams {
            min_hit_count: 0,
            ..permissive(3)
        };
        let catalog = build(&["ACGTTT", "GGGCCA", "TTTACG"], &["CCCCCC"], &params);
        assert!(catalog.kmers().iter().all(|km| km.pos_hit_count() >= 2));
    }

    #[test]
    fn test_ambiguous_kmers_skipped() {
        let catalog = build(&["ANAAAA", "ANAAAA"], &["CCCCCC"], &permissive(3));
        assert!(catalog.kmers().iter().all(|km| !km.as_str().contains('N')));
        assert!(catalog.find("AAA").is_some());
    }

    #[test]
    fn test_unenriched_kmers_are_negative() {
        let fg = ["GATTACA", "GATTACA", "GATTACA"];
        let bg = ["GATTACA", "GATTACA", "GATTACA"];
        let params = CatalogParams {
            k: 7,
            ..Default::default()
        };
        let catalog = build(&fg, &bg, &params);
        assert!(catalog.is_empty());
        assert!(catalog.is_negative_kmer("GATTACA"));
        assert!(catalog.is_negative_kmer(&reverse_complement_str("GATTACA")));
        assert!(!catalog.is_negative_kmer("CCCCCCC"));
    }

    #[test]
    fn test_sorted_by_significance() {
        let fg = ["TTGACAAA", "CTTGACAG", "GTTGACAT", "ATTGACGC", "CCCCAGAG"];
        let bg = ["CGCGCGCG", "ATATATAT", "CAGCAGCA"];
        let catalog = build(&fg, &bg, &permissive(5));
        let hgps: Vec<f64> = catalog.kmers().iter().map(Kmer::hgp).collect();
        assert!(hgps.windows(2).all(|w| w[0] <= w[1]));
    }

    fn dna(len: std::ops::Range<usize>) -> impl Strategy<Value = String> {
        proptest::collection::vec(prop_oneof![Just('A'), Just('C'), Just('G'), Just('T')], len)
            .prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_one_entry_per_strand_pair(
            fg in proptest::collection::vec(dna(4..24), 2..10),
            k in 2usize..5,
        ) {
            let fg_refs: Vec<&str> = fg.iter().map(String::as_str).collect();
            let catalog = build(&fg_refs, &[], &permissive(k));
            for km in catalog.kmers() {
                if !km.is_palindrome() {
                    prop_assert!(catalog.kmers().iter().all(|other| other.as_str() != km.rc()));
                }
                // hit set is the union over both orientations
                let expected: BTreeSet<usize> = fg
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.contains(km.as_str()) || s.contains(km.rc()))
                    .map(|(i, _)| i)
                    .collect();
                prop_assert_eq!(km.pos_hits(), &expected);
            }
        }

        #[test]
        fn prop_matcher_reproduces_membership(
            fg in proptest::collection::vec(dna(6..30), 2..12),
            k in 3usize..6,
        ) {
            let fg_refs: Vec<&str> = fg.iter().map(String::as_str).collect();
            let catalog = build(&fg_refs, &[], &permissive(k));
            let patterns: Vec<&str> = catalog.kmers().iter().map(Kmer::as_str).collect();
            let matcher = MultiPatternMatcher::new(&patterns);
            let mut recovered = vec![BTreeSet::new(); patterns.len()];
            for (id, seq) in fg.iter().enumerate() {
                for pattern in matcher.patterns_present(seq.as_bytes(), true) {
                    recovered[pattern].insert(id);
                }
            }
            for (km, hits) in catalog.kmers().iter().zip(recovered) {
                prop_assert_eq!(km.pos_hits(), &hits);
            }
        }
    }
}
