//! Grouping of k-mer matches that imply the same binding site

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::matcher::PatternMatch;
use crate::significance::SignificanceScorer;
use crate::types::{Kmer, Strand};

/// K-mer instances in one sequence that resolve to the same motif start.
///
/// Matches on both strands are pooled by their motif start on the forward
/// strand. A reverse-strand start `x` (counted on the reverse complement)
/// sits at `len - 1 - x` on the forward strand. The group takes its strand
/// from the matches of its most significant member, and `site` is the motif
/// start in that strand's frame. Member indices refer to the k-mer list the
/// matcher was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct KmerGroup {
    members: Vec<usize>,
    forward_site: i32,
    site: i32,
    strand: Strand,
    pos_hit_count: usize,
    neg_hit_count: usize,
    hgp: f64,
}

impl KmerGroup {
    /// Group from `(k-mer, matched strand)` pairs that share `forward_site`
    /// in a sequence of `seq_len`
    pub fn new(
        hits: &[(usize, Strand)],
        forward_site: i32,
        seq_len: usize,
        kmers: &[Kmer],
        scorer: &SignificanceScorer,
    ) -> Self {
        let mut members: Vec<usize> = hits.iter().map(|&(m, _)| m).collect();
        members.sort_by(|&a, &b| kmers[a].cmp_by_hgp(&kmers[b]).then(a.cmp(&b)));
        members.dedup();

        // forward wins when the best k-mer matched on both strands
        let strand = members
            .first()
            .and_then(|&best| {
                hits.iter()
                    .filter(|&&(m, _)| m == best)
                    .map(|&(_, strand)| strand)
                    .min()
            })
            .unwrap_or(Strand::Forward);
        let site = match strand {
            Strand::Forward => forward_site,
            Strand::Reverse => seq_len as i32 - 1 - forward_site,
        };

        let mut pos_hits = BTreeSet::new();
        let mut neg_hits = BTreeSet::new();
        for &m in &members {
            pos_hits.extend(kmers[m].pos_hits().iter().copied());
            neg_hits.extend(kmers[m].neg_hits().iter().copied());
        }
        let hgp = scorer.hgp(pos_hits.len(), neg_hits.len());
        Self {
            members,
            forward_site,
            site,
            strand,
            pos_hit_count: pos_hits.len(),
            neg_hit_count: neg_hits.len(),
            hgp,
        }
    }

    /// Member k-mers, most significant first
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn best_kmer(&self) -> usize {
        self.members[0]
    }

    /// Motif start in the frame of [`KmerGroup::strand`]
    pub fn site(&self) -> i32 {
        self.site
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Motif start on the forward strand
    pub fn forward_site(&self) -> i32 {
        self.forward_site
    }

    pub fn pos_hit_count(&self) -> usize {
        self.pos_hit_count
    }

    pub fn neg_hit_count(&self) -> usize {
        self.neg_hit_count
    }

    pub fn hgp(&self) -> f64 {
        self.hgp
    }

    /// Positive group score, `-log10 p`
    pub fn score(&self) -> f64 {
        -self.hgp
    }

    /// Ascending p-value, then larger foreground coverage
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        self.hgp
            .total_cmp(&other.hgp)
            .then_with(|| other.pos_hit_count.cmp(&self.pos_hit_count))
            .then_with(|| self.forward_site.cmp(&other.forward_site))
    }
}

/// Bucket shift-adjusted matches in a sequence of `seq_len` by forward-strand
/// motif start and return the groups ranked best first.
pub fn aggregate(
    matches: &[PatternMatch],
    kmers: &[Kmer],
    seq_len: usize,
    scorer: &SignificanceScorer,
) -> Vec<KmerGroup> {
    let mut buckets: BTreeMap<i32, Vec<(usize, Strand)>> = BTreeMap::new();
    for m in matches {
        let kmer = &kmers[m.pattern];
        let local = m.strand_start(seq_len, kmer.k()) as i32 - kmer.shift;
        let forward_site = match m.strand {
            Strand::Forward => local,
            Strand::Reverse => seq_len as i32 - 1 - local,
        };
        buckets.entry(forward_site).or_default().push((m.pattern, m.strand));
    }
    let mut groups: Vec<KmerGroup> = buckets
        .into_iter()
        .map(|(forward_site, hits)| KmerGroup::new(&hits, forward_site, seq_len, kmers, scorer))
        .collect();
    groups.sort_by(KmerGroup::cmp_rank);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmer(s: &str, pos: &[usize], neg: &[usize], shift: i32) -> Kmer {
        let mut km = Kmer::new(s.to_string(), pos.iter().copied().collect());
        km.set_neg_hits(neg.iter().copied().collect());
        km.shift = shift;
        km
    }

    #[test]
    fn test_union_of_member_hits() {
        let scorer = SignificanceScorer::new(10, 10);
        let kmers = vec![
            kmer("AAAC", &[0, 1, 2], &[0], 0),
            kmer("AACG", &[2, 3], &[0, 1], 1),
        ];
        let group = KmerGroup::new(
            &[(0, Strand::Forward), (1, Strand::Forward)],
            4,
            12,
            &kmers,
            &scorer,
        );
        assert_eq!(group.pos_hit_count(), 4);
        assert_eq!(group.neg_hit_count(), 2);
        assert_eq!(group.hgp(), scorer.hgp(4, 2));
    }

    #[test]
    fn test_overlapping_kmers_share_a_site() {
        // AAACG with AAAC at shift 0 and AACG at shift 1
        let scorer = SignificanceScorer::new(10, 10);
        let kmers = vec![kmer("AAAC", &[0, 1], &[], 0), kmer("AACG", &[2], &[], 1)];
        let matches = [
            PatternMatch { pattern: 0, start: 3, strand: Strand::Forward },
            PatternMatch { pattern: 1, start: 4, strand: Strand::Forward },
        ];
        let groups = aggregate(&matches, &kmers, 12, &scorer);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].site(), 3);
        assert_eq!(groups[0].members().len(), 2);
        assert_eq!(groups[0].pos_hit_count(), 3);
    }

    #[test]
    fn test_reverse_strand_site() {
        let scorer = SignificanceScorer::new(4, 4);
        let kmers = vec![kmer("AACC", &[0, 1], &[], 0)];
        // forward start 2 in a sequence of 8 is start 2 on the reverse strand
        let matches = [PatternMatch { pattern: 0, start: 2, strand: Strand::Reverse }];
        let groups = aggregate(&matches, &kmers, 8, &scorer);
        assert_eq!(groups[0].strand(), Strand::Reverse);
        assert_eq!(groups[0].site(), 2);
        assert_eq!(groups[0].forward_site(), 5);
    }

    #[test]
    fn test_opposite_strand_hits_at_one_forward_site_merge() {
        let scorer = SignificanceScorer::new(10, 10);
        let mut kmers = vec![kmer("AAAC", &[0, 1], &[], 0), kmer("CCGA", &[2, 3], &[], 0)];
        // AAAC forward at 3; CCGA on the reverse strand starts at 12 - 0 - 4 = 8
        // of the reverse complement, which is 12 - 1 - 8 = 3 on the forward strand
        let matches = [
            PatternMatch { pattern: 0, start: 3, strand: Strand::Forward },
            PatternMatch { pattern: 1, start: 0, strand: Strand::Reverse },
        ];
        let groups = aggregate(&matches, &kmers, 12, &scorer);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].forward_site(), 3);
        assert_eq!(groups[0].members().len(), 2);
        assert_eq!(groups[0].pos_hit_count(), 4);
        assert_eq!(groups[0].hgp(), scorer.hgp(4, 0));

        // strand and local site follow the most significant member
        kmers[0].set_hgp(-1.0);
        kmers[1].set_hgp(-2.0);
        let groups = aggregate(&matches, &kmers, 12, &scorer);
        assert_eq!(groups[0].best_kmer(), 1);
        assert_eq!(groups[0].strand(), Strand::Reverse);
        assert_eq!(groups[0].site(), 8);

        kmers[0].set_hgp(-3.0);
        let groups = aggregate(&matches, &kmers, 12, &scorer);
        assert_eq!(groups[0].best_kmer(), 0);
        assert_eq!(groups[0].strand(), Strand::Forward);
        assert_eq!(groups[0].site(), 3);
    }

    #[test]
    fn test_ranking_prefers_significance_then_coverage() {
        let scorer = SignificanceScorer::new(20, 20);
        let kmers = vec![
            kmer("AAAA", &[0, 1, 2, 3, 4, 5, 6, 7], &[0], 0),
            kmer("CCCC", &[0, 1], &[0, 1, 2], 0),
        ];
        let matches = [
            PatternMatch { pattern: 1, start: 0, strand: Strand::Forward },
            PatternMatch { pattern: 0, start: 6, strand: Strand::Forward },
        ];
        let groups = aggregate(&matches, &kmers, 12, &scorer);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].best_kmer(), 0);
        assert!(groups[0].hgp() < groups[1].hgp());
        assert!(groups[0].score() > 0.0);
    }
}
