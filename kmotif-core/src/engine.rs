//! K-mer search engine over a foreground/background sequence pair
//!
//! Owns the normalized sequence sets and the significance scorer sized for
//! them, plus the current matcher snapshot. Loading a new k-mer list builds a
//! fresh matcher and swaps it in; an empty list returns the engine to the
//! uninitialized state.

use log::{debug, warn};
use std::collections::BTreeSet;

use crate::catalog::KmerCatalog;
use crate::dna::normalize_sequence;
use crate::error::{MotifError, MotifResult};
use crate::group::{aggregate, KmerGroup};
use crate::matcher::MultiPatternMatcher;
use crate::params::CatalogParams;
use crate::pfm::SequenceScorer;
use crate::significance::SignificanceScorer;
use crate::threshold::{ThresholdEstimator, ThresholdReport};
use crate::types::Kmer;

#[derive(Debug, Clone)]
pub enum EngineState {
    Uninitialized,
    Ready {
        matcher: MultiPatternMatcher,
        kmers: Vec<Kmer>,
    },
}

#[derive(Debug, Clone)]
pub struct KmerEngine {
    foreground: Vec<String>,
    background: Vec<String>,
    scorer: SignificanceScorer,
    state: EngineState,
}

impl KmerEngine {
    /// Engine over raw input sequences; each is uppercased and non-`ACGT`
    /// symbols become `N`.
    pub fn new<S: AsRef<str>>(foreground: &[S], background: &[S]) -> Self {
        let foreground: Vec<String> = foreground
            .iter()
            .map(|s| normalize_sequence(s.as_ref()))
            .collect();
        let background: Vec<String> = background
            .iter()
            .map(|s| normalize_sequence(s.as_ref()))
            .collect();
        if foreground.is_empty() {
            warn!("k-mer engine created without foreground sequences");
        }
        if background.is_empty() {
            warn!("k-mer engine created without background sequences");
        }
        let scorer = SignificanceScorer::new(foreground.len(), background.len());
        Self {
            foreground,
            background,
            scorer,
            state: EngineState::Uninitialized,
        }
    }

    pub fn foreground(&self) -> &[String] {
        &self.foreground
    }

    pub fn background(&self) -> &[String] {
        &self.background
    }

    pub fn scorer(&self) -> &SignificanceScorer {
        &self.scorer
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready { .. })
    }

    /// K-mers the current matcher was built from
    pub fn kmers(&self) -> &[Kmer] {
        match &self.state {
            EngineState::Ready { kmers, .. } => kmers,
            EngineState::Uninitialized => &[],
        }
    }

    /// Enriched k-mers of the foreground against the background
    pub fn select_enriched_kmers(&self, params: &CatalogParams) -> MotifResult<KmerCatalog> {
        KmerCatalog::build(&self.foreground, &self.background, &self.scorer, params)
    }

    /// Swap in a matcher built over `kmers` in their current orientation
    pub fn update(&mut self, kmers: Vec<Kmer>) {
        if kmers.is_empty() {
            self.state = EngineState::Uninitialized;
            return;
        }
        let matcher = {
            let patterns: Vec<&str> = kmers.iter().map(Kmer::pattern).collect();
            MultiPatternMatcher::new(&patterns)
        };
        debug!("engine loaded {} k-mers", kmers.len());
        self.state = EngineState::Ready { matcher, kmers };
    }

    /// K-mer groups in `seq`, searched on both strands, best first
    pub fn query(&self, seq: &str) -> MotifResult<Vec<KmerGroup>> {
        match &self.state {
            EngineState::Uninitialized => Err(MotifError::EngineNotReady),
            EngineState::Ready { matcher, kmers } => {
                let bytes = seq.as_bytes();
                let matches = matcher.find_both_strands(bytes);
                Ok(aggregate(&matches, kmers, bytes.len(), &self.scorer))
            }
        }
    }

    /// Score of the best group in each sequence, 0 where nothing matches
    pub fn best_group_scores(&self, sequences: &[String]) -> MotifResult<Vec<f64>> {
        sequences
            .iter()
            .map(|seq| -> MotifResult<f64> {
                Ok(self.query(seq)?.first().map_or(0.0, KmerGroup::score))
            })
            .collect()
    }

    /// Threshold on best-group scores that best separates foreground from background
    pub fn estimate_kgs_threshold(
        &self,
        estimator: &ThresholdEstimator,
    ) -> MotifResult<ThresholdReport> {
        let pos_scores = self.best_group_scores(&self.foreground)?;
        let neg_scores = self.best_group_scores(&self.background)?;
        estimator.estimate(&self.scorer, &pos_scores, &neg_scores)
    }

    /// Threshold on maximum scores of an external sequence scorer
    pub fn estimate_pwm_threshold<M: SequenceScorer>(
        &self,
        model: &M,
        estimator: &ThresholdEstimator,
    ) -> MotifResult<ThresholdReport> {
        let pos_scores: Vec<f64> = self.foreground.iter().map(|s| model.max_score(s)).collect();
        let neg_scores: Vec<f64> = self.background.iter().map(|s| model.max_score(s)).collect();
        estimator.estimate_nonnegative(&self.scorer, &pos_scores, &neg_scores)
    }

    /// Log10 p-values for arbitrary k-mer strings, counted on both strands
    pub fn compute_hgps<S: AsRef<str>>(&self, kmers: &[S]) -> Vec<f64> {
        let (pos_hits, neg_hits) = self.count_hits(kmers);
        pos_hits
            .iter()
            .zip(&neg_hits)
            .map(|(pos, neg)| self.scorer.hgp(pos.len(), neg.len()))
            .collect()
    }

    /// Recount foreground/background membership of `kmers` and rescore them
    pub fn update_kmer_counts(&self, kmers: &mut [Kmer]) {
        let (pos_hits, neg_hits) = {
            let strings: Vec<&str> = kmers.iter().map(Kmer::as_str).collect();
            self.count_hits(&strings)
        };
        for ((kmer, pos), neg) in kmers.iter_mut().zip(pos_hits).zip(neg_hits) {
            kmer.set_pos_hits(pos);
            kmer.set_neg_hits(neg);
            kmer.set_hgp(self.scorer.hgp(kmer.pos_hit_count(), kmer.neg_hit_count()));
        }
    }

    fn count_hits<S: AsRef<str>>(&self, kmers: &[S]) -> (Vec<BTreeSet<usize>>, Vec<BTreeSet<usize>>) {
        let patterns: Vec<String> = kmers.iter().map(|s| s.as_ref().to_ascii_uppercase()).collect();
        let matcher = MultiPatternMatcher::with_reverse_complements(&patterns);
        let count = |sequences: &[String]| {
            let mut hits = vec![BTreeSet::new(); patterns.len()];
            for (id, seq) in sequences.iter().enumerate() {
                for pattern in matcher.patterns_present(seq.as_bytes(), false) {
                    hits[pattern].insert(id);
                }
            }
            hits
        };
        (count(&self.foreground), count(&self.background))
    }
}
