//! Significance-optimal score threshold search
//!
//! For every distinct foreground score the number of foreground and
//! background sequences scoring at or above it is counted, and the cutoff
//! with the smallest hyper-geometric p-value wins. Candidate p-values are
//! computed on a fixed pool of workers that pull indices from a shared queue
//! and write into disjoint pre-allocated slots.

use log::debug;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::error::{MotifError, MotifResult};
use crate::significance::SignificanceScorer;
use crate::types::MotifThreshold;

/// Minimum foreground over size-scaled background ratio for a cutoff to be scored
const MIN_FOLD: f64 = 2.0;

/// One evaluated cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub score: f64,
    pub pos_hit: usize,
    pub neg_hit: usize,
    pub hgp: f64,
}

/// Every distinct foreground score with its counts, plus the chosen cutoff
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub rows: Vec<ThresholdRow>,
    pub best: MotifThreshold,
}

pub struct ThresholdEstimator {
    pool: ThreadPool,
}

impl std::fmt::Debug for ThresholdEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdEstimator")
            .field("threads", &self.threads())
            .finish()
    }
}

impl ThresholdEstimator {
    /// Estimator with `threads` workers; 0 uses one per available core.
    pub fn new(threads: usize) -> MotifResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("kmotif-hgp-{i}"))
            .build()
            .map_err(|e| MotifError::invalid_params(format!("cannot start worker pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Best cutoff over all distinct foreground scores
    pub fn estimate(
        &self,
        scorer: &SignificanceScorer,
        pos_scores: &[f64],
        neg_scores: &[f64],
    ) -> MotifResult<ThresholdReport> {
        self.estimate_from(scorer, pos_scores, neg_scores, f64::NEG_INFINITY)
    }

    /// Best cutoff over non-negative foreground scores only.
    ///
    /// Returns the zero sentinel when every foreground score is negative.
    pub fn estimate_nonnegative(
        &self,
        scorer: &SignificanceScorer,
        pos_scores: &[f64],
        neg_scores: &[f64],
    ) -> MotifResult<ThresholdReport> {
        self.estimate_from(scorer, pos_scores, neg_scores, 0.0)
    }

    fn estimate_from(
        &self,
        scorer: &SignificanceScorer,
        pos_scores: &[f64],
        neg_scores: &[f64],
        min_score: f64,
    ) -> MotifResult<ThresholdReport> {
        let mut pos_sorted = pos_scores.to_vec();
        pos_sorted.sort_by(f64::total_cmp);
        let mut neg_sorted = neg_scores.to_vec();
        neg_sorted.sort_by(f64::total_cmp);

        let mut unique: Vec<f64> = pos_sorted
            .iter()
            .copied()
            .filter(|&s| s >= min_score)
            .collect();
        unique.dedup();
        if unique.is_empty() {
            return Ok(ThresholdReport::default());
        }

        let pos_hits: Vec<usize> = unique.iter().map(|&s| count_at_least(&pos_sorted, s)).collect();
        let neg_hits: Vec<usize> = unique.iter().map(|&s| count_at_least(&neg_sorted, s)).collect();

        let pos_total = scorer.pos_total() as f64;
        let neg_total = scorer.neg_total() as f64;
        // highest cutoff first
        let candidates: VecDeque<usize> = (0..unique.len())
            .rev()
            .filter(|&i| {
                if neg_total > 0.0 {
                    pos_hits[i] as f64 > neg_hits[i] as f64 * MIN_FOLD * pos_total / neg_total
                } else {
                    pos_hits[i] > 0
                }
            })
            .collect();
        debug!(
            "scoring {} of {} candidate thresholds on {} workers",
            candidates.len(),
            unique.len(),
            self.threads()
        );

        let mut hgps = self.score_candidates(scorer, &pos_hits, &neg_hits, candidates)?;
        // the lowest cutoff admits every foreground sequence
        hgps[0] = 0.0;

        let mut best_idx = 0;
        for (i, &hgp) in hgps.iter().enumerate() {
            if hgp <= hgps[best_idx] {
                best_idx = i;
            }
        }

        let rows = unique
            .iter()
            .zip(pos_hits.iter().zip(&neg_hits))
            .zip(&hgps)
            .map(|((&score, (&pos_hit, &neg_hit)), &hgp)| ThresholdRow {
                score,
                pos_hit,
                neg_hit,
                hgp,
            })
            .collect();
        let best = MotifThreshold {
            score: unique[best_idx],
            pos_hit: pos_hits[best_idx],
            neg_hit: neg_hits[best_idx],
            hgp: hgps[best_idx],
        };
        Ok(ThresholdReport { rows, best })
    }

    fn score_candidates(
        &self,
        scorer: &SignificanceScorer,
        pos_hits: &[usize],
        neg_hits: &[usize],
        candidates: VecDeque<usize>,
    ) -> MotifResult<Vec<f64>> {
        let total = pos_hits.len();
        let dispatched: Vec<usize> = candidates.iter().copied().collect();
        let queue = Mutex::new(candidates);
        let slots: Vec<OnceLock<f64>> = (0..total).map(|_| OnceLock::new()).collect();

        self.pool.scope(|s| {
            for _ in 0..self.pool.current_num_threads() {
                s.spawn(|_| loop {
                    let next = queue.lock().pop_front();
                    let Some(i) = next else { break };
                    let _ = slots[i].set(scorer.hgp(pos_hits[i], neg_hits[i]));
                });
            }
        });

        let mut hgps = vec![0.0; total];
        for index in dispatched {
            hgps[index] = slots[index]
                .get()
                .copied()
                .ok_or(MotifError::WorkerFailure { index, total })?;
        }
        Ok(hgps)
    }
}

/// Number of entries in ascending `sorted` that are `>= value`
fn count_at_least(sorted: &[f64], value: f64) -> usize {
    sorted.len() - sorted.partition_point(|&s| s < value)
}
