//! Hyper-geometric enrichment significance
//!
//! Scores how unlikely it is that `pos_hit` of the `pos_hit + neg_hit`
//! sequences carrying a feature landed in the foreground by chance, when
//! foreground and background sets are sampled without replacement. Results are
//! log10 p-values, so more negative means more significant.

use std::f64::consts::LN_10;

/// Pseudo-counts applied when a feature has no background hit. They are added
/// to the set sizes as well as to the hit counts, so the tail is taken over a
/// consistent `(pos_total + 2, neg_total + 1)` table.
const PSEUDO_POS_HITS: usize = 2;
const PSEUDO_NEG_HITS: usize = 1;

/// Above this the complement `1 - cdf` loses too many digits
const COMPLEMENT_LIMIT: f64 = 0.99;

/// Log10 hyper-geometric p-values for fixed foreground/background set sizes.
///
/// Holds a log-factorial table sized for the two sets, so a single scorer can
/// be shared read-only across threshold workers.
#[derive(Debug, Clone)]
pub struct SignificanceScorer {
    pos_total: usize,
    neg_total: usize,
    ln_factorial: Vec<f64>,
}

impl SignificanceScorer {
    pub fn new(pos_total: usize, neg_total: usize) -> Self {
        let population = pos_total + neg_total + PSEUDO_POS_HITS + PSEUDO_NEG_HITS;
        let mut ln_factorial = Vec::with_capacity(population + 1);
        ln_factorial.push(0.0);
        let mut acc = 0.0f64;
        for i in 1..=population {
            acc += (i as f64).ln();
            ln_factorial.push(acc);
        }
        Self {
            pos_total,
            neg_total,
            ln_factorial,
        }
    }

    pub fn pos_total(&self) -> usize {
        self.pos_total
    }

    pub fn neg_total(&self) -> usize {
        self.neg_total
    }

    /// Background/foreground size ratio
    pub fn np_ratio(&self) -> f64 {
        if self.pos_total == 0 {
            0.0
        } else {
            self.neg_total as f64 / self.pos_total as f64
        }
    }

    /// Log10 probability of seeing at least `pos_hit` foreground hits.
    ///
    /// Hits above the set sizes are clamped to the set sizes.
    pub fn hgp(&self, pos_hit: usize, neg_hit: usize) -> f64 {
        let (pos_total, neg_total, pos_hit, neg_hit) = if neg_hit == 0 {
            (
                self.pos_total + PSEUDO_POS_HITS,
                self.neg_total + PSEUDO_NEG_HITS,
                pos_hit.min(self.pos_total) + PSEUDO_POS_HITS,
                PSEUDO_NEG_HITS,
            )
        } else {
            (
                self.pos_total,
                self.neg_total,
                pos_hit.min(self.pos_total),
                neg_hit.min(self.neg_total),
            )
        };
        self.upper_tail_log10(pos_total + neg_total, pos_hit + neg_hit, pos_total, pos_hit)
    }

    /// log10 P(X >= x) for X ~ HyperGeometric(population, successes, draws)
    fn upper_tail_log10(&self, population: usize, successes: usize, draws: usize, x: usize) -> f64 {
        let lo = (draws + successes).saturating_sub(population);
        let hi = successes.min(draws);
        if x <= lo {
            return 0.0;
        }
        if x > hi {
            return f64::NEG_INFINITY;
        }

        let upper_terms = hi - x + 1;
        let lower_terms = x - lo;
        if lower_terms < upper_terms {
            let cdf: f64 = (lo..x)
                .map(|i| self.ln_pmf(population, successes, draws, i).exp())
                .sum();
            if cdf < COMPLEMENT_LIMIT {
                return (1.0 - cdf).min(1.0).log10();
            }
        } else {
            let tail: f64 = (x..=hi)
                .map(|i| self.ln_pmf(population, successes, draws, i).exp())
                .sum();
            if tail > f64::MIN_POSITIVE {
                return tail.min(1.0).log10();
            }
        }
        self.upper_tail_log10_precise(population, successes, draws, x, hi)
    }

    /// Log-domain series for tails too small (or too close to 1) for `f64` sums
    fn upper_tail_log10_precise(
        &self,
        population: usize,
        successes: usize,
        draws: usize,
        x: usize,
        hi: usize,
    ) -> f64 {
        let terms: Vec<f64> = (x..=hi)
            .map(|i| self.ln_pmf(population, successes, draws, i))
            .collect();
        let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        let sum: f64 = terms.iter().map(|t| (t - max).exp()).sum();
        ((max + sum.ln()) / LN_10).min(0.0)
    }

    fn ln_pmf(&self, population: usize, successes: usize, draws: usize, i: usize) -> f64 {
        self.ln_choose(successes, i) + self.ln_choose(population - successes, draws - i)
            - self.ln_choose(population, draws)
    }

    fn ln_choose(&self, n: usize, k: usize) -> f64 {
        if k > n {
            return f64::NEG_INFINITY;
        }
        self.ln_factorial[n] - self.ln_factorial[k] - self.ln_factorial[n - k]
    }
}

/// One-off log10 p-value; prefer a shared [`SignificanceScorer`] in loops.
pub fn compute_hgp(pos_total: usize, neg_total: usize, pos_hit: usize, neg_hit: usize) -> f64 {
    SignificanceScorer::new(pos_total, neg_total).hgp(pos_hit, neg_hit)
}
