//! Position frequency counting over aligned sites

use serde::{Deserialize, Serialize};

use crate::dna::{nucleotide_index, reverse_complement};
use crate::error::{MotifError, MotifResult};

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Per-column pseudo-count spread evenly over the four bases
const PSEUDO_COUNT: f64 = 1.0;
const UNIFORM: f64 = 0.25;

/// Anything that assigns a best-site score to a whole sequence
pub trait SequenceScorer {
    fn max_score(&self, seq: &str) -> f64;
}

/// Base counts per aligned column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMatrix {
    counts: Vec<[u32; 4]>,
    sites: usize,
}

impl FrequencyMatrix {
    /// Count bases column by column; every line must have the length of the first.
    ///
    /// `N` and other ambiguous symbols are not counted.
    pub fn from_aligned<S: AsRef<str>>(lines: &[S]) -> MotifResult<Self> {
        let first = lines
            .first()
            .ok_or_else(|| MotifError::invalid_sequence("no aligned sites to count"))?;
        let width = first.as_ref().len();
        if width == 0 {
            return Err(MotifError::invalid_sequence("aligned sites are empty"));
        }
        let mut counts = vec![[0u32; 4]; width];
        for line in lines {
            let line = line.as_ref();
            if line.len() != width {
                return Err(MotifError::Parse {
                    line: line.to_string(),
                    expected: width,
                    found: line.len(),
                });
            }
            for (column, &b) in counts.iter_mut().zip(line.as_bytes()) {
                let idx = nucleotide_index(b);
                if idx < 4 {
                    column[idx] += 1;
                }
            }
        }
        Ok(Self {
            counts,
            sites: lines.len(),
        })
    }

    pub fn width(&self) -> usize {
        self.counts.len()
    }

    pub fn sites(&self) -> usize {
        self.sites
    }

    pub fn counts(&self) -> &[[u32; 4]] {
        &self.counts
    }

    /// Most frequent base per column, `N` where a column is empty
    pub fn consensus(&self) -> String {
        self.counts
            .iter()
            .map(|column| {
                let (best, &count) = column
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                    .unwrap_or((0, &0));
                if count == 0 {
                    'N'
                } else {
                    BASES[best]
                }
            })
            .collect()
    }

    /// Log2 odds of each base against a uniform background
    pub fn log_odds(&self) -> Vec<[f64; 4]> {
        self.counts
            .iter()
            .map(|column| {
                let total: u32 = column.iter().sum();
                let mut row = [0.0; 4];
                for (score, &count) in row.iter_mut().zip(column) {
                    let freq = (count as f64 + PSEUDO_COUNT * UNIFORM) / (total as f64 + PSEUDO_COUNT);
                    *score = (freq / UNIFORM).log2();
                }
                row
            })
            .collect()
    }

    /// Tab-separated counts, one row per base
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for (b, base) in BASES.iter().enumerate() {
            out.push(*base);
            for column in &self.counts {
                out.push('\t');
                out.push_str(&column[b].to_string());
            }
            out.push('\n');
        }
        out
    }

    fn window_score(log_odds: &[[f64; 4]], window: &[u8]) -> f64 {
        log_odds
            .iter()
            .zip(window)
            .map(|(row, &b)| {
                let idx = nucleotide_index(b);
                if idx < 4 {
                    row[idx]
                } else {
                    0.0
                }
            })
            .sum()
    }
}

impl SequenceScorer for FrequencyMatrix {
    /// Best window score on either strand; `-inf` for sequences shorter than the matrix
    fn max_score(&self, seq: &str) -> f64 {
        let width = self.width();
        if seq.len() < width {
            return f64::NEG_INFINITY;
        }
        let log_odds = self.log_odds();
        let forward = seq.as_bytes();
        let reverse = reverse_complement(forward);
        forward
            .windows(width)
            .chain(reverse.windows(width))
            .map(|w| Self::window_score(&log_odds, w))
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
