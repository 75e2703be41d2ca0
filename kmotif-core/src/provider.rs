//! Genomic regions, binding events and sequence retrieval

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dna::normalize_sequence;
use crate::error::{MotifError, MotifResult};

/// Closed interval `[start, end]` on a chromosome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new<S: Into<String>>(chrom: S, start: usize, end: usize) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    pub fn width(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.chrom == other.chrom && self.start <= other.end && other.start <= self.end
    }
}

/// A single-base binding event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub chrom: String,
    pub position: usize,
}

impl Event {
    pub fn new<S: Into<String>>(chrom: S, position: usize) -> Self {
        Self {
            chrom: chrom.into(),
            position,
        }
    }

    /// Region reaching `radius` bases to either side, clipped at 0
    pub fn expand(&self, radius: usize) -> Region {
        Region::new(
            self.chrom.clone(),
            self.position.saturating_sub(radius),
            self.position + radius,
        )
    }
}

/// Source of genomic sequence
pub trait SequenceProvider {
    fn fetch(&self, region: &Region) -> MotifResult<String>;
}

/// Whole chromosomes held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    chroms: HashMap<String, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, chrom: S, sequence: &str) {
        self.chroms.insert(chrom.into(), normalize_sequence(sequence));
    }
}

impl SequenceProvider for InMemoryProvider {
    fn fetch(&self, region: &Region) -> MotifResult<String> {
        let chrom = self
            .chroms
            .get(&region.chrom)
            .ok_or_else(|| MotifError::provider(format!("unknown chromosome {}", region.chrom)))?;
        if region.start > region.end || region.end >= chrom.len() {
            return Err(MotifError::provider(format!(
                "region {}:{}-{} is outside chromosome of length {}",
                region.chrom,
                region.start,
                region.end,
                chrom.len()
            )));
        }
        Ok(chrom[region.start..=region.end].to_string())
    }
}

/// Foreground and background sequence sets for one discovery run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSequences {
    pub foreground: Vec<String>,
    pub background: Vec<String>,
}

/// Fetch windows around `events` and background windows away from them.
///
/// Foreground windows span `win_size / 2` bases to each side of an event.
/// Background regions within `neg_region_distance` of any event are dropped;
/// the rest are truncated to `win_size + 1` bases and capped at the number
/// of foreground sequences.
pub fn load_test_sequences<P: SequenceProvider>(
    provider: &P,
    events: &[Event],
    background_regions: &[Region],
    win_size: usize,
    neg_region_distance: usize,
) -> MotifResult<TestSequences> {
    let foreground = events
        .iter()
        .map(|event| provider.fetch(&event.expand(win_size / 2)))
        .map(|seq| seq.map(|s| normalize_sequence(&s)))
        .collect::<MotifResult<Vec<_>>>()?;

    let impact: Vec<Region> = events.iter().map(|e| e.expand(neg_region_distance)).collect();
    let mut background = Vec::new();
    for region in background_regions {
        if background.len() == foreground.len() {
            break;
        }
        if impact.iter().any(|r| r.overlaps(region)) {
            debug!("background region {}:{}-{} overlaps an event", region.chrom, region.start, region.end);
            continue;
        }
        let mut seq = normalize_sequence(&provider.fetch(region)?);
        seq.truncate(win_size + 1);
        background.push(seq);
    }
    info!(
        "loaded {} foreground and {} background sequences",
        foreground.len(),
        background.len()
    );
    Ok(TestSequences {
        foreground,
        background,
    })
}
