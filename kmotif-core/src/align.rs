//! Seed-driven k-mer alignment
//!
//! One clustering attempt walks a small state machine:
//!
//! ```text
//! SeedSelection -> InitialPlacement -> Refine -> Converged | Abandoned
//! ```
//!
//! The seed k-mer fixes a shared coordinate frame. Every round collects the
//! positions of all k-mers near the seed in the aligned sequences, gives each
//! k-mer its most frequent shift and orientation, rebuilds the engine over
//! those k-mers and re-places the sequences from their best k-mer group. The
//! loop keeps going while the best group-score threshold keeps getting more
//! significant.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::KmerCatalog;
use crate::dna::reverse_complement_str;
use crate::engine::KmerEngine;
use crate::error::MotifResult;
use crate::matcher::MultiPatternMatcher;
use crate::params::DiscoveryParams;
use crate::threshold::{ThresholdEstimator, ThresholdReport};
use crate::types::{Kmer, KmerId, Strand};

type PositionIndex = BTreeMap<KmerId, BTreeSet<(i32, Strand)>>;

/// A foreground sequence and its placement in the cluster frame.
///
/// A k-mer hit is stored as `(start, orientation)` where `orientation` is
/// `Reverse` when the catalog string's reverse complement matched.
#[derive(Debug, Clone)]
pub struct Sequence {
    id: usize,
    seq: String,
    rc: String,
    f_pos: PositionIndex,
    r_pos: PositionIndex,
    pos: Option<i32>,
    strand: Strand,
    score: f64,
}

impl Sequence {
    fn new(id: usize, seq: &str) -> Self {
        Self {
            id,
            seq: seq.to_string(),
            rc: reverse_complement_str(seq),
            f_pos: BTreeMap::new(),
            r_pos: BTreeMap::new(),
            pos: None,
            strand: Strand::Forward,
            score: 0.0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Offset of the sequence start in the cluster frame, `None` if unaligned
    pub fn position(&self) -> Option<i32> {
        self.pos
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// The sequence in its aligned orientation
    pub fn oriented(&self) -> &str {
        match self.strand {
            Strand::Forward => &self.seq,
            Strand::Reverse => &self.rc,
        }
    }

    fn kmer_positions(&self) -> &PositionIndex {
        match self.strand {
            Strand::Forward => &self.f_pos,
            Strand::Reverse => &self.r_pos,
        }
    }

    fn reset(&mut self) {
        self.pos = None;
        self.score = 0.0;
    }

    fn place(&mut self, pos: i32, strand: Strand, score: f64) {
        self.pos = Some(pos);
        self.strand = strand;
        self.score = score;
    }

    fn placement(&self) -> SequencePlacement {
        SequencePlacement {
            id: self.id,
            position: self.pos,
            strand: self.strand,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencePlacement {
    pub id: usize,
    pub position: Option<i32>,
    pub strand: Strand,
    pub score: f64,
}

/// The result of one converged clustering attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmerCluster {
    pub id: usize,
    pub seed: Kmer,
    /// Aligned k-mers with their resolved shift and orientation
    pub kmers: Vec<Kmer>,
    /// Catalog ids of `kmers`, in the same order
    pub kmer_ids: Vec<KmerId>,
    pub threshold: ThresholdReport,
    /// One entry per foreground sequence
    pub placements: Vec<SequencePlacement>,
    pub rounds: usize,
}

impl KmerCluster {
    /// Log10 p-value of the best group-score threshold
    pub fn hgp(&self) -> f64 {
        self.threshold.best.hgp
    }

    pub fn aligned_count(&self) -> usize {
        self.placements.iter().filter(|p| p.position.is_some()).count()
    }

    /// Smallest placement offset among aligned sequences
    pub fn leftmost(&self) -> Option<i32> {
        self.placements.iter().filter_map(|p| p.position).min()
    }

    /// Frame interval `(left, width)` covered by the aligned k-mers
    pub fn span(&self) -> (i32, usize) {
        let left = self.kmers.iter().map(|km| km.shift).min().unwrap_or(0);
        let right = self
            .kmers
            .iter()
            .map(|km| km.shift + km.k() as i32)
            .max()
            .unwrap_or(left);
        (left, (right - left).max(0) as usize)
    }

    /// Sites of `width` bases starting at frame offset `left`, cut from every
    /// aligned sequence that covers the whole interval.
    pub fn aligned_sites<S: AsRef<str>>(&self, sequences: &[S], left: i32, width: usize) -> Vec<String> {
        let mut sites = Vec::new();
        for placement in &self.placements {
            let (Some(pos), Some(seq)) = (placement.position, sequences.get(placement.id)) else {
                continue;
            };
            let oriented = match placement.strand {
                Strand::Forward => seq.as_ref().to_string(),
                Strand::Reverse => reverse_complement_str(seq.as_ref()),
            };
            let start = left - pos;
            let end = start + width as i32;
            if start < 0 || end as usize > oriented.len() {
                continue;
            }
            let bytes = &oriented.as_bytes()[start as usize..end as usize];
            sites.push(String::from_utf8_lossy(bytes).into_owned());
        }
        sites
    }
}

/// K-mers and group-score threshold of one refinement round
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementRound {
    pub kmer_ids: Vec<KmerId>,
    /// Consensus k-mers at their most frequent shift and orientation
    pub kmers: Vec<Kmer>,
    pub threshold: ThresholdReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome {
    Converged(KmerCluster),
    /// No usable seed remained; carries the reason
    Abandoned(String),
}

#[derive(Debug)]
enum AlignState {
    SeedSelection,
    InitialPlacement(KmerId),
    Refine {
        seed: KmerId,
        round: usize,
        best: Option<KmerCluster>,
    },
    Converged(KmerCluster),
    Abandoned(String),
}

/// Aligns the foreground sequences of a [`KmerEngine`] around catalog seeds.
///
/// The engine is borrowed mutably because every refinement round swaps in a
/// matcher over the round's k-mers.
pub struct AlignmentEngine<'a> {
    catalog: &'a KmerCatalog,
    engine: &'a mut KmerEngine,
    estimator: ThresholdEstimator,
    params: DiscoveryParams,
    sequences: Vec<Sequence>,
    candidates: Vec<KmerId>,
    tried: BTreeSet<KmerId>,
    clustered: BTreeSet<KmerId>,
    attempts: usize,
}

impl<'a> AlignmentEngine<'a> {
    pub fn new(
        catalog: &'a KmerCatalog,
        engine: &'a mut KmerEngine,
        params: &DiscoveryParams,
    ) -> MotifResult<Self> {
        params.validate()?;
        let estimator = ThresholdEstimator::new(params.align.threads)?;
        let (sequences, candidates) = index_sequences(catalog, engine.foreground());
        debug!(
            "indexed {} sequences against {} of {} catalog k-mers",
            sequences.len(),
            candidates.len(),
            catalog.len()
        );
        Ok(Self {
            catalog,
            engine,
            estimator,
            params: params.clone(),
            sequences,
            candidates,
            tried: BTreeSet::new(),
            clustered: BTreeSet::new(),
            attempts: 0,
        })
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn estimator(&self) -> &ThresholdEstimator {
        &self.estimator
    }

    /// Run up to `max_clusters` attempts, stopping at the first abandoned one.
    ///
    /// On return the engine is loaded with the first cluster's k-mers.
    pub fn discover(&mut self) -> MotifResult<Vec<KmerCluster>> {
        let mut clusters: Vec<KmerCluster> = Vec::new();
        while clusters.len() < self.params.align.max_clusters {
            match self.run_attempt(clusters.len())? {
                AlignmentOutcome::Converged(cluster) => {
                    info!(
                        "cluster #{}: seed {}, {} k-mers, {}/{} sequences aligned, hgp={:.1}",
                        cluster.id,
                        cluster.seed.as_str(),
                        cluster.kmers.len(),
                        cluster.aligned_count(),
                        cluster.placements.len(),
                        cluster.hgp()
                    );
                    self.clustered.extend(cluster.kmer_ids.iter().copied());
                    clusters.push(cluster);
                }
                AlignmentOutcome::Abandoned(reason) => {
                    info!("stopped after {} cluster(s): {}", clusters.len(), reason);
                    break;
                }
            }
        }
        match clusters.first() {
            Some(first) => self.engine.update(first.kmers.clone()),
            None => self.engine.update(Vec::new()),
        }
        Ok(clusters)
    }

    /// One clustering attempt, driven through the alignment states
    pub fn run_attempt(&mut self, cluster_id: usize) -> MotifResult<AlignmentOutcome> {
        let mut state = AlignState::SeedSelection;
        loop {
            state = match state {
                AlignState::SeedSelection => match self.select_seed() {
                    Some(seed) => AlignState::InitialPlacement(seed),
                    None => AlignState::Abandoned(
                        "no untried k-mer passes the significance threshold".to_string(),
                    ),
                },
                AlignState::InitialPlacement(seed) => {
                    self.place_by_seed(seed);
                    AlignState::Refine {
                        seed,
                        round: 0,
                        best: None,
                    }
                }
                AlignState::Refine { seed, round, best } => {
                    self.refine(cluster_id, seed, round, best)?
                }
                AlignState::Converged(cluster) => {
                    self.attempts += 1;
                    return Ok(AlignmentOutcome::Converged(cluster));
                }
                AlignState::Abandoned(reason) => {
                    self.attempts += 1;
                    return Ok(AlignmentOutcome::Abandoned(reason));
                }
            };
        }
    }

    /// One further refinement round starting from `cluster`'s placements.
    ///
    /// Consensus k-mers are collected again from the restored placements and
    /// scored; sequences are not re-placed. Returns `None` when no k-mer lies
    /// in the seed window. The engine is left loaded with the round's k-mers.
    pub fn refine_once(&mut self, cluster: &KmerCluster) -> MotifResult<Option<RefinementRound>> {
        for (seq, placement) in self.sequences.iter_mut().zip(&cluster.placements) {
            seq.reset();
            if let Some(pos) = placement.position {
                seq.place(pos, placement.strand, placement.score);
            }
        }
        let own: BTreeSet<KmerId> = cluster.kmer_ids.iter().copied().collect();
        let excluded: BTreeSet<KmerId> = self.clustered.difference(&own).copied().collect();
        let consensus = self.consensus_kmers(&excluded);
        self.score_round(consensus)
    }

    fn select_seed(&mut self) -> Option<KmerId> {
        let catalog = self.catalog;
        let threshold = self.params.catalog.hgp_threshold;
        let usable = |id: KmerId| {
            !self.tried.contains(&id)
                && !self.clustered.contains(&id)
                && catalog.kmers()[id].hgp() <= threshold
        };

        let mut seed = None;
        if self.attempts == 0 {
            if let Some(preferred) = &self.params.align.preferred_seed {
                match catalog.find(&preferred.to_ascii_uppercase()) {
                    Some(id) if self.candidates.contains(&id) && usable(id) => seed = Some(id),
                    _ => warn!("preferred seed {} is not a usable seed k-mer, ignored", preferred),
                }
            }
        }
        let seed = seed.or_else(|| self.candidates.iter().copied().find(|&id| usable(id)))?;

        self.tried.insert(seed);
        let kmer = &catalog.kmers()[seed];
        info!(
            "seed k-mer {} ({}+/{}-, hgp={:.1})",
            kmer.as_str(),
            kmer.pos_hit_count(),
            kmer.neg_hit_count(),
            kmer.hgp()
        );
        Some(seed)
    }

    fn place_by_seed(&mut self, seed: KmerId) {
        let pattern = self.catalog.kmers()[seed].as_str();
        for seq in &mut self.sequences {
            seq.reset();
            if let Some(idx) = seq.seq.find(pattern) {
                seq.place(-(idx as i32), Strand::Forward, 0.0);
            } else if let Some(idx) = seq.rc.find(pattern) {
                seq.place(-(idx as i32), Strand::Reverse, 0.0);
            }
        }
        let aligned = self.sequences.iter().filter(|s| s.pos.is_some()).count();
        debug!("seed placed {}/{} sequences", aligned, self.sequences.len());
    }

    /// Every k-mer seen near the seed, at its most frequent shift and orientation
    fn consensus_kmers(&self, excluded: &BTreeSet<KmerId>) -> Vec<(KmerId, Kmer)> {
        let half = (self.catalog.k() / 2) as i32;
        let mut votes: BTreeMap<KmerId, BTreeMap<(i32, Strand), usize>> = BTreeMap::new();
        for seq in &self.sequences {
            let Some(offset) = seq.pos else { continue };
            for (&id, hits) in seq.kmer_positions() {
                if excluded.contains(&id) {
                    continue;
                }
                for &(start, strand) in hits {
                    let frame = start + offset;
                    if (-half..=half).contains(&frame) {
                        *votes.entry(id).or_default().entry((frame, strand)).or_default() += 1;
                    }
                }
            }
        }

        votes
            .into_iter()
            .filter_map(|(id, counts)| {
                // most votes, then closest to the seed, then forward, then leftmost
                let (&(shift, strand), _) = counts.iter().max_by(|a, b| {
                    a.1.cmp(b.1)
                        .then_with(|| b.0 .0.abs().cmp(&a.0 .0.abs()))
                        .then_with(|| b.0 .1.cmp(&a.0 .1))
                        .then_with(|| b.0 .0.cmp(&a.0 .0))
                })?;
                Some((id, self.catalog.kmers()[id].aligned(shift, strand)))
            })
            .collect()
    }

    fn refine(
        &mut self,
        cluster_id: usize,
        seed: KmerId,
        round: usize,
        best: Option<KmerCluster>,
    ) -> MotifResult<AlignState> {
        let consensus = self.consensus_kmers(&self.clustered);
        let Some(RefinementRound {
            kmer_ids,
            kmers,
            threshold: report,
        }) = self.score_round(consensus)?
        else {
            debug!("round {}: no k-mer inside the seed window", round);
            return Ok(Self::finish(best));
        };
        let best_hgp = best.as_ref().map_or(0.0, KmerCluster::hgp);
        info!(
            "cluster #{} round {}: {} k-mers, threshold {:.2} ({}+/{}-), hgp={:.1}",
            cluster_id,
            round,
            kmers.len(),
            report.best.score,
            report.best.pos_hit,
            report.best.neg_hit,
            report.best.hgp
        );
        if report.best.hgp >= best_hgp {
            debug!("round {}: no improvement over hgp={:.1}", round, best_hgp);
            return Ok(Self::finish(best));
        }

        self.place_by_groups(report.best.score)?;
        let cluster = KmerCluster {
            id: cluster_id,
            seed: self.catalog.kmers()[seed].aligned(0, Strand::Forward),
            kmers,
            kmer_ids,
            threshold: report,
            placements: self.sequences.iter().map(Sequence::placement).collect(),
            rounds: round + 1,
        };
        if round + 1 >= self.params.align.max_rounds {
            warn!("cluster #{}: stopped after {} rounds", cluster_id, round + 1);
            return Ok(AlignState::Converged(cluster));
        }
        Ok(AlignState::Refine {
            seed,
            round: round + 1,
            best: Some(cluster),
        })
    }

    /// Load the consensus k-mers into the engine and estimate their threshold
    fn score_round(&mut self, consensus: Vec<(KmerId, Kmer)>) -> MotifResult<Option<RefinementRound>> {
        if consensus.is_empty() {
            return Ok(None);
        }
        let (kmer_ids, kmers): (Vec<KmerId>, Vec<Kmer>) = consensus.into_iter().unzip();
        self.engine.update(kmers.clone());
        let threshold = self.engine.estimate_kgs_threshold(&self.estimator)?;
        Ok(Some(RefinementRound {
            kmer_ids,
            kmers,
            threshold,
        }))
    }

    /// The last improving snapshot, or another seed if there was none
    fn finish(best: Option<KmerCluster>) -> AlignState {
        match best {
            Some(cluster) => AlignState::Converged(cluster),
            None => {
                debug!("seed never improved significance, selecting another");
                AlignState::SeedSelection
            }
        }
    }

    /// Re-place each sequence from its best k-mer group if it clears `threshold`
    fn place_by_groups(&mut self, threshold: f64) -> MotifResult<()> {
        for seq in &mut self.sequences {
            seq.reset();
            let groups = self.engine.query(&seq.seq)?;
            if let Some(group) = groups.first() {
                if group.hgp() <= -threshold {
                    seq.place(-group.site(), group.strand(), group.score());
                }
            }
        }
        Ok(())
    }
}

/// Positions of every catalog k-mer (either orientation) on both strands of
/// each sequence, plus the ids of k-mers found anywhere.
fn index_sequences(catalog: &KmerCatalog, foreground: &[String]) -> (Vec<Sequence>, Vec<KmerId>) {
    let patterns: Vec<&str> = catalog.kmers().iter().map(Kmer::as_str).collect();
    let matcher = MultiPatternMatcher::with_reverse_complements(&patterns);
    let mut found = BTreeSet::new();
    let sequences = foreground
        .iter()
        .enumerate()
        .map(|(id, raw)| {
            let mut seq = Sequence::new(id, raw);
            for m in matcher.find_all(seq.seq.as_bytes()) {
                seq.f_pos.entry(m.pattern).or_default().insert((m.start as i32, m.strand));
                found.insert(m.pattern);
            }
            for m in matcher.find_all(seq.rc.as_bytes()) {
                seq.r_pos.entry(m.pattern).or_default().insert((m.start as i32, m.strand));
            }
            seq
        })
        .collect();
    (sequences, found.into_iter().collect())
}
