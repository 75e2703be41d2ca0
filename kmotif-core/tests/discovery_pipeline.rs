use kmotif_core::dna::reverse_complement_str;
use kmotif_core::{
    AlignmentEngine, AlignmentOutcome, CatalogParams, DiscoveryParams, FrequencyMatrix,
    Kmer, KmerCatalog, KmerEngine, SequenceScorer, Strand, ThresholdEstimator,
};
use std::collections::BTreeSet;

const MOTIF: &str = "GGATTACA";
const CORE: [&str; 3] = ["GGATTA", "GATTAC", "ATTACA"];

/// xorshift64* so the planted data set is identical on every run
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() >> 33) as usize % n
    }

    fn dna(&mut self, len: usize) -> String {
        (0..len).map(|_| ['A', 'C', 'G', 'T'][self.below(4)]).collect()
    }
}

/// 50 foreground sequences, the first 40 carrying the motif on alternating
/// strands, and 40 background sequences without it
fn planted() -> (Vec<String>, Vec<String>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let mut foreground = Vec::new();
    for i in 0..50 {
        let mut seq = rng.dna(60);
        if i >= 40 {
            foreground.push(seq);
            continue;
        }
        let site = 10 + rng.below(36);
        let motif = if i % 2 == 0 {
            MOTIF.to_string()
        } else {
            reverse_complement_str(MOTIF)
        };
        seq.replace_range(site..site + MOTIF.len(), &motif);
        foreground.push(seq);
    }
    let background = (0..40).map(|_| rng.dna(60)).collect();
    (foreground, background)
}

fn params() -> DiscoveryParams {
    DiscoveryParams {
        catalog: CatalogParams {
            k: 6,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn is_core(kmer: &str) -> bool {
    CORE.iter()
        .any(|c| *c == kmer || reverse_complement_str(c) == kmer)
}

#[test]
fn planted_motif_is_recovered() {
    let (fg, bg) = planted();
    let params = params();
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog = engine.select_enriched_kmers(&params.catalog).unwrap();

    for core in CORE {
        let id = catalog.find(core).expect("core k-mer selected");
        let km = &catalog.kmers()[id];
        assert!((0..40).all(|seq| km.pos_hits().contains(&seq)));
    }
    assert!(is_core(catalog.kmers()[0].as_str()));

    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    let cluster = match aligner.run_attempt(0).unwrap() {
        AlignmentOutcome::Converged(cluster) => cluster,
        AlignmentOutcome::Abandoned(reason) => panic!("abandoned: {reason}"),
    };

    assert!(is_core(cluster.seed.as_str()));
    assert!(cluster.hgp() < -5.0, "hgp {}", cluster.hgp());
    assert!(cluster.aligned_count() >= 30, "aligned {}", cluster.aligned_count());
    let half = (catalog.k() / 2) as i32;
    assert!(cluster.kmers.iter().all(|km| km.shift.abs() <= half));

    // the three core k-mers tile the motif one base apart
    let shifts: BTreeSet<i32> = cluster
        .kmers
        .iter()
        .filter(|km| is_core(km.as_str()))
        .map(|km| km.shift)
        .collect();
    assert_eq!(shifts.len(), 3);
    let span: Vec<i32> = shifts.into_iter().collect();
    assert_eq!(span[2] - span[0], 2);
}

#[test]
fn converged_cluster_is_a_fixed_point() {
    let (fg, bg) = planted();
    let params = params();
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog = engine.select_enriched_kmers(&params.catalog).unwrap();
    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    let cluster = match aligner.run_attempt(0).unwrap() {
        AlignmentOutcome::Converged(cluster) => cluster,
        AlignmentOutcome::Abandoned(reason) => panic!("abandoned: {reason}"),
    };

    // consensus recomputed from the converged placements
    let next = aligner
        .refine_once(&cluster)
        .unwrap()
        .expect("k-mers in the seed window");
    let resolved = |ids: &[usize], kmers: &[Kmer]| -> Vec<(usize, i32, Strand)> {
        ids.iter()
            .zip(kmers)
            .map(|(&id, km)| (id, km.shift, km.strand))
            .collect()
    };
    assert_eq!(
        resolved(&next.kmer_ids, &next.kmers),
        resolved(&cluster.kmer_ids, &cluster.kmers)
    );
    assert_eq!(next.threshold.best.hgp, cluster.hgp());
    assert_eq!(next.threshold.best.score, cluster.threshold.best.score);
}

#[test]
fn later_attempts_never_reuse_clustered_kmers() {
    let (fg, bg) = planted();
    let mut params = params();
    params.align.max_clusters = 3;
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog = engine.select_enriched_kmers(&params.catalog).unwrap();
    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    let clusters = aligner.discover().unwrap();
    assert!(!clusters.is_empty() && clusters.len() <= 3);

    let mut seen = BTreeSet::new();
    for cluster in &clusters {
        for id in &cluster.kmer_ids {
            assert!(seen.insert(*id), "k-mer {id} in two clusters");
        }
    }
    // engine is left loaded with the first cluster
    assert!(engine.is_ready());
    assert_eq!(engine.kmers(), clusters[0].kmers.as_slice());
}

#[test]
fn preferred_seed_is_used_in_either_orientation() {
    let (fg, bg) = planted();
    let mut params = params();
    params.align.preferred_seed = Some(reverse_complement_str("ATTACA").to_lowercase());
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog = engine.select_enriched_kmers(&params.catalog).unwrap();
    let expected = catalog.find("ATTACA").unwrap();
    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    match aligner.run_attempt(0).unwrap() {
        AlignmentOutcome::Converged(cluster) => {
            assert_eq!(cluster.seed.as_str(), catalog.kmers()[expected].as_str());
        }
        AlignmentOutcome::Abandoned(reason) => panic!("abandoned: {reason}"),
    }
}

#[test]
fn aligned_sites_build_a_frequency_matrix() {
    let (fg, bg) = planted();
    let params = params();
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog = engine.select_enriched_kmers(&params.catalog).unwrap();
    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    let clusters = aligner.discover().unwrap();
    let cluster = &clusters[0];

    let (left, width) = cluster.span();
    let sites = cluster.aligned_sites(&fg, left, width);
    assert!(!sites.is_empty());
    let pfm = FrequencyMatrix::from_aligned(&sites).unwrap();
    let consensus = pfm.consensus();
    assert!(
        consensus.contains("GATTAC") || consensus.contains(&reverse_complement_str("GATTAC")),
        "consensus {consensus}"
    );

    assert!(pfm.max_score(&fg[0]) > pfm.max_score("NNNNNNNNNNNNNNNNNNNN"));

    let estimator = ThresholdEstimator::new(2).expect("thread pool");
    let report = engine
        .estimate_pwm_threshold(&pfm, &estimator)
        .expect("pwm threshold");
    assert!(report.best.hgp < -5.0, "pwm hgp {}", report.best.hgp);
    assert!(report.best.pos_hit >= 30);
}

#[test]
fn empty_catalog_abandons_discovery() {
    let (fg, bg) = planted();
    let params = DiscoveryParams {
        catalog: CatalogParams {
            k: 6,
            hgp_threshold: -500.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut engine = KmerEngine::new(&fg, &bg);
    let catalog: KmerCatalog = engine.select_enriched_kmers(&params.catalog).unwrap();
    assert!(catalog.is_empty());
    assert!(catalog.is_negative_kmer("GATTAC"));
    let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params).unwrap();
    assert!(matches!(aligner.run_attempt(0).unwrap(), AlignmentOutcome::Abandoned(_)));
}
