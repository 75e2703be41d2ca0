//! Discover command implementation - enriched k-mers, seed alignment and reports

use anyhow::{Context, Result};
use kmotif_core::dna::gc_ratio;
use kmotif_core::report::{write_aligned, write_cluster_kmers, write_kmers, write_threshold};
use kmotif_core::{
    load_test_sequences, AlignmentEngine, FrequencyMatrix, KmerCluster, KmerEngine,
    MotifThreshold, Strand, ThresholdEstimator, ThresholdReport,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CliError;
use crate::input;

/// Where the foreground and background sequences come from
#[derive(Debug, Clone)]
pub enum SequenceSource {
    Files {
        foreground: PathBuf,
        background: PathBuf,
    },
    Events {
        genome: PathBuf,
        events: PathBuf,
        background_regions: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct RunSummary {
    version: &'static str,
    foreground: usize,
    background: usize,
    catalog_size: usize,
    negative_kmers: usize,
    clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Serialize)]
struct ClusterSummary {
    id: usize,
    seed: String,
    rounds: usize,
    threshold: MotifThreshold,
    aligned: usize,
    kmers: Vec<AlignedKmer>,
    consensus: Option<String>,
    pwm_threshold: Option<MotifThreshold>,
}

#[derive(Debug, Serialize)]
struct AlignedKmer {
    kmer: String,
    shift: i32,
    strand: Strand,
    hgp: f64,
}

/// Frequency matrix built from a cluster and its threshold on the input sets
struct MatrixReport {
    matrix: FrequencyMatrix,
    threshold: ThresholdReport,
}

fn output_path(prefix: &Path, cluster: Option<usize>, name: &str) -> PathBuf {
    let stem = prefix.to_string_lossy();
    match cluster {
        None | Some(0) => PathBuf::from(format!("{}_{}", stem, name)),
        Some(id) => PathBuf::from(format!("{}_{}_{}", stem, id + 1, name)),
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|_| out.flush())
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn load_sequences(config: &Config, source: &SequenceSource) -> Result<(Vec<String>, Vec<String>)> {
    match source {
        SequenceSource::Files { foreground, background } => {
            let fg = input::read_sequences(foreground)?;
            let bg = input::read_sequences(background)?;
            Ok((fg, bg))
        }
        SequenceSource::Events {
            genome,
            events,
            background_regions,
        } => {
            let provider = input::read_genome(genome)?;
            let events = input::read_events(events)?;
            let regions = input::read_regions(background_regions)?;
            let sets = load_test_sequences(
                &provider,
                &events,
                &regions,
                config.events.win_size,
                config.events.neg_region_distance,
            )
            .context("Failed to load event windows")?;
            Ok((sets.foreground, sets.background))
        }
    }
}

fn summarize(cluster: &KmerCluster, matrix: Option<&MatrixReport>) -> ClusterSummary {
    ClusterSummary {
        id: cluster.id,
        seed: cluster.seed.as_str().to_string(),
        rounds: cluster.rounds,
        threshold: cluster.threshold.best,
        aligned: cluster.aligned_count(),
        kmers: cluster
            .kmers
            .iter()
            .map(|km| AlignedKmer {
                kmer: km.pattern().to_string(),
                shift: km.shift,
                strand: km.strand,
                hgp: km.hgp(),
            })
            .collect(),
        consensus: matrix.map(|m| m.matrix.consensus()),
        pwm_threshold: matrix.map(|m| m.threshold.best),
    }
}

pub fn execute(config: &Config, source: SequenceSource, out_prefix: PathBuf) -> Result<()> {
    log::info!("Starting motif discovery");

    let (foreground, background) = load_sequences(config, &source)?;
    log::info!(
        "{} foreground sequences (GC {:.2}), {} background sequences (GC {:.2})",
        foreground.len(),
        gc_ratio(&foreground),
        background.len(),
        gc_ratio(&background)
    );

    let params = config.discovery_params();
    params.validate().map_err(CliError::from)?;

    let mut engine = KmerEngine::new(&foreground, &background);
    let catalog = engine
        .select_enriched_kmers(&params.catalog)
        .context("Failed to select enriched k-mers")?;
    write_file(&output_path(&out_prefix, None, "kmers.txt"), |out| {
        write_kmers(out, catalog.kmers())
    })?;

    let clusters = {
        let mut aligner = AlignmentEngine::new(&catalog, &mut engine, &params)?;
        aligner.discover().context("Motif alignment failed")?
    };
    if clusters.is_empty() {
        log::warn!("No enriched motif found");
    }

    let estimator = ThresholdEstimator::new(params.align.threads)?;
    let mut summaries = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        let id = Some(cluster.id);
        write_file(&output_path(&out_prefix, id, "cluster_kmers.txt"), |out| {
            write_cluster_kmers(out, cluster)
        })?;
        write_file(&output_path(&out_prefix, id, "aligned.txt"), |out| {
            write_aligned(out, cluster, &foreground)
        })?;
        write_file(&output_path(&out_prefix, id, "kgs_threshold.txt"), |out| {
            write_threshold(out, &cluster.threshold)
        })?;

        let matrix = if config.output.frequency_matrix {
            build_matrix(cluster, &foreground, &engine, &estimator)?
        } else {
            None
        };
        if let Some(report) = &matrix {
            write_file(&output_path(&out_prefix, id, "pfm.txt"), |out| {
                out.write_all(report.matrix.to_table().as_bytes())
            })?;
            write_file(&output_path(&out_prefix, id, "pwm_threshold.txt"), |out| {
                write_threshold(out, &report.threshold)
            })?;
        }
        summaries.push(summarize(cluster, matrix.as_ref()));
    }

    if config.output.json_summary {
        let summary = RunSummary {
            version: kmotif_core::VERSION,
            foreground: foreground.len(),
            background: background.len(),
            catalog_size: catalog.len(),
            negative_kmers: catalog.negatives().len(),
            clusters: summaries,
        };
        write_file(&output_path(&out_prefix, None, "summary.json"), |out| {
            serde_json::to_writer_pretty(&mut *out, &summary).map_err(std::io::Error::from)
        })?;
    }

    log::info!("Motif discovery completed: {} cluster(s)", clusters.len());
    Ok(())
}

/// Frequency matrix over the cluster's k-mer span, scored on both input sets.
///
/// Returns `None` when no aligned sequence covers the whole span.
fn build_matrix(
    cluster: &KmerCluster,
    foreground: &[String],
    engine: &KmerEngine,
    estimator: &ThresholdEstimator,
) -> Result<Option<MatrixReport>> {
    let (left, width) = cluster.span();
    let sites = cluster.aligned_sites(foreground, left, width);
    if sites.is_empty() {
        log::warn!("cluster #{}: no aligned site spans the motif", cluster.id);
        return Ok(None);
    }
    let matrix = FrequencyMatrix::from_aligned(&sites)?;
    let threshold = engine.estimate_pwm_threshold(&matrix, estimator)?;
    log::info!(
        "cluster #{}: consensus {} from {} sites, PWM threshold {:.2} ({}+/{}-)",
        cluster.id,
        matrix.consensus(),
        matrix.sites(),
        threshold.best.score,
        threshold.best.pos_hit,
        threshold.best.neg_hit
    );
    Ok(Some(MatrixReport { matrix, threshold }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_paths() {
        let prefix = Path::new("/tmp/run");
        assert_eq!(output_path(prefix, None, "kmers.txt"), PathBuf::from("/tmp/run_kmers.txt"));
        assert_eq!(output_path(prefix, Some(0), "aligned.txt"), PathBuf::from("/tmp/run_aligned.txt"));
        assert_eq!(output_path(prefix, Some(1), "aligned.txt"), PathBuf::from("/tmp/run_2_aligned.txt"));
    }

    #[test]
    fn test_discover_writes_reports() -> Result<()> {
        let dir = TempDir::new()?;
        let fg_path = dir.path().join("fg.txt");
        let bg_path = dir.path().join("bg.txt");

        // 16 sequences with the motif on alternating strands, 4 without
        let fg: Vec<String> = (0..20)
            .map(|i| {
                let flank = ["CCTTCC", "TCCTTC", "CTTCCT"][i % 3];
                if i >= 16 {
                    "C".repeat(20)
                } else if i % 2 == 0 {
                    format!("{}GGATTACA{}", flank, flank)
                } else {
                    format!("{}TGTAATCC{}", flank, flank)
                }
            })
            .collect();
        let bg: Vec<String> = (0..12).map(|_| "CCTTCCCTTCTCCTTCTC".to_string()).collect();
        std::fs::write(&fg_path, fg.join("\n"))?;
        std::fs::write(&bg_path, bg.join("\n"))?;

        let mut config = Config::default();
        config.catalog.k = 6;
        config.general.threads = 1;
        let prefix = dir.path().join("run");
        execute(
            &config,
            SequenceSource::Files {
                foreground: fg_path,
                background: bg_path,
            },
            prefix.clone(),
        )?;

        let kmers = std::fs::read_to_string(output_path(&prefix, None, "kmers.txt"))?;
        assert!(kmers.starts_with("#kmer\tfg_hits\tbg_hits\tlog10_hgp"));
        assert!(kmers.contains("GATTAC") || kmers.contains("GTAATC"));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output_path(&prefix, None, "summary.json"))?)?;
        assert_eq!(summary["foreground"], 20);
        let clusters = summary["clusters"].as_array().expect("clusters array");
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0]["aligned"], 16);
        assert!(output_path(&prefix, Some(0), "aligned.txt").exists());
        assert!(output_path(&prefix, Some(0), "kgs_threshold.txt").exists());
        Ok(())
    }
}
