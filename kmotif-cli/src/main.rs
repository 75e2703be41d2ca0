use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod input;

use commands::discover::SequenceSource;
use config::Config;
use error::{format_error_with_suggestions, CliError};

#[derive(Parser)]
#[command(name = "kmotif")]
#[command(about = "De novo k-mer motif discovery")]
#[command(version)]
#[command(long_about = "
kmotif finds k-mers enriched in a foreground sequence set over a background
set, aligns them around the most significant seed k-mer and reports the
resulting motif cluster.

Examples:
  kmotif discover --fg peaks.fa --bg shuffled.fa --out results/ctcf
  kmotif discover --genome hg19.fa --events events.txt --bg-regions random.txt --out run
  kmotif config --example > kmotif.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select enriched k-mers and align them into motif clusters
    Discover {
        /// Foreground sequences (one per line, or FASTA/FASTQ)
        #[arg(long, conflicts_with = "genome")]
        fg: Option<PathBuf>,

        /// Background sequences (one per line, or FASTA/FASTQ)
        #[arg(long, conflicts_with = "genome")]
        bg: Option<PathBuf>,

        /// Genome FASTA to cut event windows from
        #[arg(long, requires_all = ["events", "bg_regions"])]
        genome: Option<PathBuf>,

        /// Binding events, one 'chrom:position' per line
        #[arg(long)]
        events: Option<PathBuf>,

        /// Candidate background regions, one 'chrom:start-end' per line
        #[arg(long)]
        bg_regions: Option<PathBuf>,

        /// Output prefix for all reports
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// K-mer length
        #[arg(short, long)]
        k: Option<usize>,

        /// Log10 p-value a k-mer must reach
        #[arg(long, allow_hyphen_values = true)]
        hgp: Option<f64>,

        /// Minimum fold enrichment over background
        #[arg(long)]
        k_fold: Option<f64>,

        /// Minimum number of foreground sequences per k-mer
        #[arg(long)]
        min_hits: Option<usize>,

        /// Number of motif clusters to attempt
        #[arg(long)]
        clusters: Option<usize>,

        /// Seed k-mer to try first
        #[arg(long)]
        seed: Option<String>,

        /// Window width around each event
        #[arg(long)]
        win_size: Option<usize>,
    },

    /// Print or write configuration
    Config {
        /// Print an example configuration file
        #[arg(long)]
        example: bool,

        /// Write the configuration in effect to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(threads) = cli.threads {
        config.general.threads = threads;
    }

    match cli.command {
        Commands::Discover {
            fg,
            bg,
            genome,
            events,
            bg_regions,
            out,
            k,
            hgp,
            k_fold,
            min_hits,
            clusters,
            seed,
            win_size,
        } => {
            if let Some(k) = k {
                config.catalog.k = k;
            }
            if let Some(hgp) = hgp {
                config.catalog.hgp_threshold = hgp;
            }
            if let Some(k_fold) = k_fold {
                config.catalog.k_fold = k_fold;
            }
            if let Some(min_hits) = min_hits {
                config.catalog.min_hit_count = min_hits;
            }
            if let Some(clusters) = clusters {
                config.align.max_clusters = clusters;
            }
            if seed.is_some() {
                config.align.preferred_seed = seed;
            }
            if let Some(win_size) = win_size {
                config.events.win_size = win_size;
            }

            let source = match (fg, bg, genome, events, bg_regions) {
                (Some(foreground), Some(background), None, _, _) => SequenceSource::Files {
                    foreground,
                    background,
                },
                (None, None, Some(genome), Some(events), Some(background_regions)) => {
                    SequenceSource::Events {
                        genome,
                        events,
                        background_regions,
                    }
                }
                _ => bail!("Provide either --fg and --bg, or --genome with --events and --bg-regions"),
            };

            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
            commands::discover::execute(&config, source, out)?;
        }

        Commands::Config { example, save } => {
            if example {
                print!("{}", Config::example_toml()?);
            }
            if let Some(path) = save {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => eprintln!("Error: {}", format_error_with_suggestions(cli_err)),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}
