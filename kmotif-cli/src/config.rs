//! Configuration handling for the kmotif CLI
//!
//! Supports loading configuration from kmotif.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use kmotif_core::{AlignParams, CatalogParams, DiscoveryParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub align: AlignConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads for the threshold search
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// K-mer length
    #[serde(default = "default_k")]
    pub k: usize,

    /// Minimum number of foreground sequences containing a k-mer
    #[serde(default = "default_min_hit_count")]
    pub min_hit_count: usize,

    /// Log10 p-value a k-mer must reach
    #[serde(default = "default_hgp_threshold")]
    pub hgp_threshold: f64,

    /// Minimum fold enrichment over the size-scaled background
    #[serde(default = "default_k_fold")]
    pub k_fold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Number of clustering attempts
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,

    /// Refinement rounds per attempt
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Seed k-mer to try first
    #[serde(default)]
    pub preferred_seed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Window width around each binding event
    #[serde(default = "default_win_size")]
    pub win_size: usize,

    /// Background regions closer than this to an event are dropped
    #[serde(default = "default_neg_region_distance")]
    pub neg_region_distance: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON summary of every cluster
    #[serde(default = "default_true")]
    pub json_summary: bool,

    /// Build a frequency matrix from the first cluster's aligned sites
    #[serde(default = "default_true")]
    pub frequency_matrix: bool,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_k() -> usize { CatalogParams::default().k }
fn default_min_hit_count() -> usize { CatalogParams::default().min_hit_count }
fn default_hgp_threshold() -> f64 { CatalogParams::default().hgp_threshold }
fn default_k_fold() -> f64 { CatalogParams::default().k_fold }
fn default_max_clusters() -> usize { AlignParams::default().max_clusters }
fn default_max_rounds() -> usize { AlignParams::default().max_rounds }
fn default_win_size() -> usize { 100 }
fn default_neg_region_distance() -> usize { 500 }
fn default_true() -> bool { true }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: default_threads() }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_hit_count: default_min_hit_count(),
            hgp_threshold: default_hgp_threshold(),
            k_fold: default_k_fold(),
        }
    }
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_clusters: default_max_clusters(),
            max_rounds: default_max_rounds(),
            preferred_seed: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            win_size: default_win_size(),
            neg_region_distance: default_neg_region_distance(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_summary: true,
            frequency_matrix: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            catalog: CatalogConfig::default(),
            align: AlignConfig::default(),
            events: EventsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("kmotif.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: kmotif.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")
    }

    /// Core parameters for a discovery run
    pub fn discovery_params(&self) -> DiscoveryParams {
        DiscoveryParams {
            catalog: CatalogParams {
                k: self.catalog.k,
                min_hit_count: self.catalog.min_hit_count,
                hgp_threshold: self.catalog.hgp_threshold,
                k_fold: self.catalog.k_fold,
            },
            align: AlignParams {
                max_clusters: self.align.max_clusters,
                threads: self.general.threads,
                preferred_seed: self.align.preferred_seed.clone(),
                max_rounds: self.align.max_rounds,
            },
        }
    }
}
