//! KMotif Core Library
//!
//! Enriched k-mer selection, strand-aware multi-pattern matching,
//! hyper-geometric significance and seed-driven motif alignment.

pub mod types;
pub mod dna;
pub mod error;
pub mod params;
pub mod significance;
pub mod matcher;
pub mod catalog;
pub mod group;
pub mod engine;
pub mod threshold;
pub mod align;
pub mod pfm;
pub mod provider;
pub mod report;

// Re-export commonly used types and functions
pub use types::{Kmer, KmerId, MotifThreshold, Strand};
pub use error::{MotifError, MotifResult};
pub use params::{AlignParams, CatalogParams, DiscoveryParams};
pub use significance::{compute_hgp, SignificanceScorer};
pub use matcher::{MultiPatternMatcher, PatternMatch};
pub use catalog::KmerCatalog;
pub use group::KmerGroup;
pub use engine::{EngineState, KmerEngine};
pub use threshold::{ThresholdEstimator, ThresholdReport, ThresholdRow};
pub use align::{AlignmentEngine, AlignmentOutcome, KmerCluster, RefinementRound, SequencePlacement};
pub use pfm::{FrequencyMatrix, SequenceScorer};
pub use provider::{load_test_sequences, Event, InMemoryProvider, Region, SequenceProvider};

/// Version information for the KMotif core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
