//! Parameters for k-mer selection and motif alignment

use serde::{Deserialize, Serialize};

use crate::error::{MotifError, MotifResult};

/// Parameters controlling which k-mers enter the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogParams {
    /// K-mer length
    pub k: usize,
    /// Minimum number of foreground sequences a k-mer must occur in
    pub min_hit_count: usize,
    /// Log10 hyper-geometric p-value a k-mer must reach to count as enriched
    pub hgp_threshold: f64,
    /// Minimum fold enrichment of foreground over size-scaled background hits
    pub k_fold: f64,
}

impl Default for CatalogParams {
    fn default() -> Self {
        Self {
            k: 8,
            min_hit_count: 3,
            hgp_threshold: -3.0,
            k_fold: 3.0,
        }
    }
}

impl CatalogParams {
    pub fn validate(&self) -> MotifResult<()> {
        if self.k == 0 || self.k > 32 {
            return Err(MotifError::invalid_params(format!(
                "k-mer size must be between 1 and 32, got {}",
                self.k
            )));
        }
        if !self.hgp_threshold.is_finite() || self.hgp_threshold > 0.0 {
            return Err(MotifError::invalid_params(format!(
                "significance threshold must be a log10 p-value <= 0, got {}",
                self.hgp_threshold
            )));
        }
        if !self.k_fold.is_finite() || self.k_fold < 0.0 {
            return Err(MotifError::invalid_params(format!(
                "fold enrichment must be non-negative, got {}",
                self.k_fold
            )));
        }
        Ok(())
    }

    /// Membership floor actually applied; singletons are never informative.
    pub fn effective_min_hit_count(&self) -> usize {
        self.min_hit_count.max(2)
    }
}

/// Parameters for seed selection and alignment refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignParams {
    /// Maximum number of clustering attempts
    pub max_clusters: usize,
    /// Worker count for the threshold search (0 = one per available core)
    pub threads: usize,
    /// Seed string to prefer in the first attempt, in either orientation
    pub preferred_seed: Option<String>,
    /// Safety cap on refinement rounds per attempt
    pub max_rounds: usize,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            max_clusters: 1,
            threads: 0,
            preferred_seed: None,
            max_rounds: 100,
        }
    }
}

impl AlignParams {
    pub fn validate(&self) -> MotifResult<()> {
        if self.max_clusters == 0 {
            return Err(MotifError::invalid_params("max_clusters must be at least 1"));
        }
        if self.max_rounds == 0 {
            return Err(MotifError::invalid_params("max_rounds must be at least 1"));
        }
        Ok(())
    }
}

/// Complete parameter set for one discovery run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscoveryParams {
    pub catalog: CatalogParams,
    pub align: AlignParams,
}

impl DiscoveryParams {
    pub fn validate(&self) -> MotifResult<()> {
        self.catalog.validate()?;
        self.align.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DiscoveryParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_k_size() {
        let params = CatalogParams { k: 0, ..Default::default() };
        assert!(params.validate().is_err());
        let params = CatalogParams { k: 40, ..Default::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_positive_threshold_rejected() {
        let params = CatalogParams { hgp_threshold: 1.0, ..Default::default() };
        assert!(matches!(params.validate(), Err(MotifError::InvalidParams(_))));
    }

    #[test]
    fn test_min_hit_floor() {
        let params = CatalogParams { min_hit_count: 1, ..Default::default() };
        assert_eq!(params.effective_min_hit_count(), 2);
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let params = AlignParams { max_clusters: 0, ..Default::default() };
        assert!(params.validate().is_err());
    }
}
