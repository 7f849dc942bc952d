//! Run configuration: reference table locations, column names and thresholds.
//!
//! Loaded from a JSON file where every field is optional, e.g.
//!
//! ```json
//! {
//!   "references": { "gene_lengths": "feature_data/gene_length_GRCh38_113.csv" },
//!   "genotype": { "after": "samples_hom" },
//!   "thresholds": { "rare_af": 0.01 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::models::StageKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub references: ReferencePaths,
    pub columns: ColumnNames,
    pub genotype: GenotypeLocator,
    /// Substring of the genotype field marking a heterozygous call.
    pub heterozygous_marker: HeterozygousMarker,
    pub thresholds: Thresholds,
    pub rare_pair_source: RarePairSource,
    /// Remove rows without a gene id before scoring. Unset: `gene-features`
    /// drops them, `gene-score` keeps them with an empty score.
    pub drop_missing_gene: Option<bool>,
    /// Only process input files whose name starts with this prefix.
    pub file_prefix: Option<String>,
}

impl PipelineConfig {
    pub fn drops_missing_gene(&self, stage: StageKind) -> bool {
        self.drop_missing_gene.unwrap_or(stage == StageKind::GeneFeatures)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|source| FeatureError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePaths {
    pub gene_lengths: PathBuf,
    pub phenotype_genes: PathBuf,
    pub null_rules: PathBuf,
    pub nonnull_rules: PathBuf,
    pub interactions: PathBuf,
}

impl Default for ReferencePaths {
    fn default() -> Self {
        Self {
            gene_lengths: "feature_data/gene_length_GRCh38_113.csv".into(),
            phenotype_genes: "feature_data/gene_mapping.csv".into(),
            null_rules: "feature_data/null_cadd_phred_rules.csv".into(),
            nonnull_rules: "feature_data/cadd_phred_rules.csv".into(),
            interactions: "feature_data/specific_digenic_combination.csv".into(),
        }
    }
}

impl ReferencePaths {
    /// Anchor relative paths at `root`; absolute paths are kept.
    pub fn resolved(&self, root: &Path) -> Self {
        let anchor = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        Self {
            gene_lengths: anchor(&self.gene_lengths),
            phenotype_genes: anchor(&self.phenotype_genes),
            null_rules: anchor(&self.null_rules),
            nonnull_rules: anchor(&self.nonnull_rules),
            interactions: anchor(&self.interactions),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub gene: String,
    pub symbol: String,
    pub af: String,
    pub cadd: String,
    pub consequence: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            gene: "Gene".into(),
            symbol: "SYMBOL".into(),
            af: "AF".into(),
            cadd: "CADD_PHRED".into(),
            consequence: "Consequence".into(),
        }
    }
}

/// How the per-sample genotype column is found in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenotypeLocator {
    /// A column with exactly this name.
    Named(String),
    /// The column directly to the right of this anchor column.
    After(String),
}

impl Default for GenotypeLocator {
    fn default() -> Self {
        GenotypeLocator::After("samples_hom".into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeterozygousMarker(pub String);

impl Default for HeterozygousMarker {
    fn default() -> Self {
        HeterozygousMarker("0/1".into())
    }
}

impl AsRef<str> for HeterozygousMarker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A variant is rare when `AF < rare_af`.
    pub rare_af: f64,
    /// A pair counts when `af1 * af2 <= pair_product`.
    pub pair_product: f64,
    /// Reference frequency for the AF-product term of the gene score.
    pub disease_frequency: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rare_af: 0.01,
            pair_product: 0.001,
            disease_frequency: 0.001,
        }
    }
}

/// Which AF values of a candidate gene are paired up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarePairSource {
    /// Only the rare heterozygous rows that made the gene a candidate.
    Qualifying,
    /// Every non-missing AF of the candidate gene.
    #[default]
    AllGeneVariants,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.columns.symbol, "SYMBOL");
        assert_eq!(cfg.genotype, GenotypeLocator::After("samples_hom".into()));
        assert_eq!(cfg.heterozygous_marker.as_ref(), "0/1");
        assert_eq!(cfg.thresholds.rare_af, 0.01);
        assert_eq!(cfg.rare_pair_source, RarePairSource::AllGeneVariants);
        assert!(cfg.drops_missing_gene(StageKind::GeneFeatures));
        assert!(!cfg.drops_missing_gene(StageKind::GeneScore));
    }

    #[test]
    fn explicit_gene_drop_applies_to_every_stage() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{ "drop_missing_gene": false }"#).unwrap();
        assert!(!cfg.drops_missing_gene(StageKind::GeneFeatures));

        let cfg: PipelineConfig = serde_json::from_str(r#"{ "drop_missing_gene": true }"#).unwrap();
        assert!(cfg.drops_missing_gene(StageKind::GeneScore));
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let raw = r#"{
            "genotype": { "named": "GT" },
            "thresholds": { "pair_product": 1e-5 },
            "rare_pair_source": "qualifying",
            "references": { "interactions": "/data/string_pairs.csv" }
        }"#;
        let cfg: PipelineConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.genotype, GenotypeLocator::Named("GT".into()));
        assert_eq!(cfg.thresholds.pair_product, 1e-5);
        assert_eq!(cfg.thresholds.rare_af, 0.01);
        assert_eq!(cfg.rare_pair_source, RarePairSource::Qualifying);

        let resolved = cfg.references.resolved(Path::new("/project"));
        assert_eq!(resolved.interactions, PathBuf::from("/data/string_pairs.csv"));
        assert_eq!(
            resolved.gene_lengths,
            PathBuf::from("/project/feature_data/gene_length_GRCh38_113.csv")
        );
    }
}
