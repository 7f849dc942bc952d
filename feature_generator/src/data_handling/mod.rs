//! Read-only reference tables shared by every file of a run.

pub mod consequence_rules;
pub mod gene_lengths;
pub mod interactions;
pub mod phenotype_genes;

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use csv::StringRecord;
use tracing::{error, info};

use crate::config::ReferencePaths;
use crate::error::{FeatureError, Result};
use crate::models::StageKind;

use self::consequence_rules::ConsequenceRules;
use self::gene_lengths::GeneLengthTable;
use self::interactions::InteractionScoreTable;
use self::phenotype_genes::PhenotypeGeneSet;

/// A CSV-backed lookup table loaded once before any file is processed.
pub trait ReferenceTable: Sized {
    /// Short name used in logs.
    const NAME: &'static str;

    fn load(path: &Path) -> Result<Self>;
}

pub(crate) fn open_csv(path: &Path) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| FeatureError::ReferenceCsv {
            path: path.to_path_buf(),
            source,
        })
}

/// `" Unique Null  Consequences "` -> `"Unique_Null_Consequences"`
pub(crate) fn normalise_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Index of the first header (after normalisation) matching one of `aliases`.
pub(crate) fn header_position(
    headers: &StringRecord,
    aliases: &[&str],
    path: &Path,
) -> Result<usize> {
    let normalised: Vec<String> = headers.iter().map(normalise_header).collect();
    aliases
        .iter()
        .find_map(|alias| normalised.iter().position(|h| h == alias))
        .ok_or_else(|| FeatureError::ReferenceContent {
            path: path.to_path_buf(),
            message: format!("expected one of the columns {aliases:?}, found {normalised:?}"),
        })
}

fn load_table<T: ReferenceTable>(path: &Path) -> Result<Arc<T>> {
    info!("Reading {} from {}", T::NAME, path.display());
    match T::load(path) {
        Ok(table) => Ok(Arc::new(table)),
        Err(e) => {
            error!("Failed to read {}: {}", T::NAME, e);
            Err(e)
        }
    }
}

/// The reference tables needed by the stages of one run. Tables no requested
/// stage uses are not loaded.
#[derive(Debug, Default, Clone)]
pub struct ReferenceData {
    null_rules: Option<Arc<ConsequenceRules>>,
    nonnull_rules: Option<Arc<ConsequenceRules>>,
    gene_lengths: Option<Arc<GeneLengthTable>>,
    phenotype_genes: Option<Arc<PhenotypeGeneSet>>,
    interactions: Option<Arc<InteractionScoreTable>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    NullRules,
    NonNullRules,
    GeneLengths,
    PhenotypeGenes,
    Interactions,
}

fn tables_for(stage: StageKind) -> &'static [Table] {
    match stage {
        StageKind::GeneFeatures => &[Table::NullRules, Table::GeneLengths, Table::PhenotypeGenes],
        StageKind::GeneScore => &[Table::GeneLengths],
        StageKind::Phenotype => &[Table::PhenotypeGenes],
        StageKind::Digenic => &[Table::Interactions],
        StageKind::CaddImputation => &[Table::NullRules, Table::NonNullRules],
        StageKind::Cri | StageKind::RarePairs => &[],
    }
}

impl ReferenceData {
    pub fn load(stages: &[StageKind], paths: &ReferencePaths) -> Result<Self> {
        let needed: HashSet<Table> = stages
            .iter()
            .flat_map(|stage| tables_for(*stage).iter().copied())
            .collect();

        let mut data = ReferenceData::default();
        if needed.contains(&Table::NullRules) {
            data.null_rules = Some(load_table(&paths.null_rules)?);
        }
        if needed.contains(&Table::NonNullRules) {
            data.nonnull_rules = Some(load_table(&paths.nonnull_rules)?);
        }
        if needed.contains(&Table::GeneLengths) {
            data.gene_lengths = Some(load_table(&paths.gene_lengths)?);
        }
        if needed.contains(&Table::PhenotypeGenes) {
            data.phenotype_genes = Some(load_table(&paths.phenotype_genes)?);
        }
        if needed.contains(&Table::Interactions) {
            data.interactions = Some(load_table(&paths.interactions)?);
        }
        Ok(data)
    }

    #[cfg(test)]
    pub fn with_interactions(mut self, table: InteractionScoreTable) -> Self {
        self.interactions = Some(Arc::new(table));
        self
    }

    pub fn null_rules(&self) -> Result<Arc<ConsequenceRules>> {
        self.null_rules
            .clone()
            .ok_or(FeatureError::ReferenceNotLoaded("null CADD_PHRED rules"))
    }

    pub fn nonnull_rules(&self) -> Result<Arc<ConsequenceRules>> {
        self.nonnull_rules
            .clone()
            .ok_or(FeatureError::ReferenceNotLoaded("non-null CADD_PHRED rules"))
    }

    pub fn gene_lengths(&self) -> Result<Arc<GeneLengthTable>> {
        self.gene_lengths
            .clone()
            .ok_or(FeatureError::ReferenceNotLoaded(GeneLengthTable::NAME))
    }

    pub fn phenotype_genes(&self) -> Result<Arc<PhenotypeGeneSet>> {
        self.phenotype_genes
            .clone()
            .ok_or(FeatureError::ReferenceNotLoaded(PhenotypeGeneSet::NAME))
    }

    pub fn interactions(&self) -> Result<Arc<InteractionScoreTable>> {
        self.interactions
            .clone()
            .ok_or(FeatureError::ReferenceNotLoaded(InteractionScoreTable::NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_trimmed_and_underscored() {
        assert_eq!(normalise_header(" Unique Null Consequences "), "Unique_Null_Consequences");
        assert_eq!(normalise_header("CADD_PHRED imputed"), "CADD_PHRED_imputed");
    }

    #[test]
    fn header_aliases_are_tried_in_order() {
        let headers = StringRecord::from(vec!["Consequence", "CADD_PHEDD"]);
        let path = Path::new("rules.csv");
        assert_eq!(header_position(&headers, &["CADD_PHRED", "CADD_PHEDD"], path).unwrap(), 1);
        assert!(header_position(&headers, &["gene_id"], path).is_err());
    }

    #[test]
    fn stages_without_reference_data_load_nothing() {
        let paths = ReferencePaths::default().resolved(Path::new("/nowhere"));
        let data = ReferenceData::load(&[StageKind::Cri, StageKind::RarePairs], &paths).unwrap();
        assert!(matches!(
            data.interactions(),
            Err(FeatureError::ReferenceNotLoaded(_))
        ));
    }
}
