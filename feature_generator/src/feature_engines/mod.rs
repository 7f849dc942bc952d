//! One engine per pipeline stage. Each turns a sample table into the same
//! table plus its derived columns.

pub mod cri;
pub mod digenic;
pub mod gene_features;
pub mod gene_score;
pub mod imputation;
pub mod phenotype;
pub mod rare_pairs;

use polars::prelude::DataFrame;

use crate::config::PipelineConfig;
use crate::data_handling::ReferenceData;
use crate::error::Result;
use crate::models::{StageKind, StageOutcome};

/// A stage applied to one table at a time. Engines only hold read-only
/// reference data, so one instance serves every worker.
pub trait FeatureEngine: Send + Sync {
    fn stage(&self) -> StageKind;

    fn apply(&self, df: DataFrame) -> Result<StageOutcome>;
}

pub fn build_engine(
    stage: StageKind,
    references: &ReferenceData,
    config: &PipelineConfig,
) -> Result<Box<dyn FeatureEngine>> {
    let columns = config.columns.clone();
    let engine: Box<dyn FeatureEngine> = match stage {
        StageKind::GeneFeatures => Box::new(gene_features::GeneFeatures::new(
            references.null_rules()?,
            references.gene_lengths()?,
            references.phenotype_genes()?,
            config,
        )),
        StageKind::GeneScore => Box::new(gene_score::GeneScoring::new(
            references.gene_lengths()?,
            columns,
            config.thresholds.disease_frequency,
            config.drops_missing_gene(StageKind::GeneScore),
        )),
        StageKind::Phenotype => Box::new(phenotype::PhenotypeAnnotation::new(
            references.phenotype_genes()?,
            columns,
        )),
        StageKind::Digenic => Box::new(digenic::DigenicScoring::new(references.interactions()?, columns)),
        StageKind::Cri => Box::new(cri::CriAdjustment::new(columns)),
        StageKind::CaddImputation => Box::new(imputation::CaddImputation::new(
            references.null_rules()?,
            references.nonnull_rules()?,
            columns,
        )),
        StageKind::RarePairs => Box::new(rare_pairs::RarePairCounter::from_config(config)),
    };
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::interactions::InteractionScoreTable;
    use crate::error::FeatureError;

    #[test]
    fn engines_report_their_stage() {
        let refs = ReferenceData::default().with_interactions(InteractionScoreTable::default());
        let config = PipelineConfig::default();
        for stage in [StageKind::Digenic, StageKind::Cri, StageKind::RarePairs] {
            let engine = build_engine(stage, &refs, &config).unwrap();
            assert_eq!(engine.stage(), stage);
        }
    }

    #[test]
    fn building_without_reference_table_fails() {
        let result = build_engine(StageKind::GeneScore, &ReferenceData::default(), &PipelineConfig::default());
        assert!(matches!(result, Err(FeatureError::ReferenceNotLoaded(_))));
    }
}
