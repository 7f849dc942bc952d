//! First-pass features for raw sample tables: fill missing CADD_PHRED from
//! the null rules, then gene score, then phenotype flags.

use std::sync::Arc;

use polars::prelude::*;
use tracing::{debug, warn};

use super::gene_score::{drop_rows_without_gene, GeneScoring};
use super::imputation::impute_scores;
use super::phenotype::PhenotypeAnnotation;
use super::FeatureEngine;
use crate::config::{ColumnNames, PipelineConfig};
use crate::data_handling::consequence_rules::ConsequenceRules;
use crate::data_handling::gene_lengths::GeneLengthTable;
use crate::data_handling::phenotype_genes::PhenotypeGeneSet;
use crate::error::{FeatureError, Result};
use crate::helper_functions::{f64_values, require_columns, string_values};
use crate::models::{StageKind, StageOutcome};

pub struct GeneFeatures {
    null_rules: Arc<ConsequenceRules>,
    scoring: GeneScoring,
    phenotype: PhenotypeAnnotation,
    columns: ColumnNames,
    drop_missing_gene: bool,
}

impl GeneFeatures {
    pub fn new(
        null_rules: Arc<ConsequenceRules>,
        lengths: Arc<GeneLengthTable>,
        phenotype_genes: Arc<PhenotypeGeneSet>,
        config: &PipelineConfig,
    ) -> Self {
        let drop_missing_gene = config.drops_missing_gene(StageKind::GeneFeatures);
        Self {
            null_rules,
            scoring: GeneScoring::new(
                lengths,
                config.columns.clone(),
                config.thresholds.disease_frequency,
                drop_missing_gene,
            ),
            phenotype: PhenotypeAnnotation::new(phenotype_genes, config.columns.clone()),
            columns: config.columns.clone(),
            drop_missing_gene,
        }
    }

    /// Null-pass imputation only. A file without any numeric score keeps its
    /// gaps and still gets the gene features.
    fn fill_missing_cadd(&self, mut df: DataFrame) -> Result<(DataFrame, usize)> {
        let columns = &self.columns;
        let scores = f64_values(&df, &columns.cadd)?;
        let consequences = string_values(&df, &columns.consequence)?;
        match impute_scores(&scores, &consequences, &self.null_rules, None, &columns.cadd) {
            Ok(imputed) if imputed.substitutions > 0 => {
                df.with_column(Series::new(PlSmallStr::from(columns.cadd.as_str()), imputed.values))?;
                Ok((df, imputed.substitutions))
            }
            Ok(_) => Ok((df, 0)),
            Err(FeatureError::NoNumericReference { column }) => {
                warn!("no numeric {} values, imputation skipped", column);
                Ok((df, 0))
            }
            Err(e) => Err(e),
        }
    }
}

impl FeatureEngine for GeneFeatures {
    fn stage(&self) -> StageKind {
        StageKind::GeneFeatures
    }

    fn apply(&self, df: DataFrame) -> Result<StageOutcome> {
        let columns = &self.columns;
        require_columns(
            &df,
            &[
                columns.gene.as_str(),
                columns.symbol.as_str(),
                columns.af.as_str(),
                columns.cadd.as_str(),
                columns.consequence.as_str(),
            ],
        )?;

        // MIN/MAX are taken over the rows that remain after the drop
        let df = if self.drop_missing_gene {
            drop_rows_without_gene(df, &columns.gene)?
        } else {
            df
        };
        let (df, filled) = self.fill_missing_cadd(df)?;
        debug!("{} missing {} value(s) filled", filled, columns.cadd);

        let df = self.scoring.annotate(df)?;
        let df = self.phenotype.annotate(df)?;
        Ok(StageOutcome::Modified {
            df,
            note: Some(format!("imputed {} {} value(s)", filled, columns.cadd)),
        })
    }
}
