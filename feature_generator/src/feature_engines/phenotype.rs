use std::collections::HashMap;
use std::sync::Arc;

use polars::prelude::*;

use super::FeatureEngine;
use crate::config::ColumnNames;
use crate::data_handling::phenotype_genes::PhenotypeGeneSet;
use crate::error::Result;
use crate::helper_functions::{require_columns, string_values};
use crate::models::{StageKind, StageOutcome, PHENOTYPE, PHENOTYPE_HITS};

/// 1 where the row's gene is in the phenotype set.
pub fn phenotype_flags(genes: &[Option<String>], set: &PhenotypeGeneSet) -> Vec<i64> {
    genes
        .iter()
        .map(|gene| match gene {
            Some(g) if set.contains(g) => 1,
            _ => 0,
        })
        .collect()
}

/// Flagged rows per symbol, repeated on every row of that symbol.
pub fn phenotype_hits(symbols: &[Option<String>], flags: &[i64]) -> Vec<i64> {
    let mut hits: HashMap<&str, i64> = HashMap::new();
    for (symbol, &flag) in symbols.iter().zip(flags) {
        if let (Some(symbol), 1) = (symbol.as_deref(), flag) {
            *hits.entry(symbol).or_insert(0) += 1;
        }
    }
    symbols
        .iter()
        .map(|symbol| {
            symbol
                .as_deref()
                .and_then(|s| hits.get(s).copied())
                .unwrap_or(0)
        })
        .collect()
}

/// The `phenotype` stage; adds `Phenotype` and `PH`.
pub struct PhenotypeAnnotation {
    genes: Arc<PhenotypeGeneSet>,
    columns: ColumnNames,
}

impl PhenotypeAnnotation {
    pub fn new(genes: Arc<PhenotypeGeneSet>, columns: ColumnNames) -> Self {
        Self { genes, columns }
    }

    pub fn annotate(&self, mut df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, &[self.columns.gene.as_str(), self.columns.symbol.as_str()])?;

        let flags = phenotype_flags(&string_values(&df, &self.columns.gene)?, &self.genes);
        let hits = phenotype_hits(&string_values(&df, &self.columns.symbol)?, &flags);

        df.with_column(Series::new(PlSmallStr::from(PHENOTYPE), flags))?;
        df.with_column(Series::new(PlSmallStr::from(PHENOTYPE_HITS), hits))?;
        Ok(df)
    }
}

impl FeatureEngine for PhenotypeAnnotation {
    fn stage(&self) -> StageKind {
        StageKind::Phenotype
    }

    fn apply(&self, df: DataFrame) -> Result<StageOutcome> {
        Ok(StageOutcome::modified(self.annotate(df)?))
    }
}
