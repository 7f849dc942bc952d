use std::sync::Arc;

use polars::prelude::*;

use super::FeatureEngine;
use crate::config::ColumnNames;
use crate::data_handling::interactions::InteractionScoreTable;
use crate::error::Result;
use crate::helper_functions::{require_columns, string_values};
use crate::models::{StageKind, StageOutcome, DIGENIC_SCORE};

/// Max interaction score per row, truncated to an integer; 0 for unknown symbols.
pub fn digenic_scores(symbols: &[Option<String>], table: &InteractionScoreTable) -> Vec<i64> {
    symbols
        .iter()
        .map(|symbol| symbol.as_deref().map_or(0, |s| table.score(s) as i64))
        .collect()
}

/// The `digenic` stage; adds `DCs_score`.
pub struct DigenicScoring {
    table: Arc<InteractionScoreTable>,
    columns: ColumnNames,
}

impl DigenicScoring {
    pub fn new(table: Arc<InteractionScoreTable>, columns: ColumnNames) -> Self {
        Self { table, columns }
    }
}

impl FeatureEngine for DigenicScoring {
    fn stage(&self) -> StageKind {
        StageKind::Digenic
    }

    fn apply(&self, mut df: DataFrame) -> Result<StageOutcome> {
        require_columns(&df, &[self.columns.symbol.as_str()])?;
        let scores = digenic_scores(&string_values(&df, &self.columns.symbol)?, &self.table);
        df.with_column(Series::new(PlSmallStr::from(DIGENIC_SCORE), scores))?;
        Ok(StageOutcome::modified(df))
    }
}
