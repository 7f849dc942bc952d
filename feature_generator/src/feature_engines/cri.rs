use std::collections::HashMap;

use polars::prelude::*;

use super::FeatureEngine;
use crate::config::ColumnNames;
use crate::error::Result;
use crate::helper_functions::{f64_values, require_columns, string_values};
use crate::models::{StageKind, StageOutcome, ADJUSTED_AF_CRI};

/// `AF²` for every row whose symbol occurs at least twice; missing otherwise.
/// Singletons stay missing rather than 0: they get no combined-risk adjustment.
pub fn adjusted_af(symbols: &[Option<String>], afs: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for symbol in symbols.iter().flatten() {
        *occurrences.entry(symbol.as_str()).or_insert(0) += 1;
    }
    symbols
        .iter()
        .zip(afs)
        .map(|(symbol, af)| {
            let repeated = symbol
                .as_deref()
                .is_some_and(|s| occurrences.get(s).copied().unwrap_or(0) >= 2);
            if repeated {
                af.map(|af| af * af)
            } else {
                None
            }
        })
        .collect()
}

/// The `cri` stage; adds `Adjusted AF for CRI`.
pub struct CriAdjustment {
    columns: ColumnNames,
}

impl CriAdjustment {
    pub fn new(columns: ColumnNames) -> Self {
        Self { columns }
    }
}

impl FeatureEngine for CriAdjustment {
    fn stage(&self) -> StageKind {
        StageKind::Cri
    }

    fn apply(&self, mut df: DataFrame) -> Result<StageOutcome> {
        require_columns(&df, &[self.columns.symbol.as_str(), self.columns.af.as_str()])?;
        let adjusted = adjusted_af(
            &string_values(&df, &self.columns.symbol)?,
            &f64_values(&df, &self.columns.af)?,
        );
        df.with_column(Series::new(PlSmallStr::from(ADJUSTED_AF_CRI), adjusted))?;
        Ok(StageOutcome::modified(df))
    }
}
