//! Protein-pair interaction scores folded into one maximum per gene symbol.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{open_csv, ReferenceTable};
use crate::error::{FeatureError, Result};

#[derive(Debug, Deserialize)]
struct InteractionRow {
    #[serde(rename = "protein1_original_name")]
    protein1: String,
    #[serde(rename = "protein2_original_name")]
    protein2: String,
    combined_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InteractionScoreTable {
    max_scores: HashMap<String, f64>,
}

impl InteractionScoreTable {
    /// Both endpoints of every pair keep the largest score seen for them.
    /// Scores start at 0, so negative scores never surface.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, S, f64)>) -> Self {
        let mut table = Self::default();
        for (p1, p2, score) in pairs {
            table.record(p1.into(), score);
            table.record(p2.into(), score);
        }
        table
    }

    fn record(&mut self, symbol: String, score: f64) {
        let best = self.max_scores.entry(symbol).or_insert(0.0);
        *best = best.max(score);
    }

    /// Max interaction score of `symbol`, 0 when it is in no pair.
    pub fn score(&self, symbol: &str) -> f64 {
        self.max_scores.get(symbol).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.max_scores.len()
    }
}

impl ReferenceTable for InteractionScoreTable {
    const NAME: &'static str = "digenic interaction scores";

    fn load(path: &Path) -> Result<Self> {
        let mut reader = open_csv(path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<InteractionRow>() {
            let row = row.map_err(|source| FeatureError::ReferenceCsv {
                path: path.to_path_buf(),
                source,
            })?;
            if !row.combined_score.is_finite() {
                return Err(FeatureError::ReferenceContent {
                    path: path.to_path_buf(),
                    message: format!(
                        "non-finite combined_score for {} / {}",
                        row.protein1, row.protein2
                    ),
                });
            }
            rows.push((row.protein1, row.protein2, row.combined_score));
        }
        Ok(Self::from_pairs(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fold_is_symmetric_per_symbol_max() {
        let table = InteractionScoreTable::from_pairs([("A", "B", 10.0), ("A", "C", 7.0)]);
        assert_eq!(table.score("A"), 10.0);
        assert_eq!(table.score("B"), 10.0);
        assert_eq!(table.score("C"), 7.0);
        assert_eq!(table.score("D"), 0.0);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn loads_string_db_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specific_digenic_combination.csv");
        fs::write(
            &path,
            "protein1_original_name,protein2_original_name,combined_score\n\
             PKD1,PKD2,999\n\
             PKD2,HNF1B,412\n\
             HNF1B,PAX2,870\n",
        )
        .unwrap();
        let table = InteractionScoreTable::load(&path).unwrap();
        assert_eq!(table.score("PKD2"), 999.0);
        assert_eq!(table.score("HNF1B"), 870.0);
        assert_eq!(table.score("PAX2"), 870.0);
    }
}
