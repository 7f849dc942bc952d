use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use serde::Deserialize;
use tracing::debug;

use super::{open_csv, ReferenceTable};
use crate::error::{FeatureError, Result};
use crate::models::GENE_LENGTH;

/// Key column of the frame built by [`GeneLengthTable::to_frame`].
pub const GENE_ID: &str = "gene_id";

#[derive(Debug, Deserialize)]
struct GeneLengthRow {
    gene_id: String,
    gene_length: Option<f64>,
}

/// Canonical length per Ensembl gene id.
#[derive(Debug, Clone, Default)]
pub struct GeneLengthTable {
    lengths: HashMap<String, f64>,
}

impl GeneLengthTable {
    /// `gene_id` / `gene_length` frame to left-join sample tables against.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let (ids, lengths): (Vec<&str>, Vec<f64>) = self
            .lengths
            .iter()
            .map(|(id, length)| (id.as_str(), *length))
            .unzip();
        DataFrame::new(vec![
            Column::from(Series::new(PlSmallStr::from(GENE_ID), ids)),
            Column::from(Series::new(PlSmallStr::from(GENE_LENGTH), lengths)),
        ])
    }

    #[cfg(test)]
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        let mut lengths = HashMap::new();
        for (gene, length) in pairs {
            lengths.entry(gene.into()).or_insert(length);
        }
        Self { lengths }
    }

    #[cfg(test)]
    pub fn get(&self, gene_id: &str) -> Option<f64> {
        self.lengths.get(gene_id).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }
}

impl ReferenceTable for GeneLengthTable {
    const NAME: &'static str = "gene lengths";

    fn load(path: &Path) -> Result<Self> {
        let mut reader = open_csv(path)?;
        let mut lengths = HashMap::new();
        let mut duplicates = 0usize;

        for row in reader.deserialize::<GeneLengthRow>() {
            let row = row.map_err(|source| FeatureError::ReferenceCsv {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(length) = row.gene_length else {
                continue;
            };
            if !length.is_finite() {
                return Err(FeatureError::ReferenceContent {
                    path: path.to_path_buf(),
                    message: format!("gene {} has non-finite length {}", row.gene_id, length),
                });
            }
            // first entry wins, like a left join that keeps one match
            if lengths.contains_key(&row.gene_id) {
                duplicates += 1;
            } else {
                lengths.insert(row.gene_id, length);
            }
        }
        if duplicates > 0 {
            debug!("{} duplicate gene id(s) ignored in {}", duplicates, path.display());
        }
        Ok(Self { lengths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_lengths_and_skips_blank_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene_length.csv");
        fs::write(
            &path,
            "gene_id,gene_length,biotype\nENSG1,1200,protein_coding\nENSG2,,lncRNA\nENSG1,99,dup\n",
        )
        .unwrap();
        let table = GeneLengthTable::load(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("ENSG1"), Some(1200.0));
        assert_eq!(table.get("ENSG2"), None);
    }

    #[test]
    fn frame_has_one_row_per_gene() {
        let table = GeneLengthTable::from_pairs([("ENSG1", 1200.0), ("ENSG2", 800.0), ("ENSG1", 5.0)]);
        let df = table.to_frame().unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, [GENE_ID, GENE_LENGTH]);
    }

    #[test]
    fn non_numeric_length_is_a_reference_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene_length.csv");
        fs::write(&path, "gene_id,gene_length\nENSG1,long\n").unwrap();
        assert!(matches!(
            GeneLengthTable::load(&path),
            Err(FeatureError::ReferenceCsv { .. })
        ));
    }
}
