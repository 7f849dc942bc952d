use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::{open_csv, ReferenceTable};
use crate::error::{FeatureError, Result};

#[derive(Debug, Deserialize)]
struct GeneMappingRow {
    #[serde(rename = "Ensembl_ID")]
    ensembl_id: Option<String>,
}

/// Genes considered relevant for the phenotype under study.
#[derive(Debug, Clone, Default)]
pub struct PhenotypeGeneSet {
    genes: HashSet<String>,
}

impl PhenotypeGeneSet {
    pub fn contains(&self, gene_id: &str) -> bool {
        self.genes.contains(gene_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.genes.len()
    }
}

#[cfg(test)]
impl<S: Into<String>> FromIterator<S> for PhenotypeGeneSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            genes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReferenceTable for PhenotypeGeneSet {
    const NAME: &'static str = "phenotype gene mapping";

    fn load(path: &Path) -> Result<Self> {
        let mut reader = open_csv(path)?;
        let mut genes = HashSet::new();
        for row in reader.deserialize::<GeneMappingRow>() {
            let row = row.map_err(|source| FeatureError::ReferenceCsv {
                path: path.to_path_buf(),
                source,
            })?;
            if let Some(id) = row.ensembl_id.filter(|id| !id.is_empty()) {
                genes.insert(id);
            }
        }
        Ok(Self { genes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_ensembl_ids_ignoring_other_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene_mapping.csv");
        fs::write(&path, "Gene_Name,Ensembl_ID\nBRCA1,ENSG00000012048\nTP53,ENSG00000141510\nX,\n").unwrap();
        let set = PhenotypeGeneSet::load(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("ENSG00000141510"));
        assert!(!set.contains("BRCA1"));
    }
}
