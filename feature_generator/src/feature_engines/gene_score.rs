//! Gene-level score: variant count, scaled by how short the gene is relative
//! to the median gene of the file, damped by the joint rarity of its variants.
//!
//! `gene_score = n * (median_length / gene_length) * min(prod(AF) / f_disease, 1)`

use std::collections::HashMap;
use std::sync::Arc;

use polars::prelude::*;
use tracing::debug;

use super::FeatureEngine;
use crate::config::ColumnNames;
use crate::data_handling::gene_lengths::{GeneLengthTable, GENE_ID};
use crate::error::{FeatureError, Result};
use crate::helper_functions::{f64_values, require_columns, string_values};
use crate::models::{StageKind, StageOutcome, GENE_LENGTH, GENE_SCORE};

const ROW_INDEX: &str = "__row_index";

#[derive(Default)]
struct GeneGroup {
    rows: usize,
    afs: Vec<f64>,
    length: Option<f64>,
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Product over AF values sorted first, so the result does not depend on row order.
fn af_product(afs: &mut [f64]) -> f64 {
    afs.sort_by(f64::total_cmp);
    afs.iter().product()
}

/// `gene_length` for every row of `df`, left-joined from the reference table.
/// Rows without a gene or with an unknown gene get `None`.
pub fn join_gene_lengths(df: &DataFrame, gene_col: &str, lengths: &GeneLengthTable) -> Result<Vec<Option<f64>>> {
    let joined = df
        .select([gene_col])?
        .with_row_index(PlSmallStr::from(ROW_INDEX), None)?
        .lazy()
        .with_column(col(gene_col).cast(DataType::String))
        .left_join(lengths.to_frame()?.lazy(), col(gene_col), col(GENE_ID))
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .collect()?;
    f64_values(&joined, GENE_LENGTH)
}

/// Score per row from the gene ids, AFs and joined lengths of a table.
pub fn score_genes(
    genes: &[Option<String>],
    afs: &[Option<f64>],
    lengths: &[Option<f64>],
    disease_frequency: f64,
) -> Result<Vec<Option<f64>>> {
    let mut known: Vec<f64> = genes
        .iter()
        .zip(lengths)
        .filter(|(gene, _)| gene.is_some())
        .filter_map(|(_, length)| *length)
        .collect();
    let Some(length_median) = median(&mut known) else {
        debug!("no row has a known gene length; gene_score left empty");
        return Ok(vec![None; genes.len()]);
    };

    let mut groups: HashMap<&str, GeneGroup> = HashMap::new();
    for ((gene, af), length) in genes.iter().zip(afs).zip(lengths) {
        let Some(gene) = gene.as_deref() else {
            continue;
        };
        let group = groups.entry(gene).or_default();
        group.rows += 1;
        group.length = group.length.or(*length);
        if let Some(af) = af {
            group.afs.push(*af);
        }
    }

    let mut per_gene: HashMap<&str, f64> = HashMap::with_capacity(groups.len());
    for (gene, mut group) in groups {
        let Some(gene_length) = group.length else {
            continue;
        };
        if gene_length == 0.0 {
            return Err(FeatureError::UndefinedArithmetic(format!(
                "gene {gene} has gene_length 0"
            )));
        }
        let rarity = (af_product(&mut group.afs) / disease_frequency).min(1.0);
        let score = group.rows as f64 * (length_median / gene_length) * rarity;
        if !score.is_finite() {
            return Err(FeatureError::UndefinedArithmetic(format!(
                "gene {gene} scores {score} (length {gene_length}, median {length_median})"
            )));
        }
        per_gene.insert(gene, score);
    }

    Ok(genes
        .iter()
        .map(|gene| gene.as_deref().and_then(|g| per_gene.get(g).copied()))
        .collect())
}

/// Keep only rows that carry a gene id.
pub fn drop_rows_without_gene(df: DataFrame, gene_col: &str) -> PolarsResult<DataFrame> {
    df.lazy().filter(col(gene_col).is_not_null()).collect()
}

/// The `gene-score` stage; adds `gene_length` and `gene_score`.
pub struct GeneScoring {
    lengths: Arc<GeneLengthTable>,
    columns: ColumnNames,
    disease_frequency: f64,
    drop_missing_gene: bool,
}

impl GeneScoring {
    pub fn new(
        lengths: Arc<GeneLengthTable>,
        columns: ColumnNames,
        disease_frequency: f64,
        drop_missing_gene: bool,
    ) -> Self {
        Self {
            lengths,
            columns,
            disease_frequency,
            drop_missing_gene,
        }
    }

    pub fn annotate(&self, df: DataFrame) -> Result<DataFrame> {
        let gene_col = self.columns.gene.as_str();
        require_columns(&df, &[gene_col, self.columns.af.as_str()])?;

        let mut df = if self.drop_missing_gene {
            drop_rows_without_gene(df, gene_col)?
        } else {
            df
        };

        let lengths = join_gene_lengths(&df, gene_col, &self.lengths)?;
        let scores = score_genes(
            &string_values(&df, gene_col)?,
            &f64_values(&df, &self.columns.af)?,
            &lengths,
            self.disease_frequency,
        )?;

        df.with_column(Series::new(PlSmallStr::from(GENE_LENGTH), lengths))?;
        df.with_column(Series::new(PlSmallStr::from(GENE_SCORE), scores))?;
        Ok(df)
    }
}

impl FeatureEngine for GeneScoring {
    fn stage(&self) -> StageKind {
        StageKind::GeneScore
    }

    fn apply(&self, df: DataFrame) -> Result<StageOutcome> {
        Ok(StageOutcome::modified(self.annotate(df)?))
    }
}
