//! Counts allele-frequency pairs of rare heterozygous variants per gene,
//! a proxy for compound-heterozygous burden.
//!
//! Cost is quadratic in the number of variants of one candidate gene, which
//! stays small; the table itself is grouped in a single pass.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::debug;

use super::FeatureEngine;
use crate::config::{ColumnNames, GenotypeLocator, PipelineConfig, RarePairSource, Thresholds};
use crate::error::{FeatureError, Result};
use crate::helper_functions::{f64_values, has_column, require_columns, string_values};
use crate::models::{StageKind, StageOutcome, RARE_PAIR_COUNT};

#[derive(Debug, Clone, Copy)]
pub struct PairCriteria<'a> {
    pub heterozygous_marker: &'a str,
    pub rare_af: f64,
    pub pair_product: f64,
    pub source: RarePairSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RarePairCounts {
    pub per_row: Vec<i64>,
    pub candidate_genes: usize,
}

/// Unordered pairs whose AF product is at most `threshold`.
fn qualifying_pairs(afs: &[f64], threshold: f64) -> i64 {
    let mut count = 0;
    for (i, a) in afs.iter().enumerate() {
        for b in &afs[i + 1..] {
            if a * b <= threshold {
                count += 1;
            }
        }
    }
    count
}

pub fn count_rare_pairs(
    symbols: &[Option<String>],
    afs: &[Option<f64>],
    genotypes: &[Option<String>],
    criteria: PairCriteria<'_>,
) -> RarePairCounts {
    let mut qualifying: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut all_afs: HashMap<&str, Vec<f64>> = HashMap::new();

    for ((symbol, af), genotype) in symbols.iter().zip(afs).zip(genotypes) {
        let (Some(symbol), Some(af)) = (symbol.as_deref(), *af) else {
            continue;
        };
        if criteria.source == RarePairSource::AllGeneVariants {
            all_afs.entry(symbol).or_default().push(af);
        }
        let heterozygous = genotype
            .as_deref()
            .is_some_and(|g| g.contains(criteria.heterozygous_marker));
        if heterozygous && af < criteria.rare_af {
            qualifying.entry(symbol).or_default().push(af);
        }
    }

    let per_gene: HashMap<&str, i64> = qualifying
        .iter()
        .filter(|(_, rare)| rare.len() >= 2)
        .map(|(&gene, rare)| {
            let paired = match criteria.source {
                RarePairSource::Qualifying => rare.as_slice(),
                RarePairSource::AllGeneVariants => {
                    all_afs.get(gene).map_or(rare.as_slice(), Vec::as_slice)
                }
            };
            (gene, qualifying_pairs(paired, criteria.pair_product))
        })
        .collect();

    let per_row = symbols
        .iter()
        .map(|symbol| {
            symbol
                .as_deref()
                .and_then(|s| per_gene.get(s).copied())
                .unwrap_or(0)
        })
        .collect();
    RarePairCounts {
        per_row,
        candidate_genes: per_gene.len(),
    }
}

/// Resolve the genotype column name for this table.
pub fn locate_genotype_column(df: &DataFrame, locator: &GenotypeLocator) -> Result<String> {
    match locator {
        GenotypeLocator::Named(name) => {
            if has_column(df, name) {
                Ok(name.clone())
            } else {
                Err(FeatureError::GenotypeColumn(format!("no column named '{name}'")))
            }
        }
        GenotypeLocator::After(anchor) => {
            let idx = df.get_column_index(anchor).ok_or_else(|| {
                FeatureError::GenotypeColumn(format!("anchor column '{anchor}' is absent"))
            })?;
            df.get_column_names()
                .get(idx + 1)
                .map(|name| name.to_string())
                .ok_or_else(|| {
                    FeatureError::GenotypeColumn(format!("nothing follows anchor column '{anchor}'"))
                })
        }
    }
}

/// The `rare-pairs` stage; adds `Rare_AF_Pair_Count`.
pub struct RarePairCounter {
    columns: ColumnNames,
    genotype: GenotypeLocator,
    heterozygous_marker: String,
    thresholds: Thresholds,
    source: RarePairSource,
}

impl RarePairCounter {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            columns: config.columns.clone(),
            genotype: config.genotype.clone(),
            heterozygous_marker: config.heterozygous_marker.0.clone(),
            thresholds: config.thresholds,
            source: config.rare_pair_source,
        }
    }
}

impl FeatureEngine for RarePairCounter {
    fn stage(&self) -> StageKind {
        StageKind::RarePairs
    }

    fn apply(&self, mut df: DataFrame) -> Result<StageOutcome> {
        require_columns(&df, &[self.columns.af.as_str(), self.columns.symbol.as_str()])?;
        let genotype_col = locate_genotype_column(&df, &self.genotype)?;
        debug!("genotype column: {}", genotype_col);

        let counts = count_rare_pairs(
            &string_values(&df, &self.columns.symbol)?,
            &f64_values(&df, &self.columns.af)?,
            &string_values(&df, &genotype_col)?,
            PairCriteria {
                heterozygous_marker: &self.heterozygous_marker,
                rare_af: self.thresholds.rare_af,
                pair_product: self.thresholds.pair_product,
                source: self.source,
            },
        );

        df.with_column(Series::new(PlSmallStr::from(RARE_PAIR_COUNT), counts.per_row))?;
        let note = if counts.candidate_genes == 0 {
            "no candidate genes, all counts 0".to_string()
        } else {
            format!("{} candidate gene(s)", counts.candidate_genes)
        };
        Ok(StageOutcome::Modified {
            df,
            note: Some(note),
        })
    }
}
