//! CADD_PHRED imputation and override driven by consequence rules.
//!
//! MIN / MAX rules resolve against the scores of the file being processed,
//! never against a global range.

use std::sync::Arc;

use polars::prelude::*;
use tracing::debug;

use super::FeatureEngine;
use crate::config::ColumnNames;
use crate::data_handling::consequence_rules::{normalise_consequence, ConsequenceRules, FileBounds};
use crate::error::{FeatureError, Result};
use crate::helper_functions::{f64_values, require_columns, string_values};
use crate::models::{StageKind, StageOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct Imputed {
    pub values: Vec<Option<f64>>,
    pub substitutions: usize,
    pub bounds: FileBounds,
}

/// Apply `null_rules` to missing scores and, when given, `override_rules` to
/// scores present in the input. Which pass a row belongs to is decided from
/// the input, so a value filled by the null pass is never overridden.
pub fn impute_scores(
    scores: &[Option<f64>],
    consequences: &[Option<String>],
    null_rules: &ConsequenceRules,
    override_rules: Option<&ConsequenceRules>,
    column: &str,
) -> Result<Imputed> {
    let bounds = FileBounds::of(scores).ok_or_else(|| FeatureError::NoNumericReference {
        column: column.to_string(),
    })?;

    let mut values = scores.to_vec();
    let mut substitutions = 0;
    for (i, (score, consequence)) in scores.iter().zip(consequences).enumerate() {
        let rules = match score {
            None => null_rules,
            Some(_) => match override_rules {
                Some(rules) => rules,
                None => continue,
            },
        };
        let Some(consequence) = consequence else {
            continue;
        };
        if let Some(rule) = rules.lookup(&normalise_consequence(consequence)) {
            values[i] = Some(rule.resolve(bounds));
            substitutions += 1;
        }
    }

    Ok(Imputed {
        values,
        substitutions,
        bounds,
    })
}

/// The `cadd-imputation` stage: null pass, then the non-null override pass.
pub struct CaddImputation {
    null_rules: Arc<ConsequenceRules>,
    override_rules: Arc<ConsequenceRules>,
    columns: ColumnNames,
}

impl CaddImputation {
    pub fn new(
        null_rules: Arc<ConsequenceRules>,
        override_rules: Arc<ConsequenceRules>,
        columns: ColumnNames,
    ) -> Self {
        Self {
            null_rules,
            override_rules,
            columns,
        }
    }
}

impl FeatureEngine for CaddImputation {
    fn stage(&self) -> StageKind {
        StageKind::CaddImputation
    }

    fn apply(&self, mut df: DataFrame) -> Result<StageOutcome> {
        let cadd = self.columns.cadd.as_str();
        require_columns(&df, &[cadd, self.columns.consequence.as_str()])?;

        let scores = f64_values(&df, cadd)?;
        let consequences = string_values(&df, &self.columns.consequence)?;
        let imputed = impute_scores(
            &scores,
            &consequences,
            &self.null_rules,
            Some(&self.override_rules),
            cadd,
        )?;
        debug!(
            "{} bounds {:?}, {} substitution(s)",
            cadd, imputed.bounds, imputed.substitutions
        );

        if imputed.substitutions == 0 {
            return Ok(StageOutcome::Unchanged("no changes needed".to_string()));
        }
        df.with_column(Series::new(PlSmallStr::from(cadd), imputed.values))?;
        Ok(StageOutcome::Modified {
            df,
            note: Some(format!("corrected {} {} value(s)", imputed.substitutions, cadd)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::consequence_rules::RuleValue;
    use polars::df;

    fn null_rules() -> ConsequenceRules {
        ConsequenceRules::from_pairs([
            ("intron_variant", RuleValue::Min),
            ("stop_gained", RuleValue::Max),
            ("synonymous_variant", RuleValue::Literal(0.0)),
        ])
    }

    fn override_rules() -> ConsequenceRules {
        ConsequenceRules::from_pairs([("frameshift_variant", RuleValue::Max)])
    }

    fn owned(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_owned)).collect()
    }

    #[test]
    fn min_and_max_rules_use_the_file_range() {
        let scores = [Some(5.0), None, Some(30.0), None, None, Some(12.0)];
        let consequences = owned(&[
            Some("missense_variant"),
            Some(" Intron_Variant "),
            Some("missense_variant"),
            Some("stop_gained"),
            Some("synonymous_variant"),
            Some("missense_variant"),
        ]);
        let imputed = impute_scores(&scores, &consequences, &null_rules(), None, "CADD_PHRED").unwrap();
        assert_eq!(
            imputed.values,
            vec![Some(5.0), Some(5.0), Some(30.0), Some(30.0), Some(0.0), Some(12.0)]
        );
        assert_eq!(imputed.substitutions, 3);
    }

    #[test]
    fn override_pass_only_touches_present_scores() {
        let scores = [Some(2.0), None, Some(9.0)];
        let consequences = owned(&[
            Some("frameshift_variant"),
            Some("frameshift_variant"),
            Some("stop_gained"),
        ]);
        let imputed = impute_scores(
            &scores,
            &consequences,
            &null_rules(),
            Some(&override_rules()),
            "CADD_PHRED",
        )
        .unwrap();
        // row 1 has no null rule, row 2 has no override rule
        assert_eq!(imputed.values, vec![Some(9.0), None, Some(9.0)]);
        assert_eq!(imputed.substitutions, 1);
    }

    #[test]
    fn bounds_come_from_input_not_from_imputed_values() {
        let scores = [None, Some(4.0), Some(8.0)];
        let consequences = owned(&[Some("synonymous_variant"), Some("x"), Some("y")]);
        let imputed = impute_scores(&scores, &consequences, &null_rules(), None, "CADD_PHRED").unwrap();
        assert_eq!(imputed.bounds, FileBounds { min: 4.0, max: 8.0 });
    }

    #[test]
    fn no_numeric_scores_is_reported() {
        let scores = [None, None];
        let consequences = owned(&[Some("stop_gained"), None]);
        let err = impute_scores(&scores, &consequences, &null_rules(), None, "CADD_PHRED").unwrap_err();
        assert!(matches!(err, FeatureError::NoNumericReference { .. }));
    }

    #[test]
    fn stage_reports_unchanged_when_no_rule_matches() {
        let engine = CaddImputation::new(
            Arc::new(null_rules()),
            Arc::new(override_rules()),
            ColumnNames::default(),
        );
        let df = df![
            "CADD_PHRED" => &[Some(1.0), Some(2.0)],
            "Consequence" => &["missense_variant", "missense_variant"]
        ]
        .unwrap();
        assert!(matches!(engine.apply(df).unwrap(), StageOutcome::Unchanged(_)));
    }

    #[test]
    fn stage_rewrites_column_in_place() {
        let engine = CaddImputation::new(
            Arc::new(null_rules()),
            Arc::new(override_rules()),
            ColumnNames::default(),
        );
        let df = df![
            "Consequence" => &["stop_gained", "missense_variant", "frameshift_variant"],
            "CADD_PHRED" => &[None, Some(3.0), Some(1.0)],
            "SYMBOL" => &["A", "B", "C"]
        ]
        .unwrap();
        let StageOutcome::Modified { df, note } = engine.apply(df).unwrap() else {
            panic!("expected a modified table");
        };
        assert_eq!(df.get_column_names()[1].as_str(), "CADD_PHRED");
        let cadd: Vec<Option<f64>> = df.column("CADD_PHRED").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(cadd, vec![Some(3.0), Some(3.0), Some(3.0)]);
        assert_eq!(note.as_deref(), Some("corrected 2 CADD_PHRED value(s)"));
    }

    #[test]
    fn stage_without_consequence_column_is_a_schema_mismatch() {
        let engine = CaddImputation::new(
            Arc::new(null_rules()),
            Arc::new(override_rules()),
            ColumnNames::default(),
        );
        let df = df!["CADD_PHRED" => &[1.0]].unwrap();
        assert!(matches!(engine.apply(df), Err(FeatureError::MissingColumns(_))));
    }
}
