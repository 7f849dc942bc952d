//! Consequence-keyed CADD_PHRED rules.
//!
//! A rule table maps a variant consequence (e.g. `stop_gained`) to the value a
//! `CADD_PHRED` cell should take: a literal score, or the smallest / largest
//! score observed in the file being processed.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::{header_position, open_csv, ReferenceTable};
use crate::error::{FeatureError, Result};

const KEY_COLUMNS: &[&str] = &["Consequence", "Unique_Null_Consequences"];
const VALUE_COLUMNS: &[&str] = &["CADD_PHRED", "CADD_PHRED_imputed", "CADD_PHEDD"];

/// Rule keys that apply to every consequence without a rule of its own.
const FALLBACK_KEYS: &[&str] = &["*", "default"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleValue {
    Min,
    Max,
    Literal(f64),
}

impl RuleValue {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "min" => Some(RuleValue::Min),
            "max" | "high" => Some(RuleValue::Max),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(RuleValue::Literal),
        }
    }

    pub fn resolve(self, bounds: FileBounds) -> f64 {
        match self {
            RuleValue::Min => bounds.min,
            RuleValue::Max => bounds.max,
            RuleValue::Literal(v) => v,
        }
    }
}

/// Smallest and largest score present in one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileBounds {
    pub min: f64,
    pub max: f64,
}

impl FileBounds {
    pub fn of(values: &[Option<f64>]) -> Option<Self> {
        values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some(FileBounds { min: v, max: v }),
            Some(b) => Some(FileBounds {
                min: b.min.min(v),
                max: b.max.max(v),
            }),
        })
    }
}

pub fn normalise_consequence(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct ConsequenceRules {
    rules: HashMap<String, RuleValue>,
    fallback: Option<RuleValue>,
}

impl ConsequenceRules {
    #[cfg(test)]
    pub fn from_pairs<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, RuleValue)>) -> Self {
        let mut table = ConsequenceRules::default();
        for (key, value) in pairs {
            table.insert(key.as_ref(), value);
        }
        table
    }

    fn insert(&mut self, raw_key: &str, value: RuleValue) {
        let key = normalise_consequence(raw_key);
        if FALLBACK_KEYS.contains(&key.as_str()) {
            self.fallback = Some(value);
        } else if let Some(previous) = self.rules.insert(key.clone(), value) {
            debug!("Rule for '{}' redefined: {:?} -> {:?}", key, previous, value);
        }
    }

    /// Rule for an already normalised consequence, falling back to the default entry.
    pub fn lookup(&self, normalised: &str) -> Option<RuleValue> {
        self.rules.get(normalised).copied().or(self.fallback)
    }

    fn len(&self) -> usize {
        self.rules.len()
    }
}

impl ReferenceTable for ConsequenceRules {
    const NAME: &'static str = "CADD_PHRED rules";

    fn load(path: &Path) -> Result<Self> {
        let mut reader = open_csv(path)?;
        let csv_err = |source| FeatureError::ReferenceCsv {
            path: path.to_path_buf(),
            source,
        };
        let headers = reader.headers().map_err(csv_err)?.clone();
        let key_idx = header_position(&headers, KEY_COLUMNS, path)?;
        let value_idx = header_position(&headers, VALUE_COLUMNS, path)?;

        let mut table = ConsequenceRules::default();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            let key = record.get(key_idx).unwrap_or("");
            if key.is_empty() {
                continue;
            }
            let raw_value = record.get(value_idx).unwrap_or("");
            let value = RuleValue::parse(raw_value).ok_or_else(|| FeatureError::ReferenceContent {
                path: path.to_path_buf(),
                // +2: header line and 1-based numbering
                message: format!("line {}: unrecognised rule value '{}' for '{}'", line + 2, raw_value, key),
            })?;
            table.insert(key, value);
        }
        debug!("{} rule(s) read from {}", table.len(), path.display());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rule_values_accept_words_and_numbers() {
        assert_eq!(RuleValue::parse(" LOW "), Some(RuleValue::Min));
        assert_eq!(RuleValue::parse("max"), Some(RuleValue::Max));
        assert_eq!(RuleValue::parse("0"), Some(RuleValue::Literal(0.0)));
        assert_eq!(RuleValue::parse("23.5"), Some(RuleValue::Literal(23.5)));
        assert_eq!(RuleValue::parse("medium"), None);
        assert_eq!(RuleValue::parse("inf"), None);
    }

    #[test]
    fn bounds_ignore_missing_values() {
        let b = FileBounds::of(&[None, Some(3.0), Some(-1.0), None, Some(7.5)]).unwrap();
        assert_eq!(b, FileBounds { min: -1.0, max: 7.5 });
        assert_eq!(FileBounds::of(&[None, None]), None);
        assert_eq!(RuleValue::Max.resolve(b), 7.5);
    }

    #[test]
    fn keys_are_normalised_once_and_fallback_applies() {
        let rules = ConsequenceRules::from_pairs([
            ("  Stop_Gained ", RuleValue::Max),
            ("default", RuleValue::Literal(1.0)),
        ]);
        assert_eq!(rules.lookup("stop_gained"), Some(RuleValue::Max));
        assert_eq!(rules.lookup("intron_variant"), Some(RuleValue::Literal(1.0)));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn loads_null_rule_file_with_spaced_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("null caddphredd.csv");
        fs::write(
            &path,
            "Unique Null Consequences,CADD_PHRED imputed\n\
             Frameshift_Variant,max\n\
             intron_variant,low\n\
             synonymous_variant,0\n\
             ,5\n",
        )
        .unwrap();

        let rules = ConsequenceRules::load(&path).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.lookup("frameshift_variant"), Some(RuleValue::Max));
        assert_eq!(rules.lookup("intron_variant"), Some(RuleValue::Min));
        assert_eq!(rules.lookup("synonymous_variant"), Some(RuleValue::Literal(0.0)));
        assert_eq!(rules.lookup("missense_variant"), None);
    }

    #[test]
    fn loads_override_file_with_misspelt_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadd_phredd.csv");
        fs::write(&path, "Consequence,CADD_PHEDD\nstop_gained,40\n").unwrap();
        let rules = ConsequenceRules::load(&path).unwrap();
        assert_eq!(rules.lookup("stop_gained"), Some(RuleValue::Literal(40.0)));
    }

    #[test]
    fn unknown_rule_value_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.csv");
        fs::write(&path, "Consequence,CADD_PHRED\nstop_gained,40\nintron_variant,medium\n").unwrap();
        let err = ConsequenceRules::load(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }
}
