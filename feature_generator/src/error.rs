use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::models::StatusKind;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("could not locate genotype column: {0}")]
    GenotypeColumn(String),

    #[error("no numeric {column} values for MIN/MAX")]
    NoNumericReference { column: String },

    #[error("failed to save {}: {source}", .path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("undefined arithmetic: {0}")]
    UndefinedArithmetic(String),

    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("reference table {}: {source}", .path.display())]
    ReferenceCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("reference table {}: {message}", .path.display())]
    ReferenceContent { path: PathBuf, message: String },

    #[error("reference table `{0}` was not loaded for this run")]
    ReferenceNotLoaded(&'static str),

    #[error("config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    /// How a per-file error is reported in the batch summary.
    pub fn severity(&self) -> StatusKind {
        match self {
            FeatureError::MissingColumns(_)
            | FeatureError::GenotypeColumn(_)
            | FeatureError::NoNumericReference { .. } => StatusKind::Warning,
            _ => StatusKind::Failure,
        }
    }
}
