use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use polars::prelude::DataFrame;

// Derived columns written by the feature engines.
pub const GENE_LENGTH: &str = "gene_length";
pub const GENE_SCORE: &str = "gene_score";
pub const PHENOTYPE: &str = "Phenotype";
pub const PHENOTYPE_HITS: &str = "PH";
pub const DIGENIC_SCORE: &str = "DCs_score";
pub const RARE_PAIR_COUNT: &str = "Rare_AF_Pair_Count";
pub const ADJUSTED_AF_CRI: &str = "Adjusted AF for CRI";

/// One enrichment stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum StageKind {
    /// Null imputation + gene score + phenotype flags in one pass
    GeneFeatures,
    GeneScore,
    Phenotype,
    Digenic,
    Cri,
    CaddImputation,
    RarePairs,
}

impl StageKind {
    /// Order in which `chain` runs the stages.
    pub const CHAIN: [StageKind; 5] = [
        StageKind::GeneFeatures,
        StageKind::Digenic,
        StageKind::Cri,
        StageKind::CaddImputation,
        StageKind::RarePairs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::GeneFeatures => "gene-features",
            StageKind::GeneScore => "gene-score",
            StageKind::Phenotype => "phenotype",
            StageKind::Digenic => "digenic",
            StageKind::Cri => "cri",
            StageKind::CaddImputation => "cadd-imputation",
            StageKind::RarePairs => "rare-pairs",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a feature engine did to one table.
#[derive(Debug)]
pub enum StageOutcome {
    /// The table gained or changed columns and has to be written.
    Modified { df: DataFrame, note: Option<String> },
    /// Nothing to write; the input file stays as it is.
    Unchanged(String),
}

impl StageOutcome {
    pub fn modified(df: DataFrame) -> Self {
        StageOutcome::Modified { df, note: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Success,
    Warning,
    Failure,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Success => "OK",
            StatusKind::Warning => "SKIPPED",
            StatusKind::Failure => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Result of running one stage on one file.
#[derive(Debug, Clone)]
pub struct FileStatus {
    pub stage: StageKind,
    pub file: String,
    pub kind: StatusKind,
    pub message: String,
    pub elapsed: Duration,
    /// Where the stage wrote its output, if it wrote anything.
    pub written: Option<PathBuf>,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} ({:.2} sec)",
            self.stage,
            self.kind,
            self.file,
            self.message,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Per-kind totals over a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub success: usize,
    pub warning: usize,
    pub failure: usize,
}

impl BatchSummary {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a FileStatus>) -> Self {
        let mut summary = BatchSummary::default();
        for status in statuses {
            match status.kind {
                StatusKind::Success => summary.success += 1,
                StatusKind::Warning => summary.warning += 1,
                StatusKind::Failure => summary.failure += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.success + self.warning + self.failure
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s): {} succeeded, {} skipped, {} failed",
            self.total(),
            self.success,
            self.warning,
            self.failure
        )
    }
}
