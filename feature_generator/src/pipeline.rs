//! Per-file driver and the parallel batch around it.
//!
//! A file is read, transformed in memory and written only if the whole stage
//! succeeded. Every error stays with its file and turns into a status.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::feature_engines::FeatureEngine;
use crate::helper_functions::{read_tsv, write_tsv};
use crate::models::{FileStatus, StageKind, StageOutcome, StatusKind};

enum FileOutcome {
    Written { path: PathBuf, note: Option<String> },
    Unchanged(String),
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn apply_to_file(engine: &dyn FeatureEngine, input: &Path, output_dir: &Path) -> Result<FileOutcome> {
    let df = read_tsv(input)?;
    debug!("{}: {} rows, {} columns", input.display(), df.height(), df.width());

    match engine.apply(df)? {
        StageOutcome::Unchanged(reason) => Ok(FileOutcome::Unchanged(reason)),
        StageOutcome::Modified { mut df, note } => {
            let name = input.file_name().unwrap_or(input.as_os_str());
            let path = output_dir.join(name);
            write_tsv(&mut df, &path)?;
            Ok(FileOutcome::Written { path, note })
        }
    }
}

/// Run one stage on one file and classify the result.
pub fn process_file(engine: &dyn FeatureEngine, input: &Path, output_dir: &Path) -> FileStatus {
    let start = Instant::now();
    let file = display_name(input);
    debug!("Started {} on {}", engine.stage(), file);

    let (kind, message, written) = match apply_to_file(engine, input, output_dir) {
        Ok(FileOutcome::Written { path, note }) => {
            let saved = format!("saved to {}", path.display());
            let message = match note {
                Some(note) => format!("{note}; {saved}"),
                None => saved,
            };
            (StatusKind::Success, message, Some(path))
        }
        Ok(FileOutcome::Unchanged(reason)) => (StatusKind::Success, reason, None),
        Err(e) => (e.severity(), e.to_string(), None),
    };

    FileStatus {
        stage: engine.stage(),
        file,
        kind,
        message,
        elapsed: start.elapsed(),
        written,
    }
}

pub fn log_status(status: &FileStatus) {
    match status.kind {
        StatusKind::Success => info!("{}", status),
        StatusKind::Warning => warn!("{}", status),
        StatusKind::Failure => error!("{}", status),
    }
}

/// Apply `engine` to every file in parallel, one status per file.
pub fn run_stage(engine: &dyn FeatureEngine, files: &[PathBuf], output_dir: &Path) -> Vec<FileStatus> {
    files
        .par_iter()
        .map(|file| {
            let status = process_file(engine, file, output_dir);
            log_status(&status);
            status
        })
        .collect()
}

pub fn stage_output_dir(output_root: &Path, stage: StageKind) -> PathBuf {
    output_root.join(stage.name())
}

pub fn create_stage_dirs(output_root: &Path, engines: &[Box<dyn FeatureEngine>]) -> std::io::Result<()> {
    for engine in engines {
        fs::create_dir_all(stage_output_dir(output_root, engine.stage()))?;
    }
    Ok(())
}

/// Every engine in order on one file. Each stage reads the newest written
/// version; a skipped or failed stage ends the chain for this file.
fn chain_file(engines: &[Box<dyn FeatureEngine>], input: &Path, output_root: &Path) -> Vec<FileStatus> {
    let mut current = input.to_path_buf();
    let mut statuses = Vec::with_capacity(engines.len());

    for (i, engine) in engines.iter().enumerate() {
        let stage_dir = stage_output_dir(output_root, engine.stage());
        let status = process_file(engine.as_ref(), &current, &stage_dir);
        log_status(&status);

        let proceed = status.kind == StatusKind::Success;
        if let Some(path) = &status.written {
            current = path.clone();
        }
        statuses.push(status);

        if !proceed {
            if i + 1 < engines.len() {
                warn!("{}: {} later stage(s) not run", display_name(input), engines.len() - i - 1);
            }
            break;
        }
    }
    statuses
}

/// Run the whole chain for every file in parallel; stage directories must exist.
pub fn run_chain(engines: &[Box<dyn FeatureEngine>], files: &[PathBuf], output_root: &Path) -> Vec<FileStatus> {
    files
        .par_iter()
        .flat_map_iter(|file| chain_file(engines, file, output_root))
        .collect()
}
