use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::PipelineConfig;
use crate::data_handling::ReferenceData;
use crate::feature_engines::{build_engine, FeatureEngine};
use crate::helper_functions::{discover_tsv_files, project_root};
use crate::models::{BatchSummary, StageKind};
use crate::pipeline::{create_stage_dirs, run_chain, run_stage};

mod config;
mod data_handling;
mod error;
mod feature_engines;
mod helper_functions;
mod models;
mod pipeline;

#[derive(Parser)]
#[command(name = "feature_generator", version, about = "Derive variant-level features for per-sample TSV tables")]
struct Cli {
    /// JSON run configuration; built-in defaults when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (default: one per core).
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Log file, appended to (default: <output>/processing_log.txt).
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct BatchArgs {
    /// Directory of input .tsv files.
    #[arg(long)]
    input: PathBuf,

    /// Output directory, created if missing.
    #[arg(long)]
    output: PathBuf,

    /// Only process files whose name starts with this prefix.
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one stage over every file of a directory.
    Stage {
        #[arg(value_enum)]
        stage: StageKind,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Run gene-features, digenic, cri, cadd-imputation and rare-pairs in
    /// order, one output directory per stage.
    Chain {
        #[command(flatten)]
        batch: BatchArgs,
    },
}

fn init_tracing(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("cannot open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let (stages, batch, chained) = match &cli.command {
        Command::Stage { stage, batch } => (vec![*stage], batch, false),
        Command::Chain { batch } => (StageKind::CHAIN.to_vec(), batch, true),
    };

    fs::create_dir_all(&batch.output)
        .with_context(|| format!("cannot create output directory {}", batch.output.display()))?;
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| batch.output.join("processing_log.txt"));
    init_tracing(&log_file)?;

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if batch.prefix.is_some() {
        config.file_prefix = batch.prefix.clone();
    }

    let stage_names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
    info!("Starting feature generation: {}", stage_names.join(" -> "));

    let references = ReferenceData::load(&stages, &config.references.resolved(&project_root()))?;
    let engines = stages
        .iter()
        .map(|&stage| build_engine(stage, &references, &config))
        .collect::<Result<Vec<Box<dyn FeatureEngine>>, _>>()?;

    let files = discover_tsv_files(&batch.input, config.file_prefix.as_deref())
        .with_context(|| format!("cannot list input directory {}", batch.input.display()))?;
    if files.is_empty() {
        warn!("No .tsv files found in {}", batch.input.display());
        return Ok(ExitCode::SUCCESS);
    }
    info!("Found {} input file(s) in {}", files.len(), batch.input.display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or(0))
        .build()?;
    info!("Using {} worker thread(s)", pool.current_num_threads());

    let start = Instant::now();
    let statuses = if chained {
        create_stage_dirs(&batch.output, &engines)?;
        pool.install(|| run_chain(&engines, &files, &batch.output))
    } else {
        pool.install(|| run_stage(engines[0].as_ref(), &files, &batch.output))
    };

    if chained {
        for stage in &stages {
            let summary = BatchSummary::tally(statuses.iter().filter(|s| s.stage == *stage));
            info!("{}: {}", stage, summary);
        }
    }
    let summary = BatchSummary::tally(&statuses);
    info!("Processed {} file(s) in {:.2} sec: {}", files.len(), start.elapsed().as_secs_f64(), summary);

    if summary.failure > 0 {
        error!("{} file(s) failed, see {}", summary.failure, log_file.display());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
