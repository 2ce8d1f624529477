//! eventform CLI - Command-line replay of recorded hit streams.
//!
//! Reads text hit files, runs each through its own event-formation
//! pipeline and writes the reduced events.
#![allow(clippy::cast_precision_loss)]

use clap::{Parser, Subcommand, ValueEnum};
use eventform_algorithms::{
    BuilderStatistics, HitClusterer, MatcherKind, Pipeline, PipelineConfig, TimeAlgorithm,
};
use eventform_io::{EventFileWriter, HitReader, HitSummary, OutputFormat};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    EventformIo(#[from] eventform_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] eventform_core::Error),

    #[error("Config file {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{path}: {source}")]
    Input {
        path: PathBuf,
        source: Box<CliError>,
    },
}

/// Event file encoding.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Comma separated values
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Jsonl => Self::JsonLines,
        }
    }
}

/// Matching strategy override.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Matcher {
    /// Overlapping time windows
    Overlap,
    /// Time windows within the allowed gap
    Gap,
    /// Close end times
    End,
    /// Close estimated times, one cluster per plane
    Center,
}

impl From<Matcher> for MatcherKind {
    fn from(matcher: Matcher) -> Self {
        match matcher {
            Matcher::Overlap => Self::Overlap,
            Matcher::Gap => Self::Gap,
            Matcher::End => Self::End,
            Matcher::Center => Self::Center,
        }
    }
}

/// Streaming event formation for neutron detector hit data.
#[derive(Parser)]
#[command(name = "eventform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay hit files and write reduced events
    Process {
        /// Input hit file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output directory, one event file per input
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hits per partial flush
        #[arg(short, long, default_value = "10000")]
        batch_size: usize,

        /// Output encoding
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// Override the matching strategy
        #[arg(long, value_enum)]
        matcher: Option<Matcher>,

        /// Override the time algorithm (center-of-mass, charge2, utpc, utpc-weighted)
        #[arg(long)]
        time_algorithm: Option<TimeAlgorithm>,
    },

    /// Show information about a hit file
    Info {
        /// Input hit file
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default pipeline configuration as JSON
    Config,
}

/// Outcome of replaying one input file.
#[derive(Debug, Default)]
struct FileReport {
    output: PathBuf,
    hits: u64,
    events: u64,
    good_events: u64,
    builder: BuilderStatistics,
    clusters: u64,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn output_path(input: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "events".into(), |stem| stem.to_os_string());
    output_dir.join(stem).with_extension(format.extension())
}

fn process_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    batch_size: usize,
) -> Result<FileReport> {
    let mut pipeline = Pipeline::new(config)?;
    let mut writer = EventFileWriter::create(output)?;
    let mut report = FileReport {
        output: output.to_path_buf(),
        ..FileReport::default()
    };

    for batch in HitReader::open(input)?.batches(batch_size) {
        let batch = batch?;
        report.hits += batch.len() as u64;
        let events = pipeline.process(&batch);
        report.good_events += events.iter().filter(|event| event.good).count() as u64;
        writer.write_events(&events)?;
    }
    let events = pipeline.finish();
    report.good_events += events.iter().filter(|event| event.good).count() as u64;
    writer.write_events(&events)?;
    writer.flush()?;

    let builder = pipeline.builder();
    report.events = writer.written();
    report.builder = builder.statistics();
    report.clusters = builder.clusterer_a().statistics().clusters_found
        + builder.clusterer_b().statistics().clusters_found;
    debug!(
        "{}: {} hits, {} clusters, {} events",
        input.display(),
        report.hits,
        report.clusters,
        report.events
    );
    Ok(report)
}

fn run_process(
    input: &[PathBuf],
    output_dir: &Path,
    config: &PipelineConfig,
    batch_size: usize,
    format: OutputFormat,
) -> Result<Vec<FileReport>> {
    std::fs::create_dir_all(output_dir)?;
    input
        .par_iter()
        .map(|path| {
            let output = output_path(path, output_dir, format);
            info!("{} -> {}", path.display(), output.display());
            process_file(path, &output, config, batch_size).map_err(|err| CliError::Input {
                path: path.clone(),
                source: Box::new(err),
            })
        })
        .collect()
}

fn summarize(input: &Path) -> Result<HitSummary> {
    let mut summary = HitSummary::new();
    for hit in HitReader::open(input)? {
        summary.record(&hit?);
    }
    Ok(summary)
}

fn main() {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Process {
            input,
            output,
            config,
            batch_size,
            format,
            matcher,
            time_algorithm,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(matcher) = matcher {
                config.matcher.kind = matcher.into();
            }
            if let Some(algorithm) = time_algorithm {
                config.analyzer.time_algorithm = algorithm;
                config.matcher.time_algorithm = algorithm;
            }
            config.validate()?;
            if batch_size == 0 {
                warn!("batch size 0 treated as 1");
            }

            info!(
                "Processing {} file(s) with {} matcher, {} estimator",
                input.len(),
                config.matcher.kind,
                config.analyzer.time_algorithm
            );
            let start = Instant::now();
            let reports = run_process(&input, &output, &config, batch_size, format.into())?;
            let elapsed = start.elapsed();

            let hits: u64 = reports.iter().map(|r| r.hits).sum();
            let events: u64 = reports.iter().map(|r| r.events).sum();
            let good: u64 = reports.iter().map(|r| r.good_events).sum();
            let rejected: u64 = reports.iter().map(|r| r.builder.hits_rejected).sum();
            for report in &reports {
                println!(
                    "{}: {} hits, {} clusters, {} events ({} good)",
                    report.output.display(),
                    report.hits,
                    report.clusters,
                    report.events,
                    report.good_events
                );
            }
            println!(
                "Processed {} files in {:.2}s",
                reports.len(),
                elapsed.as_secs_f64()
            );
            println!("Total hits: {hits} ({rejected} rejected)");
            println!("Total events: {events} ({good} good)");
        }

        Commands::Info { input, json } => {
            let summary = summarize(&input)?;
            if json {
                let text =
                    serde_json::to_string_pretty(&summary).map_err(eventform_io::Error::from)?;
                println!("{text}");
                return Ok(());
            }

            println!("File: {}", input.display());
            println!("Hits: {}", summary.hits);
            if summary.invalid > 0 {
                println!("Invalid hits: {}", summary.invalid);
            }
            for (plane, count) in &summary.per_plane {
                println!("  plane {plane}: {count}");
            }
            if let (Some(min), Some(max)) = (summary.time_min, summary.time_max) {
                println!("Time range: {min} - {max} ({} ticks)", summary.duration());
            }
            if summary.out_of_order > 0 {
                println!("Out-of-order hits: {}", summary.out_of_order);
            }
        }

        Commands::Config => {
            let text = serde_json::to_string_pretty(&PipelineConfig::default())
                .map_err(eventform_io::Error::from)?;
            println!("{text}");
        }
    }
    Ok(())
}
