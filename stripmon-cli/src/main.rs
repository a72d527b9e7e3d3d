//! Command-line front end: runs the strip cluster monitor over an event file.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stripmon_core::{Subdetector, TrackHit};
use stripmon_io::{CalibrationTable, EventReader, SummaryWriter};
use stripmon_stats::{DecimationMode, MonitorConfig, StripMonitor, TrendConfig};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    StripmonIo(#[from] stripmon_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] stripmon_core::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Trend decimation mode selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Merge bin pairs and double the step
    RebinHalve,
    /// Drop the oldest bin and move the window
    Slide,
    /// Clear all bins and start a new window
    Reset,
}

impl From<Mode> for DecimationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::RebinHalve => DecimationMode::RebinHalve,
            Mode::Slide => DecimationMode::Slide,
            Mode::Reset => DecimationMode::Reset,
        }
    }
}

/// Cluster quality monitor for silicon strip detectors.
#[derive(Parser)]
#[command(name = "stripmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate cluster metrics of an event file
    Process {
        /// Input JSON-lines event file
        input: PathBuf,

        /// Noise calibration table (JSON)
        #[arg(short, long)]
        calibration: PathBuf,

        /// Output file (.csv or .json)
        #[arg(short, long)]
        output: PathBuf,

        /// Monitor configuration (JSON); flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of trend bins
        #[arg(long)]
        bins: Option<usize>,

        /// Events per trend bin
        #[arg(long)]
        step: Option<u64>,

        /// Trend decimation mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Disable trend buffers
        #[arg(long)]
        no_trend: bool,

        /// Fill per-module metrics
        #[arg(long)]
        modules: bool,

        /// Ignore off-track clusters
        #[arg(long)]
        no_off_track: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about an event file
    Info {
        /// Input JSON-lines event file
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => {
            let file = File::open(path)?;
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
        None => Ok(MonitorConfig::default()),
    }
}

fn trend_overrides(
    trend: Option<TrendConfig>,
    bins: Option<usize>,
    step: Option<u64>,
    mode: Option<Mode>,
) -> TrendConfig {
    let mut trend = trend.unwrap_or_default();
    if let Some(bins) = bins {
        trend = trend.with_bins(bins);
    }
    if let Some(step) = step {
        trend = trend.with_step(step);
    }
    if let Some(mode) = mode {
        trend = trend.with_mode(mode.into());
    }
    trend
}

fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stripmon");
    output.with_file_name(format!("{stem}_{suffix}.csv"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            calibration,
            output,
            config,
            bins,
            step,
            mode,
            no_trend,
            modules,
            no_off_track,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = load_config(config.as_deref())?;
            if no_trend {
                config.trend = None;
            } else if bins.is_some() || step.is_some() || mode.is_some() {
                config.trend = Some(trend_overrides(config.trend.take(), bins, step, mode));
            }
            if modules {
                config.module_level = true;
            }
            if no_off_track {
                config.off_track = false;
            }
            log::debug!("monitor configuration: {:?}", config);

            let calibration = CalibrationTable::open(&calibration)?;
            let trending = config.trend.is_some();
            let mut monitor = StripMonitor::new(config, calibration)?;

            let start = Instant::now();
            let mut skipped_events = 0usize;
            let mut reader = EventReader::open(&input)?;
            for record in reader.by_ref() {
                let record = record?;
                let event = record.event;
                match monitor.process_event(event, &record.into_observations()) {
                    Ok(_) => {}
                    Err(err @ stripmon_core::Error::OutOfOrderFill { .. }) => {
                        log::warn!("skipping event {}: {}", event, err);
                        skipped_events += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            let elapsed = start.elapsed();
            log::info!("read {} lines from {}", reader.line(), input.display());

            let registry = monitor.registry();
            let format = output
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or_else(|| "csv".to_string(), |ext| ext.to_lowercase());
            match format.as_str() {
                "json" => {
                    SummaryWriter::create(&output)?.write_snapshot_json(registry)?;
                }
                other => {
                    if other != "csv" {
                        log::warn!("unknown extension '{}', writing CSV", other);
                    }
                    SummaryWriter::create(&output)?.write_summary_csv(registry)?;
                    if trending {
                        let trends = sibling_path(&output, "trends");
                        SummaryWriter::create(&trends)?.write_trends_csv(registry)?;
                        log::info!("trends written to {}", trends.display());
                    }
                }
            }

            let stats = monitor.statistics();
            println!(
                "Processed {} events in {:.2}s",
                stats.events,
                elapsed.as_secs_f64()
            );
            println!(
                "Clusters: {} accepted, {} rejected, {} skipped, {} failed",
                stats.accepted, stats.rejected, stats.skipped, stats.failed
            );
            if skipped_events > 0 {
                println!("Out-of-order events skipped: {}", skipped_events);
            }
            println!("Monitored keys: {}", registry.len());
            println!("Output: {}", output.display());
        }

        Commands::Info { input } => {
            init_logging(false);

            let mut events = 0usize;
            let mut first_event = None;
            let mut last_event = None;
            let mut on_track = 0usize;
            let mut off_track = 0usize;
            let mut matched = 0usize;
            let mut per_subdet = [0usize; 4];
            let mut modules = BTreeSet::new();

            for record in EventReader::open(&input)? {
                let record = record?;
                events += 1;
                first_event.get_or_insert(record.event);
                last_event = Some(record.event);

                matched += record
                    .hits
                    .iter()
                    .filter(|h| matches!(h, TrackHit::Matched { .. }))
                    .count();
                off_track += record.off_track.len();
                on_track += record.cluster_count() - record.off_track.len();

                for obs in record.into_observations() {
                    modules.insert(obs.cluster.module);
                    if let Some(subdet) = obs.cluster.module.subdetector() {
                        per_subdet[subdet.index()] += 1;
                    }
                }
            }

            println!("File: {}", input.display());
            println!("Events: {}", events);
            if let (Some(first), Some(last)) = (first_event, last_event) {
                println!("Event range: {} - {}", first, last);
            }
            println!("On-track clusters: {} ({} matched hits)", on_track, matched);
            println!("Off-track clusters: {}", off_track);
            println!("Modules: {}", modules.len());
            for subdet in Subdetector::ALL {
                println!("  {}: {}", subdet, per_subdet[subdet.index()]);
            }
        }
    }

    Ok(())
}
