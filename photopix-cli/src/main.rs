//! photopix: accumulate simulated photon hits into per-event summaries.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{Parser, Subcommand};
use photopix_core::{
    ChargeDivisionReadout, PhotonAccumulator, PixelGrid, Position, SensorConfig, SpectralTrace,
};
use photopix_io::{EventSummary, HitFileReader, OutputFormat, SummaryWriter};
use rayon::prelude::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PhotopixIo(#[from] photopix_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] photopix_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Photon-hit accumulation for simulated photosensors.
#[derive(Parser)]
#[command(name = "photopix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Segmented readout geometry given on the command line.
#[derive(clap::Args, Debug, Clone, Copy)]
struct GridArgs {
    /// Pixel columns (enables segmented readout)
    #[arg(long, requires_all = ["rows", "width", "height"])]
    columns: Option<u16>,

    /// Pixel rows
    #[arg(long, requires = "columns")]
    rows: Option<u16>,

    /// Active-area width
    #[arg(long, requires = "columns")]
    width: Option<f64>,

    /// Active-area height
    #[arg(long, requires = "columns")]
    height: Option<f64>,
}

impl GridArgs {
    fn config(&self) -> SensorConfig {
        match (self.columns, self.rows, self.width, self.height) {
            (Some(columns), Some(rows), Some(width), Some(height)) => {
                SensorConfig::segmented(columns, rows, width, height)
            }
            _ => SensorConfig::continuous(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Accumulate hit-list files and write one summary per event
    Process {
        /// Input hit-list file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file (.csv or JSON lines); stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sensor configuration file (JSON)
        #[arg(short, long, conflicts_with_all = ["columns", "gain"])]
        config: Option<PathBuf>,

        #[command(flatten)]
        grid: GridArgs,

        /// Per-pixel gain file (segmented readout only)
        #[arg(long, requires = "columns")]
        gain: Option<PathBuf>,

        /// Spectral response table
        #[arg(long)]
        spectral: Option<PathBuf>,

        /// Log the charge-division (Anger) position of each event
        #[arg(long)]
        anger: bool,
    },

    /// Show the pixel a position falls in
    Locate {
        /// X position
        #[arg(allow_hyphen_values = true)]
        x: f64,

        /// Y position
        #[arg(allow_hyphen_values = true)]
        y: f64,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Validate a sensor configuration file and print it
    Check {
        /// Sensor configuration file (JSON)
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn process_file(path: &Path, config: &SensorConfig, anger: bool) -> Result<Vec<EventSummary>> {
    let mut accumulator = PhotonAccumulator::from_config(config, SpectralTrace::new())?;
    let source = path.display().to_string();
    let mut summaries = Vec::new();

    for event in HitFileReader::open(path)? {
        let event = event?;
        let summary = event.accumulate(&mut accumulator);

        if anger {
            let channels = accumulator.readout_currents()?;
            match ChargeDivisionReadout::anger_position(&channels) {
                Some((x, y)) => info!(source = %source, event = event.index, x, y, "anger position"),
                None => info!(source = %source, event = event.index, "no charge collected"),
            }
        }

        summaries.push(EventSummary {
            source: source.clone(),
            event: event.index,
            summary,
        });
    }

    debug!(source = %source, events = summaries.len(), "file processed");
    Ok(summaries)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            grid,
            gain,
            spectral,
            anger,
        } => {
            let mut sensor = match config {
                Some(path) => SensorConfig::from_file(path)?,
                None => grid.config(),
            };
            if let Some(path) = gain {
                sensor = sensor.with_gain_file(path);
            }
            if let Some(path) = spectral {
                sensor = sensor.with_spectral_response(path);
            }
            sensor.validate()?;
            debug!(?sensor, "sensor configuration");

            let anger = anger && {
                let supported = sensor.supports_charge_division();
                if !supported {
                    warn!("--anger needs an 8x8 segmented readout; skipping Anger positions");
                }
                supported
            };

            let start = Instant::now();

            // One accumulator per file; files share no state.
            let per_file = input
                .par_iter()
                .map(|path| process_file(path, &sensor, anger))
                .collect::<Result<Vec<_>>>()?;

            let (sink, format): (Box<dyn Write>, OutputFormat) = match &output {
                Some(path) => (
                    Box::new(BufWriter::new(std::fs::File::create(path)?)),
                    OutputFormat::from_path(path),
                ),
                None => (
                    Box::new(BufWriter::new(std::io::stdout().lock())),
                    OutputFormat::JsonLines,
                ),
            };
            let mut writer = SummaryWriter::new(sink, format);
            let mut total_events = 0usize;
            let mut total_photons = 0usize;
            for summaries in &per_file {
                total_events += summaries.len();
                total_photons += summaries.iter().map(|s| s.summary.n_points).sum::<usize>();
                writer.write_all(summaries)?;
            }
            writer.flush()?;

            info!(
                files = input.len(),
                events = total_events,
                photons = total_photons,
                elapsed_s = start.elapsed().as_secs_f64(),
                "processing complete"
            );
        }

        Commands::Locate { x, y, grid } => {
            let (Some(columns), Some(rows), Some(width), Some(height)) =
                (grid.columns, grid.rows, grid.width, grid.height)
            else {
                return Err(photopix_core::Error::NotSegmented.into());
            };
            let pixel_grid = PixelGrid::new(columns, rows, width, height)?;
            let position = Position::new(x, y, 0.0);
            let location = pixel_grid.locate(&position);

            println!(
                "Pixel: ({}, {})",
                location.index.column, location.index.row
            );
            println!(
                "Center: ({}, {})",
                location.center.x, location.center.y
            );
            if !pixel_grid.contains(&position) {
                println!("Position is outside the active area (clamped)");
            }
        }

        Commands::Check { config } => {
            let sensor = SensorConfig::from_file(&config)?;
            println!("{}", serde_json::to_string_pretty(&sensor)?);
        }
    }

    Ok(())
}
