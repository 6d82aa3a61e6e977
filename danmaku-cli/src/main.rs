//! Danmaku CLI Tool
//!
//! Command-line interface for charting comment density and replaying a
//! scripted playback session through the sync engine.

mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use danmaku_core::{CommentEntity, DanmakuOptions};
use danmaku_density::{
    compute_density_bins, DensityOptions, DensityPoint, DEFAULT_BIN_WIDTH_SECS, MAX_BIN_COUNT,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Width of the text bar chart in characters
const BAR_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "danmaku")]
#[command(about = "Danmaku playback sync and density tools")]
#[command(version)]
struct Cli {
    /// Options file (JSON: offsetMs, gaps, filters, specialComments, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the gaps of this preset from the options file
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the comment density histogram
    Density {
        /// Comments file (JSON array of { "p": "time,mode,color", "m": "text" })
        input: PathBuf,

        /// Video duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Bin width in seconds
        #[arg(short, long, default_value_t = DEFAULT_BIN_WIDTH_SECS)]
        bin_width: f64,

        /// Print bins as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a scripted playback session and print every renderer call
    Replay {
        /// Comments file (JSON array of { "p": "time,mode,color", "m": "text" })
        input: PathBuf,

        /// Script file (JSON array of steps)
        #[arg(short, long)]
        script: PathBuf,

        /// Seconds a comment stays on screen
        #[arg(long)]
        lookback: Option<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "danmaku=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref(), cli.preset.as_deref())?;

    match cli.command {
        Commands::Density {
            input,
            duration,
            bin_width,
            json,
        } => print_density(&input, &options, duration, bin_width, json)?,

        Commands::Replay {
            input,
            script,
            lookback,
        } => replay::run(&input, &script, options, lookback)?,
    }

    Ok(())
}

fn load_options(path: Option<&Path>, preset: Option<&str>) -> Result<DanmakuOptions> {
    let mut options = match path {
        Some(path) => {
            info!("Loading options from {}", path.display());
            DanmakuOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?
        }
        None => DanmakuOptions::default(),
    };

    if let Some(id) = preset {
        options.apply_preset(id).context("Failed to apply gap preset")?;
        options.validate().context("Invalid gap preset")?;
        info!("Using gap preset '{}' ({} gaps)", id, options.gaps.len());
    }

    Ok(options)
}

/// Reads a JSON array of comment entities
fn read_comments(path: &Path) -> Result<Vec<CommentEntity>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open comments file {}", path.display()))?;
    let comments: Vec<CommentEntity> =
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse comments")?;
    info!("Read {} comments from {}", comments.len(), path.display());
    Ok(comments)
}

fn print_density(
    input: &Path,
    options: &DanmakuOptions,
    duration: f64,
    bin_width: f64,
    json: bool,
) -> Result<()> {
    let comments = read_comments(input)?;
    let bins = compute_density_bins(
        &comments,
        duration,
        bin_width,
        &DensityOptions::from(options),
    );

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bins).context("Failed to serialize bins")?
        );
    } else if bins.is_empty() {
        println!(
            "No bins: duration must be a positive number of seconds and span at most {} bins",
            MAX_BIN_COUNT
        );
    } else {
        print_chart(&bins);
    }

    Ok(())
}

fn print_chart(bins: &[DensityPoint]) {
    for bin in bins {
        let filled = (bin.value * BAR_WIDTH as f64).round() as usize;
        println!(
            "{:>9.1}s |{:<width$}| {:.2}",
            bin.time,
            "#".repeat(filled),
            bin.value,
            width = BAR_WIDTH
        );
    }
}
