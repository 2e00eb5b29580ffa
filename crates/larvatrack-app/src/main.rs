//! LarvaTrack - larval fish pose tracking from the command line.
//!
//! Entry point: argument parsing, logging setup and subcommand dispatch.

mod commands;
mod worker;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use larvatrack_media::VideoCodec;
use larvatrack_tracking::{BackgroundMethod, Polarity, TrackingMethod};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track eye, swim bladder and tail positions of larval fish in video")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a background image and save it as PNG
    Background {
        /// Input video
        video: PathBuf,

        #[command(flatten)]
        background: BackgroundArgs,

        /// Output PNG (defaults to <video>_background.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Track one video and save the results as JSON
    Track(TrackArgs),

    /// Track every video listed in a JSON job file, in parallel
    Batch {
        /// JSON array of jobs
        jobs: PathBuf,
    },

    /// Print stream information for a video
    Probe {
        /// Input video
        video: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct BackgroundArgs {
    /// Background method (brightest, darkest, modal)
    #[arg(id = "background_method", long = "background-method", default_value = "brightest")]
    method: BackgroundMethod,

    /// Tile size for the modal method, as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_chunk)]
    chunk: Option<(u32, u32)>,

    /// Use every Nth frame
    #[arg(long, default_value_t = 1)]
    stride: usize,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Input video
    video: PathBuf,

    /// Tracking parameters as JSON (missing keys take defaults)
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Override the tracking method (free_swimming, head_fixed)
    #[arg(long)]
    method: Option<TrackingMethod>,

    /// Override the initial pixel search (brightest, darkest)
    #[arg(long)]
    initial_pixel_search: Option<Polarity>,

    /// Override the number of tail points
    #[arg(long)]
    n_tail_points: Option<usize>,

    /// Enable the extended eye calculation
    #[arg(long)]
    extended_eyes: bool,

    /// Use a saved background PNG instead of computing one
    #[arg(short, long, conflicts_with = "save_background")]
    background: Option<PathBuf>,

    #[command(flatten)]
    background_options: BackgroundArgs,

    /// Save the computed background beside the video
    #[arg(long)]
    save_background: bool,

    /// First frame to track
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Number of frames to track (defaults to the rest of the video)
    #[arg(long)]
    frames: Option<usize>,

    /// Results JSON (defaults to <video>_results.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write an annotated video here
    #[arg(long)]
    annotated: Option<PathBuf>,

    /// Codec for the annotated video (h264, mjpeg, ffv1)
    #[arg(long, default_value = "h264")]
    codec: VideoCodec,
}

fn parse_chunk(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((w, h))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if !matches!(cli.command, Command::Probe { .. }) && !larvatrack_media::init() {
        anyhow::bail!("ffmpeg was not found on PATH");
    }

    match cli.command {
        Command::Background {
            video,
            background,
            output,
        } => commands::background(&video, &background, output),
        Command::Track(args) => commands::track(args),
        Command::Batch { jobs } => commands::batch(&jobs),
        Command::Probe { video } => commands::probe(&video),
    }
}
