// intercut-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Intercut: keep the first N seconds of every N+M second cycle of a video",
    long_about = "Cuts videos into take/skip intervals with ffmpeg, under a supervisor \
                  that reports progress and accepts pause, resume and cancel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output on the console
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Write machine-readable JSON instead of the terminal view
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cuts one or more videos (files or directories) into an output directory
    Cut(CutArgs),
    /// Prints the duration, geometry and codec of a media file
    Info(InfoArgs),
    /// Prints the encoder that would be used on this host
    Encoders(EncoderArgs),
    /// Prints the ffmpeg command a cut would run, without running it
    Preview(PreviewArgs),
}

/// Take/skip pattern shared by `cut` and `preview`.
#[derive(Args, Debug, Clone, Copy)]
pub struct CycleArgs {
    /// Seconds to keep at the start of every cycle
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u32).range(1..))]
    pub take: u32,

    /// Seconds to drop after every kept segment
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u32).range(1..))]
    pub skip: u32,
}

/// Encoder overrides shared by the commands that build a command line.
#[derive(Args, Debug, Clone)]
pub struct EncoderArgs {
    /// Skip hardware detection and always encode with libx264 (also INTERCUT_SOFTWARE_ONLY)
    #[arg(long, default_value_t = false)]
    pub software: bool,

    /// Optional: quality value (CRF for libx264, CQ/QP for hardware encoders)
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(0..=51))]
    pub quality: Option<u8>,

    /// Optional: libx264 preset (e.g. veryfast, medium)
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<String>,
}

#[derive(Args, Debug)]
pub struct CutArgs {
    /// Input files or directories containing videos
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Directory where cut files will be saved
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub cycle: CycleArgs,

    #[command(flatten)]
    pub encoder: EncoderArgs,

    /// Optional: Directory for log files (defaults to OUTPUT_DIR/logs)
    #[arg(short, long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Optional: seconds to wait between two files
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub delay: u64,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Media file to inspect
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Optional: also report the length of a cut with this take value
    #[arg(long, value_name = "SECONDS", requires = "skip", value_parser = clap::value_parser!(u32).range(1..))]
    pub take: Option<u32>,

    /// Optional: also report the length of a cut with this skip value
    #[arg(long, value_name = "SECONDS", requires = "take", value_parser = clap::value_parser!(u32).range(1..))]
    pub skip: Option<u32>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Input video the command would read
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Optional: output directory (defaults to the input's directory)
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub cycle: CycleArgs,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}
