use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use wm_core::Profile;

#[derive(Parser)]
#[command(name = "webmify")]
#[command(author, version, about = "Transcode video into WebM and Chromecast-ready containers")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode one or more input files
    Encode(EncodeArgs),

    /// Probe a media file and display the properties the encoder uses
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input files, processed in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Burn subtitles into the video
    #[arg(long, help_heading = "Encoding")]
    pub burn_subs: bool,

    /// Apply the fftdnoiz denoise filter
    #[arg(long, help_heading = "Encoding")]
    pub denoise: bool,

    /// Detect and remove black borders
    #[arg(long, help_heading = "Encoding")]
    pub crop: bool,

    /// Use <input stem>.srt instead of embedded subtitles
    #[arg(long, help_heading = "Encoding", conflicts_with = "no_subs")]
    pub external_subs: bool,

    /// Skip subtitles entirely
    #[arg(long, help_heading = "Encoding")]
    pub no_subs: bool,

    /// Encoding quality (constant rate factor)
    #[arg(short = 'q', long, visible_alias = "quality", help_heading = "Encoding")]
    pub crf: Option<u32>,

    /// Encoder thread count
    #[arg(long, help_heading = "Encoding")]
    pub threads: Option<u32>,

    /// Downscale video taller than this
    #[arg(long, help_heading = "Encoding")]
    pub max_height: Option<u32>,

    /// Delivery profile: webm or chromecast (default: by media kind)
    #[arg(long, help_heading = "Encoding")]
    pub profile: Option<Profile>,

    /// Movie or series title (default: from the file name)
    #[arg(short, long, help_heading = "Metadata")]
    pub title: Option<String>,

    /// Series season number
    #[arg(long, help_heading = "Metadata")]
    pub season: Option<String>,

    /// Series episode number
    #[arg(long, help_heading = "Metadata")]
    pub episode: Option<String>,

    /// Take the first search result instead of prompting
    #[arg(long, help_heading = "Metadata")]
    pub first_match: bool,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Output base name (single input only)
    #[arg(short = 'f', long)]
    pub filename: Option<String>,

    /// Delete the original file after a successful encode
    #[arg(long)]
    pub delete: bool,

    /// Parse, probe and plan without encoding
    #[arg(long = "test")]
    pub dry_run: bool,
}
