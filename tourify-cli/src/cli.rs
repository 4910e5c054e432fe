use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use tourify_client::AspectRatio;

#[derive(Parser, Debug)]
#[command(
    name = "tourify",
    version,
    about = "Generate property tour videos from listing photos",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true, env = "TOURIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend URL, overriding the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(long, global = true)]
    pub output_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List background music tracks
    Tracks {
        /// Preview tracks by id, one after another
        #[arg(long = "play", value_name = "TRACK_ID")]
        play: Vec<String>,

        /// Seconds to play each preview
        #[arg(long, default_value_t = 10)]
        preview_secs: u64,
    },

    /// Import images from a realtor listing page
    Import {
        /// Listing URL
        url: String,
    },

    /// Submit images and render a tour video
    Generate {
        /// Local image files
        files: Vec<PathBuf>,

        /// Also use every image imported from this listing URL
        #[arg(long)]
        listing: Option<String>,

        /// Music track id (defaults to the last one used)
        #[arg(short, long)]
        track: Option<String>,

        /// 16:9, 9:16 or 1:1 (defaults to the last one used)
        #[arg(short, long)]
        aspect_ratio: Option<AspectRatio>,

        /// Print the run id and exit instead of waiting for the video
        #[arg(long)]
        no_wait: bool,
    },

    /// Show a pipeline run
    Status {
        run_id: String,

        /// Keep polling until the run finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// List pipeline runs of this session
    Runs,

    /// List the session's media library
    Library,

    /// Upload images to the media library
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Split a landscape image into portrait crops
    Split {
        media_id: String,

        /// Save the crops to the library instead of previewing them
        #[arg(long)]
        commit: bool,
    },

    /// Export the session's videos to Gmail
    GmailExport {
        /// Recipient address (defaults to the last one used)
        email: Option<String>,

        /// Print the task id and exit instead of waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Inspect a WebVTT transcript
    Transcript {
        file: PathBuf,

        /// Show only the cue displayed at this many seconds
        #[arg(long)]
        at: Option<f64>,

        /// Print the text without timings
        #[arg(long)]
        plain: bool,

        /// Re-emit the transcript as normalized WebVTT
        #[arg(long, conflicts_with_all = ["plain", "at"])]
        normalize: bool,
    },

    /// Print per-frame values of the button-click overlay
    Overlay {
        /// Click time in seconds
        #[arg(long)]
        at: f64,

        #[arg(long, default_value_t = 30.0)]
        fps: f64,

        #[arg(long, default_value_t = 0.0)]
        x: f64,

        #[arg(long, default_value_t = 0.0)]
        y: f64,
    },

    /// Show or reset the session key
    Session {
        /// Forget the current key; a new one is created on next use
        #[arg(long)]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored output
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
    /// Table
    Table,
    /// Comma-separated values
    Csv,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonCompact)
    }
}
