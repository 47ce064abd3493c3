// SPDX-License-Identifier: GPL-3.0-only

use angiocam::constants::app_info;
use angiocam::media::filters::FilterConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "angiocam")]
#[command(about = "Angiography camera capture, filtering and timed recording")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and the modes they report
    Devices,

    /// Show which encoder recordings will use
    Codec,

    /// Run the live preview without recording
    Preview {
        /// Camera index to use (from 'angiocam devices')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Write the last filtered frame to this path as PNG on exit
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Persist these settings as future defaults
        #[arg(long)]
        save: bool,
    },

    /// Record filtered video to a timestamped MP4
    Record {
        /// Camera index to use (from 'angiocam devices')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Recording duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Quality value on the selected codec's scale
        #[arg(short, long)]
        quality: Option<u32>,

        /// Capture format as WxH@F, e.g. 1280x720@30fps
        #[arg(short, long)]
        format: Option<String>,

        /// Directory recordings are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Persist these settings as future defaults
        #[arg(long)]
        save: bool,
    },
}

/// Filter toggles shared by the preview and record commands
#[derive(Args, Clone, Copy, Default)]
struct FilterArgs {
    /// Enable vessel enhancement
    #[arg(long)]
    vessel: bool,

    /// Enable color CLAHE
    #[arg(long)]
    clahe_color: bool,

    /// Enable luminance-only CLAHE
    #[arg(long)]
    clahe_luma: bool,

    /// Enable grayscale conversion
    #[arg(long)]
    grayscale: bool,
}

impl FilterArgs {
    /// `None` when no filter flag was given, so stored defaults apply
    fn to_config(self) -> Option<FilterConfig> {
        let config = FilterConfig {
            vessel: self.vessel,
            clahe_color: self.clahe_color,
            clahe_luma: self.clahe_luma,
            grayscale: self.grayscale,
        };
        config.any_enabled().then_some(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=angiocam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => cli::list_devices(),
        Commands::Codec => cli::show_codec(),
        Commands::Preview {
            camera,
            duration,
            snapshot,
            filters,
            save,
        } => cli::run_preview(camera, duration, snapshot, filters.to_config(), save),
        Commands::Record {
            camera,
            duration,
            quality,
            format,
            output_dir,
            filters,
            save,
        } => cli::record(
            camera,
            duration,
            quality,
            format,
            output_dir,
            filters.to_config(),
            save,
        ),
    }
}
