//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time barcode scanner with stability verification and a persisted scan log
#[derive(Parser, Debug)]
#[command(name = "barcode-scanner")]
#[command(version)]
#[command(about = "Scan barcodes from a camera feed, verify them over a stability window and log each scan", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of frames to replay as the camera (overrides config)
    #[arg(short, long, global = true)]
    pub frames_dir: Option<PathBuf>,

    /// Scan log database path (overrides config)
    #[arg(long, global = true)]
    pub log_path: Option<PathBuf>,

    /// Disable the terminal bell on verified scans
    #[arg(long, global = true)]
    pub no_beep: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start scanning (default when no command is given)
    ///
    /// Type `q` and press Enter, or press Ctrl+C, to stop.
    Run {
        /// Restart the frame sequence when it ends
        #[arg(long = "loop")]
        loop_playback: bool,
    },

    /// Play a scripted scenario through the scanner without a camera
    Simulate {
        /// Scenario to play (see `scenarios`)
        #[arg(short, long, default_value = "stable_single_code")]
        scenario: String,

        /// Run every scenario and print a summary
        #[arg(long, conflicts_with = "scenario")]
        all: bool,

        /// Run only the scenarios tagged `quick`
        #[arg(long, conflicts_with_all = ["scenario", "all"])]
        quick: bool,

        /// Write a JSON report of the run here
        #[arg(long, value_name = "FILE")]
        json_report: Option<PathBuf>,
    },

    /// List the scripted scenarios
    Scenarios {
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show the most recent entries of the scan log
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// List the product catalog
    Catalog,

    /// Open the configuration file in your default editor
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\barcode_scanner\config.toml
    /// - Linux: ~/.config/barcode_scanner/config.toml
    /// - macOS: ~/Library/Application Support/barcode_scanner/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}
