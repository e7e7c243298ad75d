//! Barcode Scanner - CLI Entry Point
//!
//! This binary is a thin wrapper around the library, handling argument parsing,
//! logging setup, and command dispatch.

use anyhow::Result;
use barcode_scanner::cli::{self, Args, DualWriter};
use barcode_scanner::core::config::Config;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(ref config_path) = args.config {
        match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }
        }
    } else {
        Config::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: {}", e);
            Config::default()
        })
    };

    // Apply CLI overrides to config
    if let Some(ref frames_dir) = args.frames_dir {
        config.capture.frames_dir = frames_dir.clone();
    }
    if let Some(ref log_path) = args.log_path {
        config.storage.log_path = log_path.clone();
    }
    if args.no_beep {
        config.feedback.beep = false;
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Set up graceful shutdown handler
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag_clone.load(Ordering::SeqCst) {
            // Second Ctrl+C - force exit
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            shutdown_flag_clone.store(true, Ordering::SeqCst);
            eprintln!("\nStopping scanner... (Press Ctrl+C again to force quit)");
        }
    })
    .expect("Failed to set Ctrl+C handler");

    // Initialize logger
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    if config.logging.log_to_file {
        // Set up logging to both console and file
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.log_file)?;

        Builder::new()
            .filter_level(log_level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(DualWriter {
                console: std::io::stderr(),
                file: log_file,
            })))
            .init();

        info!("Logging to file: {}", config.logging.log_file.display());
    } else {
        Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
            .init();
    }

    info!("Barcode Scanner v{}", barcode_scanner::VERSION);

    // Run the command
    cli::run_command(&args, &config, shutdown_flag)?;

    Ok(())
}
