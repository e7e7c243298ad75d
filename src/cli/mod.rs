//! CLI module for the barcode scanner
//!
//! This module contains all command-line interface related code including
//! argument parsing, command definitions, and command handlers.
//!
//! # Submodules
//!
//! - `args` - Command-line argument definitions using clap
//! - `commands` - Command handler implementations
//! - `input` - Keyboard exit requests
//! - `progress` - Terminal HUD and CLI output utilities

pub mod args;
pub mod commands;
pub mod input;
pub mod progress;

pub use args::{Args, Commands};
pub use commands::run_command;
pub use progress::DualWriter;
