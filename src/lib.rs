//! Barcode Scanner Library
//!
//! Turns a stream of camera frames into a clean sequence of verified scans.
//! A barcode must stay in view for a stability window before it counts, and
//! a verified code is ignored for a cooldown window afterwards. Each scan is
//! tallied, shown to the operator and appended to a persistent scan log.
//!
//! # Architecture
//!
//! - [`core`] - Configuration, errors, payload normalization, catalog lookup,
//!   the scan state machine, the scan log and the session loop
//! - [`device`] - Frame sources and the non-blocking capture wrapper
//! - [`detect`] - Barcode detector contract and the QR decoder
//! - [`ui`] - Feedback overlay and the display seam
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Scripted devices and scenarios for testing without a camera
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use barcode_scanner::core::config::Config;
//! use barcode_scanner::core::scan_log::ScanLog;
//! use barcode_scanner::core::session::{Session, SessionOptions};
//! use barcode_scanner::device::ImageSequenceSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let session = Session::new(
//!         ImageSequenceSource::from_config(&config.capture),
//!         Box::new(ScanLog::new(&config.storage.log_path)),
//!         SessionOptions::from_config(&config)?,
//!     );
//!
//!     let report = session.run().await?;
//!     println!("{} scans", report.total_scans);
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without a Camera
//!
//! ```rust,no_run
//! use barcode_scanner::testdb::TestRunner;
//!
//! let summary = TestRunner::new().run_all();
//! println!("Passed: {}/{}", summary.passed, summary.total);
//! ```

pub mod cli;
pub mod core;
pub mod detect;
pub mod device;
pub mod testdb;
pub mod ui;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
