//! Core functionality module
//!
//! Configuration, errors and the scanning pipeline that sits between the
//! capture device and the operator.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `normalizer` - Raw symbol bytes to payload text
//! - `catalog` - Payload to product label lookup
//! - `scan_state` - Stability/cooldown state machine, tally and history
//! - `scan_log` - Persisted scan log
//! - `notifier` - Best-effort scan confirmation
//! - `session` - Session lifecycle and frame loop

pub mod catalog;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod notifier;
pub mod scan_log;
pub mod scan_state;
pub mod session;
