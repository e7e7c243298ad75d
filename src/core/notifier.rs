//! Best-effort scan confirmation
//!
//! A notifier is invoked after each verified scan. Its failures are logged by
//! the caller and discarded; they are never retried and never interrupt the
//! frame loop.

use crate::core::error::{Result, ScanError};
use crate::core::scan_state::VerifiedScan;
use std::io::Write;

/// Side effect fired for every verified scan
pub trait Notifier: Send {
    fn notify(&mut self, scan: &VerifiedScan) -> Result<()>;
}

/// Rings the terminal bell
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn notify(&mut self, _scan: &VerifiedScan) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| ScanError::Notification(e.to_string()))
    }
}

/// Does nothing
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&mut self, _scan: &VerifiedScan) -> Result<()> {
        Ok(())
    }
}

/// Pick the notifier for the configured feedback mode
pub fn from_config(beep: bool) -> Box<dyn Notifier> {
    if beep {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentNotifier)
    }
}
