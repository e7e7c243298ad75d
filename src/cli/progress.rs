//! Terminal output for the CLI
//!
//! Print helpers shared by every command, the live scanning HUD and the
//! writer used when logs go to both the console and a file.

use crate::core::error::Result;
use crate::core::scan_state::{HistoryEntry, ScanTiming};
use crate::core::session::SessionReport;
use crate::ui::{AnnotatedFrame, FrameDisplay, Overlay};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Spinner style for the live HUD
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

/// Startup banner shown before the camera opens
pub fn print_banner(timing: &ScanTiming) {
    print_header("BARCODE SCANNER");
    print_info("Scanning is active");
    print_info(&format!(
        "Hold a barcode steady for {:.1}s to scan it",
        timing.stability.as_secs_f64()
    ));
    print_info(&format!(
        "The same code is ignored for {:.1}s after each scan",
        timing.cooldown.as_secs_f64()
    ));
    print_info("Type q and press Enter (or press Ctrl+C) to quit");
    println!();
}

/// Per-item tallies in first-scan order
pub fn print_tally(history: &[HistoryEntry]) {
    for entry in history {
        println!("      {:<32} x{:<4} {}", entry.label, entry.count, entry.payload);
    }
}

/// End-of-session summary: totals and per-item tallies
pub fn print_session_summary(report: &SessionReport) {
    print_divider();
    print_info(&format!("Session ended: {}", report.end_reason));
    print_info(&format!(
        "{} frames in {}",
        report.frames_processed,
        format_duration(report.elapsed)
    ));
    print_info(&format!(
        "{} scans of {} distinct items",
        report.total_scans,
        report.history.len()
    ));
    print_tally(&report.history);
    if report.persistence_failures > 0 {
        print_warning(&format!(
            "{} scans could not be written to the scan log",
            report.persistence_failures
        ));
    }
}

// ============================================================================
// Live HUD
// ============================================================================

/// One-line summary of an overlay for the spinner
pub fn hud_line(overlay: &Overlay) -> String {
    let mut line = overlay.status.clone();

    if !overlay.targets.is_empty() {
        let captions: Vec<&str> = overlay.targets.iter().map(|t| t.caption.as_str()).collect();
        line.push_str(" | ");
        line.push_str(&captions.join(", "));
    }

    if let Some(latest) = overlay.sidebar.first() {
        line.push_str(&format!(" | last: {} ({})", latest.title, latest.code_line));
    }

    line
}

/// Terminal display: a spinner carrying the HUD line, with announcements
/// printed above it
pub struct TerminalDisplay {
    spinner: ProgressBar,
    started: Instant,
    frames: u64,
    closed: bool,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Waiting for camera...");

        Self {
            spinner,
            started: Instant::now(),
            frames: 0,
            closed: false,
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDisplay for TerminalDisplay {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.frames += 1;
        let elapsed = self.started.elapsed().as_secs_f64().max(f64::EPSILON);
        self.spinner.set_message(format!(
            "{}  [{:.0} fps]",
            hud_line(&frame.overlay),
            self.frames as f64 / elapsed
        ));
        Ok(())
    }

    fn announce(&mut self, message: &str) {
        self.spinner.suspend(|| {
            println!("{}", message);
        });
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.spinner.finish_and_clear();
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Geometry;
    use crate::ui::{SidebarEntry, TargetAnnotation, TargetState};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_hud_line_idle() {
        let overlay = Overlay {
            status: "STATUS: TRACKING".to_string(),
            ..Default::default()
        };
        assert_eq!(hud_line(&overlay), "STATUS: TRACKING");
    }

    #[test]
    fn test_hud_line_with_targets_and_history() {
        let overlay = Overlay {
            targets: vec![TargetAnnotation {
                payload: "A".to_string(),
                caption: "[40%] WIDGET".to_string(),
                state: TargetState::Pending { progress_percent: 40 },
                geometry: Geometry::default(),
            }],
            sidebar: vec![SidebarEntry {
                title: "Gadget (x2)".to_string(),
                code_line: "ID: B".to_string(),
                is_recent: true,
            }],
            status: "STATUS: VERIFYING...".to_string(),
        };
        assert_eq!(
            hud_line(&overlay),
            "STATUS: VERIFYING... | [40%] WIDGET | last: Gadget (x2) (ID: B)"
        );
    }

    #[test]
    fn test_dual_writer_writes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("out.log");
        let mut writer = DualWriter {
            console: std::io::stderr(),
            file: std::fs::File::create(&path).unwrap(),
        };
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
