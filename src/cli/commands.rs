//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::input::KeyboardExit;
use crate::cli::progress::{
    print_banner, print_error, print_header, print_info, print_session_summary, print_success,
    print_tally, print_warning, TerminalDisplay,
};
use crate::cli::{Args, Commands};
use crate::core::catalog::Catalog;
use crate::core::config::{get_config_path, init_config, open_config_in_editor, Config};
use crate::core::notifier;
use crate::core::scan_log::ScanLog;
use crate::core::session::{EndReason, Session, SessionOptions};
use crate::device::ImageSequenceSource;
use crate::testdb::{self, run_blocking, write_json_report, ScenarioLibrary, TestRunner, TestRunnerConfig};
use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
///
/// Scanning is the default when no command is given.
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        None => run_scanner(config, shutdown_flag),
        Some(Commands::Run { loop_playback }) => {
            let mut config = config.clone();
            config.capture.loop_playback |= *loop_playback;
            run_scanner(&config, shutdown_flag)
        }
        Some(Commands::Simulate {
            scenario,
            all,
            quick,
            json_report,
        }) => {
            if *all || *quick {
                simulate_suite(*quick, json_report.as_deref())
            } else {
                simulate_scenario(scenario, json_report.as_deref())
            }
        }
        Some(Commands::Scenarios { tag }) => {
            list_scenarios(tag.as_deref());
            Ok(())
        }
        Some(Commands::History { limit }) => show_history(&config.storage.log_path, *limit),
        Some(Commands::Catalog) => {
            show_catalog(config);
            Ok(())
        }
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::GenerateConfig { output }) => generate_config_file(output.clone()),
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(())
        }
    }
}

/// Scan from the configured frame source until the operator quits
pub fn run_scanner(config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    let options = SessionOptions::from_config(config).context("Invalid scanning settings")?;
    print_banner(&options.timing);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    info!(
        "Replaying frames from {} (scan log: {})",
        config.capture.frames_dir.display(),
        config.storage.log_path.display()
    );

    let session = Session::new(
        ImageSequenceSource::from_config(&config.capture),
        Box::new(ScanLog::new(&config.storage.log_path)),
        options,
    )
    .with_catalog(Box::new(Catalog::from_config(&config.catalog)))
    .with_notifier(notifier::from_config(config.feedback.beep))
    .with_display(Box::new(TerminalDisplay::new()))
    .with_exit_signal(Box::new(KeyboardExit::spawn(shutdown_flag)));

    let report = match runtime.block_on(session.run()) {
        Ok(report) => report,
        Err(e) => {
            print_error(&format!("Could not open capture device: {}", e));
            return Err(anyhow!(e).context("Scanner could not start"));
        }
    };

    print_session_summary(&report);
    match &report.end_reason {
        EndReason::Failed(msg) => print_error(&format!("CRITICAL ERROR: {}", msg)),
        EndReason::DeviceFailure(msg) => print_warning(&format!("Capture device failed: {}", msg)),
        EndReason::UserExit | EndReason::EndOfStream => {}
    }
    if report.total_scans > 0 {
        print_success(&format!(
            "Scans saved to {}",
            config.storage.log_path.display()
        ));
    }

    Ok(())
}

/// Play one named scenario with the live HUD
pub fn simulate_scenario(name: &str, json_report: Option<&Path>) -> Result<()> {
    let scenario = ScenarioLibrary::find(name).ok_or_else(|| {
        anyhow!(
            "Unknown scenario '{}'. Run 'barcode-scanner scenarios' to list them.",
            name
        )
    })?;

    print_header(&format!("SIMULATION: {}", scenario.name));
    print_info(&scenario.description);
    println!();

    let result = run_blocking(&scenario, Box::new(TerminalDisplay::new()));

    if let Some(path) = json_report {
        let summary = testdb::TestSummary {
            total: 1,
            passed: usize::from(result.passed),
            failed: usize::from(!result.passed),
            total_duration: result.duration,
            results: vec![result.clone()],
        };
        write_json_report(&summary, path)?;
        print_info(&format!("Report written to {}", path.display()));
    }

    println!();
    print_info(&format!(
        "{} frames, {} scans of {} distinct items",
        result.frames_processed,
        result.scans,
        result.history.len()
    ));
    print_tally(&result.history);

    if result.passed {
        print_success(&format!("{} behaved as expected", result.name));
        Ok(())
    } else {
        let reason = result.failure_reason.unwrap_or_default();
        print_error(&format!("{}: {}", result.name, reason));
        bail!("Scenario '{}' did not behave as expected", result.name)
    }
}

/// Run every scenario, or only the quick ones, and print a summary
pub fn simulate_suite(quick_only: bool, json_report: Option<&Path>) -> Result<()> {
    print_header(if quick_only { "QUICK SCENARIO RUN" } else { "SCENARIO RUN" });
    let mut runner = TestRunner::with_config(TestRunnerConfig {
        verbose: true,
        fail_fast: false,
    });
    let summary = if quick_only {
        runner.run_quick()
    } else {
        runner.run_all()
    };

    println!();
    print_info(&format!(
        "{}/{} passed ({:.0}%) in {:.2}s",
        summary.passed,
        summary.total,
        summary.pass_rate(),
        summary.total_duration.as_secs_f64()
    ));

    if let Some(path) = json_report {
        write_json_report(&summary, path)?;
        print_info(&format!("Report written to {}", path.display()));
    }

    if summary.failed > 0 {
        bail!(
            "{} scenario(s) failed: {}",
            summary.failed,
            summary.failed_scenarios().join(", ")
        );
    }
    Ok(())
}

/// List scenarios, optionally filtered by tag
pub fn list_scenarios(tag: Option<&str>) {
    match tag {
        None => testdb::print_available_scenarios(),
        Some(tag) => {
            let scenarios = ScenarioLibrary::scenarios_by_tag(tag);
            if scenarios.is_empty() {
                print_warning(&format!("No scenarios tagged '{}'", tag));
            }
            for scenario in scenarios {
                println!("  • {:<26} {}", scenario.name, scenario.description);
            }
        }
    }
}

/// Show the newest entries of the scan log
pub fn show_history(log_path: &Path, limit: usize) -> Result<()> {
    let log = ScanLog::new(log_path);
    let rows = log
        .recent(limit)
        .with_context(|| format!("Failed to read scan log {}", log_path.display()))?;

    print_header("SCAN HISTORY");
    if rows.is_empty() {
        print_info(&format!("No scans recorded in {}", log_path.display()));
        return Ok(());
    }

    for row in &rows {
        println!("  {:>5}  {}  {}", row.id, row.timestamp, row.entry);
    }
    println!();
    print_info(&format!(
        "Showing {} of {} scans from {}",
        rows.len(),
        log.count()?,
        log_path.display()
    ));
    Ok(())
}

/// Print the effective product catalog
pub fn show_catalog(config: &Config) {
    let catalog = Catalog::from_config(&config.catalog);
    print_header("PRODUCT CATALOG");
    for (payload, label) in catalog.entries() {
        println!("  {:<16} {}", payload, label);
    }
    println!();
    print_info(&format!("{} products", catalog.len()));
    print_info(&format!("Unknown codes: \"{}\"", catalog.unassigned_label()));
}

pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let path = init_config(true)?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Save the file after editing to apply changes.");
            info!("Run 'barcode-scanner show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            std::fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config(false)?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the scanner settings.");
    info!("");
    info!("Quick tip: Run 'barcode-scanner config' to open the config in your editor.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[capture]");
    info!("  frames_dir = \"{}\"", config.capture.frames_dir.display());
    info!("  frame_interval_ms = {}", config.capture.frame_interval_ms);
    info!("  loop_playback = {}", config.capture.loop_playback);
    info!("");
    info!("[scanning]");
    info!("  stability_seconds = {}", config.scanning.stability_seconds);
    info!("  cooldown_seconds = {}", config.scanning.cooldown_seconds);
    info!("  history_window = {}", config.scanning.history_window);
    info!("  loop_idle_ms = {}", config.scanning.loop_idle_ms);
    info!("");
    info!("[catalog]");
    info!("  unassigned_label = \"{}\"", config.catalog.unassigned_label);
    info!("  products = {} extra", config.catalog.products.len());
    info!("");
    info!("[storage]");
    info!("  log_path = \"{}\"", config.storage.log_path.display());
    info!("");
    info!("[feedback]");
    info!("  beep = {}", config.feedback.beep);
    info!(
        "  snapshot_path = {:?}",
        config
            .feedback
            .snapshot_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scan_log::PersistenceSink;
    use chrono::Local;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_file_at_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scanner.toml");
        generate_config_file(Some(path.clone())).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scanning.stability_seconds, 1.0);
    }

    #[test]
    fn test_show_history_reads_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan_logs.db");
        show_history(&path, 5).unwrap();

        let mut log = ScanLog::new(&path);
        log.append(&Local::now(), "Widget", "A").unwrap();
        show_history(&path, 5).unwrap();
    }

    #[test]
    fn test_run_scanner_reports_bad_timing() {
        let mut config = Config::default();
        config.scanning.cooldown_seconds = 1e20;
        let err = run_scanner(&config, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(err.to_string().contains("Invalid scanning settings"));
    }

    #[test]
    fn test_simulate_quick_suite_writes_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quick.json");
        simulate_suite(true, Some(&path)).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["total"], ScenarioLibrary::quick_scenarios().len());
    }

    #[test]
    fn test_simulate_unknown_scenario_fails() {
        let err = simulate_scenario("no_such_scenario", None).unwrap_err();
        assert!(err.to_string().contains("Unknown scenario"));
    }

    #[test]
    fn test_simulate_writes_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        simulate_scenario("stable_single_code", Some(&path)).unwrap();
        assert!(path.exists());
    }
}
