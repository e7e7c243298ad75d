//! Scenario runner
//!
//! Runs scenarios through the real session loop (capture wrapper, state
//! machine, renderer) with a scripted camera and a manual clock, then checks
//! the outcome against the scenario's expectations.

use super::mock_device::{MemorySink, ScriptedFrameSource};
use super::scenarios::{ExpectedEnd, ExpectedEvent, ExpectedResults, ScenarioLibrary, TestScenario};
use crate::core::catalog::Catalog;
use crate::core::error::{Result, ScanError};
use crate::core::scan_state::HistoryEntry;
use crate::core::session::{EndReason, ManualClock, Session, SessionOptions, SessionReport};
use crate::ui::{FrameDisplay, NullDisplay};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub frames_processed: u64,
    pub scans: u32,
    /// Final tally in first-verification order
    pub history: Vec<HistoryEntry>,
    pub failure_reason: Option<String>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl ScenarioResult {
    pub fn passed(name: &str, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            duration,
            frames_processed: 0,
            scans: 0,
            history: Vec::new(),
            failure_reason: None,
        }
    }

    pub fn failed(name: &str, duration: Duration, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            duration,
            frames_processed: 0,
            scans: 0,
            history: Vec::new(),
            failure_reason: Some(reason.to_string()),
        }
    }

    fn with_report(mut self, report: &SessionReport) -> Self {
        self.frames_processed = report.frames_processed;
        self.scans = report.total_scans;
        self.history = report.history.clone();
        self
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub total_duration: Duration,
    pub results: Vec<ScenarioResult>,
}

impl TestSummary {
    /// Pass rate as a percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn failed_scenarios(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestRunnerConfig {
    /// Print each result as it completes
    pub verbose: bool,
    /// Stop on the first failure
    pub fail_fast: bool,
}

pub struct TestRunner {
    config: TestRunnerConfig,
    results: Vec<ScenarioResult>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::with_config(TestRunnerConfig::default())
    }

    pub fn with_config(config: TestRunnerConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    pub fn run_all(&mut self) -> TestSummary {
        self.run_scenarios(ScenarioLibrary::all_scenarios())
    }

    pub fn run_quick(&mut self) -> TestSummary {
        self.run_scenarios(ScenarioLibrary::quick_scenarios())
    }

    /// Run scenarios one after another
    ///
    /// Must not be called from inside a tokio runtime; each scenario gets
    /// its own.
    pub fn run_scenarios(&mut self, scenarios: Vec<TestScenario>) -> TestSummary {
        let start = Instant::now();
        self.results.clear();

        if self.config.verbose {
            println!("\n  Running {} scenario(s)\n", scenarios.len());
        }

        for scenario in scenarios {
            let result = run_blocking(&scenario, Box::new(NullDisplay));
            if self.config.verbose {
                print_result(&result);
            }
            let stop = self.config.fail_fast && !result.passed;
            self.results.push(result);
            if stop {
                break;
            }
        }

        let passed = self.results.iter().filter(|r| r.passed).count();
        TestSummary {
            total: self.results.len(),
            passed,
            failed: self.results.len() - passed,
            total_duration: start.elapsed(),
            results: self.results.clone(),
        }
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one scenario on a fresh runtime, presenting frames on `display`
pub fn run_blocking(scenario: &TestScenario, display: Box<dyn FrameDisplay>) -> ScenarioResult {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return ScenarioResult::failed(
                &scenario.name,
                Duration::ZERO,
                &format!("failed to start runtime: {}", e),
            )
        }
    };
    runtime.block_on(run_scenario(scenario, display))
}

/// Run one scenario through a real session and check it
pub async fn run_scenario(scenario: &TestScenario, display: Box<dyn FrameDisplay>) -> ScenarioResult {
    let start = Instant::now();
    let outcome = execute(scenario, display).await;
    let duration = start.elapsed();

    match outcome {
        Ok(report) => match check(&scenario.expected, &report) {
            Ok(()) => ScenarioResult::passed(&scenario.name, duration).with_report(&report),
            Err(reason) => {
                ScenarioResult::failed(&scenario.name, duration, &reason).with_report(&report)
            }
        },
        Err(ScanError::Device(msg)) if scenario.expected.end == ExpectedEnd::OpenFailure => {
            log::debug!("{}: device refused to open as expected ({})", scenario.name, msg);
            ScenarioResult::passed(&scenario.name, duration)
        }
        Err(e) => ScenarioResult::failed(&scenario.name, duration, &e.to_string()),
    }
}

async fn execute(scenario: &TestScenario, display: Box<dyn FrameDisplay>) -> Result<SessionReport> {
    let clock = ManualClock::new();
    let mut source = ScriptedFrameSource::new(scenario.frames.clone()).with_clock(clock.clone());
    if scenario.device.fail_on_open {
        source = source.fail_on_open();
    }
    if let Some(limit) = scenario.device.fail_after {
        source = source.fail_after(limit);
    }
    let mut detector = source.detector();
    if let Some(dropout) = scenario.dropout {
        detector = detector.with_dropout(dropout.percent, dropout.seed);
    }

    let mut catalog = Catalog::builtin();
    for (payload, label) in &scenario.products {
        catalog.insert(payload, label);
    }

    let sink = if scenario.sink_fails {
        MemorySink::new().failing()
    } else {
        MemorySink::new()
    };

    Session::new(source, Box::new(sink), SessionOptions::default())
        .with_detector(Box::new(detector))
        .with_catalog(Box::new(catalog))
        .with_display(display)
        .with_clock(Box::new(clock))
        .run()
        .await
}

/// Compare a session report with what the scenario expects
fn check(expected: &ExpectedResults, report: &SessionReport) -> std::result::Result<(), String> {
    if expected.end == ExpectedEnd::OpenFailure {
        return Err("device opened but was expected to fail".to_string());
    }

    let actual: Vec<ExpectedEvent> = report
        .verified
        .iter()
        .map(|scan| ExpectedEvent {
            payload: scan.payload.clone(),
            label: scan.label.clone(),
            at_ms: scan.verified_at.as_millis() as u64,
            count: scan.count,
        })
        .collect();
    if actual != expected.events {
        return Err(format!(
            "expected events {:?}, got {:?}",
            expected.events, actual
        ));
    }

    let history: Vec<(String, u32)> = report
        .history
        .iter()
        .map(|h| (h.payload.clone(), h.count))
        .collect();
    if history != expected.history {
        return Err(format!(
            "expected history {:?}, got {:?}",
            expected.history, history
        ));
    }

    let end_matches = match (&report.end_reason, expected.end) {
        (EndReason::EndOfStream, ExpectedEnd::EndOfStream) => true,
        (EndReason::DeviceFailure(_), ExpectedEnd::DeviceFailure) => true,
        _ => false,
    };
    if !end_matches {
        return Err(format!(
            "expected {:?} end, session ended with {}",
            expected.end, report.end_reason
        ));
    }

    if report.persistence_failures != expected.persistence_failures {
        return Err(format!(
            "expected {} log failures, got {}",
            expected.persistence_failures, report.persistence_failures
        ));
    }

    Ok(())
}

fn print_result(result: &ScenarioResult) {
    if result.passed {
        println!(
            "  ✓ {} ({} frames, {} scans, {:.1}ms)",
            result.name,
            result.frames_processed,
            result.scans,
            result.duration.as_secs_f64() * 1000.0
        );
    } else {
        println!(
            "  ✗ {} - {}",
            result.name,
            result.failure_reason.as_deref().unwrap_or("unknown failure")
        );
    }
}

/// Write a summary as pretty JSON
pub fn write_json_report(summary: &TestSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| ScanError::Io(format!("Failed to serialize report: {}", e)))?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_every_scenario_passes() {
        let mut runner = TestRunner::new();
        let summary = runner.run_all();
        assert_eq!(
            summary.failed,
            0,
            "failed: {:?}",
            summary
                .results
                .iter()
                .filter(|r| !r.passed)
                .map(|r| (&r.name, &r.failure_reason))
                .collect::<Vec<_>>()
        );
        assert_eq!(summary.total, ScenarioLibrary::all_scenarios().len());
        assert!((summary.pass_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wrong_expectation_fails() {
        let mut scenario = ScenarioLibrary::stable_single_code();
        scenario.expected.events[0].at_ms = 1200;

        let result = run_blocking(&scenario, Box::new(NullDisplay));
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("expected events"));
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let mut runner = TestRunner::with_config(TestRunnerConfig {
            verbose: false,
            fail_fast: true,
        });
        let mut broken = ScenarioLibrary::short_glimpse();
        broken.expected.events.push(ExpectedEvent::new("A", "Widget", 500, 1));
        let scenarios = vec![
            ScenarioLibrary::interrupted_stability(),
            broken,
            ScenarioLibrary::stable_single_code(),
        ];

        let summary = runner.run_scenarios(scenarios);
        assert_eq!(summary.total, 2);
        assert_eq!(runner.results().len(), 2);
        assert_eq!(summary.failed_scenarios(), vec!["short_glimpse"]);
    }

    #[test]
    fn test_json_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        let summary = TestRunner::new().run_quick();

        write_json_report(&summary, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], summary.total);
        assert!(value["results"].as_array().unwrap().len() > 0);
    }

    #[test]
    fn test_blind_detector_never_verifies() {
        let scenario = ScenarioLibrary::blind_detector();
        let result = run_blocking(&scenario, Box::new(NullDisplay));
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.scans, 0);
        assert_eq!(result.frames_processed, scenario.frames.len() as u64);

        let mut sighted = scenario.clone();
        sighted.dropout = None;
        assert!(!run_blocking(&sighted, Box::new(NullDisplay)).passed);
    }

    #[test]
    fn test_summary_pass_rate() {
        let summary = TestSummary {
            total: 10,
            passed: 8,
            failed: 2,
            ..Default::default()
        };
        assert!((summary.pass_rate() - 80.0).abs() < 0.001);
    }
}
