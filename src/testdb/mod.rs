//! Test Database Module
//!
//! Scripted cameras, detectors and sinks for exercising the scanner without
//! hardware, plus a library of named scenarios and a runner that plays them
//! through the real session loop.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use barcode_scanner::testdb::{ScenarioLibrary, TestRunner};
//!
//! let mut runner = TestRunner::new();
//! let summary = runner.run_all();
//! println!("Passed: {}/{}", summary.passed, summary.total);
//!
//! barcode_scanner::testdb::print_available_scenarios();
//! ```

pub mod mock_device;
pub mod runner;
pub mod scenarios;

pub use mock_device::{
    hold_codes, FailingNotifier, MemoryRow, MemorySink, ScriptedDetector, ScriptedFrame,
    ScriptedFrameSource,
};
pub use runner::{
    run_blocking, run_scenario, write_json_report, ScenarioResult, TestRunner, TestRunnerConfig,
    TestSummary,
};
pub use scenarios::{
    DetectorDropout, DeviceBehavior, ExpectedEnd, ExpectedEvent, ExpectedResults, ScenarioLibrary, TestScenario,
};

/// Print every scenario with its description and tags
pub fn print_available_scenarios() {
    println!("\n  Available scenarios:\n");
    for scenario in ScenarioLibrary::all_scenarios() {
        println!("  • {:<26} {}", scenario.name, scenario.description);
        if !scenario.tags.is_empty() {
            println!("    {:<26} tags: {}", "", scenario.tags.join(", "));
        }
    }
    println!();
}
