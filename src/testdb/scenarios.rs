//! Predefined scan scenarios
//!
//! Each scenario is a frame script plus the scans the session must produce
//! from it. They cover the verification timing rules, payload decoding and
//! the failure paths of the frame loop.

use super::mock_device::{hold_codes, ScriptedFrame};

/// A complete scenario: script, device behaviour and expected outcome
#[derive(Debug, Clone)]
pub struct TestScenario {
    /// Scenario name for identification
    pub name: String,
    /// Description of what this scenario tests
    pub description: String,
    /// Frames delivered by the scripted camera
    pub frames: Vec<ScriptedFrame>,
    /// Catalog entries added on top of the built-in table
    pub products: Vec<(String, String)>,
    /// How the scripted camera misbehaves
    pub device: DeviceBehavior,
    /// Make every log append fail
    pub sink_fails: bool,
    /// Frames on which the detector reports nothing
    pub dropout: Option<DetectorDropout>,
    pub expected: ExpectedResults,
    /// Tags for filtering scenarios
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceBehavior {
    pub fail_on_open: bool,
    pub fail_after: Option<usize>,
}

/// Seeded whole-frame misses of the scripted detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorDropout {
    pub percent: u8,
    pub seed: u64,
}

/// One scan the session must verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedEvent {
    pub payload: String,
    pub label: String,
    pub at_ms: u64,
    pub count: u32,
}

impl ExpectedEvent {
    pub fn new(payload: &str, label: &str, at_ms: u64, count: u32) -> Self {
        Self {
            payload: payload.to_string(),
            label: label.to_string(),
            at_ms,
            count,
        }
    }
}

/// How the session is expected to end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedEnd {
    #[default]
    EndOfStream,
    DeviceFailure,
    OpenFailure,
}

/// Expected results from running a scenario
#[derive(Debug, Clone, Default)]
pub struct ExpectedResults {
    /// Every verified scan, in order
    pub events: Vec<ExpectedEvent>,
    /// Final history as (payload, count), in first-verification order
    pub history: Vec<(String, u32)>,
    pub end: ExpectedEnd,
    pub persistence_failures: u32,
}

impl TestScenario {
    pub fn new(name: &str, description: &str, frames: Vec<ScriptedFrame>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            frames,
            products: vec![
                ("A".to_string(), "Widget".to_string()),
                ("B".to_string(), "Gadget".to_string()),
            ],
            device: DeviceBehavior::default(),
            sink_fails: false,
            dropout: None,
            expected: ExpectedResults::default(),
            tags: Vec::new(),
        }
    }

    pub fn with_expected(mut self, expected: ExpectedResults) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_device(mut self, device: DeviceBehavior) -> Self {
        self.device = device;
        self
    }

    pub fn with_failing_sink(mut self) -> Self {
        self.sink_fails = true;
        self
    }

    pub fn with_dropout(mut self, percent: u8, seed: u64) -> Self {
        self.dropout = Some(DetectorDropout { percent, seed });
        self
    }

    /// Add tags to the scenario
    pub fn with_tags(mut self, tags: Vec<&str>) -> Self {
        self.tags = tags.into_iter().map(String::from).collect();
        self
    }

    /// Session time of the last scripted frame
    pub fn duration_ms(&self) -> u64 {
        self.frames
            .last()
            .map(|f| f.at.as_millis() as u64)
            .unwrap_or(0)
    }
}

fn history(entries: &[(&str, u32)]) -> Vec<(String, u32)> {
    entries
        .iter()
        .map(|(payload, count)| (payload.to_string(), *count))
        .collect()
}

/// Collection of all predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    // =========================================================================
    // VERIFICATION TIMING
    // =========================================================================

    /// Scenario: a code held steady for exactly the stability window
    pub fn stable_single_code() -> TestScenario {
        TestScenario::new(
            "stable_single_code",
            "Code visible at 0.0..1.0s every 0.2s is verified once at 1.0s",
            hold_codes(&["A"], 0, 1000, 200),
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new("A", "Widget", 1000, 1)],
            history: history(&[("A", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["timing", "quick"])
    }

    /// Scenario: a code leaves the frame before the window completes
    pub fn short_glimpse() -> TestScenario {
        TestScenario::new(
            "short_glimpse",
            "Code visible for 0.9s is never verified",
            hold_codes(&["A"], 0, 900, 100),
        )
        .with_tags(vec!["timing", "quick"])
    }

    /// Scenario: cooldown suppresses re-verification, then a fresh window starts
    pub fn cooldown_then_rescan() -> TestScenario {
        TestScenario::new(
            "cooldown_then_rescan",
            "Held code verifies at 1.0s, is ignored until 3.0s, verifies again at 4.0s",
            hold_codes(&["A"], 0, 4000, 100),
        )
        .with_expected(ExpectedResults {
            events: vec![
                ExpectedEvent::new("A", "Widget", 1000, 1),
                ExpectedEvent::new("A", "Widget", 4000, 2),
            ],
            history: history(&[("A", 2)]),
            ..Default::default()
        })
        .with_tags(vec!["timing", "cooldown"])
    }

    /// Scenario: a single missing frame restarts the stability timer
    pub fn interrupted_stability() -> TestScenario {
        let mut frames = vec![
            ScriptedFrame::at_millis(0).with_code("B"),
            ScriptedFrame::at_millis(200),
        ];
        frames.extend(hold_codes(&["B"], 300, 1300, 100));

        TestScenario::new(
            "interrupted_stability",
            "Code lost at 0.2s and back from 0.3s verifies at 1.3s, not 1.0s",
            frames,
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new("B", "Gadget", 1300, 1)],
            history: history(&[("B", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["timing", "quick"])
    }

    /// Scenario: a code visible only on every other frame
    pub fn flickering_code() -> TestScenario {
        let frames = (0..=30u64)
            .map(|i| {
                let frame = ScriptedFrame::at_millis(i * 100);
                if i % 2 == 0 {
                    frame.with_code("A")
                } else {
                    frame
                }
            })
            .collect();

        TestScenario::new(
            "flickering_code",
            "Code that drops out every other frame never becomes stable",
            frames,
        )
        .with_tags(vec!["timing"])
    }

    /// Scenario: the decoder reports the same code twice in one frame
    pub fn duplicate_reads_in_frame() -> TestScenario {
        TestScenario::new(
            "duplicate_reads_in_frame",
            "Overlapping reads of one code count as a single detection",
            hold_codes(&["A", "A"], 0, 1000, 100),
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new("A", "Widget", 1000, 1)],
            history: history(&[("A", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["timing", "quick"])
    }

    /// Scenario: two codes with interleaved verifications
    pub fn history_order() -> TestScenario {
        let frames = (0..=40u64)
            .map(|i| {
                let t = i * 100;
                let frame = ScriptedFrame::at_millis(t).with_code("A");
                if (500..=1500).contains(&t) {
                    frame.with_code("B")
                } else {
                    frame
                }
            })
            .collect();

        TestScenario::new(
            "history_order",
            "History keeps first-verification order when an item is re-verified",
            frames,
        )
        .with_expected(ExpectedResults {
            events: vec![
                ExpectedEvent::new("A", "Widget", 1000, 1),
                ExpectedEvent::new("B", "Gadget", 1500, 1),
                ExpectedEvent::new("A", "Widget", 4000, 2),
            ],
            history: history(&[("A", 2), ("B", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["history"])
    }

    // =========================================================================
    // PAYLOADS AND CATALOG
    // =========================================================================

    /// Scenario: a real product from the built-in catalog
    pub fn catalog_product() -> TestScenario {
        TestScenario::new(
            "catalog_product",
            "Built-in catalog label is attached to a known EAN-13",
            hold_codes(&["7501055301323"], 0, 1000, 100),
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new(
                "7501055301323",
                "Coca Cola 600ml",
                1000,
                1,
            )],
            history: history(&[("7501055301323", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["catalog", "quick"])
    }

    /// Scenario: a code missing from the catalog
    pub fn unknown_product() -> TestScenario {
        TestScenario::new(
            "unknown_product",
            "Unknown codes are verified under the unassigned label",
            hold_codes(&["0000000000000"], 0, 1000, 100),
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new(
                "0000000000000",
                "Producto no asignado",
                1000,
                1,
            )],
            history: history(&[("0000000000000", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["catalog", "quick"])
    }

    /// Scenario: a symbol whose bytes are not valid UTF-8
    pub fn latin1_payload() -> TestScenario {
        let frames = (0..=10u64)
            .map(|i| ScriptedFrame::at_millis(i * 100).with_raw(b"\xd1and\xfa"))
            .collect();

        TestScenario::new(
            "latin1_payload",
            "Non-UTF-8 payload is decoded as ISO-8859-1",
            frames,
        )
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new(
                "\u{d1}and\u{fa}",
                "Producto no asignado",
                1000,
                1,
            )],
            history: history(&[("\u{d1}and\u{fa}", 1)]),
            ..Default::default()
        })
        .with_tags(vec!["payload"])
    }

    /// Scenario: the code is in view but the detector misses every read
    pub fn blind_detector() -> TestScenario {
        TestScenario::new(
            "blind_detector",
            "A code the detector never reads is never verified",
            hold_codes(&["A"], 0, 3000, 100),
        )
        .with_dropout(100, 7)
        .with_tags(vec!["detection", "quick"])
    }

    // =========================================================================
    // ERROR CONDITIONS
    // =========================================================================

    /// Scenario: the camera cannot be opened
    pub fn device_unavailable() -> TestScenario {
        TestScenario::new(
            "device_unavailable",
            "Session terminates at startup when the camera cannot be opened",
            hold_codes(&["A"], 0, 1000, 100),
        )
        .with_device(DeviceBehavior {
            fail_on_open: true,
            fail_after: None,
        })
        .with_expected(ExpectedResults {
            end: ExpectedEnd::OpenFailure,
            ..Default::default()
        })
        .with_tags(vec!["error", "device"])
    }

    /// Scenario: the camera dies mid-session
    pub fn device_disconnect() -> TestScenario {
        TestScenario::new(
            "device_disconnect",
            "Read failure after a verified scan shuts the session down cleanly",
            hold_codes(&["A"], 0, 3000, 100),
        )
        .with_device(DeviceBehavior {
            fail_on_open: false,
            fail_after: Some(15),
        })
        .with_expected(ExpectedResults {
            events: vec![ExpectedEvent::new("A", "Widget", 1000, 1)],
            history: history(&[("A", 1)]),
            end: ExpectedEnd::DeviceFailure,
            ..Default::default()
        })
        .with_tags(vec!["error", "device"])
    }

    /// Scenario: the scan log rejects every write
    pub fn log_unwritable() -> TestScenario {
        TestScenario::new(
            "log_unwritable",
            "Scans are still counted when the log cannot be written",
            hold_codes(&["A"], 0, 4000, 100),
        )
        .with_failing_sink()
        .with_expected(ExpectedResults {
            events: vec![
                ExpectedEvent::new("A", "Widget", 1000, 1),
                ExpectedEvent::new("A", "Widget", 4000, 2),
            ],
            history: history(&[("A", 2)]),
            persistence_failures: 2,
            ..Default::default()
        })
        .with_tags(vec!["error", "storage"])
    }

    // =========================================================================
    // COLLECTIONS
    // =========================================================================

    /// Get all predefined scenarios
    pub fn all_scenarios() -> Vec<TestScenario> {
        vec![
            Self::stable_single_code(),
            Self::short_glimpse(),
            Self::cooldown_then_rescan(),
            Self::interrupted_stability(),
            Self::flickering_code(),
            Self::duplicate_reads_in_frame(),
            Self::history_order(),
            Self::catalog_product(),
            Self::unknown_product(),
            Self::latin1_payload(),
            Self::blind_detector(),
            Self::device_unavailable(),
            Self::device_disconnect(),
            Self::log_unwritable(),
        ]
    }

    /// Get scenarios by tag
    pub fn scenarios_by_tag(tag: &str) -> Vec<TestScenario> {
        Self::all_scenarios()
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn quick_scenarios() -> Vec<TestScenario> {
        Self::scenarios_by_tag("quick")
    }

    pub fn find(name: &str) -> Option<TestScenario> {
        Self::all_scenarios().into_iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scenario_names_unique() {
        let scenarios = ScenarioLibrary::all_scenarios();
        let names: HashSet<_> = scenarios.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_scripts_are_time_ordered() {
        for scenario in ScenarioLibrary::all_scenarios() {
            let ordered = scenario.frames.windows(2).all(|w| w[0].at <= w[1].at);
            assert!(ordered, "{} frames out of order", scenario.name);
        }
    }

    #[test]
    fn test_find_and_tags() {
        assert!(ScenarioLibrary::find("cooldown_then_rescan").is_some());
        assert!(ScenarioLibrary::find("nope").is_none());
        assert!(!ScenarioLibrary::quick_scenarios().is_empty());
        assert_eq!(ScenarioLibrary::stable_single_code().duration_ms(), 1000);
    }

    #[test]
    fn test_blind_detector_drops_every_frame() {
        let scenario = ScenarioLibrary::blind_detector();
        assert_eq!(
            scenario.dropout,
            Some(DetectorDropout {
                percent: 100,
                seed: 7
            })
        );
        assert!(scenario.expected.events.is_empty());
        assert!(scenario.frames.iter().all(|f| !f.symbols.is_empty()));
    }
}
