//! Scripted capture device for testing without a camera
//!
//! A script is a list of frames, each stamped with the session time at which
//! it is delivered and the symbols a detector should report for it. The frame
//! source replays the script (moving a [`ManualClock`] along with it) and the
//! matching [`ScriptedDetector`] reports the scripted symbols, so the whole
//! session loop can be driven deterministically.

use crate::core::error::{Result, ScanError};
use crate::core::notifier::Notifier;
use crate::core::scan_log::{PersistenceSink, TIMESTAMP_FORMAT};
use crate::core::scan_state::VerifiedScan;
use crate::core::session::ManualClock;
use crate::detect::{BarcodeDetector, Geometry, RawDetection, Rect, Symbology};
use crate::device::traits::{DeviceInfo, Frame, FrameSource};
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Size of the blank images handed out by the scripted source
const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

/// One scripted frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedFrame {
    /// Session time the frame is delivered at
    pub at: Duration,
    /// Symbols the detector reports for this frame
    pub symbols: Vec<RawDetection>,
    /// Makes the detector fail on this frame
    pub detector_error: Option<String>,
}

impl ScriptedFrame {
    pub fn at(at: Duration) -> Self {
        Self {
            at,
            symbols: Vec::new(),
            detector_error: None,
        }
    }

    pub fn at_millis(millis: u64) -> Self {
        Self::at(Duration::from_millis(millis))
    }

    /// Add a symbol carrying `payload` as UTF-8
    pub fn with_code(self, payload: &str) -> Self {
        self.with_raw(payload.as_bytes())
    }

    /// Add a symbol carrying arbitrary bytes
    pub fn with_raw(mut self, data: &[u8]) -> Self {
        let slot = self.symbols.len() as i32;
        let rect = Rect {
            left: 4 + slot * 20,
            top: 4,
            width: 16,
            height: 16,
        };
        self.symbols.push(RawDetection::new(
            data.to_vec(),
            Symbology::Ean13,
            Geometry::from_rect(rect),
        ));
        self
    }

    pub fn with_symbol(mut self, symbol: RawDetection) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn detector_error(mut self, message: &str) -> Self {
        self.detector_error = Some(message.to_string());
        self
    }
}

/// Frames at `from_ms..=to_ms` every `step_ms`, each showing the same codes
pub fn hold_codes(codes: &[&str], from_ms: u64, to_ms: u64, step_ms: u64) -> Vec<ScriptedFrame> {
    let step = step_ms.max(1) as usize;
    (from_ms..=to_ms)
        .step_by(step)
        .map(|t| {
            codes
                .iter()
                .fold(ScriptedFrame::at_millis(t), |frame, code| frame.with_code(code))
        })
        .collect()
}

/// Replays a frame script as a capture device
///
/// Clones share the open/release bookkeeping, so a test can keep a clone as
/// an observer after handing the source to a session.
#[derive(Debug, Clone)]
pub struct ScriptedFrameSource {
    script: Arc<Vec<ScriptedFrame>>,
    cursor: usize,
    open: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
    fail_on_open: bool,
    fail_after: Option<usize>,
    clock: Option<ManualClock>,
}

impl ScriptedFrameSource {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self {
            script: Arc::new(frames),
            cursor: 0,
            open: Arc::new(AtomicBool::new(false)),
            releases: Arc::new(AtomicUsize::new(0)),
            fail_on_open: false,
            fail_after: None,
            clock: None,
        }
    }

    /// Refuse to open, like a camera that is missing or busy
    pub fn fail_on_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    /// Deliver `frames` frames, then fail every read
    pub fn fail_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Set `clock` to each frame's time as it is read
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Detector that reports this script's symbols
    pub fn detector(&self) -> ScriptedDetector {
        ScriptedDetector::new(Arc::clone(&self.script))
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn frames_remaining(&self) -> usize {
        self.script.len().saturating_sub(self.cursor)
    }
}

impl FrameSource for ScriptedFrameSource {
    fn open(&mut self) -> Result<DeviceInfo> {
        if self.fail_on_open {
            return Err(ScanError::Device(
                "scripted device refused to open".to_string(),
            ));
        }
        self.cursor = 0;
        self.open.store(true, Ordering::SeqCst);
        Ok(DeviceInfo::new("scripted", "Scripted camera").with_frame_count(self.script.len()))
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.is_open() {
            return Err(ScanError::Device("scripted device is not open".to_string()));
        }
        if let Some(limit) = self.fail_after {
            if self.cursor >= limit {
                return Err(ScanError::Device(format!(
                    "scripted read failure after {} frames",
                    limit
                )));
            }
        }
        let Some(scripted) = self.script.get(self.cursor) else {
            return Ok(None);
        };

        if let Some(clock) = &self.clock {
            clock.set(scripted.at);
        }
        let frame = Frame::blank(self.cursor as u64, FRAME_WIDTH, FRAME_HEIGHT);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Reports the symbols scripted for each frame index
pub struct ScriptedDetector {
    script: Arc<Vec<ScriptedFrame>>,
    dropout: Option<Dropout>,
}

/// Randomly loses whole frames of detections
struct Dropout {
    percent: u8,
    rng: StdRng,
}

impl ScriptedDetector {
    pub fn new(script: Arc<Vec<ScriptedFrame>>) -> Self {
        Self {
            script,
            dropout: None,
        }
    }

    /// Drop every symbol on roughly `percent`% of frames, reproducibly
    pub fn with_dropout(mut self, percent: u8, seed: u64) -> Self {
        self.dropout = Some(Dropout {
            percent: percent.min(100),
            rng: StdRng::seed_from_u64(seed),
        });
        self
    }
}

impl BarcodeDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let Some(scripted) = self.script.get(frame.index as usize) else {
            return Ok(Vec::new());
        };
        if let Some(message) = &scripted.detector_error {
            return Err(ScanError::Detection(message.clone()));
        }
        if let Some(dropout) = self.dropout.as_mut() {
            if dropout.rng.gen_range(0..100u8) < dropout.percent {
                return Ok(Vec::new());
            }
        }
        Ok(scripted.symbols.clone())
    }
}

/// Row kept by [`MemorySink`]: formatted timestamp, label, payload
pub type MemoryRow = (String, String, String);

/// In-memory persistence sink
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<MemoryRow>>>,
    failing: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every append
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Shared handle on the stored rows
    pub fn rows(&self) -> Arc<Mutex<Vec<MemoryRow>>> {
        Arc::clone(&self.rows)
    }
}

impl PersistenceSink for MemorySink {
    fn append(&mut self, timestamp: &DateTime<Local>, label: &str, payload: &str) -> Result<()> {
        if self.failing {
            return Err(ScanError::Persistence("memory sink is read-only".to_string()));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| ScanError::Persistence("memory sink poisoned".to_string()))?;
        rows.push((
            timestamp.format(TIMESTAMP_FORMAT).to_string(),
            label.to_string(),
            payload.to_string(),
        ));
        Ok(())
    }
}

/// Notifier whose every call fails
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&mut self, _scan: &VerifiedScan) -> Result<()> {
        Err(ScanError::Notification("no audio device".to_string()))
    }
}
