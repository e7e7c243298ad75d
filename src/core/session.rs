//! Scanner session
//!
//! Owns every resource of one scanning run and drives the frame loop:
//!
//! ```text
//! INIT ──device opened──▶ RUNNING ──exit / end of stream / failure──▶ SHUTTING_DOWN ──▶ TERMINATED
//!   └──────────────device failed to open────────────────────────────────▶ TERMINATED
//! ```
//!
//! Each iteration reads a frame, detects and enriches symbols, advances the
//! scan state machine, forwards verified scans to the log and the notifier,
//! renders feedback and checks for an exit request. The capture device and
//! the display are released on every exit path.

use crate::core::catalog::{Catalog, CatalogLookup};
use crate::core::config::{Config, ConfigError};
use crate::core::error::Result;
use crate::core::notifier::{Notifier, SilentNotifier};
use crate::core::scan_log::PersistenceSink;
use crate::core::scan_state::{HistoryEntry, ScanStateMachine, ScanTiming, VerifiedScan};
use crate::detect::{enrich, BarcodeDetector, QrDetector};
use crate::device::{AsyncCapture, DeviceInfo, Frame, FrameSource};
use crate::ui::{save_snapshot, AnnotatedFrame, FrameDisplay, NullDisplay, OverlayRenderer};
use chrono::Local;
use log::{debug, error, info, warn};
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Time
// ============================================================================

/// Monotonic session time
pub trait Clock: Send + Sync {
    /// Time elapsed since the session clock started
    fn now(&self) -> Duration;
}

/// Wall-independent clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Clock moved by hand; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        let nanos = u64::try_from(now.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Exit requests
// ============================================================================

/// Polled once per loop iteration
pub trait ExitSignal: Send {
    fn exit_requested(&mut self) -> bool;
}

/// Never asks to exit; the session ends with the stream
#[derive(Debug, Default)]
pub struct NeverExit;

impl ExitSignal for NeverExit {
    fn exit_requested(&mut self) -> bool {
        false
    }
}

/// Exit once a shared flag is raised (Ctrl+C handler, tests)
#[derive(Debug, Clone)]
pub struct FlagExit {
    flag: Arc<AtomicBool>,
}

impl FlagExit {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}

impl ExitSignal for FlagExit {
    fn exit_requested(&mut self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Running,
    ShuttingDown,
    Terminated,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Init => "INIT",
            SessionPhase::Running => "RUNNING",
            SessionPhase::ShuttingDown => "SHUTTING_DOWN",
            SessionPhase::Terminated => "TERMINATED",
        };
        write!(f, "{}", name)
    }
}

/// Why the frame loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The operator asked to quit
    UserExit,
    /// The source had no more frames
    EndOfStream,
    /// The device failed mid-session
    DeviceFailure(String),
    /// Any other error escaped the loop
    Failed(String),
}

impl Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::UserExit => write!(f, "exit requested"),
            EndReason::EndOfStream => write!(f, "end of stream"),
            EndReason::DeviceFailure(msg) => write!(f, "device failure: {}", msg),
            EndReason::Failed(msg) => write!(f, "critical error: {}", msg),
        }
    }
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub device: Option<DeviceInfo>,
    pub frames_processed: u64,
    /// Every verified scan, in order
    pub verified: Vec<VerifiedScan>,
    /// Distinct items in first-verification order with final counts
    pub history: Vec<HistoryEntry>,
    pub total_scans: u32,
    pub persistence_failures: u32,
    pub notification_failures: u32,
    pub end_reason: EndReason,
    pub final_phase: SessionPhase,
    pub elapsed: Duration,
}

impl SessionReport {
    fn new() -> Self {
        Self {
            device: None,
            frames_processed: 0,
            verified: Vec::new(),
            history: Vec::new(),
            total_scans: 0,
            persistence_failures: 0,
            notification_failures: 0,
            end_reason: EndReason::EndOfStream,
            final_phase: SessionPhase::Init,
            elapsed: Duration::ZERO,
        }
    }
}

/// Tunables of the frame loop
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub timing: ScanTiming,
    pub history_window: usize,
    /// Pause between iterations; zero only yields to the runtime
    pub loop_idle: Duration,
    /// Where the last annotated frame is written at shutdown
    pub snapshot_path: Option<PathBuf>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            timing: ScanTiming::from_config(&config.scanning)?,
            history_window: config.scanning.history_window,
            loop_idle: Duration::from_millis(config.scanning.loop_idle_ms),
            snapshot_path: config.feedback.snapshot_path.clone(),
        })
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timing: ScanTiming::default(),
            history_window: 8,
            loop_idle: Duration::ZERO,
            snapshot_path: None,
        }
    }
}

/// One scanning run over a frame source
pub struct Session<S: FrameSource> {
    capture: AsyncCapture<S>,
    detector: Box<dyn BarcodeDetector>,
    catalog: Box<dyn CatalogLookup>,
    state: ScanStateMachine,
    sink: Box<dyn PersistenceSink>,
    notifier: Box<dyn Notifier>,
    renderer: OverlayRenderer,
    display: Box<dyn FrameDisplay>,
    exit: Box<dyn ExitSignal>,
    clock: Box<dyn Clock>,
    options: SessionOptions,
    phase: SessionPhase,
    last_frame: Option<AnnotatedFrame>,
    report: SessionReport,
}

impl<S: FrameSource> Session<S> {
    /// Session with a QR detector, the built-in catalog, no display and no
    /// notifier; swap parts with the `with_*` methods
    pub fn new(source: S, sink: Box<dyn PersistenceSink>, options: SessionOptions) -> Self {
        Self {
            capture: AsyncCapture::new(source),
            detector: Box::new(QrDetector::new()),
            catalog: Box::new(Catalog::builtin()),
            state: ScanStateMachine::new(options.timing),
            sink,
            notifier: Box::new(SilentNotifier),
            renderer: OverlayRenderer::new(options.history_window),
            display: Box::new(NullDisplay),
            exit: Box::new(NeverExit),
            clock: Box::new(SystemClock::new()),
            options,
            phase: SessionPhase::Init,
            last_frame: None,
            report: SessionReport::new(),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn BarcodeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_catalog(mut self, catalog: Box<dyn CatalogLookup>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_display(mut self, display: Box<dyn FrameDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn with_exit_signal(mut self, exit: Box<dyn ExitSignal>) -> Self {
        self.exit = exit;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn transition(&mut self, phase: SessionPhase) {
        debug!("Session phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run until exit, end of stream or failure
    ///
    /// A device that cannot be opened is returned as an error. Anything that
    /// goes wrong after that ends the loop and is reported in
    /// [`SessionReport::end_reason`].
    pub async fn run(mut self) -> Result<SessionReport> {
        match self.capture.start().await {
            Ok(info) => {
                info!("Capture device ready: {}", info);
                self.report.device = Some(info);
                self.transition(SessionPhase::Running);
            }
            Err(e) => {
                error!("Could not open capture device: {}", e);
                self.cleanup();
                self.transition(SessionPhase::Terminated);
                return Err(e);
            }
        }

        let end_reason = match self.run_frames().await {
            Ok(reason) => reason,
            Err(e) => {
                error!("CRITICAL ERROR: {}", e);
                EndReason::Failed(e.to_string())
            }
        };
        info!("Stopping scanner ({})", end_reason);

        self.transition(SessionPhase::ShuttingDown);
        self.cleanup();
        self.transition(SessionPhase::Terminated);

        let mut report = std::mem::replace(&mut self.report, SessionReport::new());
        report.end_reason = end_reason;
        report.history = self.state.history().to_vec();
        report.total_scans = self.state.total_scans();
        report.final_phase = self.phase;
        report.elapsed = self.clock.now();
        Ok(report)
    }

    async fn run_frames(&mut self) -> Result<EndReason> {
        loop {
            let frame = match self.capture.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    warn!("Failed to retrieve frame from capture device");
                    return Ok(EndReason::EndOfStream);
                }
                Err(e) if e.is_fatal() => return Ok(EndReason::DeviceFailure(e.to_string())),
                Err(e) => return Err(e),
            };

            self.process_frame(&frame)?;

            if self.exit.exit_requested() {
                return Ok(EndReason::UserExit);
            }

            if self.options.loop_idle.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.options.loop_idle).await;
            }
        }
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        let raw = self.detector.detect(frame)?;
        let detections = enrich(raw, self.catalog.as_ref());
        let now = self.clock.now();

        for scan in self.state.observe(&detections, now) {
            self.dispatch(scan);
        }

        let annotated = self.renderer.render(frame, &detections, &self.state, now);
        self.display.show(&annotated)?;
        self.last_frame = Some(annotated);
        self.report.frames_processed += 1;
        Ok(())
    }

    /// Forward a verified scan to the operator, the log and the notifier
    fn dispatch(&mut self, scan: VerifiedScan) {
        self.display.announce(&format!("{} verified.", scan.label));
        info!("Verified {} [{}] (x{})", scan.label, scan.payload, scan.count);

        if let Err(e) = self.sink.append(&Local::now(), &scan.label, &scan.payload) {
            warn!("Failed to record scan of {}: {}", scan.payload, e);
            self.report.persistence_failures += 1;
        }

        if let Err(e) = self.notifier.notify(&scan) {
            debug!("Scan confirmation failed: {}", e);
            self.report.notification_failures += 1;
        }

        self.report.verified.push(scan);
    }

    fn cleanup(&mut self) {
        self.capture.stop();
        let stats = self.capture.stats();
        info!(
            "Capture released after {} frames ({} read errors)",
            stats.frames_read, stats.read_errors
        );

        if let (Some(path), Some(frame)) = (&self.options.snapshot_path, &self.last_frame) {
            match save_snapshot(frame, path) {
                Ok(()) => info!("Saved last frame to {}", path.display()),
                Err(e) => warn!("{}", e),
            }
        }

        self.display.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ScanError;
    use crate::testdb::{FailingNotifier, MemorySink, ScriptedFrame, ScriptedFrameSource};
    use crate::ui::RecordingDisplay;
    use std::sync::Mutex;

    /// Display handle the test can inspect after the session consumed it
    #[derive(Clone, Default)]
    struct SharedDisplay(Arc<Mutex<RecordingDisplay>>);

    impl FrameDisplay for SharedDisplay {
        fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
            self.0.lock().unwrap().show(frame)
        }
        fn announce(&mut self, message: &str) {
            self.0.lock().unwrap().announce(message)
        }
        fn close(&mut self) {
            self.0.lock().unwrap().close()
        }
    }

    fn session(
        frames: Vec<ScriptedFrame>,
        sink: MemorySink,
    ) -> (Session<ScriptedFrameSource>, ScriptedFrameSource, SharedDisplay) {
        let clock = ManualClock::new();
        let source = ScriptedFrameSource::new(frames).with_clock(clock.clone());
        let observer = source.clone();
        let detector = source.detector();
        let display = SharedDisplay::default();
        let session = Session::new(source, Box::new(sink), SessionOptions::default())
            .with_detector(Box::new(detector))
            .with_display(Box::new(display.clone()))
            .with_clock(Box::new(clock));
        (session, observer, display)
    }

    fn held(payload: &str, from_ms: u64, to_ms: u64, step: u64) -> Vec<ScriptedFrame> {
        (from_ms..=to_ms)
            .step_by(step as usize)
            .map(|t| ScriptedFrame::at_millis(t).with_code(payload))
            .collect()
    }

    #[tokio::test]
    async fn test_stable_code_is_verified_logged_and_announced() {
        let sink = MemorySink::new();
        let rows = sink.rows();
        let (session, observer, display) = session(held("7501055301323", 0, 1200, 100), sink);

        let report = session.run().await.unwrap();

        assert_eq!(report.end_reason, EndReason::EndOfStream);
        assert_eq!(report.final_phase, SessionPhase::Terminated);
        assert_eq!(report.frames_processed, 13);
        assert_eq!(report.verified.len(), 1);
        assert_eq!(report.verified[0].label, "Coca Cola 600ml");
        assert_eq!(report.verified[0].verified_at, Duration::from_millis(1000));
        assert_eq!(report.total_scans, 1);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "Coca Cola 600ml");
        assert_eq!(rows[0].2, "7501055301323");

        let display = display.0.lock().unwrap();
        assert_eq!(display.announcements, vec!["Coca Cola 600ml verified.".to_string()]);
        assert_eq!(display.close_calls, 1);
        assert_eq!(observer.release_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_scan_counted() {
        let sink = MemorySink::new().failing();
        let (session, _observer, _display) = session(held("A", 0, 1000, 100), sink);
        let session = session.with_notifier(Box::new(FailingNotifier));

        let report = session.run().await.unwrap();
        assert_eq!(report.total_scans, 1);
        assert_eq!(report.persistence_failures, 1);
        assert_eq!(report.notification_failures, 1);
        assert_eq!(report.history[0].count, 1);
        assert_eq!(report.end_reason, EndReason::EndOfStream);
    }

    #[tokio::test]
    async fn test_open_failure_terminates_with_error() {
        let clock = ManualClock::new();
        let source = ScriptedFrameSource::new(held("A", 0, 100, 100))
            .with_clock(clock.clone())
            .fail_on_open();
        let display = SharedDisplay::default();
        let session = Session::new(source, Box::new(MemorySink::new()), SessionOptions::default())
            .with_display(Box::new(display.clone()));

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, ScanError::Device(_)));
        assert_eq!(display.0.lock().unwrap().close_calls, 1);
    }

    #[tokio::test]
    async fn test_read_failure_shuts_down_and_releases() {
        let sink = MemorySink::new();
        let clock = ManualClock::new();
        let source = ScriptedFrameSource::new(held("A", 0, 2000, 100))
            .with_clock(clock.clone())
            .fail_after(3);
        let observer = source.clone();
        let detector = source.detector();
        let session = Session::new(source, Box::new(sink), SessionOptions::default())
            .with_detector(Box::new(detector))
            .with_clock(Box::new(clock));

        let report = session.run().await.unwrap();
        assert!(matches!(report.end_reason, EndReason::DeviceFailure(_)));
        assert_eq!(report.frames_processed, 3);
        assert_eq!(observer.release_count(), 1);
    }

    #[tokio::test]
    async fn test_exit_flag_stops_after_current_frame() {
        let flag = Arc::new(AtomicBool::new(true));
        let (session, observer, display) = session(held("A", 0, 5000, 100), MemorySink::new());
        let session = session.with_exit_signal(Box::new(FlagExit::new(flag)));

        let report = session.run().await.unwrap();
        assert_eq!(report.end_reason, EndReason::UserExit);
        assert_eq!(report.frames_processed, 1);
        assert_eq!(observer.release_count(), 1);
        assert_eq!(display.0.lock().unwrap().frames_shown, 1);
    }

    #[tokio::test]
    async fn test_detector_failure_is_reported_as_critical() {
        let frames = vec![
            ScriptedFrame::at_millis(0).with_code("A"),
            ScriptedFrame::at_millis(100).detector_error("decoder crashed"),
            ScriptedFrame::at_millis(200).with_code("A"),
        ];
        let (session, observer, display) = session(frames, MemorySink::new());

        let report = session.run().await.unwrap();
        assert!(matches!(report.end_reason, EndReason::Failed(_)));
        assert_eq!(report.frames_processed, 1);
        assert_eq!(observer.release_count(), 1);
        assert_eq!(display.0.lock().unwrap().close_calls, 1);
    }

    #[tokio::test]
    async fn test_snapshot_written_on_shutdown() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("last.png");
        let clock = ManualClock::new();
        let source = ScriptedFrameSource::new(held("A", 0, 200, 100)).with_clock(clock.clone());
        let options = SessionOptions {
            snapshot_path: Some(path.clone()),
            ..Default::default()
        };
        let detector = source.detector();
        let session = Session::new(source, Box::new(MemorySink::new()), options)
            .with_detector(Box::new(detector))
            .with_clock(Box::new(clock));

        session.run().await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.set(Duration::from_millis(1500));
        other.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_options_reject_unrepresentable_timing() {
        let mut config = Config::default();
        config.scanning.stability_seconds = 1e20;
        assert!(matches!(
            SessionOptions::from_config(&config),
            Err(ConfigError::InvalidValue(_, _))
        ));

        let options = SessionOptions::from_config(&Config::default()).unwrap();
        assert_eq!(options.timing, ScanTiming::default());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SessionPhase::ShuttingDown.to_string(), "SHUTTING_DOWN");
        assert_eq!(SessionPhase::Terminated.to_string(), "TERMINATED");
    }
}
