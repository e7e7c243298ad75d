//! Scan verification state machine
//!
//! Turns noisy frame-by-frame detections into discrete verified scans.
//!
//! A payload must be visible in every consecutive frame for the stability
//! window before it is verified. Any frame without it resets its timer. Once
//! verified, the payload is suppressed for the cooldown window; when the
//! cooldown expires a fresh stability window starts from zero.
//!
//! Time is a monotonic offset from session start supplied by the caller, so
//! the machine is deterministic under test and insensitive to frame pacing.

use crate::core::config::{ConfigError, ScanningConfig};
use crate::detect::Detection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Continuous visibility required before a scan is verified
pub const STABILITY_SECONDS: f64 = 1.0;

/// Minimum time between two verifications of the same payload
pub const COOLDOWN_SECONDS: f64 = 2.0;

/// Stability and cooldown windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    pub stability: Duration,
    pub cooldown: Duration,
}

impl ScanTiming {
    pub fn new(stability: Duration, cooldown: Duration) -> Self {
        Self {
            stability,
            cooldown,
        }
    }

    /// Windows from config; fails on values a `Duration` cannot hold
    pub fn from_config(config: &ScanningConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.stability()?, config.cooldown()?))
    }
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f64(STABILITY_SECONDS),
            Duration::from_secs_f64(COOLDOWN_SECONDS),
        )
    }
}

/// One distinct payload verified during the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub label: String,
    pub payload: String,
    pub count: u32,
}

/// Output of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedScan {
    pub label: String,
    pub payload: String,
    /// Session tally for the payload after this scan
    pub count: u32,
    /// Session time of the frame that verified it
    pub verified_at: Duration,
}

/// How a payload is currently being treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// Verified recently; detections are ignored
    CoolingDown,
    /// Stability timer running; progress is always below 100
    Pending { progress_percent: u8 },
    /// Not tracked
    Untracked,
}

#[derive(Debug, Clone, Default)]
pub struct ScanStateMachine {
    timing: ScanTiming,
    pending: HashMap<String, Duration>,
    cooldown: HashMap<String, Duration>,
    tally: HashMap<String, u32>,
    history: Vec<HistoryEntry>,
    history_index: HashMap<String, usize>,
}

impl ScanStateMachine {
    pub fn new(timing: ScanTiming) -> Self {
        Self {
            timing,
            ..Default::default()
        }
    }

    /// Process one frame's detections at session time `now`
    ///
    /// Returns the scans verified by this frame, in detection order.
    /// Repeated detections of a payload within the frame count once.
    pub fn observe(&mut self, detections: &[Detection], now: Duration) -> Vec<VerifiedScan> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(detections.len());
        let mut verified = Vec::new();

        for detection in detections {
            let payload = detection.payload.as_str();
            if !seen.insert(payload) {
                continue;
            }

            if self.is_cooling_down(payload, now) {
                continue;
            }

            match self.pending.get(payload) {
                None => {
                    self.pending.insert(payload.to_string(), now);
                }
                Some(&first_seen) => {
                    if now.saturating_sub(first_seen) >= self.timing.stability {
                        verified.push(self.verify(&detection.label, payload, now));
                    }
                }
            }
        }

        // Anything not seen this frame starts over next time.
        self.pending.retain(|payload, _| seen.contains(payload.as_str()));

        verified
    }

    fn is_cooling_down(&self, payload: &str, now: Duration) -> bool {
        self.cooldown
            .get(payload)
            .map(|&last| now.saturating_sub(last) < self.timing.cooldown)
            .unwrap_or(false)
    }

    fn verify(&mut self, label: &str, payload: &str, now: Duration) -> VerifiedScan {
        let count = {
            let count = self.tally.entry(payload.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        self.cooldown.insert(payload.to_string(), now);

        match self.history_index.get(payload) {
            Some(&idx) => self.history[idx].count = count,
            None => {
                self.history_index
                    .insert(payload.to_string(), self.history.len());
                self.history.push(HistoryEntry {
                    label: label.to_string(),
                    payload: payload.to_string(),
                    count,
                });
            }
        }

        self.pending.remove(payload);

        VerifiedScan {
            label: label.to_string(),
            payload: payload.to_string(),
            count,
            verified_at: now,
        }
    }

    /// Current treatment of `payload` at session time `now`
    pub fn status(&self, payload: &str, now: Duration) -> TrackingStatus {
        if self.is_cooling_down(payload, now) {
            return TrackingStatus::CoolingDown;
        }
        match self.pending.get(payload) {
            Some(&first_seen) => TrackingStatus::Pending {
                progress_percent: self.progress_percent(now.saturating_sub(first_seen)),
            },
            None => TrackingStatus::Untracked,
        }
    }

    fn progress_percent(&self, elapsed: Duration) -> u8 {
        let stability = self.timing.stability.as_secs_f64();
        if stability <= 0.0 {
            return 99;
        }
        let percent = (elapsed.as_secs_f64() / stability * 100.0).floor();
        percent.clamp(0.0, 99.0) as u8
    }

    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    /// Payloads whose stability timer is running, with their first-seen time
    pub fn pending(&self) -> &HashMap<String, Duration> {
        &self.pending
    }

    pub fn is_verifying(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Verified payloads in first-verification order
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Up to `window` history entries, most recent first
    pub fn recent_history(&self, window: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev().take(window)
    }

    /// Session tally for one payload
    pub fn tally(&self, payload: &str) -> u32 {
        self.tally.get(payload).copied().unwrap_or(0)
    }

    /// Total verified scans across all payloads
    pub fn total_scans(&self) -> u32 {
        self.tally.values().sum()
    }

    pub fn distinct_items(&self) -> usize {
        self.history.len()
    }
}
