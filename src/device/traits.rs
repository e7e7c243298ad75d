//! Frame source abstraction for testability
//!
//! This module defines the contract every capture device implements, allowing
//! image-sequence replays and scripted mock devices to be used interchangeably
//! by the session loop.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use barcode_scanner::device::traits::FrameSource;
//!
//! fn count_frames<S: FrameSource>(source: &mut S) -> Result<usize, String> {
//!     source.open().map_err(|e| e.to_string())?;
//!     let mut count = 0;
//!     while let Some(_frame) = source.read_frame().map_err(|e| e.to_string())? {
//!         count += 1;
//!     }
//!     source.release();
//!     Ok(count)
//! }
//! ```

use crate::core::error::Result;
use image::RgbImage;
use std::fmt::{self, Display};

/// One captured image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number within the session, starting at 0
    pub index: u64,
    /// Pixel data
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// A black frame of the given size
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        Self::new(index, RgbImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Information about an opened capture device
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Index or identifier the device was opened with
    pub device_id: String,
    /// Human-readable name
    pub friendly_name: String,
    /// Number of frames the device will deliver, when known
    pub frame_count: Option<usize>,
}

impl DeviceInfo {
    pub fn new(device_id: &str, friendly_name: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            friendly_name: friendly_name.to_string(),
            frame_count: None,
        }
    }

    pub fn with_frame_count(mut self, count: usize) -> Self {
        self.frame_count = Some(count);
        self
    }
}

impl Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_count {
            Some(count) => write!(
                f,
                "{} [{}] ({} frames)",
                self.friendly_name, self.device_id, count
            ),
            None => write!(f, "{} [{}]", self.friendly_name, self.device_id),
        }
    }
}

/// Trait for capture devices
///
/// `read_frame` is allowed to block; callers that must stay responsive run it
/// on a worker (see [`crate::device::AsyncCapture`]).
pub trait FrameSource: Send + 'static {
    /// Acquire the device
    ///
    /// Fails with [`crate::core::error::ScanError::Device`] if it cannot be opened.
    fn open(&mut self) -> Result<DeviceInfo>;

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the stream has ended and an error when the
    /// device failed mid-read.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Safe to call repeatedly.
    fn release(&mut self);

    /// Whether the device is currently acquired
    fn is_open(&self) -> bool;
}

/// Statistics about capture operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames delivered to the caller
    pub frames_read: u64,
    /// Reads that ended in a device error
    pub read_errors: u64,
}

impl CaptureStats {
    pub fn record_frame(&mut self) {
        self.frames_read += 1;
    }

    pub fn record_error(&mut self) {
        self.read_errors += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_dimensions() {
        let frame = Frame::blank(3, 64, 48);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo::new("0", "Bench camera");
        assert_eq!(format!("{}", info), "Bench camera [0]");

        let info = info.with_frame_count(12);
        assert_eq!(format!("{}", info), "Bench camera [0] (12 frames)");
    }

    #[test]
    fn test_capture_stats() {
        let mut stats = CaptureStats::default();
        stats.record_frame();
        stats.record_frame();
        stats.record_error();
        assert_eq!(stats.frames_read, 2);
        assert_eq!(stats.read_errors, 1);
    }
}
