//! Non-blocking capture wrapper
//!
//! Wraps any [`FrameSource`] so the blocking device read runs on tokio's
//! blocking pool while the caller awaits it. The device is moved into the
//! worker for the duration of a read and handed back afterwards, so no lock
//! is needed around it.

use crate::core::error::{Result, ScanError};
use crate::device::traits::{CaptureStats, DeviceInfo, Frame, FrameSource};
use log::{debug, error, warn};

/// Async front-end over a blocking frame source
pub struct AsyncCapture<S: FrameSource> {
    source: Option<S>,
    running: bool,
    stats: CaptureStats,
}

impl<S: FrameSource> AsyncCapture<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            running: false,
            stats: CaptureStats::default(),
        }
    }

    /// Acquire the device
    pub async fn start(&mut self) -> Result<DeviceInfo> {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| ScanError::Device("capture device already lost".to_string()))?;

        let (source, result) = tokio::task::spawn_blocking(move || {
            let result = source.open();
            (source, result)
        })
        .await
        .map_err(|e| ScanError::Device(format!("device open worker failed: {}", e)))?;

        self.source = Some(source);
        let info = result?;
        self.running = true;
        debug!("Capture started on {}", info);
        Ok(info)
    }

    /// Read the next frame without blocking the calling task
    ///
    /// `Ok(None)` means the stream has ended.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.running {
            return Ok(None);
        }
        let Some(mut source) = self.source.take() else {
            return Ok(None);
        };

        let joined = tokio::task::spawn_blocking(move || {
            let result = source.read_frame();
            (source, result)
        })
        .await;

        match joined {
            Ok((source, result)) => {
                self.source = Some(source);
                match &result {
                    Ok(Some(_)) => self.stats.record_frame(),
                    Ok(None) => debug!("Frame source reported end of stream"),
                    Err(e) => {
                        self.stats.record_error();
                        warn!("Frame read failed: {}", e);
                    }
                }
                result
            }
            Err(e) => {
                // The worker panicked and took the device with it.
                error!("Frame read worker failed: {}", e);
                self.running = false;
                self.stats.record_error();
                Err(ScanError::Device(format!("frame read worker failed: {}", e)))
            }
        }
    }

    /// Release the device. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
        if let Some(source) = self.source.as_mut() {
            if source.is_open() {
                source.release();
                debug!("Capture device released");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    #[cfg(test)]
    fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }
}

impl<S: FrameSource> Drop for AsyncCapture<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
