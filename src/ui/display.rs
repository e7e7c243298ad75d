//! Display seam
//!
//! The session hands every annotated frame and every scan announcement to a
//! `FrameDisplay`. The terminal HUD lives in the CLI; tests use
//! `RecordingDisplay`.

use crate::core::error::{Result, ScanError};
use crate::ui::overlay::AnnotatedFrame;
use std::path::Path;

/// Where annotated frames and announcements go
pub trait FrameDisplay: Send {
    /// Present one annotated frame
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()>;

    /// Print a one-line operator message, e.g. "Widget verified."
    fn announce(&mut self, message: &str);

    /// Tear down the display; safe to call more than once
    fn close(&mut self);
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullDisplay;

impl FrameDisplay for NullDisplay {
    fn show(&mut self, _frame: &AnnotatedFrame) -> Result<()> {
        Ok(())
    }

    fn announce(&mut self, _message: &str) {}

    fn close(&mut self) {}
}

/// Keeps announcements and overlay text in memory
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub announcements: Vec<String>,
    pub statuses: Vec<String>,
    pub captions: Vec<Vec<String>>,
    pub frames_shown: usize,
    pub close_calls: usize,
}

impl FrameDisplay for RecordingDisplay {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.frames_shown += 1;
        self.statuses.push(frame.overlay.status.clone());
        self.captions.push(
            frame
                .overlay
                .targets
                .iter()
                .map(|t| t.caption.clone())
                .collect(),
        );
        Ok(())
    }

    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }

    fn close(&mut self) {
        self.close_calls += 1;
    }
}

/// Write an annotated frame to disk; the format follows the extension
pub fn save_snapshot(frame: &AnnotatedFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    frame.image.save(path).map_err(|e| {
        ScanError::Io(format!("Failed to save snapshot '{}': {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::overlay::Overlay;
    use image::RgbImage;
    use tempfile::TempDir;

    #[test]
    fn test_save_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shots").join("last.png");
        let frame = AnnotatedFrame {
            frame_index: 3,
            image: RgbImage::new(8, 6),
            overlay: Overlay::default(),
        };

        save_snapshot(&frame, &path).unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 8);
        assert_eq!(reloaded.height(), 6);
    }
}
