//! Image-sequence frame source
//!
//! Replays a directory of still images (PNG/JPEG) as a capture device. Files
//! are delivered in file-name order, optionally paced to a fixed frame
//! interval and optionally looped.

use crate::core::config::CaptureConfig;
use crate::core::error::{Result, ScanError};
use crate::device::traits::{DeviceInfo, Frame, FrameSource};
use log::{debug, info, trace};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Extensions the image decoder is built with
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Frame source backed by a directory of images
#[derive(Debug)]
pub struct ImageSequenceSource {
    directory: PathBuf,
    frame_interval: Duration,
    loop_playback: bool,
    frames: Vec<PathBuf>,
    cursor: usize,
    next_index: u64,
    last_read: Option<Instant>,
    open: bool,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            frame_interval: Duration::ZERO,
            loop_playback: false,
            frames: Vec::new(),
            cursor: 0,
            next_index: 0,
            last_read: None,
            open: false,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(&config.frames_dir)
            .with_frame_interval(Duration::from_millis(config.frame_interval_ms))
            .with_looping(config.loop_playback)
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_looping(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn is_frame_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<DeviceInfo> {
        if !self.directory.is_dir() {
            return Err(ScanError::Device(format!(
                "Could not open frame source '{}': not a directory",
                self.directory.display()
            )));
        }

        let frames: Vec<PathBuf> = WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| Self::is_frame_file(path))
            .collect();

        if frames.is_empty() {
            return Err(ScanError::Device(format!(
                "Could not open frame source '{}': no PNG/JPEG frames found",
                self.directory.display()
            )));
        }

        info!(
            "Opened image sequence '{}' with {} frames",
            self.directory.display(),
            frames.len()
        );

        self.frames = frames;
        self.cursor = 0;
        self.next_index = 0;
        self.last_read = None;
        self.open = true;

        Ok(DeviceInfo::new(
            &self.directory.display().to_string(),
            "Image sequence",
        )
        .with_frame_count(self.frames.len()))
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(ScanError::Device("frame source is not open".to_string()));
        }

        if self.cursor >= self.frames.len() {
            if self.loop_playback && !self.frames.is_empty() {
                debug!("Image sequence exhausted, looping");
                self.cursor = 0;
            } else {
                return Ok(None);
            }
        }

        self.pace();

        let path = &self.frames[self.cursor];
        trace!("Reading frame {}", path.display());
        let image = image::open(path)
            .map_err(|e| {
                ScanError::Device(format!("Failed to read frame '{}': {}", path.display(), e))
            })?
            .to_rgb8();

        self.cursor += 1;
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.open {
            debug!("Releasing image sequence '{}'", self.directory.display());
        }
        self.open = false;
        self.frames.clear();
        self.cursor = 0;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    fn write_frames(dir: &Path, names: &[&str]) {
        for name in names {
            RgbImage::new(8, 6).save(dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let mut source = ImageSequenceSource::new("/nonexistent/frames");
        let err = source.open().unwrap_err();
        assert!(matches!(err, ScanError::Device(_)));
        assert!(!source.is_open());
    }

    #[test]
    fn test_open_empty_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::new(temp_dir.path());
        assert!(source.open().is_err());
    }

    #[test]
    fn test_reads_frames_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        write_frames(temp_dir.path(), &["b.png", "a.png", "c.png"]);
        fs::write(temp_dir.path().join("skip.txt"), "x").unwrap();

        let mut source = ImageSequenceSource::new(temp_dir.path());
        let info = source.open().unwrap();
        assert_eq!(info.frame_count, Some(3));

        let mut count = 0;
        while let Some(frame) = source.read_frame().unwrap() {
            assert_eq!(frame.index, count);
            assert_eq!(frame.width(), 8);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_looping_playback() {
        let temp_dir = TempDir::new().unwrap();
        write_frames(temp_dir.path(), &["only.png"]);

        let mut source = ImageSequenceSource::new(temp_dir.path()).with_looping(true);
        source.open().unwrap();
        for expected in 0..4 {
            let frame = source.read_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
        }
    }

    #[test]
    fn test_corrupt_frame_is_device_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.png"), b"not a png").unwrap();

        let mut source = ImageSequenceSource::new(temp_dir.path());
        source.open().unwrap();
        assert!(matches!(source.read_frame(), Err(ScanError::Device(_))));
    }

    #[test]
    fn test_release_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        write_frames(temp_dir.path(), &["a.png"]);

        let mut source = ImageSequenceSource::new(temp_dir.path());
        source.open().unwrap();
        source.release();
        source.release();
        assert!(!source.is_open());
        assert!(source.read_frame().is_err());
    }
}
