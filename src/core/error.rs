//! Error types for the barcode scanner
//!
//! This module defines the error taxonomy used throughout the scanner.
//! Malformed payload bytes never surface here: the payload normalizer
//! recovers from them locally.

use thiserror::Error;

/// Main error type for the barcode scanner
#[derive(Error, Debug)]
pub enum ScanError {
    /// Capture device could not be opened or failed while reading (fatal)
    #[error("Device error: {0}")]
    Device(String),

    /// The capture device has no more frames to deliver
    #[error("End of frame stream")]
    EndOfStream,

    /// A verified scan could not be written to the scan log
    #[error("Failed to persist scan: {0}")]
    Persistence(String),

    /// A best-effort confirmation (beep, etc.) failed
    #[error("Notification failed: {0}")]
    Notification(String),

    /// The barcode detector could not process a frame
    #[error("Detection failed: {0}")]
    Detection(String),

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),
}

impl ScanError {
    /// Whether this error must end the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Device(_) | ScanError::EndOfStream)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScanError>;

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        ScanError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ScanError::Device("camera 0".into()).is_fatal());
        assert!(ScanError::EndOfStream.is_fatal());
        assert!(!ScanError::Persistence("disk full".into()).is_fatal());
        assert!(!ScanError::Notification("no bell".into()).is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let err: ScanError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ScanError::Io(ref msg) if msg.contains("gone")));
    }
}
