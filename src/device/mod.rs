//! Capture device module
//!
//! This module provides the frame sources the session loop pulls images from.
//!
//! # Submodules
//!
//! - `traits` - The `FrameSource` contract and frame types
//! - `capture` - Async wrapper that keeps blocking reads off the control loop
//! - `image_sequence` - Directory-of-images replay device
//!
//! # Architecture
//!
//! Every device implements `FrameSource`, whose `read_frame` may block.
//! `AsyncCapture` moves the device onto tokio's blocking pool for each read
//! so the session loop can keep servicing its exit check. Scripted devices
//! for tests live in [`crate::testdb`].

pub mod capture;
pub mod image_sequence;
pub mod traits;

pub use capture::AsyncCapture;
pub use image_sequence::ImageSequenceSource;
pub use traits::{CaptureStats, DeviceInfo, Frame, FrameSource};
