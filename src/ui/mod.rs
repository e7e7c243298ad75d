//! Operator feedback
//!
//! # Submodules
//!
//! - `overlay` - Per-frame overlay model and geometry drawing
//! - `display` - Display trait the session loop presents frames through

pub mod display;
pub mod overlay;

pub use display::{save_snapshot, FrameDisplay, NullDisplay, RecordingDisplay};
pub use overlay::{
    sidebar_title, target_caption, AnnotatedFrame, Overlay, OverlayRenderer, SidebarEntry,
    TargetAnnotation, TargetState,
};
