//! Feedback overlay
//!
//! Builds a description of what the operator should see for the current
//! frame (targets, history sidebar, status line) and draws the geometric part
//! of it onto a copy of the frame. Text belongs to the display, which knows
//! how to put it on screen.
//!
//! The renderer only reads the scan state; it never changes it.

use crate::core::scan_state::{ScanStateMachine, TrackingStatus};
use crate::detect::{Detection, Geometry, Point};
use crate::device::traits::Frame;
use image::{Rgb, RgbImage};
use std::time::Duration;

/// Outline colour for untracked and cooling-down targets
pub const RED_TONE: Rgb<u8> = Rgb([220, 50, 50]);

/// Outline colour for targets being verified
pub const YELLOW_TONE: Rgb<u8> = Rgb([220, 200, 50]);

const SIDEBAR_WIDTH: u32 = 300;
const SIDEBAR_TINT: Rgb<u8> = Rgb([40, 20, 20]);
const SIDEBAR_OPACITY: f32 = 0.75;
const CORNER_LENGTH: i32 = 20;

/// Longest sidebar name before it gets shortened
const MAX_NAME_CHARS: usize = 28;
const TRUNCATED_NAME_CHARS: usize = 25;

pub const STATUS_TRACKING: &str = "STATUS: TRACKING";
pub const STATUS_VERIFYING: &str = "STATUS: VERIFYING...";

/// How one on-screen target is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Neutral,
    Pending { progress_percent: u8 },
    CoolingDown,
}

impl TargetState {
    pub fn color(&self) -> Rgb<u8> {
        match self {
            TargetState::Pending { .. } => YELLOW_TONE,
            TargetState::Neutral | TargetState::CoolingDown => RED_TONE,
        }
    }
}

impl From<TrackingStatus> for TargetState {
    fn from(status: TrackingStatus) -> Self {
        match status {
            TrackingStatus::CoolingDown => TargetState::CoolingDown,
            TrackingStatus::Pending { progress_percent } => {
                TargetState::Pending { progress_percent }
            }
            TrackingStatus::Untracked => TargetState::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAnnotation {
    pub payload: String,
    pub caption: String,
    pub state: TargetState,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub title: String,
    pub code_line: String,
    pub is_recent: bool,
}

/// Everything drawn or printed for one frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overlay {
    pub targets: Vec<TargetAnnotation>,
    pub sidebar: Vec<SidebarEntry>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame_index: u64,
    pub image: RgbImage,
    pub overlay: Overlay,
}

/// Sidebar name: label plus quantity suffix, shortened to fit
pub fn sidebar_title(label: &str, count: u32) -> String {
    let name = if count > 1 {
        format!("{} (x{})", label, count)
    } else {
        label.to_string()
    };
    if name.chars().count() > MAX_NAME_CHARS {
        let head: String = name.chars().take(TRUNCATED_NAME_CHARS).collect();
        format!("{}..", head)
    } else {
        name
    }
}

/// Caption above a target
pub fn target_caption(label: &str, state: TargetState) -> String {
    match state {
        TargetState::Pending { progress_percent } => {
            format!("[{}%] {}", progress_percent, label.to_uppercase())
        }
        _ => label.to_uppercase(),
    }
}

#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    history_window: usize,
}

impl OverlayRenderer {
    pub fn new(history_window: usize) -> Self {
        Self {
            history_window: history_window.max(1),
        }
    }

    /// Describe the overlay for the current detections and scan state
    pub fn build_overlay(
        &self,
        detections: &[Detection],
        state: &ScanStateMachine,
        now: Duration,
    ) -> Overlay {
        let targets = detections
            .iter()
            .map(|d| {
                let target_state = TargetState::from(state.status(&d.payload, now));
                TargetAnnotation {
                    payload: d.payload.clone(),
                    caption: target_caption(&d.label, target_state),
                    state: target_state,
                    geometry: d.geometry.clone(),
                }
            })
            .collect();

        let sidebar = state
            .recent_history(self.history_window)
            .enumerate()
            .map(|(i, entry)| SidebarEntry {
                title: sidebar_title(&entry.label, entry.count),
                code_line: format!("ID: {}", entry.payload),
                is_recent: i == 0,
            })
            .collect();

        let status = if state.is_verifying() {
            STATUS_VERIFYING
        } else {
            STATUS_TRACKING
        };

        Overlay {
            targets,
            sidebar,
            status: status.to_string(),
        }
    }

    /// Build the overlay and draw it onto a copy of the frame
    pub fn render(
        &self,
        frame: &Frame,
        detections: &[Detection],
        state: &ScanStateMachine,
        now: Duration,
    ) -> AnnotatedFrame {
        let overlay = self.build_overlay(detections, state, now);
        let mut image = frame.image.clone();

        tint_sidebar(&mut image);
        for target in &overlay.targets {
            draw_target(&mut image, &target.geometry, target.state.color());
        }

        AnnotatedFrame {
            frame_index: frame.index,
            image,
            overlay,
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(8)
    }
}

fn tint_sidebar(image: &mut RgbImage) {
    let (width, height) = image.dimensions();
    let start = width.saturating_sub(SIDEBAR_WIDTH);
    for y in 0..height {
        for x in start..width {
            let pixel = image.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended = SIDEBAR_OPACITY * f32::from(SIDEBAR_TINT.0[c])
                    + (1.0 - SIDEBAR_OPACITY) * f32::from(pixel.0[c]);
                pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn draw_target(image: &mut RgbImage, geometry: &Geometry, color: Rgb<u8>) {
    let polygon = &geometry.polygon;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        draw_thick_line(image, *a, b, color);
    }

    let r = geometry.rect;
    let corners = [
        (r.left, r.top, 1, 1),
        (r.right(), r.top, -1, 1),
        (r.left, r.bottom(), 1, -1),
        (r.right(), r.bottom(), -1, -1),
    ];
    for (x, y, sx, sy) in corners {
        let corner = Point::new(x, y);
        draw_thick_line(image, corner, Point::new(x + sx * CORNER_LENGTH, y), color);
        draw_thick_line(image, corner, Point::new(x, y + sy * CORNER_LENGTH), color);
    }
}

fn draw_thick_line(image: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>) {
    draw_line(image, a, b, color);
    draw_line(image, Point::new(a.x + 1, a.y), Point::new(b.x + 1, b.y), color);
    draw_line(image, Point::new(a.x, a.y + 1), Point::new(b.x, b.y + 1), color);
}

/// Bresenham line, clipped to the image
fn draw_line(image: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>) {
    let (mut x, mut y) = (a.x, a.y);
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel_clipped(image, x, y, color);
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn put_pixel_clipped(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Rect, Symbology};

    fn det(payload: &str, label: &str, rect: Rect) -> Detection {
        Detection {
            payload: payload.to_string(),
            label: label.to_string(),
            symbology: Symbology::Ean13,
            geometry: Geometry::from_rect(rect),
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_sidebar_title() {
        assert_eq!(sidebar_title("Widget", 1), "Widget");
        assert_eq!(sidebar_title("Widget", 3), "Widget (x3)");

        let long = "Papas Sabritas Original Extra Grande";
        let title = sidebar_title(long, 1);
        assert_eq!(title, "Papas Sabritas Original E..");
        assert_eq!(title.chars().count(), 27);

        // Exactly at the limit stays untouched.
        let exact = "x".repeat(28);
        assert_eq!(sidebar_title(&exact, 1), exact);
    }

    #[test]
    fn test_target_caption() {
        assert_eq!(target_caption("Widget", TargetState::Neutral), "WIDGET");
        assert_eq!(
            target_caption("Widget", TargetState::Pending { progress_percent: 40 }),
            "[40%] WIDGET"
        );
        assert_eq!(target_caption("Widget", TargetState::CoolingDown), "WIDGET");
    }

    #[test]
    fn test_overlay_states() {
        let mut state = ScanStateMachine::default();
        let rect = Rect { left: 10, top: 10, width: 30, height: 20 };
        let a = det("A", "Widget", rect);
        let b = det("B", "Gadget", rect);

        // A verified at 1.0, B pending since 1.5.
        state.observe(&[a.clone()], ms(0));
        state.observe(&[a.clone()], ms(1000));
        state.observe(&[a.clone(), b.clone()], ms(1500));

        let renderer = OverlayRenderer::new(8);
        let overlay = renderer.build_overlay(&[a, b], &state, ms(1750));

        assert_eq!(overlay.targets[0].state, TargetState::CoolingDown);
        assert_eq!(overlay.targets[0].caption, "WIDGET");
        assert_eq!(
            overlay.targets[1].state,
            TargetState::Pending { progress_percent: 25 }
        );
        assert_eq!(overlay.targets[1].caption, "[25%] GADGET");
        assert_eq!(overlay.status, STATUS_VERIFYING);

        assert_eq!(overlay.sidebar.len(), 1);
        assert_eq!(overlay.sidebar[0].title, "Widget");
        assert_eq!(overlay.sidebar[0].code_line, "ID: A");
        assert!(overlay.sidebar[0].is_recent);
    }

    #[test]
    fn test_sidebar_window_most_recent_first() {
        let mut state = ScanStateMachine::default();
        let rect = Rect::default();
        for i in 0..10u64 {
            let d = det(&format!("P{}", i), "Item", rect);
            let t = i * 10_000;
            state.observe(&[d.clone()], ms(t));
            state.observe(&[d], ms(t + 1000));
        }

        let renderer = OverlayRenderer::new(8);
        let overlay = renderer.build_overlay(&[], &state, ms(200_000));
        let codes: Vec<&str> = overlay.sidebar.iter().map(|s| s.code_line.as_str()).collect();
        assert_eq!(codes.len(), 8);
        assert_eq!(codes[0], "ID: P9");
        assert_eq!(codes[7], "ID: P2");
        assert_eq!(overlay.status, STATUS_TRACKING);
    }

    #[test]
    fn test_render_draws_without_touching_state() {
        let mut state = ScanStateMachine::default();
        let rect = Rect { left: 5, top: 5, width: 20, height: 10 };
        let a = det("A", "Widget", rect);
        state.observe(&[a.clone()], ms(0));
        let pending_before = state.pending().clone();

        let frame = Frame::blank(7, 400, 100);
        let renderer = OverlayRenderer::default();
        let annotated = renderer.render(&frame, &[a], &state, ms(500));

        assert_eq!(annotated.frame_index, 7);
        assert_eq!(annotated.image.get_pixel(5, 5), &YELLOW_TONE);
        assert_eq!(annotated.image.get_pixel(25, 15), &YELLOW_TONE);
        // Sidebar tinted, rest of the frame untouched.
        assert_ne!(annotated.image.get_pixel(399, 50), &Rgb([0, 0, 0]));
        assert_eq!(annotated.image.get_pixel(60, 60), &Rgb([0, 0, 0]));
        // Source frame is left as it was.
        assert_eq!(frame.image.get_pixel(5, 5), &Rgb([0, 0, 0]));
        assert_eq!(state.pending(), &pending_before);
    }

    #[test]
    fn test_offscreen_geometry_is_clipped() {
        let state = ScanStateMachine::default();
        let rect = Rect { left: -50, top: -50, width: 500, height: 500 };
        let frame = Frame::blank(0, 32, 32);
        let annotated =
            OverlayRenderer::default().render(&frame, &[det("A", "Widget", rect)], &state, ms(0));
        assert_eq!(annotated.image.dimensions(), (32, 32));
    }
}
