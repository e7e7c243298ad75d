//! Barcode detection
//!
//! Symbol recognition itself is delegated to an external decoder; this module
//! defines the narrow contract the session loop talks to and the enrichment
//! step that turns raw detections into normalized, labelled ones.
//!
//! # Submodules
//!
//! - `qr` - QR code detector backed by the `rqrr` crate

pub mod qr;

pub use qr::QrDetector;

use crate::core::catalog::CatalogLookup;
use crate::core::error::Result;
use crate::core::normalizer::normalize;
use crate::device::traits::Frame;
use std::fmt::{self, Display};

/// Symbol type of a detected barcode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbology {
    QrCode,
    Ean13,
    Ean8,
    UpcA,
    Code128,
    Code39,
    Other(String),
}

impl Symbology {
    pub fn display_name(&self) -> &str {
        match self {
            Symbology::QrCode => "QRCODE",
            Symbology::Ean13 => "EAN13",
            Symbology::Ean8 => "EAN8",
            Symbology::UpcA => "UPCA",
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Other(name) => name,
        }
    }
}

impl Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Smallest rectangle containing every point
    pub fn bounding(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self {
            left: min_x,
            top: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }
}

/// Where a symbol sits in the frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Geometry {
    pub polygon: Vec<Point>,
    pub rect: Rect,
}

impl Geometry {
    pub fn from_polygon(polygon: Vec<Point>) -> Self {
        let rect = Rect::bounding(&polygon);
        Self { polygon, rect }
    }

    pub fn from_rect(rect: Rect) -> Self {
        let polygon = vec![
            Point::new(rect.left, rect.top),
            Point::new(rect.right(), rect.top),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.left, rect.bottom()),
        ];
        Self { polygon, rect }
    }
}

/// One symbol as reported by a detector, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDetection {
    pub data: Vec<u8>,
    pub symbology: Symbology,
    pub geometry: Geometry,
}

impl RawDetection {
    pub fn new(data: impl Into<Vec<u8>>, symbology: Symbology, geometry: Geometry) -> Self {
        Self {
            data: data.into(),
            symbology,
            geometry,
        }
    }
}

/// A normalized, labelled detection for the current frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub payload: String,
    pub label: String,
    pub symbology: Symbology,
    pub geometry: Geometry,
}

/// Trait for barcode detectors
pub trait BarcodeDetector: Send {
    /// Find every symbol visible in `frame`
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;
}

/// Normalize payloads and attach catalog labels
pub fn enrich(raw: Vec<RawDetection>, catalog: &dyn CatalogLookup) -> Vec<Detection> {
    raw.into_iter()
        .map(|r| {
            let payload = normalize(&r.data);
            let label = catalog.lookup(&payload);
            Detection {
                payload,
                label,
                symbology: r.symbology,
                geometry: r.geometry,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;

    #[test]
    fn test_bounding_rect() {
        let rect = Rect::bounding(&[
            Point::new(10, 40),
            Point::new(50, 35),
            Point::new(55, 80),
            Point::new(8, 75),
        ]);
        assert_eq!(rect, Rect { left: 8, top: 35, width: 47, height: 45 });
        assert_eq!(rect.right(), 55);
        assert_eq!(rect.bottom(), 80);
        assert_eq!(Rect::bounding(&[]), Rect::default());
    }

    #[test]
    fn test_geometry_from_rect() {
        let geometry = Geometry::from_rect(Rect { left: 1, top: 2, width: 3, height: 4 });
        assert_eq!(geometry.polygon.len(), 4);
        assert_eq!(geometry.polygon[2], Point::new(4, 6));
    }

    #[test]
    fn test_enrich_normalizes_and_labels() {
        let catalog = Catalog::builtin();
        let raw = vec![
            RawDetection::new(b"7501055301323".to_vec(), Symbology::Ean13, Geometry::default()),
            RawDetection::new(b"\xffunknown".to_vec(), Symbology::QrCode, Geometry::default()),
        ];

        let detections = enrich(raw, &catalog);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].payload, "7501055301323");
        assert_eq!(detections[0].label, "Coca Cola 600ml");
        assert_eq!(detections[1].payload, "\u{ff}unknown");
        assert_eq!(detections[1].label, catalog.unassigned_label());
    }

    #[test]
    fn test_symbology_display() {
        assert_eq!(Symbology::QrCode.to_string(), "QRCODE");
        assert_eq!(Symbology::Other("PDF417".into()).to_string(), "PDF417");
    }
}
