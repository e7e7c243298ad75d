//! QR code detector
//!
//! Thin adapter over `rqrr`: the frame is converted to greyscale, grids are
//! located, and each grid that decodes cleanly becomes a [`RawDetection`].
//! Grids that fail to decode are dropped for this frame.

use crate::core::error::Result;
use crate::detect::{BarcodeDetector, Geometry, Point, RawDetection, Symbology};
use crate::device::traits::Frame;
use log::trace;

#[derive(Debug, Clone, Default)]
pub struct QrDetector {
    decode_failures: u64,
}

impl QrDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grids located but not decodable since creation
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

impl BarcodeDetector for QrDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let gray = image::imageops::grayscale(&frame.image);
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                gray.get_pixel(x as u32, y as u32).0[0]
            });

        let mut detections = Vec::new();
        for grid in prepared.detect_grids() {
            let mut data = Vec::new();
            match grid.decode_to(&mut data) {
                Ok(_) => {
                    let polygon = grid.bounds.iter().map(|p| Point::new(p.x, p.y)).collect();
                    detections.push(RawDetection::new(
                        data,
                        Symbology::QrCode,
                        Geometry::from_polygon(polygon),
                    ));
                }
                Err(e) => {
                    self.decode_failures += 1;
                    trace!("QR grid in frame {} did not decode: {:?}", frame.index, e);
                }
            }
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::detect::enrich;
    use image::{Rgb, RgbImage};

    /// Version 1 QR symbol (byte mode, ECC level M) carrying "rqrr"
    const RQRR_SYMBOL: [&str; 21] = [
        "#######...#...#######",
        "#.....#.###...#.....#",
        "#.###.#..#.##.#.###.#",
        "#.###.#.....#.#.###.#",
        "#.###.#.##.##.#.###.#",
        "#.....#..###..#.....#",
        "#######.#.#.#.#######",
        "..........#..........",
        "#.#.#.#.....#...#..#.",
        "#..##......#.#.#.#..#",
        ".#.##.##.###.###.####",
        "##...#..######.##..##",
        "..#.###.#..#.###.#..#",
        "........###...#..#..#",
        "#######..##.#...#..##",
        "#.....#..##...#....#.",
        "#.###.#.#...#.#.##.##",
        "#.###.#..#.#.#.#.#.#.",
        "#.###.#.##.#.###....#",
        "#.....#...####.###.#.",
        "#######.#..#.###..###",
    ];

    const MODULE_PX: u32 = 4;

    /// White frame with the symbol's top-left module at (`left`, `top`)
    fn frame_with_symbol(width: u32, height: u32, left: u32, top: u32) -> Frame {
        let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for (row, line) in RQRR_SYMBOL.iter().enumerate() {
            for (col, module) in line.chars().enumerate() {
                if module != '#' {
                    continue;
                }
                let x0 = left + col as u32 * MODULE_PX;
                let y0 = top + row as u32 * MODULE_PX;
                for y in y0..y0 + MODULE_PX {
                    for x in x0..x0 + MODULE_PX {
                        image.put_pixel(x, y, Rgb([0, 0, 0]));
                    }
                }
            }
        }
        Frame::new(0, image)
    }

    fn assert_near(actual: i32, expected: i32) {
        let tolerance = MODULE_PX as i32;
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} within {}px, got {}",
            expected,
            tolerance,
            actual
        );
    }

    #[test]
    fn test_decodes_rendered_symbol() {
        let mut detector = QrDetector::new();
        let frame = frame_with_symbol(116, 116, 16, 16);

        let detections = detector.detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.data, b"rqrr".to_vec());
        assert_eq!(detection.symbology, Symbology::QrCode);
        assert_eq!(detection.geometry.polygon.len(), 4);
        assert_eq!(detector.decode_failures(), 0);
    }

    #[test]
    fn test_geometry_follows_symbol_position() {
        // Different x and y offsets catch swapped axes.
        let mut detector = QrDetector::new();
        let frame = frame_with_symbol(220, 150, 80, 24);
        let side = (RQRR_SYMBOL.len() as u32 * MODULE_PX) as i32;

        let detections = detector.detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        let rect = detections[0].geometry.rect;
        assert_near(rect.left, 80);
        assert_near(rect.top, 24);
        assert_near(rect.right(), 80 + side);
        assert_near(rect.bottom(), 24 + side);

        for corner in &detections[0].geometry.polygon {
            assert!(corner.x >= rect.left && corner.x <= rect.right());
            assert!(corner.y >= rect.top && corner.y <= rect.bottom());
        }
    }

    #[test]
    fn test_decoded_symbol_is_labelled() {
        let mut detector = QrDetector::new();
        let frame = frame_with_symbol(116, 116, 16, 16);
        let mut catalog = Catalog::builtin();
        catalog.insert("rqrr", "Widget");

        let detections = enrich(detector.detect(&frame).unwrap(), &catalog);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].payload, "rqrr");
        assert_eq!(detections[0].label, "Widget");
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let mut detector = QrDetector::new();
        let frame = Frame::blank(0, 64, 64);
        assert!(detector.detect(&frame).unwrap().is_empty());
        assert_eq!(detector.decode_failures(), 0);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut detector = QrDetector::new();
        let frame = Frame::blank(0, 0, 0);
        assert!(detector.detect(&frame).unwrap().is_empty());
    }
}
