//! Region-of-interest geometry.

use serde::{Deserialize, Serialize};

/// Rectangular region of interest in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    /// Square ROI centered in the frame, sized as `fraction` of the smaller
    /// frame dimension. The fraction is clamped to a usable band.
    pub fn centered(frame_width: u32, frame_height: u32, fraction: f32) -> Self {
        let fraction = fraction.clamp(0.1, 1.0);
        let side = (frame_width.min(frame_height) as f32 * fraction).round() as u32;
        let side = side.max(1).min(frame_width).min(frame_height);

        Self {
            x: (frame_width - side) / 2,
            y: (frame_height - side) / 2,
            width: side,
            height: side,
        }
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_square() {
        let roi = RoiRect::centered(640, 480, 0.5);
        assert_eq!(roi.width, 240);
        assert_eq!(roi.height, 240);
        assert_eq!(roi.x, 200);
        assert_eq!(roi.y, 120);
    }

    #[test]
    fn test_fraction_clamped() {
        let roi = RoiRect::centered(100, 100, 5.0);
        assert_eq!(roi.width, 100);

        let tiny = RoiRect::centered(100, 100, 0.0);
        assert!(tiny.width >= 10);
    }

    #[test]
    fn test_never_exceeds_frame() {
        let roi = RoiRect::centered(30, 200, 0.6);
        assert!(roi.x + roi.width <= 30);
        assert!(roi.y + roi.height <= 200);
    }
}
