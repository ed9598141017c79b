//! Conversions between pixel rectangles and normalized boxes.
//!
//! Stored annotations use the YOLO convention: center x, center y, width and
//! height, each a fraction of the image size. The canvas works in pixel
//! space with corner-form rectangles. This module owns the arithmetic that
//! moves between the two, plus the label-line wire format in [`line`].
//!
//! # Round-trip bound
//!
//! For an integer pixel rectangle inside the image,
//! `to_pixels(&to_normalized(&r, size), size)` differs from the ordered
//! rectangle by at most one pixel per coordinate. `to_pixels` floors, and
//! the floating-point error of the forward transform can land a corner just
//! below an integer.
//!
//! ```
//! use inspektline::geometry::{to_normalized, to_pixels, ImageSize, PixelRect};
//!
//! let size = ImageSize::new(200, 100);
//! let rect = PixelRect::new(10, 10, 50, 30);
//! let norm = to_normalized(&rect.to_bbox(), size);
//! assert!((norm.x_center - 0.15).abs() < 1e-12);
//! assert!(to_pixels(&norm, size).max_deviation(&rect) <= 1);
//! ```

mod bbox;
mod coord;
pub mod line;
mod space;

pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use line::{format_label_line, parse_label_line, parse_label_lines, LabelLine};
pub use space::{Pixel, View};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack allowed on box edges for floating-point noise from the forward
/// transform. Anything beyond it is rejected, never clamped.
pub const EDGE_EPSILON: f64 = 1e-9;

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width_f64(&self) -> f64 {
        self.width as f64
    }

    #[inline]
    pub fn height_f64(&self) -> f64 {
        self.height as f64
    }
}

/// A bounding box in normalized center form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Checks that the box is persistable: finite, strictly positive size,
    /// and every edge inside `[0, 1]`.
    pub fn validate(&self) -> Result<(), GeometryViolation> {
        let fields = [self.x_center, self.y_center, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(GeometryViolation::NonFinite);
        }

        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(GeometryViolation::NonPositiveSize {
                width: self.width,
                height: self.height,
            });
        }

        let left = self.x_center - self.width / 2.0;
        let right = self.x_center + self.width / 2.0;
        let top = self.y_center - self.height / 2.0;
        let bottom = self.y_center + self.height / 2.0;

        let inside = |v: f64| (-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&v);
        if !(inside(left) && inside(right) && inside(top) && inside(bottom)) {
            return Err(GeometryViolation::OutOfBounds {
                left,
                top,
                right,
                bottom,
            });
        }

        Ok(())
    }

    /// Unrounded pixel-space corners, used for hit testing and rendering.
    pub fn to_pixel_bbox(&self, size: ImageSize) -> BBoxXYXY<Pixel> {
        let (w, h) = (size.width_f64(), size.height_f64());
        BBoxXYXY::from_xyxy(
            (self.x_center - self.width / 2.0) * w,
            (self.y_center - self.height / 2.0) * h,
            (self.x_center + self.width / 2.0) * w,
            (self.y_center + self.height / 2.0) * h,
        )
    }
}

/// Why a normalized box cannot be persisted.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GeometryViolation {
    #[error("coordinates must be finite")]
    NonFinite,

    #[error("size must be positive, got {width}x{height}")]
    NonPositiveSize { width: f64, height: f64 },

    #[error("edges ({left}, {top})-({right}, {bottom}) fall outside [0, 1]")]
    OutOfBounds {
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
    },
}

/// An integer pixel rectangle, as produced by [`to_pixels`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl PixelRect {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn to_bbox(&self) -> BBoxXYXY<Pixel> {
        BBoxXYXY::from_xyxy(
            self.x1 as f64,
            self.y1 as f64,
            self.x2 as f64,
            self.y2 as f64,
        )
    }

    /// Largest per-coordinate distance to `other` once both are ordered.
    pub fn max_deviation(&self, other: &PixelRect) -> i64 {
        let a = self.ordered();
        let b = other.ordered();
        [a.x1 - b.x1, a.y1 - b.y1, a.x2 - b.x2, a.y2 - b.y2]
            .iter()
            .map(|d| d.abs())
            .max()
            .unwrap_or(0)
    }

    fn ordered(&self) -> PixelRect {
        PixelRect::new(
            self.x1.min(self.x2),
            self.y1.min(self.y2),
            self.x1.max(self.x2),
            self.y1.max(self.y2),
        )
    }
}

/// Corner form to normalized center form.
///
/// `xc = ((x1 + x2) / 2) / W`, `w = |x2 - x1| / W`, likewise for y.
pub fn to_normalized(rect: &BBoxXYXY<Pixel>, size: ImageSize) -> NormalizedBox {
    let (w, h) = (size.width_f64(), size.height_f64());
    NormalizedBox {
        x_center: ((rect.xmin() + rect.xmax()) / 2.0) / w,
        y_center: ((rect.ymin() + rect.ymax()) / 2.0) / h,
        width: rect.width().abs() / w,
        height: rect.height().abs() / h,
    }
}

/// Normalized center form back to integer pixel corners, floored.
pub fn to_pixels(bbox: &NormalizedBox, size: ImageSize) -> PixelRect {
    let corners = bbox.to_pixel_bbox(size);
    PixelRect::new(
        corners.xmin().floor() as i64,
        corners.ymin().floor() as i64,
        corners.xmax().floor() as i64,
        corners.ymax().floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn to_normalized_matches_reference_scenario() {
        let bbox = BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 30.0);
        let norm = to_normalized(&bbox, ImageSize::new(200, 100));
        assert!(approx(norm.x_center, 0.15));
        assert!(approx(norm.y_center, 0.20));
        assert!(approx(norm.width, 0.20));
        assert!(approx(norm.height, 0.20));
    }

    #[test]
    fn to_pixels_floors_corners() {
        let rect = to_pixels(
            &NormalizedBox::new(0.5, 0.5, 0.333, 0.333),
            ImageSize::new(10, 10),
        );
        assert_eq!(rect, PixelRect::new(3, 3, 6, 6));
    }

    #[test]
    fn full_image_box_round_trips_exactly() {
        let size = ImageSize::new(640, 480);
        let rect = PixelRect::new(0, 0, 640, 480);
        let norm = to_normalized(&rect.to_bbox(), size);
        assert_eq!(norm, NormalizedBox::new(0.5, 0.5, 1.0, 1.0));
        assert_eq!(to_pixels(&norm, size), rect);
    }

    #[test]
    fn validate_rejects_zero_size() {
        let err = NormalizedBox::new(0.5, 0.5, 0.0, 0.2)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GeometryViolation::NonPositiveSize { .. }));

        let err = NormalizedBox::new(0.5, 0.5, 0.2, 0.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GeometryViolation::NonPositiveSize { .. }));
    }

    #[test]
    fn validate_rejects_boxes_crossing_an_edge() {
        let err = NormalizedBox::new(0.0, 1.0, 0.0001, 0.0001)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GeometryViolation::OutOfBounds { .. }));
    }

    #[test]
    fn validate_accepts_tiny_corner_box_inside_bounds() {
        NormalizedBox::new(0.00005, 0.99995, 0.0001, 0.0001)
            .validate()
            .expect("box touching the corner is valid");
    }

    #[test]
    fn validate_rejects_nan() {
        let err = NormalizedBox::new(f64::NAN, 0.5, 0.1, 0.1)
            .validate()
            .unwrap_err();
        assert_eq!(err, GeometryViolation::NonFinite);
    }

    #[test]
    fn max_deviation_ignores_corner_order() {
        let a = PixelRect::new(50, 30, 10, 10);
        let b = PixelRect::new(10, 10, 50, 31);
        assert_eq!(a.max_deviation(&b), 1);
    }
}
