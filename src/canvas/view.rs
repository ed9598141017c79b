//! Zoom and pan. View-only: nothing here reaches stored coordinates.

use crate::geometry::{Coord, ImageSize, Pixel, View};

const MIN_SCALE: f64 = 0.02;
const MAX_SCALE: f64 = 64.0;

/// Maps image pixels to widget coordinates: `view = pixel * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    pub fn to_image(&self, point: Coord<View>) -> Coord<Pixel> {
        Coord::new(
            (point.x - self.offset_x) / self.scale,
            (point.y - self.offset_y) / self.scale,
        )
    }

    pub fn to_view(&self, point: Coord<Pixel>) -> Coord<View> {
        Coord::new(
            point.x * self.scale + self.offset_x,
            point.y * self.scale + self.offset_y,
        )
    }

    /// Multiplies the scale by `factor`, keeping the image point under
    /// `anchor` where it is. The scale is clamped to a sane range.
    pub fn zoom(&mut self, factor: f64, anchor: Coord<View>) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let target = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let applied = target / self.scale;
        self.offset_x = anchor.x - (anchor.x - self.offset_x) * applied;
        self.offset_y = anchor.y - (anchor.y - self.offset_y) * applied;
        self.scale = target;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Fits the whole image into the viewport, preserving aspect ratio and
    /// centering the leftover space.
    pub fn fit(&mut self, image: ImageSize, viewport_width: f64, viewport_height: f64) {
        if image.width == 0 || image.height == 0 || viewport_width <= 0.0 || viewport_height <= 0.0
        {
            *self = Self::default();
            return;
        }
        let scale = (viewport_width / image.width_f64())
            .min(viewport_height / image.height_f64())
            .clamp(MIN_SCALE, MAX_SCALE);
        self.scale = scale;
        self.offset_x = (viewport_width - image.width_f64() * scale) / 2.0;
        self.offset_y = (viewport_height - image.height_f64() * scale) / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut view = ViewTransform::default();
        view.pan(15.0, -4.0);
        let anchor = Coord::view(120.0, 80.0);
        let before = view.to_image(anchor);

        view.zoom(1.15, anchor);
        let after = view.to_image(anchor);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        assert!((view.scale() - 1.15).abs() < 1e-12);
    }

    #[test]
    fn fit_centers_letterboxed_image() {
        let mut view = ViewTransform::default();
        view.fit(ImageSize::new(200, 100), 400.0, 400.0);
        assert_eq!(view.scale(), 2.0);
        assert_eq!(view.offset(), (0.0, 100.0));

        let corner = view.to_view(Coord::new(200.0, 100.0));
        assert_eq!((corner.x, corner.y), (400.0, 300.0));
    }

    #[test]
    fn view_and_image_are_inverse() {
        let mut view = ViewTransform::default();
        view.zoom(2.5, Coord::view(10.0, 10.0));
        view.pan(-30.0, 12.0);
        let p = Coord::<Pixel>::new(37.0, 91.0);
        let back = view.to_image(view.to_view(p));
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn invalid_zoom_factor_is_ignored() {
        let mut view = ViewTransform::default();
        view.zoom(0.0, Coord::view(0.0, 0.0));
        view.zoom(f64::NAN, Coord::view(0.0, 0.0));
        assert_eq!(view, ViewTransform::default());
    }
}
