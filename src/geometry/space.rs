//! Coordinate space marker types.
//!
//! Zero-sized types used as type parameters so that widget and image
//! coordinates cannot be mixed up.

use std::fmt;

/// Marker for image pixel coordinates, origin at the top-left corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker for widget coordinates, before zoom and pan are undone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for View {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
