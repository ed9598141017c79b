//! Annotation canvas interaction protocol.
//!
//! An [`AnnotationCanvas`] is bound to one image at a time. It turns
//! `press → move* → release` gestures into proposed annotations and
//! selection/delete gestures into requests, and renders whatever overlay
//! list the host hands back. It never talks to the store: the host persists
//! proposals and pushes confirmed state through [`CanvasCommand`]s.
//!
//! ```
//! use inspektline::canvas::{AnnotationCanvas, CanvasEvent};
//! use inspektline::geometry::{Coord, ImageSize};
//! use inspektline::store::LabelId;
//!
//! let mut canvas = AnnotationCanvas::default();
//! canvas.bind_size(ImageSize::new(200, 100));
//! canvas.set_current_class(Some(LabelId(1)));
//!
//! canvas.press(Coord::view(10.0, 10.0));
//! canvas.move_to(Coord::view(30.0, 20.0));
//! match canvas.release(Coord::view(50.0, 30.0)) {
//!     Some(CanvasEvent::AnnotationProposed { class_id, bbox }) => {
//!         assert_eq!(class_id, LabelId(1));
//!         assert!((bbox.x_center - 0.15).abs() < 1e-12);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod view;

pub use view::ViewTransform;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CanvasOptions;
use crate::error::InspektError;
use crate::geometry::{to_normalized, BBoxXYXY, Coord, ImageSize, NormalizedBox, Pixel, View};
use crate::store::{AnnotationId, AnnotationRecord, LabelId};

/// The image a canvas is bound to.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedImage {
    /// `None` for buffers handed over in memory.
    pub path: Option<PathBuf>,
    pub size: ImageSize,
}

/// A confirmed annotation as the canvas renders it.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub annotation_id: AnnotationId,
    pub class_id: LabelId,
    pub class_name: String,
    pub color: String,
    pub bbox: NormalizedBox,
}

impl Overlay {
    pub fn from_record(record: &AnnotationRecord, color: impl Into<String>) -> Self {
        Self {
            annotation_id: record.id,
            class_id: record.class_id,
            class_name: record.class_name.clone(),
            color: color.into(),
            bbox: record.bbox,
        }
    }
}

/// Outbound notifications for the host.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    /// A finished rectangle the host should persist.
    AnnotationProposed { class_id: LabelId, bbox: NormalizedBox },
    /// The user deleted a selected overlay. It is already hidden; the host
    /// still has to delete it from the store.
    AnnotationDeleteRequested { annotation_id: AnnotationId },
    AnnotationSelected { annotation_id: AnnotationId },
}

/// Inbound instructions from the host.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasCommand {
    LoadImage(PathBuf),
    ApplyAnnotations(Vec<Overlay>),
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    class_id: LabelId,
    anchor: Coord<Pixel>,
    current: Coord<Pixel>,
}

/// Gesture state machine for drawing, selecting and deleting boxes.
#[derive(Clone, Debug, Default)]
pub struct AnnotationCanvas {
    image: Option<LoadedImage>,
    overlays: Vec<Overlay>,
    drag: Option<Drag>,
    selected: Option<AnnotationId>,
    current_class: Option<LabelId>,
    view: ViewTransform,
    options: CanvasOptions,
}

impl AnnotationCanvas {
    pub fn new(options: CanvasOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn handle(&mut self, command: CanvasCommand) -> Result<(), InspektError> {
        match command {
            CanvasCommand::LoadImage(path) => self.load(&path),
            CanvasCommand::ApplyAnnotations(overlays) => {
                self.apply_annotations(overlays);
                Ok(())
            }
        }
    }

    /// Binds the canvas to the image at `path`.
    ///
    /// Only the header is decoded. On failure the canvas keeps its previous
    /// image, overlays and selection.
    pub fn load(&mut self, path: &Path) -> Result<(), InspektError> {
        let dims = imagesize::size(path).map_err(|source| InspektError::DecodeFailure {
            path: path.to_path_buf(),
            source,
        })?;
        let size = checked_size(path, dims)?;
        self.bind(LoadedImage {
            path: Some(path.to_path_buf()),
            size,
        });
        Ok(())
    }

    /// Binds the canvas to an encoded image buffer, e.g. a fresh capture.
    pub fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<(), InspektError> {
        let origin = Path::new("<memory>");
        let dims = imagesize::blob_size(bytes).map_err(|source| InspektError::DecodeFailure {
            path: origin.to_path_buf(),
            source,
        })?;
        let size = checked_size(origin, dims)?;
        self.bind(LoadedImage { path: None, size });
        Ok(())
    }

    /// Binds to an image of known size without decoding anything.
    pub fn bind_size(&mut self, size: ImageSize) {
        self.bind(LoadedImage { path: None, size });
    }

    fn bind(&mut self, image: LoadedImage) {
        debug!(width = image.size.width, height = image.size.height, "canvas bound to image");
        self.image = Some(image);
        self.overlays.clear();
        self.drag = None;
        self.selected = None;
        self.view = ViewTransform::default();
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn current_class(&self) -> Option<LabelId> {
        self.current_class
    }

    /// Class given to rectangles drawn from now on.
    pub fn set_current_class(&mut self, class_id: Option<LabelId>) {
        self.current_class = class_id;
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    /// Zooms by `steps` wheel notches around `anchor`; negative zooms out.
    pub fn zoom_steps(&mut self, steps: i32, anchor: Coord<View>) {
        self.view.zoom(self.options.zoom_step.powi(steps), anchor);
    }

    /// The rectangle being drawn, in image pixels.
    pub fn candidate(&self) -> Option<BBoxXYXY<Pixel>> {
        self.drag
            .map(|drag| BBoxXYXY::from_corners(drag.anchor, drag.current))
    }

    /// Starts a gesture.
    ///
    /// Over an overlay this selects the topmost one. Elsewhere inside the
    /// image it clears the selection and, when a class is set, anchors a new
    /// rectangle. Ignored while a drag is active or outside the image.
    pub fn press(&mut self, point: Coord<View>) -> Option<CanvasEvent> {
        if self.drag.is_some() {
            return None;
        }
        let size = self.image.as_ref()?.size;
        let pixel = self.view.to_image(point);
        let bounds = BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, size.width_f64(), size.height_f64());
        if !pixel.is_finite() || !bounds.contains(pixel) {
            return None;
        }

        if let Some(hit) = self
            .overlays
            .iter()
            .rev()
            .find(|overlay| overlay.bbox.to_pixel_bbox(size).contains(pixel))
        {
            let annotation_id = hit.annotation_id;
            self.selected = Some(annotation_id);
            return Some(CanvasEvent::AnnotationSelected { annotation_id });
        }

        self.selected = None;
        let class_id = self.current_class?;
        self.drag = Some(Drag {
            class_id,
            anchor: pixel,
            current: pixel,
        });
        None
    }

    /// Moves the candidate's free corner, clamped to the image. Non-finite
    /// points are ignored.
    pub fn move_to(&mut self, point: Coord<View>) {
        let Some(size) = self.image.as_ref().map(|image| image.size) else {
            return;
        };
        let Some(pixel) = self.clamp_to_image(point, size) else {
            return;
        };
        if let Some(drag) = self.drag.as_mut() {
            drag.current = pixel;
        }
    }

    /// Finishes the gesture.
    ///
    /// Rectangles with a side shorter than the minimum box size are
    /// dropped, as is the candidate of a non-finite release point; anything
    /// else becomes an [`CanvasEvent::AnnotationProposed`].
    pub fn release(&mut self, point: Coord<View>) -> Option<CanvasEvent> {
        let mut drag = self.drag.take()?;
        let size = self.image.as_ref()?.size;
        let Some(pixel) = self.clamp_to_image(point, size) else {
            debug!("discarded rectangle released at a non-finite point");
            return None;
        };
        drag.current = pixel;

        let rect = BBoxXYXY::from_corners(drag.anchor, drag.current);
        if rect.width() < self.options.min_box_px || rect.height() < self.options.min_box_px {
            debug!(
                width = rect.width(),
                height = rect.height(),
                "discarded rectangle below minimum size"
            );
            return None;
        }

        Some(CanvasEvent::AnnotationProposed {
            class_id: drag.class_id,
            bbox: to_normalized(&rect, size),
        })
    }

    /// Abandons an in-progress rectangle.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Hides the selected overlay and asks the host to delete it.
    pub fn delete_selected(&mut self) -> Option<CanvasEvent> {
        let annotation_id = self.selected.take()?;
        self.overlays
            .retain(|overlay| overlay.annotation_id != annotation_id);
        Some(CanvasEvent::AnnotationDeleteRequested { annotation_id })
    }

    /// Renders one overlay the host has just persisted.
    pub fn confirm_annotation(&mut self, overlay: Overlay) {
        match self
            .overlays
            .iter_mut()
            .find(|existing| existing.annotation_id == overlay.annotation_id)
        {
            Some(existing) => *existing = overlay,
            None => self.overlays.push(overlay),
        }
    }

    /// Replaces the overlay list with confirmed store state.
    pub fn apply_annotations(&mut self, overlays: Vec<Overlay>) {
        self.overlays = overlays;
        if let Some(selected) = self.selected {
            if !self
                .overlays
                .iter()
                .any(|overlay| overlay.annotation_id == selected)
            {
                self.selected = None;
            }
        }
    }

    fn clamp_to_image(&self, point: Coord<View>, size: ImageSize) -> Option<Coord<Pixel>> {
        let pixel = self.view.to_image(point);
        pixel
            .is_finite()
            .then(|| pixel.clamped(size.width_f64(), size.height_f64()))
    }
}

fn checked_size(path: &Path, dims: imagesize::ImageSize) -> Result<ImageSize, InspektError> {
    match (u32::try_from(dims.width), u32::try_from(dims.height)) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok(ImageSize::new(width, height)),
        _ => Err(InspektError::DecodeFailure {
            path: path.to_path_buf(),
            source: imagesize::ImageError::CorruptedImage,
        }),
    }
}
