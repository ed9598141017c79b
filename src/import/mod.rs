//! Loading existing YOLO label files into the store.
//!
//! Class indices are resolved against the project's label listing order,
//! the same order the exporter writes, so an export followed by an import
//! into an empty copy of the project reproduces the annotations.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::InspektError;
use crate::geometry::{parse_label_lines, NormalizedBox};
use crate::store::{ImageRecord, LabelId, ProjectId, Store};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Directory holding `{stem}.txt` files. When `None`, each image's
    /// label file is expected next to it.
    pub labels_dir: Option<PathBuf>,
    /// Clear an image's annotations before importing its label file.
    pub replace: bool,
}

/// What an import did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub images_scanned: usize,
    pub label_files: usize,
    pub annotations_added: usize,
    pub annotations_cleared: usize,
    /// Lines whose class index has no label at that position.
    pub unknown_class: usize,
    /// Lines whose box failed store validation.
    pub invalid_geometry: usize,
    /// Lines matching an annotation the image already had.
    pub already_present: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Imported label files")?;
        writeln!(f, "  Images scanned:    {}", self.images_scanned)?;
        writeln!(f, "  Label files:       {}", self.label_files)?;
        writeln!(f, "  Annotations added: {}", self.annotations_added)?;
        if self.annotations_cleared > 0 {
            writeln!(f, "  Replaced:          {}", self.annotations_cleared)?;
        }
        if self.already_present > 0 {
            writeln!(f, "  Already stored:    {}", self.already_present)?;
        }
        if self.unknown_class > 0 || self.invalid_geometry > 0 {
            writeln!(
                f,
                "  Skipped lines:     {} unknown class, {} invalid geometry",
                self.unknown_class, self.invalid_geometry
            )?;
        }
        Ok(())
    }
}

/// Imports label files for every image of `project`.
///
/// Without `replace`, a line that matches an annotation the image already
/// has (same label, box equal up to the six-decimal rounding of the file)
/// is counted in `already_present` instead of being stored again, so
/// importing the same files twice adds nothing. Each existing annotation
/// absorbs at most one line.
///
/// The per-image clear and the per-line inserts are separate store
/// transactions; an error part way through leaves the images handled so
/// far imported.
pub fn import_yolo_labels(
    store: &Store,
    project: ProjectId,
    opts: &ImportOptions,
) -> Result<ImportReport, InspektError> {
    let labels = store.get_labels(project)?;
    let images = store.get_all_images(project)?;
    let mut report = ImportReport {
        images_scanned: images.len(),
        ..Default::default()
    };

    for image in &images {
        let label_path = label_path_for(image, opts);
        let content = match fs::read_to_string(&label_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        report.label_files += 1;

        let mut existing: Vec<(LabelId, NormalizedBox)> = if opts.replace {
            report.annotations_cleared += store.clear_annotations_for_image(image.id)?;
            Vec::new()
        } else {
            store
                .get_annotations_for_image(image.id)?
                .into_iter()
                .map(|row| (row.class_id, row.bbox))
                .collect()
        };

        for line in parse_label_lines(&content, &label_path) {
            let Some(label) = labels.get(line.class_index) else {
                warn!(
                    path = %label_path.display(),
                    class_index = line.class_index,
                    "no label at class index, line skipped"
                );
                report.unknown_class += 1;
                continue;
            };

            if let Some(pos) = existing
                .iter()
                .position(|(class_id, bbox)| *class_id == label.id && same_box(bbox, &line.bbox))
            {
                existing.swap_remove(pos);
                report.already_present += 1;
                continue;
            }

            match store.add_annotation(image.id, label.id, line.bbox) {
                Ok(_) => report.annotations_added += 1,
                Err(InspektError::InvalidGeometry(violation)) => {
                    warn!(path = %label_path.display(), %violation, "invalid box, line skipped");
                    report.invalid_geometry += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    info!(
        project = %project,
        label_files = report.label_files,
        annotations = report.annotations_added,
        "import finished"
    );
    Ok(report)
}

// Label files carry six decimals, so a re-read box is within 5e-7 of the
// stored one.
fn same_box(a: &NormalizedBox, b: &NormalizedBox) -> bool {
    const TOLERANCE: f64 = 5e-7 + 1e-12;
    [
        (a.x_center, b.x_center),
        (a.y_center, b.y_center),
        (a.width, b.width),
        (a.height, b.height),
    ]
    .iter()
    .all(|(x, y)| (x - y).abs() <= TOLERANCE)
}

fn label_path_for(image: &ImageRecord, opts: &ImportOptions) -> PathBuf {
    match &opts.labels_dir {
        Some(dir) => dir.join(format!("{}.txt", image.stem())),
        None => image.path.with_extension("txt"),
    }
}
