use std::collections::BTreeMap;

use rusqlite::params;

use super::ids::{ImageId, ProjectId};
use super::images::list_images;
use super::labels::list_labels;
use super::projects::ensure_project;
use super::records::{AnnotationRecord, ImageRecord, LabelRecord};
use super::Store;
use crate::error::InspektError;

/// Labels, images and annotations of one project, read in one transaction.
#[derive(Clone, Debug, Default)]
pub struct ProjectSnapshot {
    /// In listing order.
    pub labels: Vec<LabelRecord>,
    /// Ordered by id.
    pub images: Vec<ImageRecord>,
    /// Annotations grouped by image, each group in insertion order.
    pub annotations: BTreeMap<ImageId, Vec<AnnotationRecord>>,
}

impl ProjectSnapshot {
    pub fn annotations_for(&self, image: ImageId) -> &[AnnotationRecord] {
        self.annotations
            .get(&image)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Store {
    /// Reads everything an exporter needs without letting a concurrent
    /// write land halfway through.
    pub fn snapshot(&self, project: ProjectId) -> Result<ProjectSnapshot, InspektError> {
        self.read(|tx| {
            ensure_project(tx, project)?;
            let labels = list_labels(tx, project)?;
            let images = list_images(tx, project, "WHERE project_id = ?1 ORDER BY id")?;

            let sql = format!(
                "SELECT {} FROM annotations a
                 JOIN labels l ON l.id = a.class_id
                 JOIN images i ON i.id = a.image_id
                 WHERE i.project_id = ?1
                 ORDER BY a.image_id, a.id",
                AnnotationRecord::COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![project], AnnotationRecord::from_row)?;

            let mut annotations: BTreeMap<ImageId, Vec<AnnotationRecord>> = BTreeMap::new();
            for row in rows {
                let row = row?;
                annotations.entry(row.image_id).or_default().push(row);
            }

            Ok(ProjectSnapshot {
                labels,
                images,
                annotations,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormalizedBox;
    use std::path::Path;

    #[test]
    fn snapshot_groups_annotations_by_image() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let label = store.get_labels(project).expect("labels")[0].id;
        let a = store.add_image(Path::new("/d/a.jpg"), project).expect("a");
        let b = store.add_image(Path::new("/d/b.jpg"), project).expect("b");
        let bbox = NormalizedBox::new(0.5, 0.5, 0.2, 0.2);
        store.add_annotation(a, label, bbox).expect("ann");
        store.add_annotation(a, label, bbox).expect("ann");

        let snapshot = store.snapshot(project).expect("snapshot");
        assert_eq!(snapshot.labels.len(), 2);
        assert_eq!(snapshot.images.len(), 2);
        assert_eq!(snapshot.annotations_for(a).len(), 2);
        assert!(snapshot.annotations_for(b).is_empty());
    }
}
