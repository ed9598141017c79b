use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::ids::{AnnotationId, ImageId, LabelId, ProjectId};
use super::images::refresh_annotated_flag;
use super::projects::touch_project;
use super::records::AnnotationRecord;
use super::Store;
use crate::error::{EntityKind, InspektError};
use crate::geometry::NormalizedBox;

impl Store {
    /// Persists a bounding box and marks its image annotated.
    ///
    /// Geometry is validated before anything touches the database. The
    /// label must belong to the image's project.
    pub fn add_annotation(
        &self,
        image: ImageId,
        label: LabelId,
        bbox: NormalizedBox,
    ) -> Result<AnnotationId, InspektError> {
        bbox.validate()?;

        let id = self.write(|tx| {
            let image_project = image_project(tx, image)?;
            let label_project: ProjectId = tx
                .query_row(
                    "SELECT project_id FROM labels WHERE id = ?1",
                    params![label],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| InspektError::unknown(EntityKind::Label, label))?;
            if label_project != image_project {
                return Err(InspektError::unknown(EntityKind::Label, label));
            }

            tx.execute(
                "INSERT INTO annotations (image_id, class_id, x_center, y_center, width, height)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    image,
                    label,
                    bbox.x_center,
                    bbox.y_center,
                    bbox.width,
                    bbox.height
                ],
            )?;
            let id = AnnotationId::new(tx.last_insert_rowid());
            tx.execute(
                "UPDATE images SET annotated = 1 WHERE id = ?1",
                params![image],
            )?;
            touch_project(tx, image_project)?;
            Ok(id)
        })?;

        debug!(annotation = %id, image = %image, label = %label, "added annotation");
        Ok(id)
    }

    /// Annotations of an image with their label names, in insertion order.
    pub fn get_annotations_for_image(
        &self,
        image: ImageId,
    ) -> Result<Vec<AnnotationRecord>, InspektError> {
        self.read(|tx| annotations_for_image(tx, image))
    }

    pub fn count_annotations_for_image(&self, image: ImageId) -> Result<usize, InspektError> {
        self.read(|tx| {
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM annotations WHERE image_id = ?1",
                params![image],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Removes one annotation and re-derives its image's flag from whatever
    /// annotations remain.
    pub fn delete_annotation(&self, id: AnnotationId) -> Result<(), InspektError> {
        self.write(|tx| {
            let image: ImageId = tx
                .query_row(
                    "SELECT image_id FROM annotations WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| InspektError::unknown(EntityKind::Annotation, id))?;

            tx.execute("DELETE FROM annotations WHERE id = ?1", params![id])?;
            refresh_annotated_flag(tx, image)?;
            let project = image_project(tx, image)?;
            touch_project(tx, project)
        })?;
        debug!(annotation = %id, "deleted annotation");
        Ok(())
    }

    /// Removes every annotation of an image. Returns how many were removed.
    pub fn clear_annotations_for_image(&self, image: ImageId) -> Result<usize, InspektError> {
        self.write(|tx| {
            let project = image_project(tx, image)?;
            let removed = tx.execute(
                "DELETE FROM annotations WHERE image_id = ?1",
                params![image],
            )?;
            tx.execute(
                "UPDATE images SET annotated = 0 WHERE id = ?1",
                params![image],
            )?;
            touch_project(tx, project)?;
            Ok(removed)
        })
    }
}

fn image_project(conn: &Connection, image: ImageId) -> Result<ProjectId, InspektError> {
    conn.query_row(
        "SELECT project_id FROM images WHERE id = ?1",
        params![image],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| InspektError::unknown(EntityKind::Image, image))
}

pub(crate) fn annotations_for_image(
    conn: &Connection,
    image: ImageId,
) -> Result<Vec<AnnotationRecord>, InspektError> {
    let sql = format!(
        "SELECT {} FROM annotations a JOIN labels l ON l.id = a.class_id
         WHERE a.image_id = ?1 ORDER BY a.id",
        AnnotationRecord::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![image], AnnotationRecord::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
