use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::ids::{ImageId, LabelId, ProjectId};
use super::images::refresh_annotated_flag;
use super::projects::{ensure_project, touch_project};
use super::records::LabelRecord;
use super::Store;
use crate::error::{EntityKind, InspektError};

impl Store {
    pub fn add_label(
        &self,
        project: ProjectId,
        name: &str,
        color: &str,
    ) -> Result<LabelId, InspektError> {
        self.write(|tx| {
            ensure_project(tx, project)?;
            tx.execute(
                "INSERT INTO labels (project_id, name, color) VALUES (?1, ?2, ?3)",
                params![project, name, color],
            )?;
            Ok(LabelId::new(tx.last_insert_rowid()))
        })
    }

    /// Labels of a project in listing order (ascending id).
    ///
    /// The exporter derives class indices from this order.
    pub fn get_labels(&self, project: ProjectId) -> Result<Vec<LabelRecord>, InspektError> {
        self.read(|tx| list_labels(tx, project))
    }

    pub fn get_label(&self, id: LabelId) -> Result<Option<LabelRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!("SELECT {} FROM labels WHERE id = ?1", LabelRecord::COLUMNS);
            Ok(tx
                .query_row(&sql, params![id], LabelRecord::from_row)
                .optional()?)
        })
    }

    pub fn get_label_by_name(
        &self,
        project: ProjectId,
        name: &str,
    ) -> Result<Option<LabelRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!(
                "SELECT {} FROM labels WHERE project_id = ?1 AND name = ?2 ORDER BY id LIMIT 1",
                LabelRecord::COLUMNS
            );
            Ok(tx
                .query_row(&sql, params![project, name], LabelRecord::from_row)
                .optional()?)
        })
    }

    /// Deletes a label and every annotation that uses it.
    ///
    /// Images that lose their last annotation this way drop their
    /// `annotated` flag in the same transaction. Returns the number of
    /// annotations removed.
    pub fn delete_label(&self, id: LabelId) -> Result<usize, InspektError> {
        let removed = self.write(|tx| {
            let project: ProjectId = tx
                .query_row(
                    "SELECT project_id FROM labels WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| InspektError::unknown(EntityKind::Label, id))?;

            let affected: Vec<ImageId> = {
                let mut stmt =
                    tx.prepare("SELECT DISTINCT image_id FROM annotations WHERE class_id = ?1")?;
                let rows = stmt.query_map(params![id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let removed: i64 = tx.query_row(
                "SELECT COUNT(*) FROM annotations WHERE class_id = ?1",
                params![id],
                |row| row.get(0),
            )?;

            tx.execute("DELETE FROM labels WHERE id = ?1", params![id])?;
            for image in affected {
                refresh_annotated_flag(tx, image)?;
            }
            touch_project(tx, project)?;
            Ok(removed as usize)
        })?;

        info!(label = %id, annotations = removed, "deleted label");
        Ok(removed)
    }
}

pub(crate) fn list_labels(
    conn: &Connection,
    project: ProjectId,
) -> Result<Vec<LabelRecord>, InspektError> {
    let sql = format!(
        "SELECT {} FROM labels WHERE project_id = ?1 ORDER BY id",
        LabelRecord::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![project], LabelRecord::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
