use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::ids::ProjectId;
use super::records::{now_timestamp, ProjectRecord};
use super::{schema, Store};
use crate::error::{EntityKind, InspektError};

impl Store {
    /// Creates an empty project (no labels are seeded) and returns its id.
    pub fn create_project(&self, name: &str, description: &str) -> Result<ProjectId, InspektError> {
        let id = self.write(|tx| {
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO projects (name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, description, now],
            )?;
            Ok(ProjectId::new(tx.last_insert_rowid()))
        })?;
        info!(project = %id, name, "created project");
        Ok(id)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Option<ProjectRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!("SELECT {} FROM projects WHERE id = ?1", ProjectRecord::COLUMNS);
            Ok(tx
                .query_row(&sql, params![id], ProjectRecord::from_row)
                .optional()?)
        })
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!("SELECT {} FROM projects ORDER BY id", ProjectRecord::COLUMNS);
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map([], ProjectRecord::from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Deletes a project together with its labels, images, annotations and
    /// model records.
    pub fn delete_project(&self, id: ProjectId) -> Result<(), InspektError> {
        self.write(|tx| {
            let removed = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(InspektError::unknown(EntityKind::Project, id));
            }
            Ok(())
        })?;
        info!(project = %id, "deleted project");
        Ok(())
    }

    /// The project used when the caller does not name one: the oldest
    /// project, recreated with default labels if every project was deleted.
    pub fn default_project_id(&self) -> Result<ProjectId, InspektError> {
        let existing = self.read(|tx| {
            Ok(tx
                .query_row("SELECT MIN(id) FROM projects", [], |row| {
                    row.get::<_, Option<ProjectId>>(0)
                })?)
        })?;

        match existing {
            Some(id) => Ok(id),
            None => self.write(|tx| {
                let id = schema::ensure_default_project(tx)?;
                schema::ensure_default_labels(tx, id)?;
                Ok(id)
            }),
        }
    }
}

/// Fails with `UnknownReference` unless the project exists.
pub(crate) fn ensure_project(conn: &Connection, id: ProjectId) -> Result<(), InspektError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(InspektError::unknown(EntityKind::Project, id))
    }
}

pub(crate) fn touch_project(conn: &Connection, id: ProjectId) -> Result<(), InspektError> {
    conn.execute(
        "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
        params![now_timestamp(), id],
    )?;
    Ok(())
}
