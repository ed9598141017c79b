use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::ids::{ImageId, ProjectId};
use super::projects::ensure_project;
use super::records::{now_timestamp, ImageRecord};
use super::Store;
use crate::config::SyncOptions;
use crate::error::{EntityKind, InspektError};
use crate::sync::DatasetSynchronizer;

impl Store {
    /// Registers `path` under `project`, or returns the id it already has.
    ///
    /// Paths are unique across the whole store: re-registering a path that
    /// belongs to another project returns that row unchanged.
    pub fn add_image(&self, path: &Path, project: ProjectId) -> Result<ImageId, InspektError> {
        self.write(|tx| {
            ensure_project(tx, project)?;
            let (id, _) = insert_image_if_absent(tx, path, project)?;
            Ok(id)
        })
    }

    /// Batch form of [`add_image`](Self::add_image) used by the synchronizer.
    ///
    /// All paths are registered in one transaction; the returned list holds
    /// only the paths that were not registered before, in input order.
    pub fn register_paths(
        &self,
        project: ProjectId,
        paths: &[PathBuf],
    ) -> Result<Vec<PathBuf>, InspektError> {
        self.write(|tx| {
            ensure_project(tx, project)?;
            let mut inserted = Vec::new();
            for path in paths {
                let (_, is_new) = insert_image_if_absent(tx, path, project)?;
                if is_new {
                    inserted.push(path.clone());
                }
            }
            Ok(inserted)
        })
    }

    pub fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!("SELECT {} FROM images WHERE id = ?1", ImageRecord::COLUMNS);
            Ok(tx
                .query_row(&sql, params![id], ImageRecord::from_row)
                .optional()?)
        })
    }

    pub fn get_image_by_path(&self, path: &Path) -> Result<Option<ImageRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!("SELECT {} FROM images WHERE path = ?1", ImageRecord::COLUMNS);
            Ok(tx
                .query_row(&sql, params![path.to_string_lossy()], ImageRecord::from_row)
                .optional()?)
        })
    }

    /// All images of a project, newest first.
    pub fn get_all_images(&self, project: ProjectId) -> Result<Vec<ImageRecord>, InspektError> {
        self.read(|tx| {
            list_images(
                tx,
                project,
                "WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
            )
        })
    }

    /// Images still waiting for annotation, oldest first.
    pub fn get_unannotated_images(
        &self,
        project: ProjectId,
    ) -> Result<Vec<ImageRecord>, InspektError> {
        self.read(|tx| {
            list_images(
                tx,
                project,
                "WHERE project_id = ?1 AND annotated = 0 ORDER BY created_at ASC, id ASC",
            )
        })
    }

    /// Deletes an image row; its annotations go with it.
    pub fn delete_image(&self, id: ImageId) -> Result<(), InspektError> {
        self.write(|tx| {
            let removed = tx.execute("DELETE FROM images WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(InspektError::unknown(EntityKind::Image, id));
            }
            Ok(())
        })?;
        debug!(image = %id, "deleted image");
        Ok(())
    }

    /// Registers every image found under `folder` and returns how many rows
    /// were actually new.
    pub fn sync_images_from_folder(
        &self,
        folder: &Path,
        project: ProjectId,
    ) -> Result<usize, InspektError> {
        let inserted = DatasetSynchronizer::new(self, SyncOptions::default()).scan(folder, project)?;
        info!(folder = %folder.display(), new_images = inserted.len(), "synced dataset folder");
        Ok(inserted.len())
    }
}

/// Inserts `path` unless it is already registered.
///
/// Returns the row id and whether a new row was created.
pub(crate) fn insert_image_if_absent(
    conn: &Connection,
    path: &Path,
    project: ProjectId,
) -> Result<(ImageId, bool), InspektError> {
    let path_text = path.to_string_lossy();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_text.to_string());

    let inserted = conn.execute(
        "INSERT INTO images (project_id, path, filename, annotated, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)
         ON CONFLICT(path) DO NOTHING",
        params![project, path_text, filename, now_timestamp()],
    )?;
    if inserted == 1 {
        return Ok((ImageId::new(conn.last_insert_rowid()), true));
    }

    let existing: ImageId = conn.query_row(
        "SELECT id FROM images WHERE path = ?1",
        params![path_text],
        |row| row.get(0),
    )?;
    Ok((existing, false))
}

/// Recomputes `annotated` from the image's current annotation rows.
pub(crate) fn refresh_annotated_flag(conn: &Connection, image: ImageId) -> Result<(), InspektError> {
    conn.execute(
        "UPDATE images
         SET annotated = EXISTS(SELECT 1 FROM annotations WHERE image_id = ?1)
         WHERE id = ?1",
        params![image],
    )?;
    Ok(())
}

pub(crate) fn list_images(
    conn: &Connection,
    project: ProjectId,
    filter: &str,
) -> Result<Vec<ImageRecord>, InspektError> {
    let sql = format!("SELECT {} FROM images {filter}", ImageRecord::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![project], ImageRecord::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
