//! Schema creation, connection pragmas and default seeding.

use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::ids::ProjectId;
use super::records::now_timestamp;
use crate::error::InspektError;

/// Latest schema version this build knows how to create.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_PROJECT_NAME: &str = "Default Project";
pub const DEFAULT_PROJECT_DESCRIPTION: &str = "Default inspection project";

/// Labels seeded into the default project when it has none: (name, color).
pub const DEFAULT_LABELS: [(&str, &str); 2] = [("Defect", "#ff4444"), ("Pass", "#44cc44")];

/// Applies per-connection pragmas.
///
/// `foreign_keys` is off by default in SQLite and every cascade in the
/// schema depends on it.
pub(crate) fn configure_connection(
    conn: &Connection,
    busy_timeout: Duration,
    file_backed: bool,
) -> Result<(), InspektError> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    if file_backed {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "configured sqlite journal");
    }
    Ok(())
}

/// Creates all tables if they do not exist and records the schema version.
pub(crate) fn initialize_schema(conn: &Connection) -> Result<(), InspektError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS labels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            path TEXT NOT NULL UNIQUE,
            filename TEXT NOT NULL,
            annotated INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            x_center REAL NOT NULL,
            y_center REAL NOT NULL,
            width REAL NOT NULL,
            height REAL NOT NULL,
            FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE,
            FOREIGN KEY (class_id) REFERENCES labels(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            model_type TEXT NOT NULL,
            metrics TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_labels_project ON labels(project_id);
        CREATE INDEX IF NOT EXISTS idx_images_project ON images(project_id);
        CREATE INDEX IF NOT EXISTS idx_annotations_image ON annotations(image_id);
        CREATE INDEX IF NOT EXISTS idx_annotations_class ON annotations(class_id);
        CREATE INDEX IF NOT EXISTS idx_models_project ON models(project_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        params![SCHEMA_VERSION, now_timestamp()],
    )?;

    Ok(())
}

/// Returns the highest applied schema version, if any.
pub(crate) fn current_version(conn: &Connection) -> Result<Option<u32>, InspektError> {
    let version = conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get::<_, Option<u32>>(0)
    })?;
    Ok(version)
}

/// Returns the default (lowest-id) project, creating it if the store has none.
pub(crate) fn ensure_default_project(conn: &Connection) -> Result<ProjectId, InspektError> {
    let existing: Option<ProjectId> = conn
        .query_row("SELECT MIN(id) FROM projects", [], |row| row.get(0))
        .optional()?
        .flatten();

    if let Some(id) = existing {
        return Ok(id);
    }

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO projects (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![DEFAULT_PROJECT_NAME, DEFAULT_PROJECT_DESCRIPTION, now],
    )?;
    let id = ProjectId::new(conn.last_insert_rowid());
    info!(project = %id, "created default project");
    Ok(id)
}

/// Seeds the default labels into `project` if it has no labels at all.
pub(crate) fn ensure_default_labels(
    conn: &Connection,
    project: ProjectId,
) -> Result<(), InspektError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM labels WHERE project_id = ?1",
        params![project],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Ok(());
    }

    for (name, color) in DEFAULT_LABELS {
        conn.execute(
            "INSERT INTO labels (project_id, name, color) VALUES (?1, ?2, ?3)",
            params![project, name, color],
        )?;
    }
    info!(project = %project, "seeded default labels");
    Ok(())
}
