use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::geometry::GeometryViolation;

/// The kind of store entity a reference points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Label,
    Image,
    Annotation,
    Model,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "project",
            EntityKind::Label => "label",
            EntityKind::Image => "image",
            EntityKind::Annotation => "annotation",
            EntityKind::Model => "model",
        };
        f.write_str(name)
    }
}

/// The main error type for inspektline operations.
#[derive(Debug, Error)]
pub enum InspektError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Lock contention outlasted the configured wait. Callers retry.
    #[error("Store busy: {message}")]
    Busy { message: String },

    #[error("Invalid annotation geometry: {0}")]
    InvalidGeometry(#[from] GeometryViolation),

    #[error("Unknown {kind} reference: {id}")]
    UnknownReference { kind: EntityKind, id: i64 },

    #[error("Failed to decode image {path}: {source}")]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to write dataset manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export conflict at {path}: {message}")]
    ExportConflict { path: PathBuf, message: String },

    #[error("Invalid export split: {message}")]
    InvalidSplit { message: String },

    #[error("Corrupt store row: {message}")]
    CorruptRow { message: String },

    #[error("Store lock poisoned: {message}")]
    LockPoisoned { message: String },
}

impl InspektError {
    pub(crate) fn unknown(kind: EntityKind, id: impl Into<i64>) -> Self {
        InspektError::UnknownReference {
            kind,
            id: id.into(),
        }
    }

    /// Returns true for errors the interactive host should retry.
    pub fn is_busy(&self) -> bool {
        matches!(self, InspektError::Busy { .. })
    }
}

impl From<rusqlite::Error> for InspektError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                InspektError::Busy {
                    message: err.to_string(),
                }
            }
            _ => match err {
                rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                    InspektError::CorruptRow {
                        message: format!("column {column}: {source}"),
                    }
                }
                other => InspektError::Database(other),
            },
        }
    }
}

/// A label-file line that could not be parsed.
///
/// Never propagated as an error: the tolerant parser logs it and moves on.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct MalformedLine {
    pub line: usize,
    pub message: String,
}
