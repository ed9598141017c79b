//! Persistent project store.
//!
//! SQLite holds projects, labels, images, annotations and model records.
//! One connection sits behind a writer mutex: every mutation runs as an
//! `IMMEDIATE` transaction, and every read that spans tables runs inside a
//! transaction too, so nothing observes an annotation without its image's
//! `annotated` flag update.
//!
//! Relationships are enforced by SQLite itself (`ON DELETE CASCADE` with
//! `foreign_keys=ON`); a crash mid-delete cannot leave orphans.

mod annotations;
mod ids;
mod images;
mod labels;
mod models;
mod projects;
mod records;
pub mod schema;
mod snapshot;
mod stats;

pub use ids::{AnnotationId, ImageId, LabelId, ModelId, ProjectId};
pub use records::{
    AnnotationRecord, ImageRecord, LabelRecord, ModelRecord, ModelType, NewModel, ProjectRecord,
};
pub use snapshot::ProjectSnapshot;
pub use stats::{LabelCount, ProjectStats};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use crate::config::{StoreConfig, DEFAULT_BUSY_TIMEOUT};
use crate::error::InspektError;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Handle to the project database. Cheap to clone; clones share the
/// connection and its writer lock.
#[derive(Debug, Clone)]
pub struct Store {
    connection: Arc<Mutex<Connection>>,
    busy_timeout: Duration,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens (or creates) the database described by `config`.
    ///
    /// Creates missing parent directories, the schema, the default project
    /// and its default labels.
    pub fn open(config: &StoreConfig) -> Result<Self, InspektError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        schema::configure_connection(&conn, config.busy_timeout, true)?;
        let store = Self::from_connection(conn, config.busy_timeout, Some(config.path.clone()))?;
        info!(path = %config.path.display(), "opened project store");
        Ok(store)
    }

    /// Opens a private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, InspektError> {
        let conn = Connection::open_in_memory()?;
        schema::configure_connection(&conn, DEFAULT_BUSY_TIMEOUT, false)?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT, None)
    }

    fn from_connection(
        conn: Connection,
        busy_timeout: Duration,
        path: Option<PathBuf>,
    ) -> Result<Self, InspektError> {
        let store = Self {
            connection: Arc::new(Mutex::new(conn)),
            busy_timeout,
            path,
        };
        store.write(|tx| {
            schema::initialize_schema(tx)?;
            let project = schema::ensure_default_project(tx)?;
            schema::ensure_default_labels(tx, project)
        })?;
        Ok(store)
    }

    /// Database file backing this store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Highest applied schema version.
    pub fn schema_version(&self) -> Result<Option<u32>, InspektError> {
        self.read(|tx| schema::current_version(tx))
    }

    /// Runs `f` inside an `IMMEDIATE` transaction under the writer lock.
    ///
    /// The transaction commits only if `f` succeeds; any error rolls back
    /// every statement `f` issued.
    pub(crate) fn write<T, F>(&self, f: F) -> Result<T, InspektError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, InspektError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Runs `f` inside a read transaction, giving it a consistent snapshot.
    pub(crate) fn read<T, F>(&self, f: F) -> Result<T, InspektError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, InspektError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        // Read-only: dropping the transaction rolls it back.
        f(&tx)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, InspektError> {
        let deadline = Instant::now() + self.busy_timeout;
        loop {
            match self.connection.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(InspektError::Busy {
                            message: format!(
                                "store lock not acquired within {:?}",
                                self.busy_timeout
                            ),
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(TryLockError::Poisoned(err)) => {
                    return Err(InspektError::LockPoisoned {
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}
