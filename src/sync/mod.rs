//! One-way dataset synchronization: disk to store.
//!
//! Capture pages drop images into the dataset folder (usually under `ok/`
//! and `not_ok/`); the synchronizer registers whatever is new. Rows for
//! files that disappeared are never deleted; [`DatasetSynchronizer::missing_files`]
//! reports them instead.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::SyncOptions;
use crate::error::InspektError;
use crate::store::{ImageRecord, ProjectId, Store};

/// Scans folders for images and registers them with a [`Store`].
#[derive(Debug)]
pub struct DatasetSynchronizer<'a> {
    store: &'a Store,
    options: SyncOptions,
}

impl<'a> DatasetSynchronizer<'a> {
    pub fn new(store: &'a Store, options: SyncOptions) -> Self {
        Self { store, options }
    }

    /// Registers every matching file under `folder` and returns the paths
    /// that were not registered before, sorted.
    ///
    /// A folder that does not exist yields nothing. Calling this again with
    /// no new files on disk changes nothing.
    pub fn scan(&self, folder: &Path, project: ProjectId) -> Result<Vec<PathBuf>, InspektError> {
        if !folder.is_dir() {
            debug!(folder = %folder.display(), "dataset folder missing, nothing to sync");
            return Ok(Vec::new());
        }

        let candidates = self.collect_images(folder)?;
        let inserted = self.store.register_paths(project, &candidates)?;
        info!(
            folder = %folder.display(),
            scanned = candidates.len(),
            new_images = inserted.len(),
            "dataset scan finished"
        );
        Ok(inserted)
    }

    /// Registered images of `project` whose file no longer exists.
    pub fn missing_files(&self, project: ProjectId) -> Result<Vec<ImageRecord>, InspektError> {
        let missing: Vec<ImageRecord> = self
            .store
            .get_all_images(project)?
            .into_iter()
            .filter(|image| !image.path.exists())
            .collect();
        debug!(project = %project, missing = missing.len(), "checked for missing files");
        Ok(missing)
    }

    fn collect_images(&self, folder: &Path) -> Result<Vec<PathBuf>, InspektError> {
        let mut walker = WalkDir::new(folder).follow_links(true);
        if !self.options.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && self.has_image_extension(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn has_image_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.options
            .extensions
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed.trim_start_matches('.')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, b"").expect("write file");
    }

    #[test]
    fn scan_picks_up_new_files_once() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = temp.path();
        touch(&root.join("ok/b.jpg"));
        touch(&root.join("not_ok/a.PNG"));
        touch(&root.join("notes.txt"));

        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let sync = DatasetSynchronizer::new(&store, SyncOptions::default());

        let first = sync.scan(root, project).expect("first scan");
        assert_eq!(
            first,
            vec![root.join("not_ok/a.PNG"), root.join("ok/b.jpg")]
        );
        assert!(sync.scan(root, project).expect("second scan").is_empty());

        touch(&root.join("ok/c.bmp"));
        assert_eq!(
            sync.scan(root, project).expect("third scan"),
            vec![root.join("ok/c.bmp")]
        );
        assert_eq!(store.get_all_images(project).expect("images").len(), 3);
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("top.jpeg"));
        touch(&temp.path().join("ok/nested.jpg"));

        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let options = SyncOptions {
            recursive: false,
            ..SyncOptions::default()
        };
        let found = DatasetSynchronizer::new(&store, options)
            .scan(temp.path(), project)
            .expect("scan");
        assert_eq!(found, vec![temp.path().join("top.jpeg")]);
    }

    #[test]
    fn missing_folder_yields_nothing() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let count = store
            .sync_images_from_folder(Path::new("/no/such/dataset"), project)
            .expect("sync");
        assert_eq!(count, 0);
    }

    #[test]
    fn missing_files_are_reported_not_deleted() {
        let temp = tempfile::tempdir().expect("temp dir");
        let kept = temp.path().join("kept.jpg");
        let gone = temp.path().join("gone.jpg");
        touch(&kept);
        touch(&gone);

        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let sync = DatasetSynchronizer::new(&store, SyncOptions::default());
        sync.scan(temp.path(), project).expect("scan");
        fs::remove_file(&gone).expect("remove");

        let missing = sync.missing_files(project).expect("missing");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path, gone);
        assert!(sync.scan(temp.path(), project).expect("rescan").is_empty());
        assert_eq!(store.get_all_images(project).expect("images").len(), 2);
    }
}
