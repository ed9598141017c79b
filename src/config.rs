//! Runtime configuration and defaults.
//!
//! The CLI fills these from flags, falling back to `INSPEKTLINE_*`
//! environment variables; library callers construct them directly.

use std::path::PathBuf;
use std::time::Duration;

/// Database file used when nothing else is configured.
pub const DEFAULT_DB_PATH: &str = "storage/inspektline.db";

/// Folder the capture pages write into and the synchronizer scans.
pub const DEFAULT_DATASET_DIR: &str = "storage/dataset";

/// How long a store call may wait on a lock before failing with `Busy`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Image extensions picked up by the synchronizer, compared case-insensitively.
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Rectangles with a side shorter than this many pixels are treated as
/// accidental clicks.
pub const DEFAULT_MIN_BOX_PX: f64 = 10.0;

/// Where the store lives and how long it waits for locks.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

/// Folder-scan behavior for the dataset synchronizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub extensions: Vec<String>,
    /// Descend into sub-folders such as `ok/` and `not_ok/`.
    pub recursive: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            recursive: true,
        }
    }
}

/// Interaction tuning for the annotation canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasOptions {
    pub min_box_px: f64,
    /// Scale factor applied per wheel step.
    pub zoom_step: f64,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            min_box_px: DEFAULT_MIN_BOX_PX,
            zoom_step: 1.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.path, PathBuf::from("storage/inspektline.db"));
        assert_eq!(config.busy_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_timeout() {
        let config = StoreConfig::new("x.db").with_busy_timeout(Duration::from_millis(250));
        assert_eq!(config.path, PathBuf::from("x.db"));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn sync_defaults_match_capture_formats() {
        let opts = SyncOptions::default();
        assert_eq!(opts.extensions, vec!["jpg", "jpeg", "png", "bmp"]);
        assert!(opts.recursive);
    }
}
