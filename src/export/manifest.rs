//! `data.yaml` for the training collaborator.
//!
//! Key names are published and must stay stable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InspektError;

pub const MANIFEST_FILE: &str = "data.yaml";

/// Relative split directories plus the class list in index order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataManifest {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: BTreeMap<usize, String>,
}

impl DataManifest {
    pub fn new(root: PathBuf, class_names: &[String]) -> Self {
        Self {
            path: root,
            train: "images/train".to_string(),
            val: "images/val".to_string(),
            test: "images/test".to_string(),
            nc: class_names.len(),
            names: class_names.iter().cloned().enumerate().collect(),
        }
    }

    /// Writes the manifest to `{dir}/data.yaml` and returns that path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, InspektError> {
        let path = dir.join(MANIFEST_FILE);
        let yaml = serde_yaml::to_string(self).map_err(|source| InspektError::ManifestWrite {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, yaml)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_names_by_index() {
        let manifest = DataManifest::new(
            PathBuf::from("/exports/run1"),
            &["Pass".to_string(), "Defect".to_string()],
        );
        let yaml = serde_yaml::to_string(&manifest).expect("serialize");

        assert!(yaml.contains("train: images/train"));
        assert!(yaml.contains("test: images/test"));
        assert!(yaml.contains("nc: 2"));
        assert!(yaml.contains("0: Pass"));
        assert!(yaml.contains("1: Defect"));

        let back: DataManifest = serde_yaml::from_str(&yaml).expect("parse back");
        assert_eq!(back, manifest);
    }

    #[test]
    fn write_creates_data_yaml() {
        let temp = tempfile::tempdir().expect("temp dir");
        let manifest = DataManifest::new(temp.path().to_path_buf(), &["Defect".to_string()]);
        let path = manifest.write(temp.path()).expect("write");
        assert_eq!(path, temp.path().join("data.yaml"));
        assert!(fs::read_to_string(path).expect("read").contains("Defect"));
    }
}
