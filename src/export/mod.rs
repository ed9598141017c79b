//! YOLO dataset export.
//!
//! Class indices are positions in `classes.txt`, which follows the store's
//! label listing order. Store label ids are never written. The
//! `label id → index` map is rebuilt on every call from the same snapshot
//! the annotations are read from.
//!
//! Flat layout (default):
//!
//! ```text
//! out/
//!   classes.txt
//!   part_001.txt        # one per annotated image
//! ```
//!
//! Split layout:
//!
//! ```text
//! out/
//!   classes.txt
//!   labels/{train,val,test}/part_001.txt
//!   images/{train,val,test}/part_001.jpg   # with copy_images
//!   data.yaml                              # with manifest
//! ```
//!
//! `data.yaml` names the `images/{split}` directories, so it is only
//! written alongside copied images.

mod manifest;
mod report;

pub use manifest::{DataManifest, MANIFEST_FILE};
pub use report::{ExportReport, SplitCounts};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::InspektError;
use crate::geometry::format_label_line;
use crate::store::{ImageId, ImageRecord, LabelId, ProjectId, ProjectSnapshot, Store};

pub const CLASSES_FILE: &str = "classes.txt";
const LABEL_EXTENSION: &str = "txt";

/// Dataset split an image is exported into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

/// Ratios for the split layout. Whatever `train` and `val` leave over goes
/// to `test`.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitOptions {
    pub train: f64,
    pub val: f64,
    /// Fixed seed for a reproducible shuffle; random when `None`.
    pub seed: Option<u64>,
    /// Copy image files next to their labels.
    pub copy_images: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            seed: None,
            copy_images: false,
        }
    }
}

impl SplitOptions {
    pub fn validate(&self) -> Result<(), InspektError> {
        let ratio_ok = |r: f64| r.is_finite() && (0.0..=1.0).contains(&r);
        if !ratio_ok(self.train) || !ratio_ok(self.val) {
            return Err(InspektError::InvalidSplit {
                message: format!(
                    "ratios must lie in [0, 1], got train={} val={}",
                    self.train, self.val
                ),
            });
        }
        if self.train + self.val > 1.0 + f64::EPSILON {
            return Err(InspektError::InvalidSplit {
                message: format!(
                    "train + val must not exceed 1, got {}",
                    self.train + self.val
                ),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportOptions {
    /// Also write `data.yaml`; requires a split with `copy_images`.
    pub manifest: bool,
    /// Use the split layout instead of the flat one.
    pub split: Option<SplitOptions>,
}

/// Exports `project` to `output_dir` in the flat layout without a manifest.
pub fn export(
    store: &Store,
    output_dir: &Path,
    project: ProjectId,
) -> Result<ExportReport, InspektError> {
    export_yolo(store, output_dir, project, &ExportOptions::default())
}

/// Exports `project` to `output_dir`.
///
/// Images without annotations produce no label file. Every label path is
/// resolved and checked before anything is written: two images that would
/// write the same file, or an image whose label file would replace
/// `classes.txt`, fail the export with `ExportConflict`. Label files and
/// copied images left by a previous export into the same directory are
/// removed, so a missing label file always means "no objects".
pub fn export_yolo(
    store: &Store,
    output_dir: &Path,
    project: ProjectId,
    opts: &ExportOptions,
) -> Result<ExportReport, InspektError> {
    if let Some(split) = &opts.split {
        split.validate()?;
    }
    let copy_images = opts.split.as_ref().is_some_and(|s| s.copy_images);
    if opts.manifest && !copy_images {
        return Err(InspektError::InvalidSplit {
            message: format!(
                "{MANIFEST_FILE} points at images/{{train,val,test}}, \
                 which only the split layout with copied images writes"
            ),
        });
    }

    let snapshot = store.snapshot(project)?;
    let class_index = class_index_map(&snapshot);
    let classes: Vec<String> = snapshot.labels.iter().map(|l| l.name.clone()).collect();

    let annotated: Vec<&ImageRecord> = snapshot
        .images
        .iter()
        .filter(|image| !snapshot.annotations_for(image.id).is_empty())
        .collect();
    let assignments = match &opts.split {
        Some(split) => assign_splits(&annotated, split),
        None => annotated.iter().map(|image| (*image, None)).collect(),
    };
    let planned = plan_label_files(output_dir, &snapshot, &class_index, assignments, project)?;

    fs::create_dir_all(output_dir)?;
    remove_previous_export(output_dir)?;
    fs::write(output_dir.join(CLASSES_FILE), classes_file_contents(&classes))?;
    if opts.split.is_some() {
        for split in Split::ALL {
            fs::create_dir_all(output_dir.join("labels").join(split.as_str()))?;
            if copy_images {
                fs::create_dir_all(output_dir.join("images").join(split.as_str()))?;
            }
        }
    }

    let mut report = ExportReport {
        output_dir: output_dir.to_path_buf(),
        skipped_images: snapshot.images.len() - annotated.len(),
        splits: opts.split.as_ref().map(|_| SplitCounts::default()),
        ..Default::default()
    };

    for label in planned {
        fs::write(&label.path, &label.contents)?;
        report.label_files += 1;
        report.annotations += label.annotations;

        if let Some(split) = label.split {
            if let Some(counts) = report.splits.as_mut() {
                match split {
                    Split::Train => counts.train += 1,
                    Split::Val => counts.val += 1,
                    Split::Test => counts.test += 1,
                }
            }
            if copy_images {
                let target = output_dir
                    .join("images")
                    .join(split.as_str())
                    .join(&label.image.filename);
                fs::copy(&label.image.path, target)?;
                report.images_copied += 1;
            }
        }
    }

    if opts.manifest {
        let root = fs::canonicalize(output_dir)?;
        report.manifest = Some(DataManifest::new(root, &classes).write(output_dir)?);
    }

    report.classes = classes;
    info!(
        output = %output_dir.display(),
        label_files = report.label_files,
        annotations = report.annotations,
        "export finished"
    );
    Ok(report)
}

/// One label file, fully rendered but not yet written.
struct PlannedLabel<'a> {
    image: &'a ImageRecord,
    split: Option<Split>,
    path: PathBuf,
    contents: String,
    annotations: usize,
}

fn plan_label_files<'a>(
    output_dir: &Path,
    snapshot: &ProjectSnapshot,
    class_index: &HashMap<LabelId, usize>,
    assignments: Vec<(&'a ImageRecord, Option<Split>)>,
    project: ProjectId,
) -> Result<Vec<PlannedLabel<'a>>, InspektError> {
    let mut planned = Vec::with_capacity(assignments.len());
    let mut claimed: HashMap<PathBuf, ImageId> = HashMap::new();

    for (image, split) in assignments {
        let path = label_path_for(output_dir, image, split);
        if split.is_none() && is_classes_file(&path) {
            return Err(InspektError::ExportConflict {
                path,
                message: format!(
                    "label file of image {} would replace {CLASSES_FILE}",
                    image.id
                ),
            });
        }
        if let Some(previous) = claimed.insert(path.clone(), image.id) {
            return Err(InspektError::ExportConflict {
                path,
                message: format!(
                    "images {} and {} share the file stem '{}'",
                    previous,
                    image.id,
                    image.stem()
                ),
            });
        }

        let annotations = snapshot.annotations_for(image.id);
        let mut contents = String::new();
        for annotation in annotations {
            let index = class_index.get(&annotation.class_id).copied().ok_or_else(|| {
                InspektError::CorruptRow {
                    message: format!(
                        "annotation {} uses label {} outside project {}",
                        annotation.id, annotation.class_id, project
                    ),
                }
            })?;
            contents.push_str(&format_label_line(index, &annotation.bbox));
            contents.push('\n');
        }

        planned.push(PlannedLabel {
            image,
            split,
            path,
            contents,
            annotations: annotations.len(),
        });
    }
    Ok(planned)
}

// Case-insensitive filesystems treat `Classes.txt` as the same file.
fn is_classes_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(CLASSES_FILE))
}

/// Deletes what an earlier export into `output_dir` wrote.
///
/// Only directories that hold a `classes.txt` are treated as earlier
/// exports. Removes top-level `*.txt` label files, the manifest, and the
/// files under `labels/{split}/` and `images/{split}/`.
fn remove_previous_export(output_dir: &Path) -> Result<(), InspektError> {
    if !output_dir.join(CLASSES_FILE).is_file() {
        return Ok(());
    }

    let mut removed = 0usize;
    for entry in WalkDir::new(output_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        let is_label = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(LABEL_EXTENSION));
        let is_manifest = entry.file_name() == MANIFEST_FILE;
        if entry.file_type().is_file() && (is_label || is_manifest) {
            fs::remove_file(path)?;
            removed += 1;
        }
    }

    for split in Split::ALL {
        for root in ["labels", "images"] {
            let dir = output_dir.join(root).join(split.as_str());
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
        }
    }

    debug!(output = %output_dir.display(), removed, "cleared previous export");
    Ok(())
}

/// `label id → class index`, indices following the label listing order.
pub fn class_index_map(snapshot: &ProjectSnapshot) -> HashMap<LabelId, usize> {
    snapshot
        .labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.id, idx))
        .collect()
}

fn classes_file_contents(classes: &[String]) -> String {
    let mut out = String::new();
    for name in classes {
        out.push_str(name);
        out.push('\n');
    }
    out
}

fn label_path_for(output_dir: &Path, image: &ImageRecord, split: Option<Split>) -> PathBuf {
    let file = format!("{}.{LABEL_EXTENSION}", image.stem());
    match split {
        Some(split) => output_dir.join("labels").join(split.as_str()).join(file),
        None => output_dir.join(file),
    }
}

/// Shuffles images (ordered by id first) and cuts them by ratio.
fn assign_splits<'a>(
    images: &[&'a ImageRecord],
    opts: &SplitOptions,
) -> Vec<(&'a ImageRecord, Option<Split>)> {
    let mut shuffled: Vec<&ImageRecord> = images.to_vec();
    shuffled.sort_by_key(|image| image.id);
    if let Some(seed) = opts.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        shuffled.shuffle(&mut rng);
    }

    let total = shuffled.len();
    let n_train = ((total as f64 * opts.train).round() as usize).min(total);
    let n_val = ((total as f64 * opts.val).round() as usize).min(total - n_train);

    shuffled
        .into_iter()
        .enumerate()
        .map(|(idx, image)| {
            let split = if idx < n_train {
                Split::Train
            } else if idx < n_train + n_val {
                Split::Val
            } else {
                Split::Test
            };
            (image, Some(split))
        })
        .collect()
}
