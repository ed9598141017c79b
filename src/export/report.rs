use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// What an export wrote.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub output_dir: PathBuf,
    /// Class names in index order, as written to `classes.txt`.
    pub classes: Vec<String>,
    /// One per annotated image.
    pub label_files: usize,
    pub annotations: usize,
    /// Images without annotations; they get no label file.
    pub skipped_images: usize,
    pub images_copied: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splits: Option<SplitCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

/// Annotated images per split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Exported to {}", self.output_dir.display())?;
        writeln!(f, "  Classes:      {}", self.classes.join(", "))?;
        writeln!(f, "  Label files:  {}", self.label_files)?;
        writeln!(f, "  Annotations:  {}", self.annotations)?;
        writeln!(f, "  Skipped:      {} (no annotations)", self.skipped_images)?;
        if let Some(splits) = &self.splits {
            writeln!(
                f,
                "  Splits:       train {} / val {} / test {}",
                splits.train, splits.val, splits.test
            )?;
            writeln!(f, "  Images copied: {}", self.images_copied)?;
        }
        if let Some(manifest) = &self.manifest {
            writeln!(f, "  Manifest:     {}", manifest.display())?;
        }
        Ok(())
    }
}
