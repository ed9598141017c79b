//! Per-project counts computed on demand.

use std::fmt;

use rusqlite::params;
use serde::Serialize;

use super::ids::ProjectId;
use super::projects::ensure_project;
use super::Store;
use crate::error::InspektError;

/// Snapshot counts for one project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total_images: usize,
    pub annotated_images: usize,
    pub total_annotations: usize,
    /// Annotations whose label is named `Defect`.
    pub defect_labels: usize,
    /// Annotations whose label is named `Pass`.
    pub pass_labels: usize,
    pub models_count: usize,
    /// Annotation count per label, in label listing order.
    pub labels: Vec<LabelCount>,
}

/// A label name with the number of annotations using it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub name: String,
    pub annotations: usize,
}

impl Store {
    /// Counts images, annotations and models of `project`.
    ///
    /// All counts come from one read transaction, so they never mix states
    /// from before and after a concurrent write.
    pub fn get_project_stats(&self, project: ProjectId) -> Result<ProjectStats, InspektError> {
        self.read(|tx| {
            ensure_project(tx, project)?;

            let count = |sql: &str| -> Result<usize, InspektError> {
                let n: i64 = tx.query_row(sql, params![project], |row| row.get(0))?;
                Ok(n as usize)
            };

            let total_images = count("SELECT COUNT(*) FROM images WHERE project_id = ?1")?;
            let annotated_images =
                count("SELECT COUNT(*) FROM images WHERE project_id = ?1 AND annotated = 1")?;
            let total_annotations = count(
                "SELECT COUNT(*) FROM annotations a JOIN images i ON i.id = a.image_id
                 WHERE i.project_id = ?1",
            )?;
            let models_count = count("SELECT COUNT(*) FROM models WHERE project_id = ?1")?;

            let mut stmt = tx.prepare(
                "SELECT l.name, COUNT(a.id) FROM labels l
                 LEFT JOIN annotations a ON a.class_id = l.id
                 WHERE l.project_id = ?1
                 GROUP BY l.id ORDER BY l.id",
            )?;
            let labels = stmt
                .query_map(params![project], |row| {
                    Ok(LabelCount {
                        name: row.get(0)?,
                        annotations: row.get::<_, i64>(1)? as usize,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let named = |name: &str| -> usize {
                labels
                    .iter()
                    .filter(|l| l.name == name)
                    .map(|l| l.annotations)
                    .sum()
            };

            Ok(ProjectStats {
                total_images,
                annotated_images,
                total_annotations,
                defect_labels: named("Defect"),
                pass_labels: named("Pass"),
                models_count,
                labels,
            })
        })
    }
}

impl fmt::Display for ProjectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "┌─ Project ─────────────────────────────┐")?;
        writeln!(f, "│   Images:          {:>8}           │", self.total_images)?;
        writeln!(f, "│   Annotated:       {:>8}           │", self.annotated_images)?;
        writeln!(f, "│   Annotations:     {:>8}           │", self.total_annotations)?;
        writeln!(f, "│   Defect:          {:>8}           │", self.defect_labels)?;
        writeln!(f, "│   Pass:            {:>8}           │", self.pass_labels)?;
        writeln!(f, "│   Models:          {:>8}           │", self.models_count)?;
        writeln!(f, "└───────────────────────────────────────┘")?;

        if !self.labels.is_empty() {
            writeln!(f)?;
            writeln!(f, "Labels:")?;
            let width = self.labels.iter().map(|l| l.name.len()).max().unwrap_or(0);
            for label in &self.labels {
                writeln!(
                    f,
                    "  {:<width$}  {:>6}",
                    label.name,
                    label.annotations,
                    width = width
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use crate::geometry::NormalizedBox;
    use std::path::Path;

    #[test]
    fn stats_count_by_label_name() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        let defect = store
            .get_label_by_name(project, "Defect")
            .expect("lookup")
            .expect("seeded")
            .id;
        let pass = store
            .get_label_by_name(project, "Pass")
            .expect("lookup")
            .expect("seeded")
            .id;

        let a = store.add_image(Path::new("/d/a.jpg"), project).expect("a");
        store.add_image(Path::new("/d/b.jpg"), project).expect("b");
        let bbox = NormalizedBox::new(0.5, 0.5, 0.2, 0.2);
        store.add_annotation(a, defect, bbox).expect("defect 1");
        store.add_annotation(a, defect, bbox).expect("defect 2");
        store.add_annotation(a, pass, bbox).expect("pass");

        let stats = store.get_project_stats(project).expect("stats");
        assert_eq!(stats.total_images, 2);
        assert_eq!(stats.annotated_images, 1);
        assert_eq!(stats.total_annotations, 3);
        assert_eq!(stats.defect_labels, 2);
        assert_eq!(stats.pass_labels, 1);
        assert_eq!(stats.models_count, 0);
        assert_eq!(
            stats.labels,
            vec![
                LabelCount {
                    name: "Defect".into(),
                    annotations: 2
                },
                LabelCount {
                    name: "Pass".into(),
                    annotations: 1
                },
            ]
        );

        let text = stats.to_string();
        assert!(text.contains("Annotations:"));
        assert!(text.contains("Defect"));
    }

    #[test]
    fn stats_for_unknown_project_fail() {
        let store = Store::open_in_memory().expect("open store");
        let err = store.get_project_stats(ProjectId(404)).unwrap_err();
        assert!(matches!(
            err,
            InspektError::UnknownReference {
                kind: EntityKind::Project,
                id: 404
            }
        ));
    }

    #[test]
    fn empty_project_has_zero_counts() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.create_project("empty", "").expect("project");
        let stats = store.get_project_stats(project).expect("stats");
        assert_eq!(stats, ProjectStats::default());
    }
}
