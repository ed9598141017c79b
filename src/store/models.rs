use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::ids::{ModelId, ProjectId};
use super::projects::ensure_project;
use super::records::{now_timestamp, ModelRecord, NewModel};
use super::Store;
use crate::error::InspektError;

impl Store {
    /// Records a trained model. Model rows are append-only.
    pub fn add_model(&self, project: ProjectId, model: &NewModel) -> Result<ModelId, InspektError> {
        let metrics = serde_json::to_string(&model.metrics)?;
        let id = self.write(|tx| {
            ensure_project(tx, project)?;
            tx.execute(
                "INSERT INTO models (project_id, name, path, model_type, metrics, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project,
                    model.name,
                    model.path.to_string_lossy(),
                    model.model_type,
                    metrics,
                    now_timestamp()
                ],
            )?;
            Ok(ModelId::new(tx.last_insert_rowid()))
        })?;
        info!(model = %id, name = %model.name, kind = %model.model_type, "recorded model");
        Ok(id)
    }

    /// Models of a project, newest first.
    pub fn get_models(&self, project: ProjectId) -> Result<Vec<ModelRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!(
                "SELECT {} FROM models WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
                ModelRecord::COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![project], ModelRecord::from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn get_latest_model(&self, project: ProjectId) -> Result<Option<ModelRecord>, InspektError> {
        self.read(|tx| {
            let sql = format!(
                "SELECT {} FROM models WHERE project_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                ModelRecord::COLUMNS
            );
            Ok(tx
                .query_row(&sql, params![project], ModelRecord::from_row)
                .optional()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ModelType;
    use serde_json::json;
    use std::path::PathBuf;

    fn model(name: &str) -> NewModel {
        NewModel {
            name: name.to_string(),
            path: PathBuf::from(format!("runs/{name}/weights/best.pt")),
            model_type: ModelType::Detection,
            metrics: json!({ "mAP50": 0.91, "epochs": 50 }),
        }
    }

    #[test]
    fn latest_model_is_the_newest() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        assert!(store.get_latest_model(project).expect("latest").is_none());

        store.add_model(project, &model("first")).expect("first");
        let second = store.add_model(project, &model("second")).expect("second");

        let latest = store
            .get_latest_model(project)
            .expect("latest")
            .expect("exists");
        assert_eq!(latest.id, second);
        assert_eq!(latest.metrics["epochs"], 50);

        let names: Vec<String> = store
            .get_models(project)
            .expect("models")
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn unknown_project_is_rejected() {
        let store = Store::open_in_memory().expect("open store");
        let err = store.add_model(ProjectId(9), &model("x")).unwrap_err();
        assert!(matches!(err, InspektError::UnknownReference { .. }));
    }

    #[test]
    fn corrupt_metrics_surface_as_corrupt_row() {
        let store = Store::open_in_memory().expect("open store");
        let project = store.default_project_id().expect("project");
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO models (project_id, name, path, model_type, metrics, created_at)
                     VALUES (?1, 'bad', 'x.pt', 'detection', '{not json', ?2)",
                    params![project, now_timestamp()],
                )?;
                Ok(())
            })
            .expect("insert raw row");

        let err = store.get_models(project).unwrap_err();
        assert!(matches!(err, InspektError::CorruptRow { .. }));
    }
}
