//! Row types returned by the store.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::ids::{AnnotationId, ImageId, LabelId, ModelId, ProjectId};
use crate::geometry::NormalizedBox;

/// A project; owns every other entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub(crate) const COLUMNS: &'static str = "id, name, description, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            created_at: timestamp_column(row, 3)?,
            updated_at: timestamp_column(row, 4)?,
        })
    }
}

/// A class label. Annotations reference it through `class_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelRecord {
    pub id: LabelId,
    pub project_id: ProjectId,
    pub name: String,
    pub color: String,
}

impl LabelRecord {
    pub(crate) const COLUMNS: &'static str = "id, project_id, name, color";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            color: row.get(3)?,
        })
    }
}

/// A registered image file.
///
/// `annotated` mirrors "has at least one annotation" and is only ever
/// written by the store's annotation operations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub project_id: ProjectId,
    pub path: PathBuf,
    pub filename: String,
    pub annotated: bool,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub(crate) const COLUMNS: &'static str = "id, project_id, path, filename, annotated, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            path: PathBuf::from(row.get::<_, String>(2)?),
            filename: row.get(3)?,
            annotated: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
        })
    }

    /// File name without its extension; names the exported label file.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone())
    }
}

/// A bounding-box annotation joined with its label name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub class_id: LabelId,
    pub class_name: String,
    #[serde(flatten)]
    pub bbox: NormalizedBox,
}

impl AnnotationRecord {
    /// Columns of `annotations a JOIN labels l`.
    pub(crate) const COLUMNS: &'static str =
        "a.id, a.image_id, a.class_id, l.name, a.x_center, a.y_center, a.width, a.height";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            image_id: row.get(1)?,
            class_id: row.get(2)?,
            class_name: row.get(3)?,
            bbox: NormalizedBox::new(row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?),
        })
    }
}

/// What a trained model predicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Detection,
    Classification,
    Segmentation,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Detection => "detection",
            ModelType::Classification => "classification",
            ModelType::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "detection" => Ok(ModelType::Detection),
            "classification" => Ok(ModelType::Classification),
            "segmentation" => Ok(ModelType::Segmentation),
            other => Err(format!(
                "unknown model type '{other}' (expected detection, classification or segmentation)"
            )),
        }
    }
}

impl ToSql for ModelType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ModelType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        raw.parse()
            .map_err(|message: String| FromSqlError::Other(message.into()))
    }
}

/// Input for [`Store::add_model`](super::Store::add_model).
#[derive(Clone, Debug)]
pub struct NewModel {
    pub name: String,
    pub path: PathBuf,
    pub model_type: ModelType,
    pub metrics: serde_json::Value,
}

/// An append-only record of a training run's output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelRecord {
    pub id: ModelId,
    pub project_id: ProjectId,
    pub name: String,
    pub path: PathBuf,
    pub model_type: ModelType,
    pub metrics: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ModelRecord {
    pub(crate) const COLUMNS: &'static str =
        "id, project_id, name, path, model_type, metrics, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metrics = match row.get::<_, Option<String>>(5)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err))
            })?,
            None => serde_json::Value::Object(Default::default()),
        };

        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            path: PathBuf::from(row.get::<_, String>(3)?),
            model_type: row.get(4)?,
            metrics,
            created_at: timestamp_column(row, 6)?,
        })
    }
}

/// Current time in the fixed-width form stored in every timestamp column.
///
/// Fixed width keeps lexical `ORDER BY created_at` chronological.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_parses_case_insensitively() {
        assert_eq!("Detection".parse::<ModelType>(), Ok(ModelType::Detection));
        assert!("keypoints".parse::<ModelType>().is_err());
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn stem_drops_extension() {
        let record = ImageRecord {
            id: ImageId(1),
            project_id: ProjectId(1),
            path: PathBuf::from("storage/dataset/ok/part_001.jpg"),
            filename: "part_001.jpg".to_string(),
            annotated: false,
            created_at: Utc::now(),
        };
        assert_eq!(record.stem(), "part_001");
    }
}
