//! Migration artifacts.
//!
//! One artifact captures one diff result for one application as pure data:
//! a timestamped, append-only JSON record of each changed table and field.
//! Artifacts are never edited after being written; the log writer reads
//! them back to fold their content into the schema log.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::{MIGRATION_FILE_EXT, MIGRATION_FILE_PREFIX};
use crate::diff::TableChange;
use crate::error::{MigrateError, Result};
use crate::model::{FieldAction, FieldDescriptor};

/// One field block inside an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactField {
    #[serde(flatten)]
    pub field: FieldDescriptor,
    pub action: FieldAction,
}

/// One table block inside an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactTable {
    #[serde(rename = "tn")]
    pub table_name: String,
    pub action: FieldAction,
    pub fields: Vec<ArtifactField>,
}

/// A generated migration record for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    pub file_id: String,
    pub app: String,
    pub tables: Vec<ArtifactTable>,
}

/// Sortable artifact file id for a generation instant:
/// `mgr_<YY_MM_DD__HH_MM_SS>`.
pub fn file_id_for(instant: NaiveDateTime) -> String {
    format!(
        "{}{}",
        MIGRATION_FILE_PREFIX,
        instant.format("%y_%m_%d__%H_%M_%S")
    )
}

impl MigrationArtifact {
    /// Build an artifact from the differ's output for one app.
    ///
    /// The first artifact ever generated for an app is the bootstrap case:
    /// every table and field action is forced to `Create` regardless of what
    /// the differ computed.
    pub fn from_changes(
        app: &str,
        file_id: String,
        changes: &[&TableChange],
        bootstrap: bool,
    ) -> Self {
        let tables = changes
            .iter()
            .map(|change| ArtifactTable {
                table_name: change.table_name.clone(),
                action: if bootstrap {
                    FieldAction::Create
                } else {
                    change.action
                },
                fields: change
                    .fields
                    .iter()
                    .map(|fc| ArtifactField {
                        field: fc.field.clone(),
                        action: if bootstrap {
                            FieldAction::Create
                        } else {
                            fc.action
                        },
                    })
                    .collect(),
            })
            .collect();

        Self {
            file_id,
            app: app.to_string(),
            tables,
        }
    }

    fn path_in(&self, migrations_dir: &Path) -> PathBuf {
        migrations_dir
            .join(&self.app)
            .join(format!("{}.{}", self.file_id, MIGRATION_FILE_EXT))
    }

    /// Write the artifact under `<migrations_dir>/<app>/`, creating the
    /// directory on demand. Existing artifacts are never overwritten.
    pub fn write_to(&self, migrations_dir: &Path) -> Result<PathBuf> {
        let path = self.path_in(migrations_dir);
        let dir = path.parent().expect("artifact path has a parent");
        fs::create_dir_all(dir).map_err(|e| MigrateError::ArtifactWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

        if path.exists() {
            return Err(MigrateError::ArtifactWrite {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "migration artifact already exists",
                ),
            });
        }

        let content =
            serde_json::to_string_pretty(self).expect("artifact serialization is infallible");
        fs::write(&path, content).map_err(|e| MigrateError::ArtifactWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MigrateError::ArtifactRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| MigrateError::ArtifactDecode {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// File ids of all artifacts generated for an app, oldest first. The
/// timestamp ids sort chronologically as plain strings.
pub fn list_file_ids(migrations_dir: &Path, app: &str) -> Result<Vec<String>> {
    let dir = migrations_dir.join(app);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir).map_err(|e| MigrateError::ArtifactRead {
        path: dir.clone(),
        source: e,
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrateError::ArtifactRead {
            path: dir.clone(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_FILE_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            && stem.starts_with(MIGRATION_FILE_PREFIX)
        {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Load the most recently generated artifact for an app, if any.
pub fn latest_artifact(migrations_dir: &Path, app: &str) -> Result<Option<MigrationArtifact>> {
    let ids = list_file_ids(migrations_dir, app)?;
    match ids.last() {
        Some(id) => {
            let path = migrations_dir
                .join(app)
                .join(format!("{}.{}", id, MIGRATION_FILE_EXT));
            MigrationArtifact::load(&path).map(Some)
        }
        None => Ok(None),
    }
}
