//! The migrate pipeline: diff declared models against the log, materialize
//! the difference as a migration artifact per application, and record the
//! pending change in the log.

pub mod artifact;
pub mod writer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use console::style;
use tracing::info;

use crate::diff::{self, TableChange};
use crate::error::Result;
use crate::log::SchemaLog;
use crate::model::{FieldAction, ModelRegistry};

pub use artifact::{MigrationArtifact, file_id_for, latest_artifact, list_file_ids};
pub use writer::LogWriter;

/// A migration artifact generated by one `migrate` run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub app: String,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrateOutcome {
    NoChanges,
    Generated(Vec<GeneratedArtifact>),
}

/// Runs the full diff → record pipeline.
///
/// The engine assumes a single writer: one migrate or apply invocation at a
/// time against a given database.
pub struct Migrator<'a, L: SchemaLog> {
    registry: &'a ModelRegistry,
    log: &'a L,
    migrations_dir: PathBuf,
}

impl<'a, L: SchemaLog> Migrator<'a, L> {
    pub fn new(registry: &'a ModelRegistry, log: &'a L, migrations_dir: PathBuf) -> Self {
        Self {
            registry,
            log,
            migrations_dir,
        }
    }

    pub async fn migrate(&self) -> Result<MigrateOutcome> {
        self.log.ensure_tables().await?;
        self.resume_pending().await?;

        let snapshot = self.log.snapshot().await?;
        let models = self.registry.all_models();
        let changes = diff::diff(&models, &snapshot)?;
        if changes.is_empty() {
            println!("No changes detected.");
            return Ok(MigrateOutcome::NoChanges);
        }

        let writer = LogWriter::new(self.log);

        // Table deletions are recorded eagerly, straight into the log; they
        // belong to no application and never reach an artifact.
        let (deletions, changes): (Vec<_>, Vec<_>) = changes
            .into_iter()
            .partition(|c| c.action == FieldAction::Delete);
        for deletion in &deletions {
            writer.delete_table(&snapshot, &deletion.table_name).await?;
        }

        let mut generated = Vec::new();
        for (app, app_changes) in self.group_by_app(&changes) {
            let existing = artifact::list_file_ids(&self.migrations_dir, app)?;
            let bootstrap = existing.is_empty();

            // two runs within the same clock second would collide on the
            // file id; bump until it is free
            let mut instant = Local::now().naive_local();
            let mut file_id = artifact::file_id_for(instant);
            while existing.contains(&file_id) {
                instant += chrono::Duration::seconds(1);
                file_id = artifact::file_id_for(instant);
            }
            let artifact =
                MigrationArtifact::from_changes(app, file_id, &app_changes, bootstrap);

            let path = artifact.write_to(&self.migrations_dir)?;
            info!(app, path = %path.display(), "generated migration artifact");
            println!(
                "{} Generated migration '{}' for app '{}'.",
                style("✔").green(),
                artifact.file_id,
                app
            );

            writer.fold(&artifact).await?;
            self.log.record_artifact(app, &artifact.file_id).await?;
            generated.push(GeneratedArtifact {
                app: app.to_string(),
                file_id: artifact.file_id.clone(),
            });
        }

        if generated.is_empty() && deletions.is_empty() {
            println!("No changes detected.");
            return Ok(MigrateOutcome::NoChanges);
        }
        Ok(MigrateOutcome::Generated(generated))
    }

    /// Fold artifacts a previous run generated but never finished recording.
    /// An artifact without an `appaply` row has not been folded into the
    /// log; re-folding is idempotent.
    async fn resume_pending(&self) -> Result<()> {
        let records = self.log.apply_records().await?;
        let writer = LogWriter::new(self.log);

        for app in self.registry.app_names() {
            let Some(artifact) = artifact::latest_artifact(&self.migrations_dir, app)? else {
                continue;
            };
            let recorded = records
                .iter()
                .any(|r| r.app_name == app && r.file_id == artifact.file_id);
            if recorded {
                continue;
            }

            info!(app, file_id = %artifact.file_id, "resuming unrecorded artifact");
            println!(
                "{} Resuming migration '{}' for app '{}'.",
                style("➜").cyan(),
                artifact.file_id,
                app
            );
            writer.fold(&artifact).await?;
            self.log.record_artifact(app, &artifact.file_id).await?;
        }
        Ok(())
    }

    fn group_by_app<'c>(
        &self,
        changes: &'c [TableChange],
    ) -> BTreeMap<&'a str, Vec<&'c TableChange>> {
        let registry = self.registry;
        let mut per_app: BTreeMap<&'a str, Vec<&'c TableChange>> = BTreeMap::new();
        for change in changes {
            // non-delete changes always come from a registered model
            if let Some(app) = registry.app_of(&change.table_name) {
                per_app.entry(app).or_default().push(change);
            }
        }
        per_app
    }
}
