//! The log writer.
//!
//! Folds a migration artifact into the schema log: separate from, and prior
//! to, physical DDL application. Each table and field is bookkept
//! independently; a failure aborts the current entity but leaves everything
//! already written in place.

use console::style;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::log::{LogSnapshot, LoggedTable, SchemaLog};
use crate::migrate::artifact::{ArtifactField, MigrationArtifact};
use crate::model::FieldAction;

pub struct LogWriter<'a, L: SchemaLog> {
    log: &'a L,
}

impl<'a, L: SchemaLog> LogWriter<'a, L> {
    pub fn new(log: &'a L) -> Self {
        Self { log }
    }

    /// Fold one artifact into the log. Re-folding an artifact that was
    /// already (partially) recorded is harmless: inserts are skipped for
    /// rows that exist, so an interrupted run resumes cleanly.
    pub async fn fold(&self, artifact: &MigrationArtifact) -> Result<()> {
        let snapshot = self.log.snapshot().await?;

        for table in &artifact.tables {
            let logged = snapshot.table(&table.table_name);
            match table.action {
                FieldAction::Create => {
                    let parent = match logged {
                        Some(t) => t.table.id,
                        None => {
                            let id = self
                                .log
                                .insert_table(&table.table_name, FieldAction::Create)
                                .await
                                .map_err(|e| MigrateError::AddTableToLog {
                                    table: table.table_name.clone(),
                                    source: e.boxed(),
                                })?;
                            println!(
                                " - {} The '{}' table has been added to the log.",
                                style("✔").green(),
                                table.table_name
                            );
                            id
                        }
                    };
                    self.fold_fields(parent, logged, &table.fields).await?;
                }
                FieldAction::NoAction => {
                    let logged = logged.ok_or_else(|| {
                        MigrateError::LogFormat(format!(
                            "table '{}' is not in the log",
                            table.table_name
                        ))
                    })?;
                    self.fold_fields(logged.table.id, Some(logged), &table.fields)
                        .await?;
                }
                FieldAction::Delete => {
                    self.delete_table(&snapshot, &table.table_name).await?;
                }
                FieldAction::Update => {
                    return Err(MigrateError::LogFormat(format!(
                        "artifact table '{}' carries unsupported action UPDATE",
                        table.table_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Record a table deletion. Tables never physically created are removed
    /// from the log outright (with their field rows); applied tables are
    /// flipped to a pending delete for the applier.
    pub async fn delete_table(&self, snapshot: &LogSnapshot, table_name: &str) -> Result<()> {
        let Some(logged) = snapshot.table(table_name) else {
            debug!(table = table_name, "table already absent from log");
            return Ok(());
        };

        let result = if logged.table.applied {
            self.log
                .set_table_action(logged.table.id, FieldAction::Delete)
                .await
        } else {
            self.log.delete_table_row(logged.table.id).await
        };
        result.map_err(|e| MigrateError::DeleteTableInLog {
            table: table_name.to_string(),
            source: e.boxed(),
        })?;

        println!(
            " - {} The table '{}' was successfully deleted in the log.",
            style("✔").green(),
            table_name
        );
        Ok(())
    }

    async fn fold_fields(
        &self,
        parent: i64,
        logged: Option<&LoggedTable>,
        fields: &[ArtifactField],
    ) -> Result<()> {
        for entry in fields {
            let row = logged.and_then(|t| {
                t.fields
                    .iter()
                    .find(|r| r.field.name == entry.field.name)
            });

            match entry.action {
                FieldAction::Create => {
                    match row {
                        // a pending delete declared again flips back instead
                        // of inserting a duplicate row
                        Some(r) if r.action == FieldAction::Delete => {
                            self.log
                                .set_field_action(r.id, FieldAction::Create)
                                .await
                                .map_err(|e| MigrateError::AddFieldToLog {
                                    field: entry.field.name.clone(),
                                    source: e.boxed(),
                                })?;
                        }
                        Some(_) => {
                            debug!(field = %entry.field.name, "field already in log");
                            continue;
                        }
                        None => {
                            self.log
                                .insert_field(parent, &entry.field, FieldAction::Create)
                                .await
                                .map_err(|e| MigrateError::AddFieldToLog {
                                    field: entry.field.name.clone(),
                                    source: e.boxed(),
                                })?;
                        }
                    }
                    println!(
                        " -- {} The '{}' field has been added to the log.",
                        style("✔").green(),
                        entry.field.name
                    );
                }
                FieldAction::Update => {
                    let row = row.ok_or_else(|| MigrateError::UpdateFieldInLog {
                        field: entry.field.name.clone(),
                        source: MigrateError::LogFormat(format!(
                            "field '{}' is not in the log",
                            entry.field.name
                        ))
                        .boxed(),
                    })?;
                    // a never-applied field keeps CREATE so the applier adds
                    // the column with the new shape in one step
                    let action = if row.applied {
                        FieldAction::Update
                    } else {
                        FieldAction::Create
                    };
                    self.log
                        .update_field(row.id, &entry.field, action)
                        .await
                        .map_err(|e| MigrateError::UpdateFieldInLog {
                            field: entry.field.name.clone(),
                            source: e.boxed(),
                        })?;
                    println!(
                        " -- {} The field '{}' was successfully updated in the log.",
                        style("✔").green(),
                        entry.field.name
                    );
                }
                FieldAction::Delete => {
                    let Some(row) = row else {
                        debug!(field = %entry.field.name, "field already absent from log");
                        continue;
                    };
                    let result = if row.applied {
                        self.log.set_field_action(row.id, FieldAction::Delete).await
                    } else {
                        self.log.delete_field_row(row.id).await
                    };
                    result.map_err(|e| MigrateError::DeleteFieldInLog {
                        field: entry.field.name.clone(),
                        source: e.boxed(),
                    })?;
                    println!(
                        " -- {} The field '{}' was successfully deleted in the log.",
                        style("✔").green(),
                        entry.field.name
                    );
                }
                FieldAction::NoAction => {}
            }
        }
        Ok(())
    }
}
