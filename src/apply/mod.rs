//! The applier.
//!
//! Reads un-applied schema log entries, executes the corresponding DDL in a
//! foreign-key-safe order, and flips the applied flags. A foreign-key
//! constraint is never part of the statement that creates its column, and
//! constraints for newly created tables are only added once every table in
//! the pass exists.

use console::style;
use tracing::debug;

use crate::db::{Row, SqlExecutor, SqlValue, Statement};
use crate::error::{MigrateError, Result};
use crate::log::{FieldRow, LogSnapshot, LoggedTable, SchemaLog};
use crate::model::{FieldAction, FieldKind, ReferentialAction};
use crate::render;

/// Counts of what one apply pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub tables_created: usize,
    pub tables_dropped: usize,
    pub fields_created: usize,
    pub fields_updated: usize,
    pub fields_deleted: usize,
    pub constraints_added: usize,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

struct DeferredFk {
    table: String,
    field: FieldRow,
}

/// Executes pending log entries against the live schema.
///
/// DDL statements commit independently; a failure mid-pass leaves earlier
/// entities applied and their log rows flipped, and the next run picks up
/// the remainder.
pub struct Applier<'a, L: SchemaLog, E: SqlExecutor> {
    log: &'a L,
    db: &'a E,
}

impl<'a, L: SchemaLog, E: SqlExecutor> Applier<'a, L, E> {
    pub fn new(log: &'a L, db: &'a E) -> Self {
        Self { log, db }
    }

    pub async fn apply(&self) -> Result<ApplyReport> {
        let snapshot = self.log.snapshot().await?;
        let pending = pending_tables(snapshot);
        let mut report = ApplyReport::default();

        if pending.is_empty() {
            println!("Nothing to apply.");
            return Ok(report);
        }

        let mut deferred: Vec<DeferredFk> = Vec::new();
        for entry in &pending {
            match entry.table.action {
                FieldAction::Create => {
                    self.create_table(entry, &mut deferred, &mut report).await?;
                }
                FieldAction::NoAction => {
                    self.apply_field_actions(entry, &mut report).await?;
                }
                FieldAction::Delete => {
                    self.drop_table(entry, &mut report).await?;
                }
                FieldAction::Update => {
                    return Err(MigrateError::LogFormat(format!(
                        "table '{}' carries unsupported action UPDATE",
                        entry.table.table_name
                    )));
                }
            }
        }

        // every table of the pass exists now; add the queued constraints
        for fk in deferred {
            self.add_constraint(&fk.table, &fk.field).await?;
            report.constraints_added += 1;
        }
        Ok(report)
    }

    /// One CREATE TABLE from all pending field fragments, then per-field
    /// follow-ups: AUTO_INCREMENT promotion immediately, foreign keys
    /// queued for after the pass.
    async fn create_table(
        &self,
        entry: &LoggedTable,
        deferred: &mut Vec<DeferredFk>,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let table_name = &entry.table.table_name;
        let fields: Vec<_> = entry.fields.iter().map(|f| &f.field).collect();

        self.db
            .execute(&Statement::raw(render::create_table(table_name, &fields)))
            .await
            .map_err(|e| MigrateError::TableCreation {
                table: table_name.clone(),
                source: e.boxed(),
            })?;
        self.log
            .set_table_status(entry.table.id, true, FieldAction::NoAction)
            .await
            .map_err(|e| MigrateError::TableCreation {
                table: table_name.clone(),
                source: e.boxed(),
            })?;
        println!(" - {} {} table created.", style("✔").green(), table_name);
        report.tables_created += 1;

        for field in &entry.fields {
            match field.field.kind {
                FieldKind::AutoIncrement => {
                    self.db
                        .execute(&Statement::raw(render::auto_increment_primary_key(
                            table_name,
                            &field.field,
                        )))
                        .await
                        .map_err(|e| MigrateError::FieldCreation {
                            table: table_name.clone(),
                            field: field.field.name.clone(),
                            source: e.boxed(),
                        })?;
                }
                FieldKind::ForeignKey => {
                    // the referenced table may not exist yet in this pass
                    debug!(table = %table_name, field = %field.field.name, "deferring fk constraint");
                    deferred.push(DeferredFk {
                        table: table_name.clone(),
                        field: field.clone(),
                    });
                }
                _ => {}
            }
            self.log
                .set_field_status(field.id, true, FieldAction::NoAction)
                .await
                .map_err(|e| MigrateError::FieldCreation {
                    table: table_name.clone(),
                    field: field.field.name.clone(),
                    source: e.boxed(),
                })?;
            println!(
                " -- {} The field {} was created in the table {}.",
                style("✔").green(),
                field.field.name,
                table_name
            );
            report.fields_created += 1;
        }
        Ok(())
    }

    /// Field-level actions on an existing table.
    async fn apply_field_actions(
        &self,
        entry: &LoggedTable,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let table_name = &entry.table.table_name;
        for field in &entry.fields {
            match field.action {
                FieldAction::Create => {
                    self.db
                        .execute(&Statement::raw(render::add_column(table_name, &field.field)))
                        .await
                        .map_err(|e| MigrateError::FieldCreation {
                            table: table_name.clone(),
                            field: field.field.name.clone(),
                            source: e.boxed(),
                        })?;
                    // the referenced table already exists; new tables are
                    // handled before field-level creates ever run
                    if field.field.kind == FieldKind::ForeignKey {
                        self.add_constraint(table_name, field).await?;
                        report.constraints_added += 1;
                    }
                    self.log
                        .set_field_status(field.id, true, FieldAction::NoAction)
                        .await?;
                    println!(
                        " -- {} The field {} was created in the table {}.",
                        style("✔").green(),
                        field.field.name,
                        table_name
                    );
                    report.fields_created += 1;
                }
                FieldAction::Update => {
                    if let Some(constraint) =
                        self.fk_constraint_name(table_name, &field.field.name).await?
                    {
                        self.db
                            .execute(&Statement::raw(render::drop_foreign_key(
                                table_name,
                                &constraint,
                            )))
                            .await?;
                    }
                    self.db
                        .execute(&Statement::raw(render::change_column(
                            table_name,
                            &field.field,
                        )))
                        .await?;
                    if field.field.kind == FieldKind::ForeignKey {
                        self.add_constraint(table_name, field).await?;
                        report.constraints_added += 1;
                    }
                    self.log
                        .set_field_status(field.id, true, FieldAction::NoAction)
                        .await?;
                    println!(
                        " -- {} The field {} was updated in the table {}.",
                        style("✔").green(),
                        field.field.name,
                        table_name
                    );
                    report.fields_updated += 1;
                }
                FieldAction::Delete => {
                    if let Some(constraint) =
                        self.fk_constraint_name(table_name, &field.field.name).await?
                    {
                        self.db
                            .execute(&Statement::raw(render::drop_foreign_key(
                                table_name,
                                &constraint,
                            )))
                            .await?;
                    }
                    self.db
                        .execute(&Statement::raw(render::drop_column(
                            table_name,
                            &field.field.name,
                        )))
                        .await?;
                    self.log.delete_field_row(field.id).await?;
                    println!(
                        " -- {} The field {} was deleted in the table {}.",
                        style("✔").green(),
                        field.field.name,
                        table_name
                    );
                    report.fields_deleted += 1;
                }
                FieldAction::NoAction => {}
            }
        }
        Ok(())
    }

    async fn drop_table(&self, entry: &LoggedTable, report: &mut ApplyReport) -> Result<()> {
        let table_name = &entry.table.table_name;
        self.db
            .execute(&Statement::raw(render::drop_table(table_name)))
            .await?;
        self.log.delete_table_row(entry.table.id).await?;
        println!(" - {} The table {} deleted.", style("✔").green(), table_name);
        report.tables_dropped += 1;
        Ok(())
    }

    async fn add_constraint(&self, table: &str, field: &FieldRow) -> Result<()> {
        let target = field.field.fk_target.as_deref().ok_or_else(|| {
            MigrateError::LogFormat(format!(
                "foreign-key field '{}.{}' has no target in the log",
                table, field.field.name
            ))
        })?;
        let sql = render::add_foreign_key(
            table,
            &field.field.name,
            target,
            field.field.on_delete.unwrap_or(ReferentialAction::Restrict),
            field.field.on_update.unwrap_or(ReferentialAction::Restrict),
            field.field.relation_name.as_deref(),
        );
        self.db.execute(&Statement::raw(sql)).await
    }

    /// Name of the FK constraint currently attached to a column, if any.
    async fn fk_constraint_name(&self, table: &str, column: &str) -> Result<Option<String>> {
        let stmt = Statement {
            sql: "SELECT `CONSTRAINT_NAME` FROM `INFORMATION_SCHEMA`.`KEY_COLUMN_USAGE` \
                  WHERE `REFERENCED_TABLE_NAME` IS NOT NULL AND `TABLE_NAME` = ? AND `COLUMN_NAME` = ?"
                .to_string(),
            params: vec![SqlValue::from(table), SqlValue::from(column)],
        };
        let rows = self.db.query(&stmt).await?;
        Ok(rows.first().and_then(first_text))
    }
}

fn first_text(row: &Row) -> Option<String> {
    match row.first() {
        Some(SqlValue::Text(v)) => Some(v.clone()),
        _ => None,
    }
}

/// Drop housekeeping rows: fields with no pending action, and tables with
/// neither a table-level action nor any actionable field left.
fn pending_tables(snapshot: LogSnapshot) -> Vec<LoggedTable> {
    snapshot
        .tables
        .into_iter()
        .filter_map(|mut entry| {
            entry.fields.retain(|f| f.action != FieldAction::NoAction);
            if entry.table.action == FieldAction::NoAction && entry.fields.is_empty() {
                None
            } else {
                Some(entry)
            }
        })
        .collect()
}
