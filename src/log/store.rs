//! Persistence of the schema log.
//!
//! [`SchemaLog`] is the seam between the migration stages and storage: the
//! log writer and applier mutate the log only through it. The production
//! implementation keeps the three log tables in the target database itself.

use itertools::Itertools;
use tracing::debug;

use crate::constants::{LOG_APPLY, LOG_FIELDS, LOG_TABLES};
use crate::db::{SqlExecutor, SqlValue, Statement};
use crate::error::{MigrateError, Result};
use crate::model::{FieldAction, FieldDescriptor};

use super::types::{ApplyRecord, FieldRow, LogSnapshot, LoggedTable, TableRow};

/// Storage operations on the schema log.
///
/// All mutations are single-row and committed independently; a failure
/// leaves earlier writes of the same run in place.
#[allow(async_fn_in_trait)]
pub trait SchemaLog {
    /// Create the log tables when missing.
    async fn ensure_tables(&self) -> Result<()>;

    /// Read the full log: every table row with its field rows.
    async fn snapshot(&self) -> Result<LogSnapshot>;

    /// Insert a table row (not yet applied) and return its id.
    async fn insert_table(&self, table_name: &str, action: FieldAction) -> Result<i64>;

    async fn set_table_action(&self, id: i64, action: FieldAction) -> Result<()>;

    async fn set_table_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()>;

    /// Remove a table row together with its field rows.
    async fn delete_table_row(&self, id: i64) -> Result<()>;

    /// Insert a field row (not yet applied).
    async fn insert_field(
        &self,
        parent_table: i64,
        field: &FieldDescriptor,
        action: FieldAction,
    ) -> Result<()>;

    /// Overwrite a field row's declared shape and action.
    async fn update_field(&self, id: i64, field: &FieldDescriptor, action: FieldAction)
    -> Result<()>;

    async fn set_field_action(&self, id: i64, action: FieldAction) -> Result<()>;

    async fn set_field_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()>;

    async fn delete_field_row(&self, id: i64) -> Result<()>;

    async fn apply_records(&self) -> Result<Vec<ApplyRecord>>;

    /// Record that an artifact's content has been folded into the log.
    async fn record_artifact(&self, app_name: &str, file_id: &str) -> Result<()>;
}

/// Schema log stored in the target database, accessed through the SQL
/// execution service.
pub struct DbSchemaLog<'a, E: SqlExecutor> {
    db: &'a E,
}

impl<'a, E: SqlExecutor> DbSchemaLog<'a, E> {
    pub fn new(db: &'a E) -> Self {
        Self { db }
    }

    fn field_values(field: &FieldDescriptor, action: FieldAction) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("fname", SqlValue::from(field.name.as_str())),
            ("ftype", SqlValue::from(field.kind.log_code())),
            ("fk", SqlValue::opt_text(field.fk_target.as_deref())),
            (
                "on_delete",
                SqlValue::opt_text(field.on_delete.map(|a| a.log_code())),
            ),
            (
                "on_update",
                SqlValue::opt_text(field.on_update.map(|a| a.log_code())),
            ),
            (
                "rel_name",
                SqlValue::opt_text(field.relation_name.as_deref()),
            ),
            ("flength", SqlValue::from(field.length)),
            ("fnull", SqlValue::from(field.nullable)),
            ("action", SqlValue::from(action.log_code())),
        ]
    }
}

const CREATE_LOG_TABLES: &str = "CREATE TABLE IF NOT EXISTS `flow_tables` (\
    `id` INT NOT NULL AUTO_INCREMENT, \
    `tn` VARCHAR(255) NOT NULL, \
    `action` VARCHAR(16) NOT NULL, \
    `applystatus` TINYINT(1) NOT NULL DEFAULT 0, \
    PRIMARY KEY (`id`))";

const CREATE_LOG_FIELDS: &str = "CREATE TABLE IF NOT EXISTS `flow_fields` (\
    `id` INT NOT NULL AUTO_INCREMENT, \
    `parent_table` INT NOT NULL, \
    `fname` VARCHAR(255) NOT NULL, \
    `ftype` VARCHAR(16) NOT NULL, \
    `fk` VARCHAR(255) NULL, \
    `on_delete` VARCHAR(16) NULL, \
    `on_update` VARCHAR(16) NULL, \
    `rel_name` VARCHAR(255) NULL, \
    `flength` INT NOT NULL DEFAULT 0, \
    `fnull` TINYINT(1) NOT NULL DEFAULT 0, \
    `action` VARCHAR(16) NOT NULL, \
    `applystatus` TINYINT(1) NOT NULL DEFAULT 0, \
    PRIMARY KEY (`id`))";

const CREATE_LOG_APPLY: &str = "CREATE TABLE IF NOT EXISTS `appaply` (\
    `id` INT NOT NULL AUTO_INCREMENT, \
    `appname` VARCHAR(255) NOT NULL, \
    `filename` VARCHAR(255) NOT NULL, \
    PRIMARY KEY (`id`))";

impl<'a, E: SqlExecutor> SchemaLog for DbSchemaLog<'a, E> {
    async fn ensure_tables(&self) -> Result<()> {
        let existing = self.db.list_tables().await?;
        for (name, ddl) in [
            (LOG_TABLES, CREATE_LOG_TABLES),
            (LOG_FIELDS, CREATE_LOG_FIELDS),
            (LOG_APPLY, CREATE_LOG_APPLY),
        ] {
            if !existing.iter().any(|t| t == name) {
                debug!("creating log table {}", name);
                self.db.execute(&Statement::raw(ddl)).await?;
            }
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<LogSnapshot> {
        let table_rows = self
            .db
            .query(&Statement::select(LOG_TABLES, &[], &[])?)
            .await?;
        let field_rows = self
            .db
            .query(&Statement::select(LOG_FIELDS, &[], &[])?)
            .await?;

        let fields: Vec<FieldRow> = field_rows
            .iter()
            .map(FieldRow::from_row)
            .collect::<Result<_>>()?;
        let by_parent = fields
            .into_iter()
            .into_group_map_by(|f| f.parent_table);

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let table = TableRow::from_row(row)?;
            let fields = by_parent.get(&table.id).cloned().unwrap_or_default();
            tables.push(LoggedTable { table, fields });
        }
        Ok(LogSnapshot { tables })
    }

    async fn insert_table(&self, table_name: &str, action: FieldAction) -> Result<i64> {
        self.db
            .execute(&Statement::insert(
                LOG_TABLES,
                &[
                    ("tn", SqlValue::from(table_name)),
                    ("action", SqlValue::from(action.log_code())),
                    ("applystatus", SqlValue::from(false)),
                ],
            )?)
            .await?;

        let rows = self
            .db
            .query(&Statement::select(
                LOG_TABLES,
                &["id"],
                &[("tn", SqlValue::from(table_name))],
            )?)
            .await?;
        rows.last()
            .map(|r| r.i64("id"))
            .transpose()?
            .ok_or_else(|| {
                MigrateError::LogFormat(format!(
                    "table '{}' missing from log after insert",
                    table_name
                ))
            })
    }

    async fn set_table_action(&self, id: i64, action: FieldAction) -> Result<()> {
        self.db
            .execute(&Statement::update(
                LOG_TABLES,
                &[("action", SqlValue::from(action.log_code()))],
                &[("id", SqlValue::from(id))],
            )?)
            .await
    }

    async fn set_table_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()> {
        self.db
            .execute(&Statement::update(
                LOG_TABLES,
                &[
                    ("applystatus", SqlValue::from(applied)),
                    ("action", SqlValue::from(action.log_code())),
                ],
                &[("id", SqlValue::from(id))],
            )?)
            .await
    }

    async fn delete_table_row(&self, id: i64) -> Result<()> {
        self.db
            .execute(&Statement::delete(
                LOG_FIELDS,
                &[("parent_table", SqlValue::from(id))],
            )?)
            .await?;
        self.db
            .execute(&Statement::delete(LOG_TABLES, &[("id", SqlValue::from(id))])?)
            .await
    }

    async fn insert_field(
        &self,
        parent_table: i64,
        field: &FieldDescriptor,
        action: FieldAction,
    ) -> Result<()> {
        let mut values = Self::field_values(field, action);
        values.push(("parent_table", SqlValue::from(parent_table)));
        values.push(("applystatus", SqlValue::from(false)));
        self.db.execute(&Statement::insert(LOG_FIELDS, &values)?).await
    }

    async fn update_field(
        &self,
        id: i64,
        field: &FieldDescriptor,
        action: FieldAction,
    ) -> Result<()> {
        let values = Self::field_values(field, action);
        self.db
            .execute(&Statement::update(
                LOG_FIELDS,
                &values,
                &[("id", SqlValue::from(id))],
            )?)
            .await
    }

    async fn set_field_action(&self, id: i64, action: FieldAction) -> Result<()> {
        self.db
            .execute(&Statement::update(
                LOG_FIELDS,
                &[("action", SqlValue::from(action.log_code()))],
                &[("id", SqlValue::from(id))],
            )?)
            .await
    }

    async fn set_field_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()> {
        self.db
            .execute(&Statement::update(
                LOG_FIELDS,
                &[
                    ("applystatus", SqlValue::from(applied)),
                    ("action", SqlValue::from(action.log_code())),
                ],
                &[("id", SqlValue::from(id))],
            )?)
            .await
    }

    async fn delete_field_row(&self, id: i64) -> Result<()> {
        self.db
            .execute(&Statement::delete(LOG_FIELDS, &[("id", SqlValue::from(id))])?)
            .await
    }

    async fn apply_records(&self) -> Result<Vec<ApplyRecord>> {
        let rows = self
            .db
            .query(&Statement::select(LOG_APPLY, &[], &[])?)
            .await?;
        rows.iter().map(ApplyRecord::from_row).collect()
    }

    async fn record_artifact(&self, app_name: &str, file_id: &str) -> Result<()> {
        self.db
            .execute(&Statement::insert(
                LOG_APPLY,
                &[
                    ("appname", SqlValue::from(app_name)),
                    ("filename", SqlValue::from(file_id)),
                ],
            )?)
            .await
    }
}
