//! Row types for the schema log and the in-memory snapshot the differ and
//! applier work from.

use crate::db::Row;
use crate::error::{MigrateError, Result};
use crate::model::{FieldAction, FieldDescriptor, FieldKind, ReferentialAction};

/// One `flow_tables` row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: i64,
    pub table_name: String,
    pub action: FieldAction,
    pub applied: bool,
}

/// One `flow_fields` row. The declared shape is carried as a descriptor so
/// the differ can compare it against declarations directly.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub id: i64,
    pub parent_table: i64,
    pub field: FieldDescriptor,
    pub action: FieldAction,
    pub applied: bool,
}

/// One `appaply` row: a migration artifact already folded into the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRecord {
    pub id: i64,
    pub app_name: String,
    pub file_id: String,
}

/// A logged table together with its field rows.
#[derive(Debug, Clone)]
pub struct LoggedTable {
    pub table: TableRow,
    pub fields: Vec<FieldRow>,
}

/// Everything the log knows, read in one pass. The differ treats this as
/// the sole source of truth for "previous" schema state.
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    pub tables: Vec<LoggedTable>,
}

impl LogSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&LoggedTable> {
        self.tables.iter().find(|t| t.table.table_name == name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.table.table_name.as_str())
    }
}

fn action_from(code: &str) -> Result<FieldAction> {
    FieldAction::from_log_code(code)
        .ok_or_else(|| MigrateError::LogFormat(format!("unknown action code '{}'", code)))
}

impl TableRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.i64("id")?,
            table_name: row.text("tn")?,
            action: action_from(&row.text("action")?)?,
            applied: row.bool("applystatus")?,
        })
    }
}

impl FieldRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        let kind_code = row.text("ftype")?;
        let kind = FieldKind::from_log_code(&kind_code)
            .ok_or_else(|| MigrateError::LogFormat(format!("unknown ftype code '{}'", kind_code)))?;

        let referential = |column: &str| -> Result<Option<ReferentialAction>> {
            match row.opt_text(column)? {
                Some(code) => ReferentialAction::from_log_code(&code)
                    .map(Some)
                    .ok_or_else(|| {
                        MigrateError::LogFormat(format!(
                            "unknown referential action '{}' in column '{}'",
                            code, column
                        ))
                    }),
                None => Ok(None),
            }
        };

        Ok(Self {
            id: row.i64("id")?,
            parent_table: row.i64("parent_table")?,
            field: FieldDescriptor {
                name: row.text("fname")?,
                kind,
                length: u32::try_from(row.i64("flength")?).unwrap_or(0),
                nullable: row.bool("fnull")?,
                fk_target: row.opt_text("fk")?,
                on_delete: referential("on_delete")?,
                on_update: referential("on_update")?,
                relation_name: row.opt_text("rel_name")?,
            },
            action: action_from(&row.text("action")?)?,
            applied: row.bool("applystatus")?,
        })
    }
}

impl ApplyRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.i64("id")?,
            app_name: row.text("appname")?,
            file_id: row.text("filename")?,
        })
    }
}
