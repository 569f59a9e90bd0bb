//! Shared test doubles: an in-memory schema log and a recording SQL
//! executor. Both implement the engine's storage/execution seams so the
//! writer and applier can be exercised without a live database.

#![allow(dead_code)]

use std::sync::Mutex;

use flowmt::db::{Row, SqlExecutor, SqlValue, Statement};
use flowmt::error::{MigrateError, Result};
use flowmt::log::{ApplyRecord, FieldRow, LogSnapshot, LoggedTable, SchemaLog, TableRow};
use flowmt::model::{FieldAction, FieldDescriptor};

#[derive(Default)]
struct LogState {
    tables: Vec<TableRow>,
    fields: Vec<FieldRow>,
    records: Vec<ApplyRecord>,
    next_id: i64,
}

impl LogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Schema log held in memory.
#[derive(Default)]
pub struct MemoryLog {
    state: Mutex<LogState>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table row directly, returning its id.
    pub fn seed_table(&self, name: &str, action: FieldAction, applied: bool) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.tables.push(TableRow {
            id,
            table_name: name.to_string(),
            action,
            applied,
        });
        id
    }

    /// Seed a field row directly, returning its id.
    pub fn seed_field(
        &self,
        parent: i64,
        field: FieldDescriptor,
        action: FieldAction,
        applied: bool,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.fields.push(FieldRow {
            id,
            parent_table: parent,
            field,
            action,
            applied,
        });
        id
    }

    pub fn table_row(&self, name: &str) -> Option<TableRow> {
        let state = self.state.lock().unwrap();
        state.tables.iter().find(|t| t.table_name == name).cloned()
    }

    pub fn field_row(&self, table: &str, field: &str) -> Option<FieldRow> {
        let state = self.state.lock().unwrap();
        let table_id = state.tables.iter().find(|t| t.table_name == table)?.id;
        state
            .fields
            .iter()
            .find(|f| f.parent_table == table_id && f.field.name == field)
            .cloned()
    }

    pub fn field_count(&self, table: &str) -> usize {
        let state = self.state.lock().unwrap();
        let Some(table_id) = state.tables.iter().find(|t| t.table_name == table).map(|t| t.id)
        else {
            return 0;
        };
        state
            .fields
            .iter()
            .filter(|f| f.parent_table == table_id)
            .count()
    }

    fn missing(entity: &str, id: i64) -> MigrateError {
        MigrateError::Sql(format!("no {} row with id {}", entity, id))
    }
}

impl SchemaLog for MemoryLog {
    async fn ensure_tables(&self) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<LogSnapshot> {
        let state = self.state.lock().unwrap();
        let tables = state
            .tables
            .iter()
            .map(|table| LoggedTable {
                table: table.clone(),
                fields: state
                    .fields
                    .iter()
                    .filter(|f| f.parent_table == table.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        Ok(LogSnapshot { tables })
    }

    async fn insert_table(&self, table_name: &str, action: FieldAction) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.tables.push(TableRow {
            id,
            table_name: table_name.to_string(),
            action,
            applied: false,
        });
        Ok(id)
    }

    async fn set_table_action(&self, id: i64, action: FieldAction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let table = state
            .tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::missing("table", id))?;
        table.action = action;
        Ok(())
    }

    async fn set_table_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let table = state
            .tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::missing("table", id))?;
        table.applied = applied;
        table.action = action;
        Ok(())
    }

    async fn delete_table_row(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fields.retain(|f| f.parent_table != id);
        state.tables.retain(|t| t.id != id);
        Ok(())
    }

    async fn insert_field(
        &self,
        parent_table: i64,
        field: &FieldDescriptor,
        action: FieldAction,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.fields.push(FieldRow {
            id,
            parent_table,
            field: field.clone(),
            action,
            applied: false,
        });
        Ok(())
    }

    async fn update_field(
        &self,
        id: i64,
        field: &FieldDescriptor,
        action: FieldAction,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Self::missing("field", id))?;
        row.field = field.clone();
        row.action = action;
        Ok(())
    }

    async fn set_field_action(&self, id: i64, action: FieldAction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Self::missing("field", id))?;
        row.action = action;
        Ok(())
    }

    async fn set_field_status(&self, id: i64, applied: bool, action: FieldAction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Self::missing("field", id))?;
        row.applied = applied;
        row.action = action;
        Ok(())
    }

    async fn delete_field_row(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fields.retain(|f| f.id != id);
        Ok(())
    }

    async fn apply_records(&self) -> Result<Vec<ApplyRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.records.clone())
    }

    async fn record_artifact(&self, app_name: &str, file_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.records.push(ApplyRecord {
            id,
            app_name: app_name.to_string(),
            file_id: file_id.to_string(),
        });
        Ok(())
    }
}

/// Canned response for [`RecordingExecutor::query`]: returned when the
/// statement text contains `sql_contains` and the bound parameters match.
struct CannedResponse {
    sql_contains: String,
    params: Vec<SqlValue>,
    rows: Vec<Row>,
}

/// SQL executor that records every executed statement and answers queries
/// from canned responses.
#[derive(Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    responses: Mutex<Vec<CannedResponse>>,
    tables: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn respond(&self, sql_contains: &str, params: Vec<SqlValue>, rows: Vec<Row>) {
        self.responses.lock().unwrap().push(CannedResponse {
            sql_contains: sql_contains.to_string(),
            params,
            rows,
        });
    }

    pub fn set_tables(&self, tables: &[&str]) {
        *self.tables.lock().unwrap() = tables.iter().map(|t| t.to_string()).collect();
    }

    /// Index of the first executed statement containing `needle`.
    pub fn position_of(&self, needle: &str) -> Option<usize> {
        self.executed().iter().position(|sql| sql.contains(needle))
    }
}

impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, stmt: &Statement) -> Result<()> {
        self.executed.lock().unwrap().push(stmt.sql.clone());
        Ok(())
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let responses = self.responses.lock().unwrap();
        for response in responses.iter() {
            if stmt.sql.contains(&response.sql_contains) && stmt.params == response.params {
                return Ok(response.rows.clone());
            }
        }
        Ok(Vec::new())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.lock().unwrap().clone())
    }
}

/// Single-column row, the shape of `CONSTRAINT_NAME` lookups.
pub fn constraint_row(name: &str) -> Row {
    Row::from_pairs([(
        "CONSTRAINT_NAME".to_string(),
        SqlValue::Text(name.to_string()),
    )])
}
