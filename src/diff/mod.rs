//! The model differ.
//!
//! Compares the currently declared models against the schema log and
//! produces the minimal set of per-table, per-field actions. The differ is
//! pure: it reads a [`LogSnapshot`] and mutates nothing; recording the
//! result is the log writer's job.

use std::collections::BTreeSet;

use tracing::debug;

use crate::db::executor::is_valid_identifier;
use crate::error::{MigrateError, Result};
use crate::log::LogSnapshot;
use crate::model::{FieldAction, FieldDescriptor, FieldKind, ModelDescriptor};

/// One field with the action the next apply pass must take on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: FieldDescriptor,
    pub action: FieldAction,
}

/// Diffed projection of one table. A `Delete` table change carries no
/// fields; a `Create` carries every declared field; `NoAction` carries only
/// the fields that changed.
#[derive(Debug, Clone, PartialEq)]
pub struct TableChange {
    pub table_name: String,
    pub action: FieldAction,
    pub fields: Vec<FieldChange>,
}

impl TableChange {
    pub fn field_named(&self, name: &str) -> Option<&FieldChange> {
        self.fields.iter().find(|f| f.field.name == name)
    }
}

struct WorkField {
    field: FieldDescriptor,
    action: Option<FieldAction>,
}

struct WorkModel {
    table_name: String,
    action: Option<FieldAction>,
    fields: Vec<WorkField>,
}

/// Diff declared models against the log.
///
/// The validation passes run in a fixed order: tables, updates, creates,
/// deletes, filter. Creates must precede deletes so a field that is marked
/// `Delete` in the log but declared again is resurrected as a `Create`
/// instead of also collecting a synthetic delete.
pub fn diff(models: &[&ModelDescriptor], log: &LogSnapshot) -> Result<Vec<TableChange>> {
    check_declarations(models, log)?;

    let mut work: Vec<WorkModel> = models
        .iter()
        .map(|m| WorkModel {
            table_name: m.table_name.clone(),
            action: None,
            fields: m
                .fields
                .iter()
                .map(|f| WorkField {
                    field: f.clone(),
                    action: None,
                })
                .collect(),
        })
        .collect();

    table_validation(&mut work, log);
    update_validation(&mut work, log);
    create_validation(&mut work, log);
    delete_validation(&mut work, log);
    Ok(filter(work))
}

fn check_declarations(models: &[&ModelDescriptor], log: &LogSnapshot) -> Result<()> {
    let mut table_names = BTreeSet::new();
    let known_tables: BTreeSet<&str> = models
        .iter()
        .map(|m| m.table_name.as_str())
        .chain(log.table_names())
        .collect();

    for model in models {
        if !is_valid_identifier(&model.table_name) {
            return Err(MigrateError::Validation(format!(
                "table name '{}' is not a valid identifier",
                model.table_name
            )));
        }
        if !table_names.insert(model.table_name.as_str()) {
            return Err(MigrateError::Validation(format!(
                "table '{}' is declared more than once",
                model.table_name
            )));
        }

        let mut field_names = BTreeSet::new();
        for field in &model.fields {
            if !is_valid_identifier(&field.name) {
                return Err(MigrateError::Validation(format!(
                    "field name '{}' in table '{}' is not a valid identifier",
                    field.name, model.table_name
                )));
            }
            if !field_names.insert(field.name.as_str()) {
                return Err(MigrateError::Validation(format!(
                    "field '{}' is declared more than once in table '{}'",
                    field.name, model.table_name
                )));
            }
            if field.kind == FieldKind::ForeignKey {
                let target = field.fk_target.as_deref().ok_or_else(|| {
                    MigrateError::Validation(format!(
                        "foreign-key field '{}.{}' has no target table",
                        model.table_name, field.name
                    ))
                })?;
                if !known_tables.contains(target) {
                    return Err(MigrateError::Validation(format!(
                        "foreign-key field '{}.{}' references unknown table '{}'",
                        model.table_name, field.name, target
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Pass 1: declared tables missing from the log are created; logged tables
/// no longer declared are scheduled for deletion.
fn table_validation(work: &mut Vec<WorkModel>, log: &LogSnapshot) {
    for model in work.iter_mut() {
        if log.table(&model.table_name).is_none() {
            model.action = Some(FieldAction::Create);
        }
    }

    for logged in &log.tables {
        let declared = work
            .iter()
            .any(|m| m.table_name == logged.table.table_name);
        if !declared {
            debug!(table = %logged.table.table_name, "scheduling table deletion");
            work.push(WorkModel {
                table_name: logged.table.table_name.clone(),
                action: Some(FieldAction::Delete),
                fields: Vec::new(),
            });
        }
    }
}

/// Pass 2: fields present on both sides whose attribute sets differ become
/// updates. A field that changed in several attributes still yields one
/// `Update`.
fn update_validation(work: &mut [WorkModel], log: &LogSnapshot) {
    for model in work.iter_mut() {
        let Some(logged) = log.table(&model.table_name) else {
            continue;
        };
        for wf in &mut model.fields {
            let Some(row) = logged.fields.iter().find(|r| r.field.name == wf.field.name) else {
                continue;
            };
            if !wf.field.same_shape(&row.field) {
                wf.action = Some(FieldAction::Update);
            }
        }
    }
}

/// Pass 3: declared fields absent from the log, or logged as `Delete`, are
/// created. The latter resurrects a field removed and re-declared before it
/// was ever physically applied.
fn create_validation(work: &mut [WorkModel], log: &LogSnapshot) {
    for model in work.iter_mut() {
        match log.table(&model.table_name) {
            Some(logged) => {
                for wf in &mut model.fields {
                    match logged.fields.iter().find(|r| r.field.name == wf.field.name) {
                        None => wf.action = Some(FieldAction::Create),
                        Some(row) if row.action == FieldAction::Delete => {
                            wf.action = Some(FieldAction::Create);
                        }
                        Some(_) => {}
                    }
                }
            }
            None => {
                for wf in &mut model.fields {
                    wf.action = Some(FieldAction::Create);
                }
            }
        }
    }
}

/// Pass 4: logged fields no longer declared collect a synthetic delete
/// carrying their logged shape.
fn delete_validation(work: &mut [WorkModel], log: &LogSnapshot) {
    for model in work.iter_mut() {
        if model.action == Some(FieldAction::Delete) {
            continue;
        }
        let Some(logged) = log.table(&model.table_name) else {
            continue;
        };
        for row in &logged.fields {
            let declared = model.fields.iter().any(|wf| wf.field.name == row.field.name);
            if !declared {
                model.fields.push(WorkField {
                    field: row.field.clone(),
                    action: Some(FieldAction::Delete),
                });
            }
        }
    }
}

/// Pass 5: drop fields the run left untouched, then drop models with
/// nothing to do. Table-level deletes survive with zero fields; everything
/// else needs at least one field action. No unset action leaves here.
fn filter(work: Vec<WorkModel>) -> Vec<TableChange> {
    let mut changes = Vec::new();
    for model in work {
        let fields: Vec<FieldChange> = model
            .fields
            .into_iter()
            .filter_map(|wf| {
                wf.action.map(|action| FieldChange {
                    field: wf.field,
                    action,
                })
            })
            .collect();

        let action = model.action.unwrap_or(FieldAction::NoAction);
        if fields.is_empty() && action != FieldAction::Delete {
            continue;
        }
        changes.push(TableChange {
            table_name: model.table_name,
            action,
            fields,
        });
    }
    changes
}
