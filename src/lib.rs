//! flowmt: the schema-migration engine of the flow data layer.
//!
//! Application authors declare tables as [`model::ModelDescriptor`]s and
//! register them in a [`model::ModelRegistry`]. The engine then runs a
//! diff → record → apply pipeline:
//!
//! - [`diff`] compares the declarations against the schema log and computes
//!   per-table, per-field actions;
//! - [`migrate`] materializes the result as an immutable migration artifact
//!   and records the pending change in the log;
//! - [`apply`] executes the pending change as DDL against the live database
//!   and marks the log entries applied.
//!
//! The schema log ([`log`]) lives in the target database itself and is the
//! sole source of truth for previous schema state. All SQL goes through the
//! [`db::SqlExecutor`] capability set.

pub mod apply;
pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod diff;
pub mod error;
pub mod log;
pub mod migrate;
pub mod model;
pub mod render;

pub use apply::{Applier, ApplyReport};
pub use diff::{FieldChange, TableChange, diff};
pub use error::{MigrateError, Result};
pub use log::{DbSchemaLog, LogSnapshot, SchemaLog};
pub use migrate::{LogWriter, MigrateOutcome, MigrationArtifact, Migrator};
pub use model::{
    FieldAction, FieldDescriptor, FieldKind, ModelDescriptor, ModelRegistry, ReferentialAction,
};
