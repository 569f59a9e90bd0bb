//! Migration error taxonomy.
//!
//! Every stage wraps the underlying failure with the entity it was working
//! on and re-raises; nothing is retried and nothing already committed is
//! rolled back.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("error adding table '{table}' to log database")]
    AddTableToLog {
        table: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error adding field '{field}' to log database")]
    AddFieldToLog {
        field: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error updating field '{field}' in log")]
    UpdateFieldInLog {
        field: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error deleting field '{field}' in log")]
    DeleteFieldInLog {
        field: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error deleting table '{table}' in log")]
    DeleteTableInLog {
        table: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error creating table '{table}'")]
    TableCreation {
        table: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error creating field '{field}' in table '{table}'")]
    FieldCreation {
        table: String,
        field: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("error writing migration file '{}'", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading migration file '{}'", path.display())]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration file '{}' is not a valid migration record", path.display())]
    ArtifactDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid SQL identifier '{0}'")]
    Identifier(String),

    #[error("malformed schema log row: {0}")]
    LogFormat(String),

    /// Execution failure reported by a non-sqlx [`SqlExecutor`].
    #[error("sql execution failed: {0}")]
    Sql(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl MigrateError {
    pub(crate) fn boxed(self) -> Box<MigrateError> {
        Box::new(self)
    }
}
