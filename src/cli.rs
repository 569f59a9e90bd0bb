//! CLI entry point for application binaries.
//!
//! The framework owns the model declarations, so the engine is driven from
//! the application's own binary:
//!
//! ```no_run
//! use flowmt::cli;
//! use flowmt::model::{FieldDescriptor, ModelDescriptor, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = ModelRegistry::new();
//!     registry.register(
//!         "blog",
//!         ModelDescriptor::new("user").field(FieldDescriptor::char("name", 50)),
//!     );
//!     cli::run(registry).await
//! }
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::apply::Applier;
use crate::config;
use crate::constants::CONFIG_FILENAME;
use crate::db::{MySqlExecutor, connect_and_ensure_database};
use crate::log::{DbSchemaLog, SchemaLog};
use crate::migrate::Migrator;
use crate::model::{FieldAction, ModelRegistry};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff declared models against the schema log and record the changes
    Migrate,

    /// Apply pending schema log entries as DDL
    #[command(name = "apply-migrations")]
    ApplyMigrations,

    /// Show pending log entries and recorded migrations
    Status,
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Parse arguments and run the requested command against the registry the
/// application assembled at startup.
pub async fn run(registry: ModelRegistry) -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);

    let config = config::load_config(&cli.config_file)?;
    let pool = connect_and_ensure_database(&config.database_url).await?;
    let executor = MySqlExecutor::new(pool);
    let log = DbSchemaLog::new(&executor);

    match cli.command {
        Commands::Migrate => {
            info!("Running model diff");
            let migrator = Migrator::new(&registry, &log, config.migrations_dir.clone());
            migrator.migrate().await?;
            Ok(())
        }
        Commands::ApplyMigrations => {
            info!("Applying pending migrations");
            log.ensure_tables().await?;
            let applier = Applier::new(&log, &executor);
            let report = applier.apply().await?;
            if !report.is_empty() {
                println!(
                    "{} Applied: {} tables created, {} dropped, {} fields created, {} updated, {} deleted, {} constraints added.",
                    style("✔").green(),
                    report.tables_created,
                    report.tables_dropped,
                    report.fields_created,
                    report.fields_updated,
                    report.fields_deleted,
                    report.constraints_added
                );
            }
            Ok(())
        }
        Commands::Status => {
            info!("Checking migration status");
            print_status(&log).await
        }
    }
}

async fn print_status<L: SchemaLog>(log: &L) -> Result<()> {
    log.ensure_tables().await?;
    let snapshot = log.snapshot().await?;

    let mut pending = 0usize;
    for entry in &snapshot.tables {
        if entry.table.action != FieldAction::NoAction || !entry.table.applied {
            pending += 1;
            println!(
                " - table '{}': {} (applied: {})",
                entry.table.table_name,
                entry.table.action.log_code(),
                entry.table.applied
            );
        }
        for field in &entry.fields {
            if field.action != FieldAction::NoAction || !field.applied {
                pending += 1;
                println!(
                    " -- field '{}.{}': {} (applied: {})",
                    entry.table.table_name,
                    field.field.name,
                    field.action.log_code(),
                    field.applied
                );
            }
        }
    }

    if pending == 0 {
        println!("{} Schema log is fully applied.", style("✔").green());
    } else {
        println!("{} {} pending log entries.", style("➜").cyan(), pending);
    }

    let records = log.apply_records().await?;
    if !records.is_empty() {
        println!("Recorded migrations:");
        for record in records {
            println!(" - {} ({})", record.file_id, record.app_name);
        }
    }
    Ok(())
}
