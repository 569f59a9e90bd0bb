//! Log writer behavior: folding migration artifacts into the schema log.

mod helpers;

use flowmt::migrate::artifact::{ArtifactField, ArtifactTable, MigrationArtifact};
use flowmt::migrate::writer::LogWriter;
use flowmt::model::{FieldAction, FieldDescriptor};

use helpers::MemoryLog;

fn artifact(tables: Vec<ArtifactTable>) -> MigrationArtifact {
    MigrationArtifact {
        file_id: "mgr_24_08_07__10_00_00".to_string(),
        app: "blog".to_string(),
        tables,
    }
}

fn field(descriptor: FieldDescriptor, action: FieldAction) -> ArtifactField {
    ArtifactField {
        field: descriptor,
        action,
    }
}

#[tokio::test]
async fn fold_create_table_inserts_table_then_fields() {
    let log = MemoryLog::new();
    let writer = LogWriter::new(&log);

    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::Create,
        fields: vec![
            field(FieldDescriptor::auto_increment("id"), FieldAction::Create),
            field(FieldDescriptor::char("name", 50), FieldAction::Create),
        ],
    }]);

    writer.fold(&artifact).await.unwrap();

    let table = log.table_row("user").unwrap();
    assert_eq!(table.action, FieldAction::Create);
    assert!(!table.applied);

    let name = log.field_row("user", "name").unwrap();
    assert_eq!(name.parent_table, table.id);
    assert_eq!(name.action, FieldAction::Create);
    assert!(!name.applied);
    assert_eq!(log.field_count("user"), 2);
}

#[tokio::test]
async fn fold_is_idempotent_per_field() {
    let log = MemoryLog::new();
    let writer = LogWriter::new(&log);

    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::Create,
        fields: vec![field(FieldDescriptor::auto_increment("id"), FieldAction::Create)],
    }]);

    writer.fold(&artifact).await.unwrap();
    writer.fold(&artifact).await.unwrap();

    assert_eq!(log.field_count("user"), 1);
}

#[tokio::test]
async fn create_on_pending_delete_flips_back_instead_of_duplicating() {
    let log = MemoryLog::new();
    let parent = log.seed_table("user", FieldAction::NoAction, true);
    log.seed_field(
        parent,
        FieldDescriptor::char("name", 50),
        FieldAction::Delete,
        true,
    );

    let writer = LogWriter::new(&log);
    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::NoAction,
        fields: vec![field(FieldDescriptor::char("name", 50), FieldAction::Create)],
    }]);
    writer.fold(&artifact).await.unwrap();

    assert_eq!(log.field_count("user"), 1);
    let name = log.field_row("user", "name").unwrap();
    assert_eq!(name.action, FieldAction::Create);
    assert!(name.applied);
}

#[tokio::test]
async fn update_of_unapplied_field_stays_create() {
    let log = MemoryLog::new();
    let parent = log.seed_table("user", FieldAction::NoAction, true);
    log.seed_field(
        parent,
        FieldDescriptor::char("name", 50),
        FieldAction::Create,
        false,
    );

    let writer = LogWriter::new(&log);
    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::NoAction,
        fields: vec![field(FieldDescriptor::char("name", 120), FieldAction::Update)],
    }]);
    writer.fold(&artifact).await.unwrap();

    let name = log.field_row("user", "name").unwrap();
    // never applied: the applier will add the column with the new shape
    assert_eq!(name.action, FieldAction::Create);
    assert_eq!(name.field.length, 120);
}

#[tokio::test]
async fn update_of_applied_field_becomes_update() {
    let log = MemoryLog::new();
    let parent = log.seed_table("user", FieldAction::NoAction, true);
    log.seed_field(
        parent,
        FieldDescriptor::char("name", 50),
        FieldAction::NoAction,
        true,
    );

    let writer = LogWriter::new(&log);
    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::NoAction,
        fields: vec![field(
            FieldDescriptor::char("name", 120).nullable(true),
            FieldAction::Update,
        )],
    }]);
    writer.fold(&artifact).await.unwrap();

    let name = log.field_row("user", "name").unwrap();
    assert_eq!(name.action, FieldAction::Update);
    assert_eq!(name.field.length, 120);
    assert!(name.field.nullable);
    assert!(name.applied);
}

#[tokio::test]
async fn delete_of_unapplied_field_removes_row() {
    let log = MemoryLog::new();
    let parent = log.seed_table("user", FieldAction::NoAction, true);
    log.seed_field(
        parent,
        FieldDescriptor::int("age"),
        FieldAction::Create,
        false,
    );

    let writer = LogWriter::new(&log);
    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::NoAction,
        fields: vec![field(FieldDescriptor::int("age"), FieldAction::Delete)],
    }]);
    writer.fold(&artifact).await.unwrap();

    assert!(log.field_row("user", "age").is_none());
}

#[tokio::test]
async fn delete_of_applied_field_flips_action_keeps_applied() {
    let log = MemoryLog::new();
    let parent = log.seed_table("user", FieldAction::NoAction, true);
    log.seed_field(
        parent,
        FieldDescriptor::int("age"),
        FieldAction::NoAction,
        true,
    );

    let writer = LogWriter::new(&log);
    let artifact = artifact(vec![ArtifactTable {
        table_name: "user".to_string(),
        action: FieldAction::NoAction,
        fields: vec![field(FieldDescriptor::int("age"), FieldAction::Delete)],
    }]);
    writer.fold(&artifact).await.unwrap();

    let age = log.field_row("user", "age").unwrap();
    assert_eq!(age.action, FieldAction::Delete);
    assert!(age.applied);
}

#[tokio::test]
async fn delete_table_removes_unapplied_rows_outright() {
    let log = MemoryLog::new();
    let parent = log.seed_table("draft", FieldAction::Create, false);
    log.seed_field(
        parent,
        FieldDescriptor::auto_increment("id"),
        FieldAction::Create,
        false,
    );

    let writer = LogWriter::new(&log);
    let snapshot = flowmt::log::SchemaLog::snapshot(&log).await.unwrap();
    writer.delete_table(&snapshot, "draft").await.unwrap();

    assert!(log.table_row("draft").is_none());
    assert_eq!(log.field_count("draft"), 0);
}

#[tokio::test]
async fn delete_table_flips_applied_rows_to_pending_delete() {
    let log = MemoryLog::new();
    log.seed_table("user", FieldAction::NoAction, true);

    let writer = LogWriter::new(&log);
    let snapshot = flowmt::log::SchemaLog::snapshot(&log).await.unwrap();
    writer.delete_table(&snapshot, "user").await.unwrap();

    let table = log.table_row("user").unwrap();
    assert_eq!(table.action, FieldAction::Delete);
    assert!(table.applied);
}
