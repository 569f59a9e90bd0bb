// Migration file naming conventions
pub const MIGRATION_FILE_PREFIX: &str = "mgr_";
pub const MIGRATION_FILE_EXT: &str = "json";

// Schema-log table names (live in the target database)
pub const LOG_TABLES: &str = "flow_tables";
pub const LOG_FIELDS: &str = "flow_fields";
pub const LOG_APPLY: &str = "appaply";

// Configuration file name
pub const CONFIG_FILENAME: &str = "flowmt.yaml";
