//! Configuration: `flowmt.yaml` merged with environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Raw configuration input - all fields optional for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigInput {
    pub database: Option<DatabaseInput>,
    pub migrations: Option<MigrationsInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseInput {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationsInput {
    pub directory: Option<String>,
}

/// Resolved configuration with all defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub migrations_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "mysql://root@localhost:3306/flow_dev".to_string(),
            migrations_dir: PathBuf::from("migrations"),
        }
    }
}

impl Config {
    /// Apply a config-file layer over the defaults.
    fn merge(mut self, input: ConfigInput) -> Self {
        if let Some(url) = input.database.and_then(|d| d.url) {
            self.database_url = url;
        }
        if let Some(dir) = input.migrations.and_then(|m| m.directory) {
            self.migrations_dir = PathBuf::from(dir);
        }
        self
    }
}

/// Load configuration: defaults, then the config file (when present), then
/// the `DATABASE_URL` environment variable on top.
pub fn load_config(config_file: &str) -> Result<Config> {
    let mut config = Config::default();

    let path = Path::new(config_file);
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let input: ConfigInput = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config = config.merge(input);
    } else {
        debug!("config file {} not found, using defaults", config_file);
    }

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }

    Ok(config)
}
