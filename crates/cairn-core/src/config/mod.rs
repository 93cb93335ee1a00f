mod database;
mod observability;

pub use database::DatabaseConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CairnError, Result};

/// Root configuration for cairn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CairnConfig {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration runner configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CairnConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CairnError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| CairnError::Config(format!("Failed to parse config: {}", e)))?;
        config.migrations.validate()?;
        Ok(config)
    }

    /// Load configuration with defaults.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            project: ProjectConfig::default(),
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            migrations: MigrationsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Project version.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            version: default_version(),
        }
    }
}

fn default_project_name() -> String {
    "cairn-app".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Migration runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding `*.json` migration files.
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,

    /// Table recording applied migrations.
    #[serde(default = "default_migrations_table")]
    pub table: String,

    /// Table holding collection schemas.
    #[serde(default = "default_collections_table")]
    pub collections_table: String,

    /// Advisory lock key shared by every runner of the same database.
    #[serde(default = "default_lock_id")]
    pub lock_id: i64,
}

impl MigrationsConfig {
    /// Table names are interpolated into SQL, so only plain identifiers pass.
    pub fn validate(&self) -> Result<()> {
        for name in [&self.table, &self.collections_table] {
            if !is_plain_identifier(name) {
                return Err(CairnError::Config(format!(
                    "Invalid table name '{}': use lowercase letters, digits and underscores",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            table: default_migrations_table(),
            collections_table: default_collections_table(),
            lock_id: default_lock_id(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_migrations_table() -> String {
    "_migrations".to_string()
}

fn default_collections_table() -> String {
    "_collections".to_string()
}

fn default_lock_id() -> i64 {
    0x434149524E // "CAIRN" in hex
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
