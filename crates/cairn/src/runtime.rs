//! Startup assembly for the trail app's schema.
//!
//! Collects bundled, file-loaded and programmatic migrations into one
//! registry and runs them against a schema store.

use std::path::PathBuf;

use cairn_core::config::CairnConfig;
use cairn_core::error::{CairnError, Result};
use cairn_runtime::db::Database;
use cairn_runtime::migrations::{
    load_migrations_from_dir, Migration, MigrationRegistry, MigrationRunner, RunReport,
};
use cairn_runtime::store::{PgSchemaStore, SchemaStore};

use crate::migrations::bundled_migrations;

/// Prelude module for common imports.
pub mod prelude {
    pub use cairn_core::config::CairnConfig;
    pub use cairn_core::error::{CairnError, Result};
    pub use cairn_core::schema::{
        CollectionAttribute, CollectionKind, CollectionPatch, CollectionSchema, FieldDescriptor,
        FieldKind,
    };
    pub use cairn_runtime::migrations::{Migration, MigrationId, SchemaSession};

    pub use crate::{Cairn, CairnBuilder};
}

/// The assembled migration set plus its configuration.
pub struct Cairn {
    config: CairnConfig,
    registry: MigrationRegistry,
}

impl Cairn {
    /// Create a new builder.
    pub fn builder() -> CairnBuilder {
        CairnBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CairnConfig {
        &self.config
    }

    /// Get the migration registry.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Connect to PostgreSQL and return a schema store for it.
    pub async fn connect_store(&self) -> Result<PgSchemaStore> {
        let db = Database::from_config(&self.config.database).await?;
        tracing::info!("Connected to database");
        PgSchemaStore::new(db.pool().clone(), self.config.migrations.clone())
    }

    /// Create a runner for the registered migrations over `store`.
    pub fn runner<S: SchemaStore>(&self, store: S) -> MigrationRunner<S> {
        MigrationRunner::new(store, self.registry.clone())
    }

    /// Run all pending migrations against the configured database.
    ///
    /// This is the startup path: it takes the advisory lock, so only one
    /// node runs migrations at a time, and aborts on the first failure.
    pub async fn migrate(&self) -> Result<RunReport> {
        let store = self.connect_store().await?;
        let report = self.runner(store).run_pending().await?;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            "Migrations completed"
        );
        Ok(report)
    }
}

/// Builder for configuring the migration set.
pub struct CairnBuilder {
    config: Option<CairnConfig>,
    migrations_dir: Option<PathBuf>,
    include_bundled: bool,
    extra_migrations: Vec<Migration>,
}

impl CairnBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            migrations_dir: None,
            include_bundled: true,
            extra_migrations: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: CairnConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the directory to load migration files from.
    ///
    /// Defaults to `[migrations] dir` from the configuration. Files should be
    /// named like `1747952550_updated_timeline.json`.
    pub fn migrations_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(path.into());
        self
    }

    /// Skip the migrations compiled into this binary.
    pub fn without_bundled(mut self) -> Self {
        self.include_bundled = false;
        self
    }

    /// Add a migration programmatically.
    pub fn migration(mut self, migration: Migration) -> Self {
        self.extra_migrations.push(migration);
        self
    }

    /// Build the migration set. Fails on a duplicate identifier across
    /// bundled, file-loaded and programmatic migrations.
    pub fn build(self) -> Result<Cairn> {
        let config = self
            .config
            .ok_or_else(|| CairnError::Config("Configuration is required".to_string()))?;

        let dir = self
            .migrations_dir
            .unwrap_or_else(|| config.migrations.dir.clone());

        let mut migrations = Vec::new();
        if self.include_bundled {
            migrations.extend(bundled_migrations()?);
        }
        migrations.extend(load_migrations_from_dir(&dir)?);
        migrations.extend(self.extra_migrations);

        let registry = MigrationRegistry::new(migrations)?;
        tracing::debug!("Registered {} migrations", registry.len());

        Ok(Cairn { config, registry })
    }
}

impl Default for CairnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_runtime::migrations::MigrationId;
    use cairn_runtime::store::MemoryStore;
    use tempfile::TempDir;

    fn config() -> CairnConfig {
        CairnConfig::default_with_database_url("postgres://localhost/test")
    }

    #[test]
    fn test_cairn_builder_requires_config() {
        let result = CairnBuilder::new().build();
        assert!(matches!(result, Err(CairnError::Config(_))));
    }

    #[test]
    fn test_cairn_builder_includes_bundled() {
        let dir = TempDir::new().unwrap();
        let cairn = CairnBuilder::new()
            .config(config())
            .migrations_dir(dir.path())
            .build()
            .unwrap();

        assert_eq!(cairn.registry().len(), 2);
        assert!(cairn
            .registry()
            .contains(&MigrationId::from("1747952550_updated_timeline")));
    }

    #[test]
    fn test_cairn_builder_merges_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("1760000000_noop.json"),
            r#"{"up": [], "down": []}"#,
        )
        .unwrap();

        let cairn = CairnBuilder::new()
            .config(config())
            .migrations_dir(dir.path())
            .without_bundled()
            .migration(Migration::from_patches("1770000000_extra", Vec::new(), Vec::new()))
            .build()
            .unwrap();

        let ids: Vec<&str> = cairn.registry().iter().map(|m| m.id().as_str()).collect();
        assert_eq!(ids, vec!["1760000000_noop", "1770000000_extra"]);
    }

    #[test]
    fn test_cairn_builder_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let result = CairnBuilder::new()
            .config(config())
            .migrations_dir(dir.path())
            .migration(Migration::from_patches(
                "1749837751_updated_trail_like",
                Vec::new(),
                Vec::new(),
            ))
            .build();

        assert!(matches!(result, Err(CairnError::DuplicateIdentifier(_))));
    }

    #[test]
    fn test_default_dir_inside_crate_does_not_reload_bundled() {
        let crate_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        let cairn = CairnBuilder::new()
            .config(config())
            .migrations_dir(crate_dir.join(&config().migrations.dir))
            .build()
            .unwrap();

        assert_eq!(cairn.registry().len(), bundled_migrations().unwrap().len());
    }

    #[tokio::test]
    async fn test_runner_over_memory_store() {
        let dir = TempDir::new().unwrap();
        let cairn = CairnBuilder::new()
            .config(config())
            .migrations_dir(dir.path())
            .without_bundled()
            .migration(Migration::from_patches("0001_noop", Vec::new(), Vec::new()))
            .build()
            .unwrap();

        let mut runner = cairn.runner(MemoryStore::new());
        let report = runner.run_pending().await.unwrap();
        assert_eq!(report.applied, vec![MigrationId::from("0001_noop")]);
    }
}
