use std::path::Path;

use tracing::debug;

use cairn_core::error::{CairnError, Result};

use super::unit::Migration;

/// Load migrations from a directory.
///
/// Migrations are `*.json` files holding `{"up": [...], "down": [...]}`
/// collection patches. The file stem is the migration identifier, e.g.
/// `1747952550_updated_timeline.json`.
pub fn load_migrations_from_dir(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.exists() {
        debug!("Migrations directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|e| e == "json").unwrap_or(false) {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| CairnError::Config(format!("Invalid migration filename: {:?}", path)))?
                .to_string();

            let content = std::fs::read_to_string(&path)?;
            let migration = Migration::from_json(name, &content).map_err(|e| {
                CairnError::Config(format!("Invalid migration file {:?}: {}", path, e))
            })?;

            migrations.push(migration);
        }
    }

    migrations.sort_by(|a, b| a.id().cmp(b.id()));

    debug!("Loaded {} migrations from {:?}", migrations.len(), dir);
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const NOOP: &str = r#"{"up": [], "down": []}"#;

    #[test]
    fn test_load_migrations_from_empty_dir() {
        let dir = TempDir::new().unwrap();
        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_load_migrations_from_nonexistent_dir() {
        let migrations = load_migrations_from_dir(Path::new("/nonexistent/path")).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_load_migrations_sorted() {
        let dir = TempDir::new().unwrap();

        fs::write(dir.path().join("0002_second.json"), NOOP).unwrap();
        fs::write(dir.path().join("0001_first.json"), NOOP).unwrap();
        fs::write(dir.path().join("0010_tenth.json"), NOOP).unwrap();

        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        let ids: Vec<&str> = migrations.iter().map(|m| m.id().as_str()).collect();
        assert_eq!(ids, vec!["0001_first", "0002_second", "0010_tenth"]);
    }

    #[test]
    fn test_load_migrations_ignores_other_files() {
        let dir = TempDir::new().unwrap();

        fs::write(dir.path().join("0001_migration.json"), NOOP).unwrap();
        fs::write(dir.path().join("readme.txt"), "Not a migration").unwrap();
        fs::write(dir.path().join("backup.json.bak"), "Backup").unwrap();

        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].id().as_str(), "0001_migration");
    }

    #[test]
    fn test_load_parses_patches() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("0001_rule.json"),
            r#"{
                "up": [{"collection": "trails", "ops": [
                    {"op": "set", "attribute": "listRule", "value": ""}
                ]}],
                "down": [{"collection": "trails", "ops": [
                    {"op": "set", "attribute": "listRule", "value": null}
                ]}]
            }"#,
        )
        .unwrap();

        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        assert_eq!(migrations[0].describe_up(), vec!["trails: set listRule"]);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001_broken.json"), "{ not json").unwrap();

        let err = load_migrations_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CairnError::Config(_)));
    }
}
