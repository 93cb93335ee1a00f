use std::collections::{BTreeMap, HashSet};

use cairn_core::error::{CairnError, Result};

use super::unit::{Migration, MigrationId};

/// Ordered set of migration units, keyed by identifier.
///
/// Built once by the startup sequence and then moved into the runner.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<MigrationId, Migration>,
}

impl MigrationRegistry {
    /// Build a registry from units given in any order.
    pub fn new(units: impl IntoIterator<Item = Migration>) -> Result<Self> {
        let mut registry = Self::default();
        for unit in units {
            registry.register(unit)?;
        }
        Ok(registry)
    }

    /// Add a unit. Fails without modifying the registry when the
    /// identifier is empty or already registered.
    pub fn register(&mut self, unit: Migration) -> Result<()> {
        if unit.id().as_str().trim().is_empty() {
            return Err(CairnError::Validation(
                "migration identifier is empty".to_string(),
            ));
        }
        if self.migrations.contains_key(unit.id()) {
            return Err(CairnError::DuplicateIdentifier(unit.id().to_string()));
        }

        self.migrations.insert(unit.id().clone(), unit);
        Ok(())
    }

    /// Get a unit by identifier.
    pub fn get(&self, id: &MigrationId) -> Option<&Migration> {
        self.migrations.get(id)
    }

    pub fn contains(&self, id: &MigrationId) -> bool {
        self.migrations.contains_key(id)
    }

    /// Units in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Registered units not in `applied`, ascending.
    pub fn pending(&self, applied: &HashSet<MigrationId>) -> Vec<&Migration> {
        self.migrations
            .values()
            .filter(|m| !applied.contains(m.id()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: &str) -> Migration {
        Migration::from_patches(id, Vec::new(), Vec::new())
    }

    #[test]
    fn test_orders_by_identifier() {
        let registry =
            MigrationRegistry::new(vec![noop("0003_c"), noop("0001_a"), noop("0002_b")]).unwrap();

        let ids: Vec<&str> = registry.iter().map(|m| m.id().as_str()).collect();
        assert_eq!(ids, vec!["0001_a", "0002_b", "0003_c"]);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut registry = MigrationRegistry::new(vec![noop("X")]).unwrap();
        let err = registry.register(noop("X")).unwrap_err();
        assert!(matches!(err, CairnError::DuplicateIdentifier(ref id) if id == "X"));
        assert_eq!(registry.len(), 1);

        let err = MigrationRegistry::new(vec![noop("X"), noop("X")]).unwrap_err();
        assert!(matches!(err, CairnError::DuplicateIdentifier(_)));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let mut registry = MigrationRegistry::default();
        assert!(matches!(
            registry.register(noop(" ")),
            Err(CairnError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_skips_applied() {
        let registry =
            MigrationRegistry::new(vec![noop("0001_a"), noop("0002_b"), noop("0003_c")]).unwrap();
        let applied: HashSet<MigrationId> = [MigrationId::from("0002_b")].into_iter().collect();

        let pending: Vec<&str> = registry
            .pending(&applied)
            .into_iter()
            .map(|m| m.id().as_str())
            .collect();
        assert_eq!(pending, vec!["0001_a", "0003_c"]);
        assert!(registry.contains(&MigrationId::from("0002_b")));
    }
}
