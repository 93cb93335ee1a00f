use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cairn_core::error::{CairnError, Result};
use cairn_core::schema::CollectionSchema;

use super::{merge_collections, SchemaStore};
use crate::migrations::{AppliedRecord, MigrationId};

/// On-disk layout of a snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    collections: Vec<CollectionSchema>,
    #[serde(default)]
    migrations: Vec<AppliedRecord>,
}

/// In-process schema store, optionally persisted to a JSON snapshot file.
///
/// With a snapshot path every commit rewrites the file (write to a temp
/// file, then rename) before the in-memory state changes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Vec<CollectionSchema>,
    applied: Vec<AppliedRecord>,
    locked: bool,
    writes: usize,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a set of collections.
    pub fn with_collections(collections: Vec<CollectionSchema>) -> Self {
        Self {
            collections,
            ..Self::default()
        }
    }

    /// Open a snapshot file, starting empty if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<Snapshot>(&content)?
        } else {
            debug!("Snapshot {:?} does not exist, starting empty", path);
            Snapshot::default()
        };

        Ok(Self {
            collections: snapshot.collections,
            applied: snapshot.migrations,
            snapshot_path: Some(path),
            ..Self::default()
        })
    }

    pub fn collections(&self) -> &[CollectionSchema] {
        &self.collections
    }

    /// Borrow a collection by id or name.
    pub fn collection(&self, id_or_name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|c| c.matches(id_or_name))
    }

    pub fn applied(&self) -> &[AppliedRecord] {
        &self.applied
    }

    /// Number of commits performed.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    async fn commit(
        &mut self,
        collections: Vec<CollectionSchema>,
        applied: Vec<AppliedRecord>,
    ) -> Result<()> {
        let snapshot = Snapshot {
            collections,
            migrations: applied,
        };

        if let Some(path) = &self.snapshot_path {
            let content = serde_json::to_string_pretty(&snapshot)?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, content).await?;
            tokio::fs::rename(&tmp, path).await?;
        }

        self.collections = snapshot.collections;
        self.applied = snapshot.migrations;
        self.writes += 1;
        Ok(())
    }
}

impl SchemaStore for MemoryStore {
    async fn acquire_lock(&mut self) -> Result<()> {
        if self.locked {
            return Err(CairnError::InvalidState(
                "migration lock is already held".to_string(),
            ));
        }
        self.locked = true;
        Ok(())
    }

    async fn release_lock(&mut self) -> Result<()> {
        self.locked = false;
        Ok(())
    }

    async fn ensure_tables(&mut self) -> Result<()> {
        Ok(())
    }

    async fn load_collections(&mut self) -> Result<Vec<CollectionSchema>> {
        Ok(self.collections.clone())
    }

    async fn applied_records(&mut self) -> Result<Vec<AppliedRecord>> {
        Ok(self.applied.clone())
    }

    async fn commit_apply(
        &mut self,
        changed: &[CollectionSchema],
        record: &AppliedRecord,
    ) -> Result<()> {
        if self
            .applied
            .iter()
            .any(|r| r.identifier == record.identifier)
        {
            return Err(CairnError::Database(format!(
                "migration {} is already recorded",
                record.identifier
            )));
        }

        let mut collections = self.collections.clone();
        merge_collections(&mut collections, changed);
        let mut applied = self.applied.clone();
        applied.push(record.clone());

        self.commit(collections, applied).await
    }

    async fn commit_revert(
        &mut self,
        changed: &[CollectionSchema],
        identifier: &MigrationId,
    ) -> Result<()> {
        let mut applied = self.applied.clone();
        let before = applied.len();
        applied.retain(|r| &r.identifier != identifier);
        if applied.len() == before {
            return Err(CairnError::NotFound(format!(
                "applied record for migration {}",
                identifier
            )));
        }

        let mut collections = self.collections.clone();
        merge_collections(&mut collections, changed);

        self.commit(collections, applied).await
    }

    async fn import_collections(&mut self, collections: &[CollectionSchema]) -> Result<()> {
        let mut merged = self.collections.clone();
        merge_collections(&mut merged, collections);

        for (i, collection) in merged.iter().enumerate() {
            if let Some(other) = merged[..i].iter().find(|c| c.name == collection.name) {
                return Err(CairnError::Validation(format!(
                    "collection name '{}' is already used by '{}'",
                    collection.name, other.id
                )));
            }
        }
        let applied = self.applied.clone();

        self.commit(merged, applied).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::schema::CollectionKind;
    use tempfile::TempDir;

    fn trails() -> CollectionSchema {
        CollectionSchema::new("pbc_1", "trails", CollectionKind::Base)
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let mut store = MemoryStore::new();
        store.acquire_lock().await.unwrap();
        assert!(matches!(
            store.acquire_lock().await,
            Err(CairnError::InvalidState(_))
        ));
        store.release_lock().await.unwrap();
        assert!(!store.is_locked());
        store.acquire_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_apply_and_revert() {
        let mut store = MemoryStore::with_collections(vec![trails()]);
        let mut changed = trails();
        changed.list_rule = Some(String::new());
        let record = AppliedRecord::now(MigrationId::from("0001_a"));

        store.commit_apply(&[changed], &record).await.unwrap();
        assert_eq!(store.applied().len(), 1);
        assert_eq!(
            store.collection("trails").unwrap().list_rule.as_deref(),
            Some("")
        );

        let err = store.commit_apply(&[], &record).await.unwrap_err();
        assert!(matches!(err, CairnError::Database(_)));

        store
            .commit_revert(&[trails()], &MigrationId::from("0001_a"))
            .await
            .unwrap();
        assert!(store.applied().is_empty());
        assert_eq!(store.collection("pbc_1"), Some(&trails()));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_revert_unknown_record_fails() {
        let mut store = MemoryStore::new();
        let err = store
            .commit_revert(&[], &MigrationId::from("0001_a"))
            .await
            .unwrap_err();
        assert!(matches!(err, CairnError::NotFound(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_import_rejects_name_taken_by_other_id() {
        let mut store = MemoryStore::with_collections(vec![trails()]);
        let clash = CollectionSchema::new("pbc_2", "trails", CollectionKind::Base);

        let err = store.import_collections(&[clash]).await.unwrap_err();
        assert!(matches!(err, CairnError::Validation(_)));
        assert_eq!(store.collections(), &[trails()]);
        assert_eq!(store.write_count(), 0);

        let mut renamed = trails();
        renamed.name = "routes".to_string();
        store.import_collections(&[renamed]).await.unwrap();
        assert!(store.collection("routes").is_some());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");

        let mut store = MemoryStore::open(&path).await.unwrap();
        assert!(store.collections().is_empty());
        store.import_collections(&[trails()]).await.unwrap();
        store
            .commit_apply(&[], &AppliedRecord::now(MigrationId::from("0001_a")))
            .await
            .unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.collections(), &[trails()]);
        assert_eq!(reopened.applied()[0].identifier.as_str(), "0001_a");
        assert!(!dir.path().join("schema.json.tmp").exists());
    }
}
