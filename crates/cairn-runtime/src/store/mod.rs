//! Persistence for collections and applied-migration records.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSchemaStore;

use std::future::Future;

use cairn_core::error::Result;
use cairn_core::schema::CollectionSchema;

use crate::migrations::{AppliedRecord, MigrationId};

/// Backing store for the migration runner.
///
/// Each `commit_*` call must be atomic: either every changed collection and
/// the record update are persisted, or none are.
pub trait SchemaStore: Send {
    /// Take the exclusive migration lock. Must not be re-entered.
    fn acquire_lock(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Release the lock taken by [`SchemaStore::acquire_lock`].
    fn release_lock(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Create tracking tables if they do not exist.
    fn ensure_tables(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Load every collection.
    fn load_collections(&mut self) -> impl Future<Output = Result<Vec<CollectionSchema>>> + Send;

    /// Load every applied record.
    fn applied_records(&mut self) -> impl Future<Output = Result<Vec<AppliedRecord>>> + Send;

    /// Persist changed collections and record a migration as applied.
    fn commit_apply(
        &mut self,
        changed: &[CollectionSchema],
        record: &AppliedRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Persist changed collections and delete a migration's record.
    fn commit_revert(
        &mut self,
        changed: &[CollectionSchema],
        identifier: &MigrationId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Insert or replace collections outside of any migration. A name held
    /// by a different collection id is rejected.
    fn import_collections(
        &mut self,
        collections: &[CollectionSchema],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Replace collections by id, appending unknown ones.
pub(crate) fn merge_collections(target: &mut Vec<CollectionSchema>, changed: &[CollectionSchema]) {
    for collection in changed {
        match target.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection.clone(),
            None => target.push(collection.clone()),
        }
    }
}
