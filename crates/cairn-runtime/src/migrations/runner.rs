//! Migration runner with mesh-safe locking.
//!
//! Applies pending migrations in identifier order and reverts the most
//! recent ones on demand. Each migration commits atomically; a run only
//! makes forward progress and stops at the first failure.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cairn_core::error::{CairnError, Result};
use cairn_core::schema::CollectionSchema;

use super::registry::MigrationRegistry;
use super::session::SchemaSession;
use super::unit::{AppliedRecord, Migration, MigrationId};
use crate::store::SchemaStore;

/// Outcome of [`MigrationRunner::run_pending`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Migrations applied by this run, in order.
    pub applied: Vec<MigrationId>,
    /// Migrations that were already applied before this run.
    pub skipped: usize,
}

/// Applied and pending migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Applied migrations, oldest first.
    pub applied: Vec<AppliedMigration>,
    /// Pending migrations, in the order they would run.
    pub pending: Vec<MigrationId>,
}

/// A migration recorded as applied.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub identifier: MigrationId,
    pub applied_at: DateTime<Utc>,
    /// Whether the unit is still registered (and can therefore be reverted).
    pub registered: bool,
}

/// Result of a dry run over the pending set.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.outcome, CheckOutcome::RoundTrip))
    }
}

/// Dry-run result for one pending migration.
#[derive(Debug, Clone)]
pub struct CheckEntry {
    pub identifier: MigrationId,
    pub outcome: CheckOutcome,
}

/// What happened when a migration was applied and reverted in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// `down` restored exactly what `up` started from.
    RoundTrip,
    /// `down` succeeded but left these collections different.
    NotReversible { collections: Vec<String> },
    /// `up` failed; later migrations were not checked.
    ApplyFailed(String),
    /// `down` failed.
    RevertFailed(String),
}

/// Runs a registry of migrations against a schema store.
pub struct MigrationRunner<S> {
    store: S,
    registry: MigrationRegistry,
}

impl<S: SchemaStore> MigrationRunner<S> {
    pub fn new(store: S, registry: MigrationRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply all pending migrations in ascending identifier order.
    ///
    /// This acquires the store's exclusive lock first, ensuring only one
    /// node in the cluster runs migrations at a time.
    pub async fn run_pending(&mut self) -> Result<RunReport> {
        self.store.acquire_lock().await?;

        let result = self.run_pending_inner().await;

        // Always release lock, even on error
        if let Err(e) = self.store.release_lock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }

    async fn run_pending_inner(&mut self) -> Result<RunReport> {
        self.store.ensure_tables().await?;

        let applied = self.applied_ids().await?;
        debug!("Already applied migrations: {:?}", applied);

        let pending: Vec<Migration> = self
            .registry
            .pending(&applied)
            .into_iter()
            .cloned()
            .collect();

        let mut report = RunReport {
            applied: Vec::new(),
            skipped: self.registry.len() - pending.len(),
        };

        if pending.is_empty() {
            debug!("No pending migrations");
            return Ok(report);
        }

        for migration in pending {
            self.apply_migration(&migration).await?;
            report.applied.push(migration.id().clone());
        }

        Ok(report)
    }

    async fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        let id = migration.id();
        info!("Applying migration: {}", id);

        let collections = self
            .store
            .load_collections()
            .await
            .map_err(|e| CairnError::apply_failed(id.as_str(), e))?;

        let mut session = SchemaSession::new(collections);
        migration
            .apply(&mut session)
            .map_err(|e| CairnError::apply_failed(id.as_str(), e))?;

        let record = AppliedRecord::now(id.clone());
        self.store
            .commit_apply(&session.changed(), &record)
            .await
            .map_err(|e| CairnError::apply_failed(id.as_str(), e))?;

        info!("Migration applied: {}", id);
        Ok(())
    }

    /// Revert the `count` most recently applied migrations, newest first.
    ///
    /// Returns the reverted identifiers in the order they were reverted.
    pub async fn revert_last(&mut self, count: usize) -> Result<Vec<MigrationId>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        self.store.acquire_lock().await?;

        let result = self.revert_last_inner(count).await;

        if let Err(e) = self.store.release_lock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }

    async fn revert_last_inner(&mut self, count: usize) -> Result<Vec<MigrationId>> {
        self.store.ensure_tables().await?;

        let mut records = self.store.applied_records().await?;
        records.sort_by(|a, b| {
            b.applied_at
                .cmp(&a.applied_at)
                .then_with(|| b.identifier.cmp(&a.identifier))
        });

        let mut reverted = Vec::new();
        for record in records.into_iter().take(count) {
            let id = record.identifier;
            let migration = self.registry.get(&id).cloned().ok_or_else(|| {
                CairnError::revert_failed(
                    id.as_str(),
                    CairnError::NotFound(format!("migration {} is not registered", id)),
                )
            })?;

            self.revert_migration(&migration).await?;
            reverted.push(id);
        }

        Ok(reverted)
    }

    async fn revert_migration(&mut self, migration: &Migration) -> Result<()> {
        let id = migration.id();
        info!("Reverting migration: {}", id);

        let collections = self
            .store
            .load_collections()
            .await
            .map_err(|e| CairnError::revert_failed(id.as_str(), e))?;

        let mut session = SchemaSession::new(collections);
        migration
            .revert(&mut session)
            .map_err(|e| CairnError::revert_failed(id.as_str(), e))?;

        self.store
            .commit_revert(&session.changed(), id)
            .await
            .map_err(|e| CairnError::revert_failed(id.as_str(), e))?;

        info!("Migration reverted: {}", id);
        Ok(())
    }

    /// Report applied and pending migrations.
    pub async fn status(&mut self) -> Result<MigrationStatus> {
        self.store.ensure_tables().await?;

        let mut records = self.store.applied_records().await?;
        records.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        let applied_ids: HashSet<MigrationId> =
            records.iter().map(|r| r.identifier.clone()).collect();
        let pending = self
            .registry
            .pending(&applied_ids)
            .into_iter()
            .map(|m| m.id().clone())
            .collect();

        let applied = records
            .into_iter()
            .map(|r| AppliedMigration {
                registered: self.registry.contains(&r.identifier),
                identifier: r.identifier,
                applied_at: r.applied_at,
            })
            .collect();

        Ok(MigrationStatus { applied, pending })
    }

    /// Dry-run the pending set in memory, checking that every `down`
    /// restores the schema its `up` started from. Nothing is written.
    pub async fn check(&mut self) -> Result<CheckReport> {
        self.store.ensure_tables().await?;

        let applied = self.applied_ids().await?;
        let mut state = self.store.load_collections().await?;
        let mut report = CheckReport::default();

        for migration in self.registry.pending(&applied) {
            let id = migration.id().clone();
            debug!("Checking migration: {}", id);

            let mut forward = SchemaSession::new(state.clone());
            if let Err(e) = migration.apply(&mut forward) {
                report.entries.push(CheckEntry {
                    identifier: id,
                    outcome: CheckOutcome::ApplyFailed(e.to_string()),
                });
                break;
            }
            let after_up = forward.into_collections();

            let mut backward = SchemaSession::new(after_up.clone());
            let outcome = match migration.revert(&mut backward) {
                Err(e) => CheckOutcome::RevertFailed(e.to_string()),
                Ok(()) => {
                    let collections = differing_collections(&state, backward.collections());
                    if collections.is_empty() {
                        CheckOutcome::RoundTrip
                    } else {
                        CheckOutcome::NotReversible { collections }
                    }
                }
            };

            report.entries.push(CheckEntry {
                identifier: id,
                outcome,
            });
            state = after_up;
        }

        Ok(report)
    }

    async fn applied_ids(&mut self) -> Result<HashSet<MigrationId>> {
        Ok(self
            .store
            .applied_records()
            .await?
            .into_iter()
            .map(|r| r.identifier)
            .collect())
    }
}

/// Names of collections that differ between two states, matched by id.
fn differing_collections(before: &[CollectionSchema], after: &[CollectionSchema]) -> Vec<String> {
    let mut names: Vec<String> = after
        .iter()
        .filter(|a| before.iter().find(|b| b.id == a.id) != Some(*a))
        .map(|a| a.name.clone())
        .collect();

    names.extend(
        before
            .iter()
            .filter(|b| !after.iter().any(|a| a.id == b.id))
            .map(|b| b.name.clone()),
    );
    names
}
