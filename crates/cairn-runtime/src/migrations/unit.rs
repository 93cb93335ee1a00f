use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cairn_core::error::Result;
use cairn_core::schema::CollectionPatch;

use super::session::SchemaSession;

/// Sortable migration identifier, e.g. `1747952550_updated_timeline`.
///
/// Identifiers that both start with digits compare by that number first,
/// so `999_a` sorts before `1000_b`. Ties fall back to the full string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric_prefix(&self) -> Option<&str> {
        let end = self
            .0
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.0.len());
        if end == 0 {
            None
        } else {
            Some(self.0[..end].trim_start_matches('0'))
        }
    }
}

impl Ord for MigrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_prefix = match (self.numeric_prefix(), other.numeric_prefix()) {
            (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            _ => Ordering::Equal,
        };
        by_prefix.then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for MigrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MigrationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MigrationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Evidence that a migration has been applied and not yet reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub identifier: MigrationId,
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn new(identifier: MigrationId, applied_at: DateTime<Utc>) -> Self {
        Self {
            identifier,
            applied_at,
        }
    }

    /// A record stamped with the current time.
    pub fn now(identifier: MigrationId) -> Self {
        Self::new(identifier, Utc::now())
    }
}

/// One direction of a migration.
pub trait MigrationStep: Send + Sync {
    /// Mutate the schema through the session. Any error discards the session.
    fn run(&self, session: &mut SchemaSession) -> Result<()>;

    /// Human-readable summary of what the step does.
    fn describe(&self) -> Vec<String> {
        vec!["custom step".to_string()]
    }
}

impl<F> MigrationStep for F
where
    F: Fn(&mut SchemaSession) -> Result<()> + Send + Sync,
{
    fn run(&self, session: &mut SchemaSession) -> Result<()> {
        self(session)
    }
}

/// A declarative step: each patch looks up its collection, applies its
/// operations and saves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchSet(pub Vec<CollectionPatch>);

impl MigrationStep for PatchSet {
    fn run(&self, session: &mut SchemaSession) -> Result<()> {
        for patch in &self.0 {
            let mut collection = session.find_collection(&patch.collection)?;
            patch.apply(&mut collection)?;
            session.save_collection(collection)?;
        }
        Ok(())
    }

    fn describe(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|patch| {
                patch
                    .ops
                    .iter()
                    .map(move |op| format!("{}: {}", patch.collection, op))
            })
            .collect()
    }
}

/// Body of a declarative migration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationFile {
    #[serde(default)]
    pub up: PatchSet,
    #[serde(default)]
    pub down: PatchSet,
}

/// A reversible migration unit.
#[derive(Clone)]
pub struct Migration {
    id: MigrationId,
    up: Arc<dyn MigrationStep>,
    down: Arc<dyn MigrationStep>,
}

impl Migration {
    /// Create a migration from any pair of steps.
    pub fn new(
        id: impl Into<MigrationId>,
        up: impl MigrationStep + 'static,
        down: impl MigrationStep + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Create a migration from closures over the schema session.
    pub fn from_fn<U, D>(id: impl Into<MigrationId>, up: U, down: D) -> Self
    where
        U: Fn(&mut SchemaSession) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut SchemaSession) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(id, up, down)
    }

    /// Create a declarative migration from patch lists.
    pub fn from_patches(
        id: impl Into<MigrationId>,
        up: Vec<CollectionPatch>,
        down: Vec<CollectionPatch>,
    ) -> Self {
        Self::new(id, PatchSet(up), PatchSet(down))
    }

    /// Parse a declarative migration from its JSON file body.
    pub fn from_json(id: impl Into<MigrationId>, json: &str) -> Result<Self> {
        let file: MigrationFile = serde_json::from_str(json)?;
        Ok(Self::new(id, file.up, file.down))
    }

    pub fn id(&self) -> &MigrationId {
        &self.id
    }

    /// Run the forward step.
    pub fn apply(&self, session: &mut SchemaSession) -> Result<()> {
        self.up.run(session)
    }

    /// Run the inverse step.
    pub fn revert(&self, session: &mut SchemaSession) -> Result<()> {
        self.down.run(session)
    }

    pub fn describe_up(&self) -> Vec<String> {
        self.up.describe()
    }

    pub fn describe_down(&self) -> Vec<String> {
        self.down.describe()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("up", &self.up.describe())
            .field("down", &self.down.describe())
            .finish()
    }
}
