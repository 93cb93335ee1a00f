use std::collections::BTreeSet;

use tracing::debug;

use cairn_core::error::{CairnError, Result};
use cairn_core::schema::CollectionSchema;

/// Working copy of the collection registry for one migration step.
///
/// Saved collections are staged here and only reach the store when the
/// runner commits the step. Dropping a session discards its changes.
#[derive(Debug, Clone)]
pub struct SchemaSession {
    collections: Vec<CollectionSchema>,
    dirty: BTreeSet<String>,
}

impl SchemaSession {
    pub fn new(collections: Vec<CollectionSchema>) -> Self {
        Self {
            collections,
            dirty: BTreeSet::new(),
        }
    }

    /// Look up a collection by id, then by name. Returns an owned copy;
    /// edits take effect only through [`SchemaSession::save_collection`].
    pub fn find_collection(&self, id_or_name: &str) -> Result<CollectionSchema> {
        self.collection(id_or_name)
            .cloned()
            .ok_or_else(|| CairnError::NotFound(format!("collection '{}'", id_or_name)))
    }

    /// Borrow a collection by id or name.
    pub fn collection(&self, id_or_name: &str) -> Option<&CollectionSchema> {
        self.collections
            .iter()
            .find(|c| c.id == id_or_name)
            .or_else(|| self.collections.iter().find(|c| c.name == id_or_name))
    }

    /// Validate and stage a collection, replacing the one with the same id.
    pub fn save_collection(&mut self, collection: CollectionSchema) -> Result<()> {
        collection.validate()?;

        if let Some(other) = self
            .collections
            .iter()
            .find(|c| c.id != collection.id && c.name == collection.name)
        {
            return Err(CairnError::Validation(format!(
                "collection name '{}' is already used by '{}'",
                collection.name, other.id
            )));
        }

        debug!(collection = %collection.name, "Staging collection");
        self.dirty.insert(collection.id.clone());
        match self.collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
        Ok(())
    }

    /// All collections, in load order.
    pub fn collections(&self) -> &[CollectionSchema] {
        &self.collections
    }

    /// Collections saved during this session.
    pub fn changed(&self) -> Vec<CollectionSchema> {
        self.collections
            .iter()
            .filter(|c| self.dirty.contains(&c.id))
            .cloned()
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn into_collections(self) -> Vec<CollectionSchema> {
        self.collections
    }
}
