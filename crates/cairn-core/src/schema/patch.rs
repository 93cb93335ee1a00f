//! Typed, introspectable schema patch operations.
//!
//! A [`CollectionPatch`] targets one collection and carries an ordered list
//! of [`PatchOp`]s. Applying a patch mutates the collection in memory; saving
//! it is the caller's concern.

use serde::{Deserialize, Serialize};

use super::collection::{CollectionAttribute, CollectionSchema};
use super::field::FieldDescriptor;
use crate::error::Result;

/// A single schema mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    /// Overwrite an attribute with a literal value.
    #[serde(rename = "set")]
    SetAttribute {
        attribute: CollectionAttribute,
        value: Option<String>,
    },

    /// Insert a field at a position (past the end appends).
    InsertFieldAt {
        position: usize,
        field: FieldDescriptor,
    },

    /// Remove a field by id.
    RemoveFieldById { id: String },
}

impl PatchOp {
    /// Apply this operation to a collection.
    pub fn apply(&self, collection: &mut CollectionSchema) -> Result<()> {
        match self {
            PatchOp::SetAttribute { attribute, value } => {
                collection.set_attribute(*attribute, value.clone())
            }
            PatchOp::InsertFieldAt { position, field } => collection
                .fields
                .insert_at(*position, field.clone())
                .map(|_| ()),
            PatchOp::RemoveFieldById { id } => collection.fields.remove_by_id(id).map(|_| ()),
        }
    }
}

impl std::fmt::Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchOp::SetAttribute { attribute, value } => match value {
                Some(_) => write!(f, "set {}", attribute),
                None => write!(f, "clear {}", attribute),
            },
            PatchOp::InsertFieldAt { position, field } => write!(
                f,
                "insert {} field '{}' ({}) at {}",
                field.kind, field.name, field.id, position
            ),
            PatchOp::RemoveFieldById { id } => write!(f, "remove field {}", id),
        }
    }
}

/// An ordered list of operations against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPatch {
    /// Id or name of the target collection.
    pub collection: String,

    /// Operations, applied in order.
    #[serde(default)]
    pub ops: Vec<PatchOp>,
}

impl CollectionPatch {
    /// Start an empty patch against a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ops: Vec::new(),
        }
    }

    /// Overwrite an attribute.
    pub fn set(mut self, attribute: CollectionAttribute, value: Option<&str>) -> Self {
        self.ops.push(PatchOp::SetAttribute {
            attribute,
            value: value.map(str::to_string),
        });
        self
    }

    /// Insert a field at a position.
    pub fn insert_field_at(mut self, position: usize, field: FieldDescriptor) -> Self {
        self.ops.push(PatchOp::InsertFieldAt { position, field });
        self
    }

    /// Remove a field by id.
    pub fn remove_field_by_id(mut self, id: impl Into<String>) -> Self {
        self.ops.push(PatchOp::RemoveFieldById { id: id.into() });
        self
    }

    /// Apply every operation in order. Stops at the first failure, leaving
    /// the collection partially patched; callers discard it on error.
    pub fn apply(&self, collection: &mut CollectionSchema) -> Result<()> {
        for op in &self.ops {
            op.apply(collection)?;
        }
        Ok(())
    }
}
