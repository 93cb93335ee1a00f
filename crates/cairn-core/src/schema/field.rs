use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CairnError, Result};

/// Definition of a collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Stable field id (e.g. `json2434853685`).
    pub id: String,

    /// Field name, unique within its collection.
    pub name: String,

    /// Field type.
    #[serde(rename = "type")]
    pub kind: FieldKind,

    /// Hidden from API responses.
    #[serde(default)]
    pub hidden: bool,

    /// Used as the record label in admin views.
    #[serde(default)]
    pub presentable: bool,

    /// Whether a value is required.
    #[serde(default)]
    pub required: bool,

    /// System fields cannot be renamed or removed from the admin UI.
    #[serde(default)]
    pub system: bool,

    /// Type-specific options (`maxSize`, `collectionId`, `values`, ...), kept verbatim.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl FieldDescriptor {
    /// Create a new field descriptor with default flags and no options.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            hidden: false,
            presentable: false,
            required: false,
            system: false,
            options: Map::new(),
        }
    }

    /// Set a type-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as a system field.
    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }
}

/// Field types known to the collection store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Email,
    Url,
    Editor,
    Date,
    Autodate,
    Select,
    File,
    Relation,
    Json,
    Password,
    GeoPoint,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::Editor => "editor",
            FieldKind::Date => "date",
            FieldKind::Autodate => "autodate",
            FieldKind::Select => "select",
            FieldKind::File => "file",
            FieldKind::Relation => "relation",
            FieldKind::Json => "json",
            FieldKind::Password => "password",
            FieldKind::GeoPoint => "geoPoint",
        };
        write!(f, "{}", name)
    }
}

/// Ordered list of fields. Position is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldList(Vec<FieldDescriptor>);

impl FieldList {
    /// Create a field list in the given order.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self(fields)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.0.iter()
    }

    /// Get a field by id.
    pub fn get_by_id(&self, id: &str) -> Option<&FieldDescriptor> {
        self.0.iter().find(|f| f.id == id)
    }

    /// Get a field by name.
    pub fn get_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.iter().find(|f| f.name == name)
    }

    /// Position of the field with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|f| f.id == id)
    }

    /// Field names in order.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.name.as_str()).collect()
    }

    /// Insert a field at `position`, appending when the position is past the end.
    ///
    /// Returns the index the field ended up at. Fails if a field with the
    /// same id is already present.
    pub fn insert_at(&mut self, position: usize, field: FieldDescriptor) -> Result<usize> {
        if self.get_by_id(&field.id).is_some() {
            return Err(CairnError::Validation(format!(
                "field id '{}' already exists",
                field.id
            )));
        }

        let index = position.min(self.0.len());
        self.0.insert(index, field);
        Ok(index)
    }

    /// Remove the field with the given id.
    ///
    /// An absent id is an error rather than a silent no-op.
    pub fn remove_by_id(&mut self, id: &str) -> Result<FieldDescriptor> {
        let index = self
            .position_of(id)
            .ok_or_else(|| CairnError::NotFound(format!("field '{}'", id)))?;
        Ok(self.0.remove(index))
    }

    /// Check that ids and names are present and unique.
    pub fn validate(&self) -> Result<()> {
        let mut ids = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();

        for field in &self.0 {
            if field.id.trim().is_empty() {
                return Err(CairnError::Validation(format!(
                    "field '{}' has an empty id",
                    field.name
                )));
            }
            if field.name.trim().is_empty() {
                return Err(CairnError::Validation(format!(
                    "field '{}' has an empty name",
                    field.id
                )));
            }
            if !ids.insert(field.id.as_str()) {
                return Err(CairnError::Validation(format!(
                    "duplicate field id '{}'",
                    field.id
                )));
            }
            if !names.insert(field.name.as_str()) {
                return Err(CairnError::Validation(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
