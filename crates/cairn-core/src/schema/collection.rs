use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::FieldList;
use crate::error::{CairnError, Result};

/// A named schema entity managed by the collection store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Stable collection id (e.g. `pbc_468398817`).
    pub id: String,

    /// Collection name.
    pub name: String,

    /// Collection kind.
    #[serde(rename = "type")]
    pub kind: CollectionKind,

    /// System collections are managed by the platform itself.
    #[serde(default)]
    pub system: bool,

    /// Fields in declaration order.
    #[serde(default)]
    pub fields: FieldList,

    /// Index definitions, kept verbatim.
    #[serde(default)]
    pub indexes: Vec<String>,

    // Rules are opaque expressions; `None` restricts the action to superusers.
    #[serde(default)]
    pub list_rule: Option<String>,

    #[serde(default)]
    pub view_rule: Option<String>,

    #[serde(default)]
    pub create_rule: Option<String>,

    #[serde(default)]
    pub update_rule: Option<String>,

    #[serde(default)]
    pub delete_rule: Option<String>,

    /// Backing query for view collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_query: Option<String>,

    /// Keys this model does not interpret (auth options, timestamps, ...),
    /// carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionSchema {
    /// Create an empty collection.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CollectionKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            system: false,
            fields: FieldList::default(),
            indexes: Vec::new(),
            list_rule: None,
            view_rule: None,
            create_rule: None,
            update_rule: None,
            delete_rule: None,
            view_query: None,
            extra: Map::new(),
        }
    }

    /// Whether `key` is this collection's id or name.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name == key
    }

    /// Current value of a settable attribute.
    pub fn attribute(&self, attribute: CollectionAttribute) -> Option<&str> {
        match attribute {
            CollectionAttribute::Name => Some(self.name.as_str()),
            CollectionAttribute::ViewQuery => self.view_query.as_deref(),
            CollectionAttribute::ListRule => self.list_rule.as_deref(),
            CollectionAttribute::ViewRule => self.view_rule.as_deref(),
            CollectionAttribute::CreateRule => self.create_rule.as_deref(),
            CollectionAttribute::UpdateRule => self.update_rule.as_deref(),
            CollectionAttribute::DeleteRule => self.delete_rule.as_deref(),
        }
    }

    /// Overwrite a settable attribute wholesale.
    pub fn set_attribute(
        &mut self,
        attribute: CollectionAttribute,
        value: Option<String>,
    ) -> Result<()> {
        let slot = match attribute {
            CollectionAttribute::Name => {
                self.name = value.ok_or_else(|| {
                    CairnError::Validation(format!("collection '{}' name cannot be null", self.id))
                })?;
                return Ok(());
            }
            CollectionAttribute::ViewQuery => &mut self.view_query,
            CollectionAttribute::ListRule => &mut self.list_rule,
            CollectionAttribute::ViewRule => &mut self.view_rule,
            CollectionAttribute::CreateRule => &mut self.create_rule,
            CollectionAttribute::UpdateRule => &mut self.update_rule,
            CollectionAttribute::DeleteRule => &mut self.delete_rule,
        };
        *slot = value;
        Ok(())
    }

    /// Structural checks run on save. Query and rule text is never inspected.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CairnError::Validation("collection id is empty".into()));
        }
        if self.name.trim().is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(CairnError::Validation(format!(
                "collection '{}' has an invalid name '{}'",
                self.id, self.name
            )));
        }

        match (self.kind, self.view_query.as_deref()) {
            (CollectionKind::View, None) => {
                return Err(CairnError::Validation(format!(
                    "view collection '{}' has no view query",
                    self.name
                )));
            }
            (CollectionKind::View, Some(query)) if query.trim().is_empty() => {
                return Err(CairnError::Validation(format!(
                    "view collection '{}' has an empty view query",
                    self.name
                )));
            }
            (CollectionKind::Base | CollectionKind::Auth, Some(_)) => {
                return Err(CairnError::Validation(format!(
                    "collection '{}' is not a view but has a view query",
                    self.name
                )));
            }
            _ => {}
        }

        self.fields
            .validate()
            .map_err(|e| match e {
                CairnError::Validation(msg) => {
                    CairnError::Validation(format!("collection '{}': {}", self.name, msg))
                }
                other => other,
            })
    }
}

/// Collection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Base,
    Auth,
    View,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::Base => write!(f, "base"),
            CollectionKind::Auth => write!(f, "auth"),
            CollectionKind::View => write!(f, "view"),
        }
    }
}

/// Collection attributes a migration may overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionAttribute {
    Name,
    ViewQuery,
    ListRule,
    ViewRule,
    CreateRule,
    UpdateRule,
    DeleteRule,
}

impl std::fmt::Display for CollectionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionAttribute::Name => write!(f, "name"),
            CollectionAttribute::ViewQuery => write!(f, "viewQuery"),
            CollectionAttribute::ListRule => write!(f, "listRule"),
            CollectionAttribute::ViewRule => write!(f, "viewRule"),
            CollectionAttribute::CreateRule => write!(f, "createRule"),
            CollectionAttribute::UpdateRule => write!(f, "updateRule"),
            CollectionAttribute::DeleteRule => write!(f, "deleteRule"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{FieldDescriptor, FieldKind};

    fn trail_like() -> CollectionSchema {
        let mut collection =
            CollectionSchema::new("pbc_1995454416", "trail_like", CollectionKind::Base);
        collection.view_rule = Some("actor.user = @request.auth.id".to_string());
        collection
    }

    #[test]
    fn test_parse_collection() {
        let collection: CollectionSchema = serde_json::from_str(
            r#"{
                "id": "pbc_468398817",
                "name": "timeline",
                "type": "view",
                "system": false,
                "fields": [
                    {"id": "text3208210256", "name": "id", "type": "text", "system": true},
                    {"id": "json2434853685", "name": "iri", "type": "json", "maxSize": 1}
                ],
                "indexes": [],
                "listRule": "",
                "viewRule": "",
                "createRule": null,
                "updateRule": null,
                "deleteRule": null,
                "viewQuery": "SELECT id, iri FROM trails"
            }"#,
        )
        .unwrap();

        assert_eq!(collection.kind, CollectionKind::View);
        assert_eq!(collection.fields.names(), vec!["id", "iri"]);
        assert_eq!(collection.list_rule.as_deref(), Some(""));
        assert!(collection.create_rule.is_none());
        assert!(collection.validate().is_ok());
    }

    #[test]
    fn test_matches_id_or_name() {
        let collection = trail_like();
        assert!(collection.matches("pbc_1995454416"));
        assert!(collection.matches("trail_like"));
        assert!(!collection.matches("trail"));
    }

    #[test]
    fn test_set_attribute() {
        let mut collection = trail_like();
        collection
            .set_attribute(CollectionAttribute::ViewRule, Some("true".into()))
            .unwrap();
        assert_eq!(collection.attribute(CollectionAttribute::ViewRule), Some("true"));

        collection
            .set_attribute(CollectionAttribute::DeleteRule, None)
            .unwrap();
        assert_eq!(collection.attribute(CollectionAttribute::DeleteRule), None);

        let err = collection
            .set_attribute(CollectionAttribute::Name, None)
            .unwrap_err();
        assert!(matches!(err, CairnError::Validation(_)));
        assert_eq!(collection.name, "trail_like");
    }

    #[test]
    fn test_validate_view_query_placement() {
        let mut collection = trail_like();
        collection.view_query = Some("SELECT 1".into());
        assert!(collection.validate().is_err());

        let view = CollectionSchema::new("pbc_1", "timeline", CollectionKind::View);
        assert!(view.validate().is_err());
    }

    #[test]
    fn test_validate_reports_collection_name() {
        let mut collection = trail_like();
        collection.fields = FieldList::new(vec![
            FieldDescriptor::new("a", "actor", FieldKind::Relation),
            FieldDescriptor::new("b", "actor", FieldKind::Relation),
        ]);
        let err = collection.validate().unwrap_err();
        assert!(err.to_string().contains("collection 'trail_like'"));
    }

    #[test]
    fn test_auth_collection_keeps_unmodelled_keys() {
        let input = serde_json::json!({
            "id": "_pb_users_auth_",
            "name": "users",
            "type": "auth",
            "system": false,
            "fields": [],
            "indexes": [],
            "listRule": "id = @request.auth.id",
            "viewRule": "id = @request.auth.id",
            "createRule": "",
            "updateRule": "id = @request.auth.id",
            "deleteRule": "id = @request.auth.id",
            "authRule": "verified = true",
            "manageRule": null,
            "passwordAuth": {"enabled": true, "identityFields": ["email"]},
            "authToken": {"duration": 604800},
            "created": "2025-01-01 00:00:00.000Z"
        });

        let collection: CollectionSchema = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(collection.kind, CollectionKind::Auth);
        assert_eq!(collection.extra["authRule"], serde_json::json!("verified = true"));

        let output = serde_json::to_value(&collection).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_null_rules_serialize_as_null() {
        let json = serde_json::to_value(CollectionSchema::new("c1", "c", CollectionKind::Base))
            .unwrap();
        assert!(json["createRule"].is_null());
        assert!(json.get("viewQuery").is_none());
    }
}
