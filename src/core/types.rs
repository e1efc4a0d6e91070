use std::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for DocId {
    fn from(id: Uuid) -> Self {
        DocId(id.to_string())
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A search document: the id it is stored under plus its `_source` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: DocId) -> Self {
        Document {
            id,
            fields: Map::new(),
        }
    }

    pub fn from_fields(id: DocId, fields: Map<String, Value>) -> Self {
        Document { id, fields }
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn source(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Lightweight pointer to an entity, as embedded in other entities and documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited: Option<bool>,
}

impl EntityReference {
    pub fn new(id: Uuid, entity_type: impl Into<String>) -> Self {
        EntityReference {
            id,
            entity_type: entity_type.into(),
            name: None,
            fully_qualified_name: None,
            display_name: None,
            description: None,
            deleted: None,
            inherited: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fqn(mut self, fqn: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(fqn.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LabelType {
    #[default]
    Manual,
    Propagated,
    Automated,
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TagSource {
    #[default]
    Classification,
    Glossary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LabelState {
    Suggested,
    #[default]
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagLabel {
    #[serde(rename = "tagFQN")]
    pub tag_fqn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default)]
    pub source: TagSource,
    #[serde(default)]
    pub label_type: LabelType,
    #[serde(default)]
    pub state: LabelState,
}

impl TagLabel {
    pub fn new(tag_fqn: impl Into<String>, source: TagSource) -> Self {
        TagLabel {
            tag_fqn: tag_fqn.into(),
            name: None,
            display_name: None,
            description: None,
            style: None,
            source,
            label_type: LabelType::Manual,
            state: LabelState::Confirmed,
        }
    }
}

/// Reads a diff value that is either inline JSON or a JSON-encoded string.
pub fn decode_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    let decoded = match value {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|e| {
        Error::new(ErrorKind::Parse, format!("unexpected field value shape: {}", e)).with_source(e)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl FieldChange {
    pub fn added(name: impl Into<String>, new_value: Value) -> Self {
        FieldChange {
            name: name.into(),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn updated(name: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        FieldChange {
            name: name.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn deleted(name: impl Into<String>, old_value: Value) -> Self {
        FieldChange {
            name: name.into(),
            old_value: Some(old_value),
            new_value: None,
        }
    }

    pub fn old_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.old_value {
            Some(value) => decode_value(value),
            None => Err(Error::new(
                ErrorKind::Parse,
                format!("field '{}' carries no old value", self.name),
            )),
        }
    }

    pub fn new_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.new_value {
            Some(value) => decode_value(value),
            None => Err(Error::new(
                ErrorKind::Parse,
                format!("field '{}' carries no new value", self.name),
            )),
        }
    }

    /// Old value rendered as plain text (string values are unquoted).
    pub fn old_text(&self) -> Option<String> {
        self.old_value.as_ref().map(value_text)
    }

    pub fn new_text(&self) -> Option<String> {
        self.new_value.as_ref().map(value_text)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    #[serde(default)]
    pub fields_added: Vec<FieldChange>,
    #[serde(default)]
    pub fields_updated: Vec<FieldChange>,
    #[serde(default)]
    pub fields_deleted: Vec<FieldChange>,
    #[serde(default)]
    pub previous_version: f64,
}

impl ChangeDescription {
    pub fn new(previous_version: f64) -> Self {
        ChangeDescription {
            previous_version,
            ..Default::default()
        }
    }

    pub fn with_added(mut self, change: FieldChange) -> Self {
        self.fields_added.push(change);
        self
    }

    pub fn with_updated(mut self, change: FieldChange) -> Self {
        self.fields_updated.push(change);
        self
    }

    pub fn with_deleted(mut self, change: FieldChange) -> Self {
        self.fields_deleted.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty()
            && self.fields_updated.is_empty()
            && self.fields_deleted.is_empty()
    }

    pub fn all_changes(&self) -> impl Iterator<Item = &FieldChange> {
        self.fields_added
            .iter()
            .chain(self.fields_updated.iter())
            .chain(self.fields_deleted.iter())
    }

    pub fn touches(&self, field: &str) -> bool {
        self.all_changes().any(|change| change.name == field)
    }
}
