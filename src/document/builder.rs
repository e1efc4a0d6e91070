use std::collections::HashMap;
use serde_json::{Map, Value};
use crate::core::entity::{
    EntityInterface, TimeSeriesEntity, FIELD_CHANGE_DESCRIPTION, FIELD_DISPLAY_NAME,
    FIELD_FOLLOWERS, FIELD_FULLY_QUALIFIED_NAME, FIELD_ID, FIELD_INCREMENTAL_CHANGE_DESCRIPTION,
    FIELD_NAME, FIELD_OWNERS,
};
use crate::core::error::{Error, Result};
use crate::core::fqn;
use crate::core::types::{DocId, Document};
use crate::document::builders;
use crate::document::suggest::{entity_suggestions, fqn_parts};

pub const FIELD_ENTITY_TYPE: &str = "entityType";
pub const FIELD_SUGGEST: &str = "suggest";
pub const FIELD_FQN_PARTS: &str = "fqnParts";
pub const FIELD_FQN_DEPTH: &str = "fqnDepth";

/// Change history never reaches the index.
const ALWAYS_EXCLUDED: [&str; 2] = [FIELD_CHANGE_DESCRIPTION, FIELD_INCREMENTAL_CHANGE_DESCRIPTION];

/// Serialized entity plus the identity fields every builder needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntity {
    pub entity_type: String,
    pub id: String,
    pub name: String,
    pub fully_qualified_name: String,
    pub body: Map<String, Value>,
    pub time_series: bool,
}

impl SourceEntity {
    pub fn from_entity(entity: &dyn EntityInterface) -> Result<Self> {
        Ok(SourceEntity {
            entity_type: entity.entity_type().to_string(),
            id: entity.id().to_string(),
            name: entity.name().to_string(),
            fully_qualified_name: entity.fully_qualified_name().to_string(),
            body: entity.to_json()?,
            time_series: false,
        })
    }

    pub fn from_time_series(entity: &dyn TimeSeriesEntity) -> Result<Self> {
        let body = entity.to_json()?;
        let name = body.get(FIELD_NAME).and_then(Value::as_str).unwrap_or_default().to_string();
        let fully_qualified_name = body
            .get(FIELD_FULLY_QUALIFIED_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(SourceEntity {
            entity_type: entity.entity_type().to_string(),
            id: entity.id().to_string(),
            name,
            fully_qualified_name,
            body,
            time_series: true,
        })
    }
}

/// Type-specific enrichment run after the common steps.
pub type Enricher = fn(&SourceEntity, &mut Map<String, Value>) -> Result<()>;

/// Builds the search document of one entity type.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    pub entity_type: String,
    pub excluded_fields: Vec<&'static str>,
    pub enrichers: Vec<Enricher>,
}

impl DocumentBuilder {
    pub fn new(entity_type: impl Into<String>) -> Self {
        DocumentBuilder {
            entity_type: entity_type.into(),
            excluded_fields: Vec::new(),
            enrichers: Vec::new(),
        }
    }

    pub fn exclude(mut self, fields: &[&'static str]) -> Self {
        self.excluded_fields.extend_from_slice(fields);
        self
    }

    pub fn enrich(mut self, enricher: Enricher) -> Self {
        self.enrichers.push(enricher);
        self
    }

    /// Complete document for `source`; independent of anything indexed before.
    pub fn build(&self, source: &SourceEntity) -> Result<Document> {
        let mut fields = source.body.clone();

        normalize_owners(&mut fields);
        normalize_followers(&mut fields);
        for field in ALWAYS_EXCLUDED.iter().chain(self.excluded_fields.iter()) {
            fields.remove(*field);
        }

        if !source.time_series {
            let suggest = entity_suggestions(&source.name, &source.fully_qualified_name);
            let parts = fqn_parts(&source.fully_qualified_name, &suggest);
            fields.insert(FIELD_SUGGEST.to_string(), serde_json::to_value(&suggest)?);
            fields.insert(FIELD_FQN_PARTS.to_string(), serde_json::to_value(&parts)?);
            fields.insert(
                FIELD_FQN_DEPTH.to_string(),
                Value::from(fqn::split(&source.fully_qualified_name).len()),
            );
        }

        for enricher in &self.enrichers {
            enricher(source, &mut fields)?;
        }

        fields.insert(FIELD_ENTITY_TYPE.to_string(), Value::String(self.entity_type.clone()));
        Ok(Document::from_fields(DocId::new(source.id.clone()), fields))
    }
}

/// Owner references always carry a display name, falling back to the name.
fn normalize_owners(fields: &mut Map<String, Value>) {
    let Some(Value::Array(owners)) = fields.get_mut(FIELD_OWNERS) else {
        return;
    };
    for owner in owners.iter_mut() {
        let Some(owner) = owner.as_object_mut() else { continue };
        let has_display_name = owner
            .get(FIELD_DISPLAY_NAME)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if has_display_name {
            continue;
        }
        if let Some(name) = owner.get(FIELD_NAME).cloned() {
            owner.insert(FIELD_DISPLAY_NAME.to_string(), name);
        }
    }
}

/// Followers are indexed as bare ids so incremental patches can add and remove them.
fn normalize_followers(fields: &mut Map<String, Value>) {
    let Some(Value::Array(followers)) = fields.get_mut(FIELD_FOLLOWERS) else {
        return;
    };
    let ids: Vec<Value> = followers
        .iter()
        .filter_map(|f| match f {
            Value::String(_) => Some(f.clone()),
            other => other.get(FIELD_ID).cloned(),
        })
        .collect();
    *followers = ids;
}

/// Entity type to builder.
pub struct DocumentBuilderRegistry {
    builders: HashMap<String, DocumentBuilder>,
}

impl DocumentBuilderRegistry {
    pub fn new() -> Self {
        let mut registry = DocumentBuilderRegistry::empty();
        registry.register_defaults();
        registry
    }

    pub fn empty() -> Self {
        DocumentBuilderRegistry {
            builders: HashMap::new(),
        }
    }

    fn register_defaults(&mut self) {
        for builder in builders::default_builders() {
            self.register(builder);
        }
    }

    pub fn register(&mut self, builder: DocumentBuilder) {
        self.builders.insert(builder.entity_type.clone(), builder);
    }

    pub fn get(&self, entity_type: &str) -> Option<&DocumentBuilder> {
        self.builders.get(entity_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.builders.contains_key(entity_type)
    }

    pub fn build(&self, source: &SourceEntity) -> Result<Document> {
        self.get(&source.entity_type)
            .ok_or_else(|| {
                Error::not_found(format!("no document builder for entity type '{}'", source.entity_type))
            })?
            .build(source)
    }

    pub fn build_entity(&self, entity: &dyn EntityInterface) -> Result<Document> {
        self.build(&SourceEntity::from_entity(entity)?)
    }

    pub fn build_time_series(&self, entity: &dyn TimeSeriesEntity) -> Result<Document> {
        self.build(&SourceEntity::from_time_series(entity)?)
    }
}

impl Default for DocumentBuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
