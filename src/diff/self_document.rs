//! Incremental patches applied to the changed entity's own document.

use serde_json::{Map, Value};
use crate::client::script::{Script, ScriptOp};
use crate::core::entity::{
    EntityInterface, FIELD_FOLLOWERS, FIELD_PIPELINE_STATUS, FIELD_QUERY_USED_IN,
    FIELD_TEST_SUITES, FIELD_UPDATED_AT, FIELD_USAGE_SUMMARY, FIELD_VOTES, QUERY,
};
use crate::core::error::Result;
use crate::core::types::{ChangeDescription, EntityReference, FieldChange};

/// Fields copied wholesale from the entity when they change.
const REPLACED_FIELDS: [&str; 4] = [
    FIELD_USAGE_SUMMARY,
    FIELD_VOTES,
    FIELD_PIPELINE_STATUS,
    FIELD_TEST_SUITES,
];

fn replaces(entity_type: &str, field: &str) -> bool {
    REPLACED_FIELDS.contains(&field) || (field == FIELD_QUERY_USED_IN && entity_type == QUERY)
}

fn follower_ids(references: Vec<EntityReference>) -> Value {
    Value::Array(
        references
            .into_iter()
            .map(|r| Value::String(r.id.to_string()))
            .collect(),
    )
}

/// Follower changes carry either references or bare ids.
fn read_followers(change: &FieldChange, old: bool) -> Option<Value> {
    let references = if old { change.old_as::<Vec<EntityReference>>() } else { change.new_as() };
    if let Ok(references) = references {
        return Some(follower_ids(references));
    }
    let ids = if old { change.old_as::<Vec<String>>() } else { change.new_as() };
    ids.ok().map(|ids| Value::Array(ids.into_iter().map(Value::String).collect()))
}

fn replace(script: &mut Script, json: &Map<String, Value>, field: &str) {
    let op = ScriptOp::ReplaceField(field.to_string());
    if !script.contains(&op) {
        script.push(op);
    }
    script.set_param(field, json.get(field).cloned().unwrap_or(Value::Null));
}

/// Patch script for the entity's own document, or `None` when some changed
/// field has no incremental rule and the document must be rebuilt.
pub fn self_document_patch(
    entity: &dyn EntityInterface,
    change: &ChangeDescription,
) -> Result<Option<Script>> {
    if change.is_empty() {
        return Ok(None);
    }
    let entity_type = entity.entity_type();
    let json = entity.to_json()?;

    let mut script = Script::of(ScriptOp::SetUpdatedAt);
    script.set_param(FIELD_UPDATED_AT, Value::from(entity.updated_at()));

    for field in &change.fields_added {
        if field.name == FIELD_FOLLOWERS {
            let Some(ids) = read_followers(field, false) else {
                return Ok(None);
            };
            script.push(ScriptOp::AddFollowers);
            script.set_param(FIELD_FOLLOWERS, ids);
        } else if replaces(entity_type, &field.name) {
            replace(&mut script, &json, &field.name);
        } else {
            return Ok(None);
        }
    }

    for field in &change.fields_updated {
        if replaces(entity_type, &field.name) {
            replace(&mut script, &json, &field.name);
        } else {
            return Ok(None);
        }
    }

    for field in &change.fields_deleted {
        if field.name == FIELD_FOLLOWERS {
            let Some(ids) = read_followers(field, true) else {
                return Ok(None);
            };
            script.push(ScriptOp::RemoveFollowers);
            script.set_param("removedFollowers", ids);
        } else if replaces(entity_type, &field.name) {
            replace(&mut script, &json, &field.name);
        } else {
            return Ok(None);
        }
    }

    Ok(Some(script))
}
