//! Inheritable-field changes turned into a script for child documents.

use std::collections::BTreeSet;
use serde_json::Value;
use tracing::debug;
use crate::client::script::{Script, ScriptOp};
use crate::core::entity::{
    is_inheritable_field, is_service_type, EntityInterface, FIELD_DISPLAY_NAME, FIELD_OWNERS,
    FIELD_TEST_SUITES,
};
use crate::core::error::Result;
use crate::core::types::{decode_value, ChangeDescription, EntityReference, FieldChange};

/// Script for child documents plus the inheritable fields it touches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InheritedFieldUpdate {
    pub script: Script,
    pub fields: BTreeSet<String>,
}

impl InheritedFieldUpdate {
    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    pub fn touches(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Where a child document keeps its copy of the parent's `field`.
pub fn field_path(entity_type: &str, field: &str) -> String {
    if is_service_type(entity_type) {
        format!("service.{}", field)
    } else {
        format!("{}.{}", entity_type, field)
    }
}

fn inherited(mut reference: EntityReference) -> EntityReference {
    reference.inherited = Some(true);
    reference
}

fn inherited_owners(entity: &dyn EntityInterface) -> Vec<EntityReference> {
    entity.owners().iter().cloned().map(inherited).collect()
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// JSON-encoded strings are decoded, anything else is passed as is.
fn plain(value: Option<&Value>) -> Value {
    match value {
        Some(v) => decode_value::<Value>(v).unwrap_or_else(|_| v.clone()),
        None => Value::Null,
    }
}

/// Scalar fallbacks used when a value does not have the reference shape.
fn push_flat(update: &mut InheritedFieldUpdate, entity_type: &str, change: &FieldChange) {
    let name = change.name.as_str();
    if name == FIELD_TEST_SUITES {
        update.script.push(ScriptOp::PropagateTestSuites);
        update.script.set_param(FIELD_TEST_SUITES, plain(change.new_value.as_ref()));
    } else if name == FIELD_DISPLAY_NAME {
        update.script.push(ScriptOp::PropagateNestedField {
            path: field_path(entity_type, name),
            param: name.to_string(),
        });
        update
            .script
            .set_param(name, change.new_text().map(Value::String).unwrap_or(Value::Null));
    } else {
        update.script.push(ScriptOp::PropagateField(name.to_string()));
        update.script.set_param(name, plain(change.new_value.as_ref()));
    }
}

/// Builds the child-document script for every inheritable field in `change`.
///
/// A value that cannot be read as an entity reference falls back to a
/// whole-field assignment instead of failing the update.
pub fn inherited_field_changes(
    change: &ChangeDescription,
    entity: &dyn EntityInterface,
) -> Result<InheritedFieldUpdate> {
    let mut update = InheritedFieldUpdate::default();
    let entity_type = entity.entity_type();

    for field in change.fields_deleted.iter().filter(|f| is_inheritable_field(&f.name)) {
        update.fields.insert(field.name.clone());
        if field.name == FIELD_OWNERS {
            let deleted: Vec<EntityReference> = field.old_as().unwrap_or_else(|e| {
                debug!(error = %e, "deleted owners unreadable, dropping every inherited owner");
                Vec::new()
            });
            update.script.push(ScriptOp::RemoveOwners);
            update.script.set_param("deletedOwners", to_value(&deleted)?);
            update.script.set_param("remainingOwners", to_value(inherited_owners(entity))?);
            continue;
        }
        match field.old_as::<EntityReference>() {
            Ok(reference) => {
                update
                    .script
                    .push(ScriptOp::RemovePropagatedEntityReferenceField(field.name.clone()));
                update.script.set_param(field.name.clone(), to_value(reference)?);
            }
            Err(_) => update.script.push(ScriptOp::RemovePropagatedField(field.name.clone())),
        }
    }

    for field in change.fields_updated.iter().filter(|f| is_inheritable_field(&f.name)) {
        update.fields.insert(field.name.clone());
        if field.name == FIELD_OWNERS {
            update.script.push(ScriptOp::AddOwners);
            update.script.set_param("updatedOwners", to_value(inherited_owners(entity))?);
            continue;
        }
        match (field.old_as::<EntityReference>(), field.new_as::<EntityReference>()) {
            (Ok(before), Ok(after)) => {
                update
                    .script
                    .push(ScriptOp::UpdatePropagatedEntityReferenceField(field.name.clone()));
                update.script.set_param(format!("{}BeforeUpdate", field.name), to_value(before)?);
                update.script.set_param(field.name.clone(), to_value(inherited(after))?);
            }
            _ => push_flat(&mut update, entity_type, field),
        }
    }

    for field in change.fields_added.iter().filter(|f| is_inheritable_field(&f.name)) {
        update.fields.insert(field.name.clone());
        if field.name == FIELD_OWNERS {
            update.script.push(ScriptOp::AddOwners);
            update.script.set_param("updatedOwners", to_value(inherited_owners(entity))?);
            continue;
        }
        match field.new_as::<EntityReference>() {
            Ok(reference) => {
                update
                    .script
                    .push(ScriptOp::PropagateEntityReferenceField(field.name.clone()));
                update.script.set_param(field.name.clone(), to_value(inherited(reference))?);
            }
            Err(_) => push_flat(&mut update, entity_type, field),
        }
    }

    // owners added and updated in one diff would queue the same op twice
    update.script.ops.dedup();
    Ok(update)
}
