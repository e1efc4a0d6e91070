use serde_json::{json, Map, Value};
use crate::cascade::{CascadeContext, CascadeOp};
use crate::client::script::{IndexTarget, Script, ScriptOp};
use crate::core::entity::*;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::fqn;
use crate::core::types::{EntityReference, FieldChange, LabelType, TagLabel};
use crate::diff::inherited::inherited_field_changes;
use crate::query::ast::FieldMatch;

pub type UpdateCascade = fn(&CascadeContext) -> Result<Vec<CascadeOp>>;

/// Cascades run after every primary update, each a no-op when its
/// preconditions do not hold for the entity type or diff.
pub const UPDATE_CASCADES: [(&str, UpdateCascade); 4] = [
    ("inherited_fields", inherited_fields),
    ("glossary_tags", glossary_tags),
    ("certification", certification),
    ("related_entities", related_entities),
];

/// Every op of every update cascade, failing on the first planner error.
pub fn plan_update_cascades(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let mut ops = Vec::new();
    for (_, cascade) in UPDATE_CASCADES {
        ops.extend(cascade(ctx)?);
    }
    Ok(ops)
}

/// Children copying an inheritable field get the parent's new value.
///
/// Service children keep domain and displayName under `service`, so those
/// two are matched on `service.id`.
pub fn inherited_fields(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let Some(change) = ctx.change else {
        return Ok(Vec::new());
    };
    let update = inherited_field_changes(change, ctx.entity)?;
    let aliases = ctx.child_aliases();
    if update.is_empty() || aliases.is_empty() {
        return Ok(Vec::new());
    }

    let service_keyed = update.touches(FIELD_DOMAIN) || update.touches(FIELD_DISPLAY_NAME);
    let matcher = if service_keyed && is_service_type(ctx.entity_type()) {
        ctx.id_match("service.id")
    } else {
        ctx.parent_match()
    };
    Ok(vec![CascadeOp::update(IndexTarget::Aliases(aliases), matcher, update.script)])
}

fn derived(mut labels: Vec<TagLabel>) -> Vec<TagLabel> {
    for label in labels.iter_mut() {
        label.label_type = LabelType::Derived;
    }
    labels
}

/// Tags added to or removed from a glossary term follow it onto every
/// document carrying the term, always as derived labels.
pub fn glossary_tags(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let Some(change) = ctx.change else {
        return Ok(Vec::new());
    };
    if !ctx.entity_type().eq_ignore_ascii_case(GLOSSARY_TERM) {
        return Ok(Vec::new());
    }

    let is_propagated = |f: &&FieldChange| PROPAGATED_TAG_FIELDS.contains(&f.name.as_str());
    let mut script = Script::of(ScriptOp::UpdateAddedDeletedGlossaryTags);
    let mut touched = false;
    for field in change.fields_added.iter().filter(is_propagated) {
        let labels = derived(field.new_as::<Vec<TagLabel>>()?);
        script.set_param("tagAdded", serde_json::to_value(labels)?);
        touched = true;
    }
    for field in change.fields_deleted.iter().filter(is_propagated) {
        let labels = derived(field.old_as::<Vec<TagLabel>>()?);
        script.set_param("tagDeleted", serde_json::to_value(labels)?);
        touched = true;
    }
    if !touched {
        return Ok(Vec::new());
    }
    for key in ["tagAdded", "tagDeleted"] {
        if !script.params.contains_key(key) {
            script.set_param(key, json!([]));
        }
    }

    Ok(vec![CascadeOp::update(
        IndexTarget::Global,
        FieldMatch::new("tags.tagFQN", ctx.entity.fully_qualified_name()),
        script,
    )])
}

fn classification_of(json: &Map<String, Value>, tag_fqn: &str) -> Option<String> {
    let classification = json.get("classification");
    classification
        .and_then(|c| c.get(FIELD_FULLY_QUALIFIED_NAME).or_else(|| c.get(FIELD_NAME)))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| fqn::parent(tag_fqn))
}

/// Fully-qualified name a renamed sibling had before the change.
fn renamed_fqn(current_fqn: &str, old_name: &str) -> Result<String> {
    match fqn::parent(current_fqn) {
        Some(parent) => fqn::add(&parent, old_name),
        None => fqn::quote_name(old_name),
    }
}

/// Certification tags are denormalized into the certification block of
/// every certified document.
pub fn certification(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let Some(change) = ctx.change else {
        return Ok(Vec::new());
    };
    if !ctx.entity_type().eq_ignore_ascii_case(TAG) {
        return Ok(Vec::new());
    }
    let json = ctx.entity.to_json()?;
    let tag_fqn = ctx.entity.fully_qualified_name();
    let in_certification = classification_of(&json, tag_fqn)
        .is_some_and(|c| fqn::unquote_name(&c) == CERTIFICATION_CLASSIFICATION);
    let relevant = [FIELD_NAME, FIELD_DESCRIPTION, FIELD_STYLE, FIELD_DISPLAY_NAME]
        .iter()
        .any(|field| change.touches(field));
    if !in_certification || !relevant {
        return Ok(Vec::new());
    }

    let renamed = change.fields_updated.iter().find(|f| f.name == FIELD_NAME);
    let matched_fqn = match renamed.and_then(FieldChange::old_text) {
        Some(old_name) => renamed_fqn(tag_fqn, &old_name)?,
        None => tag_fqn.to_string(),
    };

    let field = |key: &str| json.get(key).cloned().unwrap_or(Value::Null);
    let script = Script::of(ScriptOp::UpdateCertification)
        .param("name", Value::String(ctx.entity.name().to_string()))
        .param("description", field(FIELD_DESCRIPTION))
        .param("tagFQN", Value::String(tag_fqn.to_string()))
        .param("style", field(FIELD_STYLE));

    Ok(vec![CascadeOp::update(
        IndexTarget::Global,
        FieldMatch::new("certification.tagLabel.tagFQN", matched_fqn),
        script,
    )])
}

/// Page hierarchy moves and tag-like renames rewrite names held by other documents.
pub fn related_entities(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    if ctx.change.is_none() {
        return Ok(Vec::new());
    }
    let entity_type = ctx.entity_type();
    if entity_type.eq_ignore_ascii_case(PAGE) {
        page_hierarchy(ctx)
    } else if [CLASSIFICATION, GLOSSARY, GLOSSARY_TERM, TAG]
        .iter()
        .any(|t| t.eq_ignore_ascii_case(entity_type))
    {
        tag_usage(ctx)
    } else {
        Ok(Vec::new())
    }
}

fn previous_parent_fqn(field: &FieldChange) -> Result<String> {
    let parent: EntityReference = field.old_as()?;
    parent.fully_qualified_name.ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidArgument,
            format!("previous '{}' reference has no fullyQualifiedName", field.name),
        )
    })
}

fn page_hierarchy(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let Some(change) = ctx.change else {
        return Ok(Vec::new());
    };
    let index = ctx.registry.index_name(ctx.entity_type())?;
    let name = ctx.entity.name();
    let current_fqn = ctx.entity.fully_qualified_name();
    let rewrite = |old_prefix: String, new_prefix: &str| CascadeOp::UpdateByFqnPrefix {
        index: index.clone(),
        old_prefix,
        new_prefix: new_prefix.to_string(),
        field: FIELD_FULLY_QUALIFIED_NAME.to_string(),
    };
    let is_parent = |f: &&FieldChange| f.name.contains(FIELD_PARENT);

    let mut ops = Vec::new();
    for _ in change.fields_added.iter().filter(is_parent) {
        ops.push(rewrite(name.to_string(), current_fqn));
    }
    for field in change.fields_updated.iter().filter(is_parent) {
        let old_fqn = fqn::add(&previous_parent_fqn(field)?, name)?;
        ops.push(rewrite(old_fqn, current_fqn));
    }
    for field in change.fields_deleted.iter().filter(is_parent) {
        let old_fqn = fqn::add(&previous_parent_fqn(field)?, name)?;
        ops.push(rewrite(old_fqn, ""));
    }
    Ok(ops)
}

fn tag_usage(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let Some(change) = ctx.change else {
        return Ok(Vec::new());
    };
    let current_fqn = ctx.entity.fully_qualified_name();
    let mut ops = Vec::new();
    for field in &change.fields_updated {
        if field.name == FIELD_NAME {
            let (Some(old_name), Some(new_name)) = (field.old_text(), field.new_text()) else {
                continue;
            };
            ops.push(CascadeOp::UpdateByFqnPrefix {
                index: ctx.registry.global_alias(),
                old_prefix: renamed_fqn(current_fqn, &old_name)?,
                new_prefix: renamed_fqn(current_fqn, &new_name)?,
                field: "tags.tagFQN".to_string(),
            });
        } else if field.name == FIELD_DISPLAY_NAME {
            let display_name = field.new_text().map(Value::String).unwrap_or(Value::Null);
            let script = Script::of(ScriptOp::UpdateTagsField)
                .param("tagFQN", Value::String(current_fqn.to_string()))
                .param("updates", json!({ "displayName": display_name }));
            ops.push(CascadeOp::update(
                IndexTarget::Global,
                FieldMatch::new("tags.tagFQN", current_fqn),
                script,
            ));
        }
    }
    Ok(ops)
}
