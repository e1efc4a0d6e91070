//! Change diff interpreter: what a mutation means for the changed
//! document itself and for the child documents that copy its fields.

pub mod inherited;
pub mod self_document;

pub use inherited::{field_path, inherited_field_changes, InheritedFieldUpdate};
pub use self_document::self_document_patch;

use crate::client::script::Script;
use crate::core::entity::EntityInterface;
use crate::core::error::Result;
use crate::core::types::ChangeDescription;

/// How the primary document of an update gets written.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    Patch(Script),
    Rebuild,
}

/// The incremental description when it has changes, the full one otherwise.
pub fn select_change_description(entity: &dyn EntityInterface) -> Option<&ChangeDescription> {
    match entity.incremental_change_description() {
        Some(incremental) if !incremental.is_empty() => Some(incremental),
        _ => entity.change_description(),
    }
}

/// The stored version chains onto the recorded change: the entity's version
/// equals the previous version of its full change description.
pub fn is_patch_eligible(entity: &dyn EntityInterface) -> bool {
    entity
        .change_description()
        .is_some_and(|change| change.previous_version == entity.version())
}

/// Decides between an incremental patch and a full rebuild for `entity`.
pub fn plan_document_write(entity: &dyn EntityInterface) -> Result<DocumentWrite> {
    let Some(change) = select_change_description(entity) else {
        return Ok(DocumentWrite::Rebuild);
    };
    if !is_patch_eligible(entity) {
        return Ok(DocumentWrite::Rebuild);
    }
    Ok(match self_document_patch(entity, change)? {
        Some(script) => DocumentWrite::Patch(script),
        None => DocumentWrite::Rebuild,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::script::ScriptOp;
    use crate::core::entity::{EntityRecord, TABLE};
    use crate::core::types::FieldChange;
    use serde_json::json;

    fn votes_change(previous_version: f64) -> ChangeDescription {
        ChangeDescription::new(previous_version)
            .with_updated(FieldChange::updated("votes", json!({}), json!({"upVotes": 1})))
    }

    #[test]
    fn test_incremental_preferred_when_non_empty() {
        let full = ChangeDescription::new(0.1)
            .with_updated(FieldChange::updated("description", json!("a"), json!("b")));
        let entity = EntityRecord::new(TABLE, "orders", "svc.db.orders")
            .with_change_description(full.clone())
            .with_incremental_change_description(votes_change(0.1));
        assert_eq!(select_change_description(&entity), Some(&votes_change(0.1)));

        let entity = entity.with_incremental_change_description(ChangeDescription::new(0.2));
        assert_eq!(select_change_description(&entity), Some(&full));
    }

    #[test]
    fn test_contiguous_version_patches() {
        let entity = EntityRecord::new(TABLE, "orders", "svc.db.orders")
            .with_version(0.2)
            .with_change_description(votes_change(0.2));
        match plan_document_write(&entity).unwrap() {
            DocumentWrite::Patch(script) => {
                assert!(script.contains(&ScriptOp::ReplaceField("votes".into())))
            }
            DocumentWrite::Rebuild => panic!("expected an incremental patch"),
        }
    }

    #[test]
    fn test_broken_version_chain_rebuilds() {
        let entity = EntityRecord::new(TABLE, "orders", "svc.db.orders")
            .with_version(0.3)
            .with_change_description(votes_change(0.1));
        assert_eq!(plan_document_write(&entity).unwrap(), DocumentWrite::Rebuild);
    }

    #[test]
    fn test_missing_change_description_rebuilds() {
        let entity = EntityRecord::new(TABLE, "orders", "svc.db.orders");
        assert!(!is_patch_eligible(&entity));
        assert_eq!(plan_document_write(&entity).unwrap(), DocumentWrite::Rebuild);
    }
}
