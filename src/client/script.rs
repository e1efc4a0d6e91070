//! Backend-agnostic script identifiers.
//!
//! The sync engine only ever names an operation and supplies its parameters;
//! the active dialect turns each [`ScriptOp`] into a concrete script body.
//! Parameter names each op reads are listed on the variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::query::ast::FieldMatch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptOp {
    /// `updatedAt`
    SetUpdatedAt,
    /// `followers`: ids to append
    AddFollowers,
    /// `removedFollowers`: ids to drop
    RemoveFollowers,
    /// `<field>`: wholesale replacement, a null parameter drops the key
    ReplaceField(String),
    /// every parameter is written as a top-level key
    MergeFields,

    /// `<field>`: flat assignment into child documents
    PropagateField(String),
    RemovePropagatedField(String),
    /// `<field>`: reference set when the child has none or an inherited one
    PropagateEntityReferenceField(String),
    /// `<field>`, `<field>BeforeUpdate`
    UpdatePropagatedEntityReferenceField(String),
    /// `<field>`: removed only when the child's copy has the same id
    RemovePropagatedEntityReferenceField(String),
    /// `<param>` assigned at a dotted path such as `service.displayName`
    PropagateNestedField { path: String, param: String },
    /// `testSuites`
    PropagateTestSuites,
    /// `updatedOwners`: replaces the child's inherited owners, kept only when it has none of its own
    AddOwners,
    /// `deletedOwners`, `remainingOwners`: inherited copies of the deleted
    /// owners are dropped (all inherited ones when the list is empty); a child
    /// left without owners inherits the remaining ones
    RemoveOwners,

    /// `name`, `description`, `tagFQN`, `style`
    UpdateCertification,
    /// `tagAdded`, `tagDeleted`
    UpdateAddedDeletedGlossaryTags,
    /// `tagFQN`, `updates`
    UpdateTagsField,
    SoftDeleteRestore(bool),
    /// flags the document only when it belongs to a single dashboard
    DashboardMembershipSoftDelete(bool),
    /// `dashboardId`: drops the membership and flags the document once none remain
    DashboardMembershipDelete,
    RemoveDomainsChildren,
    /// `fqn`
    RemoveDataProductsChildren,
    /// `fqn`
    RemoveTagsChildren,
    /// `testSuiteId`
    RemoveTestSuiteChildren,
    /// `oldParentFQN`, `newParentFQN`: rewrites the prefix of the named field
    UpdateFqnPrefix(String),
}

/// Ordered script fragments plus the parameters they read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Script {
    pub ops: Vec<ScriptOp>,
    pub params: Map<String, Value>,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    pub fn of(op: ScriptOp) -> Self {
        Script {
            ops: vec![op],
            params: Map::new(),
        }
    }

    pub fn push(&mut self, op: ScriptOp) {
        self.ops.push(op);
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn contains(&self, op: &ScriptOp) -> bool {
        self.ops.contains(op)
    }
}

/// Which documents a partial update targets, before name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexTarget {
    /// The global alias every searchable index joins
    Global,
    /// Already cluster-qualified index or alias names
    Aliases(Vec<String>),
}

/// Update-by-query: documents in `target` matching `matcher` get `script` applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialUpdate {
    pub target: IndexTarget,
    pub matcher: FieldMatch,
    pub script: Script,
}

impl PartialUpdate {
    pub fn new(target: IndexTarget, matcher: FieldMatch, script: Script) -> Self {
        PartialUpdate {
            target,
            matcher,
            script,
        }
    }
}

#[cfg(test)]
pub(crate) fn every_op() -> Vec<ScriptOp> {
    vec![
        ScriptOp::SetUpdatedAt,
        ScriptOp::AddFollowers,
        ScriptOp::RemoveFollowers,
        ScriptOp::ReplaceField("usageSummary".into()),
        ScriptOp::ReplaceField("pipelineStatus".into()),
        ScriptOp::MergeFields,
        ScriptOp::PropagateField("disabled".into()),
        ScriptOp::RemovePropagatedField("disabled".into()),
        ScriptOp::PropagateEntityReferenceField("domain".into()),
        ScriptOp::UpdatePropagatedEntityReferenceField("domain".into()),
        ScriptOp::RemovePropagatedEntityReferenceField("domain".into()),
        ScriptOp::PropagateNestedField {
            path: "service.displayName".into(),
            param: "displayName".into(),
        },
        ScriptOp::PropagateTestSuites,
        ScriptOp::AddOwners,
        ScriptOp::RemoveOwners,
        ScriptOp::UpdateCertification,
        ScriptOp::UpdateAddedDeletedGlossaryTags,
        ScriptOp::UpdateTagsField,
        ScriptOp::SoftDeleteRestore(true),
        ScriptOp::DashboardMembershipSoftDelete(false),
        ScriptOp::DashboardMembershipDelete,
        ScriptOp::RemoveDomainsChildren,
        ScriptOp::RemoveDataProductsChildren,
        ScriptOp::RemoveTagsChildren,
        ScriptOp::RemoveTestSuiteChildren,
        ScriptOp::UpdateFqnPrefix("fullyQualifiedName".into()),
        ScriptOp::UpdateFqnPrefix("tags.tagFQN".into()),
    ]
}
