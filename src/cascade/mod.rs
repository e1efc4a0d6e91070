//! Secondary writes that keep denormalized copies in other documents in
//! line with a primary mutation.
//!
//! Planning is pure: the functions in [`update`] and the rules in
//! [`delete`] turn a mutation into [`CascadeOp`]s without touching the
//! backend. The sync facade applies each op on its own so that one failing
//! cascade never prevents the others.

pub mod delete;
pub mod update;

pub use delete::{DeleteRule, DeleteRuleRegistry};
pub use update::{plan_update_cascades, UpdateCascade, UPDATE_CASCADES};

use crate::client::script::{IndexTarget, PartialUpdate, Script};
use crate::client::search_client::SearchClient;
use crate::core::entity::EntityInterface;
use crate::core::error::Result;
use crate::core::types::ChangeDescription;
use crate::query::ast::FieldMatch;
use crate::schema::mapping::IndexMapping;
use crate::schema::registry::IndexMappingRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOp {
    /// Update-by-query with a script
    Update(PartialUpdate),
    /// Hard delete of every document matching all predicates
    DeleteByFields {
        aliases: Vec<String>,
        matchers: Vec<FieldMatch>,
    },
    /// Deleted-flag toggle on every document matching all predicates
    SoftDeleteChildren {
        aliases: Vec<String>,
        matchers: Vec<FieldMatch>,
        script: Script,
    },
    /// Prefix rewrite of `field` inside `index`
    UpdateByFqnPrefix {
        index: String,
        old_prefix: String,
        new_prefix: String,
        field: String,
    },
}

impl CascadeOp {
    pub fn update(target: IndexTarget, matcher: FieldMatch, script: Script) -> Self {
        CascadeOp::Update(PartialUpdate::new(target, matcher, script))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CascadeOp::Update(_) => "update_children",
            CascadeOp::DeleteByFields { .. } => "delete_by_fields",
            CascadeOp::SoftDeleteChildren { .. } => "soft_delete_children",
            CascadeOp::UpdateByFqnPrefix { .. } => "update_by_fqn_prefix",
        }
    }

    /// Index or alias names this op writes to, with the global alias resolved.
    pub fn targets(&self, registry: &IndexMappingRegistry) -> Vec<String> {
        match self {
            CascadeOp::Update(update) => match &update.target {
                IndexTarget::Global => vec![registry.global_alias()],
                IndexTarget::Aliases(aliases) => aliases.clone(),
            },
            CascadeOp::DeleteByFields { aliases, .. } => aliases.clone(),
            CascadeOp::SoftDeleteChildren { aliases, .. } => aliases.clone(),
            CascadeOp::UpdateByFqnPrefix { index, .. } => vec![index.clone()],
        }
    }

    pub fn apply(&self, client: &dyn SearchClient, registry: &IndexMappingRegistry) -> Result<()> {
        match self {
            CascadeOp::Update(update) => {
                client.update_children(&self.targets(registry), &update.matcher, &update.script)
            }
            CascadeOp::DeleteByFields { aliases, matchers } => {
                client.delete_entity_by_fields(aliases, matchers)
            }
            CascadeOp::SoftDeleteChildren {
                aliases,
                matchers,
                script,
            } => client.soft_delete_or_restore_children(aliases, script, matchers),
            CascadeOp::UpdateByFqnPrefix {
                index,
                old_prefix,
                new_prefix,
                field,
            } => client.update_by_fqn_prefix(index, old_prefix, new_prefix, field),
        }
    }
}

/// Everything a cascade planner may look at for one mutation.
#[derive(Clone, Copy)]
pub struct CascadeContext<'a> {
    pub registry: &'a IndexMappingRegistry,
    pub mapping: &'a IndexMapping,
    pub entity: &'a dyn EntityInterface,
    pub change: Option<&'a ChangeDescription>,
}

impl<'a> CascadeContext<'a> {
    pub fn new(
        registry: &'a IndexMappingRegistry,
        mapping: &'a IndexMapping,
        entity: &'a dyn EntityInterface,
        change: Option<&'a ChangeDescription>,
    ) -> Self {
        CascadeContext {
            registry,
            mapping,
            entity,
            change,
        }
    }

    pub fn entity_type(&self) -> &str {
        self.entity.entity_type()
    }

    pub fn entity_id(&self) -> String {
        self.entity.id().to_string()
    }

    pub fn child_aliases(&self) -> Vec<String> {
        self.registry.child_aliases(self.mapping)
    }

    /// `<field>` equal to the entity's id.
    pub fn id_match(&self, field: &str) -> FieldMatch {
        FieldMatch::new(field, self.entity_id())
    }

    /// `<entityType>.id` equal to the entity's id.
    pub fn parent_match(&self) -> FieldMatch {
        self.id_match(&format!("{}.id", self.entity_type()))
    }
}
