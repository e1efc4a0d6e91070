//! Structural fan-out on hard delete and soft delete/restore, keyed by entity type.

use std::collections::HashMap;
use serde_json::Value;
use crate::cascade::{CascadeContext, CascadeOp};
use crate::client::script::{IndexTarget, Script, ScriptOp};
use crate::core::entity::*;
use crate::core::error::Result;
use crate::query::ast::FieldMatch;

pub type DeletePlanner = fn(&CascadeContext) -> Result<Vec<CascadeOp>>;
pub type SoftDeletePlanner = fn(&CascadeContext, bool) -> Result<Vec<CascadeOp>>;

/// What deleting (or soft deleting) an entity of one type does to other documents.
#[derive(Clone, Copy)]
pub struct DeleteRule {
    pub on_delete: DeletePlanner,
    pub on_soft_delete: SoftDeletePlanner,
}

impl DeleteRule {
    pub fn new(on_delete: DeletePlanner, on_soft_delete: SoftDeletePlanner) -> Self {
        DeleteRule {
            on_delete,
            on_soft_delete,
        }
    }
}

/// Rules for the types with bespoke semantics; every other type gets the
/// generic parent-id rule over its child aliases.
pub struct DeleteRuleRegistry {
    rules: HashMap<String, DeleteRule>,
    fallback: DeleteRule,
}

impl DeleteRuleRegistry {
    pub fn new() -> Self {
        let mut registry = DeleteRuleRegistry {
            rules: HashMap::new(),
            fallback: DeleteRule::new(delete_by_parent, soft_delete_by_parent),
        };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(DOMAIN, DeleteRule::new(delete_domain, soft_delete_by_parent));
        self.register(DATA_PRODUCT, DeleteRule::new(delete_data_product, soft_delete_by_parent));
        self.register(TAG, DeleteRule::new(delete_tag, soft_delete_by_parent));
        self.register(GLOSSARY_TERM, DeleteRule::new(delete_tag, soft_delete_by_parent));
        self.register(DASHBOARD, DeleteRule::new(delete_dashboard, soft_delete_dashboard));
        self.register(TEST_SUITE, DeleteRule::new(delete_test_suite, soft_delete_by_parent));
        for service in SERVICE_TYPES {
            self.register(service, DeleteRule::new(delete_service, soft_delete_service));
        }
    }

    pub fn register(&mut self, entity_type: &str, rule: DeleteRule) {
        self.rules.insert(entity_type.to_string(), rule);
    }

    pub fn has_rule(&self, entity_type: &str) -> bool {
        self.rules.contains_key(entity_type)
    }

    pub fn get(&self, entity_type: &str) -> &DeleteRule {
        self.rules.get(entity_type).unwrap_or(&self.fallback)
    }

    pub fn plan_delete(&self, ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
        (self.get(ctx.entity_type()).on_delete)(ctx)
    }

    pub fn plan_soft_delete(&self, ctx: &CascadeContext, deleted: bool) -> Result<Vec<CascadeOp>> {
        (self.get(ctx.entity_type()).on_soft_delete)(ctx, deleted)
    }
}

impl Default for DeleteRuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn delete_where(ctx: &CascadeContext, matcher: FieldMatch) -> Vec<CascadeOp> {
    let aliases = ctx.child_aliases();
    if aliases.is_empty() {
        return Vec::new();
    }
    vec![CascadeOp::DeleteByFields {
        aliases,
        matchers: vec![matcher],
    }]
}

fn soft_delete_where(ctx: &CascadeContext, matcher: FieldMatch, script: Script) -> Vec<CascadeOp> {
    let aliases = ctx.child_aliases();
    if aliases.is_empty() {
        return Vec::new();
    }
    vec![CascadeOp::SoftDeleteChildren {
        aliases,
        matchers: vec![matcher],
        script,
    }]
}

fn delete_by_parent(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    Ok(delete_where(ctx, ctx.parent_match()))
}

fn soft_delete_by_parent(ctx: &CascadeContext, deleted: bool) -> Result<Vec<CascadeOp>> {
    Ok(soft_delete_where(
        ctx,
        ctx.parent_match(),
        Script::of(ScriptOp::SoftDeleteRestore(deleted)),
    ))
}

/// Domain references vanish everywhere; the domain's data products go with it.
fn delete_domain(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let mut ops = vec![CascadeOp::update(
        IndexTarget::Global,
        ctx.parent_match(),
        Script::of(ScriptOp::RemoveDomainsChildren),
    )];
    ops.extend(delete_where(ctx, ctx.parent_match()));
    Ok(ops)
}

fn delete_data_product(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let script = Script::of(ScriptOp::RemoveDataProductsChildren).param(
        "fqn",
        Value::String(ctx.entity.fully_qualified_name().to_string()),
    );
    Ok(vec![CascadeOp::update(
        IndexTarget::Global,
        ctx.id_match("dataProducts.id"),
        script,
    )])
}

/// Tags and glossary terms are stripped from every document carrying them.
fn delete_tag(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let fqn = ctx.entity.fully_qualified_name();
    let script = Script::of(ScriptOp::RemoveTagsChildren).param("fqn", Value::String(fqn.to_string()));
    Ok(vec![CascadeOp::update(
        IndexTarget::Global,
        FieldMatch::new("tags.tagFQN", fqn),
        script,
    )])
}

fn delete_dashboard(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let script = Script::of(ScriptOp::DashboardMembershipDelete)
        .param("dashboardId", Value::String(ctx.entity_id()));
    Ok(soft_delete_where(ctx, ctx.id_match("dashboards.id"), script))
}

fn soft_delete_dashboard(ctx: &CascadeContext, deleted: bool) -> Result<Vec<CascadeOp>> {
    Ok(soft_delete_where(
        ctx,
        ctx.id_match("dashboards.id"),
        Script::of(ScriptOp::DashboardMembershipSoftDelete(deleted)),
    ))
}

/// Basic suites own their test cases; logical suites only reference them.
fn delete_test_suite(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    let basic = ctx
        .entity
        .to_json()?
        .get("basic")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if basic {
        return Ok(delete_where(ctx, ctx.id_match("testSuite.id")));
    }
    let aliases = ctx.child_aliases();
    if aliases.is_empty() {
        return Ok(Vec::new());
    }
    let script = Script::of(ScriptOp::RemoveTestSuiteChildren)
        .param("testSuiteId", Value::String(ctx.entity_id()));
    Ok(vec![CascadeOp::update(
        IndexTarget::Aliases(aliases),
        ctx.id_match("testSuites.id"),
        script,
    )])
}

fn delete_service(ctx: &CascadeContext) -> Result<Vec<CascadeOp>> {
    Ok(delete_where(ctx, ctx.id_match("service.id")))
}

fn soft_delete_service(ctx: &CascadeContext, deleted: bool) -> Result<Vec<CascadeOp>> {
    Ok(soft_delete_where(
        ctx,
        ctx.id_match("service.id"),
        Script::of(ScriptOp::SoftDeleteRestore(deleted)),
    ))
}
