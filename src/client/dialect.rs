//! Translation of script identifiers and query trees into a backend's wire format.
//!
//! Both supported engines run painless and accept the same query DSL with
//! small differences. A [`Dialect`] supplies those differences (field access
//! syntax, list filtering, term encoding) and the shared renderer here builds
//! every script body from them, so each [`ScriptOp`] has an equivalent body
//! on every backend.

use serde_json::{json, Map, Value};
use crate::client::script::{Script, ScriptOp};
use crate::core::config::SearchType;
use crate::query::ast::{BoolQuery, Query};

pub const SCRIPT_LANG: &str = "painless";

pub trait Dialect: Send + Sync {
    fn search_type(&self) -> SearchType;

    /// Accessor expression for a dotted path inside `ctx._source`.
    fn source_path(&self, path: &str) -> String;

    /// Statement dropping the elements of `list` for which `cond` holds; `var` names the element.
    fn remove_where(&self, list: &str, var: &str, cond: &str) -> String;

    fn encode_term(&self, field: &str, value: &Value) -> Value;

    fn script_source(&self, op: &ScriptOp) -> String {
        render_op(self, op)
    }

    fn encode_script(&self, script: &Script) -> Value {
        let source = script
            .ops
            .iter()
            .map(|op| self.script_source(op))
            .collect::<Vec<_>>()
            .join(" ");
        json!({
            "source": source,
            "lang": SCRIPT_LANG,
            "params": Value::Object(script.params.clone()),
        })
    }

    fn encode_query(&self, query: &Query) -> Value {
        match query {
            Query::Term(term) => self.encode_term(&term.field, &term.value),
            Query::Prefix(prefix) => keyed("prefix", &prefix.field, json!({ "value": prefix.prefix })),
            Query::Wildcard(wildcard) => {
                keyed("wildcard", &wildcard.field, json!({ "value": wildcard.pattern }))
            }
            Query::Exists(field) => json!({ "exists": { "field": field } }),
            Query::QueryString(qs) => {
                let mut body = Map::new();
                body.insert("query".to_string(), Value::String(qs.query.clone()));
                if !qs.fields.is_empty() {
                    body.insert("fields".to_string(), json!(qs.fields));
                }
                json!({ "query_string": body })
            }
            Query::Bool(b) => self.encode_bool(b),
            // callers may hand over a whole request body; keep only its query
            Query::Raw(raw) => raw.get("query").cloned().unwrap_or_else(|| raw.clone()),
            Query::MatchAll => json!({ "match_all": {} }),
        }
    }

    fn encode_bool(&self, b: &BoolQuery) -> Value {
        let mut body = Map::new();
        for (clause, queries) in [
            ("must", &b.must),
            ("should", &b.should),
            ("must_not", &b.must_not),
            ("filter", &b.filter),
        ] {
            if !queries.is_empty() {
                let encoded: Vec<Value> = queries.iter().map(|q| self.encode_query(q)).collect();
                body.insert(clause.to_string(), Value::Array(encoded));
            }
        }
        json!({ "bool": body })
    }
}

/// `{kind: {field: body}}` with a runtime field name.
pub(crate) fn keyed(kind: &str, field: &str, body: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), body);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn param(name: &str) -> String {
    format!("params['{}']", name)
}

fn render_op<D: Dialect + ?Sized>(d: &D, op: &ScriptOp) -> String {
    let src = |path: &str| d.source_path(path);

    match op {
        ScriptOp::SetUpdatedAt => format!("{} = params.updatedAt;", src("updatedAt")),
        ScriptOp::AddFollowers => {
            let followers = src("followers");
            format!(
                "if ({f} == null) {{ {f} = []; }} for (def id : params.followers) {{ if (!{f}.contains(id)) {{ {f}.add(id); }} }}",
                f = followers
            )
        }
        ScriptOp::RemoveFollowers => {
            let followers = src("followers");
            format!(
                "if ({f} != null) {{ {f}.removeAll(params.removedFollowers); }}",
                f = followers
            )
        }
        ScriptOp::ReplaceField(field) => format!(
            "if ({p} == null) {{ ctx._source.remove('{field}'); }} else {{ {s} = {p}; }}",
            p = param(field),
            s = src(field),
            field = field
        ),
        ScriptOp::MergeFields => {
            "for (def key : params.keySet()) { ctx._source[key] = params[key]; }".to_string()
        }
        ScriptOp::PropagateField(field) => format!("{} = {};", src(field), param(field)),
        ScriptOp::RemovePropagatedField(field) => format!("ctx._source.remove('{}');", field),
        ScriptOp::PropagateEntityReferenceField(field) => format!(
            "if ({s} == null || {s}.inherited == true) {{ {s} = {p}; }}",
            s = src(field),
            p = param(field)
        ),
        ScriptOp::UpdatePropagatedEntityReferenceField(field) => format!(
            "if ({s} == null || {s}.id == {before}.id) {{ {s} = {p}; }}",
            s = src(field),
            p = param(field),
            before = param(&format!("{}BeforeUpdate", field))
        ),
        ScriptOp::RemovePropagatedEntityReferenceField(field) => format!(
            "if ({s} != null && {s}.id == {p}.id) {{ ctx._source.remove('{field}'); }}",
            s = src(field),
            p = param(field),
            field = field
        ),
        ScriptOp::PropagateNestedField { path, param: name } => match path.rsplit_once('.') {
            Some((parent, _)) => format!(
                "if ({parent} != null) {{ {s} = {p}; }}",
                parent = src(parent),
                s = src(path),
                p = param(name)
            ),
            None => format!("{} = {};", src(path), param(name)),
        },
        ScriptOp::PropagateTestSuites => format!("{} = params.testSuites;", src("testSuites")),
        ScriptOp::AddOwners => {
            let owners = src("owners");
            format!(
                "if ({o} == null) {{ {o} = []; }} {drop} if ({o}.isEmpty()) {{ {o}.addAll(params.updatedOwners); }}",
                o = owners,
                drop = d.remove_where(&owners, "owner", "owner.inherited == true")
            )
        }
        ScriptOp::RemoveOwners => {
            let owners = src("owners");
            format!(
                "if ({o} != null) {{ List removed = new ArrayList(); for (def entry : params.deletedOwners) {{ removed.add(entry.id); }} {drop} \
                 if ({o}.isEmpty() && params.remainingOwners != null) {{ {o}.addAll(params.remainingOwners); }} }}",
                o = owners,
                drop = d.remove_where(
                    &owners,
                    "owner",
                    "owner.inherited == true && (removed.isEmpty() || removed.contains(owner.id))"
                )
            )
        }
        ScriptOp::UpdateCertification => {
            let label = src("certification.tagLabel");
            format!(
                "if ({c} != null && {l} != null) {{ {l}.name = params.name; {l}.description = params.description; {l}.tagFQN = params.tagFQN; {l}.style = params.style; }}",
                c = src("certification"),
                l = label
            )
        }
        ScriptOp::UpdateAddedDeletedGlossaryTags => {
            let tags = src("tags");
            format!(
                "if ({t} == null) {{ {t} = []; }} \
                 if (params.tagDeleted != null) {{ for (def deleted : params.tagDeleted) {{ {drop} }} }} \
                 if (params.tagAdded != null) {{ for (def added : params.tagAdded) {{ boolean present = false; \
                 for (def tag : {t}) {{ if (tag.tagFQN == added.tagFQN) {{ present = true; }} }} \
                 if (!present) {{ {t}.add(added); }} }} }}",
                t = tags,
                drop = d.remove_where(
                    &tags,
                    "tag",
                    "tag.tagFQN == deleted.tagFQN && tag.labelType == 'Derived'"
                )
            )
        }
        ScriptOp::UpdateTagsField => {
            let tags = src("tags");
            format!(
                "if ({t} != null) {{ for (def tag : {t}) {{ if (tag.tagFQN == params.tagFQN) {{ for (def key : params.updates.keySet()) {{ tag[key] = params.updates[key]; }} }} }} }}",
                t = tags
            )
        }
        ScriptOp::SoftDeleteRestore(deleted) => format!("{} = {};", src("deleted"), deleted),
        ScriptOp::DashboardMembershipSoftDelete(deleted) => format!(
            "if ({m} != null && {m}.size() == 1) {{ {flag} = {deleted}; }}",
            m = src("dashboards"),
            flag = src("deleted"),
            deleted = deleted
        ),
        ScriptOp::DashboardMembershipDelete => {
            let dashboards = src("dashboards");
            format!(
                "{drop} if ({m} != null && {m}.isEmpty()) {{ {flag} = true; }}",
                drop = d.remove_where(&dashboards, "dashboard", "dashboard.id == params.dashboardId"),
                m = dashboards,
                flag = src("deleted")
            )
        }
        ScriptOp::RemoveDomainsChildren => "ctx._source.remove('domain');".to_string(),
        ScriptOp::RemoveDataProductsChildren => {
            d.remove_where(&src("dataProducts"), "product", "product.fullyQualifiedName == params.fqn")
        }
        ScriptOp::RemoveTagsChildren => d.remove_where(
            &src("tags"),
            "tag",
            "tag.tagFQN == params.fqn || tag.tagFQN.startsWith(params.fqn + '.')",
        ),
        ScriptOp::RemoveTestSuiteChildren => {
            d.remove_where(&src("testSuites"), "suite", "suite.id == params.testSuiteId")
        }
        ScriptOp::UpdateFqnPrefix(field) => match field.split_once('.') {
            // `list.leaf`: rewrite the leaf of every element
            Some((list, leaf)) => format!(
                "if ({l} != null) {{ for (def item : {l}) {{ if (item.{leaf} != null && (item.{leaf} == params.oldParentFQN || item.{leaf}.startsWith(params.oldParentFQN + '.'))) {{ item.{leaf} = params.newParentFQN + item.{leaf}.substring(params.oldParentFQN.length()); }} }} }}",
                l = src(list),
                leaf = leaf
            ),
            None => format!(
                "if ({s} != null && ({s} == params.oldParentFQN || {s}.startsWith(params.oldParentFQN + '.'))) {{ {s} = params.newParentFQN + {s}.substring(params.oldParentFQN.length()); }}",
                s = src(field)
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::elastic::ElasticDialect;
    use crate::client::opensearch::OpenSearchDialect;
    use crate::client::script::every_op;

    fn dialects() -> Vec<Box<dyn Dialect>> {
        vec![Box::new(ElasticDialect), Box::new(OpenSearchDialect)]
    }

    #[test]
    fn test_every_op_has_body_on_every_backend() {
        for dialect in dialects() {
            for op in every_op() {
                let body = dialect.script_source(&op);
                assert!(!body.trim().is_empty(), "{:?} renders empty on {:?}", op, dialect.search_type());
                assert_eq!(
                    body.matches('{').count(),
                    body.matches('}').count(),
                    "unbalanced braces for {:?}",
                    op
                );
            }
        }
    }

    #[test]
    fn test_ops_reference_their_params() {
        let cases = [
            (ScriptOp::AddOwners, "updatedOwners"),
            (ScriptOp::RemoveOwners, "deletedOwners"),
            (ScriptOp::UpdateCertification, "tagFQN"),
            (ScriptOp::UpdateAddedDeletedGlossaryTags, "tagAdded"),
            (ScriptOp::UpdateAddedDeletedGlossaryTags, "tagDeleted"),
            (ScriptOp::DashboardMembershipDelete, "dashboardId"),
            (ScriptOp::RemoveTestSuiteChildren, "testSuiteId"),
            (ScriptOp::UpdatePropagatedEntityReferenceField("domain".into()), "domainBeforeUpdate"),
            (ScriptOp::UpdateFqnPrefix("tags.tagFQN".into()), "oldParentFQN"),
        ];
        for dialect in dialects() {
            for (op, name) in &cases {
                assert!(dialect.script_source(op).contains(name), "{:?} misses {}", op, name);
            }
        }
    }

    #[test]
    fn test_fqn_prefix_rewrite_stops_at_segment_boundary() {
        for dialect in dialects() {
            for field in ["fullyQualifiedName", "tags.tagFQN"] {
                let body = dialect.script_source(&ScriptOp::UpdateFqnPrefix(field.into()));
                assert!(body.contains("== params.oldParentFQN"), "{}", body);
                assert!(body.contains("startsWith(params.oldParentFQN + '.')"), "{}", body);
                assert!(!body.contains("startsWith(params.oldParentFQN)"), "{}", body);
            }
        }
    }

    #[test]
    fn test_encode_script_joins_ops_in_order() {
        let mut script = Script::of(ScriptOp::SoftDeleteRestore(true));
        script.push(ScriptOp::SetUpdatedAt);
        script.set_param("updatedAt", json!(42));

        let encoded = ElasticDialect.encode_script(&script);
        let source = encoded["source"].as_str().unwrap();
        assert!(source.find("deleted").unwrap() < source.find("updatedAt").unwrap());
        assert_eq!(encoded["lang"], "painless");
        assert_eq!(encoded["params"]["updatedAt"], 42);
    }

    #[test]
    fn test_bool_skips_empty_clauses() {
        let query = BoolQuery::new()
            .with_filter(Query::prefix("fullyQualifiedName", "svc.db"))
            .into_query();
        let encoded = OpenSearchDialect.encode_query(&query);
        assert!(encoded["bool"].get("must").is_none());
        assert_eq!(encoded["bool"]["filter"][0]["prefix"]["fullyQualifiedName"]["value"], "svc.db");
    }

    #[test]
    fn test_raw_request_body_is_unwrapped() {
        let raw = Query::Raw(json!({"query": {"match_all": {}}}));
        assert_eq!(ElasticDialect.encode_query(&raw), json!({"match_all": {}}));
    }
}
