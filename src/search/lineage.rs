//! Breadth-first lineage traversal over denormalized edge lists.
//!
//! Each document stores its inbound edges under `upstreamLineage` (or
//! `upstreamEntityRelationship`) as `{fromEntity, toEntity}` pairs. Upstream
//! hops read those edges; downstream hops search for documents whose inbound
//! edges start at the current node.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::core::entity::{DATABASE_SCHEMA, FIELD_DELETED, FIELD_FULLY_QUALIFIED_NAME};
use crate::core::error::Result;
use crate::document::builder::FIELD_ENTITY_TYPE;
use crate::query::ast::{BoolQuery, Query};
use crate::query::request::LineageRequest;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageEdge {
    pub from_fqn: String,
    pub to_fqn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LineageGraph {
    pub entity: Option<Map<String, Value>>,
    pub nodes: BTreeMap<String, Map<String, Value>>,
    pub upstream_edges: BTreeSet<LineageEdge>,
    pub downstream_edges: BTreeSet<LineageEdge>,
}

impl LineageGraph {
    /// Folds another graph's nodes and edges into this one; `entity` is kept.
    pub fn merge(&mut self, other: LineageGraph) {
        for (fqn, node) in other.nodes {
            self.nodes.entry(fqn).or_insert(node);
        }
        self.upstream_edges.extend(other.upstream_edges);
        self.downstream_edges.extend(other.downstream_edges);
    }

    /// Flat JSON view used by lineage exports.
    pub fn to_export(&self) -> Map<String, Value> {
        let edges = |edges: &BTreeSet<LineageEdge>| {
            Value::Array(
                edges
                    .iter()
                    .map(|e| serde_json::json!({"fromEntity": e.from_fqn, "toEntity": e.to_fqn}))
                    .collect(),
            )
        };
        let mut export = Map::new();
        export.insert(
            "entity".to_string(),
            self.entity.clone().map(Value::Object).unwrap_or(Value::Null),
        );
        export.insert(
            "nodes".to_string(),
            Value::Array(self.nodes.values().cloned().map(Value::Object).collect()),
        );
        export.insert("upstreamEdges".to_string(), edges(&self.upstream_edges));
        export.insert("downstreamEdges".to_string(), edges(&self.downstream_edges));
        export
    }
}

fn fqn_of(doc: &Map<String, Value>) -> Option<String> {
    doc.get(FIELD_FULLY_QUALIFIED_NAME)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn edge_source_fqn(edge: &Value) -> Option<String> {
    edge.get("fromEntity")
        .and_then(|from| from.get(FIELD_FULLY_QUALIFIED_NAME).or_else(|| from.get("fqn")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn scoped_bool(request: &LineageRequest, query: Query) -> BoolQuery {
    let mut root = BoolQuery::new().with_must(query);
    if !request.include_deleted {
        root = root.with_must_not(Query::term(FIELD_DELETED, true));
    }
    if let Some(filter) = &request.query_filter {
        root = root.with_filter(Query::Raw(filter.clone()));
    }
    root
}

fn scoped(request: &LineageRequest, query: Query) -> Query {
    scoped_bool(request, query).into_query()
}

/// Walks the graph around `request.fqn`; `fetch` runs one search and returns `_source` bodies.
pub fn traverse<F>(request: &LineageRequest, mut fetch: F) -> Result<LineageGraph>
where
    F: FnMut(&Query) -> Result<Vec<Map<String, Value>>>,
{
    let mut graph = LineageGraph::default();
    let edge_field = request.kind.edge_field();

    let mut root_query = scoped_bool(request, Query::term(FIELD_FULLY_QUALIFIED_NAME, request.fqn.clone()));
    if let Some(entity_type) = &request.entity_type {
        root_query = root_query.with_filter(Query::term(FIELD_ENTITY_TYPE, entity_type.clone()));
    }
    let root_query = root_query.into_query();
    let root = match fetch(&root_query)?.into_iter().next() {
        Some(doc) => doc,
        None => return Ok(graph),
    };
    graph.nodes.insert(request.fqn.clone(), root.clone());
    graph.entity = Some(root.clone());

    let mut frontier = vec![root];
    for _ in 0..request.upstream_depth {
        let mut next = Vec::new();
        for doc in &frontier {
            let Some(to_fqn) = fqn_of(doc) else { continue };
            let edges = doc.get(edge_field).and_then(Value::as_array).cloned().unwrap_or_default();
            for edge in edges {
                let Some(from_fqn) = edge_source_fqn(&edge) else { continue };
                graph.upstream_edges.insert(LineageEdge {
                    from_fqn: from_fqn.clone(),
                    to_fqn: to_fqn.clone(),
                });
                if graph.nodes.contains_key(&from_fqn) {
                    continue;
                }
                let query = scoped(request, Query::term(FIELD_FULLY_QUALIFIED_NAME, from_fqn.clone()));
                if let Some(parent) = fetch(&query)?.into_iter().next() {
                    graph.nodes.insert(from_fqn, parent.clone());
                    next.push(parent);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let source_field = format!("{}.fromEntity.{}", edge_field, FIELD_FULLY_QUALIFIED_NAME);
    let mut frontier = vec![request.fqn.clone()];
    let mut expanded: BTreeSet<String> = BTreeSet::new();
    for _ in 0..request.downstream_depth {
        let mut next = Vec::new();
        for from_fqn in &frontier {
            if !expanded.insert(from_fqn.clone()) {
                continue;
            }
            let query = scoped(request, Query::term(source_field.clone(), from_fqn.clone()));
            for child in fetch(&query)? {
                let Some(to_fqn) = fqn_of(&child) else { continue };
                graph.downstream_edges.insert(LineageEdge {
                    from_fqn: from_fqn.clone(),
                    to_fqn: to_fqn.clone(),
                });
                if !graph.nodes.contains_key(&to_fqn) {
                    graph.nodes.insert(to_fqn.clone(), child);
                    next.push(to_fqn);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    Ok(graph)
}

/// Merges the relationship graphs of every table under the schema `request.fqn`.
pub fn traverse_schema<F>(request: &LineageRequest, mut fetch: F) -> Result<LineageGraph>
where
    F: FnMut(&Query) -> Result<Vec<Map<String, Value>>>,
{
    let schema_field = format!("{}.{}", DATABASE_SCHEMA, FIELD_FULLY_QUALIFIED_NAME);
    let tables = fetch(&scoped(request, Query::term(schema_field, request.fqn.clone())))?;

    let mut graph = LineageGraph::default();
    for table in tables {
        let Some(table_fqn) = fqn_of(&table) else { continue };
        let mut per_table = request.clone();
        per_table.fqn = table_fqn;
        per_table.entity_type = None;
        graph.merge(traverse(&per_table, &mut fetch)?);
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::TermQuery;
    use crate::query::request::GraphKind;
    use serde_json::json;

    fn doc(fqn: &str, upstream: &[&str]) -> Map<String, Value> {
        let edges: Vec<Value> = upstream
            .iter()
            .map(|from| json!({"fromEntity": {"fullyQualifiedName": from}, "toEntity": {"fullyQualifiedName": fqn}}))
            .collect();
        json!({"fullyQualifiedName": fqn, "upstreamLineage": edges})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn term_of(query: &Query) -> Option<&TermQuery> {
        match query {
            Query::Bool(b) => b.must.iter().find_map(|q| match q {
                Query::Term(t) => Some(t),
                _ => None,
            }),
            _ => None,
        }
    }

    // raw -> staging -> mart
    fn store() -> Vec<Map<String, Value>> {
        vec![doc("raw", &[]), doc("staging", &["raw"]), doc("mart", &["staging"])]
    }

    fn fetch(query: &Query) -> Result<Vec<Map<String, Value>>> {
        let term = term_of(query).expect("term query");
        let wanted = term.value.as_str().unwrap();
        Ok(store()
            .into_iter()
            .filter(|d| {
                if term.field == FIELD_FULLY_QUALIFIED_NAME {
                    fqn_of(d).as_deref() == Some(wanted)
                } else {
                    d["upstreamLineage"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .any(|e| edge_source_fqn(e).as_deref() == Some(wanted))
                }
            })
            .collect())
    }

    #[test]
    fn test_traverses_both_directions() {
        let graph = traverse(&LineageRequest::new("staging", 2, 2), fetch).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.upstream_edges.contains(&LineageEdge {
            from_fqn: "raw".into(),
            to_fqn: "staging".into()
        }));
        assert!(graph.downstream_edges.contains(&LineageEdge {
            from_fqn: "staging".into(),
            to_fqn: "mart".into()
        }));
    }

    #[test]
    fn test_depth_zero_returns_only_root() {
        let graph = traverse(&LineageRequest::new("mart", 0, 0), fetch).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.upstream_edges.is_empty());
    }

    #[test]
    fn test_entity_type_filters_only_the_root_lookup() {
        let mut seen = Vec::new();
        let request = LineageRequest::new("staging", 1, 0).entity_type("table");
        traverse(&request, |query| {
            if let Query::Bool(b) = query {
                seen.push(b.filter.contains(&Query::term(FIELD_ENTITY_TYPE, "table")));
            }
            fetch(query)
        })
        .unwrap();
        assert_eq!(seen, vec![true, false]);
    }

    #[test]
    fn test_export_lists_nodes_and_edges() {
        let graph = traverse(&LineageRequest::new("staging", 1, 1), fetch).unwrap();
        let export = graph.to_export();
        assert_eq!(export["entity"]["fullyQualifiedName"], "staging");
        assert_eq!(export["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(
            export["upstreamEdges"],
            serde_json::json!([{"fromEntity": "raw", "toEntity": "staging"}])
        );
        assert_eq!(
            export["downstreamEdges"],
            serde_json::json!([{"fromEntity": "staging", "toEntity": "mart"}])
        );
    }

    #[test]
    fn test_schema_graph_merges_every_table() {
        let table = |fqn: &str, schema: &str, related: &[&str]| {
            let edges: Vec<Value> = related
                .iter()
                .map(|from| json!({"fromEntity": {"fullyQualifiedName": from}}))
                .collect();
            json!({
                "fullyQualifiedName": fqn,
                "databaseSchema": {"fullyQualifiedName": schema},
                "upstreamEntityRelationship": edges,
            })
            .as_object()
            .cloned()
            .unwrap()
        };
        let store = vec![
            table("db.sales.orders", "db.sales", &["db.sales.customers"]),
            table("db.sales.customers", "db.sales", &[]),
            table("db.hr.staff", "db.hr", &[]),
        ];
        let fetch = |query: &Query| -> Result<Vec<Map<String, Value>>> {
            let term = term_of(query).expect("term query");
            let wanted = term.value.as_str().unwrap();
            Ok(store
                .iter()
                .filter(|d| match term.field.as_str() {
                    FIELD_FULLY_QUALIFIED_NAME => fqn_of(d).as_deref() == Some(wanted),
                    "databaseSchema.fullyQualifiedName" => {
                        d["databaseSchema"]["fullyQualifiedName"] == wanted
                    }
                    _ => d["upstreamEntityRelationship"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .any(|e| edge_source_fqn(e).as_deref() == Some(wanted)),
                })
                .cloned()
                .collect())
        };

        let request = LineageRequest::new("db.sales", 1, 1).kind(GraphKind::SchemaEntityRelationship);
        let graph = traverse_schema(&request, fetch).unwrap();

        assert!(graph.entity.is_none());
        assert_eq!(graph.nodes.len(), 2);
        assert!(!graph.nodes.contains_key("db.hr.staff"));
        let edge = LineageEdge {
            from_fqn: "db.sales.customers".into(),
            to_fqn: "db.sales.orders".into(),
        };
        assert!(graph.upstream_edges.contains(&edge));
        assert!(graph.downstream_edges.contains(&edge));
    }

    #[test]
    fn test_unknown_root_yields_empty_graph() {
        let graph = traverse(&LineageRequest::new("nowhere", 3, 3), fetch).unwrap();
        assert!(graph.entity.is_none());
        assert!(graph.nodes.is_empty());
    }
}
