use serde_json::{json, Value};
use crate::client::dialect::{keyed, Dialect};
use crate::core::config::SearchType;

/// Elasticsearch flavour: dotted source access, lambda list filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticDialect;

impl Dialect for ElasticDialect {
    fn search_type(&self) -> SearchType {
        SearchType::Elasticsearch
    }

    fn source_path(&self, path: &str) -> String {
        format!("ctx._source.{}", path)
    }

    fn remove_where(&self, list: &str, var: &str, cond: &str) -> String {
        format!("if ({l} != null) {{ {l}.removeIf({v} -> {c}); }}", l = list, v = var, c = cond)
    }

    fn encode_term(&self, field: &str, value: &Value) -> Value {
        keyed("term", field, json!({ "value": value }))
    }
}
