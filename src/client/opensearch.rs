use serde_json::Value;
use crate::client::dialect::{keyed, Dialect};
use crate::core::config::SearchType;

/// OpenSearch flavour: bracket source access, iterator-based list filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSearchDialect;

impl Dialect for OpenSearchDialect {
    fn search_type(&self) -> SearchType {
        SearchType::Opensearch
    }

    fn source_path(&self, path: &str) -> String {
        let mut out = String::from("ctx._source");
        for segment in path.split('.') {
            out.push_str("['");
            out.push_str(segment);
            out.push_str("']");
        }
        out
    }

    fn remove_where(&self, list: &str, var: &str, cond: &str) -> String {
        format!(
            "if ({l} != null) {{ Iterator it = {l}.iterator(); while (it.hasNext()) {{ def {v} = it.next(); if ({c}) {{ it.remove(); }} }} }}",
            l = list,
            v = var,
            c = cond
        )
    }

    fn encode_term(&self, field: &str, value: &Value) -> Value {
        keyed("term", field, value.clone())
    }
}
