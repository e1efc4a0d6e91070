use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub index: String,
    pub score: Option<f64>,
    pub source: Map<String, Value>,
    pub sort: Vec<Value>,
}

impl SearchHit {
    pub fn source_str(&self, field: &str) -> Option<&str> {
        self.source.get(field).and_then(Value::as_str)
    }
}

/// Search results container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,
    pub max_score: Option<f64>,
    pub took_ms: u64,
    pub aggregations: Option<Value>,
}

impl SearchResponse {
    /// Parses the `_search` response shape shared by both engines.
    pub fn from_backend(body: &Value) -> Result<Self> {
        let hits_root = body.get("hits").ok_or_else(|| {
            Error::new(ErrorKind::Parse, "search response carries no 'hits' section")
        })?;

        // `total` is an object on newer engines and a bare number on older ones
        let total_hits = match hits_root.get("total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };

        let hits = hits_root
            .get("hits")
            .and_then(Value::as_array)
            .map(|raw| raw.iter().map(parse_hit).collect::<Vec<_>>())
            .unwrap_or_default();

        Ok(SearchResponse {
            total_hits,
            max_score: hits_root.get("max_score").and_then(Value::as_f64),
            took_ms: body.get("took").and_then(Value::as_u64).unwrap_or(0),
            aggregations: body.get("aggregations").cloned(),
            hits,
        })
    }

    pub fn sources(&self) -> Vec<Map<String, Value>> {
        self.hits.iter().map(|hit| hit.source.clone()).collect()
    }
}

fn parse_hit(raw: &Value) -> SearchHit {
    SearchHit {
        id: raw.get("_id").and_then(Value::as_str).unwrap_or_default().to_string(),
        index: raw.get("_index").and_then(Value::as_str).unwrap_or_default().to_string(),
        score: raw.get("_score").and_then(Value::as_f64),
        source: raw
            .get("_source")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        sort: raw
            .get("sort")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Page of listed documents; `last_hit_sort_values` feeds the next deep-pagination call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResultListMapper {
    pub results: Vec<Map<String, Value>>,
    pub total: u64,
    pub last_hit_sort_values: Option<Vec<Value>>,
}

impl From<SearchResponse> for SearchResultListMapper {
    fn from(response: SearchResponse) -> Self {
        let last_hit_sort_values = response
            .hits
            .last()
            .filter(|hit| !hit.sort.is_empty())
            .map(|hit| hit.sort.clone());
        SearchResultListMapper {
            results: response.sources(),
            total: response.total_hits,
            last_hit_sort_values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestOption {
    pub text: String,
    pub id: String,
    pub score: Option<f64>,
    pub source: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SuggestResponse {
    pub options: Vec<SuggestOption>,
}

impl SuggestResponse {
    /// Reads `suggest.<name>[*].options[*]`.
    pub fn from_backend(body: &Value, suggestion_name: &str) -> Result<Self> {
        let entries = body
            .get("suggest")
            .and_then(|s| s.get(suggestion_name))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Parse,
                    format!("suggest response carries no '{}' section", suggestion_name),
                )
            })?;

        let options = entries
            .iter()
            .filter_map(|entry| entry.get("options").and_then(Value::as_array))
            .flatten()
            .map(|option| SuggestOption {
                text: option.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
                id: option.get("_id").and_then(Value::as_str).unwrap_or_default().to_string(),
                score: option.get("_score").and_then(Value::as_f64),
                source: option
                    .get("_source")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();

        Ok(SuggestResponse { options })
    }
}
