use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-neutral query tree; each dialect encodes it into its own DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Prefix(PrefixQuery),
    Wildcard(WildcardQuery),
    Exists(String),
    QueryString(QueryStringQuery),
    Bool(BoolQuery),
    /// Pre-encoded DSL fragment passed through untouched
    Raw(Value),
    MatchAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String, // * and ? wildcards
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStringQuery {
    pub query: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub filter: Vec<Query>,
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Query::Prefix(PrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
        })
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Query::Wildcard(WildcardQuery {
            field: field.into(),
            pattern: pattern.into(),
        })
    }

    pub fn query_string(query: impl Into<String>) -> Self {
        Query::QueryString(QueryStringQuery {
            query: query.into(),
            fields: Vec::new(),
        })
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty() && self.filter.is_empty()
    }

    pub fn into_query(self) -> Query {
        Query::Bool(self)
    }
}

/// Equality predicate selecting the documents a cascade touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub field: String,
    pub value: String,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        FieldMatch {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_query(&self) -> Query {
        Query::term(self.field.clone(), Value::String(self.value.clone()))
    }

    /// All predicates must hold.
    pub fn conjunction(matches: &[FieldMatch]) -> Query {
        match matches {
            [] => Query::MatchAll,
            [single] => single.to_query(),
            many => many
                .iter()
                .fold(BoolQuery::new(), |q, m| q.with_filter(m.to_query()))
                .into_query(),
        }
    }
}
