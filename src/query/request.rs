use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::core::entity::FIELD_DELETED;
use crate::query::ast::{BoolQuery, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSortFilter {
    pub sort_field: String,
    pub sort_order: SortOrder,
}

impl SearchSortFilter {
    pub fn new(sort_field: impl Into<String>, sort_order: SortOrder) -> Self {
        SearchSortFilter {
            sort_field: sort_field.into(),
            sort_order,
        }
    }
}

impl Default for SearchSortFilter {
    fn default() -> Self {
        SearchSortFilter::new("_score", SortOrder::Desc)
    }
}

/// Free-text search against one index or alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub index: String,
    pub from: usize,
    pub size: usize,
    pub query_filter: Option<Query>,
    pub post_filter: Option<Query>,
    pub fetch_source: bool,
    pub track_total_hits: bool,
    pub sort: SearchSortFilter,
    pub include_source_fields: Vec<String>,
    pub exclude_source_fields: Vec<String>,
    pub deleted: Option<bool>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, size: usize, index: impl Into<String>) -> Self {
        SearchRequest {
            query: query.into(),
            index: index.into(),
            from: 0,
            size,
            query_filter: None,
            post_filter: None,
            fetch_source: true,
            track_total_hits: false,
            sort: SearchSortFilter::default(),
            include_source_fields: Vec::new(),
            exclude_source_fields: Vec::new(),
            deleted: None,
        }
    }

    pub fn from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn query_filter(mut self, filter: Query) -> Self {
        self.query_filter = Some(filter);
        self
    }

    pub fn post_filter(mut self, filter: Query) -> Self {
        self.post_filter = Some(filter);
        self
    }

    pub fn fetch_source(mut self, fetch: bool) -> Self {
        self.fetch_source = fetch;
        self
    }

    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = track;
        self
    }

    pub fn sort(mut self, sort: SearchSortFilter) -> Self {
        self.sort = sort;
        self
    }

    pub fn include_source_fields(mut self, fields: Vec<String>) -> Self {
        self.include_source_fields = fields;
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Full query tree: free text AND the optional filter AND the deleted flag.
    pub fn to_query(&self) -> Query {
        let mut root = BoolQuery::new();
        if self.query.trim().is_empty() || self.query == "*" {
            root = root.with_must(Query::MatchAll);
        } else {
            root = root.with_must(Query::query_string(self.query.clone()));
        }
        if let Some(filter) = &self.query_filter {
            root = root.with_filter(filter.clone());
        }
        if let Some(deleted) = self.deleted {
            root = root.with_filter(Query::term(FIELD_DELETED, deleted));
        }
        root.into_query()
    }
}

/// Completion-suggester request on the `suggest` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub query: String,
    pub index: String,
    pub field: String,
    pub size: usize,
    pub fetch_source: bool,
    pub include_source_fields: Vec<String>,
    pub deleted: Option<bool>,
}

impl SuggestRequest {
    pub fn new(query: impl Into<String>, index: impl Into<String>) -> Self {
        SuggestRequest {
            query: query.into(),
            index: index.into(),
            field: "suggest".to_string(),
            size: 10,
            fetch_source: true,
            include_source_fields: Vec::new(),
            deleted: None,
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// Listing conditions applied per entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchListFilter {
    pub include_deleted: Option<bool>,
    pub equals: BTreeMap<String, String>,
}

impl SearchListFilter {
    pub fn new() -> Self {
        SearchListFilter::default()
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = Some(include);
        self
    }

    pub fn with_equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    pub fn condition(&self, entity_type: &str) -> Query {
        let mut root = BoolQuery::new().with_filter(Query::term("entityType", entity_type));
        match self.include_deleted {
            Some(true) => {}
            Some(false) | None => {
                root = root.with_must_not(Query::term(FIELD_DELETED, true));
            }
        }
        for (field, value) in &self.equals {
            root = root.with_filter(Query::term(field.clone(), value.clone()));
        }
        root.into_query()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphKind {
    Lineage,
    EntityRelationship,
    /// Upstream lineage only, feeding data quality views
    DataQuality,
    /// Entity relationships of every table inside one schema
    SchemaEntityRelationship,
}

impl GraphKind {
    /// Document field holding the inbound edges.
    pub fn edge_field(&self) -> &'static str {
        match self {
            GraphKind::Lineage | GraphKind::DataQuality => "upstreamLineage",
            GraphKind::EntityRelationship | GraphKind::SchemaEntityRelationship => {
                "upstreamEntityRelationship"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRequest {
    pub fqn: String,
    pub upstream_depth: usize,
    pub downstream_depth: usize,
    pub query_filter: Option<Value>,
    pub include_deleted: bool,
    pub entity_type: Option<String>,
    pub kind: GraphKind,
}

impl LineageRequest {
    pub fn new(fqn: impl Into<String>, upstream_depth: usize, downstream_depth: usize) -> Self {
        LineageRequest {
            fqn: fqn.into(),
            upstream_depth,
            downstream_depth,
            query_filter: None,
            include_deleted: false,
            entity_type: None,
            kind: GraphKind::Lineage,
        }
    }

    pub fn kind(mut self, kind: GraphKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn query_filter(mut self, filter: Option<Value>) -> Self {
        self.query_filter = filter;
        self
    }

    /// Restricts the root lookup to one entity type.
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }
}
