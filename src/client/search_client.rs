use serde_json::{Map, Value};
use crate::client::script::Script;
use crate::core::config::SearchType;
use crate::core::error::Result;
use crate::core::types::{DocId, Document};
use crate::query::ast::{FieldMatch, Query};
use crate::query::request::{LineageRequest, SearchRequest, SearchSortFilter, SuggestRequest};
use crate::search::lineage::LineageGraph;
use crate::search::results::{SearchResponse, SearchResultListMapper, SuggestResponse};

/// How a single document is rewritten.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUpdate {
    /// Replace the stored source wholesale
    Replace(Document),
    /// Run a script against the stored source
    Patch(Script),
}

/// Operations the sync engine needs from a search cluster.
///
/// Index and alias names are always fully resolved (cluster prefix applied)
/// by the caller.
pub trait SearchClient: Send + Sync {
    fn search_type(&self) -> SearchType;

    // index administration
    fn index_exists(&self, index: &str) -> Result<bool>;
    fn create_index(&self, index: &str, schema: &str) -> Result<()>;
    fn update_index(&self, index: &str, schema: &str) -> Result<()>;
    fn delete_index(&self, index: &str) -> Result<()>;
    fn create_aliases(&self, index: &str, aliases: &[String]) -> Result<()>;

    // single documents
    fn create_entity(&self, index: &str, doc: &Document) -> Result<()>;
    fn create_entities(&self, index: &str, docs: &[Document]) -> Result<()>;
    fn create_time_series_entity(&self, index: &str, doc: &Document) -> Result<()>;
    fn update_entity(&self, index: &str, id: &DocId, update: &DocumentUpdate) -> Result<()>;
    fn delete_entity(&self, index: &str, id: &DocId) -> Result<()>;
    fn delete_entity_by_fqn_prefix(&self, index: &str, fqn_prefix: &str) -> Result<()>;
    fn soft_delete_or_restore_entity(&self, index: &str, id: &DocId, script: &Script) -> Result<()>;

    // by-query writes
    fn delete_entity_by_fields(&self, aliases: &[String], fields: &[FieldMatch]) -> Result<()>;
    fn soft_delete_or_restore_children(
        &self,
        aliases: &[String],
        script: &Script,
        fields: &[FieldMatch],
    ) -> Result<()>;
    fn update_children(&self, aliases: &[String], matcher: &FieldMatch, script: &Script) -> Result<()>;
    fn update_by_fqn_prefix(
        &self,
        index: &str,
        old_prefix: &str,
        new_prefix: &str,
        field: &str,
    ) -> Result<()>;

    // reads
    fn get_doc_by_id(&self, index: &str, id: &DocId) -> Result<Option<Map<String, Value>>>;
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;
    fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse>;
    fn search_by_source_url(&self, index: &str, source_url: &str) -> Result<SearchResponse>;
    fn search_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph>;
    /// Upstream-only traversal; the request's downstream depth is ignored.
    fn search_data_quality_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph>;
    /// `request.fqn` names a schema; every table in it is a root.
    fn search_schema_entity_relationship(
        &self,
        index: &str,
        request: &LineageRequest,
    ) -> Result<LineageGraph>;
    fn search_lineage_for_export(&self, index: &str, request: &LineageRequest) -> Result<Map<String, Value>>;
    fn aggregate(&self, index: &str, field: &str, value: &str, query: Option<&str>) -> Result<Value>;
    fn list_with_offset(
        &self,
        index: &str,
        filter: &Query,
        limit: usize,
        offset: usize,
        sort: &SearchSortFilter,
        query: Option<&str>,
    ) -> Result<SearchResultListMapper>;
    fn list_with_deep_pagination(
        &self,
        index: &str,
        query: Option<&str>,
        filter: Option<&Query>,
        fields: &[String],
        sort: &SearchSortFilter,
        size: usize,
        search_after: Option<&[Value]>,
    ) -> Result<SearchResultListMapper>;
    fn search_by_field(&self, index: &str, field: &str, value: &str) -> Result<SearchResponse>;
}
