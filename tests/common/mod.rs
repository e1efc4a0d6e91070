#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use searchsync::client::script::Script;
use searchsync::client::search_client::{DocumentUpdate, SearchClient};
use searchsync::core::config::{SearchConfig, SearchType};
use searchsync::core::error::{Error, Result};
use searchsync::core::types::{DocId, Document};
use searchsync::query::ast::{FieldMatch, Query};
use searchsync::query::request::{LineageRequest, SearchRequest, SearchSortFilter, SuggestRequest};
use searchsync::search::lineage::LineageGraph;
use searchsync::search::results::{SearchResponse, SearchResultListMapper, SuggestResponse};
use searchsync::sync::SearchRepository;

/// One backend call as seen by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    IndexExists(String),
    CreateIndex(String),
    UpdateIndex(String),
    DeleteIndex(String),
    CreateAliases(String, Vec<String>),
    Create(String, Document),
    Bulk(String, Vec<Document>),
    CreateTimeSeries(String, Document),
    Update(String, DocId, DocumentUpdate),
    Delete(String, DocId),
    DeleteByFqnPrefix(String, String),
    SoftDelete(String, DocId, Script),
    DeleteByFields(Vec<String>, Vec<FieldMatch>),
    SoftDeleteChildren(Vec<String>, Script, Vec<FieldMatch>),
    UpdateChildren(Vec<String>, FieldMatch, Script),
    UpdateByFqnPrefix {
        index: String,
        old_prefix: String,
        new_prefix: String,
        field: String,
    },
    GetDoc(String, DocId),
    Search(SearchRequest),
    Suggest(SuggestRequest),
    SearchBySourceUrl(String, String),
    Lineage(String, LineageRequest),
    DataQualityLineage(String, LineageRequest),
    SchemaEntityRelationship(String, LineageRequest),
    LineageExport(String, LineageRequest),
    Aggregate(String, String),
    List(String),
    SearchByField(String, String, String),
}

impl Call {
    /// True for writes that touch documents other than the primary one.
    pub fn is_cascade(&self) -> bool {
        matches!(
            self,
            Call::DeleteByFields(..)
                | Call::SoftDeleteChildren(..)
                | Call::UpdateChildren(..)
                | Call::UpdateByFqnPrefix { .. }
        )
    }
}

/// In-memory `SearchClient` that records every call and keeps a tiny
/// document store so repeated writes can be compared.
#[derive(Default)]
pub struct RecordingClient {
    pub calls: Mutex<Vec<Call>>,
    pub failing: Mutex<HashSet<&'static str>>,
    pub indexes: Mutex<HashSet<String>>,
    pub docs: Mutex<HashMap<(String, String), Map<String, Value>>>,
    pub search_response: Mutex<SearchResponse>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingClient::default())
    }

    /// Makes every later call of `operation` fail with a backend error.
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn cascade_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_cascade).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn doc(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.docs.lock().get(&(index.to_string(), id.to_string())).cloned()
    }

    fn record(&self, operation: &'static str, call: Call) -> Result<()> {
        self.calls.lock().push(call);
        if self.failing.lock().contains(operation) {
            return Err(Error::backend(format!("{} rejected by cluster", operation)));
        }
        Ok(())
    }

    fn store(&self, index: &str, doc: &Document) {
        self.docs
            .lock()
            .insert((index.to_string(), doc.id.as_str().to_string()), doc.fields.clone());
    }
}

impl SearchClient for RecordingClient {
    fn search_type(&self) -> SearchType {
        SearchType::Elasticsearch
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        self.record("index_exists", Call::IndexExists(index.to_string()))?;
        Ok(self.indexes.lock().contains(index))
    }

    fn create_index(&self, index: &str, _schema: &str) -> Result<()> {
        self.record("create_index", Call::CreateIndex(index.to_string()))?;
        self.indexes.lock().insert(index.to_string());
        Ok(())
    }

    fn update_index(&self, index: &str, _schema: &str) -> Result<()> {
        self.record("update_index", Call::UpdateIndex(index.to_string()))
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        self.record("delete_index", Call::DeleteIndex(index.to_string()))?;
        self.indexes.lock().remove(index);
        Ok(())
    }

    fn create_aliases(&self, index: &str, aliases: &[String]) -> Result<()> {
        self.record("create_aliases", Call::CreateAliases(index.to_string(), aliases.to_vec()))
    }

    fn create_entity(&self, index: &str, doc: &Document) -> Result<()> {
        self.record("create_entity", Call::Create(index.to_string(), doc.clone()))?;
        self.store(index, doc);
        Ok(())
    }

    fn create_entities(&self, index: &str, docs: &[Document]) -> Result<()> {
        self.record("create_entities", Call::Bulk(index.to_string(), docs.to_vec()))?;
        for doc in docs {
            self.store(index, doc);
        }
        Ok(())
    }

    fn create_time_series_entity(&self, index: &str, doc: &Document) -> Result<()> {
        self.record("create_time_series_entity", Call::CreateTimeSeries(index.to_string(), doc.clone()))?;
        self.store(index, doc);
        Ok(())
    }

    fn update_entity(&self, index: &str, id: &DocId, update: &DocumentUpdate) -> Result<()> {
        self.record("update_entity", Call::Update(index.to_string(), id.clone(), update.clone()))?;
        if let DocumentUpdate::Replace(doc) = update {
            self.store(index, doc);
        }
        Ok(())
    }

    fn delete_entity(&self, index: &str, id: &DocId) -> Result<()> {
        self.record("delete_entity", Call::Delete(index.to_string(), id.clone()))?;
        self.docs.lock().remove(&(index.to_string(), id.as_str().to_string()));
        Ok(())
    }

    fn delete_entity_by_fqn_prefix(&self, index: &str, fqn_prefix: &str) -> Result<()> {
        self.record(
            "delete_entity_by_fqn_prefix",
            Call::DeleteByFqnPrefix(index.to_string(), fqn_prefix.to_string()),
        )
    }

    fn soft_delete_or_restore_entity(&self, index: &str, id: &DocId, script: &Script) -> Result<()> {
        self.record(
            "soft_delete_or_restore_entity",
            Call::SoftDelete(index.to_string(), id.clone(), script.clone()),
        )?;
        let deleted = script.ops.iter().find_map(|op| match op {
            searchsync::client::script::ScriptOp::SoftDeleteRestore(flag) => Some(*flag),
            _ => None,
        });
        if let Some(deleted) = deleted {
            self.docs
                .lock()
                .entry((index.to_string(), id.as_str().to_string()))
                .or_default()
                .insert("deleted".to_string(), Value::Bool(deleted));
        }
        Ok(())
    }

    fn delete_entity_by_fields(&self, aliases: &[String], fields: &[FieldMatch]) -> Result<()> {
        self.record("delete_entity_by_fields", Call::DeleteByFields(aliases.to_vec(), fields.to_vec()))
    }

    fn soft_delete_or_restore_children(
        &self,
        aliases: &[String],
        script: &Script,
        fields: &[FieldMatch],
    ) -> Result<()> {
        self.record(
            "soft_delete_or_restore_children",
            Call::SoftDeleteChildren(aliases.to_vec(), script.clone(), fields.to_vec()),
        )
    }

    fn update_children(&self, aliases: &[String], matcher: &FieldMatch, script: &Script) -> Result<()> {
        self.record(
            "update_children",
            Call::UpdateChildren(aliases.to_vec(), matcher.clone(), script.clone()),
        )
    }

    fn update_by_fqn_prefix(
        &self,
        index: &str,
        old_prefix: &str,
        new_prefix: &str,
        field: &str,
    ) -> Result<()> {
        self.record(
            "update_by_fqn_prefix",
            Call::UpdateByFqnPrefix {
                index: index.to_string(),
                old_prefix: old_prefix.to_string(),
                new_prefix: new_prefix.to_string(),
                field: field.to_string(),
            },
        )
    }

    fn get_doc_by_id(&self, index: &str, id: &DocId) -> Result<Option<Map<String, Value>>> {
        self.record("get_doc_by_id", Call::GetDoc(index.to_string(), id.clone()))?;
        Ok(self.doc(index, id.as_str()))
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.record("search", Call::Search(request.clone()))?;
        Ok(self.search_response.lock().clone())
    }

    fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse> {
        self.record("suggest", Call::Suggest(request.clone()))?;
        Ok(SuggestResponse::default())
    }

    fn search_by_source_url(&self, index: &str, source_url: &str) -> Result<SearchResponse> {
        self.record(
            "search_by_source_url",
            Call::SearchBySourceUrl(index.to_string(), source_url.to_string()),
        )?;
        Ok(self.search_response.lock().clone())
    }

    fn search_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph> {
        self.record("search_lineage", Call::Lineage(index.to_string(), request.clone()))?;
        Ok(LineageGraph::default())
    }

    fn search_data_quality_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph> {
        self.record(
            "search_data_quality_lineage",
            Call::DataQualityLineage(index.to_string(), request.clone()),
        )?;
        Ok(LineageGraph::default())
    }

    fn search_schema_entity_relationship(
        &self,
        index: &str,
        request: &LineageRequest,
    ) -> Result<LineageGraph> {
        self.record(
            "search_schema_entity_relationship",
            Call::SchemaEntityRelationship(index.to_string(), request.clone()),
        )?;
        Ok(LineageGraph::default())
    }

    fn search_lineage_for_export(&self, index: &str, request: &LineageRequest) -> Result<Map<String, Value>> {
        self.record("search_lineage_for_export", Call::LineageExport(index.to_string(), request.clone()))?;
        Ok(LineageGraph::default().to_export())
    }

    fn aggregate(&self, index: &str, field: &str, _value: &str, _query: Option<&str>) -> Result<Value> {
        self.record("aggregate", Call::Aggregate(index.to_string(), field.to_string()))?;
        Ok(Value::Null)
    }

    fn list_with_offset(
        &self,
        index: &str,
        _filter: &Query,
        _limit: usize,
        _offset: usize,
        _sort: &SearchSortFilter,
        _query: Option<&str>,
    ) -> Result<SearchResultListMapper> {
        self.record("list_with_offset", Call::List(index.to_string()))?;
        Ok(SearchResultListMapper::default())
    }

    fn list_with_deep_pagination(
        &self,
        index: &str,
        _query: Option<&str>,
        _filter: Option<&Query>,
        _fields: &[String],
        _sort: &SearchSortFilter,
        _size: usize,
        _search_after: Option<&[Value]>,
    ) -> Result<SearchResultListMapper> {
        self.record("list_with_deep_pagination", Call::List(index.to_string()))?;
        Ok(SearchResultListMapper::default())
    }

    fn search_by_field(&self, index: &str, field: &str, value: &str) -> Result<SearchResponse> {
        self.record(
            "search_by_field",
            Call::SearchByField(index.to_string(), field.to_string(), value.to_string()),
        )?;
        Ok(self.search_response.lock().clone())
    }
}

pub fn config() -> SearchConfig {
    SearchConfig {
        mapping_schema_root: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/elasticsearch")),
        ..SearchConfig::default()
    }
}

pub fn repository(client: &Arc<RecordingClient>) -> SearchRepository {
    let client: Arc<dyn SearchClient> = client.clone();
    SearchRepository::with_client(config(), client).expect("bundled mappings load")
}
