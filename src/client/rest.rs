use std::sync::Arc;
use serde_json::{json, Map, Value};
use tracing::debug;
use crate::client::dialect::Dialect;
use crate::client::script::{Script, ScriptOp};
use crate::client::search_client::{DocumentUpdate, SearchClient};
use crate::client::transport::{Body, Method, Transport};
use crate::core::config::SearchType;
use crate::core::entity::{FIELD_DELETED, FIELD_FULLY_QUALIFIED_NAME, FIELD_SOURCE_URL};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::query::ast::{BoolQuery, FieldMatch, Query};
use crate::query::request::{
    GraphKind, LineageRequest, SearchRequest, SearchSortFilter, SuggestRequest,
};
use crate::search::lineage::{self, LineageGraph};
use crate::search::results::{SearchResponse, SearchResultListMapper, SuggestResponse};

const BY_QUERY_PARAMS: &str = "conflicts=proceed&refresh=true";
const SUGGESTION_NAME: &str = "metadata-suggest";
const LINEAGE_PAGE_SIZE: usize = 1000;
const AGGREGATION_SIZE: usize = 100;
const FIELD_SEARCH_SIZE: usize = 100;

/// REST driver shared by both engines; the dialect decides script and query syntax.
pub struct RestSearchClient<D: Dialect> {
    dialect: D,
    transport: Arc<dyn Transport>,
}

impl<D: Dialect> RestSearchClient<D> {
    pub fn new(dialect: D, transport: Arc<dyn Transport>) -> Self {
        RestSearchClient { dialect, transport }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    fn send(&self, method: Method, path: &str, body: Option<Body>, action: &str) -> Result<Value> {
        self.transport.perform(method, path, body)?.ok(action)
    }

    fn run_search(&self, index: &str, body: Value) -> Result<SearchResponse> {
        let response = self.send(
            Method::Post,
            &format!("{}/_search", index),
            Some(Body::Json(body)),
            "search",
        )?;
        SearchResponse::from_backend(&response)
    }

    fn update_by_query(&self, aliases: &[String], query: &Query, script: &Script) -> Result<()> {
        if aliases.is_empty() || script.is_empty() {
            debug!("update_by_query skipped: nothing to target");
            return Ok(());
        }
        let body = json!({
            "query": self.dialect.encode_query(query),
            "script": self.dialect.encode_script(script),
        });
        self.send(
            Method::Post,
            &format!("{}/_update_by_query?{}", aliases.join(","), BY_QUERY_PARAMS),
            Some(Body::Json(body)),
            "update_by_query",
        )?;
        Ok(())
    }

    fn delete_by_query(&self, aliases: &[String], query: &Query) -> Result<()> {
        if aliases.is_empty() {
            debug!("delete_by_query skipped: nothing to target");
            return Ok(());
        }
        let body = json!({ "query": self.dialect.encode_query(query) });
        self.send(
            Method::Post,
            &format!("{}/_delete_by_query?{}", aliases.join(","), BY_QUERY_PARAMS),
            Some(Body::Json(body)),
            "delete_by_query",
        )?;
        Ok(())
    }

    fn put_document(&self, index: &str, doc: &Document, action: &str) -> Result<()> {
        self.send(
            Method::Put,
            &format!("{}/_doc/{}?refresh=true", index, doc.id),
            Some(Body::Json(doc.source())),
            action,
        )?;
        Ok(())
    }

    fn encode_sort(&self, sort: &SearchSortFilter) -> Value {
        let mut order = Map::new();
        order.insert(sort.sort_field.clone(), json!({ "order": sort.sort_order.as_str() }));
        Value::Object(order)
    }

    fn text_query(query: Option<&str>) -> Query {
        match query.map(str::trim) {
            None | Some("") | Some("*") => Query::MatchAll,
            Some(text) => Query::query_string(text),
        }
    }
}

impl<D: Dialect> SearchClient for RestSearchClient<D> {
    fn search_type(&self) -> SearchType {
        self.dialect.search_type()
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.transport.perform(Method::Head, index, None)?;
        match response.status {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(Error::backend(format!(
                "index existence check for {} returned status {}",
                index, response.status
            ))),
        }
    }

    fn create_index(&self, index: &str, schema: &str) -> Result<()> {
        let body: Value = serde_json::from_str(schema)?;
        self.send(Method::Put, index, Some(Body::Json(body)), "create index")?;
        Ok(())
    }

    fn update_index(&self, index: &str, schema: &str) -> Result<()> {
        let body: Value = serde_json::from_str(schema)?;
        let mappings = body.get("mappings").cloned().unwrap_or(body);
        self.send(
            Method::Put,
            &format!("{}/_mapping", index),
            Some(Body::Json(mappings)),
            "update index mapping",
        )?;
        Ok(())
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.transport.perform(Method::Delete, index, None)?;
        if response.is_not_found() {
            return Ok(());
        }
        response.ok("delete index")?;
        Ok(())
    }

    fn create_aliases(&self, index: &str, aliases: &[String]) -> Result<()> {
        if aliases.is_empty() {
            return Ok(());
        }
        let actions: Vec<Value> = aliases
            .iter()
            .map(|alias| json!({ "add": { "index": index, "alias": alias } }))
            .collect();
        self.send(
            Method::Post,
            "_aliases",
            Some(Body::Json(json!({ "actions": actions }))),
            "create aliases",
        )?;
        Ok(())
    }

    fn create_entity(&self, index: &str, doc: &Document) -> Result<()> {
        self.put_document(index, doc, "index document")
    }

    fn create_entities(&self, index: &str, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut lines = Vec::with_capacity(docs.len() * 2);
        for doc in docs {
            lines.push(json!({ "index": { "_index": index, "_id": doc.id.as_str() } }));
            lines.push(doc.source());
        }
        let response = self.send(
            Method::Post,
            "_bulk?refresh=true",
            Some(Body::NdJson(lines)),
            "bulk index",
        )?;

        if response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
            let items = response.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
            let failed: Vec<&Value> = items
                .iter()
                .filter_map(|item| item.get("index"))
                .filter(|item| item.get("error").is_some())
                .collect();
            let reason = failed
                .first()
                .and_then(|item| item.pointer("/error/reason"))
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            return Err(Error::backend(format!(
                "bulk index into {} failed for {} of {} documents: {}",
                index,
                failed.len(),
                docs.len(),
                reason
            )));
        }
        Ok(())
    }

    fn create_time_series_entity(&self, index: &str, doc: &Document) -> Result<()> {
        self.put_document(index, doc, "index time series document")
    }

    fn update_entity(&self, index: &str, id: &DocId, update: &DocumentUpdate) -> Result<()> {
        match update {
            DocumentUpdate::Replace(doc) => self.put_document(index, doc, "replace document"),
            DocumentUpdate::Patch(script) => {
                if script.is_empty() {
                    return Ok(());
                }
                let body = json!({ "script": self.dialect.encode_script(script) });
                self.send(
                    Method::Post,
                    &format!("{}/_update/{}?refresh=true", index, id),
                    Some(Body::Json(body)),
                    "update document",
                )?;
                Ok(())
            }
        }
    }

    fn delete_entity(&self, index: &str, id: &DocId) -> Result<()> {
        let response = self
            .transport
            .perform(Method::Delete, &format!("{}/_doc/{}?refresh=true", index, id), None)?;
        if response.is_not_found() {
            debug!(%index, %id, "document already absent");
            return Ok(());
        }
        response.ok("delete document")?;
        Ok(())
    }

    fn delete_entity_by_fqn_prefix(&self, index: &str, fqn_prefix: &str) -> Result<()> {
        self.delete_by_query(
            &[index.to_string()],
            &Query::prefix(FIELD_FULLY_QUALIFIED_NAME, fqn_prefix),
        )
    }

    fn soft_delete_or_restore_entity(&self, index: &str, id: &DocId, script: &Script) -> Result<()> {
        self.update_entity(index, id, &DocumentUpdate::Patch(script.clone()))
    }

    fn delete_entity_by_fields(&self, aliases: &[String], fields: &[FieldMatch]) -> Result<()> {
        if fields.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "delete by fields needs at least one predicate",
            ));
        }
        self.delete_by_query(aliases, &FieldMatch::conjunction(fields))
    }

    fn soft_delete_or_restore_children(
        &self,
        aliases: &[String],
        script: &Script,
        fields: &[FieldMatch],
    ) -> Result<()> {
        self.update_by_query(aliases, &FieldMatch::conjunction(fields), script)
    }

    fn update_children(&self, aliases: &[String], matcher: &FieldMatch, script: &Script) -> Result<()> {
        self.update_by_query(aliases, &matcher.to_query(), script)
    }

    fn update_by_fqn_prefix(
        &self,
        index: &str,
        old_prefix: &str,
        new_prefix: &str,
        field: &str,
    ) -> Result<()> {
        let script = Script::of(ScriptOp::UpdateFqnPrefix(field.to_string()))
            .param("oldParentFQN", Value::String(old_prefix.to_string()))
            .param("newParentFQN", Value::String(new_prefix.to_string()));
        // `Tier.Gold` must not catch `Tier.Golden`
        let query = BoolQuery::new()
            .with_should(Query::term(field, old_prefix))
            .with_should(Query::prefix(field, format!("{}.", old_prefix)))
            .into_query();
        self.update_by_query(&[index.to_string()], &query, &script)
    }

    fn get_doc_by_id(&self, index: &str, id: &DocId) -> Result<Option<Map<String, Value>>> {
        let response = self
            .transport
            .perform(Method::Get, &format!("{}/_doc/{}", index, id), None)?;
        if response.is_not_found() {
            return Ok(None);
        }
        let body = response.ok("get document")?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get("_source").and_then(Value::as_object).cloned())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut body = Map::new();
        body.insert("from".into(), json!(request.from));
        body.insert("size".into(), json!(request.size));
        body.insert("query".into(), self.dialect.encode_query(&request.to_query()));
        body.insert("sort".into(), json!([self.encode_sort(&request.sort)]));
        body.insert("track_total_hits".into(), json!(request.track_total_hits));
        if let Some(post_filter) = &request.post_filter {
            body.insert("post_filter".into(), self.dialect.encode_query(post_filter));
        }
        if !request.fetch_source {
            body.insert("_source".into(), json!(false));
        } else if !request.include_source_fields.is_empty() || !request.exclude_source_fields.is_empty() {
            body.insert(
                "_source".into(),
                json!({
                    "includes": request.include_source_fields,
                    "excludes": request.exclude_source_fields,
                }),
            );
        }
        self.run_search(&request.index, Value::Object(body))
    }

    fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse> {
        let mut suggestion = Map::new();
        suggestion.insert(
            SUGGESTION_NAME.to_string(),
            json!({
                "prefix": request.query,
                "completion": {
                    "field": request.field,
                    "size": request.size,
                    "skip_duplicates": true,
                },
            }),
        );
        let mut body = json!({ "suggest": suggestion });
        if !request.fetch_source {
            body["_source"] = json!(false);
        } else if !request.include_source_fields.is_empty() {
            body["_source"] = json!({ "includes": request.include_source_fields });
        }

        let response = self.send(
            Method::Post,
            &format!("{}/_search", request.index),
            Some(Body::Json(body)),
            "suggest",
        )?;
        let mut parsed = SuggestResponse::from_backend(&response, SUGGESTION_NAME)?;
        if let Some(deleted) = request.deleted {
            parsed.options.retain(|option| {
                option.source.get(FIELD_DELETED).and_then(Value::as_bool).unwrap_or(false) == deleted
            });
        }
        Ok(parsed)
    }

    fn search_by_source_url(&self, index: &str, source_url: &str) -> Result<SearchResponse> {
        let query = BoolQuery::new()
            .with_must(Query::term(FIELD_SOURCE_URL, source_url))
            .with_must_not(Query::term(FIELD_DELETED, true))
            .into_query();
        let body = json!({
            "size": FIELD_SEARCH_SIZE,
            "query": self.dialect.encode_query(&query),
        });
        self.run_search(index, body)
    }

    fn search_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph> {
        lineage::traverse(request, |query| {
            let body = json!({
                "size": LINEAGE_PAGE_SIZE,
                "query": self.dialect.encode_query(query),
            });
            Ok(self.run_search(index, body)?.sources())
        })
    }

    fn search_data_quality_lineage(&self, index: &str, request: &LineageRequest) -> Result<LineageGraph> {
        let mut request = request.clone().kind(GraphKind::DataQuality);
        request.downstream_depth = 0;
        self.search_lineage(index, &request)
    }

    fn search_schema_entity_relationship(
        &self,
        index: &str,
        request: &LineageRequest,
    ) -> Result<LineageGraph> {
        let request = request.clone().kind(GraphKind::SchemaEntityRelationship);
        lineage::traverse_schema(&request, |query| {
            let body = json!({
                "size": LINEAGE_PAGE_SIZE,
                "query": self.dialect.encode_query(query),
            });
            Ok(self.run_search(index, body)?.sources())
        })
    }

    fn search_lineage_for_export(&self, index: &str, request: &LineageRequest) -> Result<Map<String, Value>> {
        Ok(self.search_lineage(index, request)?.to_export())
    }

    fn aggregate(&self, index: &str, field: &str, value: &str, query: Option<&str>) -> Result<Value> {
        let mut terms = Map::new();
        terms.insert("field".into(), json!(field));
        terms.insert("size".into(), json!(AGGREGATION_SIZE));
        if !value.is_empty() {
            terms.insert("include".into(), json!(format!(".*{}.*", regex::escape(value))));
        }
        let mut aggregations = Map::new();
        aggregations.insert(field.to_string(), json!({ "terms": terms }));

        let body = json!({
            "size": 0,
            "query": self.dialect.encode_query(&Self::text_query(query)),
            "aggregations": aggregations,
        });
        let response = self.run_search(index, body)?;
        Ok(response.aggregations.unwrap_or_else(|| json!({})))
    }

    fn list_with_offset(
        &self,
        index: &str,
        filter: &Query,
        limit: usize,
        offset: usize,
        sort: &SearchSortFilter,
        query: Option<&str>,
    ) -> Result<SearchResultListMapper> {
        let root = BoolQuery::new()
            .with_must(Self::text_query(query))
            .with_filter(filter.clone())
            .into_query();
        let body = json!({
            "from": offset,
            "size": limit,
            "query": self.dialect.encode_query(&root),
            "sort": [self.encode_sort(sort)],
            "track_total_hits": true,
        });
        Ok(self.run_search(index, body)?.into())
    }

    fn list_with_deep_pagination(
        &self,
        index: &str,
        query: Option<&str>,
        filter: Option<&Query>,
        fields: &[String],
        sort: &SearchSortFilter,
        size: usize,
        search_after: Option<&[Value]>,
    ) -> Result<SearchResultListMapper> {
        let mut root = BoolQuery::new().with_must(Self::text_query(query));
        if let Some(filter) = filter {
            root = root.with_filter(filter.clone());
        }
        let mut tiebreak = Map::new();
        tiebreak.insert(FIELD_FULLY_QUALIFIED_NAME.to_string(), json!({ "order": "asc" }));

        let mut body = json!({
            "size": size,
            "query": self.dialect.encode_query(&root.into_query()),
            "sort": [self.encode_sort(sort), Value::Object(tiebreak)],
            "track_total_hits": true,
        });
        if !fields.is_empty() {
            body["_source"] = json!({ "includes": fields });
        }
        if let Some(after) = search_after {
            body["search_after"] = Value::Array(after.to_vec());
        }
        Ok(self.run_search(index, body)?.into())
    }

    fn search_by_field(&self, index: &str, field: &str, value: &str) -> Result<SearchResponse> {
        let body = json!({
            "size": FIELD_SEARCH_SIZE,
            "query": self.dialect.encode_query(&Query::wildcard(field, value)),
        });
        self.run_search(index, body)
    }
}
