use std::backtrace::Backtrace;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::SystemTime;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::cascade::{CascadeContext, CascadeOp, DeleteRuleRegistry, UPDATE_CASCADES};
use crate::client::script::{Script, ScriptOp};
use crate::client::search_client::{DocumentUpdate, SearchClient};
use crate::client::build_search_client;
use crate::core::config::SearchConfig;
use crate::core::entity::{
    EntityInterface, EntityLookup, TimeSeriesEntity, FIELD_FULLY_QUALIFIED_NAME, FIELD_ID,
};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{FailureRecord, SyncStats, SyncStatsSnapshot};
use crate::core::types::{DocId, Document, EntityReference};
use crate::diff::{plan_document_write, select_change_description, DocumentWrite};
use crate::document::builder::{DocumentBuilderRegistry, FIELD_ENTITY_TYPE};
use crate::query::ast::{BoolQuery, Query};
use crate::query::request::{
    GraphKind, LineageRequest, SearchListFilter, SearchRequest, SearchSortFilter, SuggestRequest,
};
use crate::schema::mapping::IndexMapping;
use crate::schema::registry::IndexMappingRegistry;
use crate::search::lineage::LineageGraph;
use crate::search::results::{SearchResponse, SearchResultListMapper, SuggestResponse};
use crate::sync::batch::BulkBuffer;

/// Keeps the search indexes in line with mutations of the entity store.
///
/// Write operations never fail from the caller's point of view: the index is
/// a rebuildable view, so backend errors are logged, counted in
/// [`SyncStats`] and absorbed. Reads return their errors.
pub struct SearchRepository {
    config: SearchConfig,
    registry: IndexMappingRegistry,
    builders: DocumentBuilderRegistry,
    delete_rules: DeleteRuleRegistry,
    client: OnceCell<Arc<dyn SearchClient>>,
    lookup: Option<Arc<dyn EntityLookup>>,
    stats: SyncStats,
}

impl SearchRepository {
    /// Loads the index mappings; the backend client is built on first use.
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let registry = IndexMappingRegistry::load(&config)?;
        info!(
            entity_types = registry.entity_types().len(),
            cluster_alias = %config.cluster_alias,
            "search repository initialized"
        );
        Ok(SearchRepository {
            config,
            registry,
            builders: DocumentBuilderRegistry::new(),
            delete_rules: DeleteRuleRegistry::new(),
            client: OnceCell::new(),
            lookup: None,
            stats: SyncStats::new(),
        })
    }

    pub fn with_client(config: SearchConfig, client: Arc<dyn SearchClient>) -> Result<Self> {
        Ok(SearchRepository {
            client: OnceCell::with_value(client),
            ..Self::new(config)?
        })
    }

    pub fn with_registry(mut self, registry: IndexMappingRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_entity_lookup(mut self, lookup: Arc<dyn EntityLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn registry(&self) -> &IndexMappingRegistry {
        &self.registry
    }

    pub fn builders(&self) -> &DocumentBuilderRegistry {
        &self.builders
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared client, built exactly once even under concurrent first use.
    pub fn client(&self) -> Result<&Arc<dyn SearchClient>> {
        self.client.get_or_try_init(|| build_search_client(&self.config))
    }

    pub fn index_mapping(&self, entity_type: &str) -> Option<&IndexMapping> {
        self.registry.get(entity_type)
    }

    pub fn search_entities(&self) -> BTreeSet<String> {
        self.registry.entity_types()
    }

    // --- failure handling --------------------------------------------------

    fn failure(operation: &str, entity_type: &str, entity_id: &str, err: &Error) -> FailureRecord {
        FailureRecord {
            operation: operation.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            reason: err.to_string(),
            at: SystemTime::now(),
        }
    }

    fn absorb(&self, operation: &str, entity_type: &str, entity_id: &str, result: Result<()>) {
        if let Err(err) = result {
            error!(
                operation,
                entity_id,
                entity_type,
                reason = %err,
                cause = ?err.cause(),
                backtrace = %Backtrace::capture(),
                "search document write failed"
            );
            self.stats
                .record_write_failure(Self::failure(operation, entity_type, entity_id, &err));
        }
    }

    fn absorb_cascade(&self, cascade: &str, entity_type: &str, entity_id: &str, err: Error) {
        error!(
            cascade,
            entity_id,
            entity_type,
            reason = %err,
            cause = ?err.cause(),
            backtrace = %Backtrace::capture(),
            "search cascade failed"
        );
        self.stats
            .record_cascade_failure(Self::failure(cascade, entity_type, entity_id, &err));
    }

    fn run_cascade(&self, cascade: &str, entity: &dyn EntityInterface, op: &CascadeOp) {
        let result = self.client().and_then(|client| op.apply(client.as_ref(), &self.registry));
        match result {
            Ok(()) => {
                debug!(cascade, kind = op.kind(), targets = ?op.targets(&self.registry), "cascade applied");
                self.stats.record_cascade();
            }
            Err(err) => self.absorb_cascade(
                cascade,
                entity.entity_type(),
                &entity.id().to_string(),
                err,
            ),
        }
    }

    fn run_cascades(
        &self,
        cascade: &str,
        entity: &dyn EntityInterface,
        planned: Result<Vec<CascadeOp>>,
    ) {
        match planned {
            Ok(ops) => {
                for op in &ops {
                    self.run_cascade(cascade, entity, op);
                }
            }
            Err(err) => self.absorb_cascade(
                cascade,
                entity.entity_type(),
                &entity.id().to_string(),
                err,
            ),
        }
    }

    // --- index administration ---------------------------------------------

    pub fn create_indexes(&self) {
        for (_, mapping) in self.registry.mappings() {
            self.create_index(mapping);
        }
    }

    pub fn update_indexes(&self) {
        for (_, mapping) in self.registry.mappings() {
            self.update_index(mapping);
        }
    }

    /// False when the index is missing or the check itself failed.
    pub fn index_exists(&self, mapping: &IndexMapping) -> bool {
        let index = mapping.index_name(self.registry.cluster_alias());
        match self.client().and_then(|client| client.index_exists(&index)) {
            Ok(exists) => exists,
            Err(err) => {
                warn!(index = %index, error = %err, "index existence check failed");
                false
            }
        }
    }

    fn aliases_of(&self, mapping: &IndexMapping) -> Vec<String> {
        mapping.all_aliases(self.registry.cluster_alias())
    }

    pub fn create_index(&self, mapping: &IndexMapping) {
        let index = mapping.index_name(self.registry.cluster_alias());
        let result = (|| -> Result<()> {
            if self.index_exists(mapping) {
                return Ok(());
            }
            let schema = self.registry.read_schema(mapping)?;
            let client = self.client()?;
            client.create_index(&index, &schema)?;
            client.create_aliases(&index, &self.aliases_of(mapping))?;
            info!(index = %index, "index created");
            Ok(())
        })();
        if let Err(err) = result {
            error!(index = %index, error = %err, cause = ?err.cause(), "failed to create index");
        }
    }

    pub fn update_index(&self, mapping: &IndexMapping) {
        let index = mapping.index_name(self.registry.cluster_alias());
        let result = (|| -> Result<()> {
            let schema = self.registry.read_schema(mapping)?;
            let client = self.client()?;
            if self.index_exists(mapping) {
                client.update_index(&index, &schema)?;
            } else {
                client.create_index(&index, &schema)?;
            }
            client.create_aliases(&index, &self.aliases_of(mapping))
        })();
        if let Err(err) = result {
            warn!(index = %index, error = %err, "failed to update index");
        }
    }

    pub fn delete_index(&self, mapping: &IndexMapping) {
        let index = mapping.index_name(self.registry.cluster_alias());
        let result = (|| -> Result<()> {
            if self.index_exists(mapping) {
                self.client()?.delete_index(&index)?;
            }
            Ok(())
        })();
        if let Err(err) = result {
            error!(index = %index, error = %err, cause = ?err.cause(), "failed to delete index");
        }
    }

    // --- entity writes -----------------------------------------------------

    pub fn create_entity(&self, entity: &dyn EntityInterface) {
        let entity_type = entity.entity_type();
        let result = (|| -> Result<()> {
            let index = self.registry.index_name(entity_type)?;
            let doc = self.builders.build_entity(entity)?;
            self.client()?.create_entity(&index, &doc)?;
            self.stats.record_created(1);
            Ok(())
        })();
        self.absorb("create_entity", entity_type, &entity.id().to_string(), result);
    }

    /// Bulk create; every entity must share the first one's type.
    pub fn create_entities(&self, entities: &[Arc<dyn EntityInterface>]) {
        let Some(first) = entities.first() else {
            return;
        };
        let entity_type = first.entity_type().to_string();

        let built: Vec<(String, Result<Document>)> = entities
            .par_iter()
            .map(|entity| (entity.id().to_string(), self.builders.build_entity(entity.as_ref())))
            .collect();

        let result = (|| -> Result<()> {
            let index = self.registry.index_name(&entity_type)?;
            let mut buffer = BulkBuffer::new(
                Arc::clone(self.client()?),
                index,
                self.config.batch_size,
            );
            for (id, doc) in built {
                match doc {
                    Ok(doc) => buffer.add(doc)?,
                    Err(err) => self.absorb("build_document", &entity_type, &id, Err(err)),
                }
            }
            let sent = buffer.finish()?;
            self.stats.record_created(sent as u64);
            debug!(entity_type = %entity_type, sent, "bulk create finished");
            Ok(())
        })();
        self.absorb("create_entities", &entity_type, "bulk", result);
    }

    pub fn create_time_series_entity(&self, entity: &dyn TimeSeriesEntity) {
        let entity_type = entity.entity_type();
        let result = (|| -> Result<()> {
            let index = self.registry.index_name(entity_type)?;
            let doc = self.builders.build_time_series(entity)?;
            self.client()?.create_time_series_entity(&index, &doc)?;
            self.stats.record_created(1);
            Ok(())
        })();
        self.absorb("create_time_series_entity", entity_type, &entity.id().to_string(), result);
    }

    /// Merges every key of the rebuilt document into the stored one.
    pub fn update_time_series_entity(&self, entity: &dyn TimeSeriesEntity) {
        let entity_type = entity.entity_type();
        let result = (|| -> Result<()> {
            let index = self.registry.index_name(entity_type)?;
            let doc = self.builders.build_time_series(entity)?;
            let script = Script {
                ops: vec![ScriptOp::MergeFields],
                params: doc.fields.clone(),
            };
            self.client()?
                .update_entity(&index, &doc.id, &DocumentUpdate::Patch(script))
        })();
        self.absorb("update_time_series_entity", entity_type, &entity.id().to_string(), result);
    }

    fn write_updated_document(&self, entity: &dyn EntityInterface) -> Result<()> {
        let index = self.registry.index_name(entity.entity_type())?;
        let id = DocId::from(entity.id());
        match plan_document_write(entity)? {
            DocumentWrite::Patch(script) => {
                self.client()?
                    .update_entity(&index, &id, &DocumentUpdate::Patch(script))?;
                self.stats.record_incremental_patch();
            }
            DocumentWrite::Rebuild => {
                let doc = self.builders.build_entity(entity)?;
                self.client()?
                    .update_entity(&index, &id, &DocumentUpdate::Replace(doc))?;
                self.stats.record_full_rebuild();
            }
        }
        Ok(())
    }

    /// Patches or rebuilds the entity's document, then runs every update cascade.
    pub fn update_entity(&self, entity: &dyn EntityInterface) {
        let entity_type = entity.entity_type();
        let entity_id = entity.id().to_string();
        if let Err(err) = self.write_updated_document(entity) {
            self.absorb("update_entity", entity_type, &entity_id, Err(err));
            return;
        }

        let Some(mapping) = self.registry.get(entity_type) else {
            return;
        };
        let ctx = CascadeContext::new(
            &self.registry,
            mapping,
            entity,
            select_change_description(entity),
        );
        for (name, cascade) in UPDATE_CASCADES {
            self.run_cascades(name, entity, cascade(&ctx));
        }
    }

    pub fn update_entity_by_reference(&self, reference: &EntityReference) {
        let Some(lookup) = &self.lookup else {
            let err = Error::new(ErrorKind::InvalidState, "no entity lookup configured");
            self.absorb("update_entity_by_reference", &reference.entity_type, &reference.id.to_string(), Err(err));
            return;
        };
        match lookup.get(reference) {
            Ok(entity) => self.update_entity(entity.as_ref()),
            Err(err) => self.absorb(
                "update_entity_by_reference",
                &reference.entity_type,
                &reference.id.to_string(),
                Err(err),
            ),
        }
    }

    fn delete_document(&self, entity: &dyn EntityInterface) -> Result<&IndexMapping> {
        let mapping = self.registry.require(entity.entity_type())?;
        let index = mapping.index_name(self.registry.cluster_alias());
        self.client()?.delete_entity(&index, &DocId::from(entity.id()))?;
        self.stats.record_deleted();
        Ok(mapping)
    }

    /// Removes the entity's document, then applies the type's delete rule.
    pub fn delete_entity(&self, entity: &dyn EntityInterface) {
        let mapping = match self.delete_document(entity) {
            Ok(mapping) => mapping,
            Err(err) => {
                let entity_id = entity.id().to_string();
                return self.absorb("delete_entity", entity.entity_type(), &entity_id, Err(err));
            }
        };

        let ctx = CascadeContext::new(&self.registry, mapping, entity, None);
        self.run_cascades("delete", entity, self.delete_rules.plan_delete(&ctx));
    }

    pub fn delete_entity_by_fqn_prefix(&self, entity: &dyn EntityInterface) {
        let entity_type = entity.entity_type();
        let result = (|| -> Result<()> {
            let index = self.registry.index_name(entity_type)?;
            self.client()?
                .delete_entity_by_fqn_prefix(&index, entity.fully_qualified_name())
        })();
        self.absorb(
            "delete_entity_by_fqn_prefix",
            entity_type,
            entity.fully_qualified_name(),
            result,
        );
    }

    pub fn delete_time_series_entity(&self, entity: &dyn TimeSeriesEntity) {
        let entity_type = entity.entity_type();
        let result = (|| -> Result<()> {
            let index = self.registry.index_name(entity_type)?;
            self.client()?.delete_entity(&index, &DocId::from(entity.id()))?;
            self.stats.record_deleted();
            Ok(())
        })();
        self.absorb("delete_time_series_entity", entity_type, &entity.id().to_string(), result);
    }

    fn flag_document(&self, entity: &dyn EntityInterface, delete: bool) -> Result<&IndexMapping> {
        let mapping = self.registry.require(entity.entity_type())?;
        let index = mapping.index_name(self.registry.cluster_alias());
        let script = Script::of(ScriptOp::SoftDeleteRestore(delete));
        self.client()?
            .soft_delete_or_restore_entity(&index, &DocId::from(entity.id()), &script)?;
        Ok(mapping)
    }

    /// Flags (or unflags) the entity's document as deleted, then its children.
    pub fn soft_delete_or_restore_entity(&self, entity: &dyn EntityInterface, delete: bool) {
        let mapping = match self.flag_document(entity, delete) {
            Ok(mapping) => mapping,
            Err(err) => {
                let entity_id = entity.id().to_string();
                return self.absorb(
                    "soft_delete_or_restore_entity",
                    entity.entity_type(),
                    &entity_id,
                    Err(err),
                );
            }
        };

        let ctx = CascadeContext::new(&self.registry, mapping, entity, None);
        self.run_cascades(
            "soft_delete",
            entity,
            self.delete_rules.plan_soft_delete(&ctx, delete),
        );
    }

    // --- reads ------------------------------------------------------------

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut request = request.clone();
        request.index = self.registry.resolve(&request.index);
        self.client()?.search(&request)
    }

    pub fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse> {
        let mut request = request.clone();
        request.index = self.registry.resolve(&request.index);
        self.client()?.suggest(&request)
    }

    pub fn get_document(&self, entity_type: &str, id: Uuid) -> Result<Option<Map<String, Value>>> {
        let index = self.registry.index_name(entity_type)?;
        self.client()?.get_doc_by_id(&index, &DocId::from(id))
    }

    pub fn list_with_offset(
        &self,
        filter: &SearchListFilter,
        limit: usize,
        offset: usize,
        entity_type: &str,
        sort: &SearchSortFilter,
        query: Option<&str>,
    ) -> Result<SearchResultListMapper> {
        let index = self.registry.index_name(entity_type)?;
        self.client()?
            .list_with_offset(&index, &filter.condition(entity_type), limit, offset, sort, query)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn list_with_deep_pagination(
        &self,
        entity_type: &str,
        query: Option<&str>,
        filter: Option<&Query>,
        fields: &[String],
        sort: &SearchSortFilter,
        size: usize,
        search_after: Option<&[Value]>,
    ) -> Result<SearchResultListMapper> {
        let index = self.registry.index_name(entity_type)?;
        self.client()?
            .list_with_deep_pagination(&index, query, filter, fields, sort, size, search_after)
    }

    pub fn search_by_field(&self, field: &str, value: &str, index: &str) -> Result<SearchResponse> {
        self.client()?
            .search_by_field(&self.registry.resolve(index), field, value)
    }

    pub fn search_lineage(&self, request: &LineageRequest) -> Result<LineageGraph> {
        self.client()?.search_lineage(&self.registry.global_alias(), request)
    }

    pub fn search_entity_relationship(&self, request: &LineageRequest) -> Result<LineageGraph> {
        let request = request.clone().kind(GraphKind::EntityRelationship);
        self.search_lineage(&request)
    }

    pub fn search_by_source_url(&self, source_url: &str) -> Result<SearchResponse> {
        self.client()?
            .search_by_source_url(&self.registry.global_alias(), source_url)
    }

    /// Upstream lineage of `fqn`; nothing downstream is walked.
    pub fn search_data_quality_lineage(
        &self,
        fqn: &str,
        upstream_depth: usize,
        query_filter: Option<Value>,
        deleted: bool,
    ) -> Result<LineageGraph> {
        let request = LineageRequest::new(fqn, upstream_depth, 0)
            .kind(GraphKind::DataQuality)
            .query_filter(query_filter)
            .include_deleted(deleted);
        self.client()?
            .search_data_quality_lineage(&self.registry.global_alias(), &request)
    }

    /// Relationship graph of every table in the schema named by `request.fqn`.
    pub fn search_schema_entity_relationship(&self, request: &LineageRequest) -> Result<LineageGraph> {
        let request = request.clone().kind(GraphKind::SchemaEntityRelationship);
        self.client()?
            .search_schema_entity_relationship(&self.registry.global_alias(), &request)
    }

    pub fn search_lineage_for_export(&self, request: &LineageRequest) -> Result<Map<String, Value>> {
        self.client()?
            .search_lineage_for_export(&self.registry.global_alias(), request)
    }

    pub fn aggregate(&self, index: &str, field: &str, value: &str, query: Option<&str>) -> Result<Value> {
        self.client()?
            .aggregate(&self.registry.resolve(index), field, value, query)
    }

    /// References to every live document nested under `fqn`, one per id.
    pub fn get_entities_containing_fqn(&self, fqn: &str, size: usize, index: &str) -> Vec<EntityReference> {
        match self.entities_containing_fqn(fqn, size, index) {
            Ok(references) => references,
            Err(err) => {
                error!(fqn, index, reason = %err, cause = ?err.cause(), "failed to list entities containing fqn");
                Vec::new()
            }
        }
    }

    fn entities_containing_fqn(&self, fqn: &str, size: usize, index: &str) -> Result<Vec<EntityReference>> {
        let filter = BoolQuery::new()
            .with_must(Query::wildcard(FIELD_FULLY_QUALIFIED_NAME, format!("{}.*", fqn)))
            .into_query();
        let request = SearchRequest::new("*", size, index)
            .query_filter(filter)
            .deleted(false)
            .track_total_hits(false);
        let response = self.search(&request)?;

        let mut references: BTreeMap<Uuid, EntityReference> = BTreeMap::new();
        for hit in &response.hits {
            let (Some(id), Some(hit_fqn), Some(entity_type)) = (
                hit.source_str(FIELD_ID),
                hit.source_str(FIELD_FULLY_QUALIFIED_NAME),
                hit.source_str(FIELD_ENTITY_TYPE),
            ) else {
                continue;
            };
            if hit_fqn.is_empty() || entity_type.is_empty() {
                continue;
            }
            let Ok(id) = Uuid::parse_str(id) else {
                debug!(id, "skipping hit with a malformed id");
                continue;
            };
            references
                .entry(id)
                .or_insert_with(|| EntityReference::new(id, entity_type).with_fqn(hit_fqn));
        }
        Ok(references.into_values().collect())
    }
}
