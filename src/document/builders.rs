//! Per-type builders. Every registered entity type gets the common steps;
//! the ones listed here add suggestion fields for their nested children or
//! drop payloads that should not be searchable.

use serde_json::{Map, Value};
use crate::core::entity::*;
use crate::core::error::Result;
use crate::document::builder::{DocumentBuilder, SourceEntity, FIELD_SUGGEST};
use crate::document::suggest::{child_name_suggestions, SearchSuggest, CHILD_WEIGHT};

const PLAIN_TYPES: [&str; 16] = [
    DATABASE,
    DATABASE_SCHEMA,
    STORED_PROCEDURE,
    CHART,
    API_COLLECTION,
    METRIC,
    QUERY,
    GLOSSARY,
    CLASSIFICATION,
    TAG,
    DOMAIN,
    DATA_PRODUCT,
    TEST_CASE,
    TEST_SUITE,
    PAGE,
    TEAM,
];

const TIME_SERIES_TYPES: [&str; 7] = [
    TEST_CASE_RESULT,
    TEST_CASE_RESOLUTION_STATUS,
    ENTITY_REPORT_DATA,
    WEB_ANALYTIC_ENTITY_VIEW_REPORT_DATA,
    WEB_ANALYTIC_USER_ACTIVITY_REPORT_DATA,
    RAW_COST_ANALYSIS_REPORT_DATA,
    AGGREGATED_COST_ANALYSIS_REPORT_DATA,
];

pub fn default_builders() -> Vec<DocumentBuilder> {
    let mut builders = vec![
        DocumentBuilder::new(TABLE)
            .exclude(&["sampleData", "tableProfile", "joins"])
            .enrich(column_suggest)
            .enrich(schema_suggest)
            .enrich(database_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(DASHBOARD)
            .enrich(chart_suggest)
            .enrich(data_model_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(DASHBOARD_DATA_MODEL)
            .enrich(column_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(PIPELINE).enrich(task_suggest).enrich(service_suggest),
        DocumentBuilder::new(TOPIC)
            .exclude(&["sampleData"])
            .enrich(message_field_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(SEARCH_INDEX)
            .exclude(&["sampleData"])
            .enrich(index_field_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(CONTAINER)
            .enrich(data_model_column_suggest)
            .enrich(service_suggest),
        DocumentBuilder::new(MLMODEL).enrich(ml_feature_suggest).enrich(service_suggest),
        DocumentBuilder::new(API_ENDPOINT).enrich(api_field_suggest).enrich(service_suggest),
        DocumentBuilder::new(GLOSSARY_TERM).enrich(synonym_suggest),
        DocumentBuilder::new(USER).exclude(&["authenticationMechanism"]),
    ];

    builders.extend(PLAIN_TYPES.iter().map(|t| DocumentBuilder::new(*t)));
    builders.extend(
        SERVICE_TYPES
            .iter()
            .map(|t| DocumentBuilder::new(*t).exclude(&["connection"])),
    );
    builders.extend(TIME_SERIES_TYPES.iter().map(|t| DocumentBuilder::new(*t)));
    builders
}

fn put_suggest(fields: &mut Map<String, Value>, key: &str, suggest: Vec<SearchSuggest>) -> Result<()> {
    if !suggest.is_empty() {
        fields.insert(key.to_string(), serde_json::to_value(suggest)?);
    }
    Ok(())
}

fn reference_suggest(source: &SourceEntity, reference: &str) -> Vec<SearchSuggest> {
    source
        .body
        .get(reference)
        .and_then(|r| r.get(FIELD_NAME))
        .and_then(Value::as_str)
        .map(|name| vec![SearchSuggest::new(name, CHILD_WEIGHT)])
        .unwrap_or_default()
}

fn column_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "columnSuggest", child_name_suggestions(source.body.get("columns")))
}

fn data_model_column_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    let columns = source.body.get("dataModel").and_then(|m| m.get("columns"));
    put_suggest(fields, "columnSuggest", child_name_suggestions(columns))
}

fn chart_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "chartSuggest", child_name_suggestions(source.body.get("charts")))
}

fn data_model_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "dataModelSuggest", child_name_suggestions(source.body.get("dataModels")))
}

fn task_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "taskSuggest", child_name_suggestions(source.body.get("tasks")))
}

fn message_field_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    let schema_fields = source.body.get("messageSchema").and_then(|s| s.get("schemaFields"));
    put_suggest(fields, "fieldSuggest", child_name_suggestions(schema_fields))
}

fn index_field_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "fieldSuggest", child_name_suggestions(source.body.get("fields")))
}

fn api_field_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    let mut suggest = Vec::new();
    for schema in ["requestSchema", "responseSchema"] {
        let schema_fields = source.body.get(schema).and_then(|s| s.get("schemaFields"));
        for entry in child_name_suggestions(schema_fields) {
            if !suggest.contains(&entry) {
                suggest.push(entry);
            }
        }
    }
    put_suggest(fields, "fieldSuggest", suggest)
}

fn ml_feature_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "mlFeatureSuggest", child_name_suggestions(source.body.get("mlFeatures")))
}

fn service_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "serviceSuggest", reference_suggest(source, "service"))
}

fn schema_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "schemaSuggest", reference_suggest(source, "databaseSchema"))
}

fn database_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    put_suggest(fields, "databaseSuggest", reference_suggest(source, "database"))
}

/// Synonyms complete like the term itself.
fn synonym_suggest(source: &SourceEntity, fields: &mut Map<String, Value>) -> Result<()> {
    let Some(synonyms) = source.body.get("synonyms").and_then(Value::as_array) else {
        return Ok(());
    };
    let mut suggest: Vec<SearchSuggest> = fields
        .get(FIELD_SUGGEST)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()?
        .unwrap_or_default();
    for synonym in synonyms.iter().filter_map(Value::as_str) {
        let entry = SearchSuggest::new(synonym, CHILD_WEIGHT);
        if !suggest.contains(&entry) {
            suggest.push(entry);
        }
    }
    put_suggest(fields, FIELD_SUGGEST, suggest)
}
