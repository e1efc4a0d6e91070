//! Entity capabilities consumed from the authoritative metadata store.
//!
//! The store owns durability; this crate only needs to read ids, names,
//! versions and change descriptions, plus a serialized form to index.

use std::sync::Arc;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;
use crate::core::error::Result;
use crate::core::types::{ChangeDescription, EntityReference};

pub const TABLE: &str = "table";
pub const DATABASE: &str = "database";
pub const DATABASE_SCHEMA: &str = "databaseSchema";
pub const STORED_PROCEDURE: &str = "storedProcedure";
pub const DASHBOARD: &str = "dashboard";
pub const DASHBOARD_DATA_MODEL: &str = "dashboardDataModel";
pub const CHART: &str = "chart";
pub const TOPIC: &str = "topic";
pub const PIPELINE: &str = "pipeline";
pub const MLMODEL: &str = "mlmodel";
pub const CONTAINER: &str = "container";
pub const SEARCH_INDEX: &str = "searchIndex";
pub const API_COLLECTION: &str = "apiCollection";
pub const API_ENDPOINT: &str = "apiEndpoint";
pub const METRIC: &str = "metric";
pub const QUERY: &str = "query";
pub const GLOSSARY: &str = "glossary";
pub const GLOSSARY_TERM: &str = "glossaryTerm";
pub const CLASSIFICATION: &str = "classification";
pub const TAG: &str = "tag";
pub const DOMAIN: &str = "domain";
pub const DATA_PRODUCT: &str = "dataProduct";
pub const USER: &str = "user";
pub const TEAM: &str = "team";
pub const TEST_CASE: &str = "testCase";
pub const TEST_SUITE: &str = "testSuite";
pub const PAGE: &str = "page";

pub const DATABASE_SERVICE: &str = "databaseService";
pub const DASHBOARD_SERVICE: &str = "dashboardService";
pub const MESSAGING_SERVICE: &str = "messagingService";
pub const PIPELINE_SERVICE: &str = "pipelineService";
pub const MLMODEL_SERVICE: &str = "mlmodelService";
pub const STORAGE_SERVICE: &str = "storageService";
pub const SEARCH_SERVICE: &str = "searchService";
pub const API_SERVICE: &str = "apiService";

pub const SERVICE_TYPES: [&str; 8] = [
    DATABASE_SERVICE,
    DASHBOARD_SERVICE,
    MESSAGING_SERVICE,
    PIPELINE_SERVICE,
    MLMODEL_SERVICE,
    STORAGE_SERVICE,
    SEARCH_SERVICE,
    API_SERVICE,
];

pub const TEST_CASE_RESULT: &str = "testCaseResult";
pub const TEST_CASE_RESOLUTION_STATUS: &str = "testCaseResolutionStatus";
pub const ENTITY_REPORT_DATA: &str = "entityReportData";
pub const WEB_ANALYTIC_ENTITY_VIEW_REPORT_DATA: &str = "webAnalyticEntityViewReportData";
pub const WEB_ANALYTIC_USER_ACTIVITY_REPORT_DATA: &str = "webAnalyticUserActivityReportData";
pub const RAW_COST_ANALYSIS_REPORT_DATA: &str = "rawCostAnalysisReportData";
pub const AGGREGATED_COST_ANALYSIS_REPORT_DATA: &str = "aggregatedCostAnalysisReportData";

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_FULLY_QUALIFIED_NAME: &str = "fullyQualifiedName";
pub const FIELD_DISPLAY_NAME: &str = "displayName";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_STYLE: &str = "style";
pub const FIELD_OWNERS: &str = "owners";
pub const FIELD_DOMAIN: &str = "domain";
pub const FIELD_DISABLED: &str = "disabled";
pub const FIELD_TEST_SUITES: &str = "testSuites";
pub const FIELD_TAGS: &str = "tags";
pub const FIELD_FOLLOWERS: &str = "followers";
pub const FIELD_USAGE_SUMMARY: &str = "usageSummary";
pub const FIELD_QUERY_USED_IN: &str = "queryUsedIn";
pub const FIELD_VOTES: &str = "votes";
pub const FIELD_PIPELINE_STATUS: &str = "pipelineStatus";
pub const FIELD_PARENT: &str = "parent";
pub const FIELD_SOURCE_URL: &str = "sourceUrl";
pub const FIELD_DELETED: &str = "deleted";
pub const FIELD_UPDATED_AT: &str = "updatedAt";
pub const FIELD_CHANGE_DESCRIPTION: &str = "changeDescription";
pub const FIELD_INCREMENTAL_CHANGE_DESCRIPTION: &str = "incrementalChangeDescription";

/// Fields whose parent value is denormalized into every child document.
pub const INHERITABLE_FIELDS: [&str; 5] = [
    FIELD_OWNERS,
    FIELD_DOMAIN,
    FIELD_DISABLED,
    FIELD_TEST_SUITES,
    FIELD_DISPLAY_NAME,
];

/// Glossary-term fields whose labels propagate to tagged documents.
pub const PROPAGATED_TAG_FIELDS: [&str; 1] = [FIELD_TAGS];

pub const CERTIFICATION_CLASSIFICATION: &str = "Certification";

pub fn is_service_type(entity_type: &str) -> bool {
    SERVICE_TYPES
        .iter()
        .any(|service| service.eq_ignore_ascii_case(entity_type))
}

pub fn is_inheritable_field(field: &str) -> bool {
    INHERITABLE_FIELDS.contains(&field)
}

/// Read capabilities of a stored entity.
pub trait EntityInterface: Send + Sync {
    fn id(&self) -> Uuid;
    fn entity_type(&self) -> &str;
    fn name(&self) -> &str;
    fn fully_qualified_name(&self) -> &str;
    fn version(&self) -> f64;
    fn updated_at(&self) -> i64;
    fn owners(&self) -> &[EntityReference];

    /// Changes since creation or the last major version.
    fn change_description(&self) -> Option<&ChangeDescription>;

    /// Changes since the last persisted document version.
    fn incremental_change_description(&self) -> Option<&ChangeDescription>;

    /// Serialized form of the entity as the store persists it.
    fn to_json(&self) -> Result<Map<String, Value>>;

    fn entity_reference(&self) -> EntityReference {
        EntityReference::new(self.id(), self.entity_type())
            .with_name(self.name())
            .with_fqn(self.fully_qualified_name())
    }
}

/// Time-series records (test results, report data). Report-data records
/// return their report-data type from `entity_type`, since each has its own index.
pub trait TimeSeriesEntity: Send + Sync {
    fn id(&self) -> Uuid;
    fn entity_type(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn to_json(&self) -> Result<Map<String, Value>>;
}

/// Fetches a complete entity when only a reference is at hand.
pub trait EntityLookup: Send + Sync {
    fn get(&self, reference: &EntityReference) -> Result<Arc<dyn EntityInterface>>;
}

/// Generic in-memory entity carrying typed identity fields plus free-form attributes.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: Uuid,
    pub entity_type: String,
    pub name: String,
    pub fully_qualified_name: String,
    pub version: f64,
    pub updated_at: i64,
    pub owners: Vec<EntityReference>,
    pub change_description: Option<ChangeDescription>,
    pub incremental_change_description: Option<ChangeDescription>,
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>, fqn: impl Into<String>) -> Self {
        EntityRecord {
            id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            name: name.into(),
            fully_qualified_name: fqn.into(),
            version: 0.1,
            updated_at: Utc::now().timestamp_millis(),
            owners: Vec::new(),
            change_description: None,
            incremental_change_description: None,
            attributes: Map::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn with_owners(mut self, owners: Vec<EntityReference>) -> Self {
        self.owners = owners;
        self
    }

    pub fn with_change_description(mut self, change: ChangeDescription) -> Self {
        self.change_description = Some(change);
        self
    }

    pub fn with_incremental_change_description(mut self, change: ChangeDescription) -> Self {
        self.incremental_change_description = Some(change);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

impl EntityInterface for EntityRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fully_qualified_name(&self) -> &str {
        &self.fully_qualified_name
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn owners(&self) -> &[EntityReference] {
        &self.owners
    }

    fn change_description(&self) -> Option<&ChangeDescription> {
        self.change_description.as_ref()
    }

    fn incremental_change_description(&self) -> Option<&ChangeDescription> {
        self.incremental_change_description.as_ref()
    }

    fn to_json(&self) -> Result<Map<String, Value>> {
        let mut json = self.attributes.clone();
        json.insert(FIELD_ID.to_string(), Value::String(self.id.to_string()));
        json.insert(FIELD_NAME.to_string(), Value::String(self.name.clone()));
        json.insert(
            FIELD_FULLY_QUALIFIED_NAME.to_string(),
            Value::String(self.fully_qualified_name.clone()),
        );
        json.insert("version".to_string(), serde_json::to_value(self.version)?);
        json.insert(FIELD_UPDATED_AT.to_string(), Value::from(self.updated_at));
        if !self.owners.is_empty() {
            json.insert(FIELD_OWNERS.to_string(), serde_json::to_value(&self.owners)?);
        }
        if let Some(change) = &self.change_description {
            json.insert(FIELD_CHANGE_DESCRIPTION.to_string(), serde_json::to_value(change)?);
        }
        if let Some(change) = &self.incremental_change_description {
            json.insert(
                FIELD_INCREMENTAL_CHANGE_DESCRIPTION.to_string(),
                serde_json::to_value(change)?,
            );
        }
        Ok(json)
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesRecord {
    pub id: Uuid,
    pub entity_type: String,
    pub timestamp: i64,
    pub attributes: Map<String, Value>,
}

impl TimeSeriesRecord {
    pub fn new(entity_type: impl Into<String>, timestamp: i64) -> Self {
        TimeSeriesRecord {
            id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            timestamp,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

impl TimeSeriesEntity for TimeSeriesRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn to_json(&self) -> Result<Map<String, Value>> {
        let mut json = self.attributes.clone();
        json.insert(FIELD_ID.to_string(), Value::String(self.id.to_string()));
        json.insert("timestamp".to_string(), Value::from(self.timestamp));
        Ok(json)
    }
}
