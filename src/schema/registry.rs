use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use crate::core::config::SearchConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::mapping::{IndexMapping, INDEX_NAME_SEPARATOR};

/// Alias every searchable index joins.
pub const GLOBAL_SEARCH_ALIAS: &str = "all";

const BUNDLED_INDEX_MAPPING: &str = include_str!("../../resources/index_mapping.json");

/// Entity type -> index mapping, loaded once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct IndexMappingRegistry {
    mappings: HashMap<String, IndexMapping>,
    cluster_alias: String,
    language: String,
    schema_root: PathBuf,
}

impl IndexMappingRegistry {
    /// Loads the base mapping set (fatal on failure) and layers the optional
    /// extension set over it (failure only logged).
    pub fn load(config: &SearchConfig) -> Result<Self> {
        let base = match &config.index_mapping_file {
            Some(path) => read_layer_file(path)?,
            None => BUNDLED_INDEX_MAPPING.to_string(),
        };

        let extension = match &config.extension_mapping_file {
            Some(path) => match read_layer_file(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read extension index mapping");
                    None
                }
            },
            None => None,
        };

        Self::from_sources(
            &base,
            extension.as_deref(),
            &config.cluster_alias,
            &config.mapping_language,
            config.mapping_schema_root.clone(),
        )
    }

    pub fn from_sources(
        base: &str,
        extension: Option<&str>,
        cluster_alias: &str,
        language: &str,
        schema_root: PathBuf,
    ) -> Result<Self> {
        let mut mappings = parse_layer(base).map_err(|e| {
            Error::new(ErrorKind::Config, "failed to load base index mapping").with_source(e)
        })?;

        if let Some(extension) = extension {
            match parse_layer(extension) {
                Ok(overrides) => {
                    debug!(count = overrides.len(), "applying extension index mappings");
                    mappings.extend(overrides);
                }
                Err(e) => warn!(error = %e, "failed to parse extension index mapping"),
            }
        }

        Ok(IndexMappingRegistry {
            mappings,
            cluster_alias: cluster_alias.to_string(),
            language: language.to_string(),
            schema_root,
        })
    }

    pub fn get(&self, entity_type: &str) -> Option<&IndexMapping> {
        self.mappings.get(entity_type)
    }

    pub fn require(&self, entity_type: &str) -> Result<&IndexMapping> {
        self.get(entity_type)
            .ok_or_else(|| Error::not_found(format!("no index mapping for entity type '{}'", entity_type)))
    }

    pub fn entity_types(&self) -> BTreeSet<String> {
        self.mappings.keys().cloned().collect()
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&String, &IndexMapping)> {
        self.mappings.iter()
    }

    pub fn cluster_alias(&self) -> &str {
        &self.cluster_alias
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Applies the cluster prefix to each name of a comma-separated list.
    pub fn resolve(&self, name: &str) -> String {
        if self.cluster_alias.is_empty() {
            return name.to_string();
        }
        name.split(',')
            .map(|index| format!("{}{}{}", self.cluster_alias, INDEX_NAME_SEPARATOR, index.trim()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn unresolve(&self, qualified_name: &str) -> String {
        if self.cluster_alias.is_empty() {
            return qualified_name.to_string();
        }
        let prefix = format!("{}{}", self.cluster_alias, INDEX_NAME_SEPARATOR);
        qualified_name
            .strip_prefix(&prefix)
            .unwrap_or(qualified_name)
            .to_string()
    }

    pub fn global_alias(&self) -> String {
        self.resolve(GLOBAL_SEARCH_ALIAS)
    }

    pub fn index_name(&self, entity_type: &str) -> Result<String> {
        Ok(self.require(entity_type)?.index_name(&self.cluster_alias))
    }

    pub fn child_aliases(&self, mapping: &IndexMapping) -> Vec<String> {
        mapping.child_aliases(&self.cluster_alias)
    }

    /// Reads the index schema (settings + mappings JSON) for `mapping`.
    pub fn read_schema(&self, mapping: &IndexMapping) -> Result<String> {
        let relative = mapping.mapping_file(&self.language);
        let path = self.schema_root.join(relative.trim_start_matches('/'));
        std::fs::read_to_string(&path).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                format!("failed to read index schema {}", path.display()),
            )
            .with_source(e)
        })
    }
}

fn read_layer_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorKind::Config,
            format!("cannot read index mapping {}", path.display()),
        )
        .with_source(e)
    })
}

fn parse_layer(content: &str) -> Result<HashMap<String, IndexMapping>> {
    let payload: Map<String, Value> = serde_json::from_str(content)?;
    let mut mappings = HashMap::with_capacity(payload.len());
    for (entity_type, value) in payload {
        let mapping: IndexMapping = serde_json::from_value(value).map_err(|e| {
            Error::new(
                ErrorKind::Parse,
                format!("invalid index mapping for '{}'", entity_type),
            )
            .with_source(e)
        })?;
        mappings.insert(entity_type, mapping);
    }
    Ok(mappings)
}
