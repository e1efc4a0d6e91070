use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Which search engine the driver talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Elasticsearch,
    Opensearch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    pub search_type: SearchType,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    // Prefix shared by every index/alias name when several deployments share one cluster
    pub cluster_alias: String,
    pub mapping_language: String,

    pub index_mapping_file: Option<PathBuf>,
    pub extension_mapping_file: Option<PathBuf>,
    pub mapping_schema_root: PathBuf,

    pub connection_timeout_secs: u64,
    pub socket_timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            search_type: SearchType::Elasticsearch,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 9200,
            username: None,
            password: None,

            cluster_alias: String::new(),
            mapping_language: "en".to_string(),

            index_mapping_file: None,
            extension_mapping_file: None,
            mapping_schema_root: PathBuf::from("./resources/elasticsearch"),

            connection_timeout_secs: 5,
            socket_timeout_secs: 60,
            batch_size: 100,
        }
    }
}

impl SearchConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read search config {}", path.display())).with_source(e)
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SearchConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("invalid search config: {}", e)).with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("search host must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batchSize must be greater than zero"));
        }
        if self.mapping_language.trim().is_empty() {
            return Err(Error::config("mappingLanguage must not be empty"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.search_type, SearchType::Elasticsearch);
        assert_eq!(config.base_url(), "http://localhost:9200");
        assert!(config.cluster_alias.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_overrides_and_fills_defaults() {
        let yaml = "searchType: opensearch\nhost: search.internal\nport: 9201\nclusterAlias: tenant1\n";
        let config = SearchConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.search_type, SearchType::Opensearch);
        assert_eq!(config.cluster_alias, "tenant1");
        assert_eq!(config.base_url(), "http://search.internal:9201");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.mapping_language, "en");
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = SearchConfig::from_json_str(r#"{"batchSize": 0}"#).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::Config);
    }
}
