pub mod dialect;
pub mod elastic;
pub mod opensearch;
pub mod rest;
pub mod script;
pub mod search_client;
pub mod transport;

use std::sync::Arc;
use tracing::info;
use crate::core::config::{SearchConfig, SearchType};
use crate::core::error::Result;

pub use elastic::ElasticDialect;
pub use opensearch::OpenSearchDialect;
pub use rest::RestSearchClient;
pub use script::{IndexTarget, PartialUpdate, Script, ScriptOp};
pub use search_client::{DocumentUpdate, SearchClient};
pub use transport::{Body, HttpTransport, Method, Response, Transport};

pub type ElasticSearchClient = RestSearchClient<ElasticDialect>;
pub type OpenSearchClient = RestSearchClient<OpenSearchDialect>;

/// Driver for `config.search_type` over the given transport.
pub fn search_client_for(search_type: SearchType, transport: Arc<dyn Transport>) -> Arc<dyn SearchClient> {
    match search_type {
        SearchType::Elasticsearch => Arc::new(ElasticSearchClient::new(ElasticDialect, transport)),
        SearchType::Opensearch => Arc::new(OpenSearchClient::new(OpenSearchDialect, transport)),
    }
}

/// HTTP-backed driver built from configuration.
pub fn build_search_client(config: &SearchConfig) -> Result<Arc<dyn SearchClient>> {
    config.validate()?;
    let transport = HttpTransport::from_config(config)?;
    info!(
        search_type = ?config.search_type,
        base_url = %config.base_url(),
        "search client initialized"
    );
    Ok(search_client_for(config.search_type, Arc::new(transport)))
}
