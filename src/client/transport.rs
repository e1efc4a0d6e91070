use std::fmt;
use std::time::Duration;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    /// Newline-delimited JSON, one value per line (`_bulk`)
    NdJson(Vec<Value>),
}

impl Body {
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::NdJson(_) => "application/x-ndjson",
        }
    }

    pub fn encode(&self) -> Result<String> {
        match self {
            Body::Json(value) => Ok(serde_json::to_string(value)?),
            Body::NdJson(lines) => {
                let mut out = String::new();
                for line in lines {
                    out.push_str(&serde_json::to_string(line)?);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Response { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Fails with a backend error unless the status is 2xx.
    pub fn ok(self, action: &str) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        let reason = self
            .body
            .pointer("/error/reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.body.to_string());
        Err(Error::backend(format!(
            "{} failed with status {}: {}",
            action, self.status, reason
        )))
    }
}

/// One HTTP round trip against the search cluster.
pub trait Transport: Send + Sync {
    fn perform(&self, method: Method, path: &str, body: Option<Body>) -> Result<Response>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .timeout(Duration::from_secs(config.socket_timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.username.is_some())
            .finish()
    }
}

impl Transport for HttpTransport {
    fn perform(&self, method: Method, path: &str, body: Option<Body>) -> Result<Response> {
        let url = self.url(path);
        debug!(method = method.as_str(), %url, "search request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Head => self.client.head(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, body.content_type())
                .body(body.encode()?);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                Error::backend(format!("search request timed out: {}", url)).with_source(e)
            } else if e.is_connect() {
                Error::backend(format!("failed to connect to search cluster: {}", url)).with_source(e)
            } else {
                Error::from(e)
            }
        })?;

        let status = response.status().as_u16();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(Response::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ndjson_ends_every_line() {
        let body = Body::NdJson(vec![json!({"index": {"_id": "1"}}), json!({"name": "a"})]);
        let encoded = body.encode().unwrap();
        assert_eq!(encoded, "{\"index\":{\"_id\":\"1\"}}\n{\"name\":\"a\"}\n");
        assert_eq!(body.content_type(), "application/x-ndjson");
    }

    #[test]
    fn test_error_reason_is_surfaced() {
        let response = Response::new(
            400,
            json!({"error": {"reason": "mapper_parsing_exception"}}),
        );
        let err = response.ok("create index").unwrap_err();
        assert!(err.context.contains("mapper_parsing_exception"));
        assert!(err.context.contains("400"));
    }

    #[test]
    fn test_url_join() {
        let transport = HttpTransport::from_config(&SearchConfig::default()).unwrap();
        assert_eq!(transport.url("/table/_doc/1"), format!("{}/table/_doc/1", SearchConfig::default().base_url()));
    }
}
