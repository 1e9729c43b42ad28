//! Search index client
//!
//! Speaks the Azure AI Search document query API
//! (`POST {endpoint}/indexes/{index}/docs/search?api-version=...`). Queries
//! are hybrid: the text drives the keyword ranker and, when a vector field is
//! named, a `kind: text` vector query that the index's own vectorizer embeds.

use super::SourceError;
use crate::config::{secret_from_env, SearchConfig};
use sdk::errors::EngineError;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// One scored document from an index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    pub document: Map<String, Value>,
}

impl SearchHit {
    /// String field, or empty when absent
    pub fn text(&self, field: &str) -> &str {
        self.document
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Field rendered as text whatever its JSON type
    pub fn display(&self, field: &str) -> Option<String> {
        match self.document.get(field)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One query against an index
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub text: &'a str,
    pub top: usize,
    pub select: &'a [&'a str],
    /// Vector field matched against the embedded query text
    pub vector_field: Option<&'a str>,
}

impl SearchQuery<'_> {
    fn body(&self) -> Value {
        let mut body = json!({
            "search": self.text,
            "top": self.top,
        });
        if !self.select.is_empty() {
            body["select"] = Value::String(self.select.join(","));
        }
        if let Some(field) = self.vector_field {
            body["vectorQueries"] = json!([{
                "kind": "text",
                "text": self.text,
                "fields": field,
                "k": self.top,
            }]);
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<Map<String, Value>>,
}

/// HTTP client for one search service
pub struct SearchClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl SearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the client from config, reading the key from the environment
    pub fn from_config(config: &SearchConfig) -> Result<Self, EngineError> {
        let api_key = secret_from_env(&config.api_key_env)?;
        Ok(Self::new(&config.endpoint, api_key, &config.api_version))
    }

    /// Run `query` against `index`, best hits first
    pub async fn search(
        &self,
        index: &str,
        query: &SearchQuery<'_>,
    ) -> Result<Vec<SearchHit>, SourceError> {
        let url = format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, index, self.api_version
        );
        let body = query.body();

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Upstream(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Upstream(format!(
                "search index {} returned {}: {}",
                index, status, text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let mut hits: Vec<SearchHit> = parsed
            .value
            .into_iter()
            .map(|mut document| {
                let score = document
                    .remove("@search.score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                SearchHit { score, document }
            })
            .collect();

        // The service already sorts; keep it stable if it did not
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }
}
