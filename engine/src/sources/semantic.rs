//! Semantic-passage adapter over the fund description index

use super::{
    normalize_by_max, truncate_chars, Evidence, EvidenceItem, FetchConstraints, SearchClient,
    SearchQuery, SourceAdapter, SourceError,
};
use crate::sources::search::SearchHit;
use async_trait::async_trait;
use sdk::{Question, SourceKind};
use std::sync::Arc;
use std::time::Duration;

const EXCERPT_CHARS: usize = 300;

const FUND_FIELDS: &[&str] = &[
    "accession_number",
    "fund_name",
    "manager_name",
    "total_assets",
    "fund_type",
    "content",
    "top_holdings_text",
];

pub struct SemanticAdapter {
    client: Arc<SearchClient>,
    index: String,
    vector_field: String,
    top_k: usize,
    timeout: Duration,
}

impl SemanticAdapter {
    pub fn new(
        client: Arc<SearchClient>,
        index: impl Into<String>,
        vector_field: impl Into<String>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            vector_field: vector_field.into(),
            top_k,
            timeout,
        }
    }
}

#[async_trait]
impl SourceAdapter for SemanticAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Semantic
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(
        &self,
        question: &Question,
        constraints: &FetchConstraints,
    ) -> Result<Evidence, SourceError> {
        let text = constraints.augment(&question.text);
        let top = constraints.top_k.unwrap_or(self.top_k);
        let query = SearchQuery {
            text: &text,
            top,
            select: FUND_FIELDS,
            vector_field: Some(&self.vector_field),
        };
        let hits = self.client.search(&self.index, &query).await?;
        Ok(Evidence::items(hits_to_evidence(&hits)))
    }
}

/// Shape fund search hits into evidence
pub fn hits_to_evidence(hits: &[SearchHit]) -> Vec<EvidenceItem> {
    let scores: Vec<f64> = hits.iter().map(|h| h.score).collect();
    let normalized = normalize_by_max(&scores);

    hits.iter()
        .zip(normalized)
        .enumerate()
        .map(|(i, (hit, score))| {
            let id = hit
                .display("accession_number")
                .unwrap_or_else(|| format!("fund_{}", i));
            let title = hit
                .display("fund_name")
                .unwrap_or_else(|| "Unknown Fund".to_string());
            EvidenceItem::new(
                SourceKind::Semantic,
                id,
                title,
                truncate_chars(hit.text("content"), EXCERPT_CHARS),
                score,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hit(score: f64, document: serde_json::Value) -> SearchHit {
        SearchHit {
            score,
            document: document.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_hits_to_evidence() {
        let hits = vec![
            hit(
                4.0,
                json!({"accession_number": "A1", "fund_name": "Steady Income", "content": "Conservative income fund"}),
            ),
            hit(2.0, json!({"content": "x"})),
        ];
        let items = hits_to_evidence(&hits);
        assert_eq!(items[0].id, "A1");
        assert_eq!(items[0].title, "Steady Income");
        assert_eq!(items[0].score, 1.0);
        assert_eq!(items[1].score, 0.5);
        assert_eq!(items[1].id, "fund_1");
        assert_eq!(items[1].title, "Unknown Fund");
    }

    #[tokio::test]
    async fn test_fetch_runs_vector_query_with_hints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/nport-funds-index/docs/search"))
            .and(body_partial_json(
                json!({
                    "search": "bond funds prefer duration-sensitive",
                    "top": 3,
                    "vectorQueries": [{
                        "kind": "text",
                        "text": "bond funds prefer duration-sensitive",
                        "fields": "content_vector",
                        "k": 3
                    }]
                }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"@search.score": 0.9, "accession_number": "A9", "fund_name": "Long Duration", "content": "Long Treasuries"}]
            })))
            .mount(&server)
            .await;

        let adapter = SemanticAdapter::new(
            Arc::new(SearchClient::new(server.uri(), "k", "2024-07-01")),
            "nport-funds-index",
            "content_vector",
            5,
            Duration::from_secs(5),
        );
        let constraints = FetchConstraints {
            hints: vec!["prefer duration-sensitive".to_string()],
            top_k: Some(3),
        };
        let evidence = adapter
            .fetch(&Question::new("bond funds"), &constraints)
            .await
            .unwrap();

        assert_eq!(evidence.items.len(), 1);
        assert_eq!(evidence.items[0].id, "A9");
        assert!(evidence.generated_query.is_none());
    }
}
