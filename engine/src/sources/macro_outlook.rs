//! Macro-outlook adapter over the hierarchical (RAPTOR) summary index of IMF
//! World Economic Outlook reports. Each hit is a node of the summary tree:
//! `level` 0 is a raw chunk, higher levels are cluster summaries.

use super::search::SearchHit;
use super::{
    normalize_by_max, truncate_chars, Evidence, EvidenceItem, FetchConstraints, SearchClient,
    SearchQuery, SourceAdapter, SourceError,
};
use async_trait::async_trait;
use sdk::{Question, SourceKind};
use std::sync::Arc;
use std::time::Duration;

const EXCERPT_CHARS: usize = 500;

const RAPTOR_FIELDS: &[&str] = &["id", "doc_id", "level", "kind", "raw"];

pub struct MacroOutlookAdapter {
    client: Arc<SearchClient>,
    index: String,
    vector_field: String,
    top_k: usize,
    timeout: Duration,
}

impl MacroOutlookAdapter {
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
impl SourceAdapter for MacroOutlookAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Raptor
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
            select: RAPTOR_FIELDS,
            vector_field: Some(&self.vector_field),
        };
        let hits = self.client.search(&self.index, &query).await?;

        if !hits.is_empty() && hits.iter().all(|hit| hit.text("raw").is_empty()) {
            return Err(SourceError::Malformed(
                "outlook passages carry no text".to_string(),
            ));
        }
        Ok(Evidence::items(hits_to_evidence(&hits)))
    }
}

/// Shape summary-tree nodes into evidence
pub fn hits_to_evidence(hits: &[SearchHit]) -> Vec<EvidenceItem> {
    let scores: Vec<f64> = hits.iter().map(|h| h.score).collect();
    let normalized = normalize_by_max(&scores);

    hits.iter()
        .zip(normalized)
        .enumerate()
        .map(|(i, (hit, score))| {
            let node = hit.display("id").unwrap_or_else(|| format!("node_{}", i));
            let id = match hit.display("doc_id") {
                Some(doc) => format!("{}#{}", doc, node),
                None => node,
            };
            let kind = hit.display("kind").unwrap_or_else(|| "summary".to_string());
            let level = hit.display("level").unwrap_or_else(|| "0".to_string());

            EvidenceItem::new(
                SourceKind::Raptor,
                id,
                format!("IMF WEO ({}, L{})", kind, level),
                truncate_chars(hit.text("raw"), EXCERPT_CHARS),
                score,
            )
        })
        .collect()
}
