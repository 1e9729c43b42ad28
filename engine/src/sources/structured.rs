//! Structured-data adapter: question → generated SQL → fund rows

use super::fund_store::{FundStore, JsonRow};
use super::{
    truncate_chars, Evidence, EvidenceItem, FetchConstraints, QueryGenerator, SourceAdapter,
    SourceError,
};
use async_trait::async_trait;
use sdk::{Question, SourceKind};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const EXCERPT_CHARS: usize = 300;

pub struct StructuredAdapter {
    generator: QueryGenerator,
    store: FundStore,
    max_rows: usize,
    timeout: Duration,
}

impl StructuredAdapter {
    pub fn new(
        generator: QueryGenerator,
        store: FundStore,
        max_rows: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            max_rows,
            timeout,
        }
    }
}

#[async_trait]
impl SourceAdapter for StructuredAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Sql
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(
        &self,
        question: &Question,
        constraints: &FetchConstraints,
    ) -> Result<Evidence, SourceError> {
        let sql = self
            .generator
            .generate(&question.text, &constraints.hints)
            .await?;
        tracing::debug!(sql = %sql, "Executing generated query");

        let limit = constraints.top_k.unwrap_or(self.max_rows);
        let rows = self.store.query(&sql, limit).await?;

        Ok(Evidence {
            items: rows_to_evidence(&rows),
            generated_query: Some(sql),
        })
    }
}

/// Shape rows into evidence; rank order decays the score from 1.0 towards 0.5.
///
/// Ids identify the fact, not the fund: holding rows are keyed by
/// `accession_number#holding_id`, and a fund that repeats within the batch
/// without a holding id gets `accession_number#row_{i}`.
pub fn rows_to_evidence(rows: &[JsonRow]) -> Vec<EvidenceItem> {
    let n = rows.len();
    let mut per_fund: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        if let Some(accession) = text_field(row, "accession_number") {
            *per_fund.entry(accession).or_default() += 1;
        }
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let id = match text_field(row, "accession_number") {
                Some(accession) => match field_text(row, "holding_id") {
                    Some(holding) => format!("{}#{}", accession, holding),
                    None if per_fund.get(accession).copied().unwrap_or(0) > 1 => {
                        format!("{}#row_{}", accession, i)
                    }
                    None => accession.to_string(),
                },
                None => format!("row_{}", i),
            };
            let title = ["series_name", "fund_name", "issuer_name"]
                .iter()
                .find_map(|key| text_field(row, key))
                .map(str::to_string)
                .unwrap_or_else(|| format!("Result {}", i + 1));
            let excerpt = serde_json::to_string(row).unwrap_or_default();
            let score = 1.0 - i as f64 / (2.0 * n as f64);

            EvidenceItem::new(
                SourceKind::Sql,
                id,
                title,
                truncate_chars(&excerpt, EXCERPT_CHARS),
                score,
            )
        })
        .collect()
}

fn text_field<'a>(row: &'a JsonRow, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Scalar column rendered as text; SQLite hands back ids as text or integers
fn field_text(row: &JsonRow, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LLMConfig;
    use crate::llm::router::LLMRouter;
    use crate::llm::{LLMProvider, Message};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    fn row(value: serde_json::Value) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rows_to_evidence_shaping() {
        let rows = vec![
            row(json!({"accession_number": "A1", "series_name": "Core Bond", "net_assets": 10})),
            row(json!({"fund_name": "Income Plus"})),
            row(json!({"total": 3})),
        ];
        let items = rows_to_evidence(&rows);

        assert_eq!(items[0].id, "A1");
        assert_eq!(items[0].title, "Core Bond");
        assert_eq!(items[0].score, 1.0);
        assert_eq!(items[1].id, "row_1");
        assert_eq!(items[1].title, "Income Plus");
        assert_eq!(items[2].title, "Result 3");
        assert!(items[2].excerpt.contains("\"total\":3"));
        assert!(items.iter().all(|i| i.source == SourceKind::Sql));
        assert!(items.windows(2).all(|w| w[0].score > w[1].score));
        assert!(items.iter().all(|i| i.score > 0.5));
    }

    #[test]
    fn test_holding_rows_of_one_fund_stay_distinct() {
        let rows = vec![
            row(json!({"accession_number": "0001-24-7", "series_name": "Core Bond", "holding_id": 0, "issuer_name": "US Treasury 2030"})),
            row(json!({"accession_number": "0001-24-7", "series_name": "Core Bond", "holding_id": 1, "issuer_name": "US Treasury 2034"})),
            row(json!({"accession_number": "0001-24-7", "series_name": "Core Bond", "holding_id": "2", "issuer_name": "Fannie Mae 2051"})),
        ];
        let items = rows_to_evidence(&rows);
        assert_eq!(
            items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["0001-24-7#0", "0001-24-7#1", "0001-24-7#2"]
        );

        let citations = crate::merger::merge(vec![items], 8);
        assert_eq!(citations.len(), 3);
        assert!(citations[2].excerpt.contains("Fannie Mae 2051"));
    }

    #[test]
    fn test_repeated_fund_without_holding_id_keyed_by_row() {
        let rows = vec![
            row(json!({"accession_number": "A1", "maturity_date": "2030-01-01"})),
            row(json!({"accession_number": "A1", "maturity_date": "2031-06-30"})),
            row(json!({"accession_number": "A2", "maturity_date": "2029-03-15"})),
        ];
        let ids: Vec<String> = rows_to_evidence(&rows).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["A1#row_0", "A1#row_1", "A2"]);
    }

    struct FixedSql;

    #[async_trait]
    impl LLMProvider for FixedSql {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_local(&self) -> bool {
            true
        }

        async fn generate(&self, _messages: &[Message]) -> crate::llm::Result<String> {
            Ok("```sql\nSELECT accession_number, series_name FROM fund_reported_info ORDER BY series_name\n```".to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_end_to_end() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in [
            "CREATE TABLE fund_reported_info (accession_number TEXT, series_name TEXT)",
            "INSERT INTO fund_reported_info VALUES ('A2', 'Beta Fund'), ('A1', 'Alpha Fund')",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }

        let router = LLMRouter::new(vec![Box::new(FixedSql)], Arc::new(LLMConfig::default()));
        let adapter = StructuredAdapter::new(
            QueryGenerator::new(Arc::new(router)),
            FundStore::from_pool(pool),
            10,
            Duration::from_secs(5),
        );

        let evidence = adapter
            .fetch(&Question::new("List funds"), &FetchConstraints::default())
            .await
            .unwrap();
        assert_eq!(evidence.items.len(), 2);
        assert_eq!(evidence.items[0].title, "Alpha Fund");
        assert!(evidence
            .generated_query
            .as_deref()
            .unwrap()
            .starts_with("SELECT accession_number"));
    }
}
