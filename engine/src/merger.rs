//! Evidence Merger
//!
//! Folds the evidence lists of every adapter that succeeded into one
//! numbered citation list:
//!
//! 1. Interleave by source in the fixed order SQL, SEMANTIC, RAPTOR, keeping
//!    each adapter's own relevance order.
//! 2. Drop repeats of the same (source, id); the first occurrence wins.
//! 3. Over the cap, keep the highest-scored items (ties go to the earlier
//!    item) without reordering the survivors.
//! 4. Number the survivors 1..=N.

use crate::sources::EvidenceItem;
use chrono::{DateTime, Utc};
use sdk::SourceKind;
use serde::Serialize;
use std::collections::HashSet;

/// Default cap on citations per response
pub const DEFAULT_MAX_CITATIONS: usize = 8;

/// A deduplicated, numbered evidence item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// 1-based number referenced by inline `[n]` markers
    pub number: usize,
    pub source: SourceKind,
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub retrieved_at: DateTime<Utc>,
}

impl Citation {
    fn from_item(number: usize, item: EvidenceItem) -> Self {
        Self {
            number,
            source: item.source,
            id: item.id,
            title: item.title,
            excerpt: item.excerpt,
            score: item.score,
            retrieved_at: item.retrieved_at,
        }
    }

    /// One-line rendering, e.g. `[2] SEM: Core Bond Fund`
    pub fn label(&self) -> String {
        format!("[{}] {}: {}", self.number, self.source.label(), self.title)
    }
}

/// Merge evidence lists into at most `max_citations` numbered citations
pub fn merge<I>(evidence_lists: I, max_citations: usize) -> Vec<Citation>
where
    I: IntoIterator<Item = Vec<EvidenceItem>>,
{
    let mut items: Vec<EvidenceItem> = evidence_lists.into_iter().flatten().collect();
    // Stable: within a source the received order is preserved
    items.sort_by_key(|item| item.source);

    let mut seen = HashSet::new();
    items.retain(|item| seen.insert((item.source, item.id.clone())));

    if items.len() > max_citations {
        let mut ranked: Vec<usize> = (0..items.len()).collect();
        ranked.sort_by(|&a, &b| items[b].score.total_cmp(&items[a].score));
        let keep: HashSet<usize> = ranked.into_iter().take(max_citations).collect();

        items = items
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| keep.contains(idx))
            .map(|(_, item)| item)
            .collect();
    }

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| Citation::from_item(idx + 1, item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(source: SourceKind, id: &str, score: f64) -> EvidenceItem {
        EvidenceItem::new(source, id, id.to_uppercase(), format!("excerpt {}", id), score)
    }

    fn keys(citations: &[Citation]) -> Vec<(usize, SourceKind, &str)> {
        citations
            .iter()
            .map(|c| (c.number, c.source, c.id.as_str()))
            .collect()
    }

    #[test]
    fn test_fixed_source_order() {
        let citations = merge(
            vec![
                vec![item(SourceKind::Raptor, "r1", 0.9)],
                vec![item(SourceKind::Semantic, "s1", 0.8)],
                vec![item(SourceKind::Sql, "q1", 0.7), item(SourceKind::Sql, "q2", 0.6)],
            ],
            8,
        );
        assert_eq!(
            keys(&citations),
            vec![
                (1, SourceKind::Sql, "q1"),
                (2, SourceKind::Sql, "q2"),
                (3, SourceKind::Semantic, "s1"),
                (4, SourceKind::Raptor, "r1"),
            ]
        );
    }

    #[test]
    fn test_first_occurrence_wins() {
        let citations = merge(
            vec![
                vec![item(SourceKind::Sql, "a", 0.2), item(SourceKind::Sql, "a", 0.9)],
                vec![item(SourceKind::Semantic, "a", 0.5)],
            ],
            8,
        );
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].score, 0.2);
        assert_eq!(citations[1].source, SourceKind::Semantic);
    }

    #[test]
    fn test_cap_keeps_highest_scores_in_received_order() {
        let citations = merge(
            vec![
                vec![
                    item(SourceKind::Sql, "q1", 0.1),
                    item(SourceKind::Sql, "q2", 0.95),
                ],
                vec![item(SourceKind::Raptor, "r1", 0.9)],
                vec![item(SourceKind::Semantic, "s1", 0.3)],
            ],
            2,
        );
        assert_eq!(
            keys(&citations),
            vec![(1, SourceKind::Sql, "q2"), (2, SourceKind::Raptor, "r1")]
        );
    }

    #[test]
    fn test_cap_ties_prefer_earlier_items() {
        let citations = merge(
            vec![vec![
                item(SourceKind::Sql, "a", 0.5),
                item(SourceKind::Sql, "b", 0.5),
                item(SourceKind::Sql, "c", 0.5),
            ]],
            2,
        );
        assert_eq!(
            keys(&citations),
            vec![(1, SourceKind::Sql, "a"), (2, SourceKind::Sql, "b")]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::<Vec<EvidenceItem>>::new(), 8).is_empty());
        assert_eq!(
            merge(vec![vec![item(SourceKind::Sql, "a", 1.0)]], 8)[0].label(),
            "[1] SQL: A"
        );
    }

    fn arb_item() -> impl Strategy<Value = EvidenceItem> {
        (0usize..3, 0u8..6, 0.0f64..=1.0).prop_map(|(kind, id, score)| {
            item(SourceKind::ALL[kind], &format!("id{}", id), score)
        })
    }

    proptest! {
        #[test]
        fn prop_citations_are_unique_dense_and_capped(
            lists in prop::collection::vec(prop::collection::vec(arb_item(), 0..8), 0..4),
            cap in 1usize..10,
        ) {
            let citations = merge(lists.clone(), cap);

            prop_assert!(citations.len() <= cap);

            let numbers: Vec<usize> = citations.iter().map(|c| c.number).collect();
            let expected: Vec<usize> = (1..=citations.len()).collect();
            prop_assert_eq!(numbers, expected);

            let mut identities = HashSet::new();
            for c in &citations {
                prop_assert!(identities.insert((c.source, c.id.clone())));
            }

            prop_assert!(citations.windows(2).all(|w| w[0].source <= w[1].source));

            // No dropped item outranks a kept one
            let min_kept = citations.iter().map(|c| c.score).fold(f64::INFINITY, f64::min);
            let distinct: HashSet<(SourceKind, String)> = lists
                .iter()
                .flatten()
                .map(|i| (i.source, i.id.clone()))
                .collect();
            if distinct.len() > cap {
                prop_assert_eq!(citations.len(), cap);
                let mut first_seen = HashSet::new();
                let mut sorted: Vec<&EvidenceItem> = lists.iter().flatten().collect();
                sorted.sort_by_key(|i| i.source);
                for i in sorted {
                    if first_seen.insert((i.source, i.id.clone()))
                        && !identities.contains(&(i.source, i.id.clone()))
                    {
                        prop_assert!(i.score <= min_kept);
                    }
                }
            } else {
                prop_assert_eq!(citations.len(), distinct.len());
            }
        }
    }
}
