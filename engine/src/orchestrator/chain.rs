//! CHAIN route: the macro outlook decides how funds are selected.
//!
//! ```text
//! FetchMacro -> DeriveConstraints -> FetchSecondary -> Synthesize -> Done
//!      \-> Failed (outlook unavailable: nothing to chain from)
//! ```
//!
//! Each stage that does external work announces itself with a progress event
//! before starting. Deriving constraints is a pure function of the outlook
//! evidence and never leaves the process.

use super::{Gathered, OrchestrationError, Orchestrator};
use crate::classifier::Signals;
use crate::merger::merge;
use crate::session::{EventSink, Stage, StreamEvent};
use crate::sources::{fetch_with_timeout, EvidenceItem, FetchConstraints, SourceAdapter};
use regex::Regex;
use sdk::{Question, SourceKind};
use std::sync::LazyLock;

/// Portfolio tilt suggested by the outlook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tilt {
    DurationSensitive,
    ShortDuration,
    InflationProtected,
    Defensive,
    GrowthOriented,
    EmergingMarkets,
    Balanced,
}

impl Tilt {
    /// Guidance handed to the query generator and the answer prompt
    pub fn guidance(self) -> &'static str {
        match self {
            Tilt::DurationSensitive => {
                "Prefer duration-sensitive bond funds (longer maturities, higher DV01) that benefit from falling rates"
            }
            Tilt::ShortDuration => {
                "Prefer short-duration or floating-rate funds with low interest rate risk"
            }
            Tilt::InflationProtected => {
                "Favor inflation-protected securities and real-asset exposure"
            }
            Tilt::Defensive => {
                "Favor defensive, high-quality holdings such as government and investment-grade bonds"
            }
            Tilt::GrowthOriented => "Favor growth-oriented equity funds",
            Tilt::EmergingMarkets => "Weigh emerging-market exposure against the regional outlook",
            Tilt::Balanced => "Favor balanced, diversified funds",
        }
    }

    /// Short search terms appended to a semantic query
    pub fn search_terms(self) -> &'static str {
        match self {
            Tilt::DurationSensitive => "long duration bond",
            Tilt::ShortDuration => "short duration floating rate",
            Tilt::InflationProtected => "inflation protected TIPS",
            Tilt::Defensive => "conservative high quality government bond",
            Tilt::GrowthOriented => "growth equity",
            Tilt::EmergingMarkets => "emerging markets",
            Tilt::Balanced => "balanced diversified",
        }
    }
}

static TILT_PATTERNS: LazyLock<Vec<(Tilt, Regex)>> = LazyLock::new(|| {
    [
        (
            Tilt::DurationSensitive,
            r"(?i)\b(rate\s+cuts?|cut(ting)?\s+(interest\s+)?rates|lower\s+(interest\s+)?rates|monetary\s+easing|easing\s+cycle|rates?\s+(will\s+)?(fall|decline))\b",
        ),
        (
            Tilt::ShortDuration,
            r"(?i)\b(rate\s+hikes?|rais(e|ing)\s+(interest\s+)?rates|higher\s+(interest\s+)?rates|monetary\s+tightening|tighter\s+monetary|higher\s+for\s+longer)\b",
        ),
        (
            Tilt::InflationProtected,
            r"(?i)\b(persistent|elevated|high|sticky|rising)\s+(core\s+)?inflation\b|\binflation\s+(remains|stays)\s+(high|elevated|above)",
        ),
        (
            Tilt::Defensive,
            r"(?i)\b(recession|slowdown|downturn|contraction|weak(er|ening)?\s+growth|downside\s+risks?)\b",
        ),
        (
            Tilt::GrowthOriented,
            r"(?i)\b(strong(er)?\s+growth|robust\s+growth|growth\s+(accelerat\w*|pick\w*\s+up|upgrade\w*)|expansion|recovery)\b",
        ),
        (
            Tilt::EmergingMarkets,
            r"(?i)\b(emerging\s+(market|and\s+developing)\s*\w*)\b",
        ),
    ]
    .into_iter()
    .map(|(tilt, pattern)| (tilt, Regex::new(pattern).expect("valid tilt pattern")))
    .collect()
});

/// Constraints derived from the outlook for the secondary fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConstraints {
    /// Sorted and distinct; never empty
    pub tilts: Vec<Tilt>,
}

impl ChainConstraints {
    pub fn guidance(&self) -> Vec<String> {
        self.tilts.iter().map(|t| t.guidance().to_string()).collect()
    }

    /// Adapter-native hints: guidance for structured queries, search terms otherwise
    pub fn fetch_constraints(&self, kind: SourceKind) -> FetchConstraints {
        let hints = match kind {
            SourceKind::Sql => self.guidance(),
            SourceKind::Semantic | SourceKind::Raptor => self
                .tilts
                .iter()
                .map(|t| t.search_terms().to_string())
                .collect(),
        };
        FetchConstraints::with_hints(hints)
    }
}

/// Pure mapping from outlook passages to fund-selection tilts
pub fn derive_constraints(outlook: &[EvidenceItem]) -> ChainConstraints {
    let mut tilts: Vec<Tilt> = TILT_PATTERNS
        .iter()
        .filter(|(_, re)| outlook.iter().any(|item| re.is_match(&item.excerpt)))
        .map(|(tilt, _)| *tilt)
        .collect();

    if tilts.is_empty() {
        tilts.push(Tilt::Balanced);
    }
    tilts.sort();
    tilts.dedup();
    ChainConstraints { tilts }
}

enum ChainState {
    FetchMacro,
    DeriveConstraints {
        outlook: Vec<EvidenceItem>,
    },
    FetchSecondary {
        outlook: Vec<EvidenceItem>,
        constraints: ChainConstraints,
    },
    Synthesize(Gathered),
    Failed(OrchestrationError),
}

/// Drive the chain up to the point where citations are final
pub(super) async fn run_chain(
    orchestrator: &Orchestrator,
    question: &Question,
    sink: &mut EventSink,
) -> Result<Gathered, OrchestrationError> {
    let mut state = ChainState::FetchMacro;

    loop {
        state = match state {
            ChainState::FetchMacro => {
                announce(sink, Stage::FetchMacro).await?;
                let outcome = fetch_with_timeout(
                    orchestrator.adapters.macro_outlook.as_ref(),
                    question,
                    &FetchConstraints::default(),
                )
                .await;
                match outcome.result {
                    Ok(evidence) => ChainState::DeriveConstraints {
                        outlook: evidence.items,
                    },
                    Err(reason) => ChainState::Failed(OrchestrationError::TotalSourceFailure {
                        kind: SourceKind::Raptor,
                        reason,
                    }),
                }
            }

            ChainState::DeriveConstraints { outlook } => {
                let constraints = derive_constraints(&outlook);
                tracing::debug!(tilts = ?constraints.tilts, "Derived fund constraints");
                ChainState::FetchSecondary {
                    outlook,
                    constraints,
                }
            }

            ChainState::FetchSecondary {
                outlook,
                constraints,
            } => {
                announce(sink, Stage::FetchSecondary).await?;
                let secondary = secondary_adapter(orchestrator, question);
                let fetch = constraints.fetch_constraints(secondary.kind());
                let outcome = fetch_with_timeout(secondary, question, &fetch).await;
                if let Err(e) = &outcome.result {
                    tracing::warn!("Secondary fetch failed, answering from the outlook alone: {}", e);
                }

                let secondary_items = outcome.items().to_vec();
                ChainState::Synthesize(Gathered {
                    citations: merge(
                        [outlook, secondary_items],
                        orchestrator.settings.max_citations,
                    ),
                    generated_query: outcome.generated_query().map(str::to_string),
                    constraints: constraints.guidance(),
                })
            }

            ChainState::Synthesize(gathered) => {
                announce(sink, Stage::Synthesize).await?;
                return Ok(gathered);
            }

            ChainState::Failed(error) => return Err(error),
        };
    }
}

/// Structured records when the question asks for precise data, semantic search otherwise
fn secondary_adapter<'a>(orchestrator: &'a Orchestrator, question: &Question) -> &'a dyn SourceAdapter {
    if Signals::detect(&question.text).lookup {
        orchestrator.adapters.structured.as_ref()
    } else {
        orchestrator.adapters.semantic.as_ref()
    }
}

async fn announce(sink: &mut EventSink, stage: Stage) -> Result<(), OrchestrationError> {
    tracing::debug!(stage = stage.as_str(), "Chain stage");
    sink.emit(StreamEvent::progress(stage))
        .await
        .map_err(OrchestrationError::Session)
}
