//! Question and routing vocabulary shared by the engine and its callers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieval strategy selected for a question
///
/// Serialized as the upper-case tag used on the wire (`"SQL"`, `"HYBRID"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Route {
    /// Structured fund records only
    Sql,
    /// Semantic passage search over fund descriptions only
    Semantic,
    /// Hierarchical macro-outlook index only
    Raptor,
    /// Structured, semantic and macro-outlook sources in parallel
    Hybrid,
    /// Macro outlook first, then a secondary fund query shaped by it
    Chain,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Sql,
        Route::Semantic,
        Route::Raptor,
        Route::Hybrid,
        Route::Chain,
    ];

    /// Tie-break priority when several routes match (higher wins)
    pub fn priority(self) -> u8 {
        match self {
            Route::Chain => 5,
            Route::Hybrid => 4,
            Route::Raptor => 3,
            Route::Semantic => 2,
            Route::Sql => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Sql => "SQL",
            Route::Semantic => "SEMANTIC",
            Route::Raptor => "RAPTOR",
            Route::Hybrid => "HYBRID",
            Route::Chain => "CHAIN",
        }
    }

    /// Whether this route surfaces a generated structured-data query
    pub fn exposes_generated_query(self) -> bool {
        matches!(self, Route::Sql | Route::Hybrid)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SQL" => Ok(Route::Sql),
            "SEMANTIC" => Ok(Route::Semantic),
            "RAPTOR" => Ok(Route::Raptor),
            "HYBRID" => Ok(Route::Hybrid),
            "CHAIN" => Ok(Route::Chain),
            other => Err(format!("unknown route: {}", other)),
        }
    }
}

/// Which retrieval source produced a piece of evidence
///
/// The declaration order is the fixed interleave order used when numbering
/// citations: structured first, then semantic, then macro outlook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Sql,
    Semantic,
    Raptor,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Sql, SourceKind::Semantic, SourceKind::Raptor];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Sql => "SQL",
            SourceKind::Semantic => "SEMANTIC",
            SourceKind::Raptor => "RAPTOR",
        }
    }

    /// Short label used when rendering citations inline
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Sql => "SQL",
            SourceKind::Semantic => "SEM",
            SourceKind::Raptor => "IMF",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker of a prior conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Immutable input to one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// Most recent user turn before this question, if any
    pub fn last_user_turn(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.text.as_str())
    }
}
