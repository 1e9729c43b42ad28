//! Keyword and phrase signals used by the heuristic router.
//!
//! Each family is one case-insensitive, word-bounded regex compiled once.

use regex::Regex;
use sdk::Route;
use std::sync::LazyLock;

/// Precise lookups, rankings, comparisons and named numeric fields
static LOOKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(top(\s+\d+)?|largest|smallest|biggest|highest|lowest|compare|comparison|versus|vs|list|show\s+me|which\s+funds?\s+(hold|holds|own|owns)|holdings?\s+of|cusip|isin|ticker|how\s+many|total\s+(net\s+)?assets|net\s+assets|sum|average|count|greater\s+than|less\s+than|more\s+than|dv01|dv100|interest\s+rate\s+risk|maturity|expense\s+ratio|rank(ed|ing)?)\b",
    )
    .expect("valid lookup pattern")
});

/// Style, similarity and descriptive adjectives
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(similar\s+to|like|resembles?|resembling|style|conservative|aggressive|growth[\s-]oriented|income[\s-]focused|tell\s+me\s+about|describe|what\s+kind\s+of|esg|sustainable)\b",
    )
    .expect("valid style pattern")
});

/// Macroeconomic vocabulary
static MACRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(imf|weo|world\s+economic|economic|economy|inflation|gdp|growth\s+forecast|interest\s+rate\s+forecast|rate\s+environment|rate\s+(cuts?|hikes?)|monetary\s+policy|fed|federal\s+reserve|central\s+banks?|recession|macro(economic)?|emerging\s+markets?\s+outlook)\b",
    )
    .expect("valid macro pattern")
});

/// Fund and portfolio vocabulary
static FUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(funds?|etfs?|portfolios?|invest(ing|ment|ments)?|bonds?|equit(y|ies)|stocks?|allocat(e|ion)|position(ing)?|recommend(ations?)?|holdings?)\b",
    )
    .expect("valid fund pattern")
});

/// Conditional or "what should I do" phrasing
static CONDITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(how\s+should\s+(i|we)|what\s+should\s+(i|we)\s+(buy|invest|hold)|where\s+(should\s+(i|we)|to)\s+invest|position\s+(my|our|a|the)?\s*portfolio|if\s+(inflation|rates?|interest\s+rates|the\s+economy|growth|gdp|the\s+fed|a\s+recession)|depending\s+on|in\s+(case|the\s+event)\s+of)\b",
    )
    .expect("valid conditional pattern")
});

/// Which signal families fired for a piece of text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub lookup: bool,
    pub style: bool,
    pub macro_vocab: bool,
    pub fund_vocab: bool,
    pub conditional: bool,
}

impl Signals {
    pub fn detect(text: &str) -> Self {
        Self {
            lookup: LOOKUP_RE.is_match(text),
            style: STYLE_RE.is_match(text),
            macro_vocab: MACRO_RE.is_match(text),
            fund_vocab: FUND_RE.is_match(text),
            conditional: CONDITIONAL_RE.is_match(text),
        }
    }

    /// Every route these signals support, unordered
    pub fn candidate_routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();
        if self.lookup {
            routes.push(Route::Sql);
        }
        if self.style {
            routes.push(Route::Semantic);
        }
        if self.macro_vocab {
            routes.push(Route::Raptor);
        }
        if self.macro_vocab && self.fund_vocab {
            routes.push(Route::Hybrid);
        }
        // Chaining needs an outlook to chain from.
        if self.conditional && self.macro_vocab {
            routes.push(Route::Chain);
        }
        routes
    }

    /// Highest-priority candidate, if any signal fired
    pub fn best_route(&self) -> Option<Route> {
        self.candidate_routes()
            .into_iter()
            .max_by_key(|route| route.priority())
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.lookup {
            parts.push("lookup");
        }
        if self.style {
            parts.push("style");
        }
        if self.macro_vocab {
            parts.push("macro");
        }
        if self.fund_vocab {
            parts.push("fund");
        }
        if self.conditional {
            parts.push("conditional");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("+")
        }
    }
}
