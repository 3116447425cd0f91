//! The complexity classifier.
//!
//! A pure function of the query string. Signals are combined additively
//! into a score, then bucketed:
//!
//! | signal | weight |
//! |---|---|
//! | length > 200 chars | +2 (or +1 if > 80) |
//! | word count > 40 | +2 (or +1 if > 15) |
//! | fenced code block | +2 (bare backtick +1) |
//! | interrogative word | +1 each, capped at 3 |
//! | code-generation verb | +2 each, capped at 4 |
//! | multi-part conjunction | +1 each, capped at 3 |
//!
//! Buckets: 0 → trivial, 1–2 → lookup, 3–4 → moderate, 5–7 → complex,
//! ≥8 → reasoning. The empty query is always trivial.

use serde::{Deserialize, Serialize};

use rigrun_core::Tier;

/// Interrogative words counted once per occurrence at word starts.
const INTERROGATIVES: &[&str] = &["who", "what", "when", "where", "why", "how", "which"];

/// Verbs signalling a code-generation request.
const CODEGEN_VERBS: &[&str] = &["implement", "write", "refactor", "design", "build", "create"];

/// Conjunctions signalling a multi-part request.
const CONJUNCTIONS: &[&str] = &[" and ", " then ", " also ", "; "];

/// Complexity label determining a query's minimum tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Greetings and one-word queries. Served from cache.
    Trivial,
    /// Single-fact questions.
    Lookup,
    /// Ordinary requests a local model handles well.
    Moderate,
    /// Multi-part or code-heavy requests.
    Complex,
    /// Long, open-ended analytical work.
    Reasoning,
}

impl Complexity {
    /// The minimum tier able to serve this complexity.
    #[must_use]
    pub const fn min_tier(self) -> Tier {
        match self {
            Self::Trivial => Tier::Cache,
            Self::Lookup | Self::Moderate => Tier::Local,
            Self::Complex | Self::Reasoning => Tier::Cloud,
        }
    }

    /// Lowercase label for reason strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Lookup => "lookup",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse query category, reported alongside complexity.
///
/// Informational only; it never changes the chosen tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Fact retrieval.
    Lookup,
    /// "Explain …" requests.
    Explanation,
    /// New code requested.
    CodeGeneration,
    /// Changes to existing code.
    Refactoring,
    /// System design questions.
    Architecture,
    /// Error hunting.
    Debugging,
    /// Code review requests.
    Review,
    /// Multi-step planning.
    Planning,
    /// Anything else.
    General,
}

/// Classify a query's complexity. Pure and deterministic.
#[must_use]
pub fn classify(query: &str) -> Complexity {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Complexity::Trivial;
    }

    let lowered = trimmed.to_ascii_lowercase();
    let mut score: u32 = 0;

    // Length
    if trimmed.len() > 200 {
        score = score.saturating_add(2);
    } else if trimmed.len() > 80 {
        score = score.saturating_add(1);
    }

    // Word count
    let words = trimmed.split_whitespace().count();
    if words > 40 {
        score = score.saturating_add(2);
    } else if words > 15 {
        score = score.saturating_add(1);
    }

    // Code markers
    if trimmed.contains("```") {
        score = score.saturating_add(2);
    } else if trimmed.contains('`') {
        score = score.saturating_add(1);
    }

    // Interrogatives, capped at 3
    let interrogatives = lowered
        .split_whitespace()
        .filter(|w| {
            INTERROGATIVES
                .iter()
                .any(|i| w.trim_end_matches(['?', ',', '.']) == *i)
        })
        .count()
        .min(3) as u32;
    score = score.saturating_add(interrogatives);

    // Code-generation verbs, two points each, capped at 4
    let verbs = lowered
        .split_whitespace()
        .filter(|w| CODEGEN_VERBS.contains(&w.trim_end_matches([',', '.', ':'])))
        .count() as u32;
    score = score.saturating_add(verbs.saturating_mul(2).min(4));

    // Multi-part conjunctions, capped at 3
    let conjunctions = CONJUNCTIONS
        .iter()
        .map(|c| lowered.matches(c).count())
        .sum::<usize>()
        .min(3) as u32;
    score = score.saturating_add(conjunctions);

    match score {
        0 => Complexity::Trivial,
        1..=2 => Complexity::Lookup,
        3..=4 => Complexity::Moderate,
        5..=7 => Complexity::Complex,
        _ => Complexity::Reasoning,
    }
}

/// Categorize a query. Pure and deterministic; informational only.
#[must_use]
pub fn classify_query_type(query: &str) -> QueryType {
    let lowered = query.trim().to_ascii_lowercase();

    if lowered.contains("refactor") || lowered.contains("rewrite") {
        QueryType::Refactoring
    } else if lowered.contains("debug")
        || lowered.contains("fix")
        || lowered.contains("error")
        || lowered.contains("panic")
    {
        QueryType::Debugging
    } else if lowered.contains("review") {
        QueryType::Review
    } else if lowered.contains("architect")
        || lowered.contains("design a")
        || lowered.contains("microservice")
    {
        QueryType::Architecture
    } else if lowered.contains("plan") || lowered.contains("steps to") {
        QueryType::Planning
    } else if lowered.contains("implement") || lowered.contains("write a") || lowered.contains("```")
    {
        QueryType::CodeGeneration
    } else if lowered.starts_with("explain") || lowered.contains("how does") {
        QueryType::Explanation
    } else if lowered.starts_with("what")
        || lowered.starts_with("who")
        || lowered.starts_with("when")
        || lowered.starts_with("where")
    {
        QueryType::Lookup
    } else {
        QueryType::General
    }
}
