//! Core data models used throughout the pipeline.
//!
//! A [`LegalUnit`] is the atomic indexed and retrievable passage produced by
//! the structural parser. Units are immutable once built; the reranker pairs
//! them with a query-scoped score in a [`ScoredUnit`] instead of writing the
//! score into the unit itself.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sentinel clause id for lead-in text that precedes the first numbered clause.
pub const INTRO_CLAUSE: &str = "intro";

/// Sentinel point id for clause-level (parent) units.
pub const ALL_POINTS: &str = "all";

/// Kind of legal document, inferred from the source filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// Luật is a statute passed by the National Assembly.
    Statute,
    /// Nghị định is a government decree.
    Decree,
    /// Thông tư is a ministerial circular.
    Circular,
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Statute => "statute",
            DocType::Decree => "decree",
            DocType::Circular => "circular",
            DocType::Other => "other",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Citation metadata attached to every [`LegalUnit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetadata {
    pub doc_type: DocType,
    /// Human-readable citation root, e.g. `"168/2024/NĐ-CP"`.
    pub law_name: String,
    /// Source filename without extension.
    pub law_id: String,
    pub article: String,
    /// Clause number, or [`INTRO_CLAUSE`].
    pub clause: String,
    /// Point letter, or [`ALL_POINTS`] for a parent unit.
    pub point: String,
    /// Rendered citation; also the deduplication key at query time.
    pub citation: String,
    pub is_parent: bool,
}

/// A citation-addressable passage of a legal document.
///
/// `content` always starts with the document name and article title so the
/// unit can be embedded, matched and reranked without its neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalUnit {
    pub content: String,
    pub metadata: UnitMetadata,
}

impl LegalUnit {
    pub fn citation(&self) -> &str {
        &self.metadata.citation
    }
}

/// A unit paired with its cross-encoder relevance score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredUnit {
    #[serde(flatten)]
    pub unit: LegalUnit,
    pub rerank_score: f32,
}

/// Compare two relevance scores for a best-first sort.
///
/// NaN ranks below every real score and `-0.0` ties with `0.0`, which makes
/// this a total order for `sort_by`.
pub fn best_first(a: f64, b: f64) -> Ordering {
    fn key(score: f64) -> f64 {
        if score.is_nan() {
            f64::NEG_INFINITY
        } else {
            score + 0.0
        }
    }
    key(b).total_cmp(&key(a))
}
