//! Hybrid retrieval: query rewrite, concurrent dense and keyword lookups,
//! citation-keyed merge.
//!
//! # Merge rule
//!
//! Dense results are inserted first, keyword results second. A duplicate key
//! overwrites the stored unit but keeps the position where the key was first
//! seen, so the output order is deterministic for a given pair of result
//! lists regardless of which lookup finished first.

use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, Embedder};
use crate::keyword::KeywordIndex;
use crate::llm::CompletionModel;
use crate::models::LegalUnit;
use crate::prompts::{rewrite_user_message, QUERY_REWRITE_SYSTEM};
use crate::vector_store::DenseIndex;

/// Characters of content used as the key when a unit has no citation.
pub const FALLBACK_KEY_CHARS: usize = 50;

/// Key-deduplicated, insertion-ordered collection of candidate units.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    positions: HashMap<String, usize>,
    units: Vec<LegalUnit>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduplication key: the citation, or the first 50 characters of the
    /// content when the citation is empty.
    pub fn key_of(unit: &LegalUnit) -> String {
        if unit.citation().is_empty() {
            unit.content.chars().take(FALLBACK_KEY_CHARS).collect()
        } else {
            unit.citation().to_string()
        }
    }

    /// Insert `unit`, replacing any unit with the same key in place.
    pub fn insert(&mut self, unit: LegalUnit) {
        let key = Self::key_of(&unit);
        match self.positions.get(&key) {
            Some(&i) => self.units[i] = unit,
            None => {
                self.positions.insert(key, self.units.len());
                self.units.push(unit);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = LegalUnit>>(&mut self, units: I) {
        for unit in units {
            self.insert(unit);
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[LegalUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<LegalUnit> {
        self.units
    }
}

/// Merge dense then keyword results into a [`CandidateSet`].
pub fn merge(dense: Vec<LegalUnit>, keyword: Vec<LegalUnit>) -> CandidateSet {
    let mut set = CandidateSet::new();
    set.extend(dense);
    set.extend(keyword);
    set
}

/// Retrieval front half of the pipeline.
pub struct HybridRetriever {
    embedder: Box<dyn Embedder>,
    dense: Box<dyn DenseIndex>,
    keyword: KeywordIndex,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        embedder: Box<dyn Embedder>,
        dense: Box<dyn DenseIndex>,
        keyword: KeywordIndex,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            dense,
            keyword,
            config,
        }
    }

    pub fn rewrite_enabled(&self) -> bool {
        self.config.rewrite_query
    }

    /// Ask the completion model for a statutory paraphrase of `query`.
    ///
    /// Never fails: any error or an empty reply falls back to `query`.
    pub async fn rewrite_query(&self, llm: &dyn CompletionModel, query: &str) -> String {
        match llm
            .complete(QUERY_REWRITE_SYSTEM, &rewrite_user_message(query))
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                let rewritten = text.trim().to_string();
                info!(original = query, rewritten = %rewritten, "rewrote query");
                rewritten
            }
            Ok(_) => {
                warn!("query rewrite returned empty text; using original query");
                query.to_string()
            }
            Err(e) => {
                warn!(error = %e, "query rewrite failed; using original query");
                query.to_string()
            }
        }
    }

    /// Run both lookups for an already-final search query and merge them.
    pub async fn search(&self, search_query: &str) -> Result<CandidateSet> {
        let dense = async {
            if self.config.candidate_k_vector == 0 {
                return Ok::<_, anyhow::Error>(Vec::new());
            }
            let query_vec = embed_query(self.embedder.as_ref(), search_query).await?;
            self.dense
                .search(&query_vec, self.config.candidate_k_vector)
                .await
        };
        let keyword = async {
            self.keyword
                .search(search_query, self.config.candidate_k_keyword)
        };

        let (dense, keyword) = tokio::join!(dense, keyword);
        let dense = dense?;

        debug!(
            dense = dense.len(),
            keyword = keyword.len(),
            "first-stage results"
        );
        let set = merge(
            dense.into_iter().map(|(u, _)| u).collect(),
            keyword.into_iter().map(|(u, _)| u).collect(),
        );
        info!(candidates = set.len(), "merged candidates");
        Ok(set)
    }

    /// Rewrite (when enabled and a model is given) then search.
    pub async fn retrieve(
        &self,
        llm: Option<&dyn CompletionModel>,
        query: &str,
    ) -> Result<CandidateSet> {
        let search_query = match llm {
            Some(llm) if self.config.rewrite_query => self.rewrite_query(llm, query).await,
            _ => query.to_string(),
        };
        self.search(&search_query).await
    }
}
