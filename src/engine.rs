//! Question answering: retrieve, rerank, then answer from the ranked context.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::keyword::KeywordIndex;
use crate::llm::{create_completion_model, CompletionModel};
use crate::models::ScoredUnit;
use crate::prompts::{answer_system, format_context, NO_RESULT_MESSAGE};
use crate::rerank::{create_cross_encoder, Reranker};
use crate::retriever::HybridRetriever;
use crate::vector_store::SqliteVectorStore;

/// An answer with the ranked units it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredUnit>,
}

pub struct Engine {
    retriever: HybridRetriever,
    reranker: Reranker,
    llm: Box<dyn CompletionModel>,
}

impl Engine {
    pub fn new(
        retriever: HybridRetriever,
        reranker: Reranker,
        llm: Box<dyn CompletionModel>,
    ) -> Self {
        Self {
            retriever,
            reranker,
            llm,
        }
    }

    /// Load every collaborator named by `config`. Fails if either index is
    /// missing, the vector index was built with another embedding model, or a
    /// hosted provider lacks credentials.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let keyword = KeywordIndex::load(&config.index.keyword_path)?;
        let dense = SqliteVectorStore::open(&config.index.vector_dir).await?;
        let embedder = create_embedder(&config.embedding)?;
        dense.ensure_model(embedder.model_name()).await?;
        let encoder = create_cross_encoder(&config.rerank)?;
        let llm = create_completion_model(&config.llm)?;

        info!(
            keyword_units = keyword.len(),
            embedder = embedder.model_name(),
            llm = llm.model_name(),
            "engine ready"
        );
        Ok(Self::new(
            HybridRetriever::new(embedder, Box::new(dense), keyword, config.retrieval.clone()),
            Reranker::new(encoder, &config.rerank),
            llm,
        ))
    }

    /// Retrieve and rerank without generating an answer.
    ///
    /// With `rewrite` false the raw query is searched even when rewriting is
    /// enabled in configuration.
    pub async fn search(&self, query: &str, rewrite: bool) -> Result<Vec<ScoredUnit>> {
        let llm = if rewrite {
            Some(self.llm.as_ref())
        } else {
            None
        };
        let candidates = self.retriever.retrieve(llm, query).await?;
        // The reranker always sees the user's own wording.
        self.reranker.rank(query, candidates.into_units()).await
    }

    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let sources = self.search(query, true).await?;
        if sources.is_empty() {
            return Ok(Answer {
                text: NO_RESULT_MESSAGE.to_string(),
                sources,
            });
        }

        let system = answer_system(&format_context(&sources));
        let text = self
            .llm
            .complete(&system, query)
            .await
            .context("answer generation failed")?;

        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }
}
