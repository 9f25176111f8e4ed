//! Cross-encoder reranking of merged retrieval candidates.
//!
//! The first-stage retrievers are cheap and recall-oriented; this stage scores
//! every (query, passage) pair jointly and keeps only the best few. Scores are
//! returned alongside the units as [`ScoredUnit`]s; the units themselves are
//! never modified.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RerankConfig;
use crate::models::{best_first, LegalUnit, ScoredUnit};

/// Pairwise relevance scorer.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score each passage against `query`, returning scores in input order.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Score `candidates` against `query` and keep the best `final_k`.
///
/// Passages are sent to the backend `batch_size` at a time. The sort is
/// stable, so equal scores keep candidate order. A NaN score is replaced
/// by negative infinity and ranks last.
pub async fn rerank(
    encoder: &dyn CrossEncoder,
    query: &str,
    candidates: Vec<LegalUnit>,
    batch_size: usize,
    final_k: usize,
) -> Result<Vec<ScoredUnit>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let passages: Vec<String> = candidates.iter().map(|u| u.content.clone()).collect();
    let mut scores = Vec::with_capacity(passages.len());
    for batch in passages.chunks(batch_size.max(1)) {
        let batch_scores = encoder.score(query, batch).await?;
        if batch_scores.len() != batch.len() {
            bail!(
                "cross-encoder returned {} scores for {} passages",
                batch_scores.len(),
                batch.len()
            );
        }
        scores.extend(batch_scores);
    }

    let mut scored: Vec<ScoredUnit> = candidates
        .into_iter()
        .zip(scores)
        .map(|(unit, score)| {
            let rerank_score = if score.is_nan() {
                warn!(citation = unit.citation(), "cross-encoder returned NaN score");
                f32::NEG_INFINITY
            } else {
                score
            };
            ScoredUnit { unit, rerank_score }
        })
        .collect();

    scored.sort_by(|a, b| best_first(a.rerank_score.into(), b.rerank_score.into()));
    scored.truncate(final_k);

    debug!(kept = scored.len(), final_k, "reranked candidates");
    Ok(scored)
}

/// Reranker bound to its configuration.
pub struct Reranker {
    encoder: Box<dyn CrossEncoder>,
    batch_size: usize,
    final_k: usize,
}

impl Reranker {
    pub fn new(encoder: Box<dyn CrossEncoder>, config: &RerankConfig) -> Self {
        Self {
            encoder,
            batch_size: config.batch_size,
            final_k: config.final_k,
        }
    }

    pub async fn rank(&self, query: &str, candidates: Vec<LegalUnit>) -> Result<Vec<ScoredUnit>> {
        rerank(
            self.encoder.as_ref(),
            query,
            candidates,
            self.batch_size,
            self.final_k,
        )
        .await
    }
}

/// Local cross-encoder via fastembed's `TextRerank`.
#[cfg(feature = "local-models")]
pub struct FastembedCrossEncoder {
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextRerank>>,
}

#[cfg(feature = "local-models")]
impl FastembedCrossEncoder {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        let model_id = reranker_model(&config.model)?;
        tracing::info!(model = %config.model, "loading cross-encoder");
        let model = fastembed::TextRerank::try_new(
            fastembed::RerankInitOptions::new(model_id).with_show_download_progress(true),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize reranker model: {}", e))?;
        Ok(Self {
            model: std::sync::Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-models")]
#[async_trait]
impl CrossEncoder for FastembedCrossEncoder {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let query = query.to_string();
        let passages = passages.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("reranker model lock poisoned"))?;
            let documents: Vec<&str> = passages.iter().map(String::as_str).collect();
            let results = model
                .rerank(query.as_str(), documents, false, Some(passages.len()))
                .map_err(|e| anyhow::anyhow!("Reranking failed: {}", e))?;

            // fastembed returns results sorted by score; restore input order.
            let mut scores: Vec<Option<f32>> = vec![None; passages.len()];
            for r in results {
                if let Some(slot) = scores.get_mut(r.index) {
                    *slot = Some(r.score);
                }
            }
            scores
                .into_iter()
                .enumerate()
                .map(|(i, s)| {
                    s.ok_or_else(|| anyhow::anyhow!("reranker returned no score for passage {}", i))
                })
                .collect()
        })
        .await?
    }
}

#[cfg(feature = "local-models")]
fn reranker_model(name: &str) -> Result<fastembed::RerankerModel> {
    match name {
        "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
        other => bail!(
            "Unknown reranker model: '{}'. Supported models: bge-reranker-base, bge-reranker-v2-m3",
            other
        ),
    }
}

/// Create the production cross-encoder for `[rerank]`.
pub fn create_cross_encoder(config: &RerankConfig) -> Result<Box<dyn CrossEncoder>> {
    #[cfg(feature = "local-models")]
    {
        Ok(Box::new(FastembedCrossEncoder::new(config)?))
    }
    #[cfg(not(feature = "local-models"))]
    {
        bail!(
            "reranker model '{}' requires --features local-models",
            config.model
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocType, UnitMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn unit(citation: &str, content: &str) -> LegalUnit {
        LegalUnit {
            content: content.to_string(),
            metadata: UnitMetadata {
                doc_type: DocType::Decree,
                law_name: "168/2024/NĐ-CP".to_string(),
                law_id: "168_2024_ND-CP".to_string(),
                article: "6".to_string(),
                clause: "1".to_string(),
                point: "all".to_string(),
                citation: citation.to_string(),
                is_parent: true,
            },
        }
    }

    /// Scores a passage by the number parsed from its content.
    struct NumericEncoder {
        calls: AtomicUsize,
    }

    impl NumericEncoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CrossEncoder for NumericEncoder {
        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(passages
                .iter()
                .map(|p| p.parse::<f32>().unwrap_or(f32::NAN))
                .collect())
        }
    }

    struct ShortEncoder;

    #[async_trait]
    impl CrossEncoder for ShortEncoder {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[tokio::test]
    async fn empty_input_skips_backend() {
        let encoder = NumericEncoder::new();
        let out = rerank(&encoder, "q", Vec::new(), 8, 5).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(encoder.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keeps_top_k_in_descending_order() {
        let encoder = NumericEncoder::new();
        let candidates: Vec<LegalUnit> = [0.1, 0.9, 0.5, 0.7, 0.2, 0.8, 0.3, 0.6]
            .iter()
            .enumerate()
            .map(|(i, s)| unit(&format!("C{}", i), &s.to_string()))
            .collect();

        let out = rerank(&encoder, "q", candidates, 3, 5).await.unwrap();
        let citations: Vec<&str> = out.iter().map(|s| s.unit.citation()).collect();
        assert_eq!(citations, vec!["C1", "C5", "C3", "C7", "C2"]);
        assert_eq!(out[0].rerank_score, 0.9);
        // 8 passages at batch size 3
        assert_eq!(encoder.calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn ties_keep_candidate_order() {
        let encoder = NumericEncoder::new();
        let candidates = vec![unit("A", "0.5"), unit("B", "0.5"), unit("C", "0.5")];
        let out = rerank(&encoder, "q", candidates, 8, 5).await.unwrap();
        let citations: Vec<&str> = out.iter().map(|s| s.unit.citation()).collect();
        assert_eq!(citations, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn fewer_candidates_than_k() {
        let encoder = NumericEncoder::new();
        let out = rerank(&encoder, "q", vec![unit("A", "0.1"), unit("B", "0.2")], 8, 5)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].unit.citation(), "B");
    }

    #[tokio::test]
    async fn nan_scores_rank_last() {
        // Every third passage is unparsable and scores NaN. More than 32
        // candidates so the sort leaves its small-slice path.
        let encoder = NumericEncoder::new();
        let candidates: Vec<LegalUnit> = (0..40)
            .map(|i| {
                let content = if i % 3 == 0 {
                    "x".to_string()
                } else {
                    ((i * 37) % 100).to_string()
                };
                unit(&format!("C{}", i), &content)
            })
            .collect();

        let out = rerank(&encoder, "q", candidates, 8, 40).await.unwrap();
        assert_eq!(out.len(), 40);
        assert!(out.iter().all(|s| !s.rerank_score.is_nan()));

        let real = out.iter().filter(|s| s.rerank_score.is_finite()).count();
        assert_eq!(real, 26);
        assert!(out[..real]
            .windows(2)
            .all(|w| w[0].rerank_score >= w[1].rerank_score));
        assert!(out[real..]
            .iter()
            .all(|s| s.rerank_score == f32::NEG_INFINITY));
        assert_eq!(out[0].rerank_score, 96.0);
    }

    #[tokio::test]
    async fn wrong_score_count_is_error() {
        let result = rerank(&ShortEncoder, "q", vec![unit("A", "1"), unit("B", "2")], 8, 5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reranker_uses_config() {
        let config = RerankConfig {
            final_k: 1,
            ..RerankConfig::default()
        };
        let reranker = Reranker::new(Box::new(NumericEncoder::new()), &config);
        let out = reranker
            .rank("q", vec![unit("A", "0.1"), unit("B", "0.2")])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unit.citation(), "B");
    }
}
