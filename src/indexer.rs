//! Build pipeline: ingest → export → embed → write both indexes.
//!
//! A build fully replaces the previous indexes. It refuses to touch them
//! when the corpus yields no units.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{embed_batch, Embedder};
use crate::export::export_units;
use crate::ingest::{ingest_corpus, DocumentFailure};
use crate::keyword::KeywordIndex;
use crate::models::LegalUnit;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::vector_store::SqliteVectorStore;

/// What a successful build produced.
#[derive(Debug)]
pub struct BuildSummary {
    pub documents: usize,
    pub units: usize,
    pub failures: Vec<DocumentFailure>,
    pub vector_path: PathBuf,
    pub keyword_path: PathBuf,
}

/// Embed every unit's content, normalized, in configured batches.
pub async fn embed_units(
    embedder: &dyn Embedder,
    units: &[LegalUnit],
    batch_size: usize,
    expected_dims: Option<usize>,
    progress: &dyn BuildProgressReporter,
) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = units.iter().map(|u| u.content.clone()).collect();
    let total = texts.len() as u64;
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embed_batch(embedder, batch).await?;
        vectors.extend(embedded);
        progress.report(BuildProgressEvent::Embedding {
            n: vectors.len() as u64,
            total,
        });
    }

    if let (Some(dims), Some(first)) = (expected_dims, vectors.first()) {
        if first.len() != dims {
            bail!(
                "embedding model {} produced {}-dimensional vectors, expected {}",
                embedder.model_name(),
                first.len(),
                dims
            );
        }
    }

    Ok(vectors)
}

/// Replace the dense and keyword indexes with `units`.
pub async fn write_indexes(
    config: &Config,
    embedder: &dyn Embedder,
    units: &[LegalUnit],
    progress: &dyn BuildProgressReporter,
) -> Result<(PathBuf, PathBuf)> {
    let vectors = embed_units(
        embedder,
        units,
        config.embedding.batch_size,
        config.embedding.dims,
        progress,
    )
    .await
    .context("embedding failed")?;

    progress.report(BuildProgressEvent::Writing {
        index: "vector".to_string(),
        units: units.len() as u64,
    });
    let store = SqliteVectorStore::rebuild(
        &config.index.vector_dir,
        units,
        &vectors,
        embedder.model_name(),
    )
    .await
    .context("failed to write vector index")?;
    let vector_path = store.path().to_path_buf();
    store.close().await;

    progress.report(BuildProgressEvent::Writing {
        index: "keyword".to_string(),
        units: units.len() as u64,
    });
    let keyword_path = config.index.keyword_path.clone();
    KeywordIndex::build(units)
        .save(&keyword_path)
        .context("failed to write keyword index")?;

    info!(
        units = units.len(),
        vector = %vector_path.display(),
        keyword = %keyword_path.display(),
        "indexes rebuilt"
    );
    Ok((vector_path, keyword_path))
}

/// Run the full build against the configured corpus.
pub async fn run_build(
    config: &Config,
    embedder: &dyn Embedder,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildSummary> {
    let report = ingest_corpus(&config.corpus.raw_dir, progress)?;
    for failure in &report.failures {
        warn!(file = %failure.file_name, "skipped: {}", failure.error);
    }
    if report.units.is_empty() {
        bail!(
            "no data: no legal units parsed from {}",
            config.corpus.raw_dir.display()
        );
    }

    progress.report(BuildProgressEvent::Exporting {
        dir: config.corpus.processed_dir.display().to_string(),
    });
    export_units(&report.units, &config.corpus.processed_dir)?;

    let (vector_path, keyword_path) =
        write_indexes(config, embedder, &report.units, progress).await?;

    Ok(BuildSummary {
        documents: report.documents.len(),
        units: report.units.len(),
        failures: report.failures,
        vector_path,
        keyword_path,
    })
}
