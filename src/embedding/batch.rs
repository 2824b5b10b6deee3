//! Bounded-concurrency batch embedding with per-slice failure isolation
//!
//! A failed slice substitutes zero-vector sentinels rather than aborting
//! the batch, so downstream consumers always receive one vector per input
//! and must tolerate the degraded entries.

use super::EmbeddingProvider;
use crate::chunking::Chunk;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Embed `texts` in slices of `batch_size`, capping in-flight slices at
/// `max_concurrent`. Output order matches input order; a slice whose
/// embedding call fails yields zero vectors for its texts.
pub async fn embed_texts_with_fallback(
    provider: Arc<dyn EmbeddingProvider>,
    texts: &[String],
    batch_size: usize,
    max_concurrent: usize,
) -> Vec<Vec<f32>> {
    if texts.is_empty() {
        return Vec::new();
    }

    let batch_size = batch_size.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let dimension = provider.dimension();

    let futures = texts.chunks(batch_size).enumerate().map(|(index, slice)| {
        let provider = provider.clone();
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await.ok();
            match provider.embed_batch(slice) {
                Ok(embeddings) if embeddings.len() == slice.len() => {
                    debug!("embedded slice {} ({} texts)", index, slice.len());
                    embeddings
                }
                Ok(embeddings) => {
                    warn!(
                        "embedding slice {} returned {} vectors for {} texts, substituting zero vectors",
                        index,
                        embeddings.len(),
                        slice.len()
                    );
                    vec![vec![0.0; dimension]; slice.len()]
                }
                Err(e) => {
                    warn!(
                        "embedding slice {} failed ({}), substituting zero vectors",
                        index, e
                    );
                    vec![vec![0.0; dimension]; slice.len()]
                }
            }
        }
    });

    futures::future::join_all(futures)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Populate `embedding` on each chunk in place. Returns the number of
/// chunks that received a real (non-sentinel) embedding.
pub async fn embed_chunks(
    provider: Arc<dyn EmbeddingProvider>,
    chunks: &mut [Chunk],
    batch_size: usize,
    max_concurrent: usize,
) -> usize {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_texts_with_fallback(provider, &texts, batch_size, max_concurrent).await;

    let mut embedded = 0;
    for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
        if embedding.iter().any(|&v| v != 0.0) {
            embedded += 1;
        }
        chunk.embedding = Some(embedding);
    }
    embedded
}
