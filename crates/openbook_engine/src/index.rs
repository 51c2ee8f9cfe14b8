use std::time::Duration;

use futures::StreamExt;
use openbook_domain::{Chunk, EmbeddedChunk, IndexBuildError, RetrievalResult, ScoredChunk};
use tracing::info;

use crate::embedder::EmbeddingProvider;

/// Narrow read interface over an index so a rebuild-and-swap can replace
/// the implementation without touching callers.
pub trait Retriever: Send + Sync {
    /// Return the `k` chunks most similar to `query`, descending score,
    /// ties broken by original chunk order. Fewer than `k` indexed
    /// chunks returns all of them.
    fn search(&self, query: &[f32], k: usize) -> RetrievalResult;
}

/// Tuning for the one-time index build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight at once
    pub max_concurrent: usize,
    /// Upper bound on each embedding request
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_concurrent: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// In-memory vector index over embedded chunks.
///
/// Built exactly once per process lifetime and read-only afterwards, so
/// concurrent searches need no locking. Search is brute-force cosine
/// similarity, linear in index size times dimension, which is fine at
/// the corpus scale this serves.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
    dimension: usize,
}

impl VectorIndex {
    /// Embed every chunk and store the results. Any provider failure,
    /// timeout, or malformed vector aborts the whole build: a partial
    /// index must never be served.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> Result<Self, IndexBuildError> {
        if chunks.is_empty() {
            return Ok(Self { entries: Vec::new(), dimension: 0 });
        }

        let batches: Vec<Vec<String>> = chunks
            .chunks(options.batch_size.max(1))
            .map(|batch| batch.iter().map(|c| c.text.clone()).collect())
            .collect();

        // Batches run with bounded concurrency; `buffered` keeps the
        // output in input order so the index order stays deterministic.
        let results: Vec<Result<Vec<Vec<f32>>, IndexBuildError>> =
            futures::stream::iter(batches.into_iter().map(|batch| async move {
                tokio::time::timeout(options.timeout, provider.embed_batch(batch))
                    .await
                    .map_err(|_| IndexBuildError::Timeout(options.timeout))?
                    .map_err(|e| IndexBuildError::Provider(e.to_string()))
            }))
            .buffered(options.max_concurrent.max(1))
            .collect()
            .await;

        let mut embeddings = Vec::with_capacity(chunks.len());
        for result in results {
            embeddings.extend(result?);
        }

        if embeddings.len() != chunks.len() {
            return Err(IndexBuildError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            return Err(IndexBuildError::Provider(
                "provider returned a zero-dimension vector".to_string(),
            ));
        }
        for (index, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(IndexBuildError::DimensionMismatch {
                    index,
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding))
            .collect::<Vec<_>>();

        info!(entries = entries.len(), dimension, model = provider.model(), "vector index built");

        Ok(Self { entries, dimension })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Retriever for VectorIndex {
    fn search(&self, query: &[f32], k: usize) -> RetrievalResult {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Entries were inserted in (source, offset) order, so the index
        // tiebreak reproduces the original chunk order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk { chunk: self.entries[i].chunk.clone(), score })
            .collect()
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Maps each known text to a fixed vector; errors on unknown text.
    struct StaticEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl StaticEmbedder {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            let vectors = pairs
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect();
            Self { vectors }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StaticEmbedder {
        fn model(&self) -> &str {
            "static-test"
        }

        async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.vectors
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no vector for {t:?}"))
                })
                .collect()
        }
    }

    struct UnreachableEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnreachableEmbedder {
        fn model(&self) -> &str {
            "unreachable"
        }

        async fn embed_batch(&self, _texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    fn chunk(text: &str, source: &str, offset: usize) -> Chunk {
        Chunk::new(text, source, offset)
    }

    async fn index_of(pairs: &[(&str, Vec<f32>)]) -> VectorIndex {
        let chunks: Vec<Chunk> = pairs
            .iter()
            .enumerate()
            .map(|(i, (text, _))| chunk(text, "manual.txt", i * 100))
            .collect();
        VectorIndex::build(chunks, &StaticEmbedder::new(pairs), &BuildOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn identical_vector_retrieves_its_chunk_at_rank_one() {
        let fixture = index_of(&[
            ("reset", vec![1.0, 0.0]),
            ("wifi", vec![0.0, 1.0]),
            ("both", vec![0.7, 0.7]),
        ])
        .await;

        let results = fixture.search(&[1.0, 0.0], 3);

        let actual = results[0].chunk.text.as_str();
        let expected = "reset";
        assert_eq!(actual, expected);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn results_are_sorted_by_descending_similarity() {
        let fixture = index_of(&[
            ("far", vec![0.0, 1.0]),
            ("near", vec![0.9, 0.1]),
            ("exact", vec![1.0, 0.0]),
        ])
        .await;

        let results = fixture.search(&[1.0, 0.0], 3);

        let actual: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        let expected = vec!["exact", "near", "far"];
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn ties_break_by_original_chunk_order() {
        let fixture = index_of(&[
            ("second-source-but-first-chunk", vec![1.0, 0.0]),
            ("same-vector-later-chunk", vec![1.0, 0.0]),
        ])
        .await;

        let first = fixture.search(&[1.0, 0.0], 2);
        let second = fixture.search(&[1.0, 0.0], 2);

        let actual: Vec<usize> = first.iter().map(|r| r.chunk.offset).collect();
        let expected = vec![0, 100];
        assert_eq!(actual, expected);

        // Same ordered result on every call.
        let again: Vec<usize> = second.iter().map(|r| r.chunk.offset).collect();
        assert_eq!(actual, again);
    }

    #[tokio::test]
    async fn k_beyond_index_size_returns_everything_sorted() {
        let fixture = index_of(&[("a", vec![1.0, 0.0]), ("b", vec![0.5, 0.5])]).await;

        let actual = fixture.search(&[1.0, 0.0], 50).len();
        let expected = 2;
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn unreachable_provider_aborts_the_build() {
        let chunks = vec![chunk("reset", "manual.txt", 0)];

        let actual =
            VectorIndex::build(chunks, &UnreachableEmbedder, &BuildOptions::default()).await;

        assert!(matches!(actual, Err(IndexBuildError::Provider(_))));
    }

    #[tokio::test]
    async fn mismatched_dimensions_abort_the_build() {
        let pairs = [("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0, 0.0])];
        let chunks = vec![chunk("a", "m.txt", 0), chunk("b", "m.txt", 100)];

        let actual =
            VectorIndex::build(chunks, &StaticEmbedder::new(&pairs), &BuildOptions::default())
                .await;

        assert!(matches!(
            actual,
            Err(IndexBuildError::DimensionMismatch { index: 1, expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn empty_corpus_builds_an_empty_index() {
        let fixture = VectorIndex::build(vec![], &UnreachableEmbedder, &BuildOptions::default())
            .await
            .unwrap();

        assert!(fixture.is_empty());
        assert_eq!(fixture.search(&[1.0, 0.0], 4).len(), 0);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let actual = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]);
        let expected = 0.0;
        assert_eq!(actual, expected);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let actual = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        let expected = -1.0;
        assert_eq!(actual, expected);
    }
}
