use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;

/// Configuration for the question-answering engine
///
/// Defaults follow the corpus the engine was written for: 1000/200
/// character chunking and top-4 retrieval.
#[derive(Debug, Clone, Setters)]
#[setters(strip_option, into)]
pub struct EngineConfig {
    /// Directory holding the corpus files
    pub corpus_dir: PathBuf,
    /// Chunk window size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question
    pub top_k: usize,
    /// Optional similarity floor; passages scoring below it are dropped
    /// before answer composition
    pub min_similarity: Option<f32>,
    /// Chunks per embedding request during the index build
    pub embed_batch_size: usize,
    /// Embedding requests in flight at once during the index build
    pub max_concurrent_embeds: usize,
    /// Upper bound on every external provider call
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("docs"),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            min_similarity: None,
            embed_batch_size: 32,
            max_concurrent_embeds: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}
