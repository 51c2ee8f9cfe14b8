use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures while reading corpus files from disk.
///
/// A per-file variant never aborts the rest of the load; the loader
/// collects them and continues with the remaining corpus.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read corpus directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },
}

/// Invalid chunking parameters. Overlap must stay below the chunk size.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")]
pub struct InvalidChunking {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// A fatal failure while embedding the corpus into the vector index.
///
/// The whole build aborts on any of these; a partially built index is
/// never served because it would silently return incomplete context.
#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("embedding provider failed during index build: {0}")]
    Provider(String),

    #[error("embedding request timed out after {0:?} during index build")]
    Timeout(Duration),

    #[error("embedding provider returned {actual} vectors for {expected} chunks")]
    CountMismatch { expected: usize, actual: usize },

    #[error("chunk {index} embedded to {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Per-question failures. These are recoverable: the shared index is
/// untouched and the pipeline keeps serving subsequent questions.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("failed to embed question: {reason}")]
    Embedding { reason: String },

    #[error("failed to compose answer: {reason}")]
    Composition { reason: String },
}
