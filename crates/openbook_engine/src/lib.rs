/// Corpus loading: format detection and text extraction per file
pub mod loader;

/// Overlapping fixed-window chunking of loaded documents
pub mod chunker;

/// Embedding provider abstraction and the OpenAI-backed implementation
pub mod embedder;

/// In-memory vector index with brute-force cosine retrieval
pub mod index;

/// Grounded answer composition against a completion provider
pub mod composer;

/// The orchestrator: one-time index build, then question answering
pub mod pipeline;

pub use chunker::*;
pub use composer::*;
pub use embedder::*;
pub use index::*;
pub use loader::*;
pub use pipeline::*;
