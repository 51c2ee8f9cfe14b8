use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// A document loaded from the corpus directory
///
/// One per input file. Consumed by the chunker and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct SourceDocument {
    /// Stable identity of the source file (path relative to the corpus root)
    pub source_id: String,
    /// Extracted plain text of the whole document
    pub raw_text: String,
}

impl SourceDocument {
    pub fn new(source_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), raw_text: raw_text.into() }
    }
}

/// A bounded-length slice of a source document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Chunk {
    pub text: String,
    /// `source_id` of the document this chunk was cut from
    pub source_id: String,
    /// Character offset of the chunk within the source document's text
    pub offset: usize,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, offset: usize) -> Self {
        Self { text: text.into(), source_id: source_id.into(), offset }
    }
}

/// A chunk paired with its embedding vector
///
/// Owned exclusively by the vector index and never mutated after the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// A retrieved chunk with its similarity score. Higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ordered retrieval output: at most k chunks, descending similarity
pub type RetrievalResult = Vec<ScoredChunk>;

/// A composed answer together with the passages it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Answer {
    pub text: String,
    /// Provenance, passed through from retrieval unmodified
    pub source_passages: Vec<Chunk>,
}

impl Answer {
    pub fn new(text: impl Into<String>, source_passages: Vec<Chunk>) -> Self {
        Self { text: text.into(), source_passages }
    }
}
