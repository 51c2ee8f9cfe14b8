/// Domain types for documents, chunks, retrieval results, and answers
pub mod domain;

/// Error taxonomy shared by the engine and its callers
pub mod error;

/// Engine configuration
pub mod config;

pub use config::*;
pub use domain::*;
pub use error::*;
