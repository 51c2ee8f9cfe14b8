use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use openbook_domain::{Answer, EngineConfig, QaError};
use regex::Regex;
use tracing::{info, warn};

use crate::chunker::Chunker;
use crate::composer::{AnswerComposer, CompletionProvider};
use crate::embedder::EmbeddingProvider;
use crate::index::{BuildOptions, Retriever, VectorIndex};
use crate::loader::CorpusLoader;

lazy_static! {
    // Chat-platform mention tokens, e.g. "<@U123ABC> how do I ...".
    static ref MENTION: Regex = Regex::new(r"<@[^>]+>\s*").unwrap();
}

/// Strip mention tokens and surrounding whitespace from an incoming
/// question so transports can pass message text through verbatim.
pub fn normalize_question(text: &str) -> String {
    MENTION.replace_all(text, "").trim().to_string()
}

/// The question-answering pipeline, in its `Ready` state.
///
/// A value of this type only exists after a successful corpus load and
/// index build; any build failure surfaces from [`QaPipeline::bootstrap`]
/// and there is no pipeline to serve from (restart is the only recovery).
/// The index is read-only after the build, so `answer_question` takes
/// `&self` and any number of questions may run concurrently.
pub struct QaPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    composer: AnswerComposer,
    config: EngineConfig,
}

impl QaPipeline {
    /// One-time startup: load corpus, chunk, embed, build the index.
    pub async fn bootstrap(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> anyhow::Result<Self> {
        let load = CorpusLoader::new()
            .load(&config.corpus_dir)
            .with_context(|| format!("failed to load corpus from {}", config.corpus_dir.display()))?;

        for failure in &load.failures {
            warn!(path = %failure.path.display(), error = %failure.error, "corpus file skipped");
        }
        if load.documents.is_empty() {
            warn!(corpus = %config.corpus_dir.display(), "corpus contains no loadable documents");
        }

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let chunks = chunker.split_all(&load.documents);
        info!(
            documents = load.documents.len(),
            skipped = load.skipped.len(),
            failures = load.failures.len(),
            chunks = chunks.len(),
            "corpus chunked"
        );

        let options = BuildOptions {
            batch_size: config.embed_batch_size,
            max_concurrent: config.max_concurrent_embeds,
            timeout: config.request_timeout,
        };
        let index = VectorIndex::build(chunks, embedder.as_ref(), &options).await?;

        let composer = AnswerComposer::new(completion, config.request_timeout);
        Ok(Self { index: Arc::new(index), embedder, composer, config })
    }

    /// Answer one question against the ready index.
    ///
    /// Per-question failures (embedding or composition) leave the index
    /// and every other in-flight question untouched.
    pub async fn answer_question(
        &self,
        text: &str,
        request_source: &str,
    ) -> Result<Answer, QaError> {
        let question = normalize_question(text);
        if question.is_empty() {
            return Err(QaError::Embedding { reason: "question is empty".to_string() });
        }

        let query = self.embed_question(&question).await?;

        let mut retrieved = self.index.search(&query, self.config.top_k);
        if let Some(floor) = self.config.min_similarity {
            retrieved.retain(|scored| scored.score >= floor);
        }

        let answer = self.composer.answer(&question, &retrieved).await?;

        info!(
            source = request_source,
            question = %question,
            passages = answer.source_passages.len(),
            "question answered"
        );
        Ok(answer)
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, QaError> {
        let embedded = tokio::time::timeout(
            self.config.request_timeout,
            self.embedder.embed_batch(vec![question.to_string()]),
        )
        .await
        .map_err(|_| QaError::Embedding {
            reason: format!("embedding timed out after {:?}", self.config.request_timeout),
        })?
        .map_err(|e| QaError::Embedding { reason: e.to_string() })?;

        let query = embedded.into_iter().next().ok_or_else(|| QaError::Embedding {
            reason: "provider returned no vector for the question".to_string(),
        })?;

        if !self.index.is_empty() && query.len() != self.index.dimension() {
            return Err(QaError::Embedding {
                reason: format!(
                    "question embedded to {} dimensions, index holds {}",
                    query.len(),
                    self.index.dimension()
                ),
            });
        }
        Ok(query)
    }
}
