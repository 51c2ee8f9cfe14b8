use std::sync::Arc;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use openbook_domain::{Answer, QaError, ScoredChunk};
use tracing::debug;

/// The language-model capability: one prompt in, one completion out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

const SYSTEM_PROMPT: &str = "You answer questions about an operations manual. \
Answer strictly from the passages provided in the user message. \
If the passages do not contain the answer, say that the manual does not cover it. \
Never answer from general knowledge.";

/// Reply used when retrieval produced nothing worth grounding on. The
/// model is not called in that case.
pub const NO_CONTEXT_ANSWER: &str =
    "The manual does not appear to cover this question.";

/// Completion provider backed by the OpenAI chat completions API.
/// Temperature is pinned to zero so answers stay reproducible.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiCompletion {
    /// Uses `OPENAI_API_KEY` from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), client: Client::new() }
    }

    pub fn with_config(model: impl Into<String>, config: OpenAIConfig) -> Self {
        Self { model: model.into(), client: Client::with_config(config) }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("model returned an empty completion"))
    }
}

/// Composes a grounded answer from a question and its retrieved passages.
pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Provider errors and timeouts map to `QaError::Composition`; the
    /// caller's index and other in-flight questions are unaffected.
    pub async fn answer(
        &self,
        question: &str,
        retrieved: &[ScoredChunk],
    ) -> Result<Answer, QaError> {
        if retrieved.is_empty() {
            return Ok(Answer::new(NO_CONTEXT_ANSWER, Vec::new()));
        }

        let prompt = grounded_prompt(question, retrieved);
        debug!(model = %self.provider.model(), passages = retrieved.len(), "composing answer");

        let text = tokio::time::timeout(self.timeout, self.provider.complete(&prompt))
            .await
            .map_err(|_| QaError::Composition {
                reason: format!("language model timed out after {:?}", self.timeout),
            })?
            .map_err(|e| QaError::Composition { reason: e.to_string() })?;

        let source_passages = retrieved.iter().map(|s| s.chunk.clone()).collect();
        Ok(Answer::new(text, source_passages))
    }
}

/// Passages come first, labelled with their provenance, then the question.
fn grounded_prompt(question: &str, retrieved: &[ScoredChunk]) -> String {
    let mut prompt = String::from("Passages from the manual:\n\n");
    for scored in retrieved {
        prompt.push_str(&format!(
            "[{} @ {}]\n{}\n\n",
            scored.chunk.source_id, scored.chunk.offset, scored.chunk.text
        ));
    }
    prompt.push_str(&format!("Question: {question}\n"));
    prompt
}
