use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_trait::async_trait;
use tracing::debug;

/// An external capability that maps texts to fixed-dimension vectors.
///
/// Implementations must return one vector per input text, in input
/// order, all of the same dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logging and diagnostics
    fn model(&self) -> &str;

    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embedding provider backed by the OpenAI embeddings API
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiEmbedder {
    /// Uses `OPENAI_API_KEY` from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), client: Client::new() }
    }

    pub fn with_config(model: impl Into<String>, config: OpenAIConfig) -> Self {
        Self { model: model.into(), client: Client::with_config(config) }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        let count = texts.len();
        let response = self
            .client
            .embeddings()
            .create(CreateEmbeddingRequest {
                model: self.model.clone(),
                input: EmbeddingInput::StringArray(texts),
                ..Default::default()
            })
            .await?;

        debug!(model = %self.model, requested = count, returned = response.data.len(), "embedded batch");

        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn openai_embedder_parses_api_vectors_in_order() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": [
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]},
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        });
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let config = OpenAIConfig::new()
            .with_api_base(server.url())
            .with_api_key("test-key");
        let fixture = OpenAiEmbedder::with_config("text-embedding-3-small", config);

        let actual = fixture
            .embed_batch(vec!["reset".to_string(), "wifi".to_string()])
            .await
            .unwrap();

        let expected = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(actual, expected);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn openai_embedder_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(500)
            .with_body("{\"error\": {\"message\": \"boom\", \"type\": \"server_error\"}}")
            .create_async()
            .await;

        let config = OpenAIConfig::new()
            .with_api_base(server.url())
            .with_api_key("test-key");
        let fixture = OpenAiEmbedder::with_config("text-embedding-3-small", config);

        let actual = fixture.embed_batch(vec!["reset".to_string()]).await;

        assert!(actual.is_err());
    }
}
