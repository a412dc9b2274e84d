use crate::embeddings::{model::EmbeddingModel, EmbedderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BATCH_SIZE: usize = 64;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Embedding model served behind an OpenAI-compatible `/embeddings` endpoint.
///
/// Besides OpenAI itself this covers local servers exposing the same API
/// (Ollama, text-embeddings-inference, vLLM).
pub struct OpenAIEmbeddingModel {
    api_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
    client: Client,
}

impl OpenAIEmbeddingModel {
    pub fn new(api_key: String, api_url: String, model: String) -> Result<Self, EmbedderError> {
        Self::with_timeout(api_key, api_url, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, EmbedderError> {
        if model.trim().is_empty() {
            return Err(EmbedderError::Config("missing embedding model name".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedderError::Config(e.to_string()))?;
        Ok(Self {
            api_url,
            api_key,
            model,
            batch_size: DEFAULT_BATCH_SIZE,
            client,
        })
    }

    /// Caps the number of texts sent per request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let request_body = EmbeddingRequest {
            input: inputs,
            model: &self.model,
        };
        let mut request = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let response = request
            .send()
            .await
            .map_err(|e| EmbedderError::RequestError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let mut response = response
                .json::<OpenAIEmbeddingResponse>()
                .await
                .map_err(|e| EmbedderError::ParseError(e.to_string()))?;
            response.data.sort_by_key(|d| d.index);
            if response.data.len() != inputs.len() {
                return Err(EmbedderError::CountMismatch {
                    expected: inputs.len(),
                    got: response.data.len(),
                });
            }
            Ok(response.data.into_iter().map(|d| d.embedding).collect())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(EmbedderError::ProviderError {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    pub data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            debug!(model = %self.model, inputs = chunk.len(), "embedding request");
            vectors.extend(self.request(chunk).await?);
        }
        Ok(vectors)
    }
}
