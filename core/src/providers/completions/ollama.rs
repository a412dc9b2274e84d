use crate::completion::{CompletionError, CompletionModel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A model served by [Ollama](https://ollama.com) through `/api/generate`.
pub struct OllamaCompletionModel {
    api_url: String,
    model: String,
    client: Client,
}

impl OllamaCompletionModel {
    /// `api_url` is the full endpoint, e.g. `http://localhost:11434/api/generate`.
    pub fn new(api_url: String, model: String) -> Result<Self, CompletionError> {
        Self::with_timeout(api_url, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_url: String, model: String, timeout: Duration) -> Result<Self, CompletionError> {
        if model.trim().is_empty() {
            return Err(CompletionError::Config("missing model name".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        Ok(Self { api_url, model, client })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl CompletionModel for OllamaCompletionModel {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(model = %self.model, url = %self.api_url, "ollama generate request");
        let response = self
            .client
            .post(&self.api_url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| CompletionError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::ProviderError(status.as_u16(), body));
        }
        let response = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;
        Ok(response.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::correct_title;

    fn model_for(server: &mockito::ServerGuard) -> OllamaCompletionModel {
        OllamaCompletionModel::new(format!("{}/api/generate", server.url()), "llama3".to_string()).unwrap()
    }

    #[tokio::test]
    async fn generate_request_is_not_streamed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "llama3",
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"model":"llama3","response":"  \"Graph Neural Networks\" ","done":true}"#)
            .expect(2)
            .create_async()
            .await;

        let model = model_for(&server);
        assert_eq!(model.complete("fix this").await.unwrap(), "\"Graph Neural Networks\"");
        assert_eq!(correct_title(&model, "Grpah Nueral Networks").await, "Graph Neural Networks");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_raw_title() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'llama3' not found"}"#)
            .create_async()
            .await;

        let model = model_for(&server);
        let err = model.complete("fix this").await.unwrap_err();
        assert!(matches!(err, CompletionError::ProviderError(404, ref body) if body.contains("not found")));
        assert_eq!(correct_title(&model, "Grpah Nueral Networks").await, "Grpah Nueral Networks");
    }

    #[test]
    fn empty_model_name_is_rejected() {
        assert!(matches!(
            OllamaCompletionModel::new("http://localhost:11434/api/generate".to_string(), " ".to_string()),
            Err(CompletionError::Config(_))
        ));
    }
}
