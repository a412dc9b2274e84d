use async_trait::async_trait;
use paperlens::embeddings::{model::EmbeddingModel, EmbedderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_API_KEY_VAR_NAME: &str = "VOYAGEAI_API_KEY";
const DEFAULT_URL: &str = "https://api.voyageai.com/v1/embeddings";
// Voyage accepts up to 128 texts per request for most models.
const MAX_BATCH: usize = 128;

#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    input_type: Option<String>,
    model: String,
}

/// Implementation of paperlens' `EmbeddingModel` trait for [Voyage AI](https://voyageai.com).
///
/// # Supported Configuration
///
/// The model accepts the following configuration parameters:
///
/// - `model`: String identifier for the model to use
/// - `api_key_var`(optional): Environment variable name containing the API key,
///   `VOYAGEAI_API_KEY` by default
/// - `api_url`(optional): Custom API endpoint URL
/// - `input_type`(optional): `query` or `document`, forwarded to the API
///
/// # Examples
///
/// ```rust,no_run
/// use paperlens_voyageai::VoyageAIEmbedding;
///
/// let model = VoyageAIEmbedding::new(Some(r#"{
///     "model": "voyage-3-lite",
///     "api_key_var": "ENV_VAR",
///     "api_url": "https://api.voyageai.com/v1/embeddings"
/// }"#)).unwrap();
/// ```
pub struct VoyageAIEmbedding {
    api_key: String,
    api_url: String,
    model: String,
    input_type: Option<String>,
    client: Client,
}

impl VoyageAIEmbedding {
    /// Creates a new `VoyageAIEmbedding` from a JSON configuration string.
    ///
    /// # Errors
    /// Returns [`EmbedderError::Config`] if:
    ///  - no configuration is given
    ///  - the JSON is malformed or contains unknown fields
    ///  - the API key environment variable is not set
    pub fn new(json_config: Option<&str>) -> Result<Self, EmbedderError> {
        let json = json_config.ok_or_else(|| {
            EmbedderError::Config(
                "VoyageAIEmbedding expects a config json with at least the required model field".to_string(),
            )
        })?;
        let config: ModelConfig =
            serde_json::from_str(json).map_err(|e| EmbedderError::Config(e.to_string()))?;
        let api_key_var = config
            .api_key_var
            .unwrap_or_else(|| DEFAULT_API_KEY_VAR_NAME.to_string());
        let api_key = std::env::var(&api_key_var)
            .map_err(|_| EmbedderError::Config(format!("Failed to fetch env var `{api_key_var}`")))?;
        Ok(Self {
            api_key,
            api_url: config.api_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            model: config.model,
            input_type: config.input_type,
            client: Client::new(),
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let request_body = VoyageAIEmbeddingRequest {
            input: inputs,
            model: &self.model,
            input_type: self.input_type.as_deref(),
        };
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EmbedderError::RequestError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let mut response = response
                .json::<VoyageAIEmbeddingResponse>()
                .await
                .map_err(|e| EmbedderError::ParseError(e.to_string()))?;
            if response.data.len() != inputs.len() {
                return Err(EmbedderError::CountMismatch {
                    expected: inputs.len(),
                    got: response.data.len(),
                });
            }
            response.data.sort_by_key(|d| d.index);
            Ok(response.data.into_iter().map(|d| d.embedding).collect())
        } else {
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(EmbedderError::ProviderError {
                status: status.as_u16(),
                body: error_message,
            })
        }
    }
}

#[derive(Serialize)]
struct VoyageAIEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<&'a str>,
}

#[derive(Deserialize)]
struct VoyageAIEmbeddingResponse {
    pub data: Vec<VoyageAIEmbeddingData>,
}

#[derive(Deserialize)]
struct VoyageAIEmbeddingData {
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for VoyageAIEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            debug!(model = %self.model, inputs = chunk.len(), "voyage embedding request");
            vectors.extend(self.request(chunk).await?);
        }
        Ok(vectors)
    }
}
