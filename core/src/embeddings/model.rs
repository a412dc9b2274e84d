use crate::embeddings::EmbedderError;
use async_trait::async_trait;

/// A text-to-vector capability.
///
/// Implementations return exactly one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            got => Err(EmbedderError::CountMismatch { expected: 1, got }),
        }
    }
}
