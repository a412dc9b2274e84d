/// Builtin embedding model providers
pub mod embeddings {
    pub(crate) mod openai;

    pub use openai::OpenAIEmbeddingModel as OpenAIEmbedding;
}

/// Builtin completion model providers
pub mod completions {
    pub(crate) mod ollama;

    pub use ollama::OllamaCompletionModel;
}
