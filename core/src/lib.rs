//! # paperlens - Core API Documentation
//!
//! paperlens finds papers that are semantically similar to a given one and
//! reports where the similarity lies.
//!
//! ## Features
//!
//! - **Document loading** of plain text, markdown and (with the `pdf` feature) PDF files,
//!   locating the title and abstract
//! - **Corpus building** from a local directory or a remote search service
//!   (see the `paperlens_arxiv` crate)
//! - **Similarity scoring** at two granularities:
//!   - whole documents, by a weighted mix of title and abstract similarity
//!   - individual sentences, keeping every pair above a threshold
//! - **Reports** as JSON records or as a PDF with each similar sentence highlighted
//!   in the color of the paper it resembles
//! - **Title correction** through a local LLM, for titles garbled by PDF extraction
//!
//! Embeddings come from any [`EmbeddingModel`](embeddings::model::EmbeddingModel);
//! [`OpenAIEmbedding`](providers::embeddings::OpenAIEmbedding) covers any
//! OpenAI-compatible `/embeddings` endpoint and `paperlens_voyageai` adds Voyage AI.
//!
//! ## Example
//!
//! ```rust,no_run
//! use paperlens::{config::PipelineConfig, pipeline::Pipeline};
//! use paperlens::providers::embeddings::OpenAIEmbedding;
//!
//! #[tokio::main]
//! async fn main() -> paperlens::error::Result<()> {
//!     let config = PipelineConfig::from_yaml_file("config.yaml")?;
//!     let model = OpenAIEmbedding::new(
//!         std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!         "https://api.openai.com/v1/embeddings".to_string(),
//!         config.similarity_model.clone(),
//!     )?;
//!
//!     let outcome = Pipeline::new(config, &model, None).run().await?;
//!     for result in &outcome.ranked {
//!         println!("{:>3} {:.3} {}", result.rank, result.score, result.document.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! Name | Description | Default?
//! ---|---|---
//! `pdf` | enables loading PDF documents | Yes

/// Text completion support, used for title correction
pub mod completion;

/// YAML run configuration
pub mod config;

/// Candidate documents, local or remote
pub mod corpus;

/// The normalized document type shared by every stage
pub mod document;

/// Text embeddings support
pub mod embeddings;

/// Error types for all library operations
pub mod error;

/// Reading documents from disk
pub mod loader;

/// The end-to-end run
pub mod pipeline;

/// Builtin embedding model providers
pub mod providers;

/// JSON and PDF reports
pub mod report;

/// Document and sentence level scoring
pub mod similarity;

/// Sentence segmentation, title/abstract detection and keywords
pub mod text;
