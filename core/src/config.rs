//! Run configuration, read from a YAML file.
//!
//! Older configuration files name some keys differently
//! (`document_path`, `max_arxiv_results`, `embedding_model`); those names are
//! accepted as aliases.
//!
//! ```yaml
//! input_doc_path: papers/draft.pdf
//! output_dir: output
//! use_arxiv_corpus: true
//! max_papers: 200
//! mode: sentence
//! similarity_threshold: 0.75
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::{
    report::pdf::PdfOptions,
    similarity::{FailurePolicy, FieldWeights},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rank whole documents by weighted title and abstract similarity.
    #[default]
    Document,
    /// Match individual abstract sentences.
    Sentence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Pdf,
    #[default]
    Both,
}

impl OutputFormat {
    pub fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn writes_pdf(self) -> bool {
        matches!(self, Self::Pdf | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Any OpenAI-compatible `/embeddings` endpoint.
    #[default]
    OpenAI,
    VoyageAI,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(alias = "document_path")]
    pub input_doc_path: PathBuf,
    /// Explicit JSON output path; takes precedence over `output_dir`.
    pub output_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub num_keywords: usize,
    /// Maximum number of corpus papers; `-1` means unlimited.
    #[serde(alias = "max_arxiv_results")]
    pub max_papers: i64,
    /// Number of ranked papers kept in document-mode reports; all when unset.
    #[serde(alias = "top_n_similar")]
    pub top_n: Option<usize>,
    /// Ranked results scoring below this are left out of document-mode
    /// reports. Cosine scores go down to -1, which keeps everything.
    pub min_similarity: f64,
    /// Sentence pairs scoring below this are not findings.
    pub similarity_threshold: f64,
    /// Findings scoring below this are not highlighted in the PDF.
    pub display_threshold: f64,
    #[serde(alias = "embedding_model")]
    pub similarity_model: String,
    pub title_weight: f64,
    pub abstract_weight: f64,
    pub use_arxiv_corpus: bool,
    pub corpus_dir: String,
    pub font_size_title: f32,
    pub font_size_abstract: f32,
    pub font_size_sources: f32,
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
    pub mode: Mode,
    pub output_format: OutputFormat,
    pub on_embedding_failure: FailurePolicy,
    pub embedding_provider: ProviderKind,
    pub embedding_api_url: Option<String>,
    /// Environment variable holding the embedding API key.
    pub embedding_api_key_var: Option<String>,
    pub arxiv_request_delay_secs: u64,
    pub arxiv_timeout_secs: u64,
    /// Local LLM used to correct the extracted title. Needs `ollama_url` too.
    pub llm_model: Option<String>,
    /// Ollama `/api/generate` endpoint.
    pub ollama_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_doc_path: PathBuf::new(),
            output_file: None,
            output_dir: PathBuf::from("output"),
            num_keywords: 5,
            max_papers: 200,
            top_n: None,
            min_similarity: -1.0,
            similarity_threshold: 0.75,
            display_threshold: 0.65,
            similarity_model: "text-embedding-3-small".to_string(),
            title_weight: 0.3,
            abstract_weight: 0.7,
            use_arxiv_corpus: false,
            corpus_dir: "data/corpus/".to_string(),
            font_size_title: 16.0,
            font_size_abstract: 11.0,
            font_size_sources: 10.0,
            font_regular: None,
            font_bold: None,
            mode: Mode::default(),
            output_format: OutputFormat::default(),
            on_embedding_failure: FailurePolicy::default(),
            embedding_provider: ProviderKind::default(),
            embedding_api_url: None,
            embedding_api_key_var: None,
            arxiv_request_delay_secs: 3,
            arxiv_timeout_secs: 30,
            llm_model: None,
            ollama_url: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Checks value ranges. Weights that do not sum to 1 are accepted with a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_doc_path.as_os_str().is_empty() {
            return Err(invalid("input_doc_path", "must be set"));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(invalid(
                "min_similarity",
                format!("{} is outside [-1, 1]", self.min_similarity),
            ));
        }
        for (key, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("display_threshold", self.display_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, format!("{value} is outside [0, 1]")));
            }
        }
        for (key, value) in [("title_weight", self.title_weight), ("abstract_weight", self.abstract_weight)] {
            if !value.is_finite() {
                return Err(invalid(key, format!("{value} is not a finite number")));
            }
        }
        for (key, value) in [
            ("font_size_title", self.font_size_title),
            ("font_size_abstract", self.font_size_abstract),
            ("font_size_sources", self.font_size_sources),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(invalid(key, format!("{value} is not a positive size")));
            }
        }
        if self.top_n == Some(0) {
            return Err(invalid("top_n", "must be at least 1 when set"));
        }
        if self.max_papers < -1 {
            return Err(invalid("max_papers", "must be -1 (unlimited) or a count"));
        }
        let sum = self.title_weight + self.abstract_weight;
        if (sum - 1.0).abs() > 1e-6 {
            warn!(
                title_weight = self.title_weight,
                abstract_weight = self.abstract_weight,
                "field weights do not sum to 1, scores are not a convex combination"
            );
        }
        Ok(())
    }

    pub fn weights(&self) -> FieldWeights {
        FieldWeights::new(self.title_weight, self.abstract_weight)
    }

    /// `None` when the number of corpus papers is unlimited.
    pub fn max_papers_limit(&self) -> Option<usize> {
        usize::try_from(self.max_papers).ok()
    }

    /// Model and endpoint of the title corrector, when both are configured.
    pub fn title_correction(&self) -> Option<(&str, &str)> {
        match (self.llm_model.as_deref(), self.ollama_url.as_deref()) {
            (Some(model), Some(url)) if !model.trim().is_empty() && !url.trim().is_empty() => Some((model, url)),
            _ => None,
        }
    }

    pub fn json_output_path(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join("similar_papers.json"))
    }

    /// `<stem>_report.pdf` next to `output_file`, else `<output_dir>/similarity_report.pdf`.
    pub fn pdf_output_path(&self) -> PathBuf {
        match &self.output_file {
            Some(file) => {
                let stem = file.file_stem().unwrap_or_default().to_string_lossy();
                file.with_file_name(format!("{stem}_report.pdf"))
            }
            None => self.output_dir.join("similarity_report.pdf"),
        }
    }

    pub fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            font_size_title: self.font_size_title,
            font_size_abstract: self.font_size_abstract,
            font_size_sources: self.font_size_sources,
            font_regular: self.font_regular.clone(),
            font_bold: self.font_bold.clone(),
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}
