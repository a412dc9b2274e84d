use crate::{
    config::ConfigError, corpus::CorpusError, embeddings::EmbedderError, loader::LoaderError,
    report::ReportError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("Embedding failure: {0}")]
    Embedding(#[from] EmbedderError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
