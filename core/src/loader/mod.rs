//! Turns files on disk into [`Document`]s.
//!
//! Plain text (`.txt`, `.md`) is read as UTF-8; `.pdf` is parsed when the
//! `pdf` feature is enabled. Title and abstract are located with
//! [`extract_title_and_abstract`](crate::text::extract_title_and_abstract).

mod file;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::{document::Document, text::{extract_title_and_abstract, ExtractionError}};

pub(crate) use file::resolve_input_to_files;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Unsupported file format `{extension}` for {path}")]
    UnsupportedFormat { path: String, extension: String },
    #[error("Could not extract title/abstract from {path}: {reason}")]
    ExtractionFailure { path: String, reason: ExtractionError },
    #[error("Failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Failed to parse PDF {path}: {reason}")]
    Pdf { path: String, reason: String },
}

/// Input formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    #[cfg(feature = "pdf")]
    Pdf,
}

impl DocumentFormat {
    /// Extensions (lowercase, without dot) accepted by [`load_document`].
    pub const EXTENSIONS: &'static [&'static str] = &[
        "txt",
        "md",
        #[cfg(feature = "pdf")]
        "pdf",
    ];

    /// Detects the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "txt" | "md" => Ok(Self::PlainText),
            #[cfg(feature = "pdf")]
            "pdf" => Ok(Self::Pdf),
            _ => Err(LoaderError::UnsupportedFormat {
                path: path.display().to_string(),
                extension,
            }),
        }
    }
}

/// Loads a document, using its path as the document id.
pub fn load_document(path: impl AsRef<Path>) -> Result<Document, LoaderError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    let text = file::read_text(path, format)?;
    let (title, abstract_text) =
        extract_title_and_abstract(&text).map_err(|reason| LoaderError::ExtractionFailure {
            path: path.display().to_string(),
            reason,
        })?;
    let document = Document::new(path.display().to_string(), title, abstract_text);
    debug!(
        path = %path.display(),
        sentences = document.sentences().len(),
        "loaded document"
    );
    Ok(document)
}
