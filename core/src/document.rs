use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::split_sentences;

/// Provenance carried through from the corpus builder to the reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub arxiv_id: Option<String>,
    pub authors: Vec<String>,
    pub submitted_date: Option<DateTime<Utc>>,
    pub pdf_url: Option<String>,
}

/// A normalized paper: title, abstract and the abstract's sentences.
///
/// `id` is the path or remote identifier of the document and is unique within
/// one corpus. `sentences` is always derived from `abstract_text`, so it can
/// only be set through the constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    sentences: Vec<String>,
    pub metadata: PaperMetadata,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        let abstract_text = abstract_text.into();
        let sentences = split_sentences(&abstract_text);
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text,
            sentences,
            metadata: PaperMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: PaperMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    /// URL to show for this document in reports, falling back to its id.
    pub fn display_url(&self) -> &str {
        self.metadata.pdf_url.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_follow_abstract() {
        let doc = Document::new(
            "a.txt",
            "Title",
            "Neural networks are powerful. They require large datasets.",
        );
        assert_eq!(
            doc.sentences(),
            &["Neural networks are powerful.", "They require large datasets."]
        );
    }

    #[test]
    fn empty_abstract_has_no_sentences() {
        let doc = Document::new("a.txt", "Title", "   ");
        assert!(doc.sentences().is_empty());
    }

    #[test]
    fn display_url_prefers_pdf_link() {
        let doc = Document::new("local/a.pdf", "T", "A.");
        assert_eq!(doc.display_url(), "local/a.pdf");

        let doc = doc.with_metadata(PaperMetadata {
            pdf_url: Some("https://arxiv.org/pdf/2401.00001v1".to_string()),
            ..PaperMetadata::default()
        });
        assert_eq!(doc.display_url(), "https://arxiv.org/pdf/2401.00001v1");
    }
}
