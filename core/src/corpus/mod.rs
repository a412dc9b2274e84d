//! Builds the set of candidate documents compared against the source.
//!
//! Candidates come either from a remote [`CorpusSource`] (see the
//! `paperlens_arxiv` crate) or from a local directory scan
//! ([`local_corpus`]). The source document itself is never a candidate.

mod local;
mod query;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::{document::Document, loader::LoaderError};

pub use local::local_corpus;
pub use query::SearchQuery;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Remote search failed: {0}")]
    RemoteSearchFailure(String),
    #[error("Corpus path `{0}` is not a directory and matches no files")]
    MissingCorpus(String),
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// A remote search capability returning normalized documents.
///
/// Implementations honor their service's rate limit (a fixed delay between
/// requests) and apply a bounded request timeout; a timeout is reported as
/// [`CorpusError::RemoteSearchFailure`].
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn search(&self, query: &SearchQuery, limit: usize) -> Result<Vec<Document>, CorpusError>;
}

/// Searches `source` and removes the source document from the results.
pub async fn remote_corpus<S: CorpusSource + ?Sized>(
    source: &S,
    query: &SearchQuery,
    limit: usize,
    source_document: &Document,
) -> Result<Vec<Document>, CorpusError> {
    debug!(query = %query.to_arxiv_query(), limit, "searching remote corpus");
    let mut documents = source.search(query, limit).await?;
    let found = documents.len();
    documents.retain(|candidate| {
        let same = is_same_document(candidate, source_document);
        if same {
            info!(id = %candidate.id, "excluding the source document from the corpus");
        }
        !same
    });
    info!(found, kept = documents.len(), "remote corpus ready");
    Ok(documents)
}

/// Whether `candidate` is the source document under another name: equal ids,
/// equal arXiv ids, or the candidate's versionless arXiv id appearing in the
/// source's path (e.g. `data/2502.02587v1.pdf`).
pub fn is_same_document(candidate: &Document, source: &Document) -> bool {
    if candidate.id == source.id {
        return true;
    }
    let Some(candidate_arxiv) = candidate.metadata.arxiv_id.as_deref() else {
        return false;
    };
    if source.metadata.arxiv_id.as_deref() == Some(candidate_arxiv) {
        return true;
    }
    let base = strip_version(candidate_arxiv);
    !base.is_empty() && source.id.contains(base)
}

fn strip_version(arxiv_id: &str) -> &str {
    match arxiv_id.rfind('v') {
        Some(i) if i + 1 < arxiv_id.len() && arxiv_id[i + 1..].bytes().all(|b| b.is_ascii_digit()) => {
            &arxiv_id[..i]
        }
        _ => arxiv_id,
    }
}
