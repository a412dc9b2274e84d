use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::CorpusError;
use crate::{
    document::Document,
    loader::{load_document, resolve_input_to_files, DocumentFormat, LoaderError},
};

/// Loads every supported document under `dir_or_glob`, except the source.
///
/// Documents whose title or abstract cannot be located are skipped with a
/// warning; any other loader error aborts the scan. An existing empty
/// directory is an empty corpus, but a path that is neither a directory nor a
/// pattern matching any file is [`CorpusError::MissingCorpus`].
pub fn local_corpus(dir_or_glob: &str, source_document: &Document) -> Result<Vec<Document>, CorpusError> {
    let resolved = resolve_input_to_files(dir_or_glob)?;
    if resolved.is_empty() && !Path::new(dir_or_glob).is_dir() {
        return Err(CorpusError::MissingCorpus(dir_or_glob.to_string()));
    }

    let source_path = canonical(Path::new(&source_document.id));
    let files: Vec<PathBuf> = resolved
        .into_iter()
        .filter(|path| has_supported_extension(path))
        .filter(|path| canonical(path) != source_path)
        .collect();

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        match load_document(path) {
            Ok(document) => documents.push(document),
            Err(LoaderError::ExtractionFailure { path, reason }) => {
                warn!(%path, %reason, "skipping corpus document");
            }
            Err(e) => return Err(e.into()),
        }
    }
    info!(dir = dir_or_glob, files = files.len(), loaded = documents.len(), "local corpus ready");
    Ok(documents)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DocumentFormat::EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
